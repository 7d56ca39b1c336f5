use crate::command::CommandReply;
use crate::keyspace::KeyspaceStore;

use super::parse_numbers::parse_int;

pub(super) fn pexpire(store: &mut KeyspaceStore, now_ms: u64, args: &[Vec<u8>]) -> CommandReply {
    let ttl_ms = match parse_int(&args[1]) {
        Ok(value) => value,
        Err(reply) => return reply,
    };
    let Some(id) = store.find(&args[0]) else {
        return CommandReply::Int(0);
    };
    store.set_ttl(id, ttl_ms, now_ms);
    CommandReply::Int(1)
}

pub(super) fn pttl(store: &mut KeyspaceStore, now_ms: u64, args: &[Vec<u8>]) -> CommandReply {
    let Some(id) = store.find(&args[0]) else {
        return CommandReply::Int(-2);
    };
    match store.ttl_remaining(id, now_ms) {
        Some(remaining) => CommandReply::Int(remaining),
        None => CommandReply::Int(-1),
    }
}
