use crate::command::{CommandReply, ErrorCode};
use crate::keyspace::{EntryId, KeyspaceStore, Value};
use crate::zset::SortedSet;

use super::parse_numbers::{parse_int, parse_score};

/// Resolves `key` to a sorted-set entry, faulting on a type mismatch.
fn find_sorted(store: &mut KeyspaceStore, key: &[u8]) -> Result<Option<EntryId>, CommandReply> {
    let Some(id) = store.find(key) else {
        return Ok(None);
    };
    match store.entry(id).value {
        Value::Sorted(_) => Ok(Some(id)),
        Value::Str(_) => Err(CommandReply::Err(
            ErrorCode::BadType,
            "not a sorted set".to_owned(),
        )),
    }
}

fn sorted_mut(store: &mut KeyspaceStore, id: EntryId) -> &mut SortedSet {
    match &mut store.entry_mut(id).value {
        Value::Sorted(set) => set,
        Value::Str(_) => unreachable!("entry id was resolved as a sorted set"),
    }
}

pub(super) fn zadd(store: &mut KeyspaceStore, _now_ms: u64, args: &[Vec<u8>]) -> CommandReply {
    let score = match parse_score(&args[1]) {
        Ok(value) => value,
        Err(reply) => return reply,
    };
    let id = match find_sorted(store, &args[0]) {
        Ok(Some(id)) => id,
        Ok(None) => store.insert_entry(args[0].clone(), Value::Sorted(SortedSet::new())),
        Err(reply) => return reply,
    };
    let added = sorted_mut(store, id).insert(&args[2], score);
    CommandReply::Int(i64::from(added))
}

pub(super) fn zrem(store: &mut KeyspaceStore, _now_ms: u64, args: &[Vec<u8>]) -> CommandReply {
    let id = match find_sorted(store, &args[0]) {
        Ok(Some(id)) => id,
        Ok(None) => return CommandReply::Int(0),
        Err(reply) => return reply,
    };
    let removed = sorted_mut(store, id).remove(&args[1]);
    CommandReply::Int(i64::from(removed))
}

pub(super) fn zscore(store: &mut KeyspaceStore, _now_ms: u64, args: &[Vec<u8>]) -> CommandReply {
    let id = match find_sorted(store, &args[0]) {
        Ok(Some(id)) => id,
        Ok(None) => return CommandReply::Nil,
        Err(reply) => return reply,
    };
    let set = sorted_mut(store, id);
    match set.lookup(&args[1]) {
        Some(node) => CommandReply::Double(set.member(node).score),
        None => CommandReply::Nil,
    }
}

/// ZQUERY key score name offset limit: rank-range scan starting at the first member at or
/// after `(score, name)`, shifted by `offset`, returning up to `limit` members as a flattened
/// `name, score` array.
pub(super) fn zquery(store: &mut KeyspaceStore, _now_ms: u64, args: &[Vec<u8>]) -> CommandReply {
    let score = match parse_score(&args[1]) {
        Ok(value) => value,
        Err(reply) => return reply,
    };
    let offset = match parse_int(&args[3]) {
        Ok(value) => value,
        Err(reply) => return reply,
    };
    let limit = match parse_int(&args[4]) {
        Ok(value) => value,
        Err(reply) => return reply,
    };
    let id = match find_sorted(store, &args[0]) {
        Ok(Some(id)) => id,
        Ok(None) => return CommandReply::Array(Vec::new()),
        Err(reply) => return reply,
    };
    if limit <= 0 {
        return CommandReply::Array(Vec::new());
    }
    let set = sorted_mut(store, id);
    let mut items = Vec::new();
    let mut cursor = set
        .seek_at_or_after(score, &args[2])
        .and_then(|node| set.offset(node, offset));
    let mut emitted = 0_i64;
    while let Some(node) = cursor {
        if emitted >= limit {
            break;
        }
        let member = set.member(node);
        items.push(CommandReply::Str(member.name.to_vec()));
        items.push(CommandReply::Double(member.score));
        emitted += 1;
        cursor = set.offset(node, 1);
    }
    CommandReply::Array(items)
}
