use crate::command::{CommandReply, ErrorCode};
use crate::keyspace::{KeyspaceStore, Value};

pub(super) fn get(store: &mut KeyspaceStore, _now_ms: u64, args: &[Vec<u8>]) -> CommandReply {
    let Some(id) = store.find(&args[0]) else {
        return CommandReply::Nil;
    };
    match &store.entry(id).value {
        Value::Str(bytes) => CommandReply::Str(bytes.clone()),
        Value::Sorted(_) => {
            CommandReply::Err(ErrorCode::BadType, "not a string value".to_owned())
        }
    }
}

pub(super) fn set(store: &mut KeyspaceStore, _now_ms: u64, args: &[Vec<u8>]) -> CommandReply {
    // SET never changes an entry's type; an existing sorted set stays a sorted set.
    if let Some(id) = store.find(&args[0]) {
        match &mut store.entry_mut(id).value {
            Value::Str(bytes) => {
                *bytes = args[1].clone();
                return CommandReply::Nil;
            }
            Value::Sorted(_) => {
                return CommandReply::Err(ErrorCode::BadType, "not a string value".to_owned())
            }
        }
    }
    let _ = store.insert_entry(args[0].clone(), Value::Str(args[1].clone()));
    CommandReply::Nil
}

pub(super) fn del(store: &mut KeyspaceStore, _now_ms: u64, args: &[Vec<u8>]) -> CommandReply {
    CommandReply::Int(i64::from(store.remove_key(&args[0])))
}

pub(super) fn keys(store: &mut KeyspaceStore, _now_ms: u64, _args: &[Vec<u8>]) -> CommandReply {
    let mut items = Vec::with_capacity(store.len());
    store.for_each_key(|key| {
        items.push(CommandReply::Str(key.to_vec()));
        true
    });
    CommandReply::Array(items)
}
