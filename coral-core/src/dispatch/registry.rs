use crate::command::{CommandReply, ErrorCode};
use crate::containers::HotMap;
use crate::keyspace::KeyspaceStore;

use super::command_spec::{CommandArity, CommandSpec};
use super::{handlers_expiry, handlers_string, handlers_zset};

/// Name-keyed command table.
#[derive(Debug)]
pub struct CommandRegistry {
    table: HotMap<&'static str, CommandSpec>,
}

impl CommandRegistry {
    /// Builds the registry with every built-in command installed.
    #[must_use]
    pub fn with_builtin_commands() -> Self {
        let mut registry = Self {
            table: HotMap::default(),
        };
        registry.register(CommandSpec {
            name: "GET",
            arity: CommandArity::Exact(1),
            handler: handlers_string::get,
        });
        registry.register(CommandSpec {
            name: "SET",
            arity: CommandArity::Exact(2),
            handler: handlers_string::set,
        });
        registry.register(CommandSpec {
            name: "DEL",
            arity: CommandArity::Exact(1),
            handler: handlers_string::del,
        });
        registry.register(CommandSpec {
            name: "KEYS",
            arity: CommandArity::Exact(0),
            handler: handlers_string::keys,
        });
        registry.register(CommandSpec {
            name: "PEXPIRE",
            arity: CommandArity::Exact(2),
            handler: handlers_expiry::pexpire,
        });
        registry.register(CommandSpec {
            name: "PTTL",
            arity: CommandArity::Exact(1),
            handler: handlers_expiry::pttl,
        });
        registry.register(CommandSpec {
            name: "ZADD",
            arity: CommandArity::Exact(3),
            handler: handlers_zset::zadd,
        });
        registry.register(CommandSpec {
            name: "ZREM",
            arity: CommandArity::Exact(2),
            handler: handlers_zset::zrem,
        });
        registry.register(CommandSpec {
            name: "ZSCORE",
            arity: CommandArity::Exact(2),
            handler: handlers_zset::zscore,
        });
        registry.register(CommandSpec {
            name: "ZQUERY",
            arity: CommandArity::Exact(5),
            handler: handlers_zset::zquery,
        });
        registry
    }

    fn register(&mut self, spec: CommandSpec) {
        let _ = self.table.insert(spec.name, spec);
    }

    /// Number of registered commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Executes one parsed request against the keyspace.
    ///
    /// Malformed requests (empty argument list, unknown name, wrong arity) produce an ERR
    /// reply rather than a connection fault, so one bad command never kills the session.
    pub fn dispatch_args(
        &self,
        store: &mut KeyspaceStore,
        now_ms: u64,
        args: &[Vec<u8>],
    ) -> CommandReply {
        let Some((name_bytes, rest)) = args.split_first() else {
            return CommandReply::Err(ErrorCode::Unknown, "empty command".to_owned());
        };
        let name = String::from_utf8_lossy(name_bytes).to_ascii_uppercase();
        let Some(spec) = self.table.get(name.as_str()) else {
            return CommandReply::Err(ErrorCode::Unknown, format!("unknown command '{name}'"));
        };
        if !spec.arity.matches(rest.len()) {
            return CommandReply::Err(
                ErrorCode::Unknown,
                format!("wrong number of arguments for '{name}'"),
            );
        }
        (spec.handler)(store, now_ms, rest)
    }
}
