use crate::command::CommandReply;
use crate::keyspace::KeyspaceStore;

/// Handler signature: keyspace, current monotonic time, arguments after the command name.
pub type CommandHandler = fn(&mut KeyspaceStore, u64, &[Vec<u8>]) -> CommandReply;

/// Argument count requirement, counted after the command name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandArity {
    /// Exactly this many arguments.
    Exact(usize),
    /// This many arguments or more.
    AtLeast(usize),
}

impl CommandArity {
    /// Whether `provided` arguments satisfy the requirement.
    #[must_use]
    pub fn matches(self, provided: usize) -> bool {
        match self {
            Self::Exact(n) => provided == n,
            Self::AtLeast(n) => provided >= n,
        }
    }
}

/// One registered command.
#[derive(Debug, Clone, Copy)]
pub struct CommandSpec {
    /// Canonical uppercase name.
    pub name: &'static str,
    /// Required argument count.
    pub arity: CommandArity,
    /// Execution entry point.
    pub handler: CommandHandler,
}
