//! Command table and execution.
//!
//! Dispatch receives the parsed argument list of one frame, resolves the command by its
//! uppercase name, checks arity, and runs the handler against the keyspace. Handlers never
//! touch the wire; they return [`crate::command::CommandReply`] values.

#[path = "dispatch/command_spec.rs"]
mod command_spec;
#[path = "dispatch/handlers_expiry.rs"]
mod handlers_expiry;
#[path = "dispatch/handlers_string.rs"]
mod handlers_string;
#[path = "dispatch/handlers_zset.rs"]
mod handlers_zset;
#[path = "dispatch/parse_numbers.rs"]
mod parse_numbers;
#[path = "dispatch/registry.rs"]
mod registry;


pub use command_spec::{CommandArity, CommandHandler, CommandSpec};
pub use registry::CommandRegistry;
