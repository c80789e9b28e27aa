//! Slash commands
//!
//! A static table maps triggers such as `/new_topic` or `/nt` to a
//! `CommandKind`. Incoming text is parsed into a `ParsedCommand`, its
//! arguments are bound against the command's parameter list and the matching
//! chat session operation is run.

mod dispatch;
mod parse;
mod registry;

#[cfg(test)]
mod proptests;

pub use dispatch::dispatch;
pub use parse::parse_query;
pub use registry::CommandRegistry;
