//! Command socket
//!
//! Unix stream socket in the runtime directory. One command per
//! connection, no response, connections handled one at a time.

pub mod command;
pub mod listener;

pub use listener::CommandServer;
