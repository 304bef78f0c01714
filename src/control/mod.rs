//! Control channel
//!
//! Text commands in, engine actions out.

pub mod command;
pub mod dispatcher;

pub use command::{Action, Command, READY_LINE};
pub use dispatcher::Dispatcher;
