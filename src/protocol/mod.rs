// src/protocol/mod.rs
pub mod command;
pub mod decode;
pub mod message;

pub use command::Command;
pub use message::Message;
