//! Random access to the raw bytes of indexed messages.

pub mod reader;

pub use reader::{MessageLocation, MessageStore};
