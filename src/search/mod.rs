//! Message selection: the filter a mailbox provider evaluates during a search.

pub mod query;

pub use query::{MessageFilter, TimeBasis};
