//! Core data model: senders, messages, attachments, and run input.

pub mod address;
pub mod attachment;
pub mod criteria;
pub mod mail;
