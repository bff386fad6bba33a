//! Email parsing: MBOX splitting, EML files, envelope headers, and MIME attachments.

pub mod eml;
pub mod header;
pub mod mbox;
pub mod mime;
