//! Task module - the task record shape and the change records that carry it.
//!
//! Tasks live in an external store; this crate only ever sees snapshots of
//! them, either inside a change record or from a point lookup at fire time.

pub mod change;
pub mod record;

pub use change::{
    parse_record, ChangeBatch, ChangeRecord, EventKind, MalformedRecord, StreamImages,
};
pub use record::{
    image_from_strings, is_active_status, string_attr, AttributeValue, Image, Task,
    ACTIVE_STATUS, DEFAULT_TITLE,
};
