//! Small shared helpers.

pub mod id;

pub use id::{generate_id, is_valid_id, DEFAULT_ID_LENGTH};
