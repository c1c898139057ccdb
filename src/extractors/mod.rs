//! Request extractors.

pub mod json;

pub use json::{decode, unreadable_body, JsonBody, MAX_BODY_BYTES};
