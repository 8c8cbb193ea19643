//! Inbound build notifications.
//!
//! - [`payload`]: decoding bus messages and normalizing them into engine events
//! - [`signature`]: HMAC verification of signed deliveries

pub mod payload;
pub mod signature;

pub use payload::{Notification, ParseError, extract_event, is_test_job};
pub use signature::{SIGNATURE_HEADER, parse_signature_header, sign_payload, verify_signature};
