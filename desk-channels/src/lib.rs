//! Channel adapters for deskflow.
//!
//! Adapters are pure transforms: each converts one platform's webhook payload
//! into the canonical `InboundEvent` the router ingests. They never perform
//! I/O and never fail on non-text payloads (those get the fixed notice text).

mod facebook;
mod telegram;
mod types;
mod zalo;

pub use facebook::parse_facebook;
pub use telegram::parse_telegram;
pub use types::{AdapterError, Channel, InboundEvent, TEXT_ONLY_NOTICE};
pub use zalo::parse_zalo;
