//! # Relay Module
//!
//! The session-partitioned broadcast core: the connection registry, the
//! hub actor that serializes all access to it, and the wire/mailbox types
//! that move through it.
//!
//! ## Delivery model:
//! Fire-and-forget, at-most-once, best-effort. There is no retry and no
//! buffering for slow or disconnected subscribers beyond the transport's
//! own send buffer; a subscriber whose write fails is evicted after that
//! one attempt.

pub mod hub;       // The dispatcher actor owning the registry
pub mod messages;  // Wire shapes and hub mailbox messages
pub mod registry;  // Session-partitioned subscriber bookkeeping
