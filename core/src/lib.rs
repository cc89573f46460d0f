//! # Seatline Core
//!
//! Domain types and pure logic for the Seatline seat-reservation system.
//!
//! This crate holds everything that does not touch I/O:
//!
//! - Identifiers and value objects ([`types`])
//! - The booking status alphabet and its transition table ([`status`])
//! - The error taxonomy shared by every crate ([`error`])
//! - Lock-store key formats ([`keys`])
//! - Canonical JSON serialization and request hashing ([`hashing`])
//!
//! Everything here is deterministic and unit-testable without a database
//! or lock store. The imperative shell (repositories, coordinators, HTTP
//! adapters) lives in the sibling crates.

pub mod error;
pub mod hashing;
pub mod keys;
pub mod status;
pub mod types;

pub use error::{Error, Result};
pub use status::{BookingStatus, CancelActor, LedgerStatus, OverrideStatus, PaymentOutcome};
pub use types::{
    AttachmentId, BookingId, OperatorId, Phone, RouteId, SessionId, TripId,
};
