//! # Seatline Web
//!
//! The HTTP intake surface. Every mutating endpoint runs the same fixed
//! pipeline before any domain code executes:
//!
//! 1. per-IP token-bucket rate limit
//! 2. surface-specific cryptographic verification
//! 3. one-time replay nonce
//! 4. body parsing
//! 5. idempotency envelope
//! 6. domain handler
//!
//! Failures in steps 1-3 return 4xx without ever invoking the handler.
//! Domain rejections render as specific 4xx codes; infrastructure
//! transients render as 503 `RETRY_LATER` (500 on the inventory
//! surface), and the ledger row is marked failed so a retried key
//! re-runs the handler.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod rate_limit;
pub mod router;
pub mod signature;
pub mod state;

pub use error::ApiError;
pub use router::build_router;
pub use state::{AppState, RateLimits, Secrets};
