//! # Seatline Postgres
//!
//! Durable ledger for the reservation core: repositories over the
//! relational schema, the append-only audit log, and the idempotency
//! ledger that de-duplicates every external event.
//!
//! All queries are plain sqlx with bound parameters; every mutation is a
//! single insert or a guarded update (no destructive migrations, no
//! unguarded status writes). Booking status strings are normalized on
//! read through `seatline_core::BookingStatus::parse`, which absorbs the
//! legacy aliases still present in historical rows.

pub mod attachments;
pub mod audit;
pub mod bookings;
pub mod cancellations;
pub mod idempotency;
pub mod message_logs;
pub mod operators;
pub mod overrides;
pub mod pool;
pub mod routes;
pub mod takeovers;
pub mod trips;

pub use idempotency::{IdempotencyLedger, LedgerScope};
pub use pool::{connect, ping, run_migrations};
