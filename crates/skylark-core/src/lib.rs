//! Core systems for Skylark.
//!
//! This crate provides the pieces shared by the Skylark networking crates:
//!
//! - **Signal/Slot System**: Type-safe, ordered callback registries used to
//!   deliver connection events
//! - **Logging**: `tracing` target names for per-subsystem filtering
//!
//! # Signal/Slot Example
//!
//! ```
//! use skylark_core::Signal;
//!
//! // Create a signal that notifies when a value arrives
//! let value_received = Signal::<i32>::new();
//!
//! // Connect a slot to handle the signal
//! let conn_id = value_received.connect(|value| {
//!     println!("Value received: {}", value);
//! });
//!
//! // Emit the signal
//! value_received.emit(42);
//!
//! // Disconnect when done
//! value_received.disconnect(conn_id);
//! ```

pub mod logging;
pub mod signal;

pub use signal::{ConnectionGuard, ConnectionId, Signal};
