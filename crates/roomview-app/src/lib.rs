//! Async runtime for the room session controller.
//!
//! Owns one [`RoomController`](roomview_controller::RoomController) on one
//! task and feeds it from a single inbound channel. Every external
//! collaborator sits behind the [`Driver`] trait, so the same runtime drives
//! production collaborators and the simulated ones in `roomview-harness`.
//!
//! # Components
//!
//! - [`Driver`]: collaborator interface (sync source, room store, trust,
//!   search, settings, scroll store, permalinks)
//! - [`Runtime`]: event loop, action execution, completion cancellation
//! - [`RuntimeHandle`]: snapshot watch, signal broadcast, event injection
//! - [`SystemEnv`]: production environment (system clocks, OS randomness)

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod config;
mod driver;
mod error;
mod runtime;
mod system_env;

pub use config::{DEFAULT_SIGNAL_CAPACITY, DEFAULT_TICK_INTERVAL, RuntimeConfig};
pub use driver::{Driver, EventSink};
pub use error::RuntimeError;
pub use runtime::{Runtime, RuntimeHandle};
pub use system_env::SystemEnv;
