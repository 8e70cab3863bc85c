//! Room session controller
//!
//! Action-based state machine that owns the lifecycle of viewing one room.
//! Reconciles every event source (sync, membership, trust, search, layout,
//! settings, scroll) into one immutable [`RoomViewState`] snapshot.
//!
//! # Architecture
//!
//! The controller follows the Sans-IO pattern of [`roomview_core`]: it
//! receives [`ControllerEvent`]s, processes them one at a time and returns
//! [`ControllerAction`]s for the runtime to execute. Collaborator results come
//! back as events. Once torn down it ignores everything.
//!
//! # Components
//!
//! - [`RoomController`]: the single-writer state machine
//! - [`ViewRequest`]: what the user asked to view
//! - [`ControllerConfig`]: feature flags and tuning
//! - [`RoomViewState`]: immutable snapshot published to consumers

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod config;
mod controller;
mod error;
mod event;
mod state;

pub use config::{ControllerConfig, InviteContext, ViewRequest};
pub use controller::RoomController;
pub use error::ControllerError;
pub use event::{ControllerAction, ControllerEvent, JoinOptions, Signal, StateChange};
pub use roomview_core::env::Environment;
pub use state::{LoadPhase, RoomViewState, ViewMembership};
