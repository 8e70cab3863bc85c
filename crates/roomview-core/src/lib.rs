//! Room view core
//!
//! Pure state machines for the lifecycle of viewing one chat room. Every
//! component here is free of I/O: it takes inputs (events, collaborator
//! results, the current time) and returns decisions for the controller to act
//! on. The composite controller lives in `roomview-controller`.
//!
//! # Components
//!
//! - [`identity::IdentityResolver`]: alias-or-id to a concrete room id
//! - [`arbiter::PeekJoinArbiter`]: peek, join and invite decisions
//! - [`reconciler::TimelineReconciler`]: unread counting and effect dispatch
//! - [`trust::TrustEvaluator`]: encryption shield status
//! - [`trust::Permissions`]: send, react and self-redact capabilities
//! - [`layout::LayoutArbiter`]: timeline, maximised widget or call
//! - [`search::SearchManager`]: at most one cancellable search
//! - [`scroll::ScrollTracker`]: scroll anchor persistence and restore
//! - [`view_mode::ViewMode`]: exhaustive kind of room view
//! - [`env::Environment`]: time and randomness abstraction

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod arbiter;
pub mod effects;
pub mod env;
pub mod error;
pub mod event;
pub mod identity;
pub mod layout;
pub mod permalinks;
pub mod reconciler;
pub mod room;
pub mod scroll;
pub mod search;
pub mod settings;
pub mod throttle;
pub mod trust;
pub mod types;
pub mod view_mode;
pub mod visibility;
