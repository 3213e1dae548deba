//! Core session and turn machinery.
//!
//! - `session`: per-session state and edit proposals
//! - `store`: session persistence backends
//! - `registry`: id → live session lookup shared across turns
//! - `binding`: the session bound to the running turn
//! - `events`: stream events and tool output contracts
//! - `turn`: drives one instruction through the reasoning runtime

pub mod binding;
pub mod events;
pub mod registry;
pub mod session;
pub mod store;
pub mod turn;
