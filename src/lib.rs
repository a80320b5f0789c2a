//! Priority based dispatch control plane.
//!
//! Decides for every message waiting in a connection's delivery queue whether
//! to send it now, hold it back, destroy it and whether to tell its sender.
//! The decision depends on the health of the connection and on an external
//! status message, both evaluated against a hot-swappable rule document:
//!
//! ```xml
//! <msgDispatch defaultStatus="64k" defaultAction="send">
//!   <onStatus oid="_bandwidth.status" content="64k" defaultAction="queue">
//!     <action do="send" ifPriority="7-9"/>
//!   </onStatus>
//!   <onStatus connectionState="polling" defaultAction="queue"/>
//! </msgDispatch>
//! ```

mod config;
pub mod constants;
mod engine;
mod errors;
mod queue;
mod rules;
mod status;

pub use config::*;
pub use engine::*;
pub use errors::*;
pub use queue::*;
pub use rules::*;
pub use status::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
