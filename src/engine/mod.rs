//! Dispatch engine
//!
//! [`PriorizedDeliveryPlugin`] owns the active rules, the last status message
//! and one [`DeliveryManagerEntry`] per registered connection. All of it sits
//! behind one lock, manager callbacks run after the lock is released.

mod delivery_manager_entry;
mod dispatch_manager;
mod event;
mod plugin;
mod property_listener;

pub use delivery_manager_entry::*;
pub use dispatch_manager::*;
pub use event::*;
pub use plugin::*;
