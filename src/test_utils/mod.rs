//! Builders and fakes shared by the unit tests
mod common;
mod entry_builder;
mod local_broker;
mod test_manager;

pub use common::*;
pub use entry_builder::*;
pub use local_broker::*;
pub use test_manager::*;
