//! Dispatch rule model: actions, priority tables and the rule document parser.

mod connection_state;
mod dispatch_action;
mod parser;
mod priority;
mod status_configuration;

pub use connection_state::*;
pub use dispatch_action::*;
pub use parser::*;
pub use priority::*;
pub use status_configuration::*;
