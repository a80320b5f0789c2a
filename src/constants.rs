// -
// Plugin identity

/// Plugin type, part of the specific property key
pub const PLUGIN_TYPE: &str = "Priority";
pub const PLUGIN_VERSION: &str = "1.0";

/// Generic property key carrying the rule document
pub const CONFIG_PROPERTY_KEY: &str = "PriorizedDispatchPlugin/config";

/// Property value fired on listener registration, carries no rules
pub(crate) const STARTUP_PROPERTY_VALUE: &str = "startup";

/// Rule document used until a real one arrives
pub const DEFAULT_RULE_DOCUMENT: &str = "<msgDispatch/>";

// -
// Status client

pub(crate) const DEFAULT_LOGIN_NAME: &str = "_PriorizedDispatchPlugin";
pub(crate) const DEFAULT_CALLBACK_SECRET: &str = "secret";
pub(crate) const DEFAULT_MAX_SESSIONS: u32 = 10;

// -
// Holdback queue

/// Relating part of holdback queue storage ids
pub(crate) const HOLDBACK_STORAGE_PREFIX: &str = "PriorizedDispatchPlugin";

// -
// Priorities

pub const PRIORITY_LEVELS: usize = 10;

/// Builds `PriorizedDispatchPlugin/config[<type>,<version>]`
pub fn specific_config_property_key(
    plugin_type: &str,
    version: &str,
) -> String {
    format!("{CONFIG_PROPERTY_KEY}[{plugin_type},{version}]")
}
