use std::fmt::Write;

use quick_xml::escape::escape;
use tracing::warn;

use super::ConnectionState;
use super::DispatchAction;
use super::Priority;
use super::PriorityRange;
use crate::constants::PRIORITY_LEVELS;
use crate::RuleError;

/// Lookup key of a parsed `<onStatus>` block.
///
/// Status content has precedence; blocks keyed only by connection state are
/// found with [`ConfigurationParser::resolve_by_connection_state`].
///
/// [`ConfigurationParser::resolve_by_connection_state`]: super::ConfigurationParser::resolve_by_connection_state
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StatusKey {
    Content(String),
    ConnectionState(ConnectionState),
}

/// Priority table of one `<onStatus>` block.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusConfiguration {
    oid: Option<String>,
    content: Option<String>,
    connection_state: Option<ConnectionState>,
    actions: [Option<DispatchAction>; PRIORITY_LEVELS],
    default_action: DispatchAction,
    /// cache, recomputed on every rule insertion
    default_action_only: bool,
}

impl StatusConfiguration {
    pub fn new(
        oid: Option<String>,
        content: Option<String>,
        connection_state: Option<ConnectionState>,
        default_action: DispatchAction,
    ) -> Result<Self, RuleError> {
        check_sendable(connection_state, &default_action)?;
        Ok(Self {
            oid,
            content,
            connection_state,
            actions: [None; PRIORITY_LEVELS],
            default_action,
            default_action_only: default_action.default_action_only(),
        })
    }

    /// Throwaway table applying `default_action` to every priority
    pub fn with_default_action(default_action: DispatchAction) -> Self {
        Self {
            oid: None,
            content: None,
            connection_state: None,
            actions: [None; PRIORITY_LEVELS],
            default_action,
            default_action_only: default_action.default_action_only(),
        }
    }

    /// Sets `action` for every priority in `priority_range`.
    ///
    /// Accepts `"low-high"`, a single digit or a blank string (full range).
    /// Last write wins on overlapping rules.
    pub fn add_rule(
        &mut self,
        priority_range: &str,
        action: DispatchAction,
    ) -> Result<(), RuleError> {
        let range = PriorityRange::parse(priority_range)?;
        self.add_rule_range(range, action)
    }

    pub fn add_rule_range(
        &mut self,
        range: PriorityRange,
        action: DispatchAction,
    ) -> Result<(), RuleError> {
        check_sendable(self.connection_state, &action)?;

        for index in range.indices() {
            if let Some(previous) = self.actions[index] {
                warn!(
                    status = %self.describe(),
                    priority = index,
                    %previous,
                    replacement = %action,
                    "Overwriting dispatch action of already configured priority"
                );
            }
            self.actions[index] = Some(action);
        }

        self.default_action_only = self.compute_default_action_only();
        Ok(())
    }

    /// Action for `priority`, falls back to the default action.
    pub fn resolve(
        &self,
        priority: Priority,
    ) -> &DispatchAction {
        self.actions[priority.index()]
            .as_ref()
            .unwrap_or(&self.default_action)
    }

    /// True if every configured action is a plain send
    pub fn default_action_only(&self) -> bool {
        self.default_action_only
    }

    pub fn oid(&self) -> Option<&str> {
        self.oid.as_deref()
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    pub fn connection_state(&self) -> Option<ConnectionState> {
        self.connection_state
    }

    pub fn default_action(&self) -> &DispatchAction {
        &self.default_action
    }

    pub fn key(&self) -> Option<StatusKey> {
        match (&self.content, self.connection_state) {
            (Some(content), _) => Some(StatusKey::Content(content.clone())),
            (None, Some(state)) => Some(StatusKey::ConnectionState(state)),
            (None, None) => None,
        }
    }

    /// Renders the declarative `<onStatus>` form, adjacent equal slots are
    /// merged into one `ifPriority` range.
    pub fn to_xml(
        &self,
        indent: &str,
    ) -> String {
        let mut xml = String::new();
        let _ = write!(xml, "{indent}<onStatus");
        if let Some(oid) = &self.oid {
            let _ = write!(xml, " oid=\"{}\"", escape(oid.as_str()));
        }
        if let Some(content) = &self.content {
            let _ = write!(xml, " content=\"{}\"", escape(content.as_str()));
        }
        if let Some(state) = self.connection_state {
            let _ = write!(xml, " connectionState=\"{}\"", state.as_rule_str());
        }
        let _ = writeln!(xml, " defaultAction=\"{}\">", self.default_action);

        let mut index = 0;
        while index < PRIORITY_LEVELS {
            let Some(action) = self.actions[index] else {
                index += 1;
                continue;
            };
            let start = index;
            while index + 1 < PRIORITY_LEVELS && self.actions[index + 1] == Some(action) {
                index += 1;
            }
            let range = if start == index {
                format!("{start}")
            } else {
                format!("{start}-{index}")
            };
            let _ = writeln!(xml, "{indent}  <action do=\"{action}\" ifPriority=\"{range}\"/>");
            index += 1;
        }

        let _ = writeln!(xml, "{indent}</onStatus>");
        xml
    }

    fn compute_default_action_only(&self) -> bool {
        self.default_action.default_action_only()
            && self
                .actions
                .iter()
                .flatten()
                .all(|action| action.default_action_only())
    }

    fn describe(&self) -> String {
        match (&self.oid, &self.content, self.connection_state) {
            (_, Some(content), _) => format!("content={content}"),
            (_, None, Some(state)) => format!("connectionState={state}"),
            (Some(oid), None, None) => format!("oid={oid}"),
            (None, None, None) => "default".to_string(),
        }
    }
}

fn check_sendable(
    connection_state: Option<ConnectionState>,
    action: &DispatchAction,
) -> Result<(), RuleError> {
    match connection_state {
        Some(state) if !state.can_send() && action.do_send() => {
            Err(RuleError::SendOnInactiveConnection {
                state: state.to_string(),
                action: action.to_string(),
            })
        }
        _ => Ok(()),
    }
}
