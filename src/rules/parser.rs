//! Rule document parser
//!
//! Parses the declarative dispatch rules:
//!
//! ```text
//! <msgDispatch defaultStatus='64k' defaultAction='send'>
//!   <onStatus oid='_bandwidth.status' content='64k' defaultAction='queue'>
//!     <action do='send' ifPriority='7-9'/>
//!   </onStatus>
//!   <onStatus oid='_bandwidth.status' content='2M' defaultAction='send'/>
//!   <onStatus connectionState='polling' defaultAction='queue'/>
//! </msgDispatch>
//! ```
//!
//! Any error aborts the whole document, a [`ConfigurationParser`] only exists
//! for documents that parsed completely.

use std::collections::BTreeSet;
use std::collections::HashMap;
use std::fmt::Write;
use std::sync::Arc;

use quick_xml::escape::escape;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use super::ConnectionState;
use super::DispatchAction;
use super::StatusConfiguration;
use super::StatusKey;
use crate::RuleError;

const ROOT_ELEMENT: &[u8] = b"msgDispatch";
const STATUS_ELEMENT: &[u8] = b"onStatus";
const ACTION_ELEMENT: &[u8] = b"action";

/// How a status content was resolved to its priority table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusMatch {
    /// A rule with exactly this content exists
    Exact,
    /// Fell back to the rules of the configured default status
    DefaultStatus,
    /// No rule at all, the global default action applies
    GlobalDefault,
}

impl StatusMatch {
    pub fn is_found(self) -> bool {
        !matches!(self, StatusMatch::GlobalDefault)
    }
}

#[derive(Debug, Clone)]
pub struct ConfigurationParser {
    dispatch_type: Option<String>,
    version: Option<String>,
    default_status: Option<String>,
    default_action: DispatchAction,
    /// declaration order, one entry per key
    status_configurations: Vec<Arc<StatusConfiguration>>,
    fallback: Arc<StatusConfiguration>,
}

impl ConfigurationParser {
    pub fn parse(document: &str) -> Result<Self, RuleError> {
        let mut reader = Reader::from_str(document);
        reader.trim_text(true);

        let mut root: Option<RootAttributes> = None;
        let mut root_closed = false;
        let mut current: Option<StatusConfiguration> = None;
        let mut parsed: Vec<StatusConfiguration> = Vec::new();

        loop {
            let (element, is_empty) = match reader.read_event()? {
                Event::Start(e) => (e, false),
                Event::Empty(e) => (e, true),
                Event::End(e) => {
                    match e.name().as_ref() {
                        STATUS_ELEMENT => {
                            if let Some(conf) = current.take() {
                                push_status_configuration(&mut parsed, conf);
                            }
                        }
                        ROOT_ELEMENT => root_closed = true,
                        _ => {}
                    }
                    continue;
                }
                Event::Eof => break,
                _ => continue,
            };

            match element.name().as_ref() {
                ROOT_ELEMENT => {
                    if root.is_some() {
                        return Err(RuleError::UnexpectedElement("msgDispatch".to_string()));
                    }
                    root = Some(RootAttributes::read(&element)?);
                    root_closed = is_empty;
                }
                STATUS_ELEMENT => {
                    let Some(root_attrs) = root.as_ref().filter(|_| !root_closed) else {
                        return Err(RuleError::UnexpectedElement("onStatus".to_string()));
                    };
                    if current.is_some() {
                        return Err(RuleError::UnexpectedElement("onStatus".to_string()));
                    }
                    let conf = read_status_configuration(&element, root_attrs.default_action)?;
                    if is_empty {
                        push_status_configuration(&mut parsed, conf);
                    } else {
                        current = Some(conf);
                    }
                }
                ACTION_ELEMENT => match current.as_mut() {
                    Some(conf) => {
                        let attrs = read_attributes(&element)?;
                        let action = match attrs.get("do") {
                            Some(tokens) => DispatchAction::parse(tokens)?,
                            None => return Err(RuleError::EmptyAction),
                        };
                        let range = attrs.get("ifPriority").map(String::as_str).unwrap_or("");
                        conf.add_rule(range, action)?;
                    }
                    None => warn!("Ignoring <action> outside of <onStatus>"),
                },
                other => {
                    let name = String::from_utf8_lossy(other).into_owned();
                    if root.is_none() {
                        return Err(RuleError::UnexpectedElement(name));
                    }
                    warn!(element = %name, "Ignoring unknown element in rule document");
                }
            }
        }

        if current.is_some() {
            return Err(RuleError::Xml("unterminated <onStatus>".to_string()));
        }
        let Some(root) = root else {
            return Err(RuleError::MissingRoot);
        };

        let parser = Self {
            fallback: Arc::new(StatusConfiguration::with_default_action(root.default_action)),
            dispatch_type: root.dispatch_type,
            version: root.version,
            default_status: root.default_status,
            default_action: root.default_action,
            status_configurations: parsed.into_iter().map(Arc::new).collect(),
        };
        debug!(
            "Parsed rule document with {} status configurations, defaultStatus={:?}, defaultAction={}",
            parser.status_configurations.len(),
            parser.default_status,
            parser.default_action
        );
        Ok(parser)
    }

    /// Priority table for the given status content.
    ///
    /// `None` means no status message was received yet and selects the
    /// default status. Unknown content falls back to the default status and
    /// then to the global default action.
    pub fn resolve(
        &self,
        status: Option<&str>,
    ) -> (Arc<StatusConfiguration>, StatusMatch) {
        let wanted = status.or(self.default_status.as_deref());

        if let Some(content) = wanted {
            if let Some(conf) = self.find_by_content(content) {
                let found = if status.is_some() {
                    StatusMatch::Exact
                } else {
                    StatusMatch::DefaultStatus
                };
                return (conf, found);
            }

            if let Some(default_status) = self.default_status.as_deref() {
                if default_status != content {
                    if let Some(conf) = self.find_by_content(default_status) {
                        warn!(
                            "No dispatch configuration for status '{}', using default status '{}'",
                            content, default_status
                        );
                        return (conf, StatusMatch::DefaultStatus);
                    }
                }
            }
        }

        if self.status_configurations.is_empty() {
            trace!("No status rules configured, using default action {}", self.default_action);
        } else {
            warn!(
                "No dispatch configuration for status {:?}, using default action '{}'",
                status, self.default_action
            );
        }
        (self.fallback.clone(), StatusMatch::GlobalDefault)
    }

    /// Rules bound to a connection state, `None` if no override exists.
    pub fn resolve_by_connection_state(
        &self,
        state: ConnectionState,
    ) -> Option<Arc<StatusConfiguration>> {
        self.status_configurations
            .iter()
            .find(|conf| conf.connection_state() == Some(state))
            .cloned()
    }

    /// Status topics referenced by the rules
    pub fn status_oids(&self) -> BTreeSet<String> {
        self.status_configurations
            .iter()
            .filter_map(|conf| conf.oid().map(str::to_string))
            .collect()
    }

    pub fn status_configurations(&self) -> &[Arc<StatusConfiguration>] {
        &self.status_configurations
    }

    pub fn default_action(&self) -> &DispatchAction {
        &self.default_action
    }

    pub fn default_status(&self) -> Option<&str> {
        self.default_status.as_deref()
    }

    pub fn dispatch_type(&self) -> Option<&str> {
        self.dispatch_type.as_deref()
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn to_xml(&self) -> String {
        let mut xml = String::from("<msgDispatch");
        if let Some(t) = &self.dispatch_type {
            let _ = write!(xml, " type=\"{}\"", escape(t.as_str()));
        }
        if let Some(v) = &self.version {
            let _ = write!(xml, " version=\"{}\"", escape(v.as_str()));
        }
        if let Some(s) = &self.default_status {
            let _ = write!(xml, " defaultStatus=\"{}\"", escape(s.as_str()));
        }
        let _ = writeln!(xml, " defaultAction=\"{}\">", self.default_action);
        for conf in &self.status_configurations {
            xml.push_str(&conf.to_xml("  "));
        }
        xml.push_str("</msgDispatch>\n");
        xml
    }

    fn find_by_content(
        &self,
        content: &str,
    ) -> Option<Arc<StatusConfiguration>> {
        self.status_configurations
            .iter()
            .find(|conf| conf.content() == Some(content))
            .cloned()
    }
}

struct RootAttributes {
    dispatch_type: Option<String>,
    version: Option<String>,
    default_status: Option<String>,
    default_action: DispatchAction,
}

impl RootAttributes {
    fn read(element: &BytesStart<'_>) -> Result<Self, RuleError> {
        let mut attrs = read_attributes(element)?;
        let default_action = match attrs.remove("defaultAction") {
            Some(tokens) => DispatchAction::parse(&tokens)?,
            None => DispatchAction::SEND,
        };
        Ok(Self {
            dispatch_type: attrs.remove("type"),
            version: attrs.remove("version"),
            default_status: attrs.remove("defaultStatus"),
            default_action,
        })
    }
}

fn read_status_configuration(
    element: &BytesStart<'_>,
    document_default: DispatchAction,
) -> Result<StatusConfiguration, RuleError> {
    let mut attrs = read_attributes(element)?;
    let oid = attrs.remove("oid");
    let content = attrs.remove("content");
    let connection_state = attrs
        .remove("connectionState")
        .map(|s| s.parse::<ConnectionState>())
        .transpose()?;

    if connection_state.is_none() {
        match (&oid, &content) {
            (None, _) => return Err(RuleError::MissingStatusIdentity),
            (Some(oid), None) => return Err(RuleError::MissingStatusContent { oid: oid.clone() }),
            _ => {}
        }
    }

    let default_action = match attrs.remove("defaultAction") {
        Some(tokens) => DispatchAction::parse(&tokens)?,
        // a dead or polling block can't inherit a send default
        None => match connection_state {
            Some(state) if !state.can_send() && document_default.do_send() => {
                warn!(
                    "<onStatus connectionState=\"{}\"> has no defaultAction and can't inherit '{}', using '{}'",
                    state,
                    document_default,
                    DispatchAction::QUEUE
                );
                DispatchAction::QUEUE
            }
            _ => document_default,
        },
    };

    StatusConfiguration::new(oid, content, connection_state, default_action)
}

fn push_status_configuration(
    parsed: &mut Vec<StatusConfiguration>,
    conf: StatusConfiguration,
) {
    let key: Option<StatusKey> = conf.key();
    if let Some(existing) = parsed.iter_mut().find(|c| c.key() == key) {
        warn!(?key, "Duplicate <onStatus> block, the later one replaces the earlier one");
        *existing = conf;
    } else {
        parsed.push(conf);
    }
}

/// Attribute map of one element, blank values count as absent
fn read_attributes(element: &BytesStart<'_>) -> Result<HashMap<String, String>, RuleError> {
    let mut map = HashMap::new();
    for attr in element.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        if !value.trim().is_empty() {
            map.insert(key, value);
        }
    }
    Ok(map)
}
