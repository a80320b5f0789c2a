use std::collections::HashMap;
use std::sync::Arc;

use nanoid::nanoid;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::DeliveryManagerEntry;
use super::DispatchEvent;
use super::DispatchManager;
use super::MsgErrorInfo;
use crate::constants::DEFAULT_RULE_DOCUMENT;
use crate::ConfigurationParser;
use crate::ConnectionState;
use crate::DispatchAction;
use crate::DispatchConfig;
use crate::Error;
use crate::HoldbackConfig;
use crate::MsgQueueEntry;
use crate::QueueError;
use crate::QueueFactory;
use crate::Result;
use crate::StatusClient;
use crate::StatusConfiguration;
use crate::StatusEventSender;

/// Engine state guarded by the single engine lock
struct EngineState {
    parser: Arc<ConfigurationParser>,
    current_status: Option<String>,
    current_status_configuration: Arc<StatusConfiguration>,
    /// Cached `current_status_configuration.default_action_only()`
    has_default_action_only: bool,
    entries: HashMap<String, DeliveryManagerEntry>,
    /// Set once the type and version qualified property key was seen
    has_specific_conf: bool,
    is_shutdown: bool,
}

/// Manager callbacks and sender notifications collected under the lock,
/// run once it is released.
#[derive(Default)]
struct PendingCallbacks {
    errors: Vec<(Arc<dyn DispatchManager>, MsgErrorInfo)>,
    notifications: Vec<(MsgQueueEntry, DispatchAction, Option<String>)>,
    wakeups: Vec<Arc<dyn DispatchManager>>,
}

/// Priority based dispatch decisions for all connections of a process.
///
/// Connection workers call [`decide`](Self::decide) for every ready batch.
/// Status messages, property changes and connection transitions change the
/// active rules, every change flushes the holdback queues back into the live
/// queues so the messages are re-evaluated.
pub struct PriorizedDeliveryPlugin {
    /// `PriorizedDispatchPlugin/config[<type>,<version>]`, also our name in
    /// sender notifications
    specific_config_key: String,
    listener_id: String,
    holdback: HoldbackConfig,
    status_client: Arc<StatusClient>,
    queue_factory: Arc<dyn QueueFactory>,
    events_tx: StatusEventSender,
    inner: Mutex<EngineState>,
}

impl std::fmt::Debug for PriorizedDeliveryPlugin {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("PriorizedDeliveryPlugin")
            .field("listener_id", &self.listener_id)
            .field("current_status", &self.current_status())
            .finish_non_exhaustive()
    }
}

impl PriorizedDeliveryPlugin {
    /// Parses the startup rules and subscribes to their status topics.
    ///
    /// The returned receiver carries status updates and property changes,
    /// hand it to [`run`](Self::run).
    pub fn new(
        config: &DispatchConfig,
        status_client: Arc<StatusClient>,
        queue_factory: Arc<dyn QueueFactory>,
    ) -> Result<(Arc<Self>, mpsc::UnboundedReceiver<DispatchEvent>)> {
        let rules = config
            .plugin
            .load_rules()?
            .unwrap_or_else(|| DEFAULT_RULE_DOCUMENT.to_string());
        let parser = Arc::new(ConfigurationParser::parse(&rules)?);
        let (current_status_configuration, _) = parser.resolve(None);

        let specific_config_key = config.plugin.specific_config_key();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let plugin = Arc::new(Self {
            listener_id: format!("{}-{}", specific_config_key, nanoid!(8)),
            specific_config_key,
            holdback: config.holdback.clone(),
            status_client,
            queue_factory,
            events_tx,
            inner: Mutex::new(EngineState {
                has_default_action_only: current_status_configuration.default_action_only(),
                current_status_configuration,
                parser: parser.clone(),
                current_status: None,
                entries: HashMap::new(),
                has_specific_conf: false,
                is_shutdown: false,
            }),
        });

        plugin.subscribe_status_messages(&parser)?;
        info!("Priorized dispatch plugin '{}' initialized", plugin.listener_id);
        Ok((plugin, events_rx))
    }

    /// Registers a connection. Its current connection state is applied
    /// without flushing.
    pub fn add_dispatch_manager(
        &self,
        manager: Arc<dyn DispatchManager>,
    ) -> Result<()> {
        let id = manager.id();
        let connection_state = manager.connection_state();

        let mut state = self.inner.lock();
        if state.is_shutdown {
            return Err(Error::Shutdown);
        }

        let mut entry = DeliveryManagerEntry::new(manager);
        entry.set_current_connection_state(connection_state);
        entry.set_current_state_configuration(state.parser.resolve_by_connection_state(connection_state));

        if let Some(mut previous) = state.entries.remove(&id) {
            warn!("Dispatch manager '{}' registered twice, keeping its holdback queue", id);
            entry.set_holdback_queue(previous.take_holdback_queue());
        }
        state.entries.insert(id.clone(), entry);

        info!(
            "Stored dispatch manager '{}' in state {}, {} managers registered",
            id,
            connection_state,
            state.entries.len()
        );
        Ok(())
    }

    /// Deregisters a connection and destroys its holdback queue
    pub fn remove_dispatch_manager(
        &self,
        manager_id: &str,
    ) -> Result<()> {
        let mut entry = {
            let mut state = self.inner.lock();
            state
                .entries
                .remove(manager_id)
                .ok_or_else(|| Error::UnknownManager(manager_id.to_string()))?
        };

        if let Some(queue) = entry.take_holdback_queue() {
            if let Err(e) = queue.destroy() {
                error!("Problems on shutdown of holdback queue '{}': {}", queue.storage_id(), e);
            }
        }
        info!("Removed dispatch manager '{}'", manager_id);
        Ok(())
    }

    /// Peeks the ready batch of the manager's live queue and decides on it
    pub fn handle_next_messages(
        &self,
        manager_id: &str,
    ) -> Result<Vec<MsgQueueEntry>> {
        let queue = {
            let state = self.inner.lock();
            state
                .entries
                .get(manager_id)
                .map(|entry| entry.manager().queue())
                .ok_or_else(|| Error::UnknownManager(manager_id.to_string()))?
        };
        let batch = queue.peek_ready()?;
        self.decide(manager_id, batch)
    }

    /// Classifies `candidates` and returns those to send now, in input order.
    ///
    /// Entries to hold back are moved from the live queue into the holdback
    /// queue, entries to destroy are removed from the live queue.
    pub fn decide(
        &self,
        manager_id: &str,
        candidates: Vec<MsgQueueEntry>,
    ) -> Result<Vec<MsgQueueEntry>> {
        let mut pending = PendingCallbacks::default();

        let send_now = {
            let mut guard = self.inner.lock();
            let state = &mut *guard;
            if state.is_shutdown {
                return Err(Error::Shutdown);
            }

            let entry = state
                .entries
                .get_mut(manager_id)
                .ok_or_else(|| Error::UnknownManager(manager_id.to_string()))?;

            if entry.current_connection_state() == ConnectionState::Alive
                && entry.current_state_configuration().is_none()
                && state.has_default_action_only
            {
                trace!(
                    "We have default action only, returning all {} messages",
                    candidates.len()
                );
                return Ok(candidates);
            }

            debug!("Working with {} messages of '{}'", candidates.len(), manager_id);
            let mut send_now = Vec::with_capacity(candidates.len());
            for msg in candidates {
                if msg.is_internal() {
                    info!("Sending out of bound internal message '{}'", msg.log_id());
                    send_now.push(msg);
                    continue;
                }
                if msg.sender() == self.status_client.login_name() {
                    info!("Sending out of bound PtP message '{}'", msg.log_id());
                    send_now.push(msg);
                    continue;
                }

                let mut action = *entry
                    .current_state_configuration()
                    .unwrap_or(&state.current_status_configuration)
                    .resolve(msg.priority());
                trace!("Working on '{}', action={} from sender {}", msg.log_id(), action, msg.sender());

                let connection_state = entry.current_connection_state();
                if connection_state != ConnectionState::Alive && action.do_send() {
                    error!(
                        "We are in state {} and the configuration tells us to send nevertheless, we queue instead: {}",
                        connection_state,
                        msg.log_id()
                    );
                    action = DispatchAction::QUEUE;
                }

                if action.do_send() {
                    send_now.push(msg.clone());
                } else if action.do_queue() {
                    self.hold_back(entry, &msg, &mut pending);
                } else if action.do_destroy() {
                    Self::destroy_entry(entry, &msg);
                }

                if action.do_notify_sender() {
                    pending
                        .notifications
                        .push((msg, action, state.current_status.clone()));
                }
            }
            send_now
        };

        self.run_callbacks(pending);
        Ok(send_now)
    }

    pub fn to_alive(
        &self,
        manager_id: &str,
    ) -> Result<()> {
        self.change_manager_state(manager_id, ConnectionState::Alive)
    }

    pub fn to_polling(
        &self,
        manager_id: &str,
    ) -> Result<()> {
        self.change_manager_state(manager_id, ConnectionState::Polling)
    }

    pub fn to_dead(
        &self,
        manager_id: &str,
    ) -> Result<()> {
        self.change_manager_state(manager_id, ConnectionState::Dead)
    }

    fn change_manager_state(
        &self,
        manager_id: &str,
        new_state: ConnectionState,
    ) -> Result<()> {
        let mut pending = PendingCallbacks::default();
        {
            let mut guard = self.inner.lock();
            let state = &mut *guard;
            if state.is_shutdown {
                return Err(Error::Shutdown);
            }
            let entry = state
                .entries
                .get_mut(manager_id)
                .ok_or_else(|| Error::UnknownManager(manager_id.to_string()))?;

            entry.set_current_connection_state(new_state);
            let configuration = state.parser.resolve_by_connection_state(new_state);
            match &configuration {
                Some(conf) => info!(
                    "Changing '{}' to {}, found configuration is '{}'",
                    manager_id,
                    new_state,
                    conf.to_xml("")
                ),
                None => info!("Changing '{}' to connection state {}", manager_id, new_state),
            }
            entry.set_current_state_configuration(configuration);

            Self::flush_holdback_queue(entry, &mut pending);
        }
        self.run_callbacks(pending);
        Ok(())
    }

    /// New status message content. Ignored if it equals the current status.
    pub fn on_status_changed(
        &self,
        status: Option<String>,
    ) {
        let mut pending = PendingCallbacks::default();
        {
            let mut guard = self.inner.lock();
            if guard.is_shutdown {
                debug!("Ignoring status {:?}, plugin is shut down", status);
                return;
            }
            if guard.current_status == status {
                debug!("Status {:?} is unchanged", status);
                return;
            }
            Self::apply_status(&mut guard, status, &mut pending);
        }
        self.run_callbacks(pending);
    }

    /// Resolves the rules for `status` and re-evaluates every connection
    fn apply_status(
        state: &mut EngineState,
        status: Option<String>,
        pending: &mut PendingCallbacks,
    ) {
        let old_status = std::mem::replace(&mut state.current_status, status);
        let (configuration, found) = state.parser.resolve(state.current_status.as_deref());
        state.has_default_action_only = configuration.default_action_only();
        state.current_status_configuration = configuration;
        info!(
            "Changed priorized dispatch from old status={:?} to new status={:?} ({:?})",
            old_status, state.current_status, found
        );

        for entry in state.entries.values_mut() {
            entry.set_current_state_configuration(
                state
                    .parser
                    .resolve_by_connection_state(entry.current_connection_state()),
            );
            Self::flush_holdback_queue(entry, pending);
        }
    }

    /// Replaces the active rules.
    ///
    /// A document that does not parse leaves everything untouched. If the
    /// status topics of the new rules cannot be subscribed, the old rules and
    /// their subscriptions are restored.
    pub fn reconfigure(
        &self,
        document: &str,
    ) -> Result<()> {
        let candidate = match ConfigurationParser::parse(document) {
            Ok(parser) => Arc::new(parser),
            Err(e) => {
                error!("The new configuration is ignored: {}", e);
                return Err(e.into());
            }
        };

        let mut pending = PendingCallbacks::default();
        let result = {
            let mut guard = self.inner.lock();
            if guard.is_shutdown {
                return Err(Error::Shutdown);
            }

            let old_parser = std::mem::replace(&mut guard.parser, candidate.clone());
            match self.subscribe_status_messages(&candidate) {
                Ok(()) => {
                    let status = guard.current_status.clone();
                    Self::apply_status(&mut guard, status, &mut pending);
                    info!(
                        "Reconfigured priorized dispatch plugin, current status={:?}",
                        guard.current_status
                    );
                    Ok(())
                }
                Err(e) => {
                    error!("The new configuration is ignored, rolling back: {}", e);
                    guard.parser = old_parser.clone();
                    let rollback = self.subscribe_status_messages(&old_parser);
                    let status = guard.current_status.clone();
                    Self::apply_status(&mut guard, status, &mut pending);
                    match rollback {
                        Ok(()) => Err(e),
                        Err(e2) => {
                            error!("Rollback to old configuration failed: {}", e2);
                            Err(Error::Fatal(format!(
                                "status subscriptions do not match the active rules: {e2}"
                            )))
                        }
                    }
                }
            }
        };

        self.run_callbacks(pending);
        result
    }

    /// Drops our status subscriptions and subscribes to the topics of `parser`
    fn subscribe_status_messages(
        &self,
        parser: &ConfigurationParser,
    ) -> Result<()> {
        self.status_client.unsubscribe_status_messages(&self.listener_id);
        for oid in parser.status_oids() {
            self.status_client
                .subscribe_to_status_message(&oid, &self.listener_id, self.events_tx.clone())?;
        }
        Ok(())
    }

    /// Moves `msg` from the live queue into the holdback queue
    fn hold_back(
        &self,
        entry: &mut DeliveryManagerEntry,
        msg: &MsgQueueEntry,
        pending: &mut PendingCallbacks,
    ) {
        let manager = entry.manager().clone();
        trace!("Queueing holdback message {}", msg.log_id());

        let holdback = match entry.get_or_create_holdback_queue(self.queue_factory.as_ref(), &self.holdback) {
            Ok(holdback) => holdback,
            Err(e) => {
                error!("Can't create holdback queue of '{}': {}", manager.id(), e);
                pending
                    .errors
                    .push((manager.clone(), MsgErrorInfo::new(manager.id(), vec![msg.clone()], e)));
                return;
            }
        };
        if let Err(e) = holdback.put(std::slice::from_ref(msg), true) {
            error!("Can't put '{}' into holdback queue of '{}': {}", msg.log_id(), manager.id(), e);
            pending
                .errors
                .push((manager.clone(), MsgErrorInfo::new(manager.id(), vec![msg.clone()], e)));
            return;
        }

        let live = manager.queue();
        let removed = match live.remove_exact(msg) {
            Ok(true) => return,
            Ok(false) => QueueError::Backend {
                storage_id: live.storage_id().to_string(),
                reason: format!("'{}' is not stored", msg.log_id()),
            }
            .into(),
            Err(e) => e,
        };
        error!(
            "Can't remove '{}' from queue '{}' after holding it back: {}",
            msg.log_id(),
            live.storage_id(),
            removed
        );

        // The error handler owns the message from here on
        match holdback.remove_exact(msg) {
            Ok(true) => trace!("Took '{}' back out of holdback queue", msg.log_id()),
            Ok(false) => error!(
                "PANIC: '{}' vanished from holdback queue '{}'",
                msg.log_id(),
                holdback.storage_id()
            ),
            Err(e) => error!(
                "PANIC: Can't take '{}' back out of holdback queue '{}': {}",
                msg.log_id(),
                holdback.storage_id(),
                e
            ),
        }
        pending
            .errors
            .push((manager.clone(), MsgErrorInfo::new(manager.id(), vec![msg.clone()], removed)));
    }

    fn destroy_entry(
        entry: &DeliveryManagerEntry,
        msg: &MsgQueueEntry,
    ) {
        let live = entry.manager().queue();
        match live.remove_exact(msg) {
            Ok(true) => debug!("Destroyed '{}'", msg.log_id()),
            Ok(false) => error!(
                "PANIC: Can't remove '{}' from queue '{}': not found",
                msg.log_id(),
                live.storage_id()
            ),
            Err(e) => error!(
                "PANIC: Can't remove '{}' from queue '{}': {}",
                msg.log_id(),
                live.storage_id(),
                e
            ),
        }
    }

    /// Moves every holdback entry back into the live queue.
    ///
    /// Batches the live queue refuses go to the manager's error handler as
    /// dead letters. Stops if the holdback queue does not shrink.
    fn flush_holdback_queue(
        entry: &DeliveryManagerEntry,
        pending: &mut PendingCallbacks,
    ) {
        let manager = entry.manager();
        let Some(holdback) = entry.holdback_queue() else {
            trace!("No holdback queue for '{}', nothing to flush", manager.id());
            return;
        };
        if holdback.size() == 0 {
            trace!("Holdback queue of '{}' is empty, nothing to flush", manager.id());
            return;
        }

        info!(
            "Flushing {} entries from holdback queue {}",
            holdback.size(),
            holdback.storage_id()
        );
        let live = manager.queue();
        let mut last_size = None;
        while holdback.size() > 0 {
            let size = holdback.size();
            if last_size == Some(size) {
                error!(
                    "PANIC: {} entries from holdback queue {} can't be flushed, giving up!",
                    size,
                    holdback.storage_id()
                );
                break;
            }
            last_size = Some(size);

            let batch = match holdback.peek_ready() {
                Ok(batch) => batch,
                Err(e) => {
                    error!(
                        "PANIC: Can't flush holdback queue '{}' with {} entries: {}",
                        holdback.storage_id(),
                        size,
                        e
                    );
                    continue;
                }
            };

            if let Err(e) = live.put(&batch, false) {
                warn!("Flushing holdback queue of '{}' failed: {}", manager.id(), e);
                pending
                    .errors
                    .push((manager.clone(), MsgErrorInfo::new(manager.id(), batch.clone(), e)));
            }

            for msg in &batch {
                match holdback.remove_exact(msg) {
                    Ok(true) => {}
                    Ok(false) => error!(
                        "PANIC: Expected to remove '{}' from holdback queue '{}'",
                        msg.log_id(),
                        holdback.storage_id()
                    ),
                    Err(e) => error!(
                        "PANIC: Expected to remove '{}' from holdback queue '{}': {}",
                        msg.log_id(),
                        holdback.storage_id(),
                        e
                    ),
                }
            }
        }

        if let Err(e) = holdback.clear() {
            error!("Can't clear holdback queue '{}': {}", holdback.storage_id(), e);
        }
        pending.wakeups.push(manager.clone());
    }

    fn run_callbacks(
        &self,
        pending: PendingCallbacks,
    ) {
        for (manager, info) in pending.errors {
            manager.handle_error(info);
        }

        for (msg, action, status) in pending.notifications {
            if let Err(e) = self.status_client.send_ptp_message(
                &msg,
                &self.specific_config_key,
                &action.to_token_string(),
                status.as_deref(),
            ) {
                warn!("Notifying sender '{}' about '{}' failed: {}", msg.sender(), msg.log_id(), e);
            }
        }

        for manager in pending.wakeups {
            manager.notify_about_new_entry();
        }
    }

    /// Destroys all holdback queues and drops the status subscriptions.
    /// Calling it again has no effect.
    pub fn shutdown(&self) {
        let entries = {
            let mut state = self.inner.lock();
            if state.is_shutdown {
                return;
            }
            state.is_shutdown = true;
            std::mem::take(&mut state.entries)
        };

        for (id, mut entry) in entries {
            if let Some(queue) = entry.take_holdback_queue() {
                if let Err(e) = queue.destroy() {
                    error!("Problems on shutdown of holdback queue of '{}': {}", id, e);
                }
            }
        }
        self.status_client.shutdown_listener(&self.listener_id);
        info!("Priorized dispatch plugin '{}' shut down", self.listener_id);
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.lock().is_shutdown
    }

    /// Channel feeding [`run`](Self::run), e.g. for property changes
    pub fn event_sender(&self) -> StatusEventSender {
        self.events_tx.clone()
    }

    pub fn listener_id(&self) -> &str {
        &self.listener_id
    }

    pub fn specific_config_key(&self) -> &str {
        &self.specific_config_key
    }

    pub fn current_status(&self) -> Option<String> {
        self.inner.lock().current_status.clone()
    }

    pub fn has_default_action_only(&self) -> bool {
        self.inner.lock().has_default_action_only
    }

    pub fn active_parser(&self) -> Arc<ConfigurationParser> {
        self.inner.lock().parser.clone()
    }

    pub fn current_status_configuration(&self) -> Arc<StatusConfiguration> {
        self.inner.lock().current_status_configuration.clone()
    }

    pub fn manager_count(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn connection_state(
        &self,
        manager_id: &str,
    ) -> Option<ConnectionState> {
        self.inner
            .lock()
            .entries
            .get(manager_id)
            .map(|entry| entry.current_connection_state())
    }

    /// Rules bound to the manager's connection state
    pub fn state_configuration(
        &self,
        manager_id: &str,
    ) -> Option<Arc<StatusConfiguration>> {
        self.inner
            .lock()
            .entries
            .get(manager_id)
            .and_then(|entry| entry.current_state_configuration().cloned())
    }

    /// Entries held back for the manager, `None` if no holdback queue exists
    pub fn holdback_size(
        &self,
        manager_id: &str,
    ) -> Option<usize> {
        self.inner
            .lock()
            .entries
            .get(manager_id)
            .and_then(|entry| entry.holdback_queue().map(|queue| queue.size()))
    }

    pub(super) fn mark_specific_conf(&self) {
        self.inner.lock().has_specific_conf = true;
    }

    pub(super) fn has_specific_conf(&self) -> bool {
        self.inner.lock().has_specific_conf
    }
}
