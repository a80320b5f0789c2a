use std::sync::Arc;

use tracing::info;

use super::DispatchManager;
use crate::ConnectionState;
use crate::DeliveryQueue;
use crate::HoldbackConfig;
use crate::QueueFactory;
use crate::Result;
use crate::StatusConfiguration;

/// Per-connection dispatch context.
///
/// Only touched under the engine lock, which also makes the lazy holdback
/// queue creation race free.
pub struct DeliveryManagerEntry {
    manager: Arc<dyn DispatchManager>,
    current_connection_state: ConnectionState,
    current_state_configuration: Option<Arc<StatusConfiguration>>,
    holdback_queue: Option<Arc<dyn DeliveryQueue>>,
}

impl std::fmt::Debug for DeliveryManagerEntry {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("DeliveryManagerEntry")
            .field("manager", &self.manager.id())
            .field("current_connection_state", &self.current_connection_state)
            .field(
                "has_state_configuration",
                &self.current_state_configuration.is_some(),
            )
            .field(
                "holdback_queue",
                &self.holdback_queue.as_ref().map(|q| q.storage_id().to_string()),
            )
            .finish()
    }
}

impl DeliveryManagerEntry {
    pub fn new(manager: Arc<dyn DispatchManager>) -> Self {
        Self {
            manager,
            current_connection_state: ConnectionState::Undef,
            current_state_configuration: None,
            holdback_queue: None,
        }
    }

    pub fn id(&self) -> String {
        self.manager.id()
    }

    pub fn manager(&self) -> &Arc<dyn DispatchManager> {
        &self.manager
    }

    pub fn current_connection_state(&self) -> ConnectionState {
        self.current_connection_state
    }

    pub fn set_current_connection_state(
        &mut self,
        state: ConnectionState,
    ) {
        self.current_connection_state = state;
    }

    /// Rules bound to the current connection state, they win over status rules
    pub fn current_state_configuration(&self) -> Option<&Arc<StatusConfiguration>> {
        self.current_state_configuration.as_ref()
    }

    pub fn set_current_state_configuration(
        &mut self,
        configuration: Option<Arc<StatusConfiguration>>,
    ) {
        self.current_state_configuration = configuration;
    }

    pub fn holdback_queue(&self) -> Option<&Arc<dyn DeliveryQueue>> {
        self.holdback_queue.as_ref()
    }

    pub fn set_holdback_queue(
        &mut self,
        queue: Option<Arc<dyn DeliveryQueue>>,
    ) {
        self.holdback_queue = queue;
    }

    pub fn take_holdback_queue(&mut self) -> Option<Arc<dyn DeliveryQueue>> {
        self.holdback_queue.take()
    }

    /// Returns the holdback queue, creating it on first use.
    ///
    /// The new queue keeps node and postfix of the live queue's storage id
    /// and inherits its properties. Its type comes from
    /// `config.queue_plugin` if set.
    pub fn get_or_create_holdback_queue(
        &mut self,
        factory: &dyn QueueFactory,
        config: &HoldbackConfig,
    ) -> Result<Arc<dyn DeliveryQueue>> {
        if let Some(queue) = &self.holdback_queue {
            return Ok(queue.clone());
        }

        let live = self.manager.queue();
        let properties = live.properties();
        let type_version = config
            .queue_plugin
            .clone()
            .unwrap_or_else(|| properties.type_version());
        let storage_id = live.storage_id().with_relating(config.storage_prefix.as_str());

        let queue = factory.create_queue(&type_version, storage_id, properties)?;
        info!(
            "Created holdback queue '{}' with {} entries for '{}'",
            queue.storage_id(),
            queue.size(),
            self.manager.id()
        );
        self.holdback_queue = Some(queue.clone());
        Ok(queue)
    }
}
