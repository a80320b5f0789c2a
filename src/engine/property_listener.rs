use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::watch;
use tracing::debug;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::DispatchEvent;
use super::PriorizedDeliveryPlugin;
use super::PropertyChangeEvent;
use crate::constants::CONFIG_PROPERTY_KEY;
use crate::constants::STARTUP_PROPERTY_VALUE;
use crate::Result;

impl PriorizedDeliveryPlugin {
    /// Hot reload trigger.
    ///
    /// Accepts the generic key and the type and version qualified key. Once
    /// the qualified key was seen, the generic key is ignored for good.
    pub fn property_changed(
        &self,
        event: PropertyChangeEvent,
    ) -> Result<()> {
        trace!("propertyChanged event: {:?}", event);

        let is_specific = event.key == self.specific_config_key();
        if !is_specific && event.key != CONFIG_PROPERTY_KEY {
            trace!("Property '{}' is not ours", event.key);
            return Ok(());
        }

        let Some(document) = event.new_value.as_deref() else {
            debug!("Ignoring removal of property '{}'", event.key);
            return Ok(());
        };
        if document == STARTUP_PROPERTY_VALUE {
            debug!("Ignoring startup event of property '{}'", event.key);
            return Ok(());
        }

        if is_specific {
            self.mark_specific_conf();
        } else if self.has_specific_conf() {
            warn!(
                "Ignoring '{}', '{}' takes precedence",
                CONFIG_PROPERTY_KEY,
                self.specific_config_key()
            );
            return Ok(());
        }

        self.reconfigure(document)?;
        info!("Reconfigured priorized dispatch plugin with '{}'", event.key);
        Ok(())
    }

    fn handle_event(
        &self,
        event: DispatchEvent,
    ) {
        match event {
            DispatchEvent::StatusChanged(status) => self.on_status_changed(status),
            DispatchEvent::PropertyChanged(change) => {
                let key = change.key.clone();
                if let Err(e) = self.property_changed(change) {
                    warn!("The new property '{}' is ignored: {}", key, e);
                }
            }
        }
    }

    /// Consumes status updates and property changes until `shutdown_signal`
    /// fires, then shuts the plugin down.
    pub async fn run(
        self: Arc<Self>,
        mut events_rx: mpsc::UnboundedReceiver<DispatchEvent>,
        mut shutdown_signal: watch::Receiver<()>,
    ) {
        debug!("Dispatch event loop of '{}' started", self.listener_id());
        loop {
            tokio::select! {
                _ = shutdown_signal.changed() => {
                    info!("Dispatch event loop of '{}' received shutdown signal", self.listener_id());
                    break;
                }

                event = events_rx.recv() => {
                    match event {
                        Some(event) => self.handle_event(event),
                        None => {
                            debug!("Dispatch event channel closed");
                            break;
                        }
                    }
                }
            }
        }
        self.shutdown();
    }
}
