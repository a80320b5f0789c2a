/// Inputs delivered to the engine's event loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchEvent {
    /// Content of a status message, `None` resets to the default status
    StatusChanged(Option<String>),
    PropertyChanged(PropertyChangeEvent),
}

/// A changed key/value setting, as fired by the configuration subsystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyChangeEvent {
    pub key: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

impl PropertyChangeEvent {
    pub fn new(
        key: impl Into<String>,
        new_value: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            old_value: None,
            new_value: Some(new_value.into()),
        }
    }

    pub fn with_old_value(
        mut self,
        old_value: impl Into<String>,
    ) -> Self {
        self.old_value = Some(old_value.into());
        self
    }
}
