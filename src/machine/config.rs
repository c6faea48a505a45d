//! Machine configuration.

use serde::{Deserialize, Serialize};

/// Settings of one state machine.
///
/// Deserializable from any serde format; missing fields take their defaults.
///
/// ```rust
/// use foxflow::MachineConfig;
///
/// let config = MachineConfig::default();
/// assert_eq!(config.name, "state_machine");
/// assert_eq!(config.history_capacity, 64);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Name used in log output.
    pub name: String,
    /// Transitions kept in the history; `0` disables recording.
    pub history_capacity: usize,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            name: "state_machine".to_string(),
            history_capacity: 64,
        }
    }
}

impl MachineConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let config: MachineConfig = serde_json::from_str(r#"{"name": "arm"}"#).unwrap();

        assert_eq!(config.name, "arm");
        assert_eq!(config.history_capacity, 64);
    }

    #[test]
    fn builder_methods_override_fields() {
        let config = MachineConfig::named("drive").with_history_capacity(0);

        assert_eq!(config.name, "drive");
        assert_eq!(config.history_capacity, 0);
    }
}
