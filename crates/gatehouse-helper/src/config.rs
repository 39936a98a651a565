//! Helper process configuration.

use std::collections::HashMap;

/// Static configuration a host process supplies when starting the runtime.
#[derive(Debug, Clone)]
pub struct HelperConfig {
    /// Stable identifier of this helper (reverse-DNS by convention). Used
    /// for logging and as the transport endpoint name by adapters that
    /// derive one.
    pub helper_id: String,

    /// Version string reported by the built-in `GetVersion` command.
    pub version: String,

    /// Seconds of idleness after which the helper exits. Zero disables
    /// automatic termination entirely.
    pub idle_timeout_seconds: u64,

    /// Human-readable authorization prompts, keyed by a command's prompt
    /// key. A key with no entry falls back to the key itself.
    pub prompts: HashMap<String, String>,
}

impl HelperConfig {
    /// Configuration with no prompts and a 120-second idle timeout.
    #[must_use]
    pub fn new(helper_id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            helper_id: helper_id.into(),
            version: version.into(),
            idle_timeout_seconds: 120,
            prompts: HashMap::new(),
        }
    }

    /// Override the idle timeout, builder-style.
    #[must_use]
    pub fn with_idle_timeout(mut self, seconds: u64) -> Self {
        self.idle_timeout_seconds = seconds;
        self
    }

    /// Register an authorization prompt for a prompt key, builder-style.
    #[must_use]
    pub fn with_prompt(mut self, key: impl Into<String>, prompt: impl Into<String>) -> Self {
        self.prompts.insert(key.into(), prompt.into());
        self
    }

    /// Resolve the prompt for a key, falling back to the key itself when no
    /// prompt was registered.
    #[must_use]
    pub fn prompt_for_key(&self, key: &str) -> String {
        self.prompts
            .get(key)
            .cloned()
            .unwrap_or_else(|| key.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_falls_back_to_key() {
        let config = HelperConfig::new("com.example.helper", "3")
            .with_prompt("install", "Install system components?");
        assert_eq!(config.prompt_for_key("install"), "Install system components?");
        assert_eq!(config.prompt_for_key("uninstall"), "uninstall");
    }
}
