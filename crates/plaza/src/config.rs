//! Server configuration.

use plaza_town::{DEFAULT_CAPACITY, capacity_in_range};

/// Environment variable for the listen address.
pub const BIND_ENV: &str = "PLAZA_BIND";

/// Environment variable for the operator master password.
pub const MASTER_PASSWORD_ENV: &str = "PLAZA_MASTER_TOWN_PASSWORD";

/// Environment variable for the capacity of towns created without one.
pub const DEFAULT_CAPACITY_ENV: &str = "PLAZA_DEFAULT_CAPACITY";

/// Process-level settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,

    /// Operator override accepted in place of any town's update password.
    ///
    /// This is a deliberate backdoor: whoever knows it can rename, resize,
    /// delete, and moderate every town. `None` disables it.
    pub master_password: Option<String>,

    /// Capacity for towns created without an explicit one.
    pub default_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            master_password: None,
            default_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl ServerConfig {
    /// Reads the configuration from the process environment.
    ///
    /// Unset variables keep their defaults. An empty master password
    /// counts as unset.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup(BIND_ENV).filter(|a| !a.is_empty()) {
            config.bind_addr = addr;
        }
        config.master_password = lookup(MASTER_PASSWORD_ENV).filter(|p| !p.is_empty());

        if let Some(raw) = lookup(DEFAULT_CAPACITY_ENV) {
            match raw.parse::<usize>() {
                Ok(capacity) if capacity_in_range(capacity) => {
                    config.default_capacity = capacity;
                }
                _ => tracing::warn!(value = %raw, "ignoring invalid {DEFAULT_CAPACITY_ENV}"),
            }
        }

        config
    }
}
