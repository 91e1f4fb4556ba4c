use crate::error::ServiceError;
use crate::window::WINDOW_SECS;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ServiceConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "default_rotation_period_secs")]
    pub rotation_period_secs: u64,
    /// JSON-lines audit file. Records stay in memory when unset.
    #[serde(default)]
    pub audit_log_path: Option<String>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_rotation_period_secs() -> u64 {
    60
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            rotation_period_secs: default_rotation_period_secs(),
            audit_log_path: None,
        }
    }
}

impl ServiceConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ServiceError> {
        let display = path.as_ref().display().to_string();
        let data = fs::read_to_string(&path).map_err(|source| ServiceError::ConfigRead {
            path: display.clone(),
            source,
        })?;
        let cfg: Self = serde_json::from_str(&data).map_err(|source| ServiceError::ConfigParse {
            path: display,
            source,
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ServiceError> {
        // Two rotations inside one minute would publish two secrets under
        // the same window_id.
        if self.rotation_period_secs < WINDOW_SECS {
            return Err(ServiceError::InvalidConfig(format!(
                "rotation_period_secs must be at least {WINDOW_SECS}, got {}",
                self.rotation_period_secs
            )));
        }
        if self.listen_addr.trim().is_empty() {
            return Err(ServiceError::InvalidConfig("listen_addr is empty".into()));
        }
        Ok(())
    }

    pub fn rotation_period(&self) -> Duration {
        Duration::from_secs(self.rotation_period_secs)
    }
}
