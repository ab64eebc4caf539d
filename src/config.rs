use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, RpcError};

pub const DEFAULT_MAX_IN_FLIGHT: usize = 10;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RpcConfig {
    pub max_in_flight: usize,
    pub acquire_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub sweep_interval_secs: u64,
    pub max_frame_size: usize,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            acquire_timeout_secs: DEFAULT_TIMEOUT_SECS,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            sweep_interval_secs: DEFAULT_TIMEOUT_SECS,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl RpcConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| RpcError::Config(e.to_string()))?;
        let config: RpcConfig =
            serde_json::from_str(&content).map_err(|e| RpcError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_in_flight == 0 {
            return Err(RpcError::Config("max_in_flight must be positive".to_string()));
        }
        if self.request_timeout_secs == 0 || self.sweep_interval_secs == 0 {
            return Err(RpcError::Config(
                "request_timeout_secs and sweep_interval_secs must be positive".to_string(),
            ));
        }
        if self.max_frame_size == 0 {
            return Err(RpcError::Config("max_frame_size must be positive".to_string()));
        }
        Ok(())
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_fields_take_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"max_in_flight": 4}}"#).unwrap();
        let config = RpcConfig::from_file(file.path()).unwrap();
        assert_eq!(config.max_in_flight, 4);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.max_frame_size, DEFAULT_MAX_FRAME_SIZE);
    }

    #[test]
    fn rejects_zero_capacity() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"max_in_flight": 0}}"#).unwrap();
        let err = RpcConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, RpcError::Config(_)));
    }

    #[test]
    fn unreadable_file_is_config_error() {
        let err = RpcConfig::from_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, RpcError::Config(_)));
    }
}
