use serde::{Deserialize, Serialize};

use crate::app_response::AppResponse;

/// Default LMDB map size: 10 MiB, far above what five JSON blobs need.
pub const DEFAULT_MAP_SIZE: usize = 10 * 1024 * 1024;

/// Number of camera recognitions kept after every insert.
pub const CAMERA_HISTORY_LIMIT: usize = 50;

/// Settings for opening a store.
///
/// Every field but `name` has a default, so `{"name":"asir"}` is a complete
/// configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database name. The LMDB environment lives in `<name>.lmdb/`.
    pub name: String,
    /// Upper bound on the LMDB file size, in bytes.
    pub map_size: usize,
    pub camera_history_limit: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: "asir_explorer".to_string(),
            map_size: DEFAULT_MAP_SIZE,
            camera_history_limit: CAMERA_HISTORY_LIMIT,
        }
    }
}

impl StoreConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, AppResponse> {
        let config: StoreConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppResponse> {
        if self.name.trim().is_empty() {
            return Err(AppResponse::ValidationError(
                "Store name cannot be empty".to_string(),
            ));
        }
        if self.map_size == 0 {
            return Err(AppResponse::ValidationError(
                "map_size must be greater than zero".to_string(),
            ));
        }
        if self.camera_history_limit == 0 {
            return Err(AppResponse::ValidationError(
                "camera_history_limit must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Directory holding the LMDB environment.
    pub fn db_dir(&self) -> String {
        format!("{}.lmdb", self.name)
    }
}
