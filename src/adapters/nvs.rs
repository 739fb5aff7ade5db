//! NVS (Non-Volatile Storage) config adapter.
//!
//! Implements [`ConfigPort`] by storing [`MeterConfig`] as one `postcard`
//! blob under the `flowmeter` namespace.
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::nvs::EspNvs` on the default
//!   partition.  Commits are atomic per `set_blob`.
//! - **`not(target_os = "espidf")`**: an in-memory map, for host tests.
//!
//! Stored values are validated on load as well as on save, so a blob
//! written by older firmware with a wider range is never trusted.

use core::cell::RefCell;

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::MeterConfig;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};

const CONFIG_NAMESPACE: &str = "flowmeter";
const CONFIG_KEY: &str = "metercfg";
const MAX_BLOB_SIZE: usize = 256;

pub struct NvsConfigStore {
    #[cfg(target_os = "espidf")]
    nvs: RefCell<EspNvs<NvsDefault>>,
    #[cfg(not(target_os = "espidf"))]
    store: RefCell<HashMap<&'static str, Vec<u8>>>,
}

impl NvsConfigStore {
    #[cfg(target_os = "espidf")]
    pub fn new(partition: EspDefaultNvsPartition) -> Result<Self, ConfigError> {
        let nvs = EspNvs::new(partition, CONFIG_NAMESPACE, true).map_err(|e| {
            warn!("NvsConfigStore: open '{}' failed: {}", CONFIG_NAMESPACE, e);
            ConfigError::IoError
        })?;
        info!("NvsConfigStore: ESP-IDF NVS namespace '{}'", CONFIG_NAMESPACE);
        Ok(Self {
            nvs: RefCell::new(nvs),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Result<Self, ConfigError> {
        info!("NvsConfigStore: simulation backend (namespace '{}')", CONFIG_NAMESPACE);
        Ok(Self {
            store: RefCell::new(HashMap::new()),
        })
    }

    /// [`ConfigPort::load`], falling back to defaults on any error.
    pub fn load_or_default(&self) -> MeterConfig {
        match self.load() {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("NvsConfigStore: stored config unusable ({}), using defaults", e);
                MeterConfig::default()
            }
        }
    }

    #[cfg(target_os = "espidf")]
    fn read_blob(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        let mut buf = [0u8; MAX_BLOB_SIZE];
        let nvs = self.nvs.borrow();
        match nvs.get_blob(CONFIG_KEY, &mut buf) {
            Ok(Some(bytes)) => Ok(Some(bytes.to_vec())),
            Ok(None) => Ok(None),
            Err(e) => {
                warn!("NvsConfigStore: read error {}", e);
                Err(ConfigError::IoError)
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_blob(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        Ok(self.store.borrow().get(CONFIG_KEY).cloned())
    }

    #[cfg(target_os = "espidf")]
    fn write_blob(&self, bytes: &[u8]) -> Result<(), ConfigError> {
        self.nvs
            .borrow_mut()
            .set_blob(CONFIG_KEY, bytes)
            .map_err(|e| {
                warn!("NvsConfigStore: write error {}", e);
                ConfigError::IoError
            })
    }

    #[cfg(not(target_os = "espidf"))]
    fn write_blob(&self, bytes: &[u8]) -> Result<(), ConfigError> {
        self.store.borrow_mut().insert(CONFIG_KEY, bytes.to_vec());
        Ok(())
    }

    /// Overwrite the stored blob with raw bytes.  Test hook for corrupted
    /// storage.
    #[cfg(not(target_os = "espidf"))]
    pub fn write_raw(&self, bytes: &[u8]) {
        self.store.borrow_mut().insert(CONFIG_KEY, bytes.to_vec());
    }
}

impl ConfigPort for NvsConfigStore {
    fn load(&self) -> Result<MeterConfig, ConfigError> {
        let Some(bytes) = self.read_blob()? else {
            info!("NvsConfigStore: no stored config, using defaults");
            return Ok(MeterConfig::default());
        };
        let cfg: MeterConfig = postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
        cfg.validate()?;
        info!("NvsConfigStore: loaded config ({} bytes)", bytes.len());
        Ok(cfg)
    }

    fn save(&self, config: &MeterConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        if bytes.len() > MAX_BLOB_SIZE {
            return Err(ConfigError::StorageFull);
        }
        self.write_blob(&bytes)?;
        info!("NvsConfigStore: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}
