//! TOML inventory of WinRM hosts.
//!
//! ```toml
//! [hosts."@winrm/192.168.3.232"]
//! winrm_user = "vagrant"
//! password = "vagrant"
//! port = 5985
//! ```

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::host::{ConnectorData, HostIdentity};

/// Inventory loading error.
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("Failed to read inventory {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid inventory: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid attributes for host {host}: {source}")]
    Attributes {
        host: String,
        source: serde_json::Error,
    },
    #[error("Host not in inventory: {0}")]
    UnknownHost(String),
}

/// Parsed inventory file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    hosts: BTreeMap<String, Map<String, Value>>,
}

impl Inventory {
    /// Default location: `<config dir>/winbridge/inventory.toml`.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("winbridge").join("inventory.toml"))
    }

    /// Load and parse an inventory file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, InventoryError> {
        let content = std::fs::read_to_string(path).map_err(|source| InventoryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let inventory = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), hosts = inventory.hosts.len(), "Loaded inventory");
        Ok(inventory)
    }

    /// Parse inventory text.
    ///
    /// # Errors
    /// Returns error on malformed TOML.
    pub fn from_toml_str(content: &str) -> Result<Self, InventoryError> {
        Ok(toml::from_str(content)?)
    }

    /// Inventory names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.hosts.keys().map(String::as_str)
    }

    /// Identity for one named host.
    ///
    /// # Errors
    /// Returns error if the host is missing or its attributes are malformed.
    pub fn host(&self, name: &str) -> Result<HostIdentity, InventoryError> {
        let attributes = self
            .hosts
            .get(name)
            .ok_or_else(|| InventoryError::UnknownHost(name.to_string()))?;
        let data = ConnectorData::from_attributes(attributes).map_err(|source| {
            InventoryError::Attributes {
                host: name.to_string(),
                source,
            }
        })?;
        Ok(HostIdentity::new(name, data))
    }

    /// Identities for every host.
    ///
    /// # Errors
    /// Returns the first attribute error encountered.
    pub fn identities(&self) -> Result<Vec<HostIdentity>, InventoryError> {
        self.names().map(|name| self.host(name)).collect()
    }
}
