//! Engine configuration

use crate::entity::types::{EntityError, EntityResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Configuration shared by every entity operation of an `Odm`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct OdmConfig {
    /// Prepended to entity type names to form collection names
    pub collection_prefix: String,
    /// How deep loaded sub-entities are hydrated. Bounds cyclic embeddings.
    pub max_hydration_depth: usize,
    pub log_level: String,
}

impl Default for OdmConfig {
    fn default() -> Self {
        Self {
            collection_prefix: String::new(),
            max_hydration_depth: 8,
            log_level: "info".to_string(),
        }
    }
}

impl OdmConfig {
    /// Parse configuration from YAML
    pub fn from_yaml_str(content: &str) -> EntityResult<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| EntityError::configuration(format!("Failed to parse config: {}", e)))
    }

    /// Load configuration from a YAML file
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> EntityResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(EntityError::configuration(format!(
                "Configuration file not found at: {}",
                path.display()
            )));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            EntityError::configuration(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml_str(&content)
    }

    /// Serialize configuration to YAML
    pub fn to_yaml_string(&self) -> EntityResult<String> {
        serde_yaml::to_string(self)
            .map_err(|e| EntityError::configuration(format!("Failed to serialize config: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config = OdmConfig::from_yaml_str("collection_prefix: app_\n").unwrap();
        assert_eq!(config.collection_prefix, "app_");
        assert_eq!(config.max_hydration_depth, 8);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn yaml_roundtrip() {
        let config = OdmConfig {
            collection_prefix: "t_".to_string(),
            max_hydration_depth: 2,
            log_level: "debug".to_string(),
        };
        let yaml = config.to_yaml_string().unwrap();
        assert_eq!(OdmConfig::from_yaml_str(&yaml).unwrap(), config);
    }

    #[test]
    fn load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("odm.yaml");
        fs::write(&path, "max_hydration_depth: 3\n").unwrap();
        assert_eq!(OdmConfig::load_from_path(&path).unwrap().max_hydration_depth, 3);

        let missing = OdmConfig::load_from_path(dir.path().join("nope.yaml")).unwrap_err();
        assert_eq!(missing.kind(), "configuration");
    }

    #[test]
    fn rejects_malformed_yaml() {
        let err = OdmConfig::from_yaml_str("max_hydration_depth: [1").unwrap_err();
        assert_eq!(err.kind(), "configuration");
    }
}
