//! YAML configuration loading
//!
//! Node configurations are plain `serde` structs. Implementing [`YamlConfig`]
//! gives them file loading, serialization and a validation hook.

use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};

/// YAML (de)serialization for configuration structs.
///
/// # Example
/// ```
/// use nextgup_common::config::YamlConfig;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Node {
///     name: String,
/// }
///
/// impl YamlConfig for Node {}
///
/// let node = Node::from_yaml("name: upf1").unwrap();
/// assert_eq!(node.name, "upf1");
/// ```
pub trait YamlConfig: Serialize + DeserializeOwned {
    /// Parses the configuration from a YAML string and validates it.
    fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the configuration from a YAML file.
    fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Serializes the configuration to a YAML string.
    fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Semantic checks run after parsing. Accepts everything by default.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// Rejects a zero-length timer, naming the offending field.
pub fn require_nonzero(field: &str, value: u64) -> Result<()> {
    if value == 0 {
        return Err(Error::Config(format!("{field} must be greater than zero")));
    }
    Ok(())
}

/// Rejects a socket address with an unspecified IP where a concrete peer is needed.
pub fn require_specified(field: &str, addr: &SocketAddr) -> Result<()> {
    if addr.ip().is_unspecified() {
        return Err(Error::Config(format!("{field} must name a concrete address, got {addr}")));
    }
    Ok(())
}
