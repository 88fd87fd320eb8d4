//! Keystore configuration.

use serde::{Deserialize, Serialize};
#[cfg(feature = "toml")]
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeystoreConfig {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Live Init/Update/Finish sessions allowed at once.
    pub max_sessions: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Token validity applied to keys with challenge type `None`.
    pub default_timeout_secs: u32,
    /// Largest `AUTH_TIMEOUT` accepted on key creation.
    pub max_timeout_secs: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Hex-encoded device root secret. A random one is drawn per process
    /// when unset.
    pub root_secret_hex: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub json: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { max_sessions: 100 }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: 3,
            max_timeout_secs: 60,
        }
    }
}

impl Default for KeystoreConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl DeviceConfig {
    /// Decoded root secret, if configured.
    pub fn root_secret(&self) -> crate::Result<Option<Vec<u8>>> {
        match &self.root_secret_hex {
            None => Ok(None),
            Some(s) => {
                let bytes = hex::decode(s.trim()).map_err(|_| crate::Error::InvalidArgument)?;
                if bytes.len() < 16 {
                    return Err(crate::Error::InvalidArgument);
                }
                Ok(Some(bytes))
            }
        }
    }
}

impl KeystoreConfig {
    #[cfg(feature = "toml")]
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    #[cfg(feature = "toml")]
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: KeystoreConfig = toml::from_str(content)?;
        if config.session.max_sessions == 0 {
            anyhow::bail!("session.max_sessions must be positive");
        }
        if config.auth.default_timeout_secs > config.auth.max_timeout_secs {
            anyhow::bail!("auth.default_timeout_secs exceeds auth.max_timeout_secs");
        }
        Ok(config)
    }

    pub fn default_config() -> Self {
        Self {
            session: SessionConfig::default(),
            auth: AuthConfig::default(),
            device: DeviceConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
