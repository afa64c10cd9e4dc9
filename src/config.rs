//! Server settings.
//!
//! Every field has a default, so an empty TOML document is a valid config:
//!
//! ```toml
//! host = "127.0.0.1"
//! port = 3000
//! powered_by = "switchyard"
//! display_error_details = false
//! max_body_bytes = 2097152
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::Error;

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    /// Value of the `X-Powered-By` header set on every response.
    pub powered_by: String,
    /// Include the fault text in generic 500 bodies. Off by default so
    /// internals never leak to clients.
    pub display_error_details: bool,
    /// Largest request body the server buffers. Bigger bodies get `413`.
    pub max_body_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: 8080,
            powered_by: "switchyard".to_owned(),
            display_error_details: false,
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

impl Settings {
    pub fn from_toml_str(content: &str) -> Result<Self, Error> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// `host:port`, bracketing IPv6 hosts.
    pub fn addr(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}
