// Server configuration.
//
// `ServerConfig` is loaded from an optional JSON file at startup; every field
// has a default, so a partial file (or none at all) works. Command-line flags
// in `main.rs` override individual fields after loading.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to listen on.
    pub bind_address: String,
    /// Listen port; 0 lets the OS pick one.
    pub port: u16,
    /// Where generated `.mid` / `.wav` files are written and served from.
    pub output_dir: PathBuf,
    /// Reported by `/health`.
    pub service_name: String,
    /// Track name written into every MIDI file.
    pub track_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".into(),
            port: 5000,
            output_dir: PathBuf::from("static/output"),
            service_name: "Simple Music Generator".into(),
            track_name: "AI Generated Music".into(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("server.json");
        std::fs::write(&path, r#"{ "port": 8080, "service_name": "Melodies" }"#).unwrap();

        let config = ServerConfig::load(&path).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.service_name, "Melodies");
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.output_dir, PathBuf::from("static/output"));
        assert_eq!(config.track_name, "AI Generated Music");
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = ServerConfig::load(&tmp.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bad.json");
        std::fs::write(&path, "{ port: nope }").unwrap();
        assert!(matches!(
            ServerConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn serialization_roundtrip() {
        let config = ServerConfig {
            port: 0,
            ..ServerConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let restored: ServerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, restored);
    }
}
