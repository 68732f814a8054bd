use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::types::ReadinessConfig;

/// Environment variable naming the directory that holds `config.json`.
pub const CONFIG_DIR_ENV: &str = "IAASTESTCONFIGDIR";

/// File name looked up inside the configuration directory.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Errors raised while loading the configuration. All of them are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Resolve the config file path: `dir` if given, else `$IAASTESTCONFIGDIR`,
/// else the current directory.
pub fn config_path(dir: Option<&Path>) -> PathBuf {
    let dir = match dir {
        Some(d) => d.to_path_buf(),
        None => std::env::var_os(CONFIG_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_default(),
    };
    dir.join(CONFIG_FILE_NAME)
}

/// Parse a configuration document.
pub fn parse_config_str(s: &str) -> Result<ReadinessConfig, serde_json::Error> {
    serde_json::from_str(s)
}

/// Load and parse the configuration file at `path`.
pub fn load_config(path: impl AsRef<Path>) -> Result<ReadinessConfig, ConfigError> {
    let path = path.as_ref();
    let shown = path.display().to_string();
    debug!("Loading configuration from {shown}");

    let content = fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ConfigError::FileNotFound { path: shown.clone() }
        } else {
            ConfigError::Io {
                path: shown.clone(),
                source,
            }
        }
    })?;

    let config = parse_config_str(&content).map_err(|source| ConfigError::Parse {
        path: shown.clone(),
        source,
    })?;

    info!(
        "Configuration loaded: {} local endpoints, {} remote endpoints on {:?}",
        config.local_connection_details.len(),
        config.remote_connection_details.len(),
        config.remote_host
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Protocol;
    use std::io::Write;

    #[test]
    fn explicit_dir_wins() {
        let p = config_path(Some(Path::new("/etc/readiness")));
        assert_eq!(p, PathBuf::from("/etc/readiness/config.json"));
    }

    #[test]
    fn loads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(
            br#"{"remoteHost":"h","remoteConnectionDetails":[],
                "localConnectionDetails":[{"port":"80","protocol":"tcp","description":"web"}]}"#,
        )
        .unwrap();

        let cfg = load_config(config_path(Some(dir.path()))).unwrap();
        assert_eq!(cfg.remote_host, "h");
        assert_eq!(cfg.local_connection_details[0].protocol, Protocol::Tcp);
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(dir.path().join(CONFIG_FILE_NAME)).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn malformed_file_is_reported() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"{\"remoteHost\": ").unwrap();
        let err = load_config(f.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().starts_with("failed to parse config file"));
    }

    #[test]
    fn wrong_shape_is_a_parse_error() {
        assert!(parse_config_str(r#"{"localConnectionDetails": {"port": "1"}}"#).is_err());
    }
}
