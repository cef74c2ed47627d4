//! TOML configuration file loading
//!
//! Supports `~/.config/meshgw/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::mesh::SimTopology;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct GatewayConfigFile {
    /// HTTP server and event loop settings
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Diagnostic aggregation timing
    #[serde(default)]
    pub diagnostics: DiagnosticsFileConfig,

    /// Simulated mesh layout; replaces the built-in topology when present
    #[serde(default)]
    pub mesh: Option<SimTopology>,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// Address to bind
    pub listen: Option<String>,

    /// Port to bind
    pub port: Option<u16>,

    /// How long the transport waits for a response
    pub request_timeout_ms: Option<u64>,

    /// Completion poller period
    pub tick_ms: Option<u64>,
}

/// Diagnostic aggregation configuration
#[derive(Debug, Default, Deserialize)]
pub struct DiagnosticsFileConfig {
    /// Collection window per request
    pub collect_timeout_ms: Option<u64>,

    /// Age at which cached records are evicted
    pub reset_timeout_ms: Option<u64>,
}

/// Load a TOML config file
///
/// `path` overrides the standard location. Returns
/// `GatewayConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file(path: Option<&Path>) -> GatewayConfigFile {
    let Some(path) = path.map(Path::to_path_buf).or_else(config_file_path) else {
        return GatewayConfigFile::default();
    };

    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file");
        return GatewayConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                GatewayConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            GatewayConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/meshgw/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("meshgw").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::mesh::DeviceRole;

    #[test]
    fn partial_file_parses() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 9000

[[mesh.peers]]
rloc16 = 0x1200
reply_delay_ms = 100

[[mesh.peers]]
rloc16 = 0x3400
role = "child"
reachable = false
"#
        )
        .unwrap();

        let config = load_config_file(Some(file.path()));
        assert_eq!(config.server.port, Some(9000));
        assert_eq!(config.server.listen, None);
        assert_eq!(config.diagnostics.collect_timeout_ms, None);

        let mesh = config.mesh.unwrap();
        assert_eq!(mesh.rloc16, 0x0400, "unset fields keep their defaults");
        assert_eq!(mesh.peers.len(), 2);
        assert_eq!(mesh.peers[0].rloc16, 0x1200);
        assert!(mesh.peers[0].reachable);
        assert_eq!(mesh.peers[1].role, DeviceRole::Child);
        assert!(!mesh.peers[1].reachable);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nport = ").unwrap();

        let config = load_config_file(Some(file.path()));
        assert!(config.server.port.is_none());
        assert!(config.mesh.is_none());
    }

    #[test]
    fn missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_file(Some(&dir.path().join("absent.toml")));
        assert!(config.server.port.is_none());
    }
}
