//! Configuration management for the mesh gateway
//!
//! Values are layered: built-in defaults, then the TOML file, then
//! `MESHGW_*` environment variables.

pub mod file;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use crate::diagnostics::cache::DEFAULT_RESET_TIMEOUT;
use crate::diagnostics::engine::DEFAULT_COLLECT_TIMEOUT;
use crate::mesh::SimTopology;
use crate::{Error, Result};

use self::file::GatewayConfigFile;

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 8081;

/// Default transport wait before answering 408
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default completion poller period
pub const DEFAULT_TICK: Duration = Duration::from_millis(50);

/// Mesh gateway configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// Diagnostic aggregation timing
    pub diagnostics: DiagnosticsConfig,

    /// Layout of the simulated mesh
    pub mesh: SimTopology,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind
    pub listen: IpAddr,

    /// Port to bind
    pub port: u16,

    /// How long the transport waits for the event loop before answering 408
    pub request_timeout: Duration,

    /// Completion poller period
    pub tick: Duration,
}

impl ServerConfig {
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            tick: DEFAULT_TICK,
        }
    }
}

/// Diagnostic aggregation timing
#[derive(Debug, Clone, Copy)]
pub struct DiagnosticsConfig {
    /// Collection window per request
    pub collect_timeout: Duration,

    /// Age at which cached records are evicted
    pub reset_timeout: Duration,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            collect_timeout: DEFAULT_COLLECT_TIMEOUT,
            reset_timeout: DEFAULT_RESET_TIMEOUT,
        }
    }
}

impl Config {
    /// Load configuration from the config file and the process environment
    ///
    /// `path` overrides the standard config file location.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the resulting timing is inconsistent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let fc = file::load_config_file(path);
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Layer `env` over `fc` over the defaults
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the listen address is malformed, the
    /// reset timeout does not exceed the collect timeout, or the request
    /// timeout would cut diagnostics rounds short.
    pub fn from_sources(
        fc: GatewayConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let defaults = Self::default();

        // Server config (env > toml > default)
        let listen = match env("MESHGW_LISTEN").or(fc.server.listen) {
            Some(text) => text
                .parse()
                .map_err(|e| Error::Config(format!("invalid listen address {text:?}: {e}")))?,
            None => defaults.server.listen,
        };
        let server = ServerConfig {
            listen,
            port: parse_env(&env, "MESHGW_PORT")
                .or(fc.server.port)
                .unwrap_or(defaults.server.port),
            request_timeout: parse_env(&env, "MESHGW_REQUEST_TIMEOUT_MS")
                .or(fc.server.request_timeout_ms)
                .map_or(defaults.server.request_timeout, Duration::from_millis),
            tick: parse_env(&env, "MESHGW_TICK_MS")
                .or(fc.server.tick_ms)
                .map_or(defaults.server.tick, Duration::from_millis),
        };

        // Diagnostics config (env > toml > default)
        let diagnostics = DiagnosticsConfig {
            collect_timeout: parse_env(&env, "MESHGW_DIAG_COLLECT_MS")
                .or(fc.diagnostics.collect_timeout_ms)
                .map_or(defaults.diagnostics.collect_timeout, Duration::from_millis),
            reset_timeout: parse_env(&env, "MESHGW_DIAG_RESET_MS")
                .or(fc.diagnostics.reset_timeout_ms)
                .map_or(defaults.diagnostics.reset_timeout, Duration::from_millis),
        };
        if diagnostics.reset_timeout <= diagnostics.collect_timeout {
            return Err(Error::Config(format!(
                "diagnostics reset timeout ({:?}) must exceed the collect timeout ({:?})",
                diagnostics.reset_timeout, diagnostics.collect_timeout
            )));
        }
        if server.tick.is_zero() {
            return Err(Error::Config("server tick must be non-zero".to_string()));
        }
        // a diagnostics round completes on the first tick after its window
        if server.request_timeout <= diagnostics.collect_timeout + server.tick {
            return Err(Error::Config(format!(
                "request timeout ({:?}) must exceed the diagnostics collect timeout ({:?}) plus one tick ({:?})",
                server.request_timeout, diagnostics.collect_timeout, server.tick
            )));
        }

        Ok(Self {
            server,
            diagnostics,
            mesh: fc.mesh.unwrap_or(defaults.mesh),
        })
    }
}

/// Parse `key` from `env`, warning about and ignoring malformed values
fn parse_env<T: std::str::FromStr>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let value = env(key)?;
    value.parse().map_or_else(
        |_| {
            tracing::warn!(key, value = %value, "ignoring malformed environment value");
            None
        },
        Some,
    )
}
