// Configuration module entry point
// Loads layered configuration and resolves the image location

mod state;
mod types;

use config::builder::{ConfigBuilder, DefaultState};
use config::ConfigError;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::error::ServerError;
use crate::logger::{AccessLogFormat, Level};

// Re-export public types
pub use state::AppState;
pub use types::{
    Config, HealthConfig, HttpConfig, ImageConfig, LoggingConfig, PerformanceConfig, ServerConfig,
};

/// Default location of the firmware build artefact, relative to the application directory
pub const DEFAULT_IMAGE_PATH: &str = "../../build/wifi_smartconfig_test.bin";

/// Resolved image location, fixed for the lifetime of the process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSource {
    pub route: String,
    pub path: PathBuf,
}

impl Config {
    /// Load configuration from specified file path (without extension)
    ///
    /// The file is optional. `OTA__SECTION__KEY` environment variables override it.
    pub fn load_from(config_path: &str) -> Result<Self, ConfigError> {
        Self::from_builder(
            config::Config::builder()
                .add_source(config::File::with_name(config_path).required(false))
                .add_source(
                    config::Environment::with_prefix("OTA")
                        .separator("__")
                        .try_parsing(true),
                ),
        )
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let settings = builder
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("image.route", "/image.bin")?
            .set_default("image.path", DEFAULT_IMAGE_PATH)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "combined")?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("http.server_name", "ota-image-server")?
            .set_default("http.enable_cors", false)?
            .build()?;

        let cfg: Self = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.image.route.starts_with('/') {
            return Err(ConfigError::Message(format!(
                "image.route must start with '/': {}",
                self.image.route
            )));
        }
        if self.image.path.trim().is_empty() {
            return Err(ConfigError::Message("image.path must not be empty".to_string()));
        }
        self.logging
            .level
            .parse::<Level>()
            .map_err(ConfigError::Message)?;
        self.logging
            .access_log_format
            .parse::<AccessLogFormat>()
            .map_err(ConfigError::Message)?;
        Ok(())
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, ServerError> {
        let addr = format!("{}:{}", self.server.host, self.server.port);
        addr.parse()
            .map_err(|source| ServerError::Address { addr, source })
    }

    /// Resolve the image file against `app_dir` unless a root is configured
    ///
    /// An absolute `image.path` wins over any root.
    pub fn image_source(&self, app_dir: &Path) -> ImageSource {
        let root = self
            .image
            .root
            .as_deref()
            .map_or_else(|| app_dir.to_path_buf(), PathBuf::from);

        ImageSource {
            route: self.image.route.clone(),
            path: root.join(&self.image.path),
        }
    }
}

/// Directory containing the running executable
pub fn application_dir() -> Result<PathBuf, ServerError> {
    let exe = std::env::current_exe().map_err(ServerError::AppDir)?;
    exe.parent().map(Path::to_path_buf).ok_or_else(|| {
        ServerError::AppDir(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("executable has no parent directory: {}", exe.display()),
        ))
    })
}

#[cfg(test)]
impl Config {
    /// Build a config from inline TOML layered over the defaults
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        Self::from_builder(
            config::Config::builder()
                .add_source(config::File::from_str(toml, config::FileFormat::Toml)),
        )
    }
}
