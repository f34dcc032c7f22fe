use log::warn;
use serde::Deserialize;
use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "poa_forms.toml";
pub const DEFAULT_PUBLIC_URL: &str = "https://ashrafsholok.github.io/consulate/";

#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct AppConfig {
    pub catalog: CatalogConfig,
    pub output: OutputConfig,
    pub server: ServerConfig,
    pub qr: QrConfig,
    pub letterhead: Letterhead,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CatalogConfig {
    pub path: PathBuf,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    /// Send documents from the terminal surface to the printer.
    pub print: bool,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct QrConfig {
    pub public_url: String,
    pub dir: PathBuf,
}

/// Heading lines printed above every document.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Letterhead {
    pub title: String,
    pub subtitle: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("poa_types.json"),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("documents"),
            print: true,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl Default for QrConfig {
    fn default() -> Self {
        Self {
            public_url: DEFAULT_PUBLIC_URL.to_string(),
            dir: PathBuf::from("."),
        }
    }
}

impl Default for Letterhead {
    fn default() -> Self {
        Self {
            title: "Government Office".to_string(),
            subtitle: "Power of Attorney & Visa Services".to_string(),
        }
    }
}

impl AppConfig {
    /// Reads the TOML config file. A missing file silently yields defaults; an
    /// unreadable or malformed one logs a warning and yields defaults.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(raw) => match toml::from_str::<AppConfig>(&raw) {
                Ok(config) => config,
                Err(e) => {
                    warn!(
                        "Could not parse '{}' ({}). Using defaults.",
                        path.display(),
                        e
                    );
                    AppConfig::default()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => AppConfig::default(),
            Err(e) => {
                warn!(
                    "Could not read '{}' ({}). Using defaults.",
                    path.display(),
                    e
                );
                AppConfig::default()
            }
        }
    }

    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("POA_CATALOG") {
            self.catalog.path = PathBuf::from(path);
        }
        if let Some(dir) = lookup("POA_OUTPUT_DIR") {
            self.output.dir = PathBuf::from(dir);
        }
        if let Some(host) = lookup("POA_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("POA_PORT") {
            match port.trim().parse::<u16>() {
                Ok(p) => self.server.port = p,
                Err(_) => warn!("Ignoring invalid POA_PORT value '{}'", port),
            }
        }
        if let Some(url) = lookup("POA_PUBLIC_URL") {
            self.qr.public_url = url;
        }
    }
}
