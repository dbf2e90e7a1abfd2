use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tessera_net::DEFAULT_DIAL_TIMEOUT;
use tessera_store::DEFAULT_PIECE_SIZE;

/// Node configuration, layered the same way as the rest of the ambient stack: built-in
/// defaults, then an optional persisted TOML file, then CLI flags/environment override
/// whatever the caller supplies on top (see [`crate::cli::Cli`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Address this node's server listens on.
    pub listen_addr: String,
    /// Directory holding the hash-tree database and piece files.
    pub data_dir: PathBuf,
    /// Byte size of a piece slot in the piece store.
    pub piece_size: usize,
    /// Seconds to wait for a dial before treating a host as unreachable.
    pub dial_timeout_secs: u64,
}

impl Config {
    pub const DEFAULT_LISTEN_ADDR: &'static str = "0.0.0.0:4040";

    /// Reads the config file at the default per-user location, creating it with built-in
    /// defaults on first run.
    pub fn create_or_read_default() -> anyhow::Result<(PathBuf, Self)> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("failed to compute config dir"))?
            .join(env!("CARGO_PKG_NAME"));

        fs::create_dir_all(&config_dir).ok();

        let path = config_dir.join("config.toml");

        if path.is_file() {
            return Self::from_path(&path);
        } else if path.exists() {
            anyhow::bail!("the config path `{}` is not a regular file", path.display());
        }

        let data_dir = dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(env!("CARGO_PKG_NAME"));

        let slf = Self {
            listen_addr: Self::DEFAULT_LISTEN_ADDR.to_string(),
            data_dir,
            piece_size: DEFAULT_PIECE_SIZE,
            dial_timeout_secs: DEFAULT_DIAL_TIMEOUT.as_secs(),
        };

        fs::write(&path, toml::to_string(&slf)?)?;

        Ok((path, slf))
    }

    /// Reads and parses a config file at an explicit path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<(PathBuf, Self)> {
        let toml_str = fs::read_to_string(path.as_ref())?;

        Ok((path.as_ref().to_path_buf(), toml::from_str(&toml_str)?))
    }

    /// Applies CLI-flag overrides on top of the loaded config. `None` leaves the field as-is.
    pub fn with_overrides(mut self, listen_addr: Option<String>, data_dir: Option<PathBuf>) -> Self {
        if let Some(listen_addr) = listen_addr {
            self.listen_addr = listen_addr;
        }

        if let Some(data_dir) = data_dir {
            self.data_dir = data_dir;
        }

        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_toml() {
        let config = Config {
            listen_addr: "127.0.0.1:9000".to_string(),
            data_dir: PathBuf::from("/tmp/tessera-test"),
            piece_size: 1024,
            dial_timeout_secs: 5,
        };

        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed, config);
    }

    #[test]
    fn overrides_replace_only_the_fields_given() {
        let config = Config {
            listen_addr: "127.0.0.1:9000".to_string(),
            data_dir: PathBuf::from("/tmp/a"),
            piece_size: 1024,
            dial_timeout_secs: 5,
        };

        let overridden = config.clone().with_overrides(Some("0.0.0.0:1".to_string()), None);

        assert_eq!(overridden.listen_addr, "0.0.0.0:1");
        assert_eq!(overridden.data_dir, config.data_dir);
    }
}
