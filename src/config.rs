use color_eyre::eyre::{self, WrapErr};
use std::path::PathBuf;
use validator::Validate;

/// Runtime configuration, read from env variables with a .env fallback.
#[derive(Clone, Debug, Validate)]
pub struct Config {
    /// Address the server binds, `host:port`.
    pub web_url: String,
    /// Dolphin executable to spawn for start/stop commands.
    pub dolphin_path: PathBuf,
    /// Directory holding the per-player controller FIFOs.
    pub pipe_dir: PathBuf,
    /// Player slots available to browsers.
    #[validate(range(min = 1, max = 8))]
    pub max_clients: usize,
}

impl Config {
    /// Read the configs from Env Variables and then fall back to the .env
    /// file, with defaults matching a stock Linux Dolphin setup.
    pub fn load() -> eyre::Result<Config> {
        let max_clients = match env_var("MAX_CLIENTS") {
            Some(value) => value
                .parse()
                .wrap_err("MAX_CLIENTS must be a whole number")?,
            None => 4,
        };

        let config = Config {
            web_url: env_var("WEB_URL").unwrap_or_else(|| "0.0.0.0:8765".to_string()),
            dolphin_path: env_var("DOLPHIN_PATH")
                .unwrap_or_else(|| "/usr/bin/dolphin-emu".to_string())
                .into(),
            pipe_dir: env_var("PIPE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(default_pipe_dir),
            max_clients,
        };

        config.validate().wrap_err("invalid configuration")?;

        Ok(config)
    }

    /// FIFO carrying input for one player slot.
    pub fn player_pipe(&self, player: u8) -> PathBuf {
        self.pipe_dir.join(format!("pad{player}"))
    }
}

/// Read one config var from the environment and then fall back to the .env
/// file.
fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().or_else(|| dotenvy::var(key).ok())
}

/// Dolphin's pipe directory for a stock Linux install.
fn default_pipe_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".local/share/dolphin-emu/Pipes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn test_config() -> Config {
        Config {
            web_url: "127.0.0.1:8765".to_string(),
            dolphin_path: "/usr/bin/dolphin-emu".into(),
            pipe_dir: "/tmp/pipes".into(),
            max_clients: 4,
        }
    }

    /// Test pipe paths per player slot
    #[test]
    fn test_player_pipe() {
        let config = test_config();

        assert_eq!(config.player_pipe(1), PathBuf::from("/tmp/pipes/pad1"));
        assert_eq!(config.player_pipe(4), PathBuf::from("/tmp/pipes/pad4"));
    }

    /// Test the max_clients bounds
    #[test]
    fn test_max_clients_validation() {
        let mut config = test_config();
        assert!(config.validate().is_ok());

        config.max_clients = 0;
        assert!(config.validate().is_err());

        config.max_clients = 9;
        assert!(config.validate().is_err());

        config.max_clients = 8;
        assert!(config.validate().is_ok());
    }
}
