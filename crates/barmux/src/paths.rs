use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::error::ConfigError;

/// Stores references to all the paths relevant to barmux
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarmuxPaths {
    pub config_file: PathBuf,
}

impl BarmuxPaths {
    pub fn from_config_file<P: AsRef<Path>>(config_file: P) -> Result<Self> {
        let config_file = config_file.as_ref();
        if config_file.is_dir() {
            return Err(ConfigError::IsDirectory(config_file.to_path_buf()).into());
        }
        Ok(BarmuxPaths { config_file: config_file.to_path_buf() })
    }

    /// `$XDG_CONFIG_HOME/barmux/config.json`, falling back to `~/.config/barmux/config.json`.
    pub fn default() -> Result<Self> {
        let config_home = match std::env::var_os("XDG_CONFIG_HOME").filter(|dir| !dir.is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => PathBuf::from(std::env::var_os("HOME").context("Neither XDG_CONFIG_HOME nor HOME is set")?).join(".config"),
        };
        Self::from_config_file(config_home.join("barmux").join("config.json"))
    }

    pub fn get_config_file(&self) -> &Path {
        self.config_file.as_path()
    }
}

impl std::fmt::Display for BarmuxPaths {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "config-file: {}", self.config_file.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_directories() {
        let err = BarmuxPaths::from_config_file(std::env::temp_dir()).unwrap_err();
        assert!(matches!(err.downcast_ref::<ConfigError>(), Some(ConfigError::IsDirectory(_))));
        assert_eq!(crate::error_handling_ctx::exit_code(&err), crate::error_handling_ctx::EXIT_CONFIG_ERROR);
        let paths = BarmuxPaths::from_config_file("/nonexistent/config.json").unwrap();
        assert_eq!(paths.get_config_file(), Path::new("/nonexistent/config.json"));
    }
}
