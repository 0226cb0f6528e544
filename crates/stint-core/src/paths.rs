//! Standard paths used by stint

use std::path::{Path, PathBuf};

/// Name of the per-directory session store file
pub const SESSION_FILE: &str = ".stint-sessions.json";

/// Standard stint paths
pub struct Paths {
    /// Config directory (~/.config/stint)
    pub config: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

impl Paths {
    pub fn new() -> Self {
        let config = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("stint");

        Self { config }
    }

    /// Paths rooted at an explicit config directory
    pub fn with_config_dir(config: impl Into<PathBuf>) -> Self {
        Self {
            config: config.into(),
        }
    }

    /// Get the config file path
    pub fn config_file(&self) -> PathBuf {
        self.config.join("config.json")
    }
}

/// Get the session store file for a working directory
pub fn session_file(dir: &Path) -> PathBuf {
    dir.join(SESSION_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_file_under_config_dir() {
        let paths = Paths::with_config_dir("/tmp/cfg/stint");
        assert_eq!(paths.config_file(), PathBuf::from("/tmp/cfg/stint/config.json"));
    }

    #[test]
    fn test_session_file_is_per_directory() {
        let file = session_file(Path::new("/work/project"));
        assert_eq!(file, PathBuf::from("/work/project/.stint-sessions.json"));
    }
}
