//! Config path resolution
//!
//! The config file is found through the `PALIMPSEST_CONFIG` environment
//! variable, falling back to `palimpsest.toml` in the working directory.

use std::path::PathBuf;

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "PALIMPSEST_CONFIG";

/// Default config file name
pub const DEFAULT_CONFIG_FILE: &str = "palimpsest.toml";

/// Returns the config file path.
pub fn config_path() -> PathBuf {
    resolve(std::env::var_os(CONFIG_ENV).map(PathBuf::from))
}

fn resolve(from_env: Option<PathBuf>) -> PathBuf {
    match from_env {
        Some(path) if !path.as_os_str().is_empty() => path,
        _ => PathBuf::from(DEFAULT_CONFIG_FILE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_override() {
        let path = resolve(Some(PathBuf::from("/etc/palimpsest/orm.toml")));
        assert!(path.ends_with("palimpsest/orm.toml"));
    }

    #[test]
    fn test_default_file() {
        assert_eq!(resolve(None), PathBuf::from("palimpsest.toml"));
        assert_eq!(resolve(Some(PathBuf::new())), PathBuf::from("palimpsest.toml"));
    }
}
