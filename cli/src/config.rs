use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

pub const DEFAULT_DISTANCE_URL: &str = "https://maps.googleapis.com/maps/api/distancematrix/json";

pub struct Config {
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
    pub distance_url: String,
    pub maps_api_key: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "korjournal").context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        Ok(Self::resolve(
            &data_dir,
            std::env::var("KORJOURNAL_DB").ok(),
            std::env::var("KORJOURNAL_DISTANCE_URL").ok(),
            std::env::var("GOOGLE_MAPS_API_KEY").ok(),
        ))
    }

    /// Apply environment overrides on top of the data directory defaults.
    fn resolve(
        data_dir: &Path,
        db: Option<String>,
        distance_url: Option<String>,
        api_key: Option<String>,
    ) -> Self {
        let non_empty =
            |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        let db_path = non_empty(db).map_or_else(|| data_dir.join("korjournal.db"), PathBuf::from);
        let distance_url =
            non_empty(distance_url).unwrap_or_else(|| DEFAULT_DISTANCE_URL.to_string());

        Config {
            db_path,
            data_dir: data_dir.to_path_buf(),
            distance_url,
            maps_api_key: non_empty(api_key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_defaults() {
        let config = Config::resolve(Path::new("/data"), None, None, None);
        assert_eq!(config.db_path, PathBuf::from("/data/korjournal.db"));
        assert_eq!(config.distance_url, DEFAULT_DISTANCE_URL);
        assert!(config.maps_api_key.is_none());
    }

    #[test]
    fn test_resolve_overrides() {
        let config = Config::resolve(
            Path::new("/data"),
            Some("/tmp/other.db".to_string()),
            Some("http://localhost:9000/distance".to_string()),
            Some("  ".to_string()),
        );
        assert_eq!(config.db_path, PathBuf::from("/tmp/other.db"));
        assert_eq!(config.distance_url, "http://localhost:9000/distance");
        assert!(config.maps_api_key.is_none());
    }
}
