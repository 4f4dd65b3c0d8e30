use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_institute_name() -> String {
    "My Institute".to_string()
}
fn default_report_window_days() -> u32 {
    30
}
fn default_bar_width() -> usize {
    20
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstituteConfig {
    #[serde(default = "default_institute_name")]
    pub name: String,
}

impl Default for InstituteConfig {
    fn default() -> Self {
        Self {
            name: default_institute_name(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceConfig {
    /// Days covered by `attendance report` when --from is not given.
    #[serde(default = "default_report_window_days")]
    pub report_window_days: u32,
}

impl Default for AttendanceConfig {
    fn default() -> Self {
        Self {
            report_window_days: default_report_window_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_true")]
    pub color: bool,
    #[serde(default = "default_bar_width")]
    pub bar_width: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            color: true,
            bar_width: default_bar_width(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub institute: InstituteConfig,
    #[serde(default)]
    pub attendance: AttendanceConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

impl AppConfig {
    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("", "", "rollbook")
            .context("Could not determine project directories")
    }

    /// `ROLLBOOK_CONFIG` overrides the platform config location.
    pub fn config_path() -> Result<PathBuf> {
        if let Some(path) = std::env::var_os("ROLLBOOK_CONFIG") {
            return Ok(PathBuf::from(path));
        }
        let dirs = Self::project_dirs()?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// `ROLLBOOK_DATA_DIR` overrides the platform data location.
    pub fn data_dir() -> Result<PathBuf> {
        if let Some(dir) = std::env::var_os("ROLLBOOK_DATA_DIR") {
            return Ok(PathBuf::from(dir));
        }
        let dirs = Self::project_dirs()?;
        Ok(dirs.data_dir().to_path_buf())
    }

    pub fn db_path() -> Result<PathBuf> {
        Ok(Self::data_dir()?.join("rollbook.db"))
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Missing file means defaults; a present but malformed file is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("no config at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let content =
            std::fs::read_to_string(path).with_context(|| format!("Reading {:?}", path))?;
        let config: AppConfig = toml::from_str(&content).context("Parsing config.toml")?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).context("Serializing config")?;
        std::fs::write(path, content).with_context(|| format!("Writing {:?}", path))?;
        Ok(())
    }

    /// Write the defaults out once so users have a file to edit.
    pub fn init_default() -> Result<PathBuf> {
        let path = Self::config_path()?;
        if !path.exists() {
            Self::default().save_to(&path)?;
            log::info!("wrote default config to {:?}", path);
        }
        Ok(path)
    }

    pub fn ensure_data_dir() -> Result<PathBuf> {
        let dir = Self::data_dir()?;
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}
