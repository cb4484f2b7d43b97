use crate::{
    backup::{BackupManager, DEFAULT_RETENTION},
    shortcuts::Encoding,
    steam::{self, SteamLayout},
};
use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

const CONFIG_FILE: &str = "config.json";
const BACKUPS_DIR: &str = "backups";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(skip)]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub steam_root: Option<PathBuf>,
    #[serde(default)]
    pub default_encoding: Encoding,
    #[serde(default = "default_retention")]
    pub backup_retention: usize,
}

impl AppConfig {
    pub fn load_or_create() -> Result<Self> {
        let base_dir = base_data_dir()?;
        Self::load_or_create_in(&base_dir)
    }

    pub fn load_or_create_in(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir).context("create app data dir")?;
        let path = data_dir.join(CONFIG_FILE);
        if path.exists() {
            let raw = fs::read_to_string(&path).context("read app config")?;
            let mut config: AppConfig = serde_json::from_str(&raw).context("parse app config")?;
            config.data_dir = data_dir.to_path_buf();
            config.backup_retention = config.backup_retention.max(1);
            if config.steam_root.is_none() {
                if let Some(layout) = SteamLayout::detect() {
                    config.steam_root = Some(layout.root().to_path_buf());
                    config.save()?;
                }
            }
            return Ok(config);
        }

        let config = AppConfig {
            data_dir: data_dir.to_path_buf(),
            steam_root: SteamLayout::detect().map(|layout| layout.root().to_path_buf()),
            default_encoding: Encoding::default(),
            backup_retention: DEFAULT_RETENTION,
        };
        config.save()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir).context("create app data dir")?;
        let path = self.data_dir.join(CONFIG_FILE);
        let raw = serde_json::to_string_pretty(self).context("serialize app config")?;
        fs::write(path, raw).context("write app config")?;
        Ok(())
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.data_dir.join(BACKUPS_DIR)
    }

    pub fn steam_layout(&self) -> Option<SteamLayout> {
        self.steam_root
            .as_ref()
            .filter(|root| steam::looks_like_steam_root(root))
            .map(SteamLayout::new)
    }

    pub fn backup_manager(&self) -> BackupManager {
        let manager = BackupManager::new(self.backups_dir()).with_retention(self.backup_retention);
        match self.steam_layout() {
            Some(layout) => manager.with_layout(layout),
            None => manager,
        }
    }
}

fn default_retention() -> usize {
    DEFAULT_RETENTION
}

pub fn base_data_dir() -> Result<PathBuf> {
    let base = BaseDirs::new().context("resolve home dir")?;
    Ok(base.data_local_dir().join("shortcutsmith"))
}
