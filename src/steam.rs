use directories::BaseDirs;
use std::{
    fs,
    path::{Path, PathBuf},
};

pub const USERDATA_DIR: &str = "userdata";
pub const CONFIG_DIR: &str = "config";
pub const SHORTCUTS_FILE: &str = "shortcuts.vdf";

/// On-disk layout of a Steam installation, rooted at the directory holding
/// `userdata/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SteamLayout {
    root: PathBuf,
}

impl SteamLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// First of the usual Linux install locations that looks like a Steam root.
    pub fn detect() -> Option<Self> {
        let home = BaseDirs::new()?.home_dir().to_path_buf();
        let candidates = [
            home.join(".local/share/Steam"),
            home.join(".steam/steam"),
            home.join(".steam/root"),
            home.join(".var/app/com.valvesoftware.Steam/.local/share/Steam"),
        ];
        candidates
            .into_iter()
            .find(|candidate| looks_like_steam_root(candidate))
            .map(Self::new)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn userdata_dir(&self) -> PathBuf {
        self.root.join(USERDATA_DIR)
    }

    pub fn shortcuts_path(&self, user_id: &str) -> PathBuf {
        self.userdata_dir()
            .join(user_id)
            .join(CONFIG_DIR)
            .join(SHORTCUTS_FILE)
    }

    /// Numeric account directories under `userdata/`, sorted.
    pub fn user_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        let Ok(entries) = fs::read_dir(self.userdata_dir()) else {
            return ids;
        };
        for entry in entries.flatten() {
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if name.is_empty() || !name.chars().all(|ch| ch.is_ascii_digit()) {
                continue;
            }
            // "0" is the anonymous account Steam creates before login.
            if name == "0" {
                continue;
            }
            ids.push(name);
        }
        ids.sort();
        ids
    }
}

pub fn looks_like_steam_root(path: &Path) -> bool {
    path.join(USERDATA_DIR).is_dir()
}
