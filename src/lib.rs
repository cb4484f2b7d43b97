//! Reads and writes Steam's non-Steam game shortcut lists (`shortcuts.vdf`)
//! in the binary and text KeyValues encodings, and keeps bounded per-account
//! snapshots of the file so every overwrite can be undone.

pub mod backup;
pub mod checksum;
pub mod config;
pub mod error;
pub mod fsio;
pub mod keyvalues;
pub mod logging;
pub mod shortcuts;
pub mod steam;

pub use backup::{derive_identity_key, BackupManager, SnapshotInfo};
pub use checksum::{crc32, derive_shortcut_id, fingerprint, to_launch_game_id};
pub use error::{BackupError, KvError};
pub use keyvalues::{KvNode, KvValue};
pub use shortcuts::{
    read_shortcuts, read_shortcuts_binary, read_shortcuts_text, write_shortcuts,
    write_shortcuts_binary, write_shortcuts_text, Encoding, ShortcutRecord,
};
