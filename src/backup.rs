//! Timestamped snapshots of shortcut files, kept per Steam account.
//!
//! Layout: `<backups root>/<identity key>/<file name>.<YYYYMMDD-HHMMSS>.bak`.
//! Every overwrite of a shortcuts file, restores included, is preceded by a
//! snapshot, and each snapshot prunes its directory down to the retention
//! bound, newest first by modification time.

use crate::{
    checksum,
    error::{BackupError, BackupResult, KvResult},
    fsio,
    shortcuts::{self, Encoding, ShortcutRecord},
    steam::{SteamLayout, USERDATA_DIR},
};
use filetime::{set_file_mtime, FileTime};
use serde::Serialize;
use std::{
    fs, io,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};
use time::{macros::format_description, OffsetDateTime};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub const DEFAULT_RETENTION: usize = 5;
pub const DEFAULT_IDENTITY_KEY: &str = "default";
pub const SNAPSHOT_EXTENSION: &str = "bak";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotInfo {
    pub path: PathBuf,
    /// Unix seconds.
    pub modified: i64,
    pub size: u64,
    pub fingerprint: String,
}

#[derive(Debug, Clone)]
pub struct BackupManager {
    backups_root: PathBuf,
    layout: Option<SteamLayout>,
    retention: usize,
}

impl BackupManager {
    pub fn new(backups_root: impl Into<PathBuf>) -> Self {
        Self {
            backups_root: backups_root.into(),
            layout: None,
            retention: DEFAULT_RETENTION,
        }
    }

    /// Steam installation used to resolve the canonical file on restore.
    pub fn with_layout(mut self, layout: SteamLayout) -> Self {
        self.layout = Some(layout);
        self
    }

    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention.max(1);
        self
    }

    pub fn backups_root(&self) -> &Path {
        &self.backups_root
    }

    pub fn retention(&self) -> usize {
        self.retention
    }

    pub fn layout(&self) -> Option<&SteamLayout> {
        self.layout.as_ref()
    }

    pub fn snapshot_dir(&self, identity_key: &str) -> PathBuf {
        self.backups_root.join(identity_key)
    }

    pub fn canonical_path(&self, identity_key: &str) -> Option<PathBuf> {
        self.layout
            .as_ref()
            .map(|layout| layout.shortcuts_path(identity_key))
    }

    /// Copies `source` into the identity's snapshot directory and prunes old
    /// snapshots. A missing or empty source is skipped and yields `None`.
    pub fn snapshot(&self, source: &Path, identity_key: &str) -> BackupResult<Option<PathBuf>> {
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        self.snapshot_at(source, identity_key, now)
    }

    /// [`snapshot`](Self::snapshot) with an explicit timestamp for the name and mtime.
    pub fn snapshot_at(
        &self,
        source: &Path,
        identity_key: &str,
        at: OffsetDateTime,
    ) -> BackupResult<Option<PathBuf>> {
        let identity_key = checked_key(identity_key)?;
        let len = match fs::metadata(source) {
            Ok(meta) if meta.is_file() => meta.len(),
            _ => {
                debug!("snapshot skipped, no file at {}", source.display());
                return Ok(None);
            }
        };
        if len == 0 {
            debug!("snapshot skipped, {} is empty", source.display());
            return Ok(None);
        }

        let dir = self.snapshot_dir(identity_key);
        fs::create_dir_all(&dir)
            .map_err(|err| BackupError::io(format!("create {}", dir.display()), err))?;

        let dest = unique_snapshot_path(&dir, source, at);
        fs::copy(source, &dest).map_err(|err| {
            BackupError::io(
                format!("copy {} to {}", source.display(), dest.display()),
                err,
            )
        })?;
        if let Err(err) = verify_copy(source, &dest) {
            let _ = fs::remove_file(&dest);
            return Err(err);
        }

        // Copies keep the source mtime on some platforms; retention orders by it.
        let mtime = FileTime::from_unix_time(at.unix_timestamp(), at.nanosecond());
        if let Err(err) = set_file_mtime(&dest, mtime) {
            warn!("could not stamp {}: {err}", dest.display());
        }

        info!("snapshot {} -> {}", source.display(), dest.display());
        self.prune(&dir);
        Ok(Some(dest))
    }

    /// Snapshots for `identity_key`, newest first.
    pub fn list_snapshots(&self, identity_key: &str) -> BackupResult<Vec<SnapshotInfo>> {
        let identity_key = checked_key(identity_key)?;
        let dir = self.snapshot_dir(identity_key);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut snapshots = Vec::new();
        for (path, modified) in snapshot_entries(&dir)? {
            let bytes = fs::read(&path)
                .map_err(|err| BackupError::io(format!("read {}", path.display()), err))?;
            snapshots.push(SnapshotInfo {
                modified: unix_seconds(modified),
                size: bytes.len() as u64,
                fingerprint: checksum::fingerprint_bytes(&bytes),
                path,
            });
        }
        Ok(snapshots)
    }

    /// Copies `backup` over the canonical shortcuts file of `identity_key`,
    /// snapshotting the current file first. Returns the restored path.
    pub fn restore(&self, backup: &Path, identity_key: &str) -> BackupResult<PathBuf> {
        let identity_key = checked_key(identity_key)?;
        if !backup.is_file() {
            return Err(BackupError::MissingBackup {
                path: backup.to_path_buf(),
            });
        }
        let target =
            self.canonical_path(identity_key)
                .ok_or_else(|| BackupError::UnresolvedTarget {
                    identity_key: identity_key.to_string(),
                })?;

        // Read first: the pre-restore snapshot may prune `backup` itself.
        let contents = fs::read(backup)
            .map_err(|err| BackupError::io(format!("read {}", backup.display()), err))?;

        if target.exists() {
            self.snapshot(&target, identity_key)?;
        }
        fsio::write_atomic(&target, &contents)
            .map_err(|err| BackupError::io(format!("write {}", target.display()), err))?;

        info!("restored {} over {}", backup.display(), target.display());
        Ok(target)
    }

    /// Snapshots `target` (best effort) and writes `records` in text form.
    pub fn write_with_backup(&self, target: &Path, records: &[ShortcutRecord]) -> KvResult<()> {
        self.write_with_backup_as(target, records, Encoding::Text)
    }

    pub fn write_with_backup_as(
        &self,
        target: &Path,
        records: &[ShortcutRecord],
        encoding: Encoding,
    ) -> KvResult<()> {
        let identity_key = derive_identity_key(target);
        match self.snapshot(target, &identity_key) {
            Ok(Some(path)) => debug!("pre-write snapshot {}", path.display()),
            Ok(None) => {}
            Err(err) => warn!("pre-write snapshot of {} failed: {err}", target.display()),
        }
        shortcuts::write_shortcuts(target, records, encoding)?;
        info!(
            "wrote {} shortcut(s) to {} ({})",
            records.len(),
            target.display(),
            encoding.as_str()
        );
        Ok(())
    }

    fn prune(&self, dir: &Path) {
        self.prune_with(dir, |path| fs::remove_file(path));
    }

    /// Deletes everything past the retention bound. A failed removal is
    /// logged and the rest are still attempted.
    fn prune_with<F>(&self, dir: &Path, mut remove: F)
    where
        F: FnMut(&Path) -> io::Result<()>,
    {
        let entries = match snapshot_entries(dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("snapshot pruning skipped: {err}");
                return;
            }
        };
        for (path, _) in entries.into_iter().skip(self.retention) {
            match remove(&path) {
                Ok(()) => debug!("pruned snapshot {}", path.display()),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    debug!("snapshot {} already gone", path.display())
                }
                Err(err) => warn!("could not prune {}: {err}", path.display()),
            }
        }
    }
}

/// Steam account id taken from the path segment after `userdata`, matched
/// case-insensitively on either separator. Falls back to
/// [`DEFAULT_IDENTITY_KEY`].
pub fn derive_identity_key(path: &Path) -> String {
    derive_identity_key_str(&path.to_string_lossy())
}

pub fn derive_identity_key_str(path: &str) -> String {
    let mut segments = path.split(['/', '\\']);
    while let Some(segment) = segments.next() {
        if segment.eq_ignore_ascii_case(USERDATA_DIR) {
            return match segments.next() {
                Some(next) if checked_key(next).is_ok() => next.to_string(),
                _ => DEFAULT_IDENTITY_KEY.to_string(),
            };
        }
    }
    DEFAULT_IDENTITY_KEY.to_string()
}

fn checked_key(identity_key: &str) -> BackupResult<&str> {
    let invalid = identity_key.is_empty()
        || identity_key == "."
        || identity_key == ".."
        || identity_key.contains(['/', '\\', '\0']);
    if invalid {
        return Err(BackupError::InvalidIdentityKey {
            identity_key: identity_key.to_string(),
        });
    }
    Ok(identity_key)
}

/// Next free name for `at`. Same-second snapshots get a `-<n>` suffix one past
/// the highest already present, so a pruned suffix is never handed out again.
fn unique_snapshot_path(dir: &Path, source: &Path, at: OffsetDateTime) -> PathBuf {
    let file_name = source
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "snapshot".to_string());
    let stamp_format = format_description!("[year][month][day]-[hour][minute][second]");
    let stamp = at
        .format(&stamp_format)
        .unwrap_or_else(|_| format!("{}-0", at.unix_timestamp()));
    let base = format!("{file_name}.{stamp}");

    let highest = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let name = entry.file_name().to_str()?.to_string();
            let rest = name
                .strip_prefix(base.as_str())?
                .strip_suffix(SNAPSHOT_EXTENSION)?
                .strip_suffix('.')?;
            match rest {
                "" => Some(0),
                suffix => suffix.strip_prefix('-')?.parse::<u32>().ok(),
            }
        })
        .max();

    let name = match highest {
        None => format!("{base}.{SNAPSHOT_EXTENSION}"),
        Some(sequence) => format!("{base}-{}.{SNAPSHOT_EXTENSION}", sequence + 1),
    };
    dir.join(name)
}

/// Same-second counter parsed from `<file>.<YYYYMMDD-HHMMSS>[-<n>].bak`;
/// unsuffixed names are 0.
fn snapshot_sequence(path: &Path) -> u32 {
    let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
        return 0;
    };
    let stamp = stem.rsplit_once('.').map_or(stem, |(_, stamp)| stamp);
    stamp
        .splitn(3, '-')
        .nth(2)
        .and_then(|sequence| sequence.parse().ok())
        .unwrap_or(0)
}

fn verify_copy(source: &Path, dest: &Path) -> BackupResult<()> {
    let expected = fs::read(source)
        .map_err(|err| BackupError::io(format!("read {}", source.display()), err))?;
    let actual =
        fs::read(dest).map_err(|err| BackupError::io(format!("read {}", dest.display()), err))?;
    if checksum::crc32(&expected) != checksum::crc32(&actual) || expected.len() != actual.len() {
        return Err(BackupError::VerificationFailed {
            path: dest.to_path_buf(),
        });
    }
    Ok(())
}

/// Snapshot files directly inside `dir`, newest first. Equal mtimes fall back
/// to the same-second counter, then the name.
fn snapshot_entries(dir: &Path) -> BackupResult<Vec<(PathBuf, SystemTime)>> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry =
            entry.map_err(|err| BackupError::io(format!("list {}", dir.display()), err.into()))?;
        let path = entry.path();
        let is_snapshot = entry.file_type().is_file()
            && path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case(SNAPSHOT_EXTENSION))
                == Some(true);
        if !is_snapshot {
            continue;
        }
        // Vanished between listing and stat: another instance pruned it.
        let Some(modified) = entry.metadata().ok().and_then(|meta| meta.modified().ok()) else {
            continue;
        };
        entries.push((path.to_path_buf(), modified));
    }
    entries.sort_by(|a, b| {
        b.1.cmp(&a.1)
            .then_with(|| snapshot_sequence(&b.0).cmp(&snapshot_sequence(&a.0)))
            .then_with(|| b.0.cmp(&a.0))
    });
    Ok(entries)
}

fn unix_seconds(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(duration) => duration.as_secs() as i64,
        Err(err) => -(err.duration().as_secs() as i64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steam::SHORTCUTS_FILE;
    use tempfile::TempDir;
    use time::{macros::datetime, Duration};

    struct Fixture {
        _dir: TempDir,
        manager: BackupManager,
        steam_root: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let steam_root = dir.path().join("Steam");
        let manager = BackupManager::new(dir.path().join("backups"))
            .with_layout(SteamLayout::new(&steam_root));
        Fixture {
            _dir: dir,
            manager,
            steam_root,
        }
    }

    fn canonical(fixture: &Fixture, key: &str) -> PathBuf {
        fixture
            .steam_root
            .join(USERDATA_DIR)
            .join(key)
            .join("config")
            .join(SHORTCUTS_FILE)
    }

    fn write(path: &Path, contents: &[u8]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .flatten()
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn identity_key_follows_userdata_segment() {
        assert_eq!(
            derive_identity_key_str("C:/Steam/userdata/123456789/config/shortcuts.vdf"),
            "123456789"
        );
        assert_eq!(
            derive_identity_key_str("C:\\Steam\\UserData\\42\\config\\shortcuts.vdf"),
            "42"
        );
        assert_eq!(
            derive_identity_key(Path::new("/home/me/.steam/steam/userdata/7/config/shortcuts.vdf")),
            "7"
        );
    }

    #[test]
    fn identity_key_defaults_without_marker() {
        assert_eq!(
            derive_identity_key_str("/tmp/shortcuts.vdf"),
            DEFAULT_IDENTITY_KEY
        );
        assert_eq!(derive_identity_key_str("/Steam/userdata"), DEFAULT_IDENTITY_KEY);
        assert_eq!(derive_identity_key_str("/Steam/userdata/"), DEFAULT_IDENTITY_KEY);
        assert_eq!(derive_identity_key_str("/Steam/userdata/../x"), DEFAULT_IDENTITY_KEY);
        assert_eq!(derive_identity_key_str(""), DEFAULT_IDENTITY_KEY);
    }

    #[test]
    fn snapshot_skips_missing_and_empty_sources() {
        let fx = fixture();
        let missing = fx.steam_root.join("nothing.vdf");
        assert_eq!(fx.manager.snapshot(&missing, "1").unwrap(), None);

        let empty = fx.steam_root.join("empty.vdf");
        write(&empty, b"");
        assert_eq!(fx.manager.snapshot(&empty, "1").unwrap(), None);
        assert!(!fx.manager.snapshot_dir("1").exists());
    }

    #[test]
    fn snapshot_copies_content_and_stamps_name() {
        let fx = fixture();
        let source = canonical(&fx, "1");
        write(&source, b"payload");
        let at = datetime!(2026-03-04 05:06:07 UTC);
        let path = fx.manager.snapshot_at(&source, "1", at).unwrap().unwrap();
        assert_eq!(
            path.file_name().unwrap().to_string_lossy(),
            "shortcuts.vdf.20260304-050607.bak"
        );
        assert_eq!(fs::read(&path).unwrap(), b"payload");
        let modified = FileTime::from_last_modification_time(&fs::metadata(&path).unwrap());
        assert_eq!(modified.unix_seconds(), at.unix_timestamp());
    }

    #[test]
    fn same_second_snapshots_get_distinct_names() {
        let fx = fixture();
        let source = canonical(&fx, "1");
        write(&source, b"payload");
        let at = datetime!(2026-03-04 05:06:07 UTC);
        let first = fx.manager.snapshot_at(&source, "1", at).unwrap().unwrap();
        let second = fx.manager.snapshot_at(&source, "1", at).unwrap().unwrap();
        assert_ne!(first, second);
        assert!(second.to_string_lossy().ends_with("-050607-1.bak"));
    }

    #[test]
    fn retention_keeps_five_most_recent() {
        let fx = fixture();
        let source = canonical(&fx, "123");
        let base = datetime!(2026-01-01 10:00:00 UTC);
        let mut created = Vec::new();
        for index in 0..7 {
            write(&source, format!("version {index}").as_bytes());
            let at = base + Duration::minutes(index);
            created.push(fx.manager.snapshot_at(&source, "123", at).unwrap().unwrap());
        }

        let dir = fx.manager.snapshot_dir("123");
        let mut expected: Vec<String> = created[2..]
            .iter()
            .map(|path| path.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        expected.sort();
        assert_eq!(file_names(&dir), expected);

        let listed = fx.manager.list_snapshots("123").unwrap();
        assert_eq!(listed.len(), 5);
        assert_eq!(listed[0].path, created[6]);
        assert_eq!(listed[4].path, created[2]);
        assert_eq!(listed[0].fingerprint, checksum::fingerprint("version 6"));
        assert_eq!(listed[0].size, "version 6".len() as u64);
    }

    #[test]
    fn same_timestamp_retention_keeps_latest_versions() {
        let fx = fixture();
        let source = canonical(&fx, "1");
        let at = datetime!(2026-01-01 10:00:00 UTC);
        let mut last = PathBuf::new();
        for index in 0..7 {
            write(&source, format!("version {index}").as_bytes());
            last = fx.manager.snapshot_at(&source, "1", at).unwrap().unwrap();
        }
        assert!(last.to_string_lossy().ends_with("-100000-6.bak"));

        let kept: Vec<String> = fx
            .manager
            .list_snapshots("1")
            .unwrap()
            .iter()
            .map(|snapshot| String::from_utf8(fs::read(&snapshot.path).unwrap()).unwrap())
            .collect();
        assert_eq!(
            kept,
            ["version 6", "version 5", "version 4", "version 3", "version 2"]
        );
    }

    #[test]
    fn same_second_counter_orders_numerically() {
        let dir = Path::new("/backups/1");
        assert_eq!(snapshot_sequence(&dir.join("shortcuts.vdf.20260101-100000.bak")), 0);
        assert_eq!(snapshot_sequence(&dir.join("shortcuts.vdf.20260101-100000-9.bak")), 9);
        assert_eq!(snapshot_sequence(&dir.join("shortcuts.vdf.20260101-100000-10.bak")), 10);
        assert_eq!(snapshot_sequence(&dir.join("stray.bak")), 0);
    }

    #[test]
    fn prune_continues_past_failed_removal() {
        let fx = fixture();
        let manager = fx.manager.clone().with_retention(10);
        let source = canonical(&fx, "5");
        let base = datetime!(2026-01-01 10:00:00 UTC);
        let mut created = Vec::new();
        for index in 0..7 {
            write(&source, format!("version {index}").as_bytes());
            let at = base + Duration::minutes(index);
            created.push(manager.snapshot_at(&source, "5", at).unwrap().unwrap());
        }

        let stuck = created[2].clone();
        let mut attempted = Vec::new();
        fx.manager.clone().with_retention(3).prune_with(
            &manager.snapshot_dir("5"),
            |path| {
                attempted.push(path.to_path_buf());
                if path == stuck.as_path() {
                    Err(io::Error::new(io::ErrorKind::PermissionDenied, "locked"))
                } else {
                    fs::remove_file(path)
                }
            },
        );

        assert_eq!(
            attempted,
            vec![
                created[3].clone(),
                created[2].clone(),
                created[1].clone(),
                created[0].clone()
            ]
        );
        let remaining: Vec<PathBuf> = manager
            .list_snapshots("5")
            .unwrap()
            .into_iter()
            .map(|snapshot| snapshot.path)
            .collect();
        assert_eq!(
            remaining,
            vec![
                created[6].clone(),
                created[5].clone(),
                created[4].clone(),
                created[2].clone()
            ]
        );

        // The stuck file does not get in the way of the next snapshot.
        write(&source, b"version 7");
        let next = fx
            .manager
            .clone()
            .with_retention(3)
            .snapshot_at(&source, "5", base + Duration::minutes(10))
            .unwrap();
        assert!(next.is_some());
    }

    #[test]
    fn retention_is_configurable_and_ignores_foreign_files() {
        let fx = fixture();
        let manager = fx.manager.clone().with_retention(2);
        let source = canonical(&fx, "9");
        write(&source, b"data");
        fs::create_dir_all(manager.snapshot_dir("9")).unwrap();
        fs::write(manager.snapshot_dir("9").join("notes.txt"), b"keep me").unwrap();
        let base = datetime!(2026-01-01 10:00:00 UTC);
        for index in 0..4 {
            manager
                .snapshot_at(&source, "9", base + Duration::seconds(index))
                .unwrap();
        }
        let names = file_names(&manager.snapshot_dir("9"));
        assert_eq!(names.len(), 3);
        assert!(names.contains(&"notes.txt".to_string()));
        assert_eq!(BackupManager::new("x").with_retention(0).retention(), 1);
    }

    #[test]
    fn restore_missing_backup_leaves_target_untouched() {
        let fx = fixture();
        let target = canonical(&fx, "5");
        write(&target, b"original bytes");
        let err = fx
            .manager
            .restore(&fx.steam_root.join("no-such.bak"), "5")
            .unwrap_err();
        assert!(matches!(err, BackupError::MissingBackup { .. }));
        assert_eq!(fs::read(&target).unwrap(), b"original bytes");
        assert!(!fx.manager.snapshot_dir("5").exists());
    }

    #[test]
    fn restore_without_layout_fails() {
        let dir = TempDir::new().unwrap();
        let backup = dir.path().join("one.bak");
        write(&backup, b"x");
        let manager = BackupManager::new(dir.path().join("backups"));
        let err = manager.restore(&backup, "5").unwrap_err();
        assert!(matches!(err, BackupError::UnresolvedTarget { .. }));
    }

    #[test]
    fn restore_rejects_path_like_keys() {
        let fx = fixture();
        let backup = fx.steam_root.join("one.bak");
        write(&backup, b"x");
        for key in ["", "..", "a/b", "a\\b"] {
            let err = fx.manager.restore(&backup, key).unwrap_err();
            assert!(matches!(err, BackupError::InvalidIdentityKey { .. }), "{key}");
        }
    }

    #[test]
    fn restore_snapshots_current_target_first() {
        let fx = fixture();
        let target = canonical(&fx, "5");
        write(&target, b"current");
        let backup = fx.steam_root.join("chosen.bak");
        write(&backup, b"older good state");

        let restored = fx.manager.restore(&backup, "5").unwrap();
        assert_eq!(restored, target);
        assert_eq!(fs::read(&target).unwrap(), b"older good state");

        let snapshots = fx.manager.list_snapshots("5").unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(fs::read(&snapshots[0].path).unwrap(), b"current");
    }

    #[test]
    fn restore_creates_missing_target_directory() {
        let fx = fixture();
        let backup = fx.steam_root.join("chosen.bak");
        write(&backup, b"state");
        let target = fx.manager.restore(&backup, "77").unwrap();
        assert_eq!(fs::read(target).unwrap(), b"state");
        assert!(fx.manager.list_snapshots("77").unwrap().is_empty());
    }

    #[test]
    fn restore_of_oldest_snapshot_survives_pruning() {
        let fx = fixture();
        let target = canonical(&fx, "3");
        // Older than any real clock, so the pre-restore snapshot is the newest.
        let base = datetime!(2001-01-01 10:00:00 UTC);
        for index in 0..5 {
            write(&target, format!("state {index}").as_bytes());
            fx.manager
                .snapshot_at(&target, "3", base + Duration::minutes(index))
                .unwrap();
        }
        write(&target, b"state now");
        let oldest = fx.manager.list_snapshots("3").unwrap().pop().unwrap();
        assert_eq!(fs::read(&oldest.path).unwrap(), b"state 0");

        fx.manager.restore(&oldest.path, "3").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"state 0");
        assert!(!oldest.path.exists());
        assert_eq!(fx.manager.list_snapshots("3").unwrap().len(), 5);
    }

    #[test]
    fn write_with_backup_snapshots_then_writes_text() {
        let fx = fixture();
        let target = canonical(&fx, "11");
        write(&target, b"previous contents");
        let records = vec![ShortcutRecord::new("Game", "/bin/game")];

        fx.manager.write_with_backup(&target, &records).unwrap();

        let written = fs::read_to_string(&target).unwrap();
        assert!(written.starts_with("\"shortcuts\""));
        assert_eq!(shortcuts::read_shortcuts(&target).unwrap(), records);
        let snapshots = fx.manager.list_snapshots("11").unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(fs::read(&snapshots[0].path).unwrap(), b"previous contents");
    }

    #[test]
    fn write_with_backup_uses_default_key_outside_userdata() {
        let fx = fixture();
        let target = fx.steam_root.join("loose").join("shortcuts.vdf");
        write(&target, b"old");
        fx.manager
            .write_with_backup_as(&target, &[], Encoding::Binary)
            .unwrap();
        assert_eq!(fx.manager.list_snapshots(DEFAULT_IDENTITY_KEY).unwrap().len(), 1);
        assert!(shortcuts::read_shortcuts(&target).unwrap().is_empty());
    }

    #[test]
    fn write_proceeds_when_snapshot_fails() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("backups");
        fs::write(&blocker, b"a file where the backups dir should be").unwrap();
        let manager = BackupManager::new(&blocker);
        let target = dir.path().join("userdata").join("8").join("shortcuts.vdf");
        write(&target, b"old");

        let records = vec![ShortcutRecord::new("Game", "/bin/game")];
        manager.write_with_backup(&target, &records).unwrap();
        assert_eq!(shortcuts::read_shortcuts(&target).unwrap(), records);
    }
}
