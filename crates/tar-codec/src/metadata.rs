//! Per-entry metadata overrides and the writer defaults they fall back to.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::header::EntryType;

/// Optional metadata supplied when adding an entry to a [`TarWriter`].
///
/// Any field left as `None` takes its value from the writer's [`Defaults`].
///
/// ```
/// use tar_codec::EntryMetadata;
///
/// let meta = EntryMetadata {
///     user: Some("coder".into()),
///     group: Some("codergroup".into()),
///     mode: Some(0o777),
///     ..Default::default()
/// };
/// assert!(meta.uid.is_none());
/// ```
///
/// [`TarWriter`]: crate::TarWriter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryMetadata {
    /// Owner user ID.
    pub uid: Option<u64>,
    /// Owner group ID.
    pub gid: Option<u64>,
    /// Permission bits.
    pub mode: Option<u32>,
    /// Modification time in seconds since the Unix epoch.
    pub mtime: Option<u64>,
    /// Owner user name.
    pub user: Option<String>,
    /// Owner group name.
    pub group: Option<String>,
}

/// Fallback metadata used by the writer.
///
/// # Example
///
/// ```
/// use tar_codec::Defaults;
///
/// let defaults = Defaults {
///     user: "builder".into(),
///     ..Default::default()
/// };
/// assert_eq!(defaults.uid, 1000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Defaults {
    /// Owner user ID.
    ///
    /// Default: 1000.
    pub uid: u64,

    /// Owner group ID.
    ///
    /// Default: 1000.
    pub gid: u64,

    /// Permission bits for regular files.
    ///
    /// Default: `0o664`.
    pub file_mode: u32,

    /// Permission bits for directories.
    ///
    /// Default: `0o775`.
    pub dir_mode: u32,

    /// Modification time for entries without one.
    ///
    /// `None` stamps each entry with the current time, captured when the
    /// entry is added.
    ///
    /// Default: `None`.
    pub mtime: Option<u64>,

    /// Owner user name.
    ///
    /// Default: `"coder"`.
    pub user: String,

    /// Owner group name.
    ///
    /// Default: `"coder"`.
    pub group: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            uid: 1000,
            gid: 1000,
            file_mode: 0o664,
            dir_mode: 0o775,
            mtime: None,
            user: "coder".to_string(),
            group: "coder".to_string(),
        }
    }
}

impl Defaults {
    /// Create a new `Defaults` with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults that pin every timestamp to the epoch, so the same inputs
    /// always produce the same archive bytes.
    #[must_use]
    pub fn reproducible() -> Self {
        Self {
            mtime: Some(0),
            ..Self::default()
        }
    }

    /// Permission bits for an entry of the given type.
    #[must_use]
    pub fn mode_for(&self, entry_type: EntryType) -> u32 {
        match entry_type {
            EntryType::Regular => self.file_mode,
            EntryType::Directory => self.dir_mode,
        }
    }

    /// Fill every unset field of `meta` from these defaults.
    #[must_use]
    pub fn resolve(&self, entry_type: EntryType, meta: EntryMetadata) -> ResolvedMetadata {
        ResolvedMetadata {
            uid: meta.uid.unwrap_or(self.uid),
            gid: meta.gid.unwrap_or(self.gid),
            mode: meta.mode.unwrap_or_else(|| self.mode_for(entry_type)),
            mtime: meta.mtime.or(self.mtime).unwrap_or_else(now_secs),
            user: meta.user.unwrap_or_else(|| self.user.clone()),
            group: meta.group.unwrap_or_else(|| self.group.clone()),
        }
    }
}

/// Metadata with every field decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMetadata {
    /// Owner user ID.
    pub uid: u64,
    /// Owner group ID.
    pub gid: u64,
    /// Permission bits.
    pub mode: u32,
    /// Modification time in seconds since the Unix epoch.
    pub mtime: u64,
    /// Owner user name.
    pub user: String,
    /// Owner group name.
    pub group: String,
}

fn now_secs() -> u64 {
    // A clock before the epoch stamps entries with zero.
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let defaults = Defaults::default();
        assert_eq!(defaults.uid, 1000);
        assert_eq!(defaults.gid, 1000);
        assert_eq!(defaults.file_mode, 0o664);
        assert_eq!(defaults.dir_mode, 0o775);
        assert_eq!(defaults.mtime, None);
        assert_eq!(defaults, Defaults::new());
    }

    #[test]
    fn test_mode_for() {
        let defaults = Defaults::default();
        assert_eq!(defaults.mode_for(EntryType::Regular), 0o664);
        assert_eq!(defaults.mode_for(EntryType::Directory), 0o775);
    }

    #[test]
    fn test_resolve_prefers_overrides() {
        let defaults = Defaults::reproducible();
        let meta = EntryMetadata {
            uid: Some(1),
            gid: Some(2),
            mode: Some(0o600),
            mtime: Some(42),
            user: Some("alice".into()),
            group: Some("staff".into()),
        };
        let resolved = defaults.resolve(EntryType::Regular, meta);
        assert_eq!(
            resolved,
            ResolvedMetadata {
                uid: 1,
                gid: 2,
                mode: 0o600,
                mtime: 42,
                user: "alice".into(),
                group: "staff".into(),
            }
        );
    }

    #[test]
    fn test_resolve_falls_back() {
        let resolved = Defaults::reproducible().resolve(EntryType::Directory, EntryMetadata::default());
        assert_eq!(resolved.uid, 1000);
        assert_eq!(resolved.gid, 1000);
        assert_eq!(resolved.mode, 0o775);
        assert_eq!(resolved.mtime, 0);
        assert_eq!(resolved.user, "coder");
        assert_eq!(resolved.group, "coder");
    }

    #[test]
    fn test_resolve_uses_clock() {
        let before = now_secs();
        let resolved = Defaults::default().resolve(EntryType::Regular, EntryMetadata::default());
        assert!(resolved.mtime >= before);
        assert!(resolved.mtime > 1_600_000_000);
    }
}
