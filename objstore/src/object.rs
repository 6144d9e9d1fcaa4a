use std::time::{SystemTime, UNIX_EPOCH};

/// Metadata of a stored object, as returned by `head` and `list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Object {
    key: String,
    size: i64,
    mtime: SystemTime,
    is_dir: bool,
    is_symlink: bool,
}

impl Object {
    #[must_use]
    pub fn new(key: impl Into<String>, size: i64, mtime: SystemTime) -> Self {
        let key = key.into();
        Self {
            is_dir: key.ends_with('/'),
            key,
            size,
            mtime,
            is_symlink: false,
        }
    }

    /// Mark the object as a directory entry.
    #[must_use]
    pub fn with_dir(mut self, is_dir: bool) -> Self {
        self.is_dir = is_dir;
        self
    }

    #[must_use]
    pub fn with_symlink(mut self, is_symlink: bool) -> Self {
        self.is_symlink = is_symlink;
        self
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn size(&self) -> i64 {
        self.size
    }

    #[must_use]
    pub fn mtime(&self) -> SystemTime {
        self.mtime
    }

    /// Modification time in whole seconds since the unix epoch.
    ///
    /// Times before the epoch come out negative.
    #[must_use]
    pub fn mtime_unix(&self) -> i64 {
        match self.mtime.duration_since(UNIX_EPOCH) {
            Ok(d) => i64::try_from(d.as_secs()).unwrap_or(i64::MAX),
            Err(e) => {
                let before = e.duration();
                let secs = i64::try_from(before.as_secs()).unwrap_or(i64::MAX);
                // round towards negative infinity, like Go's Time.Unix
                if before.subsec_nanos() > 0 {
                    -secs - 1
                } else {
                    -secs
                }
            }
        }
    }

    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    #[must_use]
    pub fn is_symlink(&self) -> bool {
        self.is_symlink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn trailing_slash_means_directory() {
        let dir = Object::new("a/b/", 0, UNIX_EPOCH);
        assert!(dir.is_dir());
        let file = Object::new("a/b", 3, UNIX_EPOCH);
        assert!(!file.is_dir());
        assert!(!file.is_symlink());
    }

    #[test]
    fn mtime_unix_seconds() {
        let obj = Object::new("k", 0, UNIX_EPOCH + Duration::from_millis(1_700_000_000_900));
        assert_eq!(obj.mtime_unix(), 1_700_000_000);
    }

    #[test]
    fn mtime_before_epoch_rounds_down() {
        let obj = Object::new("k", 0, UNIX_EPOCH - Duration::from_millis(1_500));
        assert_eq!(obj.mtime_unix(), -2);
        let obj = Object::new("k", 0, UNIX_EPOCH - Duration::from_secs(2));
        assert_eq!(obj.mtime_unix(), -2);
    }
}
