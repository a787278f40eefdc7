//! RoundLayout - file naming inside one round directory

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::debug;

use crate::error::RecordError;

/// Directory name format of a round.
pub const ROUND_DIR_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Paths used by one round.
#[derive(Debug, Clone)]
pub struct RoundLayout {
    dir: PathBuf,
}

impl RoundLayout {
    /// Create `<base>/<timestamp>`, adding `-1`, `-2`, ... if that directory exists.
    pub fn create(base: &Path, now: DateTime<Local>) -> Result<Self, RecordError> {
        let stamp = now.format(ROUND_DIR_FORMAT).to_string();
        std::fs::create_dir_all(base).map_err(|e| RecordError::RoundDirectory {
            path: base.display().to_string(),
            message: e.to_string(),
        })?;

        let mut dir = base.join(&stamp);
        let mut suffix = 0;
        loop {
            match std::fs::create_dir(&dir) {
                Ok(()) => break,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    suffix += 1;
                    dir = base.join(format!("{}-{}", stamp, suffix));
                }
                Err(e) => {
                    return Err(RecordError::RoundDirectory {
                        path: dir.display().to_string(),
                        message: e.to_string(),
                    })
                }
            }
        }
        debug!(dir = %dir.display(), "round directory created");
        Ok(Self { dir })
    }

    /// Use an existing directory as is.
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Main receive capture: `rcv-<name>.raw`
    pub fn receive_path(&self, session: &str) -> PathBuf {
        self.dir.join(format!("rcv-{}.raw", session))
    }

    /// Per-channel USBL template: `u%d-<name>.raw`
    pub fn usbl_pattern(&self, session: &str) -> String {
        self.dir
            .join(format!("u%d-{}.raw", session))
            .to_string_lossy()
            .into_owned()
    }

    pub fn usbl_path(&self, session: &str, channel: u8) -> PathBuf {
        self.dir.join(format!("u{}-{}.raw", channel, session))
    }

    /// Telemetry record: `systime-<name>.txt`
    pub fn record_path(&self, session: &str) -> PathBuf {
        self.dir.join(format!("systime-{}.txt", session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    #[test]
    fn test_timestamp_directory() {
        let base = tempfile::tempdir().unwrap();
        let layout = RoundLayout::create(base.path(), fixed_time()).unwrap();
        assert_eq!(layout.dir(), base.path().join("20240309-140507"));
        assert!(layout.dir().is_dir());
    }

    #[test]
    fn test_collision_gets_suffix() {
        let base = tempfile::tempdir().unwrap();
        let first = RoundLayout::create(base.path(), fixed_time()).unwrap();
        let second = RoundLayout::create(base.path(), fixed_time()).unwrap();
        let third = RoundLayout::create(base.path(), fixed_time()).unwrap();
        assert_ne!(first.dir(), second.dir());
        assert_eq!(second.dir(), base.path().join("20240309-140507-1"));
        assert_eq!(third.dir(), base.path().join("20240309-140507-2"));
    }

    #[test]
    fn test_file_names() {
        let layout = RoundLayout::at("/data/r1");
        assert_eq!(layout.receive_path("p1"), PathBuf::from("/data/r1/rcv-p1.raw"));
        assert_eq!(layout.usbl_pattern("p1"), "/data/r1/u%d-p1.raw");
        assert_eq!(layout.usbl_path("p1", 3), PathBuf::from("/data/r1/u3-p1.raw"));
        assert_eq!(layout.record_path("p1"), PathBuf::from("/data/r1/systime-p1.txt"));
    }
}
