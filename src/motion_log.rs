use chrono::Utc;
use chrono_tz::Tz;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Human-readable stamp used in log lines and overlays
pub const LINE_TIME_FORMAT: &str = "%H:%M:%S %d-%m-%Y";

/// Append-only text log of recording activity.
///
/// Every failure here is swallowed; the log is never allowed to affect
/// recording.
#[derive(Debug, Clone)]
pub struct MotionLog {
    path: Option<PathBuf>,
    timezone: Tz,
}

impl MotionLog {
    /// Probe `path` for append access once; an unusable path disables the log
    pub fn open(path: Option<&Path>, timezone: Tz) -> Self {
        let path = match path {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => {
                info!("Motion log file disabled");
                return Self::disabled();
            }
        };

        match std::fs::OpenOptions::new().create(true).append(true).open(path) {
            Ok(_) => {
                info!("Writing motion log to {}", path.display());
                Self {
                    path: Some(path.to_path_buf()),
                    timezone,
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    "Unable to open motion log {}, check that the directory exists. Logging disabled.",
                    path.display()
                );
                Self::disabled()
            }
            Err(e) => {
                warn!(
                    "Unable to open motion log {} ({}), check permissions. Logging disabled.",
                    path.display(),
                    e
                );
                Self::disabled()
            }
        }
    }

    pub fn disabled() -> Self {
        Self {
            path: None,
            timezone: Tz::UTC,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.path.is_some()
    }

    /// Append `[time] message`; failures only reach the debug log
    pub async fn log_line(&self, message: &str) {
        let Some(path) = &self.path else {
            return;
        };

        let stamp = Utc::now().with_timezone(&self.timezone).format(LINE_TIME_FORMAT);
        let line = format!("[{}] {}\n", stamp, message);

        let result = async {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await?;
            file.write_all(line.as_bytes()).await?;
            file.flush().await
        }
        .await;

        if let Err(e) = result {
            debug!("Motion log write to {} failed: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lines_are_appended_with_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("motion.log");

        let log = MotionLog::open(Some(&path), Tz::UTC);
        assert!(log.is_enabled());

        log.log_line("Started recording").await;
        log.log_line("Stopped recording (motion ended), 7 frames saved").await;

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("] Started recording"));
        assert!(lines[1].contains("motion ended"));
    }

    #[tokio::test]
    async fn test_missing_directory_disables_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("motion.log");

        let log = MotionLog::open(Some(&path), Tz::UTC);
        assert!(!log.is_enabled());

        // Writing to a disabled log is a silent no-op
        log.log_line("ignored").await;
        assert!(!path.exists());
    }

    #[test]
    fn test_empty_path_disables_log() {
        assert!(!MotionLog::open(Some(Path::new("")), Tz::UTC).is_enabled());
        assert!(!MotionLog::open(None, Tz::UTC).is_enabled());
    }

    #[tokio::test]
    async fn test_write_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("motion.log");
        let log = MotionLog::open(Some(&path), Tz::UTC);

        // Replace the file with a directory so the next append fails
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        log.log_line("still fine").await;
        assert!(path.is_dir());
    }
}
