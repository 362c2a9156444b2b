use crate::{
    config::{RecordingConfig, UnsupportedSpacePolicy},
    error::{Result, StorageError},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

const BYTES_PER_GB: u64 = 1024 * 1024 * 1024;

/// Raw answer from a free-space probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpaceReport {
    Available { free_bytes: u64 },
    /// The platform has no way to answer
    Unsupported,
}

/// Queries the free space of the filesystem holding `path`
pub trait SpaceProbe: Send + Sync {
    fn free_space(&self, path: &Path) -> Result<SpaceReport>;
}

/// `statvfs(3)` probe counting blocks available to unprivileged users
#[derive(Debug, Default, Clone, Copy)]
pub struct StatvfsProbe;

impl SpaceProbe for StatvfsProbe {
    #[cfg(unix)]
    fn free_space(&self, path: &Path) -> Result<SpaceReport> {
        use std::ffi::CString;
        use std::os::unix::ffi::OsStrExt;

        let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| {
            StorageError::InvalidPath {
                path: path.display().to_string(),
            }
        })?;

        let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
        if rc != 0 {
            return Err(StorageError::Query {
                path: path.display().to_string(),
                source: std::io::Error::last_os_error(),
            }
            .into());
        }

        let free_bytes = (stat.f_bavail as u64).saturating_mul(stat.f_frsize as u64);
        Ok(SpaceReport::Available { free_bytes })
    }

    #[cfg(not(unix))]
    fn free_space(&self, _path: &Path) -> Result<SpaceReport> {
        Ok(SpaceReport::Unsupported)
    }
}

/// Outcome of a single pre-write check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpaceCheck {
    Sufficient { free_gb: u64 },
    Insufficient { free_gb: u64 },
    Unsupported { allowed: bool },
}

impl SpaceCheck {
    pub fn permits_write(&self) -> bool {
        match self {
            SpaceCheck::Sufficient { .. } => true,
            SpaceCheck::Insufficient { .. } => false,
            SpaceCheck::Unsupported { allowed } => *allowed,
        }
    }
}

/// Gate consulted before every write to the recording directory
#[derive(Clone)]
pub struct StorageGuard {
    path: PathBuf,
    min_free_gb: u64,
    unsupported_policy: UnsupportedSpacePolicy,
    probe: Arc<dyn SpaceProbe>,
}

impl StorageGuard {
    pub fn with_probe(config: &RecordingConfig, probe: Arc<dyn SpaceProbe>) -> Self {
        Self {
            path: config.path.clone(),
            min_free_gb: config.min_free_space_gb,
            unsupported_policy: config.unsupported_space_check,
            probe,
        }
    }

    /// Probe once at startup so platform limits surface before recording
    pub fn announce(&self) {
        match self.check() {
            SpaceCheck::Sufficient { free_gb } => info!(
                "{} GB free in {} (minimum {} GB)",
                free_gb,
                self.path.display(),
                self.min_free_gb
            ),
            SpaceCheck::Insufficient { free_gb } => warn!(
                "Only {} GB free in {} (minimum {} GB), recordings will be refused",
                free_gb,
                self.path.display(),
                self.min_free_gb
            ),
            SpaceCheck::Unsupported { allowed: true } => warn!(
                "Free space cannot be checked on this platform, recording without a disk space guard"
            ),
            SpaceCheck::Unsupported { allowed: false } => warn!(
                "Free space cannot be checked on this platform, every recording will be refused"
            ),
        }
    }

    pub fn check(&self) -> SpaceCheck {
        match self.probe.free_space(&self.path) {
            Ok(SpaceReport::Available { free_bytes }) => {
                let free_gb = free_bytes / BYTES_PER_GB;
                debug!("{} GB free in {}", free_gb, self.path.display());
                if free_gb >= self.min_free_gb {
                    SpaceCheck::Sufficient { free_gb }
                } else {
                    SpaceCheck::Insufficient { free_gb }
                }
            }
            Ok(SpaceReport::Unsupported) => SpaceCheck::Unsupported {
                allowed: self.unsupported_policy == UnsupportedSpacePolicy::AssumeAvailable,
            },
            Err(e) => {
                warn!("Free space query failed, treating as insufficient: {}", e);
                SpaceCheck::Insufficient { free_gb: 0 }
            }
        }
    }

    pub fn min_free_gb(&self) -> u64 {
        self.min_free_gb
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::MotionCamConfig;
    use crate::error::MotionCamError;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

    /// Probe whose answer can be changed while a guard holds it
    pub(crate) struct FixedProbe {
        free_bytes: AtomicU64,
    }

    impl FixedProbe {
        pub(crate) fn gb(gb: u64) -> Arc<Self> {
            Arc::new(Self {
                free_bytes: AtomicU64::new(gb * BYTES_PER_GB),
            })
        }

        pub(crate) fn set_gb(&self, gb: u64) {
            self.free_bytes.store(gb * BYTES_PER_GB, Ordering::SeqCst);
        }
    }

    impl SpaceProbe for FixedProbe {
        fn free_space(&self, _path: &Path) -> Result<SpaceReport> {
            Ok(SpaceReport::Available {
                free_bytes: self.free_bytes.load(Ordering::SeqCst),
            })
        }
    }

    /// Reports plenty of space for the first `checks` queries, then none
    pub(crate) struct CountdownProbe {
        remaining: AtomicUsize,
    }

    impl CountdownProbe {
        pub(crate) fn checks(checks: usize) -> Arc<Self> {
            Arc::new(Self {
                remaining: AtomicUsize::new(checks),
            })
        }
    }

    impl SpaceProbe for CountdownProbe {
        fn free_space(&self, _path: &Path) -> Result<SpaceReport> {
            let left = self
                .remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
            let free_bytes = if left.is_ok() { 10 * BYTES_PER_GB } else { 0 };
            Ok(SpaceReport::Available { free_bytes })
        }
    }

    struct UnsupportedProbe;

    impl SpaceProbe for UnsupportedProbe {
        fn free_space(&self, _path: &Path) -> Result<SpaceReport> {
            Ok(SpaceReport::Unsupported)
        }
    }

    struct FailingProbe;

    impl SpaceProbe for FailingProbe {
        fn free_space(&self, path: &Path) -> Result<SpaceReport> {
            Err(MotionCamError::Storage(StorageError::Query {
                path: path.display().to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            }))
        }
    }

    fn recording_config(min_gb: u64) -> RecordingConfig {
        let mut config = MotionCamConfig::default().recording;
        config.min_free_space_gb = min_gb;
        config
    }

    #[test]
    fn test_sufficient_space() {
        let guard = StorageGuard::with_probe(&recording_config(1), FixedProbe::gb(5));
        assert_eq!(guard.check(), SpaceCheck::Sufficient { free_gb: 5 });
        assert!(guard.check().permits_write());
    }

    #[test]
    fn test_countdown_runs_out() {
        let guard = StorageGuard::with_probe(&recording_config(1), CountdownProbe::checks(2));
        assert!(guard.check().permits_write());
        assert!(guard.check().permits_write());
        assert!(!guard.check().permits_write());
        assert!(!guard.check().permits_write());
    }

    #[test]
    fn test_exact_minimum_is_sufficient() {
        let guard = StorageGuard::with_probe(&recording_config(2), FixedProbe::gb(2));
        assert!(guard.check().permits_write());
    }

    #[test]
    fn test_gigabytes_truncate() {
        let probe = Arc::new(FixedProbe {
            free_bytes: AtomicU64::new(2 * BYTES_PER_GB - 1),
        });
        let guard = StorageGuard::with_probe(&recording_config(2), probe);
        assert_eq!(guard.check(), SpaceCheck::Insufficient { free_gb: 1 });
    }

    #[test]
    fn test_space_changes_are_observed() {
        let probe = FixedProbe::gb(3);
        let guard = StorageGuard::with_probe(&recording_config(1), probe.clone());
        assert!(guard.check().permits_write());

        probe.set_gb(0);
        assert_eq!(guard.check(), SpaceCheck::Insufficient { free_gb: 0 });
    }

    #[test]
    fn test_unsupported_policy() {
        let mut config = recording_config(1);
        let guard = StorageGuard::with_probe(&config, Arc::new(UnsupportedProbe));
        assert_eq!(guard.check(), SpaceCheck::Unsupported { allowed: true });
        assert!(guard.check().permits_write());

        config.unsupported_space_check = UnsupportedSpacePolicy::Refuse;
        let guard = StorageGuard::with_probe(&config, Arc::new(UnsupportedProbe));
        assert!(!guard.check().permits_write());
    }

    #[test]
    fn test_space_query_error_refuses() {
        let guard = StorageGuard::with_probe(&recording_config(0), Arc::new(FailingProbe));
        assert_eq!(guard.check(), SpaceCheck::Insufficient { free_gb: 0 });
    }

    #[cfg(unix)]
    #[test]
    fn test_statvfs_reports_real_directory() {
        let dir = tempfile::tempdir().unwrap();
        let report = StatvfsProbe.free_space(dir.path()).unwrap();
        assert!(matches!(report, SpaceReport::Available { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_statvfs_missing_directory_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does/not/exist");
        assert!(StatvfsProbe.free_space(&missing).is_err());
    }
}
