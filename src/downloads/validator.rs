use std::path::Path;
use tracing::debug;

/// Sanity floor: anything below this cannot be a real video and is
/// treated as a truncated leftover from a crashed download.
pub const MIN_VALID_FILE_SIZE: u64 = 1024 * 1024; // 1 MiB

/// Allowed relative deviation from an expected size. Accommodates
/// container/re-encode overhead while catching gross truncation.
pub const SIZE_TOLERANCE: f64 = 0.07;

/// Decides whether a file claimed by a library item is trustworthy enough
/// to skip re-downloading.
///
/// Checks existence and size only; content/header inspection is a known
/// limitation, deliberately deferred.
#[derive(Debug, Clone)]
pub struct FileValidator {
    min_size_bytes: u64,
    size_tolerance: f64,
}

impl Default for FileValidator {
    fn default() -> Self {
        Self {
            min_size_bytes: MIN_VALID_FILE_SIZE,
            size_tolerance: SIZE_TOLERANCE,
        }
    }
}

impl FileValidator {
    /// Custom thresholds, mainly for tests.
    pub fn new(min_size_bytes: u64, size_tolerance: f64) -> Self {
        Self {
            min_size_bytes,
            size_tolerance,
        }
    }

    /// True when the file exists, clears the absolute floor, and (when a
    /// positive size hint is given) matches it within tolerance.
    pub async fn validate(&self, path: &Path, expected_size: Option<u64>) -> bool {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) => {
                debug!("Validation failed, cannot stat {:?}: {}", path, e);
                return false;
            }
        };

        if !metadata.is_file() {
            debug!("Validation failed, not a regular file: {:?}", path);
            return false;
        }

        let actual = metadata.len();
        if actual < self.min_size_bytes {
            debug!(
                "Validation failed, {:?} is {} bytes (floor {})",
                path, actual, self.min_size_bytes
            );
            return false;
        }

        if let Some(expected) = expected_size
            && expected > 0
        {
            let deviation = (actual as f64 - expected as f64).abs() / expected as f64;
            if deviation > self.size_tolerance {
                debug!(
                    "Validation failed, {:?} is {} bytes, expected {} ({:.1}% off)",
                    path,
                    actual,
                    expected,
                    deviation * 100.0
                );
                return false;
            }
        }

        true
    }
}
