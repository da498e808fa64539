pub mod coordinator;
pub mod validator;

pub use coordinator::{DownloadCoordinator, DownloadPhase, DownloadRecord, DownloadResult};
pub use validator::{FileValidator, MIN_VALID_FILE_SIZE, SIZE_TOLERANCE};
