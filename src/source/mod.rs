pub mod direct;
pub mod traits;

pub use direct::DirectSource;
pub use traits::{DownloadOutcome, MediaSource, SourceError, delete_file};
