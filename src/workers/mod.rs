/// Background worker components
pub mod reconciler;

pub use reconciler::{DEFAULT_ITEM_DELAY, LibraryReconciler, SweepPhase};
