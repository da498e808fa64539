pub mod store;

pub use store::{LibraryError, LibraryItemPatch, LibraryStore};
