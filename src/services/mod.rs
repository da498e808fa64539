pub mod library;

pub use library::LibraryService;
