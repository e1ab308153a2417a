//! Recording persistence
//!
//! Writes finished recordings into the output directory under timestamped
//! filenames.

pub mod gateway;

pub use gateway::{
    format_filename, FsGateway, PersistenceGateway, SavedRecording, StorageError,
    DEFAULT_FOLDER_NAME,
};
