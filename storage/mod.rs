pub mod adapter;
pub mod data_file;
pub mod import;
pub mod index_log;

pub use adapter::{FileStorage, MemoryStorage, StorageAdapter, StorageError};
pub use data_file::{DataFile, DataFileHeader, DataFileWriter, Record};
pub use index_log::{IndexLogConfig, IndexLogEntry, IndexLogWriter, LogSyncPolicy};
