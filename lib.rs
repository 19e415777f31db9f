pub mod client;
pub mod config;
pub mod rtree;
pub mod storage;

use std::error::Error;

// 重新导出主要的公共接口
pub use rtree::{
    ConcurrentRTree, DeleteOutcome, Entry, InsertOutcome, LeafEntry, Neighbor, Node, RTree,
    RTreeError, RecordHandle, Rectangle,
};
pub use storage::{DataFile, DataFileWriter, FileStorage, MemoryStorage, Record, StorageAdapter};

// 重新导出常用类型，便于二进制文件使用
pub use client::{CliArgs, OutputFormatter, Session};
pub use config::GeoStarConfig;

pub type Result<T> = std::result::Result<T, Box<dyn Error + Send + Sync>>;
