//! 存储适配器
//!
//! 索引只认识 `(MBR, RecordHandle)`。记录本体放在哪里、插入日志写到哪里，
//! 都由实现 [`StorageAdapter`] 的类型决定，树通过它追加索引日志和解析句柄。

use super::data_file::{DataFile, Record};
use super::index_log::{IndexLogConfig, IndexLogEntry, IndexLogWriter};
use crate::rtree::node::RecordHandle;
use crate::rtree::rectangle::Rectangle;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// 存储层错误
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// 数据文件头与文件实际内容不符
    #[error("Invalid data file header: {0}")]
    InvalidHeader(String),

    #[error("Record handle out of range: {0}")]
    RecordOutOfRange(RecordHandle),

    /// 索引日志末尾有不完整的条目
    #[error("Truncated index log entry at byte offset {offset}")]
    TruncatedEntry { offset: u64 },

    #[error("No storage adapter attached")]
    NoStorage,

    #[error("No data file opened")]
    NoDataFile,

    #[error("GeoJSON error: {0}")]
    GeoJson(String),
}

impl From<geojson::Error> for StorageError {
    fn from(err: geojson::Error) -> Self {
        StorageError::GeoJson(err.to_string())
    }
}

/// 树与外部存储之间的接口
pub trait StorageAdapter: Send + Sync {
    /// 记录一次插入：`(mbr, handle)` 追加到索引日志
    fn append_index_entry(
        &mut self,
        mbr: &Rectangle,
        handle: RecordHandle,
    ) -> Result<(), StorageError>;

    /// 由句柄取回记录
    fn resolve(&mut self, handle: RecordHandle) -> Result<Record, StorageError>;

    /// 把缓冲的数据写到磁盘
    fn flush(&mut self) -> Result<(), StorageError> {
        Ok(())
    }
}

/// 基于文件的存储：可选的索引日志 + 可选的数据文件
///
/// 没有索引日志时追加是空操作；没有数据文件时解析返回 `NoDataFile`。
#[derive(Default)]
pub struct FileStorage {
    log: Option<IndexLogWriter>,
    data: Option<DataFile>,
}

impl FileStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按配置打开索引日志；配置为禁用时不创建日志
    pub fn with_index_log(config: IndexLogConfig) -> Result<Self, StorageError> {
        let log = if config.enabled {
            Some(IndexLogWriter::new(config)?)
        } else {
            None
        };
        Ok(Self { log, data: None })
    }

    /// 挂载（或替换）数据文件
    pub fn attach_data_file(&mut self, data: DataFile) {
        self.data = Some(data);
    }

    pub fn data_file(&self) -> Option<&DataFile> {
        self.data.as_ref()
    }

    pub fn index_log_path(&self) -> Option<&PathBuf> {
        self.log.as_ref().map(|log| &log.config().file_path)
    }
}

impl StorageAdapter for FileStorage {
    fn append_index_entry(
        &mut self,
        mbr: &Rectangle,
        handle: RecordHandle,
    ) -> Result<(), StorageError> {
        match self.log.as_mut() {
            Some(log) => log.append(&IndexLogEntry::new(mbr, handle)),
            None => Ok(()),
        }
    }

    fn resolve(&mut self, handle: RecordHandle) -> Result<Record, StorageError> {
        match self.data.as_mut() {
            Some(data) => data.read_record(handle),
            None => Err(StorageError::NoDataFile),
        }
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        match self.log.as_mut() {
            Some(log) => log.flush(),
            None => Ok(()),
        }
    }
}

/// 纯内存存储，适合嵌入式使用和测试
#[derive(Debug, Default)]
pub struct MemoryStorage {
    records: HashMap<RecordHandle, Record>,
    log: Vec<IndexLogEntry>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_record(&mut self, handle: RecordHandle, record: Record) {
        self.records.insert(handle, record);
    }

    /// 已追加的索引日志条目
    pub fn index_entries(&self) -> &[IndexLogEntry] {
        &self.log
    }
}

impl StorageAdapter for MemoryStorage {
    fn append_index_entry(
        &mut self,
        mbr: &Rectangle,
        handle: RecordHandle,
    ) -> Result<(), StorageError> {
        self.log.push(IndexLogEntry::new(mbr, handle));
        Ok(())
    }

    fn resolve(&mut self, handle: RecordHandle) -> Result<Record, StorageError> {
        self.records
            .get(&handle)
            .copied()
            .ok_or(StorageError::RecordOutOfRange(handle))
    }
}
