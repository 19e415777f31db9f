//! 索引日志
//!
//! 每次插入向日志追加一条定长 24 字节的小端条目：
//! `min_x, min_y, max_x, max_y`（`f32`），然后是 `block_id: u32` 和 `slot: u32`。
//! 日志只追加不回读，树的查询从不依赖它。
//!
//! 同步策略与 Redis AOF 相同：
//! - `Always`：每次追加都 flush + fsync
//! - `EverySecond`：最多每秒 fsync 一次（默认）
//! - `No`：交给操作系统，只在显式 flush 或析构时刷新

use super::adapter::StorageError;
use crate::rtree::node::RecordHandle;
use crate::rtree::rectangle::Rectangle;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;

/// 单条日志条目的编码长度（字节）
pub const ENTRY_SIZE: usize = 24;

/// 索引日志同步策略
///
/// 决定何时将数据从内存缓冲区刷新到磁盘
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogSyncPolicy {
    /// 每次写入都立即 fsync
    Always,

    /// 每秒 fsync 一次，最多丢失 1 秒的数据
    #[default]
    EverySecond,

    /// 不主动 fsync，由操作系统决定
    No,
}

impl FromStr for LogSyncPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "always" => Ok(LogSyncPolicy::Always),
            "everysec" => Ok(LogSyncPolicy::EverySecond),
            "no" => Ok(LogSyncPolicy::No),
            other => Err(format!(
                "unknown sync policy '{}', expected always, everysec or no",
                other
            )),
        }
    }
}

/// 索引日志配置
#[derive(Debug, Clone)]
pub struct IndexLogConfig {
    /// 日志文件路径
    pub file_path: PathBuf,

    /// 同步策略
    pub sync_policy: LogSyncPolicy,

    /// 是否启用
    pub enabled: bool,
}

impl Default for IndexLogConfig {
    fn default() -> Self {
        Self {
            file_path: PathBuf::from("indexfile.idx"),
            sync_policy: LogSyncPolicy::EverySecond,
            enabled: true,
        }
    }
}

impl IndexLogConfig {
    pub fn new(file_path: PathBuf) -> Self {
        Self {
            file_path,
            ..Default::default()
        }
    }

    /// 设置同步策略
    pub fn set_sync_policy(mut self, policy: LogSyncPolicy) -> Self {
        self.sync_policy = policy;
        self
    }

    /// 设置是否启用
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// 日志条目
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexLogEntry {
    /// `[min_x, min_y, max_x, max_y]`
    pub mbr: [f32; 4],
    pub block_id: u32,
    pub slot: u32,
}

impl IndexLogEntry {
    /// 坐标按 `f32` 落盘，会损失精度
    pub fn new(mbr: &Rectangle, handle: RecordHandle) -> Self {
        let [min_x, min_y, max_x, max_y] = mbr.to_array();
        IndexLogEntry {
            mbr: [min_x as f32, min_y as f32, max_x as f32, max_y as f32],
            block_id: handle.block_id,
            slot: handle.slot,
        }
    }

    pub fn handle(&self) -> RecordHandle {
        RecordHandle::new(self.block_id, self.slot)
    }

    pub fn rectangle(&self) -> Rectangle {
        let [min_x, min_y, max_x, max_y] = self.mbr;
        Rectangle::new(min_x as f64, min_y as f64, max_x as f64, max_y as f64)
    }
}

/// 索引日志写入器
///
/// 创建时截断已有文件，之后只追加。
pub struct IndexLogWriter {
    writer: BufWriter<File>,
    config: IndexLogConfig,
    last_sync: Instant,
    entries_written: u64,
}

impl IndexLogWriter {
    /// 创建日志文件（父目录不存在时一并创建）
    pub fn new(config: IndexLogConfig) -> Result<Self, StorageError> {
        if let Some(parent) = config.file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&config.file_path)?;

        Ok(Self {
            writer: BufWriter::new(file),
            config,
            last_sync: Instant::now(),
            entries_written: 0,
        })
    }

    /// 追加一条条目，并按同步策略刷新
    pub fn append(&mut self, entry: &IndexLogEntry) -> Result<(), StorageError> {
        bincode::serialize_into(&mut self.writer, entry)?;
        self.entries_written += 1;
        self.sync_if_needed()
    }

    fn sync_if_needed(&mut self) -> Result<(), StorageError> {
        match self.config.sync_policy {
            LogSyncPolicy::Always => {
                self.writer.flush()?;
                self.writer.get_ref().sync_data()?;
            }
            LogSyncPolicy::EverySecond => {
                if self.last_sync.elapsed().as_secs() >= 1 {
                    self.writer.flush()?;
                    self.writer.get_ref().sync_data()?;
                    self.last_sync = Instant::now();
                }
            }
            LogSyncPolicy::No => {}
        }
        Ok(())
    }

    /// 手动刷新缓冲区并同步到磁盘
    pub fn flush(&mut self) -> Result<(), StorageError> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }

    pub fn entries_written(&self) -> u64 {
        self.entries_written
    }

    pub fn config(&self) -> &IndexLogConfig {
        &self.config
    }
}

impl Drop for IndexLogWriter {
    /// 析构时自动刷新缓冲区
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

/// 读出日志中的全部条目
///
/// 文件长度不是 24 的整数倍时，返回 `TruncatedEntry`，偏移量指向残缺条目的起点。
pub fn read_index_log(path: impl AsRef<Path>) -> Result<Vec<IndexLogEntry>, StorageError> {
    let bytes = std::fs::read(path)?;

    let chunks = bytes.chunks_exact(ENTRY_SIZE);
    if !chunks.remainder().is_empty() {
        let offset = (bytes.len() - chunks.remainder().len()) as u64;
        return Err(StorageError::TruncatedEntry { offset });
    }

    chunks
        .map(|chunk| bincode::deserialize(chunk).map_err(StorageError::from))
        .collect()
}
