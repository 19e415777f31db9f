//! 分块记录数据文件
//!
//! 文件由 32 KiB 的块组成：
//! - 块 0 是文件头，创建时填零，`finalize` 时写入 `(record_count: u32, block_count: u32)`
//! - 从块 1 开始是数据块，记录 `(id: u64, lat: f32, lon: f32)` 以小端定长 16 字节紧密排列，
//!   每块 2048 条；下一条放不下时当前块补零写出
//!
//! 记录在文件中的位置就是它的 [`RecordHandle`]：`(块号, 块内序号)`。

use super::adapter::StorageError;
use crate::rtree::node::RecordHandle;
use crate::rtree::rectangle::Rectangle;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// 块大小（字节）
pub const BLOCK_SIZE: usize = 32 * 1024;
/// 单条记录的编码长度（字节）
pub const RECORD_SIZE: usize = 16;
/// 每个数据块容纳的记录数
pub const RECORDS_PER_BLOCK: usize = BLOCK_SIZE / RECORD_SIZE;
/// 文件头编码长度（字节）
const HEADER_SIZE: usize = 8;

/// 点记录
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: u64,
    pub lat: f32,
    pub lon: f32,
}

impl Record {
    pub fn new(id: u64, lat: f32, lon: f32) -> Self {
        Record { id, lat, lon }
    }

    /// 记录在索引中的MBR：x 为经度，y 为纬度的退化矩形
    pub fn mbr(&self) -> Rectangle {
        Rectangle::from_point(self.lon as f64, self.lat as f64)
    }
}

/// 数据文件头（块 0 的前 8 个字节）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DataFileHeader {
    pub record_count: u32,
    /// 数据块数量，不含头块
    pub block_count: u32,
}

/// 顺序写入记录的数据文件写入器
///
/// 必须调用 [`DataFileWriter::finalize`] 才会写出最后一个块和文件头。
pub struct DataFileWriter {
    writer: BufWriter<File>,
    path: PathBuf,
    current_block: Vec<u8>,
    header: DataFileHeader,
}

impl DataFileWriter {
    /// 创建（或截断）数据文件，并写入一个全零的头块
    pub fn create(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&[0u8; BLOCK_SIZE])?;

        Ok(Self {
            writer,
            path,
            current_block: Vec::with_capacity(BLOCK_SIZE),
            header: DataFileHeader::default(),
        })
    }

    /// 追加一条记录，返回它的句柄
    pub fn add_record(&mut self, record: &Record) -> Result<RecordHandle, StorageError> {
        if self.current_block.len() + RECORD_SIZE > BLOCK_SIZE {
            self.save_current_block()?;
        }

        let handle = RecordHandle::new(
            self.header.block_count + 1,
            (self.current_block.len() / RECORD_SIZE) as u32,
        );
        bincode::serialize_into(&mut self.current_block, record)?;
        self.header.record_count += 1;

        Ok(handle)
    }

    /// 已写入（含缓冲中）的记录数
    pub fn record_count(&self) -> u32 {
        self.header.record_count
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save_current_block(&mut self) -> Result<(), StorageError> {
        self.current_block.resize(BLOCK_SIZE, 0);
        self.writer.write_all(&self.current_block)?;
        self.current_block.clear();
        self.header.block_count += 1;
        debug!(block = self.header.block_count, "data block written");
        Ok(())
    }

    /// 写出最后一个未满的块，回填文件头并同步到磁盘
    pub fn finalize(mut self) -> Result<DataFileHeader, StorageError> {
        if !self.current_block.is_empty() {
            self.save_current_block()?;
        }

        self.writer.seek(SeekFrom::Start(0))?;
        bincode::serialize_into(&mut self.writer, &self.header)?;
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;

        info!(
            path = %self.path.display(),
            records = self.header.record_count,
            blocks = self.header.block_count,
            "data file finalized"
        );
        Ok(self.header)
    }
}

/// 已完成写入的数据文件的随机读取器
#[derive(Debug)]
pub struct DataFile {
    file: File,
    path: PathBuf,
    header: DataFileHeader,
}

impl DataFile {
    /// 打开数据文件并校验文件头
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path)?;

        let mut bytes = [0u8; HEADER_SIZE];
        file.read_exact(&mut bytes)?;
        let header: DataFileHeader = bincode::deserialize(&bytes)?;

        let capacity = header.block_count as u64 * RECORDS_PER_BLOCK as u64;
        if header.record_count as u64 > capacity {
            return Err(StorageError::InvalidHeader(format!(
                "{} records cannot fit in {} blocks",
                header.record_count, header.block_count
            )));
        }

        let expected_len = (header.block_count as u64 + 1) * BLOCK_SIZE as u64;
        let actual_len = file.metadata()?.len();
        if actual_len < expected_len {
            return Err(StorageError::InvalidHeader(format!(
                "header declares {} blocks but file holds {} bytes",
                header.block_count, actual_len
            )));
        }

        Ok(Self { file, path, header })
    }

    pub fn header(&self) -> DataFileHeader {
        self.header
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取句柄指向的记录
    ///
    /// 记录按写入顺序紧密排列，句柄必须落在 `record_count` 之内。
    pub fn read_record(&mut self, handle: RecordHandle) -> Result<Record, StorageError> {
        if !self.contains(handle) {
            return Err(StorageError::RecordOutOfRange(handle));
        }

        let offset =
            handle.block_id as u64 * BLOCK_SIZE as u64 + handle.slot as u64 * RECORD_SIZE as u64;
        self.file.seek(SeekFrom::Start(offset))?;

        let mut bytes = [0u8; RECORD_SIZE];
        self.file.read_exact(&mut bytes)?;
        Ok(bincode::deserialize(&bytes)?)
    }

    /// 句柄是否指向一条已写入的记录
    pub fn contains(&self, handle: RecordHandle) -> bool {
        if handle.block_id == 0
            || handle.block_id > self.header.block_count
            || handle.slot as usize >= RECORDS_PER_BLOCK
        {
            return false;
        }
        let ordinal =
            (handle.block_id as u64 - 1) * RECORDS_PER_BLOCK as u64 + handle.slot as u64;
        ordinal < self.header.record_count as u64
    }

    /// 按文件顺序读出全部记录及其句柄
    pub fn records(&mut self) -> Result<Vec<(RecordHandle, Record)>, StorageError> {
        let mut records = Vec::with_capacity(self.header.record_count as usize);
        let mut block = vec![0u8; BLOCK_SIZE];
        let mut remaining = self.header.record_count as usize;

        for block_id in 1..=self.header.block_count {
            if remaining == 0 {
                break;
            }
            self.file
                .seek(SeekFrom::Start(block_id as u64 * BLOCK_SIZE as u64))?;
            self.file.read_exact(&mut block)?;

            let in_block = remaining.min(RECORDS_PER_BLOCK);
            for (slot, chunk) in block.chunks_exact(RECORD_SIZE).take(in_block).enumerate() {
                let record: Record = bincode::deserialize(chunk)?;
                records.push((RecordHandle::new(block_id, slot as u32), record));
            }
            remaining -= in_block;
        }

        Ok(records)
    }
}
