//! 命令执行会话
//!
//! 会话持有一棵带 [`FileStorage`] 的树：插入写索引日志，`GET` 通过数据文件解析句柄。
//! `IMPORT` 重写数据文件，随后整棵树从新文件重建。

use super::command::Command;
use crate::config::GeoStarConfig;
use crate::rtree::algorithms::debug::{InvariantViolation, TreeStats};
use crate::rtree::node::{LeafEntry, RecordHandle};
use crate::rtree::{DeleteOutcome, Neighbor, RTree, RTreeError};
use crate::storage::data_file::{DataFile, DataFileWriter, Record};
use crate::storage::import::{index_data_file, parse_geojson_points, ImportSummary};
use crate::storage::index_log::IndexLogConfig;
use crate::storage::{FileStorage, StorageError};
use geo::Point;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// 命令执行错误
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Tree(#[from] RTreeError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Invariant(#[from] InvariantViolation),

    #[error("JSON export failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// 命令的执行结果
#[derive(Debug)]
pub enum Reply {
    /// 插入完成；`logged` 为 false 表示索引日志写入失败
    Inserted { handle: RecordHandle, logged: bool },
    Deleted(LeafEntry),
    NotFound,
    Entries(Vec<LeafEntry>),
    Neighbors(Vec<Neighbor>),
    Record(RecordHandle, Record),
    Imported(ImportSummary),
    Stats(TreeStats),
    Healthy,
    Text(String),
    Help,
    Quit,
}

/// 一次 CLI 会话
pub struct Session {
    rtree: RTree,
    max_entries: usize,
    data_path: PathBuf,
    log_config: IndexLogConfig,
}

impl Session {
    /// 按配置创建会话；数据文件已存在时从中建立索引
    pub fn open(config: &GeoStarConfig) -> Result<Self, SessionError> {
        let log_config = config.index_log_config().map_err(SessionError::Config)?;

        let mut session = Self::with_paths(
            config.tree.max_entries,
            config.storage.data_file.clone(),
            log_config,
        )?;

        if session.data_path.exists() {
            let summary = session.reload()?;
            info!(
                records = summary.imported,
                rejected = summary.rejected,
                "index rebuilt from data file"
            );
        }
        Ok(session)
    }

    /// 不读取已有数据文件，创建一棵空树
    pub fn with_paths(
        max_entries: usize,
        data_path: PathBuf,
        log_config: IndexLogConfig,
    ) -> Result<Self, SessionError> {
        let storage = FileStorage::with_index_log(log_config.clone())?;
        Ok(Self {
            rtree: RTree::with_storage(max_entries, Box::new(storage)),
            max_entries,
            data_path,
            log_config,
        })
    }

    pub fn rtree(&self) -> &RTree {
        &self.rtree
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    /// 执行一条命令
    pub fn execute(&mut self, command: Command) -> Result<Reply, SessionError> {
        match command {
            Command::Insert { mbr, handle } => {
                let outcome = self.rtree.insert(mbr, handle)?;
                Ok(Reply::Inserted {
                    handle,
                    logged: outcome.is_logged(),
                })
            }
            Command::Delete(mbr) => Ok(match self.rtree.delete(&mbr)? {
                DeleteOutcome::Deleted(entry) => Reply::Deleted(entry),
                DeleteOutcome::NotFound => Reply::NotFound,
            }),
            Command::Range(query) => Ok(Reply::Entries(self.rtree.range_query(&query)?)),
            Command::Knn { x, y, k } => Ok(Reply::Neighbors(
                self.rtree.k_nearest_with_distance(Point::new(x, y), k)?,
            )),
            Command::Skyline => Ok(Reply::Entries(self.rtree.skyline())),
            Command::Import(path) => Ok(Reply::Imported(self.import(&path)?)),
            Command::Get(handle) => Ok(Reply::Record(handle, self.rtree.resolve(handle)?)),
            Command::Stats => Ok(Reply::Stats(self.rtree.stats())),
            Command::Check => {
                self.rtree.check_invariants()?;
                Ok(Reply::Healthy)
            }
            Command::Dump { json: false } => Ok(Reply::Text(self.rtree.render_tree())),
            Command::Dump { json: true } => Ok(Reply::Text(self.rtree.export_to_json()?)),
            Command::Help => Ok(Reply::Help),
            Command::Quit => {
                self.flush();
                Ok(Reply::Quit)
            }
        }
    }

    /// 把 GeoJSON 点写成新的数据文件并重建索引
    fn import(&mut self, geojson_path: &Path) -> Result<ImportSummary, SessionError> {
        let text = std::fs::read_to_string(geojson_path).map_err(StorageError::from)?;
        let (records, skipped) = parse_geojson_points(&text)?;

        let mut writer = DataFileWriter::create(&self.data_path)?;
        for record in &records {
            writer.add_record(record)?;
        }
        writer.finalize()?;

        let mut summary = self.reload()?;
        summary.skipped = skipped;
        Ok(summary)
    }

    /// 丢弃当前的树，从数据文件重新建立索引
    ///
    /// 旧存储先释放，新的索引日志才能安全地截断同一个文件。
    fn reload(&mut self) -> Result<ImportSummary, SessionError> {
        drop(self.rtree.detach_storage());

        let mut storage = FileStorage::with_index_log(self.log_config.clone())?;
        storage.attach_data_file(DataFile::open(&self.data_path)?);
        self.rtree = RTree::with_storage(self.max_entries, Box::new(storage));

        let mut data = DataFile::open(&self.data_path)?;
        Ok(index_data_file(&mut self.rtree, &mut data)?)
    }

    /// 刷新索引日志
    pub fn flush(&mut self) {
        if let Some(storage) = self.rtree.storage_mut() {
            if let Err(err) = storage.flush() {
                warn!(error = %err, "failed to flush index log");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtree::rectangle::Rectangle;
    use crate::storage::index_log::{read_index_log, LogSyncPolicy};
    use tempfile::TempDir;

    fn session(temp_dir: &TempDir, max_entries: usize) -> Session {
        let log_config = IndexLogConfig::new(temp_dir.path().join("indexfile.idx"))
            .set_sync_policy(LogSyncPolicy::Always);
        Session::with_paths(
            max_entries,
            temp_dir.path().join("datafile.dat"),
            log_config,
        )
        .unwrap()
    }

    fn run(session: &mut Session, line: &str) -> Result<Reply, SessionError> {
        session.execute(Command::parse_line(line).unwrap())
    }

    #[test]
    fn test_insert_range_delete() {
        let temp_dir = TempDir::new().unwrap();
        let mut session = session(&temp_dir, 2);

        run(&mut session, "INSERT 1 0 0 0 0 0").unwrap();
        run(&mut session, "INSERT 1 1 5 5 5 5").unwrap();
        match run(&mut session, "INSERT 1 2 10 10 10 10").unwrap() {
            Reply::Inserted { handle, logged } => {
                assert_eq!(handle, RecordHandle::new(1, 2));
                assert!(logged);
            }
            other => panic!("unexpected reply {:?}", other),
        }
        assert_eq!(session.rtree().depth(), 2);

        match run(&mut session, "RANGE 0 0 6 6").unwrap() {
            Reply::Entries(entries) => assert_eq!(entries.len(), 2),
            other => panic!("unexpected reply {:?}", other),
        }

        assert!(matches!(
            run(&mut session, "DELETE 5 5 5 5").unwrap(),
            Reply::Deleted(_)
        ));
        assert!(matches!(
            run(&mut session, "DELETE 5 5 5 5").unwrap(),
            Reply::NotFound
        ));
        assert!(matches!(run(&mut session, "CHECK").unwrap(), Reply::Healthy));

        let logged = read_index_log(temp_dir.path().join("indexfile.idx")).unwrap();
        assert_eq!(logged.len(), 3);
    }

    #[test]
    fn test_invalid_input_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let mut session = session(&temp_dir, 4);

        assert!(matches!(
            run(&mut session, "INSERT 1 0 5 5 0 0"),
            Err(SessionError::Tree(RTreeError::InvalidMbr(_)))
        ));
        assert!(matches!(
            run(&mut session, "KNN NaN 0 1"),
            Err(SessionError::Tree(RTreeError::InvalidPoint { .. }))
        ));
        // 还没有数据文件
        assert!(matches!(
            run(&mut session, "GET 1 0"),
            Err(SessionError::Storage(StorageError::NoDataFile))
        ));
        assert!(session.rtree().is_empty());
    }

    #[test]
    fn test_import_and_get() {
        let temp_dir = TempDir::new().unwrap();
        let geojson_path = temp_dir.path().join("points.geojson");
        std::fs::write(
            &geojson_path,
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "id": 1, "properties": {},
                 "geometry": {"type": "Point", "coordinates": [1, 1]}},
                {"type": "Feature", "id": 2, "properties": {},
                 "geometry": {"type": "Point", "coordinates": [2, 2]}},
                {"type": "Feature", "id": 3, "properties": {},
                 "geometry": {"type": "Point", "coordinates": [1, 3]}},
                {"type": "Feature", "id": 4, "properties": {},
                 "geometry": {"type": "Point", "coordinates": [3, 1]}}
            ]}"#,
        )
        .unwrap();

        let mut session = session(&temp_dir, 4);
        let command = Command::Import(geojson_path);
        match session.execute(command).unwrap() {
            Reply::Imported(summary) => {
                assert_eq!(summary.imported, 4);
                assert_eq!(summary.header.record_count, 4);
            }
            other => panic!("unexpected reply {:?}", other),
        }
        assert_eq!(session.rtree().len(), 4);

        match run(&mut session, "SKYLINE").unwrap() {
            Reply::Entries(entries) => {
                assert_eq!(entries.len(), 1);
                assert_eq!(entries[0].mbr, Rectangle::from_point(1.0, 1.0));
            }
            other => panic!("unexpected reply {:?}", other),
        }

        let nearest = match run(&mut session, "KNN 3 1.2 1").unwrap() {
            Reply::Neighbors(neighbors) => neighbors[0],
            other => panic!("unexpected reply {:?}", other),
        };
        match session.execute(Command::Get(nearest.entry.handle)).unwrap() {
            Reply::Record(_, record) => assert_eq!(record.id, 4),
            other => panic!("unexpected reply {:?}", other),
        }

        assert!(matches!(
            run(&mut session, "GET 9 0"),
            Err(SessionError::Storage(StorageError::RecordOutOfRange(_)))
        ));
        session.flush();
        let logged = read_index_log(temp_dir.path().join("indexfile.idx")).unwrap();
        assert_eq!(logged.len(), 4);
    }

    #[test]
    fn test_open_rebuilds_from_existing_data_file() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = GeoStarConfig::default();
        config.storage.data_file = temp_dir.path().join("datafile.dat");
        config.storage.index_log.filename = temp_dir.path().join("indexfile.idx");

        let mut writer = DataFileWriter::create(&config.storage.data_file).unwrap();
        for i in 0..10u64 {
            writer
                .add_record(&Record::new(i, i as f32, -(i as f32)))
                .unwrap();
        }
        writer.finalize().unwrap();

        let mut session = Session::open(&config).unwrap();
        assert_eq!(session.rtree().len(), 10);
        match run(&mut session, "STATS").unwrap() {
            Reply::Stats(stats) => assert_eq!(stats.records, 10),
            other => panic!("unexpected reply {:?}", other),
        }
        match run(&mut session, "DUMP JSON").unwrap() {
            Reply::Text(json) => assert!(json.contains("\"max_entries\": 4")),
            other => panic!("unexpected reply {:?}", other),
        }
    }
}
