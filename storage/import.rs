//! 数据导入
//!
//! 把 GeoJSON 中的点写进数据文件并建立索引，或为已有的数据文件重建索引。

use super::adapter::StorageError;
use super::data_file::{DataFile, DataFileHeader, DataFileWriter, Record};
use crate::rtree::node::RecordHandle;
use crate::rtree::RTree;
use geo::Geometry;
use geojson::{feature::Id, Feature, GeoJson};
use std::path::Path;
use tracing::{debug, info, warn};

/// 导入结果统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportSummary {
    /// 写入数据文件并插入树的记录数
    pub imported: usize,
    /// 跳过的非点要素数
    pub skipped: usize,
    /// 树拒绝的记录数（坐标非有限值）
    pub rejected: usize,
    pub header: DataFileHeader,
}

/// 从 GeoJSON 文本中提取点记录
///
/// 支持 FeatureCollection、Feature 和裸 Geometry；`Point` 与 `MultiPoint` 以外的几何体计入跳过数。
/// 记录 id 依次取自要素 id（数字）、`id` 属性，否则使用从 0 开始的流水号。
pub fn parse_geojson_points(geojson_str: &str) -> Result<(Vec<Record>, usize), StorageError> {
    let geojson = geojson_str.parse::<GeoJson>()?;

    let features: Vec<Feature> = match geojson {
        GeoJson::FeatureCollection(collection) => collection.features,
        GeoJson::Feature(feature) => vec![feature],
        GeoJson::Geometry(geometry) => vec![Feature {
            bbox: None,
            geometry: Some(geometry),
            id: None,
            properties: None,
            foreign_members: None,
        }],
    };

    let mut records = Vec::new();
    let mut skipped = 0;

    for (ordinal, feature) in features.into_iter().enumerate() {
        let id = feature_id(&feature).unwrap_or(ordinal as u64);
        let Some(geometry) = feature.geometry else {
            skipped += 1;
            continue;
        };

        match Geometry::<f64>::try_from(geometry)? {
            Geometry::Point(point) => {
                records.push(Record::new(id, point.y() as f32, point.x() as f32));
            }
            Geometry::MultiPoint(points) => {
                records.extend(
                    points
                        .iter()
                        .map(|point| Record::new(id, point.y() as f32, point.x() as f32)),
                );
            }
            other => {
                debug!(id, kind = geometry_kind(&other), "skipping non-point feature");
                skipped += 1;
            }
        }
    }

    Ok((records, skipped))
}

fn feature_id(feature: &Feature) -> Option<u64> {
    match &feature.id {
        Some(Id::Number(number)) => number.as_u64(),
        Some(Id::String(text)) => text.parse().ok(),
        None => feature.property("id").and_then(|value| value.as_u64()),
    }
}

fn geometry_kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

/// 把记录写进新的数据文件，并把每条记录以其句柄插入树中
pub fn import_records(
    rtree: &mut RTree,
    records: &[Record],
    data_path: impl AsRef<Path>,
) -> Result<ImportSummary, StorageError> {
    let mut writer = DataFileWriter::create(data_path)?;
    let mut summary = ImportSummary::default();

    for record in records {
        let handle = writer.add_record(record)?;
        index_record(rtree, record, handle, &mut summary);
    }

    summary.header = writer.finalize()?;
    info!(
        imported = summary.imported,
        rejected = summary.rejected,
        blocks = summary.header.block_count,
        "records imported"
    );
    Ok(summary)
}

/// 读取 GeoJSON 文件，写出数据文件并建立索引
pub fn import_geojson_file(
    rtree: &mut RTree,
    geojson_path: impl AsRef<Path>,
    data_path: impl AsRef<Path>,
) -> Result<ImportSummary, StorageError> {
    let text = std::fs::read_to_string(geojson_path)?;
    let (records, skipped) = parse_geojson_points(&text)?;

    let mut summary = import_records(rtree, &records, data_path)?;
    summary.skipped = skipped;
    Ok(summary)
}

/// 为已有数据文件中的全部记录建立索引
pub fn index_data_file(
    rtree: &mut RTree,
    data: &mut DataFile,
) -> Result<ImportSummary, StorageError> {
    let mut summary = ImportSummary {
        header: data.header(),
        ..Default::default()
    };

    for (handle, record) in data.records()? {
        index_record(rtree, &record, handle, &mut summary);
    }

    info!(
        path = %data.path().display(),
        indexed = summary.imported,
        "data file indexed"
    );
    Ok(summary)
}

fn index_record(
    rtree: &mut RTree,
    record: &Record,
    handle: RecordHandle,
    summary: &mut ImportSummary,
) {
    match rtree.insert(record.mbr(), handle) {
        Ok(_) => summary.imported += 1,
        Err(err) => {
            warn!(id = record.id, %handle, error = %err, "record not indexed");
            summary.rejected += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtree::rectangle::Rectangle;
    use geo::Point;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "id": 101, "properties": {},
             "geometry": {"type": "Point", "coordinates": [116.4, 39.9]}},
            {"type": "Feature", "properties": {"id": 202},
             "geometry": {"type": "Point", "coordinates": [121.5, 31.2]}},
            {"type": "Feature", "properties": {"name": "no id"},
             "geometry": {"type": "Point", "coordinates": [113.3, 23.1]}},
            {"type": "Feature", "properties": {},
             "geometry": {"type": "LineString", "coordinates": [[0, 0], [1, 1]]}},
            {"type": "Feature", "properties": {}, "geometry": null}
        ]
    }"#;

    #[test]
    fn test_parse_geojson_points() {
        let (records, skipped) = parse_geojson_points(SAMPLE).unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(skipped, 2);
        assert_eq!(records[0], Record::new(101, 39.9, 116.4));
        assert_eq!(records[1].id, 202);
        assert_eq!(records[2].id, 2);
    }

    #[test]
    fn test_parse_single_geometry() {
        let (records, skipped) =
            parse_geojson_points(r#"{"type": "MultiPoint", "coordinates": [[1, 2], [3, 4]]}"#)
                .unwrap();
        assert_eq!(skipped, 0);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].mbr(), Rectangle::from_point(3.0, 4.0));
    }

    #[test]
    fn test_parse_invalid_geojson() {
        assert!(matches!(
            parse_geojson_points("{not json"),
            Err(StorageError::GeoJson(_))
        ));
    }

    #[test]
    fn test_import_and_reindex() {
        let temp_dir = TempDir::new().unwrap();
        let geojson_path = temp_dir.path().join("cities.geojson");
        let data_path = temp_dir.path().join("datafile.dat");
        std::fs::write(&geojson_path, SAMPLE).unwrap();

        let mut rtree = RTree::new(4);
        let summary = import_geojson_file(&mut rtree, &geojson_path, &data_path).unwrap();

        assert_eq!(summary.imported, 3);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.header.record_count, 3);
        assert_eq!(rtree.len(), 3);

        let nearest = rtree.k_nearest(Point::new(116.0, 40.0), 1).unwrap();
        let mut data = DataFile::open(&data_path).unwrap();
        assert_eq!(data.read_record(nearest[0].handle).unwrap().id, 101);

        // 从数据文件重建出同样的索引
        let mut rebuilt = RTree::new(4);
        let summary = index_data_file(&mut rebuilt, &mut data).unwrap();
        assert_eq!(summary.imported, 3);
        assert_eq!(rebuilt.len(), 3);
        assert_eq!(rebuilt.root_mbr(), rtree.root_mbr());
    }

    #[test]
    fn test_non_finite_records_are_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let records = [Record::new(1, 1.0, 1.0), Record::new(2, f32::NAN, 0.0)];

        let mut rtree = RTree::new(4);
        let summary =
            import_records(&mut rtree, &records, temp_dir.path().join("datafile.dat")).unwrap();

        assert_eq!(summary.imported, 1);
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.header.record_count, 2);
        assert_eq!(rtree.len(), 1);
    }
}
