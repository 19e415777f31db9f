pub mod algorithms;
pub mod node;
pub mod rectangle;
#[allow(clippy::module_inception)]
pub mod rtree;

// 重新导出主要类型
pub use algorithms::concurrent::{ConcurrentError, ConcurrentRTree};
pub use algorithms::debug::TreeStats;
pub use algorithms::knn::Neighbor;
pub use node::{Entry, LeafEntry, Node, NodeType, RecordHandle};
pub use rectangle::Rectangle;
pub use rtree::{DeleteOutcome, InsertOutcome, RTree, RTreeError};
