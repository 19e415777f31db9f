// R*-tree算法模块
//
// 按功能分解为不同的子模块：
// - insert: ChooseSubtree 与插入
// - split: R* 节点分裂与溢出向上传播
// - delete: 精确删除、CondenseTree 与树缩短
// - search: 范围查询
// - knn: best-first K-最近邻搜索
// - skyline: 基于支配关系的 skyline 查询
// - utils: 路径遍历与 MBR 向上调整
// - debug: 不变量检查、统计与调试输出
// - concurrent: 并发安全的R-tree包装（使用 std::sync）

pub mod concurrent;
pub mod debug;
pub mod delete;
pub mod insert;
pub mod knn;
pub mod search;
pub mod skyline;
pub mod split;
pub mod utils;
