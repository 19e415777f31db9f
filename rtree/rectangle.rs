use geo::{Coord, Point, Rect};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 矩形边界框 - R*-tree 中的最小边界矩形 (MBR)
///
/// `min` 与 `max` 按 `[x, y]` 存放。点记录是退化矩形（`min == max`）。
/// 构造函数不做校验；进入索引前由 [`Rectangle::is_valid`] 判定。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    pub min: [f64; 2], // [x_min, y_min]
    pub max: [f64; 2], // [x_max, y_max]
}

impl Rectangle {
    /// 创建新的矩形（不校验边界顺序）
    pub fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Self {
        Rectangle {
            min: [x_min, y_min],
            max: [x_max, y_max],
        }
    }

    /// 创建矩形并校验，非法边界返回 `None`
    pub fn try_new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Option<Self> {
        let rect = Self::new(x_min, y_min, x_max, y_max);
        rect.is_valid().then_some(rect)
    }

    /// 创建一个点矩形
    pub fn from_point(x: f64, y: f64) -> Self {
        Rectangle {
            min: [x, y],
            max: [x, y],
        }
    }

    /// 坐标全部有限且 `min <= max`
    pub fn is_valid(&self) -> bool {
        self.min.iter().chain(self.max.iter()).all(|c| c.is_finite())
            && self.min[0] <= self.max[0]
            && self.min[1] <= self.max[1]
    }

    /// `[min_x, min_y, max_x, max_y]`
    pub fn to_array(&self) -> [f64; 4] {
        [self.min[0], self.min[1], self.max[0], self.max[1]]
    }

    /// 计算矩形面积，退化矩形为 0
    pub fn area(&self) -> f64 {
        (self.max[0] - self.min[0]) * (self.max[1] - self.min[1])
    }

    /// 计算矩形周长
    pub fn perimeter(&self) -> f64 {
        2.0 * ((self.max[0] - self.min[0]) + (self.max[1] - self.min[1]))
    }

    /// 计算两个矩形的并集MBR
    pub fn union(&self, other: &Rectangle) -> Rectangle {
        Rectangle {
            min: [self.min[0].min(other.min[0]), self.min[1].min(other.min[1])],
            max: [self.max[0].max(other.max[0]), self.max[1].max(other.max[1])],
        }
    }

    /// 判断两个矩形是否相交，边界接触也算相交
    pub fn intersects(&self, other: &Rectangle) -> bool {
        self.min[0] <= other.max[0]
            && self.max[0] >= other.min[0]
            && self.min[1] <= other.max[1]
            && self.max[1] >= other.min[1]
    }

    /// 判断当前矩形是否包含另一个矩形
    pub fn contains(&self, other: &Rectangle) -> bool {
        self.min[0] <= other.min[0]
            && self.min[1] <= other.min[1]
            && self.max[0] >= other.max[0]
            && self.max[1] >= other.max[1]
    }

    /// 判断当前矩形是否包含一个点
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        self.min[0] <= x && x <= self.max[0] && self.min[1] <= y && y <= self.max[1]
    }

    /// 扩大到包含另一个矩形所需的面积增量（ChooseSubtree 的代价）
    pub fn enlargement(&self, other: &Rectangle) -> f64 {
        (self.union(other).area() - self.area()).max(0.0)
    }

    /// 计算两个矩形的交集面积
    pub fn intersection_area(&self, other: &Rectangle) -> f64 {
        if !self.intersects(other) {
            return 0.0;
        }

        let x_overlap = self.max[0].min(other.max[0]) - self.min[0].max(other.min[0]);
        let y_overlap = self.max[1].min(other.max[1]) - self.min[1].max(other.min[1]);

        x_overlap * y_overlap
    }

    /// 点到矩形的最小欧氏距离，点在矩形内部或边上时为 0
    ///
    /// 按轴截断求最近点，而不是到中心的距离：中心距离不是下界，不能用于剪枝。
    pub fn min_distance(&self, x: f64, y: f64) -> f64 {
        let dx = (self.min[0] - x).max(0.0).max(x - self.max[0]);
        let dy = (self.min[1] - y).max(0.0).max(y - self.max[1]);
        dx.hypot(dy)
    }

    /// 同 [`Rectangle::min_distance`]，参数为 `geo::Point`
    pub fn distance_to_point(&self, point: &Point<f64>) -> f64 {
        self.min_distance(point.x(), point.y())
    }

    /// 计算矩形中心点
    pub fn center(&self) -> [f64; 2] {
        [
            (self.min[0] + self.max[0]) / 2.0,
            (self.min[1] + self.max[1]) / 2.0,
        ]
    }

    /// 判断矩形是否为点（宽度和高度都为0）
    pub fn is_point(&self) -> bool {
        self.min[0] == self.max[0] && self.min[1] == self.max[1]
    }

    /// 一组矩形的并集，空输入返回 `None`
    pub fn union_all<'a, I>(rects: I) -> Option<Rectangle>
    where
        I: IntoIterator<Item = &'a Rectangle>,
    {
        rects
            .into_iter()
            .fold(None, |acc: Option<Rectangle>, rect| match acc {
                Some(acc) => Some(acc.union(rect)),
                None => Some(*rect),
            })
    }
}

impl fmt::Display for Rectangle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.min[0], self.min[1], self.max[0], self.max[1]
        )
    }
}

impl From<Rect<f64>> for Rectangle {
    fn from(rect: Rect<f64>) -> Self {
        Rectangle::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }
}

impl From<Rectangle> for Rect<f64> {
    fn from(rect: Rectangle) -> Self {
        Rect::new(
            Coord {
                x: rect.min[0],
                y: rect.min[1],
            },
            Coord {
                x: rect.max[0],
                y: rect.max[1],
            },
        )
    }
}

impl From<Point<f64>> for Rectangle {
    fn from(point: Point<f64>) -> Self {
        Rectangle::from_point(point.x(), point.y())
    }
}
