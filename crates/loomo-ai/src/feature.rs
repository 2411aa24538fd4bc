//! 视觉特征
//!
//! 颜色分割和标志识别在上游完成，这里只定义它们交给运动 AI 的数据。

use loomo_geometry::{DistanceLookup, GroundPoint, PixelPoint, PixelRect};

/// 检测到的一个色块
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Feature {
    /// 色块中心（像素）
    pub image_pos: PixelPoint,
    pub bounds: PixelRect,
    /// 地面位置；上游没有投影时为 `None`
    pub ground_pos: Option<GroundPoint>,
}

impl Feature {
    pub fn new(image_pos: PixelPoint) -> Self {
        Self {
            image_pos,
            bounds: PixelRect::new(image_pos, image_pos),
            ground_pos: None,
        }
    }

    pub fn with_ground_pos(mut self, ground_pos: GroundPoint) -> Self {
        self.ground_pos = Some(ground_pos);
        self
    }

    /// 地面位置，缺失时用查找表从像素投影
    pub fn ground(&self, lookup: &DistanceLookup) -> Option<GroundPoint> {
        self.ground_pos
            .or_else(|| lookup.distance_at(self.image_pos).ok())
    }
}

/// 一帧中的两组车道标记
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureBatch {
    /// 第一组（路径起点在左侧）
    pub left: Vec<Feature>,
    /// 第二组（路径起点在右侧）
    pub right: Vec<Feature>,
}

impl FeatureBatch {
    pub fn new(left: Vec<Feature>, right: Vec<Feature>) -> Self {
        Self { left, right }
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty() && self.right.is_empty()
    }
}

/// 识别出的交通标志
#[derive(Debug, Clone, PartialEq)]
pub struct TrafficSignFeature {
    pub feature: Feature,
    /// 分类名称，如 `"stop"`、`"uturn"`
    pub name: String,
    /// 上游跟踪编号；同一个物理标志在连续帧中编号不变
    pub index: i64,
}

impl TrafficSignFeature {
    pub fn new(feature: Feature, name: impl Into<String>, index: i64) -> Self {
        Self {
            feature,
            name: name.into(),
            index,
        }
    }
}

/// 已知的标志种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignKind {
    Stop,
    Uturn,
}

impl SignKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "stop" => Some(SignKind::Stop),
            "uturn" => Some(SignKind::Uturn),
            _ => None,
        }
    }
}

/// 离摄像头最近的特征（图像中最靠下的那个）
///
/// 行号相同时取先出现的。
pub fn nearest(features: &[Feature]) -> Option<&Feature> {
    features.iter().fold(None, |best: Option<&Feature>, f| match best {
        Some(b) if b.image_pos.y >= f.image_pos.y => Some(b),
        _ => Some(f),
    })
}

pub(crate) fn pixels(features: &[Feature]) -> Vec<PixelPoint> {
    features.iter().map(|f| f.image_pos).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(x: i32, y: i32) -> Feature {
        Feature::new(PixelPoint::new(x, y))
    }

    #[test]
    fn test_nearest_is_lowest_in_image() {
        let features = [at(10, 300), at(20, 450), at(30, 400)];
        assert_eq!(nearest(&features).unwrap().image_pos.x, 20);
        assert!(nearest(&[]).is_none());
    }

    #[test]
    fn test_nearest_prefers_first_on_tie() {
        let features = [at(1, 400), at(2, 400)];
        assert_eq!(nearest(&features).unwrap().image_pos.x, 1);
    }

    #[test]
    fn test_ground_falls_back_to_lookup() {
        let lookup = DistanceLookup::new();
        let projected = at(320, 400).ground(&lookup).unwrap();
        assert_eq!(projected, lookup.distance(320, 400).unwrap());

        let explicit = at(320, 100).with_ground_pos(GroundPoint::new(1.0, 2.0));
        assert_eq!(explicit.ground(&lookup), Some(GroundPoint::new(1.0, 2.0)));
        assert_eq!(at(320, 100).ground(&lookup), None);
    }

    #[test]
    fn test_sign_names() {
        assert_eq!(SignKind::from_name("stop"), Some(SignKind::Stop));
        assert_eq!(SignKind::from_name("uturn"), Some(SignKind::Uturn));
        assert_eq!(SignKind::from_name("yield"), None);
    }
}
