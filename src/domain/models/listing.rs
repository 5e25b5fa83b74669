// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 字段值
///
/// 可选字段一律使用显式的 `Unknown` 标记，与空字符串区分开。
/// 字段只按照其声明的推导规则取值，从不猜测。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Field<T> {
    /// 已解析出的值
    Known(T),
    /// 未知
    Unknown,
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Field::Unknown
    }
}

impl<T> Field<T> {
    pub fn is_known(&self) -> bool {
        matches!(self, Field::Known(_))
    }

    pub fn is_unknown(&self) -> bool {
        !self.is_known()
    }

    /// 获取已知值的引用
    pub fn known(&self) -> Option<&T> {
        match self {
            Field::Known(v) => Some(v),
            Field::Unknown => None,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Field::Known(v) => Some(v),
            Field::Unknown => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Field<U> {
        match self {
            Field::Known(v) => Field::Known(f(v)),
            Field::Unknown => Field::Unknown,
        }
    }
}

impl<T> From<Option<T>> for Field<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Field::Known(v),
            None => Field::Unknown,
        }
    }
}

impl<T: fmt::Display> fmt::Display for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Known(v) => write!(f, "{}", v),
            Field::Unknown => write!(f, "未知"),
        }
    }
}

/// 单价来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceProvenance {
    /// 页面上直接给出
    Direct,
    /// 由总价和面积推算
    Derived,
}

impl PriceProvenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceProvenance::Direct => "direct",
            PriceProvenance::Derived => "derived",
        }
    }
}

/// 单价（元/平方米）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitPrice {
    pub yuan_per_sqm: f64,
    pub provenance: PriceProvenance,
}

impl UnitPrice {
    pub fn direct(yuan_per_sqm: f64) -> Self {
        Self {
            yuan_per_sqm,
            provenance: PriceProvenance::Direct,
        }
    }

    pub fn derived(yuan_per_sqm: f64) -> Self {
        Self {
            yuan_per_sqm,
            provenance: PriceProvenance::Derived,
        }
    }
}

impl fmt::Display for UnitPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.0}元/㎡", self.yuan_per_sqm)
    }
}

/// 户型
///
/// `label` 保留页面上的原始户型文本，户型分布直方图以它为键。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    pub bedrooms: u32,
    pub living_rooms: u32,
    pub label: String,
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// 朝向方位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compass {
    East,
    South,
    West,
    North,
    SouthEast,
    SouthWest,
    NorthEast,
    NorthWest,
}

impl Compass {
    /// 按匹配优先级排列：复合方位在前，单一方位在后
    pub const PRIORITY: [(&'static str, Compass); 8] = [
        ("东南", Compass::SouthEast),
        ("西南", Compass::SouthWest),
        ("东北", Compass::NorthEast),
        ("西北", Compass::NorthWest),
        ("南", Compass::South),
        ("北", Compass::North),
        ("东", Compass::East),
        ("西", Compass::West),
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Compass::East => "东",
            Compass::South => "南",
            Compass::West => "西",
            Compass::North => "北",
            Compass::SouthEast => "东南",
            Compass::SouthWest => "西南",
            Compass::NorthEast => "东北",
            Compass::NorthWest => "西北",
        }
    }
}

/// 朝向，可以是多个方位的组合（例如 "南 北"）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Orientation(pub Vec<Compass>);

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<&str> = self.0.iter().map(Compass::label).collect();
        f.write_str(&labels.join(" "))
    }
}

/// 楼层档位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FloorTier {
    Low,
    Mid,
    High,
}

impl FloorTier {
    pub fn label(&self) -> &'static str {
        match self {
            FloorTier::Low => "低楼层",
            FloorTier::Mid => "中楼层",
            FloorTier::High => "高楼层",
        }
    }
}

/// 楼层描述：档位和总层数至少有一项
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FloorDescriptor {
    pub tier: Option<FloorTier>,
    pub total_floors: Option<u32>,
}

impl fmt::Display for FloorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.tier, self.total_floors) {
            (Some(tier), Some(total)) => write!(f, "{}(共{}层)", tier.label(), total),
            (Some(tier), None) => f.write_str(tier.label()),
            (None, Some(total)) => write!(f, "共{}层", total),
            (None, None) => f.write_str("未知"),
        }
    }
}

/// 房源记录
///
/// 一次抓取中从一个列表容器里提取出的二手房信息。
/// 价格统一换算为规范单位：总价为万元，单价为元/平方米。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    /// 数据源标识
    pub source_id: String,
    /// 抓取范围（城市/区域）
    pub scope_key: String,
    /// 标题
    pub title: Field<String>,
    /// 小区名称
    pub community_name: Field<String>,
    /// 总价（万元）
    pub total_price: Field<f64>,
    /// 单价（元/平方米）
    pub unit_price: Field<UnitPrice>,
    /// 评估价（万元）
    pub eval_price: Field<f64>,
    /// 户型
    pub layout: Field<Layout>,
    /// 建筑面积（平方米）
    pub area_sqm: Field<f64>,
    /// 朝向
    pub orientation: Field<Orientation>,
    /// 楼层
    pub floor: Field<FloorDescriptor>,
    /// 建成年份
    pub build_year: Field<u16>,
    /// 规范化的房源链接
    pub canonical_url: String,
    /// 区域
    pub region: Field<String>,
}

impl ListingRecord {
    /// 创建一条所有可选字段均为未知的记录
    pub fn new(source_id: impl Into<String>, scope_key: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            scope_key: scope_key.into(),
            title: Field::Unknown,
            community_name: Field::Unknown,
            total_price: Field::Unknown,
            unit_price: Field::Unknown,
            eval_price: Field::Unknown,
            layout: Field::Unknown,
            area_sqm: Field::Unknown,
            orientation: Field::Unknown,
            floor: Field::Unknown,
            build_year: Field::Unknown,
            canonical_url: String::new(),
            region: Field::Unknown,
        }
    }

    /// 户型分布使用的键
    pub fn layout_key(&self) -> String {
        match &self.layout {
            Field::Known(layout) => layout.label.clone(),
            Field::Unknown => "未知".to_string(),
        }
    }

    /// 标题存在且非空
    pub fn has_title(&self) -> bool {
        self.title
            .known()
            .map(|t| !t.trim().is_empty())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_defaults_to_unknown() {
        let record = ListingRecord::new("ke", "北京");
        assert!(record.title.is_unknown());
        assert!(record.total_price.is_unknown());
        assert!(record.canonical_url.is_empty());
        assert!(!record.has_title());
        assert_eq!(record.layout_key(), "未知");
    }

    #[test]
    fn test_unknown_is_distinct_from_empty_text() {
        let empty: Field<String> = Field::Known(String::new());
        assert!(empty.is_known());
        assert_ne!(empty, Field::Unknown);
    }

    #[test]
    fn test_field_serialization_shape() {
        let known: Field<f64> = Field::Known(56.0);
        let json = serde_json::to_value(&known).unwrap();
        assert_eq!(json["state"], "known");
        assert_eq!(json["value"], 56.0);

        let unknown: Field<f64> = Field::Unknown;
        let json = serde_json::to_value(&unknown).unwrap();
        assert_eq!(json["state"], "unknown");
    }

    #[test]
    fn test_display_helpers() {
        let floor = FloorDescriptor {
            tier: Some(FloorTier::Mid),
            total_floors: Some(18),
        };
        assert_eq!(floor.to_string(), "中楼层(共18层)");

        let orientation = Orientation(vec![Compass::South, Compass::North]);
        assert_eq!(orientation.to_string(), "南 北");

        assert_eq!(UnitPrice::derived(20000.0).to_string(), "20000元/㎡");
        assert_eq!(Field::<u16>::Unknown.to_string(), "未知");
    }
}
