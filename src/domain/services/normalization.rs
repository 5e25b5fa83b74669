// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 字段文本规范化
//!
//! 把页面上抓到的原始片段转换为结构化的字段值。
//! 总价规范单位为万元，单价规范单位为元/平方米。

use crate::domain::models::listing::{
    Compass, Field, FloorDescriptor, FloorTier, Layout, Orientation, UnitPrice,
};
use crate::domain::models::rule_set::PriceUnit;
use once_cell::sync::Lazy;
use regex::Regex;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));
static SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid space regex"));
static MAGNITUDE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d[\d,]*(?:\.\d+)?)\s*(亿|万|元)?").expect("valid magnitude regex")
});
static NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("valid number regex"));
static LAYOUT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+|多)室(?:(\d+|多)厅)?").expect("valid layout regex")
});
static TOTAL_FLOORS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s*层").expect("valid floor regex"));
static YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\D)(\d{4})(?:\D|$)").expect("valid year regex"));

impl PriceUnit {
    /// 换算到万元的系数
    fn to_wan(self) -> f64 {
        match self {
            PriceUnit::Yi => 10000.0,
            PriceUnit::Wan => 1.0,
            PriceUnit::Yuan => 0.0001,
        }
    }

    /// 换算到元的系数
    fn to_yuan(self) -> f64 {
        match self {
            PriceUnit::Yi => 100_000_000.0,
            PriceUnit::Wan => 10000.0,
            PriceUnit::Yuan => 1.0,
        }
    }

    fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            "亿" => Some(PriceUnit::Yi),
            "万" => Some(PriceUnit::Wan),
            "元" => Some(PriceUnit::Yuan),
            _ => None,
        }
    }
}

/// 去掉标签、解码实体并压缩空白
pub fn clean_text(raw: &str) -> String {
    let stripped = TAG_RE.replace_all(raw, " ");
    let decoded = html_escape::decode_html_entities(&stripped);
    SPACE_RE.replace_all(decoded.trim(), " ").into_owned()
}

/// 小区名：在 `clean_text` 的基础上去掉全部空白和引号
pub fn clean_community(raw: &str) -> String {
    clean_text(raw)
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '"' | '\'' | '“' | '”' | '‘' | '’'))
        .collect()
}

/// 解析数值和单位标记
fn parse_magnitude(text: &str) -> Option<(f64, Option<PriceUnit>)> {
    let caps = MAGNITUDE_RE.captures(text)?;
    let number = caps.get(1)?.as_str().replace(',', "");
    let value: f64 = number.parse().ok()?;
    let unit = caps.get(2).and_then(|m| PriceUnit::from_marker(m.as_str()));
    Some((value, unit))
}

/// 总价规范化，结果为万元
///
/// ```
/// use housecrawl::domain::models::listing::Field;
/// use housecrawl::domain::services::normalization::normalize;
///
/// assert_eq!(normalize("56万"), Field::Known(56.0));
/// assert_eq!(normalize("1.2亿"), Field::Known(12000.0));
/// assert_eq!(normalize("未知"), Field::Unknown);
/// ```
pub fn normalize(text: &str) -> Field<f64> {
    normalize_total_price(text, PriceUnit::Wan)
}

/// 总价规范化，没有单位标记时使用 `default_unit`
pub fn normalize_total_price(text: &str, default_unit: PriceUnit) -> Field<f64> {
    let cleaned = clean_text(text);
    match parse_magnitude(&cleaned) {
        Some((value, unit)) if value > 0.0 => {
            let unit = unit.unwrap_or(default_unit);
            Field::Known(round_to(value * unit.to_wan(), 4))
        }
        _ => Field::Unknown,
    }
}

/// 单价规范化，结果为元/平方米
pub fn normalize_unit_price(text: &str) -> Field<f64> {
    let cleaned = clean_text(text);
    match parse_magnitude(&cleaned) {
        Some((value, unit)) if value > 0.0 => {
            let unit = unit.unwrap_or(PriceUnit::Yuan);
            Field::Known(round_to(value * unit.to_yuan(), 2))
        }
        _ => Field::Unknown,
    }
}

/// 由总价和面积推算单价
///
/// `total * factor / area`，按 `decimals` 位四舍五入，并标记为推算值。
pub fn derive_unit_price(total: f64, area: f64, factor: f64, decimals: u32) -> Option<UnitPrice> {
    if total <= 0.0 || area <= 0.0 || !total.is_finite() || !area.is_finite() {
        return None;
    }
    Some(UnitPrice::derived(round_to(total * factor / area, decimals)))
}

/// 面积（平方米）
pub fn parse_area(text: &str) -> Field<f64> {
    NUMBER_RE
        .find(&clean_text(text))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|v| *v > 0.0)
        .into()
}

/// 户型
///
/// 只有卧室数时按 `assumed_living_rooms` 补全客厅数；数量写作 "多" 时无法确定，视为未知。
pub fn parse_layout(text: &str, assumed_living_rooms: u32) -> Field<Layout> {
    let cleaned = clean_text(text);
    let Some(caps) = LAYOUT_RE.captures(&cleaned) else {
        return Field::Unknown;
    };
    let Some(bedrooms) = caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok()) else {
        return Field::Unknown;
    };
    let living_rooms = match caps.get(2) {
        Some(m) => match m.as_str().parse::<u32>() {
            Ok(v) => v,
            Err(_) => return Field::Unknown,
        },
        None => assumed_living_rooms,
    };

    Field::Known(Layout {
        bedrooms,
        living_rooms,
        label: cleaned.replace(' ', ""),
    })
}

/// 楼层
pub fn parse_floor(text: &str) -> Field<FloorDescriptor> {
    let cleaned = clean_text(text);
    let tier = if cleaned.contains("底层") || cleaned.contains("低楼层") {
        Some(FloorTier::Low)
    } else if cleaned.contains("中楼层") {
        Some(FloorTier::Mid)
    } else if cleaned.contains("高楼层") || cleaned.contains("顶层") {
        Some(FloorTier::High)
    } else {
        None
    };
    let total_floors = TOTAL_FLOORS_RE
        .captures(&cleaned)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok());

    if tier.is_none() && total_floors.is_none() {
        return Field::Unknown;
    }
    Field::Known(FloorDescriptor { tier, total_floors })
}

/// 朝向
///
/// 按优先级扫描方位词，复合方位会占用它的字符，避免 "东南" 再被计为 "东" 和 "南"。
pub fn parse_orientation(text: &str) -> Field<Orientation> {
    let mut remaining = clean_text(text);
    let mut found: Vec<(usize, Compass)> = Vec::new();

    for (word, compass) in Compass::PRIORITY {
        while let Some(pos) = remaining.find(word) {
            if !found.iter().any(|(_, c)| *c == compass) {
                found.push((pos, compass));
            }
            remaining.replace_range(pos..pos + word.len(), &"#".repeat(word.len()));
        }
    }

    if found.is_empty() {
        return Field::Unknown;
    }
    found.sort_by_key(|(pos, _)| *pos);
    Field::Known(Orientation(found.into_iter().map(|(_, c)| c).collect()))
}

/// 建成年份，只接受 1900 到 2100 之间的值
pub fn parse_build_year(text: &str) -> Field<u16> {
    let cleaned = clean_text(text);
    YEAR_RE
        .captures(&cleaned)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u16>().ok())
        .filter(|y| (1900..=2100).contains(y))
        .into()
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10_f64.powi(decimals as i32);
    (value * factor).round() / factor
}
