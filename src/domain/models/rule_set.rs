// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::utils::errors::ConfigurationError;
use crate::utils::url_utils::{random_log_id, random_pvid};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// 提取规则集
///
/// 每个数据源一份的声明式配置，从 YAML/JSON 文件加载，运行期间只读。
/// 通用的提取引擎解释这些规则，不同数据源之间不需要任何专用代码。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRuleSet {
    /// 数据源标识
    pub source_id: String,
    /// 规则版本，便于追踪
    #[serde(default)]
    pub version: Option<String>,
    /// 解析相对链接时使用的站点地址
    pub base_url: String,
    /// 预热会话时先访问的页面
    #[serde(default)]
    pub bootstrap_url: Option<String>,
    /// Referer 请求头
    #[serde(default)]
    pub referer: Option<String>,
    /// 分页地址规则
    pub pagination: PaginationRule,
    /// 范围名到站点标识的映射（城市拼音、区域编码等）
    #[serde(default)]
    pub scope_aliases: BTreeMap<String, String>,
    /// 范围不在映射表中时的处理方式
    #[serde(default)]
    pub scope_fallback: ScopeFallback,
    /// 命中这些地址片段的页面由脚本渲染，需要更长的等待时间
    #[serde(default)]
    pub script_rendered_markers: Vec<String>,
    /// 数据源专属的风控标记，与全局标记合并使用
    #[serde(default)]
    pub risk_markers: Vec<String>,
    /// 容器边界规则
    pub container: ContainerRule,
    /// 容器内包含这些文本时整体丢弃（例如已结束的拍卖）
    #[serde(default)]
    pub container_exclusions: Vec<String>,
    /// 非住宅关键字，标题包含任一关键字即丢弃
    #[serde(default)]
    pub exclusion_keywords: Vec<String>,
    /// 字段提取器
    pub fields: Vec<FieldExtractor>,
    /// 链接规范化时去掉的查询参数
    #[serde(default)]
    pub canonical_strip_params: Vec<String>,
    /// 隐含的业务默认值
    #[serde(default)]
    pub defaults: ExtractionDefaults,
}

/// 未登记范围的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScopeFallback {
    /// 拒绝提交
    #[default]
    Reject,
    /// 取每个汉字的拼音首字母（例如 郑州 → zz）
    PinyinInitials,
}

/// 分页规则
///
/// 模板中可用的占位符：`{scope}`、`{page}`、`{pvid}`、`{log_id}`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginationRule {
    pub url_template: String,
    /// 站点允许的最大页码
    #[serde(default)]
    pub max_page: Option<u32>,
}

/// 容器边界规则
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ContainerRule {
    /// 正则全局匹配，每次匹配的指定分组即一个容器
    Regex {
        pattern: String,
        #[serde(default)]
        group: usize,
    },
    /// CSS选择器，每个命中元素的外部HTML即一个容器
    Selector { css: String },
}

/// 规则作用的文本范围
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TextScope {
    /// 容器原始标记
    #[default]
    Markup,
    /// 去掉标签后的容器文本
    Text,
    /// 已经提取出的标题
    Title,
}

/// 单条匹配规则
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum PatternRule {
    /// 正则匹配，取指定分组
    ///
    /// 设置 `within` 时先用它的第一个分组把容器收窄到某一区块，
    /// `markup` 和 `text` 范围都只作用于该区块。
    Regex {
        pattern: String,
        #[serde(default = "default_group")]
        group: usize,
        #[serde(default)]
        scope: TextScope,
        #[serde(default)]
        within: Option<String>,
    },
    /// CSS选择器，取文本或属性
    Selector {
        css: String,
        #[serde(default)]
        attr: Option<String>,
    },
    /// 先用正则取出一段文本，再按分隔符切分取第 `index` 段（负数从末尾计）
    Segment {
        pattern: String,
        #[serde(default = "default_group")]
        group: usize,
        #[serde(default)]
        scope: TextScope,
        #[serde(default)]
        within: Option<String>,
        separator: String,
        index: i32,
    },
}

fn default_group() -> usize {
    1
}

/// 字段类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Title,
    CommunityName,
    TotalPrice,
    UnitPrice,
    EvalPrice,
    Layout,
    Area,
    Floor,
    Orientation,
    BuildYear,
    CanonicalUrl,
    Region,
}

impl FieldKind {
    /// 标题之后的字段按此顺序提取；标题先提取，随后执行非住宅过滤
    pub const AFTER_TITLE: [FieldKind; 11] = [
        FieldKind::CommunityName,
        FieldKind::TotalPrice,
        FieldKind::UnitPrice,
        FieldKind::EvalPrice,
        FieldKind::Layout,
        FieldKind::Area,
        FieldKind::Floor,
        FieldKind::Orientation,
        FieldKind::BuildYear,
        FieldKind::CanonicalUrl,
        FieldKind::Region,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Title => "title",
            FieldKind::CommunityName => "community_name",
            FieldKind::TotalPrice => "total_price",
            FieldKind::UnitPrice => "unit_price",
            FieldKind::EvalPrice => "eval_price",
            FieldKind::Layout => "layout",
            FieldKind::Area => "area",
            FieldKind::Floor => "floor",
            FieldKind::Orientation => "orientation",
            FieldKind::BuildYear => "build_year",
            FieldKind::CanonicalUrl => "canonical_url",
            FieldKind::Region => "region",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 字段提取器：按优先级排列的规则链，第一个成功的规则生效
///
/// `combine` 为真时改为合并所有命中规则的文本后统一解析，用于朝向这类
/// 分散在标题和基础信息中的字段。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldExtractor {
    pub field: FieldKind,
    pub rules: Vec<PatternRule>,
    #[serde(default)]
    pub combine: bool,
}

/// 价格单位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PriceUnit {
    /// 亿元
    Yi,
    /// 万元
    #[default]
    Wan,
    /// 元
    Yuan,
}

/// 业务默认值
///
/// 原有实现中隐含的假设，统一作为可覆盖的命名配置。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionDefaults {
    /// 只解析出卧室数时假定的客厅数
    #[serde(default = "default_living_rooms")]
    pub assumed_living_rooms: u32,
    /// 推算单价时的换算系数（万元到元）
    #[serde(default = "default_unit_factor")]
    pub derived_unit_factor: f64,
    /// 推算单价保留的小数位
    #[serde(default)]
    pub unit_price_decimals: u32,
    /// 总价没有单位标记时采用的单位
    #[serde(default)]
    pub total_price_unit: PriceUnit,
}

fn default_living_rooms() -> u32 {
    1
}

fn default_unit_factor() -> f64 {
    10000.0
}

impl Default for ExtractionDefaults {
    fn default() -> Self {
        Self {
            assumed_living_rooms: default_living_rooms(),
            derived_unit_factor: default_unit_factor(),
            unit_price_decimals: 0,
            total_price_unit: PriceUnit::Wan,
        }
    }
}

impl ExtractionRuleSet {
    /// 从 YAML 文本加载
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigurationError> {
        serde_yaml::from_str(text).map_err(|e| ConfigurationError::Parse(e.to_string()))
    }

    /// 从 JSON 文本加载
    pub fn from_json_str(text: &str) -> Result<Self, ConfigurationError> {
        serde_json::from_str(text).map_err(|e| ConfigurationError::Parse(e.to_string()))
    }

    /// 从文件加载，按扩展名区分 JSON 和 YAML
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigurationError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&text),
            _ => Self::from_yaml_str(&text),
        }
    }

    /// 查找某个字段的提取器
    pub fn extractor(&self, field: FieldKind) -> Option<&FieldExtractor> {
        self.fields.iter().find(|f| f.field == field)
    }

    /// 把抓取范围解析为站点标识
    ///
    /// 未配置别名时原样使用；配置了别名时范围必须是别名的键或值之一，
    /// 否则按 `scope_fallback` 处理。
    pub fn resolve_scope(&self, scope_key: &str) -> Result<String, ConfigurationError> {
        let scope_key = scope_key.trim();
        if self.scope_aliases.is_empty() {
            return Ok(scope_key.to_string());
        }
        if let Some(alias) = self.scope_aliases.get(scope_key) {
            return Ok(alias.clone());
        }
        if self.scope_aliases.values().any(|v| v == scope_key) {
            return Ok(scope_key.to_string());
        }
        if self.scope_fallback == ScopeFallback::PinyinInitials {
            if let Some(initials) = pinyin_initials(scope_key) {
                return Ok(initials);
            }
        }
        Err(ConfigurationError::UnsupportedScope {
            source_id: self.source_id.clone(),
            scope: scope_key.to_string(),
        })
    }

    /// 生成第 `page` 页的地址，超出站点最大页码时返回 `None`
    pub fn page_url(&self, scope_slug: &str, page: u32) -> Option<String> {
        if page == 0 || self.pagination.max_page.is_some_and(|max| page > max) {
            return None;
        }
        Some(
            self.pagination
                .url_template
                .replace("{scope}", scope_slug)
                .replace("{page}", &page.to_string())
                .replace("{pvid}", &random_pvid())
                .replace("{log_id}", &random_log_id()),
        )
    }
}

/// 拼音首字母
///
/// 汉字取音译的首字母，ASCII 字母数字原样转小写，无法音译的字符使整体失败。
fn pinyin_initials(name: &str) -> Option<String> {
    let mut initials = String::new();
    for c in name.chars() {
        if c.is_whitespace() {
            continue;
        }
        if c.is_ascii_alphanumeric() {
            initials.push(c.to_ascii_lowercase());
            continue;
        }
        let first = deunicode::deunicode_char(c)?
            .chars()
            .find(|ch| ch.is_ascii_alphabetic())?;
        initials.push(first.to_ascii_lowercase());
    }
    (!initials.is_empty()).then_some(initials)
}
