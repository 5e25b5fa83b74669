// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::listing::{Field, ListingRecord, UnitPrice};
use crate::domain::models::report::DiagnosticsSummary;
use crate::domain::models::rule_set::{
    ContainerRule, ExtractionRuleSet, FieldKind, PatternRule, TextScope,
};
use crate::domain::services::normalization::{
    clean_community, clean_text, derive_unit_price, normalize_total_price, normalize_unit_price,
    parse_area, parse_build_year, parse_floor, parse_layout, parse_orientation,
};
use crate::utils::errors::ConfigurationError;
use crate::utils::url_utils::canonicalize_url;
use regex::{Regex, RegexBuilder};
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use url::Url;

/// 正则编译的大小上限，容器规则中常有较长的惰性匹配
const REGEX_SIZE_LIMIT: usize = 64 * (1 << 20);

/// 编译后的规则
enum CompiledRule {
    Regex {
        re: Regex,
        group: usize,
        scope: TextScope,
        within: Option<Regex>,
    },
    Selector {
        selector: Selector,
        attr: Option<String>,
    },
    Segment {
        re: Regex,
        group: usize,
        scope: TextScope,
        within: Option<Regex>,
        separator: String,
        index: i32,
    },
}

enum CompiledContainer {
    Regex { re: Regex, group: usize },
    Selector(Selector),
}

/// 编译后的规则集
///
/// 在任务提交时由 [`ExtractionRuleSet`] 编译得到，任何无效的正则或选择器
/// 都会在这里以 [`ConfigurationError`] 的形式同步返回。
pub struct CompiledRuleSet {
    source: ExtractionRuleSet,
    base_url: Url,
    container: CompiledContainer,
    fields: Vec<CompiledField>,
}

/// 编译后的字段规则链
struct CompiledField {
    kind: FieldKind,
    combine: bool,
    chain: Vec<CompiledRule>,
}

impl std::fmt::Debug for CompiledRuleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledRuleSet")
            .field("source_id", &self.source.source_id)
            .field("fields", &self.fields.len())
            .finish()
    }
}

fn compile_regex(field: &str, pattern: &str) -> Result<Regex, ConfigurationError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .size_limit(REGEX_SIZE_LIMIT)
        .build()
        .map_err(|e| ConfigurationError::InvalidRegex {
            field: field.to_string(),
            message: e.to_string(),
        })
}

fn compile_within(field: &str, pattern: Option<&str>) -> Result<Option<Regex>, ConfigurationError> {
    pattern.map(|p| compile_regex(field, p)).transpose()
}

fn compile_selector(field: &str, css: &str) -> Result<Selector, ConfigurationError> {
    Selector::parse(css).map_err(|_| ConfigurationError::InvalidSelector {
        field: field.to_string(),
        css: css.to_string(),
    })
}

impl CompiledRuleSet {
    /// 校验并编译规则集
    pub fn compile(rules: ExtractionRuleSet) -> Result<Self, ConfigurationError> {
        for mandatory in [FieldKind::Title, FieldKind::CanonicalUrl] {
            match rules.extractor(mandatory) {
                Some(extractor) if !extractor.rules.is_empty() => {}
                _ => return Err(ConfigurationError::MissingExtractor(mandatory.to_string())),
            }
        }

        if !rules.pagination.url_template.contains("{page}") {
            return Err(ConfigurationError::Invalid(format!(
                "pagination template of {} has no {{page}} placeholder",
                rules.source_id
            )));
        }

        let base_url = Url::parse(&rules.base_url).map_err(|e| {
            ConfigurationError::Invalid(format!("base_url {}: {}", rules.base_url, e))
        })?;

        let container = match &rules.container {
            ContainerRule::Regex { pattern, group } => CompiledContainer::Regex {
                re: compile_regex("container", pattern)?,
                group: *group,
            },
            ContainerRule::Selector { css } => {
                CompiledContainer::Selector(compile_selector("container", css)?)
            }
        };

        let mut fields = Vec::with_capacity(rules.fields.len());
        for extractor in &rules.fields {
            let name = extractor.field.as_str();
            let mut chain = Vec::with_capacity(extractor.rules.len());
            for rule in &extractor.rules {
                chain.push(match rule {
                    PatternRule::Regex {
                        pattern,
                        group,
                        scope,
                        within,
                    } => CompiledRule::Regex {
                        re: compile_regex(name, pattern)?,
                        group: *group,
                        scope: *scope,
                        within: compile_within(name, within.as_deref())?,
                    },
                    PatternRule::Selector { css, attr } => CompiledRule::Selector {
                        selector: compile_selector(name, css)?,
                        attr: attr.clone(),
                    },
                    PatternRule::Segment {
                        pattern,
                        group,
                        scope,
                        within,
                        separator,
                        index,
                    } => CompiledRule::Segment {
                        re: compile_regex(name, pattern)?,
                        group: *group,
                        scope: *scope,
                        within: compile_within(name, within.as_deref())?,
                        separator: separator.clone(),
                        index: *index,
                    },
                });
            }
            fields.push(CompiledField {
                kind: extractor.field,
                combine: extractor.combine,
                chain,
            });
        }

        Ok(Self {
            source: rules,
            base_url,
            container,
            fields,
        })
    }

    /// 原始规则集
    pub fn rules(&self) -> &ExtractionRuleSet {
        &self.source
    }

    pub fn source_id(&self) -> &str {
        &self.source.source_id
    }

    fn field(&self, kind: FieldKind) -> Option<&CompiledField> {
        self.fields.iter().find(|f| f.kind == kind)
    }

    /// 把页面切分成容器
    fn containers(&self, markup: &str) -> Vec<String> {
        match &self.container {
            CompiledContainer::Regex { re, group } => re
                .captures_iter(markup)
                .filter_map(|caps| caps.get(*group).map(|m| m.as_str().to_string()))
                .collect(),
            CompiledContainer::Selector(selector) => {
                let document = Html::parse_document(markup);
                document.select(selector).map(|el| el.html()).collect()
            }
        }
    }
}

/// 诊断类别
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum DiagnosticKind {
    /// 页面中没有识别到任何容器
    NoContainers,
    /// 容器包含排除标记（如已结束）
    ContainerExcluded { marker: String },
    /// 标题包含非住宅关键字
    NonResidential { keyword: String },
    /// 字段规则链全部未命中
    FieldMiss { field: FieldKind },
    /// 单价由总价和面积推算
    DerivedUnitPrice,
}

/// 提取诊断
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// 容器序号，从0开始
    pub container_index: usize,
    #[serde(flatten)]
    pub kind: DiagnosticKind,
}

/// 一页的提取结果
#[derive(Debug, Clone, Default)]
pub struct ExtractionOutput {
    /// 候选记录，去重在接收阶段完成
    pub records: Vec<ListingRecord>,
    pub diagnostics: Vec<Diagnostic>,
    pub containers: usize,
    pub excluded: usize,
}

impl ExtractionOutput {
    /// 将本页诊断累加到任务级统计
    pub fn merge_into(&self, summary: &mut DiagnosticsSummary) {
        summary.containers += self.containers;
        summary.excluded += self.excluded;
        for diagnostic in &self.diagnostics {
            if let DiagnosticKind::FieldMiss { field } = &diagnostic.kind {
                *summary
                    .field_misses
                    .entry(field.as_str().to_string())
                    .or_insert(0) += 1;
            }
        }
    }
}

/// 单个容器的匹配上下文
struct ContainerContext<'a> {
    markup: &'a str,
    text: String,
    title: Option<String>,
    fragment: Option<Html>,
}

impl<'a> ContainerContext<'a> {
    fn new(markup: &'a str) -> Self {
        Self {
            markup,
            text: clean_text(markup),
            title: None,
            fragment: None,
        }
    }

    fn scope_text(&self, scope: TextScope, within: Option<&Regex>) -> Option<Cow<'_, str>> {
        let Some(section_re) = within else {
            return match scope {
                TextScope::Markup => Some(Cow::Borrowed(self.markup)),
                TextScope::Text => Some(Cow::Borrowed(self.text.as_str())),
                TextScope::Title => self.title.as_deref().map(Cow::Borrowed),
            };
        };
        if scope == TextScope::Title {
            return self.title.as_deref().map(Cow::Borrowed);
        }
        let section = section_re.captures(self.markup)?.get(1)?.as_str();
        match scope {
            TextScope::Text => Some(Cow::Owned(clean_text(section))),
            _ => Some(Cow::Borrowed(section)),
        }
    }

    fn fragment(&mut self) -> &Html {
        let markup = self.markup;
        self.fragment
            .get_or_insert_with(|| Html::parse_fragment(markup))
    }

    /// 执行一条规则，返回捕获到的原始文本
    fn apply(&mut self, rule: &CompiledRule) -> Option<String> {
        match rule {
            CompiledRule::Regex {
                re,
                group,
                scope,
                within,
            } => {
                let haystack = self.scope_text(*scope, within.as_ref())?;
                let caps = re.captures(&haystack)?;
                caps.get(*group).map(|m| m.as_str().to_string())
            }
            CompiledRule::Selector { selector, attr } => {
                let fragment = self.fragment();
                let element = fragment.select(selector).next()?;
                match attr {
                    Some(name) => element.value().attr(name).map(str::to_string),
                    None => Some(element.text().collect::<Vec<_>>().join("")),
                }
            }
            CompiledRule::Segment {
                re,
                group,
                scope,
                within,
                separator,
                index,
            } => {
                let haystack = self.scope_text(*scope, within.as_ref())?;
                let caps = re.captures(&haystack)?;
                let captured = clean_text(caps.get(*group)?.as_str());
                let segments: Vec<&str> = captured
                    .split(separator.as_str())
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .collect();
                let position = if *index < 0 {
                    segments.len().checked_sub(index.unsigned_abs() as usize)?
                } else {
                    *index as usize
                };
                segments.get(position).map(|s| s.to_string())
            }
        }
    }

    /// 依次尝试规则链，第一个能被解析的结果生效；合并模式下拼接全部命中文本后解析一次
    fn first_match<T>(
        &mut self,
        field: &CompiledField,
        mut parse: impl FnMut(&str) -> Field<T>,
    ) -> Field<T> {
        if field.combine {
            let captured: Vec<String> = field
                .chain
                .iter()
                .filter_map(|rule| self.apply(rule))
                .collect();
            if captured.is_empty() {
                return Field::Unknown;
            }
            return parse(&captured.join(" "));
        }
        for rule in &field.chain {
            if let Some(raw) = self.apply(rule) {
                if let Field::Known(value) = parse(&raw) {
                    return Field::Known(value);
                }
            }
        }
        Field::Unknown
    }
}

fn non_empty(text: String) -> Field<String> {
    if text.is_empty() {
        Field::Unknown
    } else {
        Field::Known(text)
    }
}

/// 提取服务
///
/// 通用的字段提取引擎：按规则集切分容器，再按固定顺序提取每个字段。
/// 单个字段未命中只会记录诊断，不会中断整个容器。
pub struct ExtractionService;

impl ExtractionService {
    /// 从一页标记中提取候选房源
    ///
    /// # 参数
    ///
    /// * `markup` - 渲染后的页面HTML
    /// * `rules` - 编译后的规则集
    /// * `scope_key` - 抓取范围，写入每条记录
    pub fn extract(markup: &str, rules: &CompiledRuleSet, scope_key: &str) -> ExtractionOutput {
        let containers = rules.containers(markup);
        let mut output = ExtractionOutput {
            containers: containers.len(),
            ..Default::default()
        };

        if containers.is_empty() {
            output.diagnostics.push(Diagnostic {
                container_index: 0,
                kind: DiagnosticKind::NoContainers,
            });
            return output;
        }

        for (index, container) in containers.iter().enumerate() {
            if let Some(record) =
                Self::extract_container(index, container, rules, scope_key, &mut output)
            {
                output.records.push(record);
            }
        }

        output
    }

    fn extract_container(
        index: usize,
        container: &str,
        rules: &CompiledRuleSet,
        scope_key: &str,
        output: &mut ExtractionOutput,
    ) -> Option<ListingRecord> {
        let definition = rules.rules();
        let defaults = &definition.defaults;

        if let Some(marker) = definition
            .container_exclusions
            .iter()
            .find(|m| container.contains(m.as_str()))
        {
            output.excluded += 1;
            output.diagnostics.push(Diagnostic {
                container_index: index,
                kind: DiagnosticKind::ContainerExcluded {
                    marker: marker.clone(),
                },
            });
            return None;
        }

        let mut ctx = ContainerContext::new(container);
        let mut record = ListingRecord::new(rules.source_id(), scope_key);
        let miss = |field: FieldKind, output: &mut ExtractionOutput| {
            output.diagnostics.push(Diagnostic {
                container_index: index,
                kind: DiagnosticKind::FieldMiss { field },
            });
        };

        if let Some(extractor) = rules.field(FieldKind::Title) {
            record.title = ctx.first_match(extractor, |raw| non_empty(clean_text(raw)));
        }
        match record.title.known() {
            Some(title) => {
                let lowered = title.to_lowercase();
                if let Some(keyword) = definition
                    .exclusion_keywords
                    .iter()
                    .find(|k| lowered.contains(&k.to_lowercase()))
                {
                    output.excluded += 1;
                    output.diagnostics.push(Diagnostic {
                        container_index: index,
                        kind: DiagnosticKind::NonResidential {
                            keyword: keyword.clone(),
                        },
                    });
                    return None;
                }
                ctx.title = Some(title.clone());
            }
            None => miss(FieldKind::Title, output),
        }

        for field in FieldKind::AFTER_TITLE {
            let Some(extractor) = rules.field(field) else {
                continue;
            };
            let found = match field {
                FieldKind::CommunityName => {
                    record.community_name =
                        ctx.first_match(extractor, |raw| non_empty(clean_community(raw)));
                    record.community_name.is_known()
                }
                FieldKind::TotalPrice => {
                    record.total_price = ctx.first_match(extractor, |raw| {
                        normalize_total_price(raw, defaults.total_price_unit)
                    });
                    record.total_price.is_known()
                }
                FieldKind::UnitPrice => {
                    record.unit_price = ctx
                        .first_match(extractor, normalize_unit_price)
                        .map(UnitPrice::direct);
                    record.unit_price.is_known()
                }
                FieldKind::EvalPrice => {
                    record.eval_price = ctx.first_match(extractor, |raw| {
                        normalize_total_price(raw, defaults.total_price_unit)
                    });
                    record.eval_price.is_known()
                }
                FieldKind::Layout => {
                    record.layout = ctx.first_match(extractor, |raw| {
                        parse_layout(raw, defaults.assumed_living_rooms)
                    });
                    record.layout.is_known()
                }
                FieldKind::Area => {
                    record.area_sqm = ctx.first_match(extractor, parse_area);
                    record.area_sqm.is_known()
                }
                FieldKind::Floor => {
                    record.floor = ctx.first_match(extractor, parse_floor);
                    record.floor.is_known()
                }
                FieldKind::Orientation => {
                    record.orientation = ctx.first_match(extractor, parse_orientation);
                    record.orientation.is_known()
                }
                FieldKind::BuildYear => {
                    record.build_year = ctx.first_match(extractor, parse_build_year);
                    record.build_year.is_known()
                }
                FieldKind::CanonicalUrl => {
                    let url = ctx.first_match(extractor, |raw| {
                        Field::from(canonicalize_url(
                            &rules.base_url,
                            raw,
                            &definition.canonical_strip_params,
                        ))
                    });
                    record.canonical_url = url.into_option().unwrap_or_default();
                    !record.canonical_url.is_empty()
                }
                FieldKind::Region => {
                    record.region = ctx.first_match(extractor, |raw| non_empty(clean_text(raw)));
                    record.region.is_known()
                }
                FieldKind::Title => true,
            };
            if !found {
                miss(field, output);
            }
        }

        if record.region.is_unknown() && !scope_key.is_empty() {
            record.region = Field::Known(scope_key.to_string());
        }

        if record.unit_price.is_unknown() {
            if let (Some(total), Some(area)) = (record.total_price.known(), record.area_sqm.known()) {
                if let Some(derived) = derive_unit_price(
                    *total,
                    *area,
                    defaults.derived_unit_factor,
                    defaults.unit_price_decimals,
                ) {
                    record.unit_price = Field::Known(derived);
                    output.diagnostics.push(Diagnostic {
                        container_index: index,
                        kind: DiagnosticKind::DerivedUnitPrice,
                    });
                }
            }
        }

        Some(record)
    }
}

#[cfg(test)]
#[path = "extraction_service_test.rs"]
mod tests;
