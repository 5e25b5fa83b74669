// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::integration::helpers::{load_rules, result_page};
use housecrawl::domain::services::dedup_service::DedupeIndex;
use housecrawl::domain::services::extraction_service::{CompiledRuleSet, ExtractionService};

#[test]
fn test_shipped_rule_sets_compile() {
    for name in ["ke.yaml", "ali.yaml"] {
        let rules = load_rules(name);
        let source_id = rules.source_id.clone();
        let compiled = CompiledRuleSet::compile(rules).unwrap();
        assert_eq!(compiled.source_id(), source_id);
    }
}

#[test]
fn test_page_with_excluded_containers() {
    let rules = CompiledRuleSet::compile(load_rules("ke.yaml")).unwrap();
    let output = ExtractionService::extract(&result_page(1), &rules, "北京");

    assert_eq!(output.containers, 20);
    assert_eq!(output.excluded, 2);
    assert_eq!(output.records.len(), 18);

    let mut index = DedupeIndex::new();
    let accepted = output
        .records
        .iter()
        .filter(|r| index.accept(r).is_accepted())
        .count();
    assert_eq!(accepted, 18);

    // 同一页再来一次全部是重复
    let again = ExtractionService::extract(&result_page(1), &rules, "北京");
    assert!(again.records.iter().all(|r| !index.accept(r).is_accepted()));
    assert_eq!(index.duplicates(), 18);
}
