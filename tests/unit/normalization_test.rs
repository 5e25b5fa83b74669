// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use housecrawl::domain::models::listing::{Field, PriceProvenance};
use housecrawl::domain::services::normalization::{derive_unit_price, normalize, parse_layout};

#[test]
fn test_price_units_normalize_to_wan() {
    assert_eq!(normalize("56万"), Field::Known(56.0));
    assert_eq!(normalize("1.2亿"), Field::Known(12000.0));
    assert_eq!(normalize("未知"), Field::Unknown);
}

#[test]
fn test_derived_unit_price_is_tagged() {
    let unit = derive_unit_price(100.0, 50.0, 10000.0, 0).unwrap();
    assert_eq!(unit.yuan_per_sqm, 20000.0);
    assert_eq!(unit.provenance, PriceProvenance::Derived);
    assert!(derive_unit_price(100.0, 0.0, 10000.0, 0).is_none());
}

#[test]
fn test_bare_bedroom_count_assumes_living_rooms() {
    let layout = parse_layout("2室", 1).into_option().unwrap();
    assert_eq!((layout.bedrooms, layout.living_rooms), (2, 1));
    assert_eq!(parse_layout("多室多厅", 1), Field::Unknown);
}
