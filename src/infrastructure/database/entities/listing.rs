// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm::entity::prelude::*;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "listings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub source_id: String,
    pub scope_key: String,
    pub title: String,
    pub community_name: Option<String>,
    /// 万元
    pub total_price: Option<f64>,
    /// 元/平方米
    pub unit_price: Option<f64>,
    pub unit_price_provenance: Option<String>,
    pub eval_price: Option<f64>,
    pub layout: Option<String>,
    pub area_sqm: Option<f64>,
    pub orientation: Option<String>,
    pub floor: Option<String>,
    pub build_year: Option<i32>,
    pub canonical_url: String,
    pub region: Option<String>,
    /// 完整记录，用于无损还原
    pub record: Json,
    pub created_at: ChronoDateTimeWithTimeZone,
    pub updated_at: ChronoDateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
