// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::listing::ListingRecord;
use crate::domain::repositories::listing_repository::ListingRepository;
use crate::infrastructure::database::entities::listing as listing_entity;
use crate::utils::errors::RepositoryError;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::*;
use std::sync::Arc;
use uuid::Uuid;

/// 房源仓库实现（SeaORM）
pub struct ListingRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl ListingRepositoryImpl {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn upsert<C: ConnectionTrait>(
        conn: &C,
        record: &ListingRecord,
    ) -> Result<(), RepositoryError> {
        let active_model = to_active_model(record)?;
        listing_entity::Entity::insert(active_model)
            .on_conflict(
                OnConflict::columns([
                    listing_entity::Column::SourceId,
                    listing_entity::Column::CanonicalUrl,
                ])
                .update_columns([
                    listing_entity::Column::ScopeKey,
                    listing_entity::Column::Title,
                    listing_entity::Column::CommunityName,
                    listing_entity::Column::TotalPrice,
                    listing_entity::Column::UnitPrice,
                    listing_entity::Column::UnitPriceProvenance,
                    listing_entity::Column::EvalPrice,
                    listing_entity::Column::Layout,
                    listing_entity::Column::AreaSqm,
                    listing_entity::Column::Orientation,
                    listing_entity::Column::Floor,
                    listing_entity::Column::BuildYear,
                    listing_entity::Column::Region,
                    listing_entity::Column::Record,
                    listing_entity::Column::UpdatedAt,
                ])
                .to_owned(),
            )
            .exec_without_returning(conn)
            .await?;
        Ok(())
    }

    async fn find(&self, condition: Condition) -> anyhow::Result<Vec<ListingRecord>> {
        let models = listing_entity::Entity::find()
            .filter(condition)
            .order_by_asc(listing_entity::Column::TotalPrice)
            .order_by_asc(listing_entity::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?;

        models
            .into_iter()
            .map(|m| from_model(m).map_err(Into::into))
            .collect()
    }
}

/// 记录转为数据库活动模型
fn to_active_model(record: &ListingRecord) -> Result<listing_entity::ActiveModel, RepositoryError> {
    let now = Utc::now();
    Ok(listing_entity::ActiveModel {
        id: Set(Uuid::new_v4()),
        source_id: Set(record.source_id.clone()),
        scope_key: Set(record.scope_key.clone()),
        title: Set(record.title.to_string()),
        community_name: Set(record.community_name.known().cloned()),
        total_price: Set(record.total_price.known().copied()),
        unit_price: Set(record.unit_price.known().map(|u| u.yuan_per_sqm)),
        unit_price_provenance: Set(record
            .unit_price
            .known()
            .map(|u| u.provenance.as_str().to_string())),
        eval_price: Set(record.eval_price.known().copied()),
        layout: Set(record.layout.known().map(|l| l.label.clone())),
        area_sqm: Set(record.area_sqm.known().copied()),
        orientation: Set(record.orientation.known().map(|o| o.to_string())),
        floor: Set(record.floor.known().map(|f| f.to_string())),
        build_year: Set(record.build_year.known().map(|y| *y as i32)),
        canonical_url: Set(record.canonical_url.clone()),
        region: Set(record.region.known().cloned()),
        record: Set(serde_json::to_value(record)?),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    })
}

fn from_model(model: listing_entity::Model) -> Result<ListingRecord, RepositoryError> {
    Ok(serde_json::from_value(model.record)?)
}

#[async_trait]
impl ListingRepository for ListingRepositoryImpl {
    async fn store(&self, record: &ListingRecord) -> anyhow::Result<()> {
        Self::upsert(self.db.as_ref(), record).await?;
        Ok(())
    }

    async fn store_batch(&self, records: &[ListingRecord]) -> anyhow::Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let txn = self.db.begin().await?;
        for record in records {
            Self::upsert(&txn, record).await?;
        }
        txn.commit().await?;
        Ok(records.len())
    }

    async fn query_by_price_range(&self, min: f64, max: f64) -> anyhow::Result<Vec<ListingRecord>> {
        self.find(Condition::all().add(listing_entity::Column::TotalPrice.between(min, max)))
            .await
    }

    async fn query_by_layout(&self, layout: &str) -> anyhow::Result<Vec<ListingRecord>> {
        self.find(Condition::all().add(listing_entity::Column::Layout.eq(layout)))
            .await
    }

    async fn query_by_area_range(&self, min: f64, max: f64) -> anyhow::Result<Vec<ListingRecord>> {
        self.find(Condition::all().add(listing_entity::Column::AreaSqm.between(min, max)))
            .await
    }

    async fn fetch_all(&self) -> anyhow::Result<Vec<ListingRecord>> {
        self.find(Condition::all()).await
    }
}
