// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Listings::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Listings::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Listings::SourceId).string().not_null())
                    .col(ColumnDef::new(Listings::ScopeKey).string().not_null())
                    .col(ColumnDef::new(Listings::Title).text().not_null())
                    .col(ColumnDef::new(Listings::CommunityName).string())
                    .col(ColumnDef::new(Listings::TotalPrice).double())
                    .col(ColumnDef::new(Listings::UnitPrice).double())
                    .col(ColumnDef::new(Listings::UnitPriceProvenance).string())
                    .col(ColumnDef::new(Listings::EvalPrice).double())
                    .col(ColumnDef::new(Listings::Layout).string())
                    .col(ColumnDef::new(Listings::AreaSqm).double())
                    .col(ColumnDef::new(Listings::Orientation).string())
                    .col(ColumnDef::new(Listings::Floor).string())
                    .col(ColumnDef::new(Listings::BuildYear).integer())
                    .col(ColumnDef::new(Listings::CanonicalUrl).text().not_null())
                    .col(ColumnDef::new(Listings::Region).string())
                    .col(ColumnDef::new(Listings::Record).json().not_null())
                    .col(
                        ColumnDef::new(Listings::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Listings::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_listings_source_url")
                    .table(Listings::Table)
                    .col(Listings::SourceId)
                    .col(Listings::CanonicalUrl)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_listings_total_price")
                    .table(Listings::Table)
                    .col(Listings::TotalPrice)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Listings::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Listings {
    Table,
    Id,
    SourceId,
    ScopeKey,
    Title,
    CommunityName,
    TotalPrice,
    UnitPrice,
    UnitPriceProvenance,
    EvalPrice,
    Layout,
    AreaSqm,
    Orientation,
    Floor,
    BuildYear,
    CanonicalUrl,
    Region,
    Record,
    CreatedAt,
    UpdatedAt,
}
