// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{
    extract::{Extension, Query},
    Json,
};
use std::sync::Arc;
use validator::Validate;

use crate::{
    application::{dto::listing_query::ListingQueryDto, use_cases::listing_use_case::ListingUseCase},
    domain::models::listing::ListingRecord,
    presentation::errors::AppError,
};

/// 查询已入库的房源
pub async fn list_listings(
    Extension(use_case): Extension<Arc<ListingUseCase>>,
    Query(query): Query<ListingQueryDto>,
) -> Result<Json<Vec<ListingRecord>>, AppError> {
    query
        .validate()
        .map_err(|e| AppError::bad_request(e.to_string()))?;
    let records = use_case.query(&query).await?;
    Ok(Json(records))
}
