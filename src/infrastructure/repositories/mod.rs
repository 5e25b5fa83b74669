// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库实现模块
///
/// 提供领域仓库接口的具体实现：SeaORM 数据库实现和内存实现
pub mod listing_repo_impl;
pub mod memory_listing_repo;
