// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 页面渲染与抓取
///
/// - traits：渲染器能力接口
/// - gateway：任务独占的抓取网关
/// - reqwest_engine：静态HTTP渲染器
/// - playwright_engine：chromiumoxide 浏览器渲染器
pub mod gateway;
pub mod playwright_engine;
pub mod reqwest_engine;
pub mod traits;
