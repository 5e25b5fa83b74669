// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use rand::Rng;
use url::{ParseError, Url};

/// 将可能为相对路径的URL转换为绝对路径URL
pub fn resolve_url(base_url: &Url, path: &str) -> Result<Url, ParseError> {
    base_url.join(path)
}

/// 规范化房源链接
///
/// 相对链接按站点地址补全，`//` 开头的链接沿用站点协议；
/// 去掉片段以及 `strip_params` 中列出的跟踪参数。无效链接返回 `None`。
pub fn canonicalize_url(base_url: &Url, raw: &str, strip_params: &[String]) -> Option<String> {
    let decoded = html_escape::decode_html_entities(raw.trim()).into_owned();
    if decoded.is_empty() || decoded.starts_with("javascript:") || decoded.starts_with('#') {
        return None;
    }

    let mut url = resolve_url(base_url, &decoded).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);

    if url.query().is_some() {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| !strip_params.iter().any(|p| p == k))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
    }

    Some(url.to_string())
}

/// 站点要求的随机页面访问标识（32位字母数字）
pub fn random_pvid() -> String {
    const CHARS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
    let mut rng = rand::rng();
    (0..32)
        .map(|_| CHARS[rng.random_range(0..CHARS.len())] as char)
        .collect()
}

/// 毫秒时间戳加四位随机数
pub fn random_log_id() -> String {
    format!(
        "{}{}",
        chrono::Utc::now().timestamp_millis(),
        rand::random_range(1000..10000)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_absolute_url() {
        let base = Url::parse("http://example.com/a/b").unwrap();
        let path = "http://t.co/c";
        assert_eq!(resolve_url(&base, path).unwrap().as_str(), "http://t.co/c");
    }

    #[test]
    fn test_resolve_root_relative_url() {
        let base = Url::parse("http://example.com/a/b").unwrap();
        assert_eq!(
            resolve_url(&base, "/c").unwrap().as_str(),
            "http://example.com/c"
        );
    }

    #[test]
    fn test_canonicalize_protocol_relative_url() {
        let base = Url::parse("https://huodong.taobao.com").unwrap();
        assert_eq!(
            canonicalize_url(&base, "//sf-item.taobao.com/item/1.htm", &[]).unwrap(),
            "https://sf-item.taobao.com/item/1.htm"
        );
    }

    #[test]
    fn test_canonicalize_relative_url_and_strip_tracking() {
        let base = Url::parse("https://www.ke.com").unwrap();
        let strip = vec!["pvid".to_string(), "log_id".to_string()];
        assert_eq!(
            canonicalize_url(&base, "/ershoufang/101.html?pvid=abc&log_id=1#top", &strip)
                .unwrap(),
            "https://www.ke.com/ershoufang/101.html"
        );
        assert_eq!(
            canonicalize_url(&base, "/item?id=7&amp;pvid=abc", &strip).unwrap(),
            "https://www.ke.com/item?id=7"
        );
    }

    #[test]
    fn test_canonicalize_rejects_non_links() {
        let base = Url::parse("https://www.ke.com").unwrap();
        assert!(canonicalize_url(&base, "", &[]).is_none());
        assert!(canonicalize_url(&base, "javascript:void(0)", &[]).is_none());
        assert!(canonicalize_url(&base, "#", &[]).is_none());
    }

    #[test]
    fn test_random_tracking_ids() {
        let pvid = random_pvid();
        assert_eq!(pvid.len(), 32);
        assert!(pvid.chars().all(|c| c.is_ascii_alphanumeric()));
        assert!(random_log_id().len() >= 17);
    }
}
