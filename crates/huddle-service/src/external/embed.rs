//! Link previews
//!
//! [`HttpEmbedFetcher`] looks at the content type of a URL: images and videos
//! become media embeds, HTML pages become rich embeds built from their
//! `<title>`, `description`, OpenGraph and `theme-color` meta tags.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::LazyLock;

use async_trait::async_trait;
use huddle_common::EmbedConfig;
use huddle_core::{DomainError, Embed, EmbedFetcher, EmbedKind, EmbedMedia, EmbedProvider};
use regex::Regex;
use reqwest::header::CONTENT_TYPE;
use reqwest::{redirect, Client, Url};
use tracing::{debug, instrument};

pub const MAX_TITLE_LENGTH: usize = 70;
pub const MAX_NAME_LENGTH: usize = 50;
pub const MAX_DESCRIPTION_LENGTH: usize = 350;

const USER_AGENT: &str = concat!("huddle/", env!("CARGO_PKG_VERSION"), " (link preview)");
const MAX_REDIRECTS: usize = 10;

static META_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<meta\s[^>]*>").expect("valid pattern"));
static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)([a-z][a-z0-9:_-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid pattern")
});
static TITLE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid pattern"));

/// Only plain http(s) URLs pointing at public hosts are fetched.
pub fn is_fetchable(url: &Url) -> bool {
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }
    match url.host_str() {
        None => false,
        Some(host) if host.eq_ignore_ascii_case("localhost") => false,
        Some(host) => match host.trim_matches(['[', ']']).parse::<IpAddr>() {
            Ok(IpAddr::V4(ip)) => {
                !(ip.is_loopback() || ip.is_private() || ip.is_link_local() || ip.is_unspecified())
            }
            Ok(IpAddr::V6(ip)) => !(ip.is_loopback() || ip.is_unspecified()),
            Err(_) => true,
        },
    }
}

fn truncate(text: &str, max: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max) {
        Some((cut, _)) => text[..cut].trim_end().to_string(),
        None => text.to_string(),
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// `#rrggbb` to an integer colour
fn parse_hex_color(value: &str) -> Option<i32> {
    let hex = value.trim().strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    i32::from_str_radix(hex, 16).ok()
}

/// `name`/`property` to `content` for every meta tag, first occurrence wins.
fn meta_tags(html: &str) -> HashMap<String, String> {
    let mut tags = HashMap::new();
    for tag in META_TAG.find_iter(html) {
        let mut key = None;
        let mut content = None;
        for cap in ATTRIBUTE.captures_iter(tag.as_str()) {
            let value = cap.get(2).or_else(|| cap.get(3)).map_or("", |m| m.as_str());
            match cap[1].to_ascii_lowercase().as_str() {
                "name" | "property" if key.is_none() => key = Some(value.to_ascii_lowercase()),
                "content" => content = Some(decode_entities(value)),
                _ => {}
            }
        }
        if let (Some(key), Some(content)) = (key, content) {
            tags.entry(key).or_insert(content);
        }
    }
    tags
}

fn media(tags: &HashMap<String, String>, prefix: &str) -> Option<EmbedMedia> {
    let url = tags.get(prefix)?.trim();
    if url.is_empty() {
        return None;
    }
    let dimension = |suffix: &str| {
        tags.get(&format!("{prefix}:{suffix}"))
            .and_then(|v| v.trim().parse::<i32>().ok())
    };
    Some(EmbedMedia {
        url: url.to_string(),
        width: dimension("width"),
        height: dimension("height"),
    })
}

/// Build a rich embed from an HTML document. `None` when the page carries
/// nothing to show.
pub fn parse_html(url: &str, html: &str) -> Option<Embed> {
    let tags = meta_tags(html);
    let mut embed = Embed {
        kind: EmbedKind::Rich,
        url: url.to_string(),
        ..Embed::default()
    };

    let title = tags
        .get("og:title")
        .cloned()
        .or_else(|| TITLE_TAG.captures(html).map(|c| decode_entities(&c[1])));
    if let Some(title) = title {
        embed.title = truncate(&title, MAX_TITLE_LENGTH);
    }
    if let Some(description) = tags.get("og:description").or_else(|| tags.get("description")) {
        embed.description = truncate(description, MAX_DESCRIPTION_LENGTH);
    }
    embed.color = tags.get("theme-color").and_then(|c| parse_hex_color(c));
    if let Some(site) = tags.get("og:site_name") {
        embed.provider = Some(EmbedProvider {
            name: truncate(site, MAX_NAME_LENGTH),
            url: String::new(),
        });
    }

    if let Some(image) = media(&tags, "og:image") {
        let card = tags.get("twitter:card").map(String::as_str);
        let small = card != Some("summary_large_image")
            && (tags.get("og:type").map(String::as_str) == Some("website") || card == Some("summary"));
        if small {
            embed.thumbnail = Some(image);
        } else {
            embed.image = Some(image);
        }
    }
    embed.video = media(&tags, "og:video");

    let empty = embed.title.is_empty()
        && embed.description.is_empty()
        && embed.image.is_none()
        && embed.thumbnail.is_none()
        && embed.video.is_none();
    (!empty).then_some(embed)
}

/// Fetches previews over HTTP
#[derive(Debug, Clone)]
pub struct HttpEmbedFetcher {
    client: Client,
    max_body_bytes: usize,
}

impl HttpEmbedFetcher {
    pub fn new(config: &EmbedConfig) -> Result<Self, DomainError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| DomainError::ExternalError(e.to_string()))?;
        Ok(Self {
            client,
            max_body_bytes: config.max_body_bytes,
        })
    }
}

#[async_trait]
impl EmbedFetcher for HttpEmbedFetcher {
    #[instrument(skip(self))]
    async fn fetch_embed(&self, url: &str) -> Result<Option<Embed>, DomainError> {
        let parsed = Url::parse(url).map_err(|e| DomainError::InvalidRequest(e.to_string()))?;
        if !is_fetchable(&parsed) {
            debug!("Skipping unfetchable URL");
            return Ok(None);
        }

        let mut response = self
            .client
            .get(parsed)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| DomainError::ExternalError(e.to_string()))?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_ascii_lowercase())
            .unwrap_or_default();

        let media = EmbedMedia {
            url: url.to_string(),
            width: None,
            height: None,
        };
        if content_type.starts_with("image/") {
            return Ok(Some(Embed {
                kind: EmbedKind::Image,
                url: url.to_string(),
                image: Some(media),
                ..Embed::default()
            }));
        }
        if content_type.starts_with("video/") {
            return Ok(Some(Embed {
                kind: EmbedKind::Video,
                url: url.to_string(),
                video: Some(media),
                ..Embed::default()
            }));
        }
        if content_type != "text/html" {
            return Ok(None);
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| DomainError::ExternalError(e.to_string()))?
        {
            let room = self.max_body_bytes.saturating_sub(body.len());
            body.extend_from_slice(&chunk[..chunk.len().min(room)]);
            if body.len() >= self.max_body_bytes {
                break;
            }
        }

        Ok(parse_html(url, &String::from_utf8_lossy(&body)))
    }
}

/// Never produces previews
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledEmbedFetcher;

#[async_trait]
impl EmbedFetcher for DisabledEmbedFetcher {
    async fn fetch_embed(&self, _url: &str) -> Result<Option<Embed>, DomainError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r##"<html><head>
        <title>Fallback title</title>
        <meta property="og:title" content="Rust &amp; Friends">
        <meta name="description" content='A page about crabs'>
        <meta property="og:site_name" content="Crab News" />
        <meta name="theme-color" content="#ff8800">
        <meta property="og:type" content="article">
        <meta property="og:image" content="https://cdn.example.com/crab.png">
        <meta property="og:image:width" content="640">
        <meta property="og:image:height" content="480">
        </head><body></body></html>"##;

    #[test]
    fn test_parse_html_rich_embed() {
        let embed = parse_html("https://example.com/a", PAGE).unwrap();
        assert_eq!(embed.kind, EmbedKind::Rich);
        assert_eq!(embed.url, "https://example.com/a");
        assert_eq!(embed.title, "Rust & Friends");
        assert_eq!(embed.description, "A page about crabs");
        assert_eq!(embed.color, Some(0x00ff_8800));
        assert_eq!(embed.provider.unwrap().name, "Crab News");
        let image = embed.image.unwrap();
        assert_eq!(image.width, Some(640));
        assert_eq!(image.height, Some(480));
        assert!(embed.thumbnail.is_none());
    }

    #[test]
    fn test_website_image_becomes_thumbnail() {
        let html = r#"<meta property="og:type" content="website">
            <meta property="og:image" content="https://example.com/i.png">"#;
        let embed = parse_html("https://example.com", html).unwrap();
        assert!(embed.image.is_none());
        assert_eq!(embed.thumbnail.unwrap().url, "https://example.com/i.png");
    }

    #[test]
    fn test_title_tag_fallback_and_truncation() {
        let long = "x".repeat(100);
        let html = format!("<title>{long}</title>");
        let embed = parse_html("https://example.com", &html).unwrap();
        assert_eq!(embed.title.chars().count(), MAX_TITLE_LENGTH);
    }

    #[test]
    fn test_empty_page_has_no_embed() {
        assert!(parse_html("https://example.com", "<html><body>hi</body></html>").is_none());
    }

    #[test]
    fn test_is_fetchable() {
        let ok = |s: &str| is_fetchable(&Url::parse(s).unwrap());
        assert!(ok("https://example.com/page"));
        assert!(ok("http://93.184.216.34/"));
        assert!(!ok("ftp://example.com/file"));
        assert!(!ok("http://localhost:8080/"));
        assert!(!ok("http://127.0.0.1/"));
        assert!(!ok("http://192.168.1.10/"));
        assert!(!ok("http://[::1]/"));
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#000010"), Some(16));
        assert_eq!(parse_hex_color("red"), None);
        assert_eq!(parse_hex_color("#fff"), None);
    }

    #[tokio::test]
    async fn test_disabled_fetcher() {
        let embed = DisabledEmbedFetcher
            .fetch_embed("https://example.com")
            .await
            .unwrap();
        assert!(embed.is_none());
    }
}
