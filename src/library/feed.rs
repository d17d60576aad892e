use chrono::{DateTime, Datelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use rss::extension::atom::{AtomExtension, Link};
use rss::{ChannelBuilder, GuidBuilder, ItemBuilder};
use std::collections::BTreeMap;

use crate::config::SiteConfig;

pub const CONTENT_TYPE: &str = "application/rss+xml; charset=utf-8";
const CONTENT_NAMESPACE: &str = "http://purl.org/rss/1.0/modules/content/";
const TTL_MINUTES: &str = "300";
const DESCRIPTION_CHARS: usize = 80;
pub const ANSWER_TITLE_CHARS: usize = 30;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));

/// One entry of a feed.
#[derive(Debug, Clone)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    /// Rendered HTML, published as `content:encoded`.
    pub content_html: String,
    pub author: String,
    pub create_time: i64,
}

/// Channel-level metadata of a feed.
#[derive(Debug, Clone)]
pub struct Feed {
    pub title: String,
    pub link: String,
    /// URL of the feed itself, published as the atom `self` link.
    pub self_url: String,
    pub description: String,
}

/// HTML with tags removed. Whitespace between tags is kept.
pub fn strip_tags(html: &str) -> String {
    TAG_RE.replace_all(html, "").into_owned()
}

/// The first `max` characters of the tag-stripped text.
pub fn excerpt(html: &str, max: usize) -> String {
    strip_tags(html).chars().take(max).collect()
}

fn rfc2822(time: i64) -> String {
    DateTime::<Utc>::from_timestamp(time, 0)
        .unwrap_or_default()
        .to_rfc2822()
}

/// Renders the feed as RSS 2.0 XML. `now` is the request time.
pub fn render(site: &SiteConfig, feed: Feed, entries: Vec<FeedEntry>, now: i64) -> String {
    let items = entries
        .into_iter()
        .map(|entry| {
            ItemBuilder::default()
                .title(Some(entry.title))
                .link(Some(entry.link.clone()))
                .description(Some(excerpt(&entry.content_html, DESCRIPTION_CHARS)))
                .content(Some(entry.content_html))
                .author(Some(entry.author))
                .guid(Some(GuidBuilder::default().value(entry.link).permalink(true).build()))
                .pub_date(Some(rfc2822(entry.create_time)))
                .build()
        })
        .collect::<Vec<_>>();

    let year = DateTime::<Utc>::from_timestamp(now, 0).unwrap_or_default().year();

    let mut namespaces = BTreeMap::new();
    namespaces.insert("content".to_string(), CONTENT_NAMESPACE.to_string());

    let atom = AtomExtension {
        links: vec![Link {
            href: feed.self_url,
            rel: "self".to_string(),
            mime_type: Some("application/rss+xml".to_string()),
            ..Default::default()
        }],
    };

    let channel = ChannelBuilder::default()
        .title(feed.title)
        .link(feed.link)
        .description(feed.description)
        .language(Some(site.language.clone()))
        .copyright(Some(format!("Copyright {}, {}", year, site.name)))
        .generator(Some(site.name.clone()))
        .pub_date(Some(rfc2822(now)))
        .last_build_date(Some(rfc2822(now)))
        .ttl(Some(TTL_MINUTES.to_string()))
        .namespaces(namespaces)
        .atom_ext(Some(atom))
        .items(items)
        .build();

    channel.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> SiteConfig {
        SiteConfig {
            name: "Test Forum".to_string(),
            language: "en".to_string(),
            url: "http://forum.test".to_string(),
        }
    }

    #[test]
    fn test_excerpt_strips_tags_and_truncates() {
        assert_eq!(strip_tags("<p>Hello <em>world</em></p>\n"), "Hello world\n");
        assert_eq!(excerpt("<p>abcdef</p>", 3), "abc");
        assert_eq!(excerpt("\n<p>abcdef</p>", 3), "\nab");
        assert_eq!(excerpt("<p>你好世界</p>", 2), "你好");
    }

    #[test]
    fn test_render_channel() {
        let feed = Feed {
            title: "Latest questions".to_string(),
            link: "http://forum.test/questions".to_string(),
            self_url: "http://forum.test/rss/questions".to_string(),
            description: "Latest questions".to_string(),
        };
        let entries = vec![FeedEntry {
            title: "How do lifetimes work?".to_string(),
            link: "http://forum.test/questions/1".to_string(),
            content_html: "<p>Explain <code>'a</code></p>".to_string(),
            author: "alice".to_string(),
            create_time: 1_700_000_000,
        }];

        // 2024-01-01T00:00:00Z
        let xml = render(&site(), feed, entries, 1_704_067_200);

        assert!(xml.contains("<ttl>300</ttl>"));
        assert!(xml.contains("Copyright 2024, Test Forum"));
        assert!(xml.contains("<language>en</language>"));
        assert!(xml.contains(r#"xmlns:content="http://purl.org/rss/1.0/modules/content/""#));
        assert!(xml.contains("http://forum.test/rss/questions"));
        assert!(xml.contains("http://forum.test/questions/1</guid>"));
        assert!(xml.contains("<author>alice</author>"));
        assert!(xml.contains("<content:encoded>"));
        assert!(xml.contains("1 Jan 2024 00:00:00 +0000"));
    }
}
