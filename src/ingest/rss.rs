// src/ingest/rss.rs
//! RSS 2.0 article source (HTTP or in-memory fixture).

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::histogram;
use quick_xml::de::from_str;
use serde::Deserialize;

use crate::ingest::types::{Article, ArticleSource};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}
#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(default)]
    title: Option<String>,
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}
#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    guid: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    #[serde(rename = "content:encoded")]
    content_encoded: Option<String>,
}

/// RFC 2822 feed date → RFC 3339; unparseable input is kept verbatim so the
/// pipeline can apply its own fallback.
fn normalize_pub_date(ts: &str) -> String {
    DateTime::parse_from_rfc2822(ts.trim())
        .map(|dt| dt.with_timezone(&Utc).to_rfc3339())
        .unwrap_or_else(|_| ts.to_string())
}

pub struct RssSource {
    name: String,
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl RssSource {
    pub fn from_fixture_str(name: &str, xml: &str) -> Self {
        Self {
            name: name.to_string(),
            mode: Mode::Fixture(xml.to_string()),
        }
    }

    pub fn from_url(url: &str) -> Self {
        Self {
            name: url.to_string(),
            mode: Mode::Http {
                url: url.to_string(),
                client: reqwest::Client::new(),
            },
        }
    }

    /// Parse a feed body. Links are left empty when absent; the batch
    /// step assigns `#<index>` placeholders.
    pub fn parse_items_from_str(s: &str) -> Result<Vec<Article>> {
        let t0 = std::time::Instant::now();
        let xml_clean = scrub_html_entities_for_xml(s);
        let rss: Rss = from_str(&xml_clean).context("parsing rss xml")?;

        let feed = rss.channel.title.as_deref().unwrap_or("unknown feed");
        let mut out = Vec::with_capacity(rss.channel.item.len());
        for it in rss.channel.item {
            let content = it
                .description
                .or(it.content_encoded)
                .unwrap_or_default();
            out.push(Article {
                title: it.title.unwrap_or_default(),
                content,
                link: it.link.or(it.guid).unwrap_or_default(),
                published_at: it.pub_date.as_deref().map(normalize_pub_date),
            });
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ingest_parse_ms").record(ms);
        tracing::debug!(target: "ingest", feed, items = out.len(), "rss parsed");
        Ok(out)
    }
}

#[async_trait]
impl ArticleSource for RssSource {
    async fn fetch_latest(&self) -> Result<Vec<Article>> {
        match &self.mode {
            Mode::Fixture(s) => Self::parse_items_from_str(s),
            Mode::Http { url, client } => {
                let body = client
                    .get(url.as_str())
                    .send()
                    .await
                    .context("rss http get()")?
                    .error_for_status()
                    .context("rss http status")?
                    .text()
                    .await
                    .context("rss http .text()")?;
                Self::parse_items_from_str(&body)
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&laquo;", "\"")
        .replace("&raquo;", "\"")
        .replace("&eacute;", "é")
        .replace("&egrave;", "è")
        .replace("&agrave;", "à")
}
