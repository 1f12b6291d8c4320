// src/ingest/types.rs
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// News article as supplied to the pipeline. `link` is the identity key.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub link: String,
    /// RFC 3339 or RFC 2822; may be missing or malformed.
    #[serde(default, alias = "pubDate")]
    pub published_at: Option<String>,
}

impl Article {
    pub fn new(title: &str, content: &str, link: &str, published_at: Option<&str>) -> Self {
        Self {
            title: title.to_string(),
            content: content.to_string(),
            link: link.to_string(),
            published_at: published_at.map(str::to_string),
        }
    }

    /// `title + " " + content`, the text that gets scored and matched.
    pub fn full_text(&self) -> String {
        format!("{} {}", self.title, self.content)
    }
}

#[async_trait::async_trait]
pub trait ArticleSource: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<Article>>;
    fn name(&self) -> &str;
}
