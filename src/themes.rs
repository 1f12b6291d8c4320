// src/themes.rs
//! Theme configuration: named keyword sets used to bucket articles.
//!
//! Keywords are case-insensitive substrings (never regexes). A theme
//! record without a `keywords` list is rejected at load time.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Display palette used when a theme has no colour of its own.
pub const DEFAULT_THEME_COLORS: [&str; 10] = [
    "#6366f1", "#10b981", "#f59e0b", "#ef4444", "#8b5cf6", "#06b6d4", "#84cc16", "#f97316",
    "#ec4899", "#64748b",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Theme {
    pub fn new(name: impl Into<String>, keywords: &[&str]) -> Self {
        Self {
            id: None,
            name: name.into(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            color: None,
        }
    }

    /// Keywords found in `haystack_lower` (already lowercased), in config order.
    pub fn matched_keywords<'a>(&'a self, haystack_lower: &str) -> Vec<&'a str> {
        self.keywords
            .iter()
            .filter(|k| !k.is_empty() && haystack_lower.contains(&k.to_lowercase()))
            .map(String::as_str)
            .collect()
    }

    pub fn matches(&self, haystack_lower: &str) -> bool {
        self.keywords
            .iter()
            .any(|k| !k.is_empty() && haystack_lower.contains(&k.to_lowercase()))
    }

    pub fn color_or_default(&self) -> &str {
        self.color.as_deref().unwrap_or(DEFAULT_THEME_COLORS[0])
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThemesFile {
    pub themes: Vec<Theme>,
}

/// Fill missing colours from the palette by position.
pub fn apply_default_colors(themes: &mut [Theme]) {
    for (i, t) in themes.iter_mut().enumerate() {
        if t.color.is_none() {
            t.color = Some(DEFAULT_THEME_COLORS[i % DEFAULT_THEME_COLORS.len()].to_string());
        }
    }
}

/// Give every theme without an id one derived from its name.
pub fn apply_default_ids(themes: &mut [Theme]) {
    let mut taken: HashSet<String> = themes.iter().filter_map(|t| t.id.clone()).collect();
    for t in themes.iter_mut().filter(|t| t.id.is_none()) {
        let slug: String = t
            .name
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '-' })
            .collect();
        let mut id = slug.clone();
        let mut n = 2;
        while taken.contains(&id) {
            id = format!("{slug}-{n}");
            n += 1;
        }
        taken.insert(id.clone());
        t.id = Some(id);
    }
}

/// Fresh id for a theme added at runtime: epoch millis, bumped until unused.
pub fn next_theme_id(themes: &[Theme], now_millis: i64) -> String {
    let mut candidate = now_millis;
    while themes
        .iter()
        .any(|t| t.id.as_deref() == Some(candidate.to_string().as_str()))
    {
        candidate += 1;
    }
    candidate.to_string()
}

/// Append `theme` to `themes`: trimmed keywords, id and palette colour by
/// position when missing. Rejects an empty name, an empty keyword list and
/// a name already in use.
pub fn add_theme(themes: &mut Vec<Theme>, mut theme: Theme, now_millis: i64) -> Result<Theme> {
    theme.name = theme.name.trim().to_string();
    theme.keywords = theme
        .keywords
        .iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect();
    if theme.keywords.is_empty() {
        return Err(anyhow!("theme '{}' needs at least one keyword", theme.name));
    }
    if theme.id.is_none() {
        theme.id = Some(next_theme_id(themes, now_millis));
    }
    if theme.color.is_none() {
        theme.color = Some(DEFAULT_THEME_COLORS[themes.len() % DEFAULT_THEME_COLORS.len()].to_string());
    }

    let mut candidate = themes.clone();
    candidate.push(theme.clone());
    validate(&candidate)?;
    *themes = candidate;
    Ok(theme)
}

/// Drop the theme with `id`; true if one was removed.
pub fn remove_theme(themes: &mut Vec<Theme>, id: &str) -> bool {
    let before = themes.len();
    themes.retain(|t| t.id.as_deref() != Some(id));
    themes.len() != before
}

/// Write themes back in the format implied by the extension.
pub fn save_themes_to(path: &Path, themes: &[Theme]) -> Result<()> {
    let file = ThemesFile {
        themes: themes.to_vec(),
    };
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let body = if ext == "toml" {
        toml::to_string_pretty(&file).context("encoding themes as TOML")?
    } else {
        serde_json::to_string_pretty(&file).context("encoding themes as JSON")?
    };
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    fs::write(path, body).with_context(|| format!("writing themes to {}", path.display()))
}

/// Load themes from an explicit path. Supports TOML or JSON formats.
pub fn load_themes_from(path: &Path) -> Result<Vec<Theme>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading themes from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let mut themes = parse_themes(&content, &ext)
        .with_context(|| format!("parsing themes {}", path.display()))?;
    apply_default_colors(&mut themes);
    apply_default_ids(&mut themes);
    Ok(themes)
}

fn parse_themes(s: &str, hint_ext: &str) -> Result<Vec<Theme>> {
    let file: ThemesFile = if hint_ext == "toml" {
        toml::from_str(s)?
    } else {
        serde_json::from_str(s)?
    };
    validate(&file.themes)?;
    Ok(file.themes)
}

fn validate(themes: &[Theme]) -> Result<()> {
    let mut seen = HashSet::new();
    for t in themes {
        if t.name.trim().is_empty() {
            return Err(anyhow!("theme with empty name"));
        }
        if !seen.insert(t.name.as_str()) {
            return Err(anyhow!("duplicate theme name '{}'", t.name));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keywords_is_rejected() {
        let raw = r#"{"themes": [{"name": "Economie"}]}"#;
        let err = parse_themes(raw, "json").unwrap_err();
        assert!(format!("{err:#}").contains("keywords"));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let raw = r#"{"themes": [{"name": "A", "keywords": []}, {"name": "A", "keywords": ["x"]}]}"#;
        assert!(parse_themes(raw, "json").is_err());
    }

    #[test]
    fn toml_and_colors() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("themes.toml");
        fs::write(
            &p,
            r##"
            [[themes]]
            name = "Economie"
            keywords = ["croissance", "PIB"]

            [[themes]]
            name = "Conflits"
            keywords = ["guerre"]
            color = "#000000"
            "##,
        )
        .unwrap();
        let themes = load_themes_from(&p).unwrap();
        assert_eq!(themes[0].color.as_deref(), Some(DEFAULT_THEME_COLORS[0]));
        assert_eq!(themes[1].color.as_deref(), Some("#000000"));
    }

    #[test]
    fn loaded_themes_get_ids_from_names() {
        let raw = r#"{"themes": [
            {"id": "relations-internationales", "name": "X", "keywords": ["a"]},
            {"name": "Relations internationales", "keywords": ["b"]}
        ]}"#;
        let mut themes = parse_themes(raw, "json").unwrap();
        apply_default_ids(&mut themes);
        assert_eq!(themes[0].id.as_deref(), Some("relations-internationales"));
        assert_eq!(themes[1].id.as_deref(), Some("relations-internationales-2"));
    }

    #[test]
    fn added_theme_gets_id_and_palette_colour_by_position() {
        let mut themes = vec![Theme::new("A", &["a"]), Theme::new("B", &["b"])];
        themes[0].id = Some("1700000000000".into());

        let added = add_theme(&mut themes, Theme::new(" Climat ", &[" climat ", "", "COP"]), 1_700_000_000_000).unwrap();
        assert_eq!(added.name, "Climat");
        assert_eq!(added.keywords, vec!["climat", "COP"]);
        assert_eq!(added.id.as_deref(), Some("1700000000001"));
        assert_eq!(added.color.as_deref(), Some(DEFAULT_THEME_COLORS[2]));
        assert_eq!(themes.len(), 3);

        assert!(add_theme(&mut themes, Theme::new("Climat", &["x"]), 0).is_err());
        assert!(add_theme(&mut themes, Theme::new("Vide", &[" "]), 0).is_err());
        assert_eq!(themes.len(), 3);

        assert!(remove_theme(&mut themes, "1700000000001"));
        assert!(!remove_theme(&mut themes, "1700000000001"));
        assert_eq!(themes.len(), 2);
    }

    #[test]
    fn saved_themes_load_back() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["themes.json", "themes.toml"] {
            let p = dir.path().join("nested").join(name);
            let mut themes = vec![Theme::new("Economie", &["croissance"])];
            apply_default_colors(&mut themes);
            apply_default_ids(&mut themes);
            save_themes_to(&p, &themes).unwrap();
            assert_eq!(load_themes_from(&p).unwrap(), themes);
        }
    }

    #[test]
    fn keyword_match_is_case_insensitive_substring() {
        let t = Theme::new("Economie", &["PIB", "croissance"]);
        let hay = "le pib et la croissance mondiale".to_string();
        assert_eq!(t.matched_keywords(&hay), vec!["PIB", "croissance"]);
        assert!(t.matches("decroissance"));
        assert!(!t.matches("emploi"));
    }
}
