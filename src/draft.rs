use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use crate::post::Author;
use crate::util::toml_date::TomlDate;

/// Editor state collected for one save: the post metadata plus the HTML
/// body fragment produced by the editing surface.
#[derive(Debug, Clone)]
pub struct EditorState {
    pub id: Option<i64>,
    pub title: String,
    pub slug: Option<String>,
    pub date: NaiveDate,
    pub excerpt: String,
    pub image: String,
    pub image_alt: Option<String>,
    pub tags: Vec<String>,
    pub featured: bool,
    pub author: Option<Author>,
    pub read_time: Option<String>,
    pub body_html: String,
}

/// On-disk draft. The body comes inline or from a sibling HTML file.
///
/// Example:
///   title = "Hello World"
///   date = 2026-01-17
///   excerpt = "A first post"
///   image = "https://example/x.jpg"
///   tags = ["News"]
///   body_file = "hello-world.html"
///   [author]
///   name = "Jane"
///   role = "Editor"
#[derive(Deserialize)]
pub struct DraftFile {
    pub id: Option<i64>,
    pub title: String,
    pub slug: Option<String>,
    pub date: Option<TomlDate>,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub image: String,
    pub image_alt: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub featured: bool,
    pub author: Option<Author>,
    pub read_time: Option<String>,
    pub body: Option<String>,
    pub body_file: Option<PathBuf>,
}

pub fn read_draft(draft_path: &Path) -> Result<EditorState> {
    let draft_src = fs::read_to_string(draft_path)
        .with_context(|| format!("Error opening draft file {}", draft_path.display()))?;

    let draft: DraftFile = toml::from_str(&draft_src)
        .with_context(|| format!("Error parsing draft file {}", draft_path.display()))?;

    let body_html = match (draft.body, draft.body_file) {
        (Some(body), None) => body,
        (None, Some(ref file)) => {
            // body_file is resolved relative to the draft itself
            let file = match draft_path.parent() {
                Some(dir) => dir.join(file),
                None => file.clone(),
            };
            fs::read_to_string(&file)
                .with_context(|| format!("Error opening body file {}", file.display()))?
        }
        (Some(_), Some(_)) => bail!("The draft sets both body and body_file"),
        (None, None) => String::new(),
    };

    Ok(EditorState {
        id: draft.id,
        title: draft.title,
        slug: draft.slug,
        date: draft.date.map(|d| d.0).unwrap_or_else(|| Utc::now().date_naive()),
        excerpt: draft.excerpt,
        image: draft.image,
        image_alt: draft.image_alt,
        tags: draft.tags,
        featured: draft.featured,
        author: draft.author,
        read_time: draft.read_time,
        body_html,
    })
}
