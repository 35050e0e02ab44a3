use chrono::Utc;
use spdlog::{info, warn};
use thiserror::Error;

use crate::draft::EditorState;
use crate::media::{ImageFetcher, MediaError};
use crate::post::{parse_index, serialize_index, sorted_for_display, upsert, PostRecord};
use crate::store::{ContentStore, StoreError, VersionToken};
use crate::text_utils::{dir_prefix, parse_post_date, slugify};
use crate::view::body_extract::extract_body;
use crate::view::document_renderer::DocumentRenderer;

pub const HERO_FILE: &str = "hero.jpg";
pub const DOCUMENT_FILE: &str = "index.html";

/// Site-relative prefix stored in index records for post assets.
const PUBLIC_POSTS_PREFIX: &str = "posts";

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Media(#[from] MediaError),
    #[error("Error parsing the post index: {0}")]
    Index(#[from] serde_json::Error),
    #[error("Error preparing the post document: {0}")]
    Document(#[from] std::io::Error),
}

/// Remote locations of the site content.
#[derive(Debug, Clone)]
pub struct SitePaths {
    pub index_path: String,
    pub posts_dir: String,
    pub images_dir: String,
}

/// One editor session: the loaded index, its version token, and the
/// collaborators the publishing workflow talks to. Exactly one save or
/// delete runs at a time; every remote write is awaited before the next
/// one starts, so the image and document exist before the index refers to
/// them.
///
/// Saving is not atomic. A failure partway through leaves the writes that
/// already happened in place (an uploaded hero image, an updated document)
/// with no rollback. Retrying a save re-derives the same directory name
/// and overwrites the same paths.
pub struct Session<S: ContentStore, F: ImageFetcher> {
    store: S,
    fetcher: F,
    paths: SitePaths,
    template_src: String,
    posts: Vec<PostRecord>,
    index_token: Option<VersionToken>,
}

impl<S: ContentStore, F: ImageFetcher> Session<S, F> {
    pub fn new(store: S, fetcher: F, paths: SitePaths, template_src: String) -> Session<S, F> {
        Session {
            store,
            fetcher,
            paths,
            template_src,
            posts: vec![],
            index_token: None,
        }
    }

    /// Reads the index and holds its version token. A missing index file
    /// means a fresh site: the session starts empty and the first save
    /// creates it.
    pub async fn load(&mut self) -> Result<(), PublishError> {
        match self.store.read(&self.paths.index_path).await {
            Ok(file) => {
                self.posts = parse_index(&file.bytes)?;
                self.index_token = Some(file.token);
            }
            Err(StoreError::NotFound { .. }) => {
                info!("No index at {} yet, starting empty", self.paths.index_path);
                self.posts = vec![];
                self.index_token = None;
            }
            Err(e) => return Err(e.into()),
        }

        info!("Loaded {} posts from {}", self.posts.len(), self.paths.index_path);
        Ok(())
    }

    pub fn posts(&self) -> &[PostRecord] {
        &self.posts
    }

    pub fn find(&self, id: i64) -> Option<&PostRecord> {
        self.posts.iter().find(|p| p.id == id)
    }

    /// Date-descending view for listing. Stored order is preserved.
    pub fn sorted_for_display(&self) -> Vec<PostRecord> {
        sorted_for_display(&self.posts)
    }

    /// Publishes one post: validates, resolves the hero image, writes the
    /// standalone document, then merges the record into the index and
    /// writes it back under the held version token.
    pub async fn save(&mut self, draft: &EditorState) -> Result<PostRecord, PublishError> {
        if draft.title.trim().is_empty() {
            return Err(PublishError::Validation("Title is required".to_string()));
        }
        if draft.image.trim().is_empty() {
            return Err(PublishError::Validation("A hero image is required".to_string()));
        }

        let slug = match draft.slug.as_deref() {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => slugify(&draft.title),
        };
        let dir = format!("{}-{}", dir_prefix(&draft.date), slug);

        let mut record = PostRecord {
            id: draft.id.unwrap_or_else(|| Utc::now().timestamp_millis()),
            title: draft.title.clone(),
            slug: Some(slug.clone()),
            date: draft.date.format("%Y-%m-%d").to_string(),
            excerpt: draft.excerpt.clone(),
            image: draft.image.clone(),
            image_alt: Some(draft.image_alt.clone().unwrap_or_else(|| draft.title.clone())),
            tags: draft.tags.clone(),
            featured: draft.featured,
            author: draft.author.clone(),
            read_time: draft.read_time.clone(),
            content: None,
            extra: serde_json::Map::new(),
        };

        if let Some(previous) = self.find(record.id) {
            if let Some(old_dir) = record_dir(previous) {
                if old_dir != dir {
                    warn!(
                        "Post directory changed from {}/{} to {}/{}; the old one is orphaned and needs manual cleanup",
                        self.paths.posts_dir, old_dir, self.paths.posts_dir, dir
                    );
                }
            }
        }

        // Remote hero images are re-hosted inside the post directory
        if record.image.contains("://") {
            info!("Fetching hero image from {}", record.image);
            let bytes = self.fetcher.fetch(&record.image).await?;

            let hero_path = format!("{}/{}/{}", self.paths.posts_dir, dir, HERO_FILE);
            let token = self.store.try_get_version_token(&hero_path).await?;
            self.store
                .write(&hero_path, &bytes, &format!("Add hero image for {}", slug), token.as_ref())
                .await?;

            record.image = format!("{}/{}/{}", PUBLIC_POSTS_PREFIX, dir, HERO_FILE);
            info!("Hero image stored at {}", hero_path);
        }

        let renderer = DocumentRenderer::new(&self.template_src)?;
        let html = renderer.render(&record, &draft.body_html);

        let doc_path = format!("{}/{}/{}", self.paths.posts_dir, dir, DOCUMENT_FILE);
        let token = self.store.try_get_version_token(&doc_path).await?;
        self.store
            .write(&doc_path, html.as_bytes(), &format!("Update post: {}", record.title), token.as_ref())
            .await?;
        info!("Post document written to {}", doc_path);

        // The in-memory index only changes once the remote write succeeds,
        // so a conflict leaves the session state untouched.
        let mut posts = self.posts.clone();
        upsert(&mut posts, record.clone());
        let bytes = serialize_index(&posts)?;
        let new_token = self
            .store
            .write(
                &self.paths.index_path,
                &bytes,
                &format!("Update post: {}", record.title),
                self.index_token.as_ref(),
            )
            .await?;

        self.posts = posts;
        self.index_token = Some(new_token);
        info!("Index updated with post {} ({})", record.id, record.title);

        Ok(record)
    }

    /// Removes a post from the index. The standalone document and hero
    /// image are blanked best-effort; the store cannot delete paths, so
    /// the directory itself stays behind for manual cleanup.
    pub async fn delete(&mut self, id: i64) -> Result<(), PublishError> {
        let Some(record) = self.find(id).cloned() else {
            return Err(PublishError::Validation(format!("No post with id {}", id)));
        };

        if let Some(dir) = record_dir(&record) {
            for file in [DOCUMENT_FILE, HERO_FILE] {
                let path = format!("{}/{}/{}", self.paths.posts_dir, dir, file);
                match self.store.try_get_version_token(&path).await {
                    Ok(Some(token)) => {
                        let message = format!("Delete post {}", id);
                        if let Err(e) = self.store.write(&path, b"", &message, Some(&token)).await {
                            warn!("Could not blank {}: {}", path, e);
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!("Could not probe {}: {}", path, e),
                }
            }
            info!(
                "The store cannot remove directories; {}/{} needs manual cleanup",
                self.paths.posts_dir, dir
            );
        }

        let mut posts = self.posts.clone();
        posts.retain(|p| p.id != id);
        let bytes = serialize_index(&posts)?;
        let new_token = self
            .store
            .write(&self.paths.index_path, &bytes, &format!("Delete post {}", id), self.index_token.as_ref())
            .await?;

        self.posts = posts;
        self.index_token = Some(new_token);
        info!("Post {} removed from the index", id);

        Ok(())
    }

    /// Body to seed the editor with when an existing post is opened: the
    /// extracted standalone document, then the legacy embedded content,
    /// then empty.
    pub async fn seed_body(&self, record: &PostRecord) -> String {
        if let Some(dir) = record_dir(record) {
            let path = format!("{}/{}/{}", self.paths.posts_dir, dir, DOCUMENT_FILE);
            match self.store.read(&path).await {
                Ok(file) => {
                    let html = String::from_utf8_lossy(&file.bytes).to_string();
                    match extract_body(&html) {
                        Some(body) => return body,
                        None => warn!("Could not locate the body markers in {}", path),
                    }
                }
                Err(StoreError::NotFound { .. }) => {}
                Err(e) => warn!("Error reading {}: {}", path, e),
            }
        }

        record.content.clone().unwrap_or_default()
    }
}

/// Storage directory of a record, when its date and slug allow one.
fn record_dir(record: &PostRecord) -> Option<String> {
    let slug = record.slug.as_deref().filter(|s| !s.is_empty())?;
    let date = parse_post_date(&record.date).ok()?;
    Some(format!("{}-{}", dir_prefix(&date), slug))
}
