use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use crate::store::{ContentStore, StoreError};

/// Extensions the media library recognizes as images.
const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Error fetching image from {url}: {message}")]
    Fetch { url: String, message: String },
    #[error("Image search failed: {0}")]
    Search(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct LibraryImage {
    pub name: String,
    pub public_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StockImage {
    pub thumbnail_url: String,
    pub full_url: String,
}

/// Retrieves raw image bytes from an arbitrary URL so they can be
/// re-hosted inside the repository.
pub trait ImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, MediaError>;
}

pub struct HttpFetcher {
    http: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> reqwest::Result<HttpFetcher> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("vacatad-cms/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(HttpFetcher { http })
    }
}

impl ImageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, MediaError> {
        let fetch_err = |message: String| MediaError::Fetch {
            url: url.to_string(),
            message,
        };

        let res = self.http.get(url).send().await.map_err(|e| fetch_err(e.to_string()))?;
        if !res.status().is_success() {
            return Err(fetch_err(format!("status {}", res.status())));
        }

        let bytes = res.bytes().await.map_err(|e| fetch_err(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

pub fn is_image_name(name: &str) -> bool {
    match name.rsplit_once('.') {
        Some((_, ext)) => IMAGE_EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e)),
        None => false,
    }
}

/// Lists the images of the fixed repository image folder. Re-listed on
/// every call, nothing is cached.
pub async fn list_images<S: ContentStore>(
    store: &S,
    images_dir: &str,
) -> Result<Vec<LibraryImage>, MediaError> {
    let entries = store.list_dir(images_dir).await?;

    let images = entries
        .into_iter()
        .filter(|e| is_image_name(&e.name))
        .map(|e| LibraryImage {
            name: e.name,
            public_url: e.download_url,
        })
        .collect();

    Ok(images)
}

/// File name for an uploaded asset: epoch-millis prefix for collision
/// resistance, original name stripped down to alphanumerics, dots and
/// hyphens.
pub fn upload_file_name(original_name: &str) -> String {
    lazy_static! {
        static ref INVALID: Regex = Regex::new(r"[^a-zA-Z0-9.-]").unwrap();
    }

    let clean = INVALID.replace_all(original_name, "");
    format!("{}-{}", Utc::now().timestamp_millis(), clean)
}

/// Uploads image bytes into the image folder. Returns the site-relative
/// path records should store, which is the folder's last segment plus the
/// generated file name.
pub async fn upload_image<S: ContentStore>(
    store: &S,
    images_dir: &str,
    bytes: &[u8],
    original_name: &str,
) -> Result<String, MediaError> {
    let file_name = upload_file_name(original_name);
    let path = format!("{}/{}", images_dir, file_name);

    store
        .write(&path, bytes, &format!("Upload {}", file_name), None)
        .await?;

    let folder = images_dir.rsplit('/').next().unwrap_or(images_dir);
    Ok(format!("{}/{}", folder, file_name))
}

#[derive(Deserialize)]
struct SearchResponse {
    results: Vec<SearchPhoto>,
}

#[derive(Deserialize)]
struct SearchPhoto {
    urls: PhotoUrls,
}

#[derive(Deserialize)]
struct PhotoUrls {
    small: String,
    regular: String,
}

fn stock_images(response: SearchResponse) -> Vec<StockImage> {
    response
        .results
        .into_iter()
        .map(|photo| StockImage {
            thumbnail_url: photo.urls.small,
            full_url: photo.urls.regular,
        })
        .collect()
}

/// Client for the Unsplash photo search API.
pub struct StockLibrary {
    http: reqwest::Client,
    access_key: String,
    page_size: u32,
}

impl StockLibrary {
    pub fn new(access_key: &str, page_size: u32) -> reqwest::Result<StockLibrary> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("vacatad-cms/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(StockLibrary {
            http,
            access_key: access_key.to_string(),
            page_size,
        })
    }

    /// Searches stock photos. Failures come back as an error value the
    /// caller reports next to an empty result list; they never abort an
    /// enclosing workflow.
    pub async fn search(&self, query: &str) -> Result<Vec<StockImage>, MediaError> {
        let res = self
            .http
            .get("https://api.unsplash.com/search/photos")
            .query(&[
                ("page", "1"),
                ("query", query),
                ("per_page", &self.page_size.to_string()),
                ("client_id", &self.access_key),
            ])
            .send()
            .await
            .map_err(|e| MediaError::Search(e.to_string()))?;

        if !res.status().is_success() {
            return Err(MediaError::Search(format!("status {}", res.status())));
        }

        let response: SearchResponse = res.json().await.map_err(|e| MediaError::Search(e.to_string()))?;
        Ok(stock_images(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::mem::MemStore;

    #[test]
    fn test_is_image_name() {
        assert!(is_image_name("photo.jpg"));
        assert!(is_image_name("photo.JPEG"));
        assert!(is_image_name("archive.v2.webp"));
        assert!(!is_image_name("notes.txt"));
        assert!(!is_image_name("README"));
        assert!(!is_image_name("photo.svg"));
    }

    #[test]
    fn test_upload_file_name() {
        let name = upload_file_name("My Photo (final)!.jpg");
        let (prefix, rest) = name.split_once('-').unwrap();
        assert!(prefix.parse::<i64>().is_ok());
        assert_eq!(rest, "MyPhotofinal.jpg");
    }

    #[tokio::test]
    async fn test_list_images_filters_extensions() {
        let store = MemStore::new()
            .with_file("blog/images/a.jpg", b"x")
            .with_file("blog/images/b.webp", b"x")
            .with_file("blog/images/readme.md", b"x")
            .with_file("blog/images/nested/c.png", b"x");

        let images = list_images(&store, "blog/images").await.unwrap();
        let names: Vec<&str> = images.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["a.jpg", "b.webp"]);
        assert!(images[0].public_url.contains("blog/images/a.jpg"));
    }

    #[tokio::test]
    async fn test_upload_image() {
        let store = MemStore::new();
        let path = upload_image(&store, "blog/images", b"bytes", "pic one.png").await.unwrap();

        // Records store the site-relative path, the repository holds the
        // bytes under the full folder path
        assert!(path.starts_with("images/"));
        assert!(path.ends_with("picone.png"));
        assert_eq!(store.contents(&format!("blog/{}", path)).unwrap(), b"bytes");
    }

    #[test]
    fn test_stock_images_from_search_response() {
        let json = r##"{ "results": [
            { "urls": { "small": "https://img/small1", "regular": "https://img/full1", "raw": "https://img/raw1" } },
            { "urls": { "small": "https://img/small2", "regular": "https://img/full2", "raw": "https://img/raw2" } }
        ] }"##;

        let response: SearchResponse = serde_json::from_str(json).unwrap();
        let images = stock_images(response);
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].thumbnail_url, "https://img/small1");
        assert_eq!(images[1].full_url, "https://img/full2");
    }
}
