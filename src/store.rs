use base64::prelude::{Engine, BASE64_STANDARD};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Store-assigned revision identifier of an object (the GitHub blob sha).
/// Updates must present the token obtained from the most recent read or
/// write of the same path, or the store rejects them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionToken(pub String);

pub struct RemoteFile {
    pub bytes: Vec<u8>,
    pub token: VersionToken,
}

#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: String,
    pub path: String,
    pub download_url: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {path}")]
    NotFound { path: String },
    #[error("Version conflict writing {path}: the file changed since it was last read")]
    Conflict { path: String },
    #[error("GitHub API error for {path}: {status} {message}")]
    Api {
        path: String,
        status: u16,
        message: String,
    },
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Invalid content for {path}: {message}")]
    BadContent { path: String, message: String },
}

/// A remote file-content API addressed by path. Writes are single
/// independent transactions; there is no atomicity across paths.
pub trait ContentStore {
    /// Fetches a file and its current version token.
    async fn read(&self, path: &str) -> Result<RemoteFile, StoreError>;

    /// Creates the file when `token` is None, updates it otherwise.
    /// Every write carries a human-readable commit message.
    async fn write(
        &self,
        path: &str,
        bytes: &[u8],
        message: &str,
        token: Option<&VersionToken>,
    ) -> Result<VersionToken, StoreError>;

    /// Lists the immediate children of a directory.
    async fn list_dir(&self, path: &str) -> Result<Vec<DirEntry>, StoreError>;

    /// Existence probe used before writes that may be creates or updates.
    /// Absence is not a failure here.
    async fn try_get_version_token(&self, path: &str) -> Result<Option<VersionToken>, StoreError> {
        match self.read(path).await {
            Ok(file) => Ok(Some(file.token)),
            Err(StoreError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Contents API wrapper for one repository + branch.
pub struct GitHubStore {
    http: reqwest::Client,
    base_url: String,
    token: String,
    branch: String,
}

#[derive(Deserialize)]
struct ContentsResponse {
    content: Option<String>,
    sha: String,
}

#[derive(Deserialize)]
struct DirEntryResponse {
    name: String,
    path: String,
    download_url: Option<String>,
}

#[derive(Deserialize)]
struct WriteResponse {
    content: WriteContent,
}

#[derive(Deserialize)]
struct WriteContent {
    sha: String,
}

#[derive(Serialize)]
struct WriteRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

impl GitHubStore {
    pub fn new(owner: &str, repo: &str, branch: &str, token: &str) -> reqwest::Result<GitHubStore> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("vacatad-cms/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(GitHubStore {
            http,
            base_url: format!("https://api.github.com/repos/{}/{}/contents", owner, repo),
            token: token.to_string(),
            branch: branch.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, StoreError> {
        let res = self
            .http
            .get(self.url(path))
            .query(&[("ref", self.branch.as_str())])
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github.v3+json")
            .send()
            .await?;

        Self::check_status(path, res)
    }

    fn check_status(path: &str, res: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = res.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound { path: path.to_string() });
        }
        // The contents API answers a stale sha with 409, and with 422 when
        // the create/update mode does not match the file's existence.
        if status == reqwest::StatusCode::CONFLICT
            || status == reqwest::StatusCode::UNPROCESSABLE_ENTITY
        {
            return Err(StoreError::Conflict { path: path.to_string() });
        }
        if !status.is_success() {
            return Err(StoreError::Api {
                path: path.to_string(),
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }
        Ok(res)
    }

    fn decode_content(path: &str, content: &str) -> Result<Vec<u8>, StoreError> {
        // The API returns base64 broken into lines
        let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
        BASE64_STANDARD
            .decode(compact)
            .map_err(|e| StoreError::BadContent {
                path: path.to_string(),
                message: e.to_string(),
            })
    }
}

impl ContentStore for GitHubStore {
    async fn read(&self, path: &str) -> Result<RemoteFile, StoreError> {
        let res = self.get(path).await?;
        let body: ContentsResponse = res.json().await?;

        let content = body.content.unwrap_or_default();
        let bytes = Self::decode_content(path, &content)?;

        Ok(RemoteFile {
            bytes,
            token: VersionToken(body.sha),
        })
    }

    async fn write(
        &self,
        path: &str,
        bytes: &[u8],
        message: &str,
        token: Option<&VersionToken>,
    ) -> Result<VersionToken, StoreError> {
        let request = WriteRequest {
            message,
            content: BASE64_STANDARD.encode(bytes),
            branch: &self.branch,
            sha: token.map(|t| t.0.as_str()),
        };

        let res = self
            .http
            .put(self.url(path))
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github.v3+json")
            .json(&request)
            .send()
            .await?;

        let res = Self::check_status(path, res)?;
        let body: WriteResponse = res.json().await?;
        Ok(VersionToken(body.content.sha))
    }

    async fn list_dir(&self, path: &str) -> Result<Vec<DirEntry>, StoreError> {
        let res = self.get(path).await?;
        let entries: Vec<DirEntryResponse> = res.json().await?;

        let entries = entries
            .into_iter()
            .map(|e| DirEntry {
                name: e.name,
                path: e.path,
                download_url: e.download_url.unwrap_or_default(),
            })
            .collect();

        Ok(entries)
    }
}

/// In-memory store used by the workflow tests. Tokens are sequence
/// numbers; the conflict rules mirror the contents API.
#[cfg(test)]
pub mod mem {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct MemStore {
        state: Mutex<MemState>,
    }

    #[derive(Default)]
    struct MemState {
        objects: BTreeMap<String, (Vec<u8>, u64)>,
        next_rev: u64,
        write_count: u64,
    }

    impl MemStore {
        pub fn new() -> MemStore {
            MemStore::default()
        }

        pub fn with_file(self, path: &str, bytes: &[u8]) -> MemStore {
            {
                let mut state = self.state.lock().unwrap();
                state.next_rev += 1;
                let rev = state.next_rev;
                state.objects.insert(path.to_string(), (bytes.to_vec(), rev));
            }
            self
        }

        pub fn contents(&self, path: &str) -> Option<Vec<u8>> {
            let state = self.state.lock().unwrap();
            state.objects.get(path).map(|(bytes, _)| bytes.clone())
        }

        pub fn write_count(&self) -> u64 {
            self.state.lock().unwrap().write_count
        }

        /// Simulates another editor changing the file, advancing its token.
        pub fn external_update(&self, path: &str, bytes: &[u8]) {
            let mut state = self.state.lock().unwrap();
            state.next_rev += 1;
            let rev = state.next_rev;
            state.objects.insert(path.to_string(), (bytes.to_vec(), rev));
        }
    }

    impl ContentStore for MemStore {
        async fn read(&self, path: &str) -> Result<RemoteFile, StoreError> {
            let state = self.state.lock().unwrap();
            match state.objects.get(path) {
                Some((bytes, rev)) => Ok(RemoteFile {
                    bytes: bytes.clone(),
                    token: VersionToken(rev.to_string()),
                }),
                None => Err(StoreError::NotFound { path: path.to_string() }),
            }
        }

        async fn write(
            &self,
            path: &str,
            bytes: &[u8],
            _message: &str,
            token: Option<&VersionToken>,
        ) -> Result<VersionToken, StoreError> {
            let mut state = self.state.lock().unwrap();
            state.write_count += 1;

            let current = state.objects.get(path).map(|(_, rev)| *rev);
            match (current, token) {
                (Some(rev), Some(token)) if token.0 == rev.to_string() => {}
                (None, None) => {}
                _ => return Err(StoreError::Conflict { path: path.to_string() }),
            }

            state.next_rev += 1;
            let rev = state.next_rev;
            state.objects.insert(path.to_string(), (bytes.to_vec(), rev));
            Ok(VersionToken(rev.to_string()))
        }

        async fn list_dir(&self, path: &str) -> Result<Vec<DirEntry>, StoreError> {
            let prefix = format!("{}/", path.trim_end_matches('/'));
            let state = self.state.lock().unwrap();

            let entries: Vec<DirEntry> = state
                .objects
                .keys()
                .filter_map(|key| {
                    let rest = key.strip_prefix(&prefix)?;
                    if rest.contains('/') {
                        return None;
                    }
                    Some(DirEntry {
                        name: rest.to_string(),
                        path: key.clone(),
                        download_url: format!("https://raw.example/{}", key),
                    })
                })
                .collect();

            if entries.is_empty() && !state.objects.keys().any(|k| k.starts_with(&prefix)) {
                return Err(StoreError::NotFound { path: path.to_string() });
            }
            Ok(entries)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mem::MemStore;
    use super::*;

    #[tokio::test]
    async fn test_try_get_version_token() {
        let store = MemStore::new().with_file("blog/data/posts.json", b"[]");

        let token = store.try_get_version_token("blog/data/posts.json").await.unwrap();
        assert!(token.is_some());

        let token = store.try_get_version_token("blog/data/missing.json").await.unwrap();
        assert!(token.is_none());
    }

    #[tokio::test]
    async fn test_write_requires_current_token() {
        let store = MemStore::new().with_file("a.txt", b"one");
        let token = store.read("a.txt").await.unwrap().token;

        // Someone else writes in between
        store.external_update("a.txt", b"two");

        let res = store.write("a.txt", b"three", "update", Some(&token)).await;
        assert!(matches!(res, Err(StoreError::Conflict { .. })));

        // A fresh token succeeds
        let token = store.read("a.txt").await.unwrap().token;
        store.write("a.txt", b"three", "update", Some(&token)).await.unwrap();
        assert_eq!(store.contents("a.txt").unwrap(), b"three");
    }

    #[tokio::test]
    async fn test_create_rejects_stale_modes() {
        let store = MemStore::new().with_file("a.txt", b"one");

        // Blind create over an existing file is a conflict
        let res = store.write("a.txt", b"two", "create", None).await;
        assert!(matches!(res, Err(StoreError::Conflict { .. })));

        // Update of a missing file is a conflict as well
        let res = store
            .write("b.txt", b"two", "update", Some(&VersionToken("1".to_string())))
            .await;
        assert!(matches!(res, Err(StoreError::Conflict { .. })));
    }

    #[test]
    fn test_decode_content_strips_line_breaks() {
        let decoded = GitHubStore::decode_content("p", "aGVs\nbG8=\n").unwrap();
        assert_eq!(decoded, b"hello");
    }
}
