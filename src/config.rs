use std::io::ErrorKind;
use std::path::PathBuf;
use std::{env, fs, io};

use serde::Deserialize;

use crate::session::SitePaths;

#[derive(Deserialize)]
pub struct GitHub {
    pub owner: String,
    pub repo: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Environment variable holding the access token. Token acquisition
    /// itself is outside this tool.
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}

#[derive(Deserialize)]
pub struct Paths {
    pub index_path: String,
    pub posts_dir: String,
    pub images_dir: String,
    /// Local directory with a post.tpl overriding the built-in template
    pub template_dir: Option<PathBuf>,
}

#[derive(Deserialize)]
pub struct Unsplash {
    pub access_key: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page_size() -> u32 {
    12
}

#[derive(Deserialize)]
pub struct Log {
    pub level: LogLevel,
    pub log_to_console: bool,
    pub location: Option<PathBuf>,
}

#[derive(Deserialize, Copy, Clone)]
pub enum LogLevel {
    Critical = 0,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Deserialize)]
pub struct Config {
    pub github: GitHub,
    pub paths: Paths,
    pub unsplash: Option<Unsplash>,
    pub log: Option<Log>,
}

impl Config {
    pub fn site_paths(&self) -> SitePaths {
        SitePaths {
            index_path: self.paths.index_path.clone(),
            posts_dir: self.paths.posts_dir.clone(),
            images_dir: self.paths.images_dir.clone(),
        }
    }
}

fn parse_path(path: PathBuf) -> PathBuf {
    if path.starts_with("${exe_dir}") {
        let cur_exe = env::current_exe().unwrap();
        let exe_dir = cur_exe.parent().unwrap().to_str().unwrap();
        let str_path = path.to_str().unwrap();
        PathBuf::from(str_path.replace("${exe_dir}", exe_dir))
    } else {
        path
    }
}

pub fn read_config(cfg_path: &PathBuf) -> io::Result<Config> {
    let cfg_content = match fs::read_to_string(cfg_path) {
        Ok(content) => content,
        Err(e) => return Err(io::Error::new(e.kind(), format!("Error opening configuration file {}: {}", cfg_path.to_str().unwrap(), e))),
    };

    let mut cfg: Config = match toml::from_str::<Config>(cfg_content.as_str()) {
        Ok(cfg) => cfg,
        Err(e) => return Err(io::Error::new(
            ErrorKind::InvalidData, format!("Error parsing configuration file: {}", e))),
    };

    cfg.paths.template_dir = cfg.paths.template_dir.map(parse_path);
    if let Some(ref mut log) = cfg.log {
        log.location = log.location.take().map(parse_path);
    }

    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml_str = r##"
[github]
owner = "atoates"
repo = "vacatad-website"

[paths]
index_path = "blog/data/posts.json"
posts_dir = "blog/posts"
images_dir = "blog/images"

[unsplash]
access_key = "key"
"##;
        let cfg: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.github.branch, "main");
        assert_eq!(cfg.github.token_env, "GITHUB_TOKEN");
        assert_eq!(cfg.paths.index_path, "blog/data/posts.json");
        assert_eq!(cfg.unsplash.unwrap().page_size, 12);
        assert!(cfg.log.is_none());

        let paths = Config {
            github: GitHub {
                owner: "o".to_string(),
                repo: "r".to_string(),
                branch: "main".to_string(),
                token_env: "GITHUB_TOKEN".to_string(),
            },
            paths: Paths {
                index_path: "blog/data/posts.json".to_string(),
                posts_dir: "blog/posts".to_string(),
                images_dir: "blog/images".to_string(),
                template_dir: None,
            },
            unsplash: None,
            log: None,
        }
        .site_paths();
        assert_eq!(paths.posts_dir, "blog/posts");
    }
}
