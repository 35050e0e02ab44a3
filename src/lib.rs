pub mod config;
pub mod draft;
pub mod logger;
pub mod media;
pub mod post;
pub mod session;
pub mod store;
pub mod text_utils;
pub mod util;
pub mod view;
