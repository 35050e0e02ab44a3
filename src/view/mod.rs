pub mod body_extract;
pub mod document_renderer;

/// Default standalone-post template shipped with the tool. A site can
/// override it through the template_dir config entry.
pub const DEFAULT_POST_TEMPLATE: &str = include_str!("../../res/templates/post.tpl");
