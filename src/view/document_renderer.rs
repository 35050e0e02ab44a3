use std::io;
use std::io::ErrorKind;

use lazy_static::lazy_static;
use ramhorns::Template;
use regex::Regex;

use crate::post::PostRecord;
use crate::text_utils::{dir_prefix, display_date, parse_post_date, slugify};

pub const DEFAULT_READ_TIME: &str = "5 min read";

#[derive(ramhorns::Content)]
struct ViewTag<'a> {
    tag: &'a str,
}

#[derive(ramhorns::Content)]
struct ViewDocument<'a> {
    title: &'a str,
    excerpt: &'a str,
    hero: &'a str,
    image_alt: &'a str,
    display_date: &'a str,
    author_name: &'a str,
    read_time: &'a str,
    tags: Vec<ViewTag<'a>>,
    content: &'a str,
}

pub struct DocumentRenderer<'a> {
    pub template: Template<'a>,
}

impl DocumentRenderer<'_> {
    pub fn new(doc_tpl_src: &str) -> io::Result<DocumentRenderer> {
        let template = match Template::new(doc_tpl_src) {
            Ok(x) => x,
            Err(e) => {
                return Err(io::Error::new(ErrorKind::InvalidInput, format!("Error parsing post document template: {}", e)));
            }
        };

        Ok(DocumentRenderer {
            template,
        })
    }

    /// Renders the complete standalone HTML document for a post. The body
    /// fragment is embedded verbatim, except that a plain first paragraph
    /// is promoted to the lead paragraph.
    pub fn render(&self, record: &PostRecord, body_html: &str) -> String {
        let display_date = match parse_post_date(&record.date) {
            Ok(date) => display_date(&date),
            Err(_) => record.date.clone(),
        };

        let tags: Vec<ViewTag> = record.tags.iter().map(|t| ViewTag { tag: t.as_str() }).collect();
        let content = promote_lead(body_html);
        let hero = hero_src(record);

        self.template.render(&ViewDocument {
            title: record.title.as_str(),
            excerpt: record.excerpt.as_str(),
            hero: hero.as_str(),
            image_alt: record.image_alt.as_deref().unwrap_or(record.title.as_str()),
            display_date: display_date.as_str(),
            author_name: record.author_name(),
            read_time: record.read_time.as_deref().unwrap_or(DEFAULT_READ_TIME),
            tags,
            content: content.as_str(),
        })
    }
}

/// Hero image src as seen from the post page at posts/<dir>/index.html.
/// An image living in the post's own directory is referenced by file name.
fn hero_src(record: &PostRecord) -> String {
    let image = record.image.as_str();
    if image.contains("://") {
        return image.to_string();
    }

    if let Ok(date) = parse_post_date(&record.date) {
        let slug = match record.slug {
            Some(ref s) => s.clone(),
            None => slugify(&record.title),
        };
        let own_dir = format!("posts/{}-{}/", dir_prefix(&date), slug);
        if let Some(name) = image.strip_prefix(own_dir.as_str()) {
            return name.to_string();
        }
    }

    // Site-relative path, two levels up from the post page
    format!("../../{}", image)
}

/// Wraps a plain first paragraph with the lead marker class. Bodies that
/// start with anything else are embedded unchanged.
fn promote_lead(body_html: &str) -> String {
    lazy_static! {
        static ref FIRST_PARA: Regex = Regex::new(r"(?s)^<p>(.*?)</p>").unwrap();
    }

    let body = body_html.trim();
    match FIRST_PARA.captures(body) {
        Some(caps) => {
            let full = caps.get(0).unwrap();
            let lead = caps.get(1).unwrap().as_str();
            format!("<p class=\"lead\">{}</p>{}", lead, &body[full.end()..])
        }
        None => body.to_string(),
    }
}
