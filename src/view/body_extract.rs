/// Opening tag of the content container inside a rendered document.
pub const CONTENT_OPEN: &str = "<div class=\"article-content\">";

/// Fixed comment that follows the content container. Document generation
/// and extraction must keep this marker in sync with the template.
pub const RELATED_MARKER: &str = "<!-- Related Articles -->";

const LEAD_OPEN: &str = "<p class=\"lead\">";

/// Recovers the editable body fragment from a previously rendered
/// document: the segment between the content-container opening tag and the
/// related-articles marker, with the lead-paragraph wrapper stripped back
/// to a plain paragraph.
///
/// Returns None when the expected markers are not found, in which case the
/// caller falls back to the legacy embedded content field.
pub fn extract_body(document_html: &str) -> Option<String> {
    let start = document_html.find(CONTENT_OPEN)? + CONTENT_OPEN.len();
    let end = document_html[start..].find(RELATED_MARKER)? + start;
    let segment = &document_html[start..end];

    // The last closing div before the marker belongs to the container
    let segment = &segment[..segment.rfind("</div>")?];
    let segment = segment.trim();

    if segment.starts_with(LEAD_OPEN) {
        Some(segment.replacen(LEAD_OPEN, "<p>", 1))
    } else {
        Some(segment.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::document_renderer::DocumentRenderer;
    use crate::view::DEFAULT_POST_TEMPLATE;

    fn render(body: &str) -> String {
        let record = crate::post::PostRecord {
            id: 1,
            title: "Round Trip".to_string(),
            slug: Some("round-trip".to_string()),
            date: "2026-01-17".to_string(),
            excerpt: "Excerpt".to_string(),
            image: "posts/26-01-17-round-trip/hero.jpg".to_string(),
            image_alt: None,
            tags: vec!["Test".to_string()],
            featured: false,
            author: None,
            read_time: None,
            content: None,
            extra: serde_json::Map::new(),
        };
        DocumentRenderer::new(DEFAULT_POST_TEMPLATE).unwrap().render(&record, body)
    }

    #[test]
    fn test_round_trip_with_lead_paragraph() {
        let body = "<p>Intro</p><h2>More</h2><p>Closing thoughts.</p>";
        let extracted = extract_body(&render(body)).unwrap();
        assert_eq!(extracted, body);
    }

    #[test]
    fn test_round_trip_without_lead_paragraph() {
        let body = "<h2>Straight to business</h2><ul><li>one</li></ul>";
        let extracted = extract_body(&render(body)).unwrap();
        assert_eq!(extracted, body);
    }

    #[test]
    fn test_round_trip_body_containing_divs() {
        let body = "<p>Intro</p><div class=\"callout\"><p>Note</p></div><p>End</p>";
        let extracted = extract_body(&render(body)).unwrap();
        assert_eq!(extracted, body);
    }

    #[test]
    fn test_missing_markers() {
        assert_eq!(extract_body("<html><body>no markers</body></html>"), None);
        // Container present but marker missing
        let html = format!("{}{}</div>", CONTENT_OPEN, "<p>body</p>");
        assert_eq!(extract_body(&html), None);
    }

    #[test]
    fn test_lead_unwrap_only_touches_first_paragraph() {
        let body = "<p>Intro</p><p class=\"lead\">not really</p>";
        let extracted = extract_body(&render(body)).unwrap();
        assert_eq!(extracted, body);
    }
}
