//! Embedded image markers.
//!
//! Inline images live in [`Note::embedded_images`](crate::model::Note) and are placed
//! in the note body with a markdown-like marker:
//!
//! ```text
//! ![alt text](embedded:<imageId>)
//! ```

use once_cell::sync::Lazy;
use regex::Regex;

static EMBEDDED_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"!\[([^\]]*)\]\(embedded:([^)\s]+)\)").expect("embedded marker regex is valid")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedRef {
    pub alt: String,
    pub image_id: String,
}

/// All embedded image references in `content`, in document order.
pub fn embedded_refs(content: &str) -> Vec<EmbeddedRef> {
    EMBEDDED_MARKER
        .captures_iter(content)
        .map(|caps| EmbeddedRef {
            alt: caps[1].to_string(),
            image_id: caps[2].to_string(),
        })
        .collect()
}

/// Render the marker for an embedded image.
pub fn embedded_marker(alt: &str, image_id: &str) -> String {
    format!("![{}](embedded:{})", alt, image_id)
}
