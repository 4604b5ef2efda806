//! Tag normalization.
//!
//! Tags form a set for identity purposes but keep the order they were entered in
//! for display. Normalizing:
//! - trims surrounding whitespace
//! - drops empty entries
//! - drops later duplicates (the first occurrence wins)

/// Normalize a tag list. See the module docs for the rules.
///
/// # Examples
/// ```
/// use notepocket::tags::normalize_tags;
///
/// let tags = normalize_tags(vec![" work ".into(), "".into(), "ideas".into(), "work".into()]);
/// assert_eq!(tags, vec!["work", "ideas"]);
/// ```
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let trimmed = tag.trim();
        if trimmed.is_empty() || out.iter().any(|t| t == trimmed) {
            continue;
        }
        out.push(trimmed.to_string());
    }
    out
}
