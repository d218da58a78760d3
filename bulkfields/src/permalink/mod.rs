// Permalink generation and URL normalization for lookups

/// Slugify a string for use in a permalink
pub fn slugify(input: &str) -> String {
    slug::slugify(input)
}

/// Build the canonical permalink for a record: `/{record_type}/{slug}/`.
/// `attempt` > 1 appends a numeric suffix to the slug to dodge conflicts.
pub fn build(record_type: &str, title: &str, attempt: u32) -> String {
    let mut slug = slugify(title);
    if slug.is_empty() {
        slug = "untitled".to_string();
    }
    if attempt > 1 {
        slug = format!("{slug}-{attempt}");
    }
    format!("/{}/{}/", slugify(record_type), slug)
}

/// Reduce a URL or path to the form used for lookups.
///
/// Scheme and host, query string, fragment and leading/trailing slashes are
/// dropped, so `https://example.com/post/shirt/?ref=x` and `post/shirt`
/// normalize to the same key.
pub fn normalize(url: &str) -> String {
    let mut rest = url.trim();
    if let Some(pos) = rest.find("://") {
        rest = &rest[pos + 3..];
        rest = match rest.find('/') {
            Some(slash) => &rest[slash..],
            None => "",
        };
    }
    if let Some(pos) = rest.find(|c| c == '?' || c == '#') {
        rest = &rest[..pos];
    }
    rest.trim_matches('/').to_string()
}
