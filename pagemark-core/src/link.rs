use once_cell::sync::Lazy;
use regex::Regex;

static LINK_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^#?highlight-(?P<id>[^\s#]+)$").ok());

pub fn highlight_link(id: &str) -> String {
    format!("#highlight-{id}")
}

pub fn parse_highlight_link(fragment: &str) -> Option<&str> {
    let pattern = LINK_PATTERN.as_ref()?;
    pattern
        .captures(fragment.trim())
        .and_then(|captures| captures.name("id"))
        .map(|id| id.as_str())
}
