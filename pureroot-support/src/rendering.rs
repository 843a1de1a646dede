//! Text rendering utilities for human-friendly error messages.
//!
//! Provides helpers to shorten type names, suggest registered handler
//! kinds for a mistyped one, and lay out multi-item failure reports.

/// Renders items as an indented bullet list, one per line.
///
/// Every line starts with a newline so the result can be appended
/// directly after a headline.
///
/// # Examples
/// ```
/// use pureroot_support::rendering::render_bullets;
///
/// let rendered = render_bullets(&["Cache: flush failed", "Pool: timeout"]);
/// assert_eq!(rendered, "\n  - Cache: flush failed\n  - Pool: timeout");
/// ```
pub fn render_bullets(items: &[impl AsRef<str>]) -> String {
    items
        .iter()
        .map(|item| format!("\n  - {}", item.as_ref()))
        .collect()
}

/// Renders names as a comma separated list, or `<none>` when empty.
///
/// ```
/// use pureroot_support::rendering::render_names;
///
/// assert_eq!(render_names(&["hello", "greeting"]), "hello, greeting");
/// assert_eq!(render_names::<&str>(&[]), "<none>");
/// ```
pub fn render_names<S: AsRef<str>>(names: &[S]) -> String {
    if names.is_empty() {
        return "<none>".to_string();
    }
    names
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Shortens a fully qualified type name for display.
///
/// ```
/// use pureroot_support::rendering::shorten_type_name;
///
/// let short = shorten_type_name("pureroot_server::models::ScopedDependency");
/// assert_eq!(short, "ScopedDependency");
///
/// let short = shorten_type_name("alloc::sync::Arc<dyn pureroot_server::models::Dependency>");
/// assert_eq!(short, "Arc<dyn Dependency>");
/// ```
pub fn shorten_type_name(full_name: &str) -> String {
    let mut result = String::with_capacity(full_name.len());
    let mut chars = full_name.chars().peekable();
    let mut segment = String::new();

    while let Some(ch) = chars.next() {
        match ch {
            ':' if chars.peek() == Some(&':') => {
                chars.next();
                // only the last path segment survives
                segment.clear();
            }
            '<' | '>' | ',' | ' ' => {
                result.push_str(&segment);
                result.push(ch);
                segment.clear();
            }
            _ => segment.push(ch),
        }
    }

    result.push_str(&segment);
    result
}

/// Suggests registered names close to a requested one.
///
/// Substring matches rank first, then names sharing a prefix of at
/// least three characters. Comparison is case-insensitive.
///
/// ```
/// use pureroot_support::rendering::suggest_similar;
///
/// let known = ["hello", "greeting", "health"];
/// let suggestions = suggest_similar("helo", &known, 2);
/// assert_eq!(suggestions.first().map(String::as_str), Some("hello"));
/// ```
pub fn suggest_similar<S: AsRef<str>>(
    requested: &str,
    available: &[S],
    max_suggestions: usize,
) -> Vec<String> {
    let wanted = requested.to_lowercase();

    let mut scored: Vec<(&str, usize)> = available
        .iter()
        .map(|name| name.as_ref())
        .filter(|name| !name.eq_ignore_ascii_case(requested))
        .filter_map(|name| {
            let candidate = name.to_lowercase();

            if candidate.contains(&wanted) || wanted.contains(&candidate) {
                return Some((name, 100));
            }

            let common = candidate
                .chars()
                .zip(wanted.chars())
                .take_while(|(a, b)| a == b)
                .count();

            (common >= 3).then_some((name, common * 10))
        })
        .collect();

    scored.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    scored
        .into_iter()
        .take(max_suggestions)
        .map(|(name, _)| name.to_string())
        .collect()
}
