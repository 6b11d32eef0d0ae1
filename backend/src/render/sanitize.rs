//! Escaping and validation for values entering rendered markup.
//!
//! - `escape_html` is applied to every free-text field and to every attribute value.
//! - `normalize_color` constrains values emitted unescaped into style declarations.
//! - `safe_url` filters image references before they reach `src` or `url(...)`.
//! - `neutralize_closing_tag` keeps raw CSS/JS extensions inside their block.

/// Escapes `& < > " ' /` into HTML entities.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '/' => out.push_str("&#x2F;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Reverses `escape_html` (and the few named entities a browser would emit).
pub fn unescape_html(input: &str) -> String {
    input
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&#x2F;", "/")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Normalizes a color to lowercase `#rrggbb` or `transparent`.
///
/// Accepts `#rgb`/`#rrggbb` with or without the leading `#`, in any case.
pub fn normalize_color(input: &str) -> Option<String> {
    let value = input.trim();
    if value.eq_ignore_ascii_case("transparent") {
        return Some("transparent".to_string());
    }
    let hex = value.strip_prefix('#').unwrap_or(value);
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let hex = hex.to_ascii_lowercase();
    match hex.len() {
        6 => Some(format!("#{hex}")),
        3 => {
            let expanded: String = hex.chars().flat_map(|c| [c, c]).collect();
            Some(format!("#{expanded}"))
        }
        _ => None,
    }
}

/// Returns the trimmed reference if it is safe to embed in `src` or CSS `url()`.
///
/// Allowed: `http(s)://`, `data:image/...`, and scheme-less relative references.
/// Quotes, parentheses, backslashes, angle brackets, whitespace and control
/// characters are rejected outright.
pub fn safe_url(input: &str) -> Option<&str> {
    let url = input.trim();
    if url.is_empty() {
        return None;
    }
    let forbidden = |c: char| {
        matches!(c, '"' | '\'' | '(' | ')' | '\\' | '<' | '>') || c.is_whitespace() || c.is_control()
    };
    if url.chars().any(forbidden) {
        return None;
    }

    let lower = url.to_ascii_lowercase();
    if lower.starts_with("https://") || lower.starts_with("http://") || lower.starts_with("data:image/") {
        return Some(url);
    }
    match lower.split_once(':') {
        // A colon before any path separator means an explicit scheme.
        Some((scheme, _)) if !scheme.contains('/') && !scheme.contains('?') && !scheme.contains('#') => None,
        _ => Some(url),
    }
}

/// Breaks any `</tag` sequence so raw content cannot close its enclosing block.
pub fn neutralize_closing_tag(content: &str, tag: &str) -> String {
    let needle = format!("</{}", tag.to_ascii_lowercase());
    let lower = content.to_ascii_lowercase();
    let mut out = String::with_capacity(content.len());
    let mut last = 0;
    for (idx, _) in lower.match_indices(&needle) {
        out.push_str(&content[last..idx]);
        out.push_str("<\\/");
        last = idx + 2;
    }
    out.push_str(&content[last..]);
    out
}
