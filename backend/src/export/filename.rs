use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;

/// Stem used when a template name has no usable characters.
pub const FALLBACK_STEM: &str = "certificado";

static NON_ALNUM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("slug pattern is valid"));

/// Lowercases `name`, collapses non-alphanumeric runs into one hyphen and trims hyphens.
pub fn slugify(name: &str) -> String {
    let lower = name.to_lowercase();
    NON_ALNUM_RE
        .replace_all(&lower, "-")
        .trim_matches('-')
        .to_string()
}

/// File name for an exported artifact, stamped with the current time if requested.
pub fn generate_export_filename(name: &str, extension: &str, include_timestamp: bool) -> String {
    export_filename_at(name, extension, include_timestamp.then(Utc::now))
}

pub fn export_filename_at(name: &str, extension: &str, timestamp: Option<DateTime<Utc>>) -> String {
    let mut stem = slugify(name);
    if stem.is_empty() {
        stem = FALLBACK_STEM.to_string();
    }
    if let Some(timestamp) = timestamp {
        stem.push('-');
        stem.push_str(&timestamp.format("%Y-%m-%dT%H-%M-%S").to_string());
    }
    format!("{stem}.{}", extension.trim_start_matches('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn slug_rules() {
        assert_eq!(generate_export_filename("Mi Plantilla!!", "png", false), "mi-plantilla.png");
        assert_eq!(slugify("  --Curso   de Rust 2024--  "), "curso-de-rust-2024");
        assert_eq!(slugify("a__b..c"), "a-b-c");
    }

    #[test]
    fn empty_names_use_fallback() {
        assert_eq!(generate_export_filename("!!!", ".pdf", false), "certificado.pdf");
        assert_eq!(generate_export_filename("", "jpg", false), "certificado.jpg");
    }

    #[test]
    fn timestamp_suffix_is_filesystem_safe() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(
            export_filename_at("Diploma", "pdf", Some(at)),
            "diploma-2024-03-09T14-05-07.pdf"
        );
        assert!(!generate_export_filename("Diploma", "pdf", true).contains(':'));
    }
}
