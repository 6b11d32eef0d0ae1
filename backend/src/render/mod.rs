//! # Template Renderer
//!
//! Turns a [`TemplateConfig`] into a self-contained HTML document. Rendering is
//! pure: the only ambient input is the date used when the configured date is
//! missing or unparseable, and [`render_at`] takes that explicitly.
//!
//! Guarantees:
//! - every free-text field goes through [`sanitize::escape_html`];
//! - colors are re-validated and replaced by defaults when malformed;
//! - logo bounds are clamped and geometry comes from the enumerated size;
//! - `{{namespace.path}}` tokens are emitted literally and left for the
//!   variable binder to resolve per recipient.

pub mod locale;
pub mod sanitize;
mod styles;

use chrono::{NaiveDate, Utc};
use common::model::template::{
    SignatureEntry, TemplateConfig, DEFAULT_BODY_COLOR, DEFAULT_OVERLAY_COLOR, DEFAULT_TITLE_COLOR,
    RECIPIENT_NAME_TOKEN,
};
use std::fmt::Write;

use locale::{parse_date, Language};
use sanitize::{escape_html, neutralize_closing_tag, normalize_color, safe_url};

/// `id` of the element holding the certificate content in every rendered document.
pub const CERTIFICATE_ELEMENT_ID: &str = "certificate";

/// Renders `config` using today's date (UTC) as the date fallback.
pub fn render(config: &TemplateConfig) -> String {
    render_at(config, Utc::now().date_naive())
}

/// Renders `config`, using `today` when the configured date is missing or invalid.
pub fn render_at(config: &TemplateConfig, today: NaiveDate) -> String {
    let language = Language::from_tag(&config.locale);
    let geometry = config.size.geometry();

    let title_color = color_or(&config.title_color, DEFAULT_TITLE_COLOR);
    let body_color = color_or(&config.body_color, DEFAULT_BODY_COLOR);
    let overlay_color = color_or(&config.overlay_color, DEFAULT_OVERLAY_COLOR);

    let title = text_or(&config.title, language.default_title());
    let body_primary = text_or(&config.body_primary, language.default_body_primary());
    let body_secondary = text_or(&config.body_secondary, language.default_body_secondary());
    let recipient = text_or(&config.recipient_name, RECIPIENT_NAME_TOKEN);
    let date = config
        .date
        .as_deref()
        .and_then(parse_date)
        .unwrap_or(today);

    let mut html = String::with_capacity(8 * 1024);
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html lang=\"{lang}\">\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n<style>\n",
        lang = language.code(),
        title = escape_html(title),
    );
    let _ = write!(
        html,
        "{}",
        styles::base_css(geometry, &title_color, &body_color, &overlay_color)
    );
    if let Some(css) = config.custom_css.as_deref().filter(|css| !css.trim().is_empty()) {
        html.push_str(&neutralize_closing_tag(css, "style"));
        html.push('\n');
    }
    html.push_str("</style>\n</head>\n<body>\n");

    let _ = write!(
        html,
        "<div id=\"{id}\" class=\"certificate\" data-size=\"{size}\"{background}>\n<div class=\"certificate__overlay\"></div>\n<div class=\"certificate__content\">\n",
        id = CERTIFICATE_ELEMENT_ID,
        size = config.size.as_str(),
        background = background_attr(config.background_image.as_deref()),
    );

    if let Some(src) = config.logo.image.as_deref().and_then(safe_url) {
        let (width, height) = config.logo.clamped();
        let _ = writeln!(
            html,
            "<img class=\"certificate__logo\" src=\"{}\" alt=\"logo\" style=\"max-width:{}px;max-height:{}px\">",
            escape_html(src),
            width,
            height
        );
    }

    let _ = writeln!(html, "<h1 class=\"certificate__title\">{}</h1>", escape_html(title));
    let _ = writeln!(html, "<p class=\"certificate__body\">{}</p>", escape_html(body_primary));
    let _ = writeln!(html, "<h2 class=\"certificate__recipient\">{}</h2>", escape_html(recipient));
    let _ = writeln!(html, "<p class=\"certificate__body\">{}</p>", escape_html(body_secondary));
    if !config.course_name.trim().is_empty() {
        let _ = writeln!(
            html,
            "<h3 class=\"certificate__course\">{}</h3>",
            escape_html(config.course_name.trim())
        );
    }
    let _ = writeln!(
        html,
        "<p class=\"certificate__date\">{}</p>",
        escape_html(&language.format_date(date))
    );

    render_signatures(&mut html, config);

    html.push_str("</div>\n</div>\n");
    if let Some(js) = config.custom_js.as_deref().filter(|js| !js.trim().is_empty()) {
        let _ = writeln!(html, "<script>\n{}\n</script>", neutralize_closing_tag(js, "script"));
    }
    html.push_str("</body>\n</html>\n");
    html
}

fn render_signatures(html: &mut String, config: &TemplateConfig) {
    if config.signatures.is_empty() {
        if !config.signer_name.trim().is_empty() {
            html.push_str("<div class=\"certificate__signatures\">\n");
            let _ = writeln!(
                html,
                "<div class=\"signature\"><div class=\"signature__line\"></div><p class=\"signature__name\">{}</p></div>",
                escape_html(config.signer_name.trim())
            );
            html.push_str("</div>\n");
        }
        return;
    }

    html.push_str("<div class=\"certificate__signatures\">\n");
    for (index, entry) in config.signatures.iter().enumerate() {
        render_signature(html, index + 1, entry, config);
    }
    html.push_str("</div>\n");
}

fn render_signature(html: &mut String, position: usize, entry: &SignatureEntry, config: &TemplateConfig) {
    let namespace = format!("firma_{position}");
    let name = match entry.name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        // The first signature falls back to the template-level signer before a token.
        _ if position == 1 && !config.signer_name.trim().is_empty() => config.signer_name.trim().to_string(),
        _ => format!("{{{{{namespace}.nombre}}}}"),
    };
    let role = match entry.role.as_deref().map(str::trim) {
        Some(role) if !role.is_empty() => role.to_string(),
        _ => format!("{{{{{namespace}.puesto}}}}"),
    };

    html.push_str("<div class=\"signature\">\n");
    if let Some(src) = entry.image.as_deref().and_then(safe_url) {
        let _ = writeln!(
            html,
            "<img class=\"signature__image\" src=\"{}\" alt=\"{}\">",
            escape_html(src),
            escape_html(&entry.alt)
        );
    }
    let _ = writeln!(html, "<div class=\"signature__line\"></div>");
    let _ = writeln!(html, "<p class=\"signature__name\">{}</p>", escape_html(&name));
    let _ = writeln!(html, "<p class=\"signature__role\">{}</p>", escape_html(&role));
    html.push_str("</div>\n");
}

fn background_attr(image: Option<&str>) -> String {
    match image.and_then(safe_url) {
        Some(url) => format!(
            " style=\"background-image:url({})\"",
            escape_html(url)
        ),
        None => String::new(),
    }
}

fn color_or(value: &str, fallback: &str) -> String {
    normalize_color(value).unwrap_or_else(|| fallback.to_string())
}

fn text_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback
    } else {
        trimmed
    }
}
