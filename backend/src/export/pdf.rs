//! genpdf-backed [`DocumentPrinter`].
//!
//! genpdf has no HTML engine, so the print view is reduced to its text
//! blocks (headings and paragraphs inside the certificate) which are laid out
//! centred on a page the size of the canonical geometry. A `data:` URI logo is
//! decoded, downscaled and embedded above the text.

use super::print::{DocumentPrinter, EDITOR_CHROME_ATTR, SELECTION_OUTLINE_CLASS};
use crate::error::ExportError;
use crate::render::sanitize::unescape_html;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use common::model::template::{Geometry, LOGO_MAX_HEIGHT_PX, LOGO_MAX_WIDTH_PX};
use genpdf::elements::{Break, Image as PdfImage, Paragraph};
use genpdf::style::Style;
use genpdf::{Alignment, Document, Element};
use image::imageops::FilterType;
use image::{load_from_memory, DynamicImage, GenericImageView};
use png::{BitDepth as PngBitDepth, ColorType as PngColorType, Encoder as PngEncoder};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tempfile::NamedTempFile;

const IMAGE_DPI: f64 = 150.0;
const CSS_PX_PER_INCH: f64 = 96.0;
const FONT_FAMILIES: [&str; 2] = ["Arial", "LiberationSans"];

static BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<(h[1-3]|p)\b([^>]*)>(.*?)</(?:h[1-3]|p)>").expect("block pattern is valid")
});
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));
static LOGO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<img class="certificate__logo" src="(data:image[^"]+)""#).expect("logo pattern is valid")
});

/// A heading or paragraph extracted from the print view.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub tag: String,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct GenpdfPrinter {
    fonts_dir: PathBuf,
}

impl GenpdfPrinter {
    pub fn new(fonts_dir: impl Into<PathBuf>) -> Self {
        Self {
            fonts_dir: fonts_dir.into(),
        }
    }

    /// Synchronous rendering; call from a blocking context.
    pub fn print_blocking(&self, document: &str, geometry: Geometry) -> Result<Vec<u8>, ExportError> {
        let blocks = extract_blocks(document);
        let mut doc = configure_document(&self.fonts_dir, geometry)?;
        if let Some(title) = blocks.iter().find(|block| block.tag == "h1") {
            doc.set_title(title.text.clone());
        }

        // Keep temporary files alive until rendering finishes
        let mut temp_files: Vec<NamedTempFile> = Vec::new();
        if let Some(bytes) = LOGO_RE
            .captures(document)
            .and_then(|caps| decode_data_uri(&unescape_html(&caps[1])))
        {
            match embed_logo(&bytes, &mut temp_files) {
                Ok(logo) => {
                    doc.push(logo);
                    doc.push(Break::new(1));
                }
                Err(err) => log::warn!("skipping logo: {err}"),
            }
        }

        for block in &blocks {
            let mut style = Style::new();
            match block.tag.as_str() {
                "h1" => style = style.bold().with_font_size(26),
                "h2" => style = style.bold().with_font_size(22),
                "h3" => style = style.bold().with_font_size(16),
                _ => style = style.with_font_size(12),
            }
            doc.push(Paragraph::new(block.text.clone()).aligned(Alignment::Center).styled(style));
            doc.push(Break::new(1));
        }

        let mut out = Vec::new();
        doc.render(&mut out)?;
        Ok(out)
    }
}

#[async_trait]
impl DocumentPrinter for GenpdfPrinter {
    async fn print(&self, document: &str, geometry: Geometry) -> Result<Vec<u8>, ExportError> {
        let printer = self.clone();
        let document = document.to_string();
        tokio::task::spawn_blocking(move || printer.print_blocking(&document, geometry))
            .await
            .map_err(|e| ExportError::Io(std::io::Error::other(e.to_string())))?
    }
}

/// Visible text blocks in document order, skipping editor chrome.
pub fn extract_blocks(document: &str) -> Vec<TextBlock> {
    BLOCK_RE
        .captures_iter(document)
        .filter(|caps| {
            let attrs = &caps[2];
            !attrs.contains(EDITOR_CHROME_ATTR) && !attrs.contains(SELECTION_OUTLINE_CLASS)
        })
        .filter_map(|caps| {
            let text = unescape_html(&TAG_RE.replace_all(&caps[3], " "));
            let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
            (!text.is_empty()).then(|| TextBlock {
                tag: caps[1].to_string(),
                text,
            })
        })
        .collect()
}

/// Decodes a base64 `data:` URI; other references are not fetched.
pub fn decode_data_uri(uri: &str) -> Option<Vec<u8>> {
    let (header, payload) = uri.strip_prefix("data:")?.split_once(',')?;
    if !header.ends_with(";base64") {
        return None;
    }
    BASE64.decode(payload.trim()).ok()
}

pub fn px_to_mm(px: u32) -> f64 {
    px as f64 * 25.4 / CSS_PX_PER_INCH
}

fn load_font(fonts_dir: &Path) -> Result<genpdf::fonts::FontFamily<genpdf::fonts::FontData>, ExportError> {
    let mut last_error = None;
    for family in FONT_FAMILIES {
        match genpdf::fonts::from_files(fonts_dir, family, None) {
            Ok(fonts) => return Ok(fonts),
            Err(err) => last_error = Some(err),
        }
    }
    Err(ExportError::Font(format!(
        "no usable font family in {}: {}",
        fonts_dir.display(),
        last_error.map(|e| e.to_string()).unwrap_or_default()
    )))
}

fn configure_document(fonts_dir: &Path, geometry: Geometry) -> Result<Document, ExportError> {
    let font_family = load_font(fonts_dir)?;
    let mut doc = Document::new(font_family);
    doc.set_title("Certificate");
    doc.set_paper_size(genpdf::Size::new(px_to_mm(geometry.width), px_to_mm(geometry.height)));
    doc.set_font_size(12);
    doc.set_line_spacing(1.2);

    let mut decorator = genpdf::SimplePageDecorator::new();
    decorator.set_margins(10);
    doc.set_page_decorator(decorator);
    Ok(doc)
}

/// Downscales the logo to its maximum bounds, flattens alpha over white and
/// embeds it through a temporary PNG.
fn embed_logo(bytes: &[u8], temp_files: &mut Vec<NamedTempFile>) -> Result<PdfImage, ExportError> {
    let img = load_from_memory(bytes)?;
    let (orig_w, orig_h) = img.dimensions();
    let css_to_px = IMAGE_DPI / CSS_PX_PER_INCH;
    let max_w = LOGO_MAX_WIDTH_PX as f64 * css_to_px;
    let max_h = LOGO_MAX_HEIGHT_PX as f64 * css_to_px;
    let scale = (max_w / orig_w as f64).min(max_h / orig_h as f64).min(1.0);

    let resized: DynamicImage = if scale >= 1.0 {
        img
    } else {
        let new_w = (orig_w as f64 * scale).max(1.0).round() as u32;
        let new_h = (orig_h as f64 * scale).max(1.0).round() as u32;
        img.resize(new_w, new_h, FilterType::Lanczos3)
    };

    let rgba = resized.to_rgba8();
    let (w, h) = rgba.dimensions();
    let mut background = image::RgbaImage::from_pixel(w, h, image::Rgba([255, 255, 255, 255]));
    image::imageops::overlay(&mut background, &rgba, 0, 0);
    let raw = DynamicImage::ImageRgba8(background).to_rgb8().into_raw();

    let mut tmp = NamedTempFile::new()?;
    {
        let mut encoder = PngEncoder::new(tmp.as_file_mut(), w, h);
        encoder.set_color(PngColorType::Rgb);
        encoder.set_depth(PngBitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&raw)?;
    }

    let mut logo = PdfImage::from_path(tmp.path())?;
    logo.set_dpi(IMAGE_DPI);
    logo.set_alignment(Alignment::Center);
    temp_files.push(tmp);
    Ok(logo)
}
