//! Certificate design model.
//!
//! `TemplateConfig` is the authoritative description of one certificate: its
//! geometry, free-text fields, signatures, colors, images and date. Every
//! field has an explicit default so partially filled payloads coming from an
//! editor deserialize into a usable design.
//!
//! Free-text fields are untrusted. The model never escapes them itself; the
//! renderer in the `backend` crate is responsible for sanitizing them before
//! they reach markup.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Default language tag used when a template does not specify one.
pub const DEFAULT_LOCALE: &str = "es";

/// Token emitted in place of an empty recipient name.
pub const RECIPIENT_NAME_TOKEN: &str = "{{recipient.name}}";

pub const DEFAULT_TITLE_COLOR: &str = "#1f2937";
pub const DEFAULT_BODY_COLOR: &str = "#374151";
pub const DEFAULT_OVERLAY_COLOR: &str = "transparent";

/// Logo bounds in CSS pixels. Caller-supplied sizes are clamped into this range.
pub const LOGO_MIN_PX: u32 = 16;
pub const LOGO_MAX_WIDTH_PX: u32 = 320;
pub const LOGO_MAX_HEIGHT_PX: u32 = 200;
pub const DEFAULT_LOGO_WIDTH_PX: u32 = 120;
pub const DEFAULT_LOGO_HEIGHT_PX: u32 = 80;

/// The fixed set of certificate geometries.
///
/// Unknown selectors never fail deserialization: anything other than a known
/// selector string (numbers, `null`, unknown names) falls back to
/// [`CertificateSize::A4Landscape`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(into = "&'static str")]
pub enum CertificateSize {
    #[default]
    A4Landscape,
    A4Portrait,
    LetterLandscape,
    LetterPortrait,
    Square,
    Wide,
}

impl CertificateSize {
    pub const ALL: [CertificateSize; 6] = [
        CertificateSize::A4Landscape,
        CertificateSize::A4Portrait,
        CertificateSize::LetterLandscape,
        CertificateSize::LetterPortrait,
        CertificateSize::Square,
        CertificateSize::Wide,
    ];

    /// Parses a selector, falling back to the default size for unknown input.
    pub fn parse(selector: &str) -> Self {
        match selector.trim().to_ascii_lowercase().as_str() {
            "a4-landscape" => CertificateSize::A4Landscape,
            "a4-portrait" => CertificateSize::A4Portrait,
            "letter-landscape" => CertificateSize::LetterLandscape,
            "letter-portrait" => CertificateSize::LetterPortrait,
            "square" => CertificateSize::Square,
            "wide" => CertificateSize::Wide,
            _ => CertificateSize::default(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CertificateSize::A4Landscape => "a4-landscape",
            CertificateSize::A4Portrait => "a4-portrait",
            CertificateSize::LetterLandscape => "letter-landscape",
            CertificateSize::LetterPortrait => "letter-portrait",
            CertificateSize::Square => "square",
            CertificateSize::Wide => "wide",
        }
    }

    /// Canonical pixel geometry at 96 DPI.
    pub fn geometry(self) -> Geometry {
        let (width, height) = match self {
            CertificateSize::A4Landscape => (1123, 794),
            CertificateSize::A4Portrait => (794, 1123),
            CertificateSize::LetterLandscape => (1056, 816),
            CertificateSize::LetterPortrait => (816, 1056),
            CertificateSize::Square => (1080, 1080),
            CertificateSize::Wide => (1920, 1080),
        };
        Geometry { width, height }
    }
}

impl<'de> Deserialize<'de> for CertificateSize {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(value.as_str().map(CertificateSize::parse).unwrap_or_default())
    }
}

impl From<CertificateSize> for &'static str {
    fn from(value: CertificateSize) -> Self {
        value.as_str()
    }
}

/// Canonical width/height in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
}

impl Geometry {
    pub fn aspect_ratio(self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

/// One signature block: an image plus the signer's name and role.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SignatureEntry {
    /// Image reference (URL or `data:image/...` URI).
    pub image: Option<String>,
    /// Accessibility hint for the image.
    pub alt: String,
    pub name: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogoConfig {
    pub image: Option<String>,
    #[serde(deserialize_with = "logo_width")]
    pub width: u32,
    #[serde(deserialize_with = "logo_height")]
    pub height: u32,
}

impl Default for LogoConfig {
    fn default() -> Self {
        Self {
            image: None,
            width: DEFAULT_LOGO_WIDTH_PX,
            height: DEFAULT_LOGO_HEIGHT_PX,
        }
    }
}

/// Reads a pixel size from any JSON number or numeric string, rounding
/// fractions and flooring negatives at zero. Other values yield `fallback`.
fn pixels_or<'de, D: Deserializer<'de>>(deserializer: D, fallback: u32) -> Result<u32, D::Error> {
    let px = match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(px
        .filter(|px| px.is_finite())
        .map(|px| px.round().clamp(0.0, u32::MAX as f64) as u32)
        .unwrap_or(fallback))
}

fn logo_width<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    pixels_or(deserializer, DEFAULT_LOGO_WIDTH_PX)
}

fn logo_height<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    pixels_or(deserializer, DEFAULT_LOGO_HEIGHT_PX)
}

impl LogoConfig {
    /// Width and height clamped into the logo bounds.
    pub fn clamped(&self) -> (u32, u32) {
        (
            self.width.clamp(LOGO_MIN_PX, LOGO_MAX_WIDTH_PX),
            self.height.clamp(LOGO_MIN_PX, LOGO_MAX_HEIGHT_PX),
        )
    }
}

/// Full description of one certificate design.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    pub size: CertificateSize,
    pub title: String,
    pub body_primary: String,
    pub body_secondary: String,
    pub course_name: String,
    pub recipient_name: String,
    pub signer_name: String,
    pub signatures: Vec<SignatureEntry>,
    pub title_color: String,
    pub body_color: String,
    pub overlay_color: String,
    pub custom_css: Option<String>,
    pub custom_js: Option<String>,
    pub logo: LogoConfig,
    pub background_image: Option<String>,
    /// `YYYY-MM-DD` or RFC 3339. Missing or unparseable dates render as today.
    pub date: Option<String>,
    pub locale: String,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            size: CertificateSize::default(),
            title: String::new(),
            body_primary: String::new(),
            body_secondary: String::new(),
            course_name: String::new(),
            recipient_name: RECIPIENT_NAME_TOKEN.to_string(),
            signer_name: String::new(),
            signatures: Vec::new(),
            title_color: DEFAULT_TITLE_COLOR.to_string(),
            body_color: DEFAULT_BODY_COLOR.to_string(),
            overlay_color: DEFAULT_OVERLAY_COLOR.to_string(),
            custom_css: None,
            custom_js: None,
            logo: LogoConfig::default(),
            background_image: None,
            date: None,
            locale: DEFAULT_LOCALE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_size_falls_back_to_default() {
        let config: TemplateConfig =
            serde_json::from_str(r#"{"size":"poster-xxl","title":"Hola"}"#).unwrap();
        assert_eq!(config.size, CertificateSize::A4Landscape);
        assert_eq!(config.title, "Hola");
        assert_eq!(config.recipient_name, RECIPIENT_NAME_TOKEN);
    }

    #[test]
    fn size_serializes_as_selector() {
        let json = serde_json::to_string(&CertificateSize::LetterPortrait).unwrap();
        assert_eq!(json, r#""letter-portrait""#);
        for size in CertificateSize::ALL {
            assert_eq!(CertificateSize::parse(size.as_str()), size);
        }
    }

    #[test]
    fn logo_bounds_are_clamped() {
        let logo = LogoConfig {
            image: None,
            width: 10_000,
            height: 0,
        };
        assert_eq!(logo.clamped(), (LOGO_MAX_WIDTH_PX, LOGO_MIN_PX));
    }

    #[test]
    fn non_string_size_falls_back_to_default() {
        for payload in [r#"{"size":42}"#, r#"{"size":null}"#, r#"{"size":{"w":1}}"#] {
            let config: TemplateConfig = serde_json::from_str(payload).unwrap();
            assert_eq!(config.size, CertificateSize::A4Landscape, "{payload}");
        }
        let config: TemplateConfig = serde_json::from_str(r#"{"size":"Square"}"#).unwrap();
        assert_eq!(config.size, CertificateSize::Square);
    }

    #[test]
    fn malformed_logo_bounds_are_clamped_not_rejected() {
        let config: TemplateConfig =
            serde_json::from_str(r#"{"logo":{"width":-50,"height":120.5}}"#).unwrap();
        assert_eq!(config.logo.width, 0);
        assert_eq!(config.logo.height, 121);
        assert_eq!(config.logo.clamped(), (LOGO_MIN_PX, 121));

        let config: TemplateConfig =
            serde_json::from_str(r#"{"logo":{"width":"90","height":null}}"#).unwrap();
        assert_eq!(config.logo.width, 90);
        assert_eq!(config.logo.height, DEFAULT_LOGO_HEIGHT_PX);

        let config: TemplateConfig = serde_json::from_str(r#"{"logo":{"width":1e12}}"#).unwrap();
        assert_eq!(config.logo.clamped().0, LOGO_MAX_WIDTH_PX);
    }

    #[test]
    fn geometry_aspect_ratio() {
        let g = CertificateSize::Square.geometry();
        assert_eq!(g.aspect_ratio(), 1.0);
    }
}
