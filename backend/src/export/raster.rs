//! Raster export of the live preview element.
//!
//! The preview may be zoomed on screen. Capturing always happens at zoom 1.0
//! and at the canonical geometry (times the requested scale), and the
//! original zoom is restored afterwards, whether the capture succeeded or not.

use crate::error::ExportError;
use crate::render::CERTIFICATE_ELEMENT_ID;
use async_trait::async_trait;
use common::model::export::{ExportArtifact, ExportFormat, RasterOptions};
use common::model::template::Geometry;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, Rgba, RgbaImage};
use png::{BitDepth as PngBitDepth, ColorType as PngColorType, Encoder as PngEncoder};

pub const MAX_SCALE: f32 = 4.0;

/// Handle to the rendered certificate element, supplied by the rendering host.
#[async_trait]
pub trait PreviewElement: Send + Sync {
    /// Current on-screen zoom factor (1.0 is unzoomed).
    fn zoom(&self) -> f64;

    fn set_zoom(&self, zoom: f64);

    /// Rasterizes the element into a `width` x `height` bitmap.
    async fn capture(&self, width: u32, height: u32) -> Result<RgbaImage, ExportError>;
}

/// Captures `element` at the canonical `geometry` and encodes it as PNG or JPEG.
pub async fn export_raster(
    element: Option<&dyn PreviewElement>,
    geometry: Geometry,
    options: &RasterOptions,
    filename: String,
) -> Result<ExportArtifact, ExportError> {
    let element =
        element.ok_or_else(|| ExportError::MissingRenderTarget(format!("#{CERTIFICATE_ELEMENT_ID}")))?;
    validate(options)?;

    let width = scaled(geometry.width, options.scale);
    let height = scaled(geometry.height, options.scale);

    let original_zoom = element.zoom();
    element.set_zoom(1.0);
    let captured = element.capture(width, height).await;
    element.set_zoom(original_zoom);
    let mut bitmap = captured?;

    if bitmap.dimensions() != (width, height) {
        log::debug!(
            "resampling capture from {:?} to {width}x{height}",
            bitmap.dimensions()
        );
        bitmap = image::imageops::resize(&bitmap, width, height, FilterType::Lanczos3);
    }

    let bytes = match options.format {
        ExportFormat::Png => encode_png(&bitmap)?,
        ExportFormat::Jpeg => encode_jpeg(&bitmap, options.quality)?,
        ExportFormat::Pdf => {
            return Err(ExportError::Encode(
                "PDF is a paginated format, not a raster one".to_string(),
            ))
        }
    };

    Ok(ExportArtifact {
        format: options.format,
        width,
        height,
        bytes,
        filename,
    })
}

fn validate(options: &RasterOptions) -> Result<(), ExportError> {
    if !(options.scale > 0.0 && options.scale <= MAX_SCALE) {
        return Err(ExportError::InvalidScale(options.scale));
    }
    // PNG is lossless and ignores quality.
    if options.format == ExportFormat::Jpeg && !(options.quality > 0.0 && options.quality <= 1.0) {
        return Err(ExportError::InvalidQuality(options.quality));
    }
    Ok(())
}

fn scaled(px: u32, scale: f32) -> u32 {
    ((px as f32) * scale).round().max(1.0) as u32
}

fn encode_png(bitmap: &RgbaImage) -> Result<Vec<u8>, ExportError> {
    let (w, h) = bitmap.dimensions();
    let mut out = Vec::new();
    {
        let mut encoder = PngEncoder::new(&mut out, w, h);
        encoder.set_color(PngColorType::Rgba);
        encoder.set_depth(PngBitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(bitmap.as_raw())?;
    }
    Ok(out)
}

fn encode_jpeg(bitmap: &RgbaImage, quality: f32) -> Result<Vec<u8>, ExportError> {
    // JPEG has no alpha channel: flatten over white.
    let (w, h) = bitmap.dimensions();
    let mut background = RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255]));
    image::imageops::overlay(&mut background, bitmap, 0, 0);
    let rgb = DynamicImage::ImageRgba8(background).to_rgb8();

    let quality = (quality * 100.0).round().clamp(1.0, 100.0) as u8;
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality).encode_image(&rgb)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::model::template::CertificateSize;
    use std::sync::Mutex;

    /// Renders a solid bitmap whose size follows the current zoom, like a
    /// screenshot of a transformed element would.
    struct FakeElement {
        zoom: Mutex<f64>,
        captured_at: Mutex<Vec<f64>>,
        fail: bool,
    }

    impl FakeElement {
        fn new(zoom: f64) -> Self {
            Self {
                zoom: Mutex::new(zoom),
                captured_at: Mutex::new(Vec::new()),
                fail: false,
            }
        }
    }

    #[async_trait]
    impl PreviewElement for FakeElement {
        fn zoom(&self) -> f64 {
            *self.zoom.lock().unwrap()
        }

        fn set_zoom(&self, zoom: f64) {
            *self.zoom.lock().unwrap() = zoom;
        }

        async fn capture(&self, width: u32, height: u32) -> Result<RgbaImage, ExportError> {
            let zoom = self.zoom();
            self.captured_at.lock().unwrap().push(zoom);
            if self.fail {
                return Err(ExportError::Capture("tainted canvas".to_string()));
            }
            let w = ((width as f64) * zoom).round() as u32;
            let h = ((height as f64) * zoom).round() as u32;
            Ok(RgbaImage::from_pixel(w, h, Rgba([10, 20, 30, 128])))
        }
    }

    fn png() -> RasterOptions {
        RasterOptions::default()
    }

    #[tokio::test]
    async fn png_export_uses_canonical_geometry_and_restores_zoom() {
        let element = FakeElement::new(0.5);
        let geometry = CertificateSize::A4Landscape.geometry();
        let artifact = export_raster(Some(&element), geometry, &png(), "a.png".to_string())
            .await
            .unwrap();

        assert_eq!((artifact.width, artifact.height), (1123, 794));
        assert_eq!(*element.captured_at.lock().unwrap(), vec![1.0]);
        assert_eq!(element.zoom(), 0.5);

        let decoded = image::load_from_memory(&artifact.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (1123, 794));
    }

    #[tokio::test]
    async fn zoom_is_restored_when_capture_fails() {
        let element = FakeElement {
            fail: true,
            ..FakeElement::new(1.5)
        };
        let geometry = CertificateSize::Square.geometry();
        let err = export_raster(Some(&element), geometry, &png(), "a.png".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::Capture(_)));
        assert_eq!(element.zoom(), 1.5);
    }

    #[tokio::test]
    async fn scale_multiplies_canonical_size() {
        let element = FakeElement::new(1.0);
        let options = RasterOptions {
            scale: 2.0,
            ..png()
        };
        let geometry = CertificateSize::LetterPortrait.geometry();
        let artifact = export_raster(Some(&element), geometry, &options, "a.png".to_string())
            .await
            .unwrap();
        assert_eq!((artifact.width, artifact.height), (1632, 2112));
    }

    #[tokio::test]
    async fn jpeg_quality_is_validated() {
        let element = FakeElement::new(1.0);
        let geometry = CertificateSize::Square.geometry();
        for quality in [0.0, 1.5, f32::NAN] {
            let options = RasterOptions {
                format: ExportFormat::Jpeg,
                quality,
                scale: 0.25,
            };
            let err = export_raster(Some(&element), geometry, &options, "a.jpg".to_string())
                .await
                .unwrap_err();
            assert!(matches!(err, ExportError::InvalidQuality(_)));
        }

        let options = RasterOptions {
            format: ExportFormat::Jpeg,
            quality: 0.8,
            scale: 0.25,
        };
        let artifact = export_raster(Some(&element), geometry, &options, "a.jpg".to_string())
            .await
            .unwrap();
        assert_eq!(&artifact.bytes[..2], &[0xFF, 0xD8]);
        assert_eq!((artifact.width, artifact.height), (270, 270));
    }

    #[tokio::test]
    async fn png_ignores_quality() {
        let element = FakeElement::new(1.0);
        let options = RasterOptions {
            quality: 7.0,
            scale: 0.1,
            ..png()
        };
        let geometry = CertificateSize::Wide.geometry();
        assert!(export_raster(Some(&element), geometry, &options, "a.png".to_string())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn missing_element_fails_fast() {
        let geometry = CertificateSize::A4Portrait.geometry();
        let err = export_raster(None, geometry, &png(), "a.png".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::MissingRenderTarget(_)));
    }

    #[tokio::test]
    async fn out_of_range_scale_is_rejected() {
        let element = FakeElement::new(1.0);
        let geometry = CertificateSize::A4Portrait.geometry();
        let options = RasterOptions {
            scale: 5.0,
            ..png()
        };
        let err = export_raster(Some(&element), geometry, &options, "a.png".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::InvalidScale(_)));
        assert!(element.captured_at.lock().unwrap().is_empty());
    }
}
