//! Enrollment images: QR codes carrying an `otpauth://` URI.
//!
//! Uses the `qrcode` crate to produce the QR matrix and the `image` crate
//! to render it as a PNG blob. Callers that render elsewhere can implement
//! [`EnrollmentEncoder`] themselves; the rest of the crate only ever sees the
//! returned bytes.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use qrcode::{EcLevel, QrCode};
use serde::{Deserialize, Serialize};

use crate::otp::types::*;

/// Module size in pixels (each QR "module" becomes this many px wide).
pub const MODULE_PX: u32 = 8;
/// Quiet-zone border in modules.
pub const QUIET_ZONE: u32 = 4;
/// Largest rendered side, in pixels.
pub const MAX_IMAGE_PX: u32 = 4096;
/// Largest logo, as a fraction of the code width, that level-H error
/// correction still recovers from reliably.
pub const MAX_LOGO_SCALE: f32 = 0.3;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Options
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// QR error-correction level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ErrorCorrection {
    L,
    #[default]
    M,
    Q,
    H,
}

impl From<ErrorCorrection> for EcLevel {
    fn from(level: ErrorCorrection) -> Self {
        match level {
            ErrorCorrection::L => EcLevel::L,
            ErrorCorrection::M => EcLevel::M,
            ErrorCorrection::Q => EcLevel::Q,
            ErrorCorrection::H => EcLevel::H,
        }
    }
}

/// Image to stamp in the middle of the code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogoOptions {
    /// Encoded image bytes (PNG).
    pub image: Vec<u8>,
    /// Logo width as a fraction of the code width.
    #[serde(default = "default_logo_scale")]
    pub scale: f32,
}

fn default_logo_scale() -> f32 {
    0.2
}

/// Rendering options for the default encoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderOptions {
    /// Pixels per QR module.
    pub module_size: u32,
    /// Quiet-zone width in modules.
    pub border: u32,
    pub error_correction: ErrorCorrection,
    /// RGBA of dark modules.
    pub foreground: [u8; 4],
    /// RGBA of light modules and the quiet zone.
    pub background: [u8; 4],
    pub logo: Option<LogoOptions>,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            module_size: MODULE_PX,
            border: QUIET_ZONE,
            error_correction: ErrorCorrection::default(),
            foreground: [0, 0, 0, 255],
            background: [255, 255, 255, 255],
            logo: None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Encoder
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Turns a provisioning URI into a scannable image.
pub trait EnrollmentEncoder {
    /// Encode `payload`; every failure is reported as `EncodingError`.
    fn encode(&self, payload: &str, options: &EncoderOptions) -> Result<Vec<u8>, OtpError>;
}

/// QR code rendered to PNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct QrPngEncoder;

impl EnrollmentEncoder for QrPngEncoder {
    fn encode(&self, payload: &str, options: &EncoderOptions) -> Result<Vec<u8>, OtpError> {
        text_to_qr_png(payload, options)
    }
}

/// Generate a PNG image (as bytes) of a QR code encoding the given text.
pub fn text_to_qr_png(text: &str, options: &EncoderOptions) -> Result<Vec<u8>, OtpError> {
    if options.module_size == 0 {
        return Err(OtpError::encoding("QR module size must be at least 1 pixel"));
    }

    let code = QrCode::with_error_correction_level(text.as_bytes(), options.error_correction.into())
        .map_err(|e| OtpError::encoding("QR encode error").with_detail(e.to_string()))?;

    let px = options.module_size;
    let matrix = code.to_colors();
    let width = code.width() as u32;
    let img_size = options
        .border
        .checked_mul(2)
        .and_then(|b| b.checked_add(width))
        .and_then(|modules| modules.checked_mul(px))
        .filter(|size| *size <= MAX_IMAGE_PX)
        .ok_or_else(|| {
            OtpError::encoding("QR image too large").with_detail(format!(
                "{} modules at {} px plus a {}-module border exceeds {} px",
                width, px, options.border, MAX_IMAGE_PX
            ))
        })?;

    let mut img = RgbaImage::from_pixel(img_size, img_size, Rgba(options.background));
    let dark = Rgba(options.foreground);

    for y in 0..width {
        for x in 0..width {
            if matrix[(y * width + x) as usize] == qrcode::Color::Dark {
                let px_x = (x + options.border) * px;
                let px_y = (y + options.border) * px;
                for dy in 0..px {
                    for dx in 0..px {
                        img.put_pixel(px_x + dx, px_y + dy, dark);
                    }
                }
            }
        }
    }

    if let Some(logo) = &options.logo {
        stamp_logo(&mut img, logo, width * px)?;
    }

    let mut buf = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut buf);
    image::ImageEncoder::write_image(
        encoder,
        img.as_raw(),
        img_size,
        img_size,
        image::ExtendedColorType::Rgba8,
    )
    .map_err(|e| OtpError::encoding("PNG encode error").with_detail(e.to_string()))?;

    log::debug!(
        "rendered {}x{} enrollment image ({} modules, {} bytes)",
        img_size,
        img_size,
        width,
        buf.len()
    );
    Ok(buf)
}

/// Resize `logo` to `scale * code_px` and centre it over the code.
fn stamp_logo(img: &mut RgbaImage, logo: &LogoOptions, code_px: u32) -> Result<(), OtpError> {
    if !(logo.scale > 0.0 && logo.scale <= MAX_LOGO_SCALE) {
        return Err(OtpError::encoding(format!(
            "Logo scale must be in (0, {}], got {}",
            MAX_LOGO_SCALE, logo.scale
        )));
    }

    let decoded = image::load_from_memory(&logo.image)
        .map_err(|e| OtpError::encoding("Logo image could not be decoded").with_detail(e.to_string()))?
        .to_rgba8();

    let target = ((code_px as f32 * logo.scale) as u32).max(1);
    let (w, h) = decoded.dimensions();
    let (tw, th) = if w >= h {
        (target, (h as u64 * target as u64 / w.max(1) as u64).max(1) as u32)
    } else {
        ((w as u64 * target as u64 / h.max(1) as u64).max(1) as u32, target)
    };
    let resized = imageops::resize(&decoded, tw, th, FilterType::Lanczos3);

    let x = (img.width() - tw) / 2;
    let y = (img.height() - th) / 2;
    imageops::overlay(img, &resized, x as i64, y as i64);
    Ok(())
}

/// Extract the QR matrix width from a QR code (useful for testing).
pub fn qr_matrix_width(text: &str) -> Result<usize, OtpError> {
    let code = QrCode::new(text.as_bytes())
        .map_err(|e| OtpError::encoding("QR encode error").with_detail(e.to_string()))?;
    Ok(code.width())
}
