//! Raster and vector image formats handled through ImageMagick.

use serde::{Deserialize, Serialize};

/// An image format known to the ImageMagick backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormat {
    Png,
    Jpeg,
    Webp,
    Gif,
    Tiff,
    Bmp,
    Heic,
    Avif,
    Ico,
    Svg,
    Pdf,
    Psd,
}

impl ImageFormat {
    pub const ALL: &'static [ImageFormat] = &[
        Self::Png,
        Self::Jpeg,
        Self::Webp,
        Self::Gif,
        Self::Tiff,
        Self::Bmp,
        Self::Heic,
        Self::Avif,
        Self::Ico,
        Self::Svg,
        Self::Pdf,
        Self::Psd,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Webp => "webp",
            Self::Gif => "gif",
            Self::Tiff => "tiff",
            Self::Bmp => "bmp",
            Self::Heic => "heic",
            Self::Avif => "avif",
            Self::Ico => "ico",
            Self::Svg => "svg",
            Self::Pdf => "pdf",
            Self::Psd => "psd",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Png => "PNG",
            Self::Jpeg => "JPEG",
            Self::Webp => "WebP",
            Self::Gif => "GIF",
            Self::Tiff => "TIFF",
            Self::Bmp => "BMP",
            Self::Heic => "HEIC",
            Self::Avif => "AVIF",
            Self::Ico => "ICO",
            Self::Svg => "SVG",
            Self::Pdf => "PDF (image)",
            Self::Psd => "Photoshop (PSD)",
        }
    }

    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Png => &["png"],
            Self::Jpeg => &["jpg", "jpeg"],
            Self::Webp => &["webp"],
            Self::Gif => &["gif"],
            Self::Tiff => &["tiff", "tif"],
            Self::Bmp => &["bmp"],
            Self::Heic => &["heic", "heif"],
            Self::Avif => &["avif"],
            Self::Ico => &["ico"],
            Self::Svg => &["svg"],
            Self::Pdf => &["pdf"],
            Self::Psd => &["psd"],
        }
    }

    pub fn is_writable(&self) -> bool {
        !matches!(self, Self::Psd)
    }

    pub fn is_lossy(&self) -> bool {
        matches!(self, Self::Jpeg | Self::Webp | Self::Heic | Self::Avif)
    }

    /// Whether the encoder exposes a lossless switch.
    pub fn has_lossless_mode(&self) -> bool {
        matches!(self, Self::Webp | Self::Avif | Self::Heic)
    }

    pub fn supports_exif(&self) -> bool {
        matches!(
            self,
            Self::Jpeg | Self::Tiff | Self::Heic | Self::Webp | Self::Png | Self::Avif
        )
    }

    /// Whether the OCR engine can read the format directly.
    pub fn is_raster(&self) -> bool {
        !matches!(self, Self::Svg | Self::Pdf)
    }

    /// The fixed set of formats the image backend can write. Not input
    /// dependent: any readable input transcodes to any of these.
    pub fn writable() -> impl Iterator<Item = ImageFormat> {
        Self::ALL.iter().copied().filter(|f| f.is_writable())
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.id() == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writable_set_excludes_psd() {
        let writable: Vec<_> = ImageFormat::writable().collect();
        assert!(writable.contains(&ImageFormat::Png));
        assert!(writable.contains(&ImageFormat::Pdf));
        assert!(!writable.contains(&ImageFormat::Psd));
    }

    #[test]
    fn test_format_flags() {
        assert!(ImageFormat::Jpeg.is_lossy());
        assert!(!ImageFormat::Png.is_lossy());
        assert!(ImageFormat::Jpeg.supports_exif());
        assert!(!ImageFormat::Gif.supports_exif());
        assert!(ImageFormat::Webp.has_lossless_mode());
        assert!(!ImageFormat::Pdf.is_raster());
    }
}
