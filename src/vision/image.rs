//! Image loading, structural validation and Base64 encoding

use crate::error::{ProcessError, Result};
use crate::metrics::METRICS;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use ::image::{ImageFormat, ImageReader};
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// MIME label declared in the data URL. Always JPEG, whatever the real format is.
pub const DATA_URL_MIME: &str = "image/jpeg";

/// A validated image ready to embed in a request
#[derive(Debug, Clone)]
pub struct EncodedImage {
    base64: String,
    format: ImageFormat,
    width: u32,
    height: u32,
}

impl EncodedImage {
    /// Read `path` fully and validate its contents
    ///
    /// The file extension is only consulted when the contents carry no
    /// recognisable signature (TGA has none).
    pub async fn load(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        debug!(path = %path.display(), bytes = bytes.len(), "Read image file");
        Self::from_bytes_with_hint(&bytes, ImageFormat::from_path(path).ok())
    }

    /// Encode and structurally validate raw image bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_bytes_with_hint(bytes, None)
    }

    /// Like [`EncodedImage::from_bytes`], falling back to `hint` when the
    /// format cannot be sniffed.
    ///
    /// PNG files are walked chunk by chunk through IEND with every CRC
    /// checked. Other formats are read through their decoder.
    pub fn from_bytes_with_hint(bytes: &[u8], hint: Option<ImageFormat>) -> Result<Self> {
        let base64 = STANDARD.encode(bytes);

        let (format, (width, height)) = verify(bytes, hint).map_err(|detail| {
            METRICS.record_invalid_image();
            ProcessError::InvalidImage(detail)
        })?;

        Ok(Self {
            base64,
            format,
            width,
            height,
        })
    }

    pub fn base64(&self) -> &str {
        &self.base64
    }

    /// Format detected during validation
    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// `data:image/jpeg;base64,<payload>`
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", DATA_URL_MIME, self.base64)
    }
}

fn verify(
    bytes: &[u8],
    hint: Option<ImageFormat>,
) -> std::result::Result<(ImageFormat, (u32, u32)), String> {
    let mut reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| e.to_string())?;

    if reader.format().is_none() {
        if let Some(format) = hint {
            reader.set_format(format);
        }
    }

    let format = reader
        .format()
        .ok_or_else(|| "cannot identify image file".to_string())?;

    let dimensions = match format {
        ImageFormat::Png => verify_png(bytes)?,
        _ => {
            let image = reader.decode().map_err(|e| e.to_string())?;
            (image.width(), image.height())
        }
    };
    if dimensions.0 == 0 || dimensions.1 == 0 {
        return Err(format!(
            "image has zero size: {}x{}",
            dimensions.0, dimensions.1
        ));
    }

    Ok((format, dimensions))
}

/// Walk every PNG chunk up to IEND; the decoder rejects any CRC mismatch.
fn verify_png(bytes: &[u8]) -> std::result::Result<(u32, u32), String> {
    let mut reader = png::Decoder::new(Cursor::new(bytes))
        .read_info()
        .map_err(|e| e.to_string())?;

    let mut frame = vec![0; reader.output_buffer_size()];
    reader.next_frame(&mut frame).map_err(|e| e.to_string())?;
    reader.finish().map_err(|e| e.to_string())?;

    let info = reader.info();
    Ok((info.width, info.height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::image::DynamicImage;

    fn encode(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut buf), format)
            .unwrap();
        buf
    }

    fn png_bytes() -> Vec<u8> {
        encode(&DynamicImage::new_rgb8(3, 2), ImageFormat::Png)
    }

    fn gradient_png() -> Vec<u8> {
        let image = ::image::RgbImage::from_fn(16, 16, |x, y| {
            ::image::Rgb([(x * 16) as u8, (y * 16) as u8, ((x + y) * 8) as u8])
        });
        encode(&DynamicImage::ImageRgb8(image), ImageFormat::Png)
    }

    /// Offset of the CRC field of the first chunk named `name`
    fn chunk_crc_offset(bytes: &[u8], name: &[u8; 4]) -> usize {
        let mut pos = 8;
        loop {
            let len = u32::from_be_bytes(bytes[pos..pos + 4].try_into().unwrap()) as usize;
            if &bytes[pos + 4..pos + 8] == name {
                return pos + 8 + len;
            }
            pos += 12 + len;
        }
    }

    #[test]
    fn test_valid_png() {
        let bytes = png_bytes();
        let image = EncodedImage::from_bytes(&bytes).unwrap();
        assert_eq!(image.format(), ImageFormat::Png);
        assert_eq!(image.dimensions(), (3, 2));
        assert_eq!(STANDARD.decode(image.base64()).unwrap(), bytes);
    }

    #[test]
    fn test_data_url_always_claims_jpeg() {
        let image = EncodedImage::from_bytes(&png_bytes()).unwrap();
        let url = image.data_url();
        assert!(url.starts_with("data:image/jpeg;base64,"));
        assert!(url.ends_with(image.base64()));
        assert!(!image.base64().contains('\n'));
    }

    #[test]
    fn test_text_is_invalid() {
        let err = EncodedImage::from_bytes(b"definitely not an image").unwrap_err();
        assert!(matches!(err, ProcessError::InvalidImage(_)));
        assert!(err.to_string().starts_with("Invalid image: "));
    }

    #[test]
    fn test_truncated_header_is_invalid() {
        let bytes = png_bytes();
        let err = EncodedImage::from_bytes(&bytes[..12]).unwrap_err();
        assert!(matches!(err, ProcessError::InvalidImage(_)));
    }

    #[test]
    fn test_corrupted_chunk_data_is_invalid() {
        let mut bytes = gradient_png();
        let at = bytes.len() - 20;
        bytes[at] ^= 0xff;

        let err = EncodedImage::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, ProcessError::InvalidImage(_)));
    }

    #[test]
    fn test_bad_idat_crc_is_invalid() {
        let mut bytes = gradient_png();
        let at = chunk_crc_offset(&bytes, b"IDAT");
        bytes[at] ^= 0x01;

        assert!(matches!(
            EncodedImage::from_bytes(&bytes),
            Err(ProcessError::InvalidImage(_))
        ));
    }

    #[test]
    fn test_bad_iend_crc_is_invalid() {
        let mut bytes = gradient_png();
        let at = chunk_crc_offset(&bytes, b"IEND");
        bytes[at] ^= 0x01;

        assert!(matches!(
            EncodedImage::from_bytes(&bytes),
            Err(ProcessError::InvalidImage(_))
        ));
    }

    #[test]
    fn test_tiff_and_pnm_are_accepted() {
        let source = DynamicImage::new_rgb8(4, 3);

        let tiff = EncodedImage::from_bytes(&encode(&source, ImageFormat::Tiff)).unwrap();
        assert_eq!(tiff.format(), ImageFormat::Tiff);
        assert_eq!(tiff.dimensions(), (4, 3));

        let pnm = EncodedImage::from_bytes(&encode(&source, ImageFormat::Pnm)).unwrap();
        assert_eq!(pnm.format(), ImageFormat::Pnm);
    }

    #[tokio::test]
    async fn test_tga_recognised_by_extension() {
        let bytes = encode(&DynamicImage::new_rgb8(5, 2), ImageFormat::Tga);
        assert!(EncodedImage::from_bytes(&bytes).is_err());

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("scan.tga");
        std::fs::write(&path, &bytes).unwrap();

        let image = EncodedImage::load(&path).await.unwrap();
        assert_eq!(image.format(), ImageFormat::Tga);
        assert_eq!(image.dimensions(), (5, 2));
    }

    #[test]
    fn test_empty_is_invalid() {
        assert!(matches!(
            EncodedImage::from_bytes(&[]),
            Err(ProcessError::InvalidImage(_))
        ));
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let err = EncodedImage::load(Path::new("/nonexistent/cancer.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Io(_)));
    }
}
