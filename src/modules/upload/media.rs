//! Content-type sniffing and raster re-encoding for uploads.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::ImageFormat;

pub const WEBP_CONTENT_TYPE: &str = "image/webp";
pub const JPEG_QUALITY: u8 = 90;
/// Lossy WebP quality (0-100) used when compressing uploads.
pub const WEBP_QUALITY: f32 = 10.0;

/// Bytes inspected when sniffing a content type.
pub const SNIFF_LEN: usize = 512;

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("failed to encode image: {0}")]
    Encode(#[source] image::ImageError),

    #[error("failed to encode webp: {0}")]
    WebpEncode(String),
}

/// Content type from the leading bytes, falling back to the file extension.
pub fn sniff_content_type(head: &[u8], file_name: &str) -> String {
    if let Ok(format) = image::guess_format(head) {
        return format.to_mime_type().to_string();
    }

    mime_guess::from_path(file_name)
        .first()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| mime::APPLICATION_OCTET_STREAM.to_string())
}

/// Decodes any supported raster image and re-encodes it as lossy WebP at
/// [`WEBP_QUALITY`]. Alpha is dropped.
pub fn encode_webp(data: &[u8]) -> Result<Vec<u8>, MediaError> {
    let img = image::load_from_memory(data).map_err(MediaError::Decode)?;
    let rgb = img.to_rgb8();

    let encoded = webp::Encoder::from_rgb(rgb.as_raw(), rgb.width(), rgb.height())
        .encode_simple(false, WEBP_QUALITY)
        .map_err(|e| MediaError::WebpEncode(format!("{:?}", e)))?;
    Ok(encoded.to_vec())
}

/// Re-encodes PNG and JPEG payloads; anything that fails to decode or is of
/// another type is returned untouched.
pub fn normalize(data: Vec<u8>, content_type: &str) -> Vec<u8> {
    let format = if content_type == mime::IMAGE_PNG.essence_str() {
        ImageFormat::Png
    } else if content_type == mime::IMAGE_JPEG.essence_str() {
        ImageFormat::Jpeg
    } else {
        return data;
    };

    let Ok(img) = image::load_from_memory_with_format(&data, format) else {
        return data;
    };

    let mut buf = Vec::new();
    let encoded = match format {
        ImageFormat::Png => img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png),
        _ => JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY).encode_image(&img.to_rgb8()),
    };

    match encoded {
        Ok(()) => buf,
        Err(_) => data,
    }
}
