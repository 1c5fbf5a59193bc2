//! Content sniffing for published attachments.
//!
//! The MIME type is derived from the stored bytes, never from what the client
//! declared. Image formats are recognised by the `image` crate; a short
//! signature table covers the other common formats.

use std::io::Cursor;
use std::path::PathBuf;

use image::{ImageFormat, ImageReader};

use thiserror::Error;

use crate::attachment::FileType;

/// Number of leading bytes inspected when sniffing.
pub const SNIFF_LEN: usize = 512;

/// Fallback MIME type for unrecognised binary content.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Sniffer errors.
#[derive(Debug, Error)]
pub enum SniffError {
    /// Image header could not be decoded.
    #[error("image probe failed: {0}")]
    Image(#[from] image::ImageError),

    /// Reading the file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The blocking probe task did not complete.
    #[error("probe task failed: {0}")]
    Task(String),
}

/// Magic-number signatures checked after image formats.
///
/// Each entry is `(offset, signature, mime)`.
const SIGNATURES: &[(usize, &[u8], &str)] = &[
    (0, b"%PDF-", "application/pdf"),
    (0, b"PK\x03\x04", "application/zip"),
    (0, b"\x1f\x8b", "application/gzip"),
    (0, b"7z\xbc\xaf\x27\x1c", "application/x-7z-compressed"),
    (0, b"Rar!\x1a\x07", "application/vnd.rar"),
    (4, b"ftypqt", "video/quicktime"),
    (4, b"ftyp", "video/mp4"),
    (0, b"\x1a\x45\xdf\xa3", "video/webm"),
    (0, b"OggS", "audio/ogg"),
    (0, b"ID3", "audio/mpeg"),
    (0, b"fLaC", "audio/flac"),
];

/// Determine the MIME type of content from its leading bytes.
#[must_use]
pub fn mime_of(head: &[u8]) -> String {
    if let Some(mime) = image_mime(head) {
        return mime.to_string();
    }

    if head.len() >= 12 && &head[..4] == b"RIFF" {
        match &head[8..12] {
            b"WAVE" => return "audio/wav".to_string(),
            b"AVI " => return "video/x-msvideo".to_string(),
            _ => {}
        }
    }

    if let Some((_, _, mime)) = SIGNATURES
        .iter()
        .find(|(offset, sig, _)| head.get(*offset..offset + sig.len()) == Some(*sig))
    {
        return (*mime).to_string();
    }

    if looks_like_text(head) {
        return "text/plain".to_string();
    }

    OCTET_STREAM.to_string()
}

/// MIME type of a decodable image header.
///
/// Formats with a short magic number (`BM` for BMP) also match ordinary text,
/// so only the long signatures are taken on sight; anything else must parse as
/// an image header.
fn image_mime(head: &[u8]) -> Option<&'static str> {
    let format = image::guess_format(head).ok()?;
    if !format.reading_enabled() {
        return None;
    }
    let trusted = matches!(
        format,
        ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Gif | ImageFormat::WebP
    ) || ImageReader::with_format(Cursor::new(head), format)
        .into_dimensions()
        .is_ok();
    trusted.then(|| format.to_mime_type())
}

/// Map a MIME type to its coarse attachment category.
#[must_use]
pub fn type_of(mime: &str) -> FileType {
    match mime.split('/').next() {
        Some("image") => FileType::Image,
        Some("video") => FileType::Video,
        Some("audio") => FileType::Audio,
        _ => FileType::File,
    }
}

/// Conventional file extension for a MIME type, if one is known.
#[must_use]
pub fn extension_for(mime: &str) -> Option<&'static str> {
    image::ImageFormat::from_mime_type(mime)
        .and_then(|f| f.extensions_str().first().copied())
        .or(match mime {
            "application/pdf" => Some("pdf"),
            "application/zip" => Some("zip"),
            "application/gzip" => Some("gz"),
            "video/mp4" => Some("mp4"),
            "video/webm" => Some("webm"),
            "audio/ogg" => Some("ogg"),
            "audio/mpeg" => Some("mp3"),
            "audio/wav" => Some("wav"),
            "text/plain" => Some("txt"),
            _ => None,
        })
}

/// Probe the pixel dimensions of an image file.
///
/// # Errors
///
/// Returns an error if the file is not a decodable image.
pub async fn dimensions_of(path: PathBuf) -> Result<(u32, u32), SniffError> {
    tokio::task::spawn_blocking(move || -> Result<(u32, u32), SniffError> {
        let reader = ImageReader::open(&path)?.with_guessed_format()?;
        Ok(reader.into_dimensions()?)
    })
    .await
    .map_err(|e| SniffError::Task(e.to_string()))?
}

/// Valid UTF-8 without control bytes other than whitespace.
///
/// A multi-byte sequence cut off at the end of the sniff window is tolerated.
fn looks_like_text(head: &[u8]) -> bool {
    if head.is_empty() {
        return false;
    }
    let valid = match std::str::from_utf8(head) {
        Ok(s) => s,
        Err(e) if e.error_len().is_none() && head.len() >= SNIFF_LEN => {
            // Truncated trailing character at the end of the window.
            match std::str::from_utf8(&head[..e.valid_up_to()]) {
                Ok(s) => s,
                Err(_) => return false,
            }
        }
        Err(_) => return false,
    };
    valid
        .chars()
        .all(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t' | '\x0c'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const PNG_HEADER: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\x0dIHDR";

    #[rstest]
    #[case(PNG_HEADER, "image/png")]
    #[case(b"GIF89a\x01\x00\x01\x00", "image/gif")]
    #[case(b"\xff\xd8\xff\xe0\x00\x10JFIF", "image/jpeg")]
    #[case(b"%PDF-1.7\n", "application/pdf")]
    #[case(b"PK\x03\x04\x14\x00", "application/zip")]
    #[case(b"\x00\x00\x00\x18ftypmp42", "video/mp4")]
    #[case(b"RIFF\x24\x00\x00\x00WAVEfmt ", "audio/wav")]
    #[case(b"ID3\x04\x00", "audio/mpeg")]
    #[case(b"hello world\n", "text/plain")]
    #[case("안녕하세요".as_bytes(), "text/plain")]
    #[case(b"\x00\x01\x02\x03binary", OCTET_STREAM)]
    #[case(b"", OCTET_STREAM)]
    #[case(b"BMW service notes\n", "text/plain")]
    #[case(b"P1 meeting agenda\n", "text/plain")]
    #[case(b"II*\x00\x08\x00\x00\x00", OCTET_STREAM)]
    fn test_mime_of(#[case] head: &[u8], #[case] expected: &str) {
        assert_eq!(mime_of(head), expected);
    }

    #[test]
    fn test_mime_of_real_bmp() {
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(image::RgbImage::new(3, 2))
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Bmp)
            .expect("encode bmp");
        assert_eq!(mime_of(&bytes), "image/bmp");
    }

    #[rstest]
    #[case("image/png", FileType::Image)]
    #[case("video/mp4", FileType::Video)]
    #[case("audio/ogg", FileType::Audio)]
    #[case("text/plain", FileType::File)]
    #[case("application/octet-stream", FileType::File)]
    #[case("", FileType::File)]
    fn test_type_of(#[case] mime: &str, #[case] expected: FileType) {
        assert_eq!(type_of(mime), expected);
    }

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for("image/png"), Some("png"));
        assert_eq!(extension_for("application/pdf"), Some("pdf"));
        assert_eq!(extension_for("text/plain"), Some("txt"));
        assert_eq!(extension_for(OCTET_STREAM), None);
    }

    #[test]
    fn test_text_with_truncated_trailing_char() {
        let mut head = vec![b'a'; SNIFF_LEN - 1];
        head.push(0xea); // first byte of a three-byte sequence
        assert_eq!(mime_of(&head), "text/plain");
    }

    #[tokio::test]
    async fn test_dimensions_of_png() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("pixel.png");
        image::RgbImage::new(3, 2).save(&path).expect("encode png");

        let (width, height) = dimensions_of(path).await.expect("dimensions");
        assert_eq!((width, height), (3, 2));
    }

    #[tokio::test]
    async fn test_dimensions_of_non_image_fails() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"plain text").expect("write");

        assert!(dimensions_of(path).await.is_err());
    }
}
