//! Base64 data-URI encoding for images.
//!
//! Images travel through datasets, traces and judges as
//! `data:<mimetype>;base64,<payload>` strings.
//!
//! ## Example
//!
//! ```rust,ignore
//! use t2i_eval::encoding::{base64_encode_image, ImageSource};
//!
//! let uri = base64_encode_image(ImageSource::Path("cat.jpg".as_ref()), None)?;
//! assert!(uri.starts_with("data:image/jpeg;base64,"));
//! ```

use std::io::Cursor;
use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::ImageFormat;

use crate::error::{Error, Result};
use crate::imaging::ImageData;

/// Known file extensions and their mimetypes.
const EXT_TO_MIMETYPE: &[(&str, &str)] = &[
    (".jpg", "image/jpeg"),
    (".png", "image/png"),
    (".svg", "image/svg+xml"),
];

/// Mimetype used for in-memory images.
pub const DEFAULT_MIMETYPE: &str = "image/png";

const BASE64_MARKER: &str = ";base64,";

/// Where the image to encode comes from.
#[derive(Clone, Copy)]
pub enum ImageSource<'a> {
    /// A file on disk. The payload is the file content as-is.
    Path(&'a Path),
    /// An in-memory image. The payload is the image re-encoded as PNG.
    Image(&'a ImageData),
}

/// Look up the mimetype for a path from its extension (case-insensitive).
pub fn mimetype_for_path(path: &Path) -> Result<&'static str> {
    let suffix = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|ext| format!(".{}", ext.to_lowercase()))
        .unwrap_or_default();

    EXT_TO_MIMETYPE
        .iter()
        .find(|(ext, _)| *ext == suffix)
        .map(|(_, mime)| *mime)
        .ok_or(Error::UnsupportedExtension(suffix))
}

/// Encode an image as a `data:` URI.
///
/// `mimetype` overrides the type inferred from the source. For paths the
/// extension is checked before the file is opened, so an unknown extension
/// fails even when the file does not exist.
pub fn base64_encode_image(source: ImageSource<'_>, mimetype: Option<&str>) -> Result<String> {
    let (mimetype, payload) = match source {
        ImageSource::Path(path) => {
            let mime = match mimetype {
                Some(m) => m,
                None => mimetype_for_path(path)?,
            };
            (mime, std::fs::read(path)?)
        }
        ImageSource::Image(image) => (mimetype.unwrap_or(DEFAULT_MIMETYPE), encode_png(image)?),
    };

    Ok(format!("data:{mimetype};base64,{}", STANDARD.encode(payload)))
}

/// Decode the payload of a data URI.
///
/// Everything up to the last `;base64,` marker is ignored; a bare base64
/// string without a marker is decoded whole.
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>> {
    let payload = uri.rsplit(BASE64_MARKER).next().unwrap_or(uri);
    Ok(STANDARD.decode(payload.trim())?)
}

/// Whether a string already looks like a base64 data URI.
#[must_use]
pub fn is_data_uri(value: &str) -> bool {
    value.starts_with("data:") && value.contains(BASE64_MARKER)
}

/// Encode image data as PNG bytes.
pub fn encode_png(image: &ImageData) -> Result<Vec<u8>> {
    let rgb = image.to_rgb_image()?;
    let mut bytes = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}
