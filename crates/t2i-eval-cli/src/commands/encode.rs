//! Encode command.

use std::path::Path;

use anyhow::{Context, Result};
use t2i_eval::encoding::{ImageSource, base64_encode_image};

pub fn run(path: &Path, mimetype: Option<&str>) -> Result<()> {
    let uri = base64_encode_image(ImageSource::Path(path), mimetype)
        .with_context(|| format!("Failed to encode {}", path.display()))?;
    println!("{uri}");
    Ok(())
}
