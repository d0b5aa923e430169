//! Avatar processing: temporary upload handling and the 250×250 resize.

use image::{DynamicImage, ImageFormat, imageops::FilterType};
use std::{
    io::Cursor,
    path::{Path, PathBuf},
};
use thiserror::Error;
use uuid::Uuid;

/// Avatars are always stored as squares of this edge length.
pub const AVATAR_SIZE: u32 = 250;

#[derive(Debug, Error)]
pub enum AvatarError {
    #[error("upload is not a supported image: {0}")]
    Decode(image::ImageError),

    #[error("failed to encode avatar: {0}")]
    Encode(image::ImageError),

    #[error("temporary upload error: {0}")]
    Io(#[from] std::io::Error),

    #[error("avatar task failed: {0}")]
    Task(String),
}

/// A processed avatar, ready for the file store.
#[derive(Debug, Clone)]
pub struct AvatarImage {
    pub bytes: Vec<u8>,
    pub extension: &'static str,
}

/// TempUpload
///
/// An uploaded file parked in the scratch directory until it has been processed.
pub struct TempUpload {
    path: PathBuf,
}

impl TempUpload {
    pub async fn write(dir: &Path, bytes: &[u8]) -> Result<Self, AvatarError> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(format!("upload-{}", Uuid::new_v4().simple()));
        tokio::fs::write(&path, bytes).await?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Deletes the scratch file. A failure here only leaves garbage behind, so
    /// it is logged rather than returned.
    pub async fn remove(self) {
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to remove temporary upload");
        }
    }
}

/// Reads a parked upload and resizes it on the blocking pool.
pub async fn process_upload(upload: &TempUpload) -> Result<AvatarImage, AvatarError> {
    let bytes = tokio::fs::read(upload.path()).await?;
    tokio::task::spawn_blocking(move || resize_avatar(&bytes))
        .await
        .map_err(|e| AvatarError::Task(e.to_string()))?
}

/// resize_avatar
///
/// Decodes any supported image, scales it to cover a 250×250 square and crops
/// the overflow around the centre. The result is re-encoded in the upload's
/// format; PNG is used when that format has no encoder for the decoded pixels.
pub fn resize_avatar(bytes: &[u8]) -> Result<AvatarImage, AvatarError> {
    let format = image::guess_format(bytes).map_err(AvatarError::Decode)?;
    let decoded = image::load_from_memory_with_format(bytes, format).map_err(AvatarError::Decode)?;

    let resized = decoded.resize_to_fill(AVATAR_SIZE, AVATAR_SIZE, FilterType::Lanczos3);

    if let Some(extension) = extension_for(format) {
        match encode(&resized, format) {
            Ok(bytes) => return Ok(AvatarImage { bytes, extension }),
            Err(e) => tracing::debug!(?format, error = %e, "re-encoding avatar as png"),
        }
    }

    let bytes = encode(&resized, ImageFormat::Png)?;
    Ok(AvatarImage {
        bytes,
        extension: "png",
    })
}

fn extension_for(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Png => Some("png"),
        ImageFormat::Jpeg => Some("jpg"),
        ImageFormat::Gif => Some("gif"),
        ImageFormat::WebP => Some("webp"),
        ImageFormat::Bmp => Some("bmp"),
        _ => None,
    }
}

fn encode(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, AvatarError> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, format).map_err(AvatarError::Encode)?;
    Ok(buffer.into_inner())
}

/// avatar_file_name
///
/// `<userId>_<stem of the original name>.<ext>`, keeping only characters that
/// are safe in a path segment.
pub fn avatar_file_name(user_id: Uuid, original_name: Option<&str>, extension: &str) -> String {
    let stem = original_name
        .map(Path::new)
        .and_then(Path::file_stem)
        .and_then(|s| s.to_str())
        .map(|s| {
            s.chars()
                .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
                .collect::<String>()
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "avatar".to_string());

    format!("{user_id}_{stem}.{extension}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb, Rgba};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_pixel(width, height, Rgba([200u8, 30, 30, 255]));
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut buffer, ImageFormat::Png)
            .unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_resize_landscape_png_to_square() {
        let avatar = resize_avatar(&png(640, 360)).unwrap();
        assert_eq!(avatar.extension, "png");

        let decoded = image::load_from_memory(&avatar.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (AVATAR_SIZE, AVATAR_SIZE));
    }

    #[test]
    fn test_jpeg_stays_jpeg() {
        let img = ImageBuffer::from_pixel(90, 120, Rgb([10u8, 120, 240]));
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buffer, ImageFormat::Jpeg)
            .unwrap();

        let avatar = resize_avatar(&buffer.into_inner()).unwrap();
        assert_eq!(avatar.extension, "jpg");
        let decoded = image::load_from_memory(&avatar.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (AVATAR_SIZE, AVATAR_SIZE));
    }

    #[test]
    fn test_bmp_stays_bmp() {
        let img = ImageBuffer::from_pixel(300, 500, Rgb([40u8, 200, 90]));
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buffer, ImageFormat::Bmp)
            .unwrap();

        let avatar = resize_avatar(&buffer.into_inner()).unwrap();
        assert_eq!(avatar.extension, "bmp");
        assert_eq!(image::guess_format(&avatar.bytes).unwrap(), ImageFormat::Bmp);
        let decoded = image::load_from_memory(&avatar.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (AVATAR_SIZE, AVATAR_SIZE));
    }

    #[test]
    fn test_rejects_non_image() {
        let err = resize_avatar(b"definitely not an image").unwrap_err();
        assert!(matches!(err, AvatarError::Decode(_)));
    }

    #[test]
    fn test_file_name_is_sanitized() {
        let id = Uuid::from_u128(7);
        assert_eq!(
            avatar_file_name(id, Some("../../etc/my photo!.jpeg"), "jpg"),
            format!("{id}_myphoto.jpg")
        );
        assert_eq!(avatar_file_name(id, None, "png"), format!("{id}_avatar.png"));
    }
}
