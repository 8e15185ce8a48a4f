use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use file_format::FileFormat;
use image::ImageFormat;
use std::{
    io,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::debug;

pub const POST_IMAGE_DIR: &str = "posts";

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Writing uploaded file failed: {0}")]
    Io(#[from] io::Error),
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum ImageKind {
    Png,
    Gif,
    Jpeg,
    Webp,
}

impl ImageKind {
    /// Identifies the upload by its content and checks that it actually decodes.
    #[must_use]
    pub fn recognize(bytes: &[u8]) -> Option<Self> {
        let kind = match FileFormat::from_bytes(bytes) {
            FileFormat::PortableNetworkGraphics | FileFormat::AnimatedPortableNetworkGraphics => {
                Self::Png
            }
            FileFormat::GraphicsInterchangeFormat => Self::Gif,
            FileFormat::JointPhotographicExpertsGroup => Self::Jpeg,
            FileFormat::Webp => Self::Webp,
            other => {
                debug!(format = %other.name(), "Upload is not a supported image");
                return None;
            }
        };

        match image::load_from_memory_with_format(bytes, kind.format()) {
            Ok(_) => Some(kind),
            Err(error) => {
                debug!(?kind, %error, "Upload does not decode");
                None
            }
        }
    }

    fn format(self) -> ImageFormat {
        match self {
            Self::Png => ImageFormat::Png,
            Self::Gif => ImageFormat::Gif,
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Webp => ImageFormat::WebP,
        }
    }

    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Jpeg => "jpg",
            Self::Webp => "webp",
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn save_image(&self, kind: ImageKind, bytes: &[u8]) -> Result<String, MediaError> {
        let directory = self.root.join(POST_IMAGE_DIR);
        tokio::fs::create_dir_all(&directory).await?;

        let name_bytes: [u8; 12] = rand::random();
        let file_name = format!(
            "{}.{}",
            BASE64_URL_SAFE_NO_PAD.encode(name_bytes),
            kind.extension()
        );
        tokio::fs::write(directory.join(&file_name), bytes).await?;

        let relative = format!("{POST_IMAGE_DIR}/{file_name}");
        debug!(path = %relative, size = bytes.len(), "Stored uploaded image");

        Ok(relative)
    }
}

#[cfg(test)]
pub(crate) mod samples {
    pub const RED_PNG: &[u8] = b"\x89\x50\x4E\x47\x0D\x0A\x1A\x0A\x00\x00\x00\x0D\x49\x48\x44\x52\x00\x00\x00\x01\x00\x00\x00\x01\x08\x02\x00\x00\x00\x90\x77\x53\xDE\x00\x00\x00\x0C\x49\x44\x41\x54\x78\x9C\x63\xF8\xCF\xC0\x00\x00\x03\x01\x01\x00\xC9\xFE\x92\xEF\x00\x00\x00\x00\x49\x45\x4E\x44\xAE\x42\x60\x82";
    pub const BLUE_PNG: &[u8] = b"\x89\x50\x4E\x47\x0D\x0A\x1A\x0A\x00\x00\x00\x0D\x49\x48\x44\x52\x00\x00\x00\x01\x00\x00\x00\x01\x08\x02\x00\x00\x00\x90\x77\x53\xDE\x00\x00\x00\x0C\x49\x44\x41\x54\x78\x9C\x63\x60\x60\xF8\x0F\x00\x01\x03\x01\x00\x08\x89\xC2\xEC\x00\x00\x00\x00\x49\x45\x4E\x44\xAE\x42\x60\x82";
    pub const WHITE_GIF: &[u8] = b"\x47\x49\x46\x38\x39\x61\x01\x00\x01\x00\x80\x00\x00\xFF\xFF\xFF\x00\x00\x00\x21\xF9\x04\x01\x00\x00\x00\x00\x2C\x00\x00\x00\x00\x01\x00\x01\x00\x00\x02\x02\x44\x01\x00\x3B";
}

#[cfg(test)]
mod tests {
    use crate::server::media::{
        ImageKind, MediaStore,
        samples::{RED_PNG, WHITE_GIF},
    };

    #[test]
    fn recognizes_decodable_images() {
        assert_eq!(ImageKind::recognize(RED_PNG), Some(ImageKind::Png));
        assert_eq!(ImageKind::recognize(WHITE_GIF), Some(ImageKind::Gif));
    }

    #[test]
    fn rejects_non_images_and_corrupt_images() {
        assert_eq!(ImageKind::recognize(b"plain text"), None);
        assert_eq!(ImageKind::recognize(b""), None);
        assert_eq!(ImageKind::recognize(b"GIF89a this is not an image"), None);
        assert_eq!(ImageKind::recognize(&RED_PNG[..40]), None);
    }

    #[tokio::test]
    async fn saved_images_land_under_the_root() {
        let root = tempfile::tempdir().unwrap();
        let media = MediaStore::new(root.path().to_owned());

        let relative = media.save_image(ImageKind::Gif, WHITE_GIF).await.unwrap();

        assert!(relative.starts_with("posts/"));
        assert!(relative.ends_with(".gif"));
        assert_eq!(
            tokio::fs::read(root.path().join(&relative)).await.unwrap(),
            WHITE_GIF
        );
    }
}
