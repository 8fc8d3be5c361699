//! Filesystem media store
//!
//! Layout under the media root:
//! - `attachments/{attachment_id}/{filename}`
//! - `avatars/{user_id}.png`

use std::io::Cursor;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use huddle_core::{
    Attachment, AttachmentKind, DomainError, MediaStore, NewAttachment, Snowflake, StoredMedia,
};
use image::{ImageFormat, ImageReader};
use tracing::{debug, instrument};

/// Avatars are scaled down to fit this square
pub const AVATAR_SIZE: u32 = 256;

const FALLBACK_FILENAME: &str = "file";

/// Keep only the final path component and drop characters that are unsafe
/// on common filesystems.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control() && !matches!(c, ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.');
    if cleaned.is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Mimetype guessed from a filename extension.
pub fn mimetype_for(filename: &str) -> &'static str {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        "txt" | "log" => "text/plain",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}

fn storage_error(err: std::io::Error) -> DomainError {
    DomainError::StorageError(err.to_string())
}

/// Describe an upload: sniff image content first, then fall back to the
/// extension.
fn describe(id: Snowflake, filename: String, data: &[u8]) -> Attachment {
    let mut attachment = Attachment {
        id,
        mimetype: mimetype_for(&filename).to_string(),
        filename,
        kind: AttachmentKind::File,
        size: i64::try_from(data.len()).unwrap_or(i64::MAX),
        width: None,
        height: None,
    };

    if let Ok(format) = image::guess_format(data) {
        let reader = ImageReader::with_format(Cursor::new(data), format);
        if let Ok((width, height)) = reader.into_dimensions() {
            attachment.kind = AttachmentKind::Image;
            attachment.mimetype = format.to_mime_type().to_string();
            attachment.width = i32::try_from(width).ok();
            attachment.height = i32::try_from(height).ok();
        }
    } else if attachment.mimetype.starts_with("video/") {
        attachment.kind = AttachmentKind::Video;
    }

    attachment
}

/// Decode, shrink and re-encode an avatar as PNG.
fn encode_avatar(data: &[u8]) -> Result<Vec<u8>, DomainError> {
    let image = image::load_from_memory(data)
        .map_err(|_| DomainError::InvalidRequest("avatar is not a supported image".into()))?;
    let image = if image.width() > AVATAR_SIZE || image.height() > AVATAR_SIZE {
        image.thumbnail(AVATAR_SIZE, AVATAR_SIZE)
    } else {
        image
    };

    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|e| DomainError::InternalError(format!("avatar encoding failed: {e}")))?;
    Ok(out.into_inner())
}

async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, DomainError> {
    match tokio::fs::read(path).await {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(storage_error(e)),
    }
}

/// Media store writing to a local directory
#[derive(Debug, Clone)]
pub struct FsMediaStore {
    root: PathBuf,
}

impl FsMediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn attachment_path(&self, id: Snowflake, filename: &str) -> PathBuf {
        self.root
            .join("attachments")
            .join(id.to_string())
            .join(sanitize_filename(filename))
    }

    fn avatar_path(&self, user_id: Snowflake) -> PathBuf {
        self.root.join("avatars").join(format!("{user_id}.png"))
    }
}

#[async_trait]
impl MediaStore for FsMediaStore {
    #[instrument(skip(self, upload), fields(attachment_id = %upload.id, size = upload.data.len()))]
    async fn store_attachment(&self, upload: NewAttachment<'_>) -> Result<Attachment, DomainError> {
        let filename = sanitize_filename(upload.filename);
        let path = self.attachment_path(upload.id, &filename);
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await.map_err(storage_error)?;
        }
        tokio::fs::write(&path, upload.data)
            .await
            .map_err(storage_error)?;

        let attachment = describe(upload.id, filename, upload.data);
        debug!(mimetype = %attachment.mimetype, "Attachment stored");
        Ok(attachment)
    }

    #[instrument(skip(self, data), fields(size = data.len()))]
    async fn store_avatar(&self, user_id: Snowflake, data: &[u8]) -> Result<(), DomainError> {
        let owned = data.to_vec();
        let encoded = tokio::task::spawn_blocking(move || encode_avatar(&owned))
            .await
            .map_err(|e| DomainError::InternalError(e.to_string()))??;

        let path = self.avatar_path(user_id);
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await.map_err(storage_error)?;
        }
        tokio::fs::write(&path, encoded).await.map_err(storage_error)?;
        debug!("Avatar stored");
        Ok(())
    }

    async fn load_attachment(
        &self,
        id: Snowflake,
        filename: &str,
    ) -> Result<Option<StoredMedia>, DomainError> {
        let filename = sanitize_filename(filename);
        let data = read_optional(&self.attachment_path(id, &filename)).await?;
        Ok(data.map(|data| StoredMedia {
            mimetype: image::guess_format(&data)
                .map_or_else(|_| mimetype_for(&filename), |f| f.to_mime_type())
                .to_string(),
            data,
        }))
    }

    async fn load_avatar(&self, user_id: Snowflake) -> Result<Option<StoredMedia>, DomainError> {
        let data = read_optional(&self.avatar_path(user_id)).await?;
        Ok(data.map(|data| StoredMedia {
            mimetype: "image/png".to_string(),
            data,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([200, 10, 10]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\temp\\a?.txt"), "a.txt");
        assert_eq!(sanitize_filename(".hidden"), "hidden");
        assert_eq!(sanitize_filename(""), "file");
        assert_eq!(sanitize_filename("photo.png"), "photo.png");
    }

    #[test]
    fn test_mimetype_for() {
        assert_eq!(mimetype_for("a.PNG"), "image/png");
        assert_eq!(mimetype_for("clip.webm"), "video/webm");
        assert_eq!(mimetype_for("noext"), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_store_and_load_image_attachment() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsMediaStore::new(dir.path());
        let data = png(4, 3);

        let attachment = store
            .store_attachment(NewAttachment {
                id: Snowflake::new(77),
                filename: "shot.bin",
                data: &data,
            })
            .await
            .unwrap();
        assert_eq!(attachment.kind, AttachmentKind::Image);
        assert_eq!(attachment.mimetype, "image/png");
        assert_eq!((attachment.width, attachment.height), (Some(4), Some(3)));
        assert_eq!(attachment.size, data.len() as i64);

        let loaded = store
            .load_attachment(Snowflake::new(77), "shot.bin")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.data, data);
        assert_eq!(loaded.mimetype, "image/png");
    }

    #[tokio::test]
    async fn test_plain_file_attachment() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsMediaStore::new(dir.path());

        let attachment = store
            .store_attachment(NewAttachment {
                id: Snowflake::new(5),
                filename: "notes.txt",
                data: b"hello",
            })
            .await
            .unwrap();
        assert_eq!(attachment.kind, AttachmentKind::File);
        assert_eq!(attachment.mimetype, "text/plain");
        assert!(attachment.width.is_none());

        let missing = store
            .load_attachment(Snowflake::new(6), "notes.txt")
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_avatar_is_shrunk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsMediaStore::new(dir.path());
        let user = Snowflake::new(9);

        store.store_avatar(user, &png(600, 300)).await.unwrap();
        let loaded = store.load_avatar(user).await.unwrap().unwrap();
        let image = image::load_from_memory(&loaded.data).unwrap();
        assert_eq!(image.width(), AVATAR_SIZE);
        assert!(image.height() <= AVATAR_SIZE);
    }

    #[tokio::test]
    async fn test_avatar_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsMediaStore::new(dir.path());
        let err = store
            .store_avatar(Snowflake::new(1), b"not an image")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidRequest(_)));
    }
}
