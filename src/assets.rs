use std::io;
use std::path::{Path, PathBuf};

use url::form_urlencoded;

use crate::catalog::CatalogEntry;

const PLACEHOLDER_BASE: &str = "https://via.placeholder.com";
const ITEM_PLACEHOLDER_SIZE: &str = "300x180";
const ERROR_PLACEHOLDER_TEXT: &str = "Image Error";

/// Placeholder used for the store logo
pub const LOGO_PLACEHOLDER: &str = "https://via.placeholder.com/100x100.png?text=HH";

/// Where an item's picture comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    File(PathBuf),
    Placeholder(String),
}

/// Image ready to be served
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageData {
    Bytes {
        content_type: &'static str,
        data: Vec<u8>,
    },
    Placeholder(String),
}

/// Build a placeholder image URL carrying `text`
pub fn placeholder_url(size: &str, text: &str) -> String {
    let encoded: String = form_urlencoded::byte_serialize(text.as_bytes()).collect();
    format!("{}/{}.png?text={}", PLACEHOLDER_BASE, size, encoded)
}

fn item_placeholder(name: &str) -> String {
    placeholder_url(ITEM_PLACEHOLDER_SIZE, name)
}

fn error_placeholder() -> String {
    placeholder_url(ITEM_PLACEHOLDER_SIZE, ERROR_PLACEHOLDER_TEXT)
}

fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Maps catalog entries to local files, falling back to placeholders.
///
/// Lookups never fail: a missing file yields a placeholder named after the
/// item, any other I/O problem yields the generic error placeholder.
#[derive(Debug, Clone)]
pub struct AssetResolver {
    images_dir: PathBuf,
}

impl AssetResolver {
    pub fn new(images_dir: PathBuf) -> Self {
        Self { images_dir }
    }

    pub fn resolve(&self, entry: &CatalogEntry) -> ImageSource {
        let Some(image) = entry.image.as_deref() else {
            return ImageSource::Placeholder(item_placeholder(&entry.name));
        };

        let path = self.images_dir.join(image);
        match file_status(&path) {
            Ok(true) => ImageSource::File(path),
            Ok(false) => ImageSource::Placeholder(item_placeholder(&entry.name)),
            Err(e) => {
                tracing::warn!(item = %entry.name, path = %path.display(), error = %e, "image lookup failed");
                ImageSource::Placeholder(error_placeholder())
            }
        }
    }

    /// Read the image bytes, degrading to a placeholder on any failure
    pub fn load(&self, entry: &CatalogEntry) -> ImageData {
        match self.resolve(entry) {
            ImageSource::Placeholder(url) => ImageData::Placeholder(url),
            ImageSource::File(path) => match std::fs::read(&path) {
                Ok(data) => ImageData::Bytes {
                    content_type: content_type_for(&path),
                    data,
                },
                Err(e) => {
                    tracing::warn!(item = %entry.name, path = %path.display(), error = %e, "image read failed");
                    ImageData::Placeholder(error_placeholder())
                }
            },
        }
    }
}

/// `Ok(false)` when nothing is there, `Err` when something unusable is
fn file_status(path: &Path) -> io::Result<bool> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => Ok(true),
        Ok(_) => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a regular file",
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("harvest_assets_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_placeholder_is_deterministic() {
        let url = placeholder_url("300x180", "Grated Coconut");
        assert_eq!(
            url,
            "https://via.placeholder.com/300x180.png?text=Grated+Coconut"
        );
        assert_eq!(url, placeholder_url("300x180", "Grated Coconut"));
    }

    #[test]
    fn test_missing_file_uses_item_placeholder() {
        let dir = temp_dir();
        let resolver = AssetResolver::new(dir.clone());
        let entry = CatalogEntry::new("Besan Ladoo", 90, Some("besan_ladoo.jpg"));

        assert_eq!(
            resolver.resolve(&entry),
            ImageSource::Placeholder(
                "https://via.placeholder.com/300x180.png?text=Besan+Ladoo".to_string()
            )
        );

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_no_image_configured() {
        let resolver = AssetResolver::new(PathBuf::from("/nonexistent"));
        let entry = CatalogEntry::new("Poha", 50, None);

        assert!(matches!(resolver.resolve(&entry), ImageSource::Placeholder(u) if u.ends_with("text=Poha")));
    }

    #[test]
    fn test_existing_file_is_served() {
        let dir = temp_dir();
        std::fs::write(dir.join("poha.png"), b"\x89PNG").unwrap();
        let resolver = AssetResolver::new(dir.clone());
        let entry = CatalogEntry::new("Poha", 50, Some("poha.png"));

        assert_eq!(resolver.resolve(&entry), ImageSource::File(dir.join("poha.png")));
        assert_eq!(
            resolver.load(&entry),
            ImageData::Bytes {
                content_type: "image/png",
                data: b"\x89PNG".to_vec(),
            }
        );

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_unreadable_entry_uses_error_placeholder() {
        let dir = temp_dir();
        std::fs::create_dir_all(dir.join("chikki.jpg")).unwrap();
        let resolver = AssetResolver::new(dir.clone());
        let entry = CatalogEntry::new("Groundnut Chikki", 40, Some("chikki.jpg"));

        assert_eq!(
            resolver.resolve(&entry),
            ImageSource::Placeholder(
                "https://via.placeholder.com/300x180.png?text=Image+Error".to_string()
            )
        );

        let _ = std::fs::remove_dir_all(dir);
    }
}
