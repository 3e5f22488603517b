//! Storage module that keeps uploaded show images on disk.
//!
//! Files are stored under a directory tree derived from a hash of their pixels,
//! so the same picture uploaded twice (in any encoding) is stored only once and
//! two shows may share it. Only JPEG, PNG and GIF uploads are accepted.

use glob::glob;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::fmt::Display;
use std::hash::Hasher;
use std::{
    fs::{self},
    path::{Path, PathBuf},
};
use twox_hash::XxHash64;

/// MIME types accepted for show images.
pub const ACCEPTED_MIME_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/gif"];

#[derive(Debug, Clone)]
pub struct Storage {
    root_path: PathBuf,
    public_base_url: String,
}

/// Result of storing an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    /// Path relative to the storage root, e.g. `44/a5/44a5b6f94f4f6445.png`.
    pub path: PathBuf,
    /// `false` when an identical image was already stored and reused.
    pub fresh: bool,
}

impl Storage {
    /// Creates a new `Storage` instance.
    ///
    /// # Arguments
    /// * `root` - Root directory path where all files will be stored.
    /// * `public_base_url` - URL prefix under which `root` is served.
    pub fn new(root: PathBuf, public_base_url: impl Into<String>) -> Storage {
        Storage {
            root_path: root,
            public_base_url: public_base_url.into(),
        }
    }

    /// Stores an uploaded image.
    ///
    /// The bytes are sniffed and must be one of [`ACCEPTED_MIME_TYPES`], then
    /// decoded, and saved as `{pixel_hash}.{ext}`. If a file with the same pixel
    /// hash already exists it is reused instead.
    ///
    /// # Errors
    /// - `StorageError::UnsupportedFile` if the type is unknown or not accepted.
    /// - `StorageError::Image` if the bytes cannot be decoded or re-encoded.
    /// - `StorageError::Io` if directory creation or file writing fails.
    pub fn create_file(&self, bytes: &[u8]) -> Result<StoredImage, StorageError> {
        let kind = infer::get(bytes).ok_or(StorageError::UnsupportedFile { mime: None })?;
        if !ACCEPTED_MIME_TYPES.contains(&kind.mime_type()) {
            return Err(StorageError::UnsupportedFile {
                mime: Some(kind.mime_type().to_string()),
            });
        }

        let img = ImageReader::new(std::io::Cursor::new(bytes))
            .with_guessed_format()?
            .decode()?;

        let pixel_hash = compute_pixel_hash(&img);

        if let Some(entry) = self.find_entry(&pixel_hash) {
            return Ok(StoredImage {
                path: self.relative(&pixel_hash, &entry),
                fresh: false,
            });
        }

        let dir_path = self.derive_abs_dir(&pixel_hash);
        fs::create_dir_all(&dir_path)?;

        let filename = self.derive_filename(&pixel_hash, kind.extension());
        let format = ImageFormat::from_extension(kind.extension()).ok_or_else(|| {
            StorageError::UnsupportedFile {
                mime: Some(kind.mime_type().to_string()),
            }
        })?;
        img.save_with_format(dir_path.join(&filename), format)?;

        Ok(StoredImage {
            path: self.derive_dir(&pixel_hash).join(filename),
            fresh: true,
        })
    }

    /// Public URL of a stored file.
    pub fn url_for(&self, path: &Path) -> String {
        let relative = path
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        format!("{}/{}", self.public_base_url.trim_end_matches('/'), relative)
    }

    /// Ensures that the file at `path` (relative to the root) does not exist.
    ///
    /// Succeeds when the file is already gone.
    pub fn ensure_deleted(&self, path: &Path) -> Result<(), StorageError> {
        match fs::remove_file(self.root_path.join(path)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Derives a relative directory path from the hash (for indexing).
    /// Example: `01/23/`
    fn derive_dir(&self, hash: &PixelHash) -> PathBuf {
        PathBuf::from(format!("{:02x}/{:02x}/", hash.0[0], hash.0[1]))
    }

    /// Derives the absolute directory path on the filesystem.
    fn derive_abs_dir(&self, hash: &PixelHash) -> PathBuf {
        self.root_path.join(self.derive_dir(hash))
    }

    fn derive_filename(&self, hash: &PixelHash, ext: &str) -> PathBuf {
        PathBuf::from(format!("{}.{}", hash, ext))
    }

    fn relative(&self, hash: &PixelHash, entry: &Path) -> PathBuf {
        let dir = self.derive_dir(hash);
        match entry.file_name() {
            Some(name) => dir.join(name),
            None => dir,
        }
    }

    /// Searches for a file matching the hash (with any extension).
    fn find_entry(&self, hash: &PixelHash) -> Option<PathBuf> {
        let dir = self.derive_abs_dir(hash);
        let pattern = format!("{}.*", dir.join(hash.to_string()).to_string_lossy());

        glob(&pattern).ok()?.filter_map(Result::ok).next()
    }
}

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// File format could not be determined or is not an accepted image type.
    #[error("unsupported file type: {}", mime.as_deref().unwrap_or("unknown"))]
    UnsupportedFile { mime: Option<String> },

    /// Filesystem IO error.
    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or saving error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

/// 64-bit hash of an image's RGBA pixels.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PixelHash([u8; 8]);

impl Display for PixelHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for b in self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl From<u64> for PixelHash {
    fn from(value: u64) -> Self {
        PixelHash(value.to_be_bytes())
    }
}

/// Computes a pixel hash from a DynamicImage.
fn compute_pixel_hash(img: &DynamicImage) -> PixelHash {
    let pixels = img.to_rgba8().into_raw();
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(&pixels);

    PixelHash::from(hasher.finish())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{PixelHash, Storage, StorageError};
    use image::{ImageBuffer, ImageFormat, Rgba};
    use std::{io::Cursor, path::PathBuf};
    use tempfile::TempDir;

    /// Encodes a small solid-colour image.
    pub(crate) fn image_bytes(format: ImageFormat, color: [u8; 4]) -> Vec<u8> {
        let img = ImageBuffer::from_pixel(4, 4, Rgba(color));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, format).unwrap();
        out.into_inner()
    }

    fn storage(tmp_dir: &TempDir) -> Storage {
        Storage::new(tmp_dir.path().to_path_buf(), "http://localhost:3000/images/")
    }

    #[test]
    fn test_pathes() {
        let storage = Storage::new("/root".into(), "");
        let hash = PixelHash::from(0x329435e5e66be809);

        assert_eq!("329435e5e66be809", hash.to_string());
        assert_eq!(PathBuf::from("32/94"), storage.derive_dir(&hash));
        assert_eq!(PathBuf::from("/root/32/94"), storage.derive_abs_dir(&hash));
    }

    #[test]
    fn test_create_file() {
        let tmp_dir = TempDir::new().unwrap();
        let storage = storage(&tmp_dir);

        let stored = storage
            .create_file(&image_bytes(ImageFormat::Png, [255, 0, 0, 255]))
            .unwrap();

        assert!(stored.fresh);
        assert_eq!(Some("png"), stored.path.extension().and_then(|e| e.to_str()));
        assert!(tmp_dir.path().join(&stored.path).exists());
    }

    #[test]
    fn test_create_file_on_duplicated() {
        let tmp_dir = TempDir::new().unwrap();
        let storage = storage(&tmp_dir);
        let bytes = image_bytes(ImageFormat::Png, [0, 255, 0, 255]);

        let first = storage.create_file(&bytes).unwrap();
        let second = storage.create_file(&bytes).unwrap();

        assert!(first.fresh);
        assert!(!second.fresh);
        assert_eq!(first.path, second.path);
    }

    #[test]
    fn test_rejects_non_images() {
        let tmp_dir = TempDir::new().unwrap();
        let storage = storage(&tmp_dir);

        let result = storage.create_file(b"just some text");
        assert!(matches!(
            result,
            Err(StorageError::UnsupportedFile { mime: None })
        ));

        let pdf = b"%PDF-1.4\n%\xe2\xe3\xcf\xd3\n";
        let result = storage.create_file(pdf);
        let Err(StorageError::UnsupportedFile { mime: Some(mime) }) = result else {
            panic!("Expected UnsupportedFile error, but got {:?}", result);
        };
        assert_eq!("application/pdf", mime);
    }

    #[test]
    fn test_url_for() {
        let tmp_dir = TempDir::new().unwrap();
        let storage = storage(&tmp_dir);

        assert_eq!(
            "http://localhost:3000/images/44/a5/44a5b6f94f4f6445.png",
            storage.url_for(&PathBuf::from("44/a5/44a5b6f94f4f6445.png"))
        );
    }

    #[test]
    fn test_ensure_deleted() {
        let tmp_dir = TempDir::new().unwrap();
        let storage = storage(&tmp_dir);

        let stored = storage
            .create_file(&image_bytes(ImageFormat::Gif, [0, 0, 255, 255]))
            .unwrap();

        assert!(storage.ensure_deleted(&stored.path).is_ok());
        assert!(!tmp_dir.path().join(&stored.path).exists());
        assert!(storage.ensure_deleted(&stored.path).is_ok());
    }
}
