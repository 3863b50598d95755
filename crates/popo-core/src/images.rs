//! Avatar image storage.
//!
//! Uploaded images are copied into `<data_dir>/images/` under a generated
//! name; the profile keeps only that name.

use base64::{Engine, engine::general_purpose::STANDARD};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{PopoError, Result};

const ACCEPTED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// A stored image, loaded for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBlob {
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

impl ImageBlob {
    /// `data:<mime>;base64,<payload>` form for embedding.
    #[must_use]
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.bytes))
    }
}

pub trait ImageStore {
    /// Copy `source` into the store and return its reference. `None` means
    /// the picker was cancelled and nothing happens.
    ///
    /// # Errors
    ///
    /// [`PopoError::UnsupportedImage`] for anything but jpg/jpeg/png, or an
    /// I/O error if the copy fails.
    fn upload(&self, source: Option<&Path>) -> Result<Option<String>>;

    /// Load a stored image. Unknown or empty references resolve to `None`.
    fn get(&self, reference: &str) -> Option<ImageBlob>;
}

/// Images kept as files under `<data_dir>/images`.
#[derive(Debug, Clone)]
pub struct FsImageStore {
    dir: PathBuf,
}

impl FsImageStore {
    #[must_use]
    pub fn new(data_dir: &Path) -> Self {
        Self {
            dir: data_dir.join("images"),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ImageStore for FsImageStore {
    fn upload(&self, source: Option<&Path>) -> Result<Option<String>> {
        let Some(source) = source else {
            return Ok(None);
        };

        let ext = source
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        if !ACCEPTED_EXTENSIONS
            .iter()
            .any(|accepted| accepted.eq_ignore_ascii_case(ext))
        {
            return Err(PopoError::UnsupportedImage(source.display().to_string()));
        }

        fs::create_dir_all(&self.dir)?;
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_millis());
        let file_name = format!("avatar-{millis}.{ext}");
        fs::copy(source, self.dir.join(&file_name))?;

        tracing::debug!(source = %source.display(), file_name, "stored avatar image");
        Ok(Some(file_name))
    }

    fn get(&self, reference: &str) -> Option<ImageBlob> {
        // Only bare file names resolve, never paths outside the store.
        if reference.is_empty() || Path::new(reference).file_name()? != reference {
            return None;
        }
        let bytes = fs::read(self.dir.join(reference)).ok()?;
        let is_png = Path::new(reference)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
        Some(ImageBlob {
            mime_type: if is_png { "image/png" } else { "image/jpeg" },
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn cancelled_upload_is_a_no_op() {
        let tmp = TempDir::new().expect("tempdir");
        let store = FsImageStore::new(tmp.path());
        assert_eq!(store.upload(None).expect("upload"), None);
        assert!(!store.dir().exists());
    }

    #[test]
    fn png_upload_round_trips_as_data_url() {
        let tmp = TempDir::new().expect("tempdir");
        let source = tmp.path().join("face.PNG");
        fs::write(&source, [1_u8, 2, 3]).expect("write source");

        let store = FsImageStore::new(tmp.path());
        let name = store.upload(Some(&source)).expect("upload").expect("stored");
        assert!(name.starts_with("avatar-"));
        assert!(name.ends_with(".PNG"));

        let blob = store.get(&name).expect("blob");
        assert_eq!(blob.mime_type, "image/png");
        assert_eq!(blob.data_url(), "data:image/png;base64,AQID");
    }

    #[test]
    fn jpeg_is_the_fallback_mime_type() {
        let tmp = TempDir::new().expect("tempdir");
        let store = FsImageStore::new(tmp.path());
        fs::create_dir_all(store.dir()).expect("mkdir");
        fs::write(store.dir().join("avatar-1.jpeg"), b"x").expect("write");
        assert_eq!(store.get("avatar-1.jpeg").expect("blob").mime_type, "image/jpeg");
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let tmp = TempDir::new().expect("tempdir");
        let source = tmp.path().join("notes.gif");
        fs::write(&source, b"gif").expect("write");
        let err = FsImageStore::new(tmp.path())
            .upload(Some(&source))
            .expect_err("must fail");
        assert!(matches!(err, PopoError::UnsupportedImage(_)));
    }

    #[test]
    fn missing_or_escaping_references_resolve_to_none() {
        let tmp = TempDir::new().expect("tempdir");
        let store = FsImageStore::new(tmp.path());
        assert_eq!(store.get(""), None);
        assert_eq!(store.get("avatar-404.png"), None);
        assert_eq!(store.get("../data/db.json"), None);
    }
}
