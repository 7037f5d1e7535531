//! QR code artifacts
//!
//! Renders the subject's ledger token into a PNG under the predictable
//! `{category}/{id}.png` convention. The token embedded in the image is
//! the externalId/requestId string itself; rendering failures are
//! non-fatal at every call site because the token in the store is the
//! source of truth, not the image.

use qrcode::QrCode;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::types::{GatekeeperError, Result};

/// Artifact category, one directory per subject kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QrCategory {
    Residents,
    Visitors,
    Requests,
}

impl QrCategory {
    pub fn dir_name(&self) -> &'static str {
        match self {
            QrCategory::Residents => "residents",
            QrCategory::Visitors => "visitors",
            QrCategory::Requests => "requests",
        }
    }
}

/// Writes QR images under a root directory
#[derive(Clone)]
pub struct QrStore {
    root: PathBuf,
}

impl QrStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The conventional path for a token's image
    pub fn path_for(&self, category: QrCategory, id: &str) -> PathBuf {
        self.root
            .join(category.dir_name())
            .join(format!("{}.png", id))
    }

    /// Render `token` into `{root}/{category}/{id}.png`
    pub fn render(&self, category: QrCategory, id: &str, token: &str) -> Result<PathBuf> {
        let path = self.path_for(category, id);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                GatekeeperError::Config(format!("Cannot create QR directory: {}", e))
            })?;
        }

        let code = QrCode::new(token.as_bytes())
            .map_err(|e| GatekeeperError::Config(format!("QR encoding failed: {}", e)))?;
        let image = code.render::<image::Luma<u8>>().build();
        image
            .save(&path)
            .map_err(|e| GatekeeperError::Config(format!("QR image save failed: {}", e)))?;

        info!(path = %path.display(), "QR code saved");
        Ok(path)
    }
}

impl AsRef<Path> for QrStore {
    fn as_ref(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_convention() {
        let store = QrStore::new("/tmp/qr");
        assert_eq!(
            store.path_for(QrCategory::Requests, "REQ-1234"),
            PathBuf::from("/tmp/qr/requests/REQ-1234.png")
        );
        assert_eq!(
            store.path_for(QrCategory::Residents, "RES-1001"),
            PathBuf::from("/tmp/qr/residents/RES-1001.png")
        );
    }

    #[test]
    fn test_render_writes_png() {
        let dir = std::env::temp_dir().join(format!("qr-test-{}", std::process::id()));
        let store = QrStore::new(&dir);

        let path = store
            .render(QrCategory::Visitors, "VIS-0001", "VIS-0001")
            .unwrap();
        assert!(path.exists());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
