use std::path::PathBuf;

use base64::Engine;

pub const LOGO_FILE: &str = "logo.png";
pub const QR_FILE: &str = "QR.png";

/// An image carried inline in an outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl InlineImage {
    /// Wrap raw bytes, sniffing the MIME type. Unknown formats are sent as JPEG.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let mime_type = image::guess_format(&bytes)
            .map(|format| format.to_mime_type())
            .unwrap_or("image/jpeg")
            .to_string();
        Self { mime_type, bytes }
    }

    pub fn base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }

    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64())
    }
}

/// The fixed brand images attached to every generation.
#[derive(Debug, Clone)]
pub struct BrandAssets {
    pub logo: InlineImage,
    pub qr: InlineImage,
}

/// Reads the logo and QR code from the asset directory.
#[derive(Debug, Clone)]
pub struct AssetLoader {
    dir: PathBuf,
}

impl AssetLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Verify both files exist without reading them.
    pub async fn check(&self) -> Result<(), AssetError> {
        for name in [LOGO_FILE, QR_FILE] {
            let path = self.dir.join(name);
            if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                return Err(AssetError::Missing { path });
            }
        }
        Ok(())
    }

    pub async fn load(&self) -> Result<BrandAssets, AssetError> {
        let logo = self.read(LOGO_FILE).await?;
        let qr = self.read(QR_FILE).await?;

        tracing::debug!(
            logo_bytes = logo.bytes.len(),
            qr_bytes = qr.bytes.len(),
            "Brand assets loaded"
        );

        Ok(BrandAssets { logo, qr })
    }

    async fn read(&self, name: &str) -> Result<InlineImage, AssetError> {
        let path = self.dir.join(name);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(InlineImage::from_bytes(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AssetError::Missing { path })
            }
            Err(source) => Err(AssetError::Read { path, source }),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("Required asset is missing: {}", path.display())]
    Missing { path: PathBuf },

    #[error("Failed to read asset {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
