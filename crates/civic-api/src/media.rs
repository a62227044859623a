//! Image upload collaborator
//!
//! Takes the image part of an issue submission and returns a public URL.
//! The core only ever sees that URL.

use civic_core::config::{CloudinaryConfig, MediaConfig};
use civic_core::{Config, MediaBackend};
use image::ImageFormat;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ApiError, ApiResult};

/// An uploaded file as read from the multipart body
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Upload {
    /// Lowercase extension from the file name, else from the content type
    fn extension(&self) -> Option<String> {
        let from_name = self
            .file_name
            .as_deref()
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase);
        from_name.or_else(|| {
            match self.content_type.as_deref()? {
                "image/jpeg" => Some("jpg".to_string()),
                "image/png" => Some("png".to_string()),
                _ => None,
            }
        })
    }
}

/// Where images go
pub enum MediaHost {
    Disabled,
    Disk(DiskMedia),
    Cloudinary(CloudinaryMedia),
}

pub struct DiskMedia {
    dir: PathBuf,
    public_base_url: String,
}

pub struct CloudinaryMedia {
    client: reqwest::Client,
    credentials: CloudinaryConfig,
    folder: String,
}

#[derive(Debug, Deserialize)]
struct CloudinaryUploadResponse {
    secure_url: String,
}

/// Upload limits shared by every backend
struct Limits<'a> {
    max_bytes: usize,
    allowed_formats: &'a [String],
}

impl MediaHost {
    pub fn from_config(config: &Config) -> civic_core::Result<Self> {
        let media = &config.media;
        Ok(match media.backend {
            MediaBackend::Disabled => MediaHost::Disabled,
            MediaBackend::Disk => MediaHost::Disk(DiskMedia {
                dir: config.media_dir(),
                public_base_url: media.public_base_url.trim_end_matches('/').to_string(),
            }),
            MediaBackend::Cloudinary => {
                let client = reqwest::Client::builder()
                    .timeout(Duration::from_secs(30))
                    .build()
                    .map_err(|e| civic_core::Error::Config(format!("HTTP client: {e}")))?;
                MediaHost::Cloudinary(CloudinaryMedia {
                    client,
                    credentials: media.cloudinary.clone(),
                    folder: media.folder.clone(),
                })
            }
        })
    }

    /// Directory to serve at /media, for the disk backend
    pub fn serve_dir(&self) -> Option<&Path> {
        match self {
            MediaHost::Disk(disk) => Some(&disk.dir),
            _ => None,
        }
    }

    /// Validate and store an upload, returning its public URL
    pub async fn store(&self, config: &MediaConfig, upload: Upload) -> ApiResult<String> {
        let limits = Limits {
            max_bytes: config.max_bytes,
            allowed_formats: &config.allowed_formats,
        };
        let ext = check(&limits, &upload)?;

        match self {
            MediaHost::Disabled => Err(ApiError::BadRequest(
                "Image uploads are disabled on this server".into(),
            )),
            MediaHost::Disk(disk) => disk.store(&ext, upload).await,
            MediaHost::Cloudinary(cloud) => cloud.store(upload).await,
        }
    }
}

fn check(limits: &Limits<'_>, upload: &Upload) -> ApiResult<String> {
    if upload.bytes.is_empty() {
        return Err(ApiError::BadRequest("Empty image file".into()));
    }
    if upload.bytes.len() > limits.max_bytes {
        return Err(ApiError::PayloadTooLarge {
            size: upload.bytes.len(),
            max: limits.max_bytes,
        });
    }
    let ext = upload.extension().unwrap_or_default();
    if !limits.allowed_formats.iter().any(|f| *f == ext) {
        return Err(ApiError::BadRequest(format!(
            "Unsupported image format: {:?}. Supported: {}",
            ext,
            limits.allowed_formats.join(", ")
        )));
    }

    // The bytes must actually be the image the name claims
    let claimed = ImageFormat::from_extension(&ext)
        .ok_or_else(|| ApiError::BadRequest(format!("Unsupported image format: {ext:?}")))?;
    let detected = image::guess_format(&upload.bytes)
        .map_err(|_| ApiError::BadRequest("File is not a recognized image".into()))?;
    if detected != claimed {
        return Err(ApiError::BadRequest(format!(
            "File content is {} but is named as {}",
            detected.extensions_str().first().copied().unwrap_or("unknown"),
            ext
        )));
    }
    image::load_from_memory_with_format(&upload.bytes, detected)
        .map_err(|e| ApiError::BadRequest(format!("Invalid image: {e}")))?;

    Ok(ext)
}

impl DiskMedia {
    async fn store(&self, ext: &str, upload: Upload) -> ApiResult<String> {
        let name = format!("{}.{}", uuid::Uuid::new_v4().simple(), ext);
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(civic_core::Error::from)?;
        tokio::fs::write(self.dir.join(&name), &upload.bytes)
            .await
            .map_err(civic_core::Error::from)?;
        tracing::info!(file = %name, bytes = upload.bytes.len(), "image stored on disk");
        Ok(format!("{}/media/{}", self.public_base_url, name))
    }
}

impl CloudinaryMedia {
    fn upload_url(&self) -> String {
        format!(
            "https://api.cloudinary.com/v1_1/{}/image/upload",
            self.credentials.cloud_name
        )
    }

    async fn store(&self, upload: Upload) -> ApiResult<String> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign(
            &[("folder", self.folder.as_str()), ("timestamp", timestamp.as_str())],
            &self.credentials.api_secret,
        );

        let size = upload.bytes.len();
        let mut part = reqwest::multipart::Part::bytes(upload.bytes)
            .file_name(upload.file_name.unwrap_or_else(|| "upload".to_string()));
        if let Some(content_type) = upload.content_type.as_deref() {
            part = part
                .mime_str(content_type)
                .map_err(|e| ApiError::BadRequest(format!("Bad content type: {e}")))?;
        }

        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("api_key", self.credentials.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", self.folder.clone())
            .text("signature", signature)
            .text("signature_algorithm", "sha256");

        let response = self
            .client
            .post(self.upload_url())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!(
                "cloudinary returned {status}: {body}"
            )));
        }

        let uploaded: CloudinaryUploadResponse = response.json().await?;
        tracing::info!(url = %uploaded.secure_url, bytes = size, "image uploaded to cloudinary");
        Ok(uploaded.secure_url)
    }
}

/// Cloudinary request signature: sorted `key=value` pairs joined with `&`,
/// secret appended, SHA-256 hex
fn sign(params: &[(&str, &str)], secret: &str) -> String {
    let mut params = params.to_vec();
    params.sort_by(|a, b| a.0.cmp(b.0));
    let payload = params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let digest = Sha256::digest(format!("{payload}{secret}").as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(name: &str, bytes: &[u8]) -> Upload {
        Upload {
            file_name: Some(name.into()),
            content_type: None,
            bytes: bytes.to_vec(),
        }
    }

    fn encoded(format: ImageFormat) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(2, 2, image::Rgb([200, 40, 40]));
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    fn formats() -> Vec<String> {
        vec!["jpg".into(), "jpeg".into(), "png".into()]
    }

    fn limits(allowed: &[String]) -> Limits<'_> {
        Limits {
            max_bytes: 64 * 1024,
            allowed_formats: allowed,
        }
    }

    #[test]
    fn test_sign_matches_cloudinary_scheme() {
        let signature = sign(
            &[("timestamp", "1700000000"), ("folder", "issue-tracker")],
            "secret",
        );
        assert_eq!(
            signature,
            "2cf00616a6049a2f06ba3c79d0536b1aee811618b3fbb470f8be7148f2c2856d"
        );
    }

    #[test]
    fn test_extension() {
        assert_eq!(upload("a.PNG", b"x").extension().as_deref(), Some("png"));
        let no_name = Upload {
            file_name: None,
            content_type: Some("image/jpeg".into()),
            bytes: vec![1],
        };
        assert_eq!(no_name.extension().as_deref(), Some("jpg"));
    }

    #[test]
    fn test_check_accepts_real_images() {
        let allowed = formats();
        let png = encoded(ImageFormat::Png);
        let jpeg = encoded(ImageFormat::Jpeg);
        assert_eq!(check(&limits(&allowed), &upload("a.png", &png)).unwrap(), "png");
        assert_eq!(check(&limits(&allowed), &upload("a.jpg", &jpeg)).unwrap(), "jpg");
        assert_eq!(check(&limits(&allowed), &upload("a.JPEG", &jpeg)).unwrap(), "jpeg");
    }

    #[test]
    fn test_check_limits() {
        let allowed = formats();
        let png = encoded(ImageFormat::Png);
        let tight = Limits {
            max_bytes: png.len() - 1,
            allowed_formats: &allowed,
        };
        assert!(matches!(
            check(&tight, &upload("a.png", &png)),
            Err(ApiError::PayloadTooLarge { .. })
        ));
        assert!(matches!(
            check(&limits(&allowed), &upload("a.gif", b"GIF89a")),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            check(&limits(&allowed), &upload("a.jpg", b"")),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn test_check_rejects_content_not_matching_name() {
        let allowed = formats();
        let html = b"<html><script>alert(1)</script></html>";
        assert!(matches!(
            check(&limits(&allowed), &upload("x.png", html)),
            Err(ApiError::BadRequest(_))
        ));

        let jpeg = encoded(ImageFormat::Jpeg);
        assert!(matches!(
            check(&limits(&allowed), &upload("x.png", &jpeg)),
            Err(ApiError::BadRequest(_))
        ));

        // Right signature, garbage after it
        let mut truncated = encoded(ImageFormat::Png);
        truncated.truncate(16);
        assert!(matches!(
            check(&limits(&allowed), &upload("x.png", &truncated)),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_disk_store_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let host = MediaHost::Disk(DiskMedia {
            dir: dir.path().join("media"),
            public_base_url: "http://localhost:5000".into(),
        });
        let png = encoded(ImageFormat::Png);
        let url = host
            .store(&MediaConfig::default(), upload("photo.png", &png))
            .await
            .unwrap();
        let name = url.strip_prefix("http://localhost:5000/media/").unwrap();
        assert!(name.ends_with(".png"));
        assert_eq!(std::fs::read(dir.path().join("media").join(name)).unwrap(), png);
    }

    #[tokio::test]
    async fn test_disk_store_rejects_fake_image() {
        let dir = tempfile::tempdir().unwrap();
        let host = MediaHost::Disk(DiskMedia {
            dir: dir.path().join("media"),
            public_base_url: "http://localhost:5000".into(),
        });
        let result = host
            .store(&MediaConfig::default(), upload("x.png", b"not an image"))
            .await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
        assert!(!dir.path().join("media").exists());
    }

    #[tokio::test]
    async fn test_disabled_rejects_uploads() {
        let png = encoded(ImageFormat::Png);
        let result = MediaHost::Disabled
            .store(&MediaConfig::default(), upload("a.png", &png))
            .await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }
}
