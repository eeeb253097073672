//! Attachment-to-payload conversion.

use crate::types::message::AttachmentPayload;
use crate::Result;
use async_trait::async_trait;
use base64::Engine as _;
use std::path::{Path, PathBuf};

/// Raw attachment input prior to conversion.
#[derive(Debug, Clone)]
pub enum AttachmentSource {
    File(PathBuf),
    Bytes { data: Vec<u8>, file_name: String },
}

/// File-to-payload converter seam. Conversion is best-effort: the turn
/// builder sends text-only when it fails.
#[async_trait]
pub trait PayloadConverter: Send + Sync {
    async fn to_payload(&self, source: &AttachmentSource) -> Result<AttachmentPayload>;
}

/// Default converter: read, base64-encode, guess the mime type from the
/// file extension.
pub struct Base64FileConverter;

#[async_trait]
impl PayloadConverter for Base64FileConverter {
    async fn to_payload(&self, source: &AttachmentSource) -> Result<AttachmentPayload> {
        match source {
            AttachmentSource::File(path) => {
                let bytes = tokio::fs::read(path).await?;
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "attachment".to_string());
                Ok(AttachmentPayload {
                    data: base64::engine::general_purpose::STANDARD.encode(bytes),
                    mime_type: guess_media_type(path),
                    file_name,
                })
            }
            AttachmentSource::Bytes { data, file_name } => Ok(AttachmentPayload {
                data: base64::engine::general_purpose::STANDARD.encode(data),
                mime_type: guess_media_type(Path::new(file_name)),
                file_name: file_name.clone(),
            }),
        }
    }
}

fn guess_media_type(path: &Path) -> String {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase();
    let mt = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "m4a" => "audio/mp4",
        "pdf" => "application/pdf",
        "txt" | "md" => "text/plain",
        "json" => "application/json",
        _ => "application/octet-stream",
    };
    mt.to_string()
}
