//! Resume documents: fetch an attachment and pull its text out.

use std::path::Path;

use async_trait::async_trait;

use crate::channels::{Attachment, AttachmentSource};
use crate::error::AdapterError;
use crate::onboarding::prompts::is_document;

const ADAPTER: &str = "document_reader";

/// Largest document we are willing to download.
const MAX_DOCUMENT_BYTES: usize = 10 * 1024 * 1024;

/// Turns an uploaded attachment into plain text.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn read_text(&self, attachment: &Attachment) -> Result<String, AdapterError>;
}

/// Reads `.pdf` and `.txt` attachments from a URL or the local filesystem.
pub struct DocumentReader {
    client: reqwest::Client,
}

impl DocumentReader {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    async fn fetch(&self, attachment: &Attachment) -> Result<Vec<u8>, AdapterError> {
        if attachment
            .size
            .is_some_and(|size| size > MAX_DOCUMENT_BYTES as u64)
        {
            return Err(AdapterError::Extraction {
                file_name: attachment.file_name.clone(),
                reason: format!("file larger than {MAX_DOCUMENT_BYTES} bytes"),
            });
        }

        let bytes = match &attachment.source {
            AttachmentSource::Url(url) => {
                let resp = self
                    .client
                    .get(url)
                    .send()
                    .await
                    .map_err(|e| AdapterError::transport(ADAPTER, &e))?;
                if !resp.status().is_success() {
                    return Err(AdapterError::transport(
                        ADAPTER,
                        &format!("download returned {}", resp.status()),
                    ));
                }
                resp.bytes()
                    .await
                    .map_err(|e| AdapterError::transport(ADAPTER, &e))?
                    .to_vec()
            }
            AttachmentSource::Path(path) => tokio::fs::read(path)
                .await
                .map_err(|e| AdapterError::transport(ADAPTER, &e))?,
            AttachmentSource::Unavailable(reason) => {
                return Err(AdapterError::transport(ADAPTER, reason));
            }
        };

        if bytes.len() > MAX_DOCUMENT_BYTES {
            return Err(AdapterError::Extraction {
                file_name: attachment.file_name.clone(),
                reason: format!("file larger than {MAX_DOCUMENT_BYTES} bytes"),
            });
        }
        Ok(bytes)
    }
}

impl Default for DocumentReader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentSource for DocumentReader {
    async fn read_text(&self, attachment: &Attachment) -> Result<String, AdapterError> {
        if !is_document(&attachment.file_name) {
            return Err(AdapterError::UnsupportedDocument {
                file_name: attachment.file_name.clone(),
            });
        }

        let bytes = self.fetch(attachment).await?;
        let text = extract_text(&attachment.file_name, bytes).await?;
        tracing::debug!(
            file = %attachment.file_name,
            chars = text.chars().count(),
            "Extracted resume text"
        );
        Ok(text)
    }
}

/// Extract text from document bytes according to the file extension.
pub async fn extract_text(file_name: &str, bytes: Vec<u8>) -> Result<String, AdapterError> {
    let is_pdf = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

    if !is_pdf {
        return Ok(String::from_utf8_lossy(&bytes).trim().to_string());
    }

    let name = file_name.to_string();
    tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| AdapterError::Extraction {
            file_name: name.clone(),
            reason: e.to_string(),
        })?
        .map(|text| text.trim().to_string())
        .map_err(|e| AdapterError::Extraction {
            file_name: name,
            reason: e.to_string(),
        })
}
