use std::path::Path;

use bytes::Bytes;

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// A file selected for upload. Owned by the caller; the core only reads it.
#[derive(Debug, Clone)]
pub struct FileRef {
    name: String,
    mime_type: Option<String>,
    content: Bytes,
}

impl FileRef {
    pub fn new(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime_type: None,
            content: content.into(),
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Reads `path` fully into memory, naming the file after its last path component.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("'{}' does not name a file", path.display()),
                )
            })?;
        let content = tokio::fs::read(path).await?;
        let mime_type = mime_guess::from_path(path)
            .first_raw()
            .unwrap_or(DEFAULT_MIME_TYPE);

        Ok(Self::new(name, content).with_mime_type(mime_type))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size_bytes(&self) -> u64 {
        self.content.len() as u64
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn mime_type(&self) -> &str {
        self.mime_type.as_deref().unwrap_or(DEFAULT_MIME_TYPE)
    }
}

#[cfg(test)]
#[path = "tests/file_tests.rs"]
mod tests;
