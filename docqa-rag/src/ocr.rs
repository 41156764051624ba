//! Optical character recognition for embedded diagrams.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::{DocQaError, Result};

/// Extracts text from an encoded image.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Recognize text in `image` (PNG, JPEG, ...).
    async fn recognize(&self, image: &[u8]) -> Result<String>;
}

/// Runs the `tesseract` command-line tool, feeding the image on stdin.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    binary: PathBuf,
    language: Option<String>,
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self { binary: PathBuf::from("tesseract"), language: None }
    }
}

impl TesseractOcr {
    /// Use the `tesseract` binary found on `PATH`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific `tesseract` binary.
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Set the recognition language (e.g. `eng`, `deu+eng`).
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn recognize(&self, image: &[u8]) -> Result<String> {
        let mut command = Command::new(&self.binary);
        command.arg("stdin").arg("stdout");
        if let Some(language) = &self.language {
            command.arg("-l").arg(language);
        }

        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                DocQaError::Ocr(format!("failed to start {}: {e}", self.binary.display()))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(image)
                .await
                .map_err(|e| DocQaError::Ocr(format!("failed to send image: {e}")))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| DocQaError::Ocr(format!("tesseract did not finish: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DocQaError::Ocr(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!(bytes = image.len(), chars = text.chars().count(), "ocr completed");
        Ok(text)
    }
}
