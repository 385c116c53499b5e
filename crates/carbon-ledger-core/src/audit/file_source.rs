use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::io::AsyncReadExt;
use tracing::{debug, instrument};

use super::CsvSource;

/// Reads a CSV document from a file on disk.
pub struct FileCsvSource {
    path: PathBuf,
}

impl FileCsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl CsvSource for FileCsvSource {
    #[instrument(name = "load_csv_file", skip(self), fields(path = %self.path.display()))]
    async fn load(&self) -> Result<String> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("failed to read CSV file at {}", self.path.display()))?;
        let text = String::from_utf8(bytes)
            .with_context(|| format!("CSV file at {} is not valid UTF-8", self.path.display()))?;
        debug!(bytes = text.len(), "loaded csv file");
        Ok(text)
    }

    fn label(&self) -> String {
        self.path.display().to_string()
    }
}

/// Reads a CSV document from standard input until EOF.
#[derive(Debug, Default)]
pub struct StdinCsvSource;

#[async_trait::async_trait]
impl CsvSource for StdinCsvSource {
    async fn load(&self) -> Result<String> {
        let mut text = String::new();
        tokio::io::stdin()
            .read_to_string(&mut text)
            .await
            .context("failed to read CSV from stdin")?;
        Ok(text)
    }

    fn label(&self) -> String {
        "<stdin>".to_string()
    }
}

/// In-memory document, already materialized by the caller.
#[derive(Debug, Clone)]
pub struct StaticCsvSource {
    label: String,
    text: String,
}

impl StaticCsvSource {
    pub fn new(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            text: text.into(),
        }
    }
}

#[async_trait::async_trait]
impl CsvSource for StaticCsvSource {
    async fn load(&self) -> Result<String> {
        Ok(self.text.clone())
    }

    fn label(&self) -> String {
        self.label.clone()
    }
}
