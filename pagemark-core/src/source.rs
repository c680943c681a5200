use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    pub text: String,
    /// `[a, b, c, d, e, f]`; `(e, f)` is the run's origin in page units.
    pub transform: [f64; 6],
    pub width: f64,
}

impl TextRun {
    pub fn new(text: impl Into<String>, transform: [f64; 6], width: f64) -> Self {
        Self {
            text: text.into(),
            transform,
            width,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageText {
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub runs: Vec<TextRun>,
}

#[async_trait]
pub trait TextSource: Send + Sync {
    fn page_count(&self) -> u32;

    async fn page(&self, page_number: u32) -> Result<PageText>;
}

#[derive(Debug, Deserialize)]
struct TextLayerFile {
    pages: Vec<Option<PageText>>,
}

/// Text layer loaded from a JSON dump of the form
/// `{"pages": [{"width": .., "height": .., "runs": [..]}, null, ..]}`.
///
/// A `null` page stands for a page whose extraction failed upstream.
#[derive(Debug, Clone)]
pub struct JsonTextSource {
    path: PathBuf,
    pages: Vec<Option<PageText>>,
}

impl JsonTextSource {
    pub fn open(path: &Path) -> Result<Self> {
        let payload = fs::read_to_string(path)
            .with_context(|| format!("failed to read text layer {:?}", path))?;
        Self::parse(path, &payload)
    }

    pub fn parse(path: &Path, payload: &str) -> Result<Self> {
        let file: TextLayerFile = serde_json::from_str(payload)
            .with_context(|| format!("failed to decode text layer {:?}", path))?;
        Ok(Self {
            path: path.to_path_buf(),
            pages: file.pages,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TextSource for JsonTextSource {
    fn page_count(&self) -> u32 {
        u32::try_from(self.pages.len()).unwrap_or(u32::MAX)
    }

    async fn page(&self, page_number: u32) -> Result<PageText> {
        let index = (page_number as usize)
            .checked_sub(1)
            .ok_or_else(|| anyhow!("page numbers start at 1"))?;
        match self.pages.get(index) {
            Some(Some(page)) => Ok(page.clone()),
            Some(None) => Err(anyhow!(
                "no text content recorded for page {} of {:?}",
                page_number,
                self.path
            )),
            None => Err(anyhow!("page {} out of range", page_number)),
        }
    }
}
