//! Meme catalog data model
//!
//! The catalog is persisted as a single JSON document `{ "memes": [...] }`.
//! Human-authored fields use camelCase keys (`imageUrl`, `uploadDate`), derived
//! fields use the `ai_*` keys. `ai_description` is omitted entirely until a
//! record has been enriched; absence is the "not yet enriched" marker.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::{Error, Result};

/// One catalog entry: an image plus its human and machine metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemeRecord {
    /// Unique within the catalog, assigned externally
    pub id: String,
    /// Image reference resolvable by the AI collaborators
    #[serde(rename = "imageUrl")]
    pub image_url: String,
    pub title: String,
    pub description: String,
    pub source: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Authored timestamp, kept as written (offsets, precision, date-only)
    #[serde(rename = "uploadDate")]
    pub upload_date: String,
    /// Visual labels from image analysis
    #[serde(default)]
    pub ai_labels: Vec<String>,
    /// OCR text; empty string means "no text found"
    #[serde(default)]
    pub ai_text_ocr: String,
    #[serde(default)]
    pub ai_emotion: String,
    /// Generated commentary; `None` means "not yet enriched"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_description: Option<String>,
    /// Keys this version does not know about, kept for lossless round-trips
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MemeRecord {
    /// True when the record still needs a generated description.
    ///
    /// With `regenerate_blank` set, a description that is present but blank
    /// also counts as missing.
    pub fn needs_description(&self, regenerate_blank: bool) -> bool {
        match &self.ai_description {
            None => true,
            Some(text) => regenerate_blank && text.trim().is_empty(),
        }
    }
}

/// The full record collection, loaded and saved as one unit
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Catalog {
    pub memes: Vec<MemeRecord>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Catalog {
    pub fn new(memes: Vec<MemeRecord>) -> Self {
        Self {
            memes,
            extra: Map::new(),
        }
    }

    /// Parse a persisted catalog document
    ///
    /// Malformed JSON and duplicate ids are both reported as
    /// `StorageUnavailable`: the service cannot safely serve or rewrite such a
    /// catalog.
    pub fn parse(raw: &str) -> Result<Self> {
        let catalog: Catalog = serde_json::from_str(raw)
            .map_err(|e| Error::StorageUnavailable(format!("Failed to parse catalog: {}", e)))?;
        catalog.check_unique_ids()?;
        Ok(catalog)
    }

    /// Serialize to the persisted form (pretty JSON, two-space indent)
    pub fn serialize(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::StorageUnavailable(format!("Failed to serialize catalog: {}", e)))
    }

    fn check_unique_ids(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.memes.len());
        for meme in &self.memes {
            if !seen.insert(meme.id.as_str()) {
                return Err(Error::StorageUnavailable(format!(
                    "Duplicate meme id in catalog: {}",
                    meme.id
                )));
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.memes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memes.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&MemeRecord> {
        self.memes.iter().find(|m| m.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut MemeRecord> {
        self.memes.iter_mut().find(|m| m.id == id)
    }

    /// Initial catalog written when no persisted catalog exists
    pub fn seed() -> Self {
        Self::new(vec![
            MemeRecord {
                id: "meme001".to_string(),
                image_url: "https://i.imgur.com/hM1LFE5.jpg".to_string(),
                title: "화난 고양이".to_string(),
                description: "분노의 눈빛을 보내는 고양이 짤방".to_string(),
                source: "디시인사이드".to_string(),
                tags: strings(&["고양이", "분노", "귀여움"]),
                upload_date: "2024-03-20T12:00:00Z".to_string(),
                ai_labels: strings(&["cat", "animal", "facial_expression"]),
                ai_text_ocr: String::new(),
                ai_emotion: "분노".to_string(),
                ai_description: None,
                extra: Map::new(),
            },
            MemeRecord {
                id: "meme002".to_string(),
                image_url: "https://i.imgur.com/sohWhy9.jpg".to_string(),
                title: "놀란 피카츄".to_string(),
                description: "충격과 공포의 피카츄 표정".to_string(),
                source: "에펨코리아".to_string(),
                tags: strings(&["피카츄", "포켓몬", "놀람"]),
                upload_date: "2024-03-20T12:30:00Z".to_string(),
                ai_labels: strings(&["pikachu", "pokemon", "surprised_face"]),
                ai_text_ocr: String::new(),
                ai_emotion: "놀람".to_string(),
                ai_description: None,
                extra: Map::new(),
            },
        ])
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}
