//! Case-insensitive substring search over catalog text fields
//!
//! Searched fields: title, description, every tag, every AI label, OCR text
//! and emotion. Results keep catalog order and are not ranked.

use memebox_common::{Catalog, Error, MemeRecord, Result};

/// Return the records whose searchable text contains `query`
///
/// Fails with `InvalidQuery` when the query is absent or empty. Never touches
/// the store and never enriches.
pub fn search<'a>(catalog: &'a Catalog, query: Option<&str>) -> Result<Vec<&'a MemeRecord>> {
    let query = validate_query(query)?;
    let needle = query.to_lowercase();

    Ok(catalog
        .memes
        .iter()
        .filter(|meme| record_matches(meme, &needle))
        .collect())
}

/// Reject a missing or empty search term
pub fn validate_query(query: Option<&str>) -> Result<&str> {
    match query {
        Some(q) if !q.is_empty() => Ok(q),
        _ => Err(Error::InvalidQuery("search term is required".to_string())),
    }
}

fn record_matches(meme: &MemeRecord, needle: &str) -> bool {
    let contains = |field: &str| field.to_lowercase().contains(needle);

    contains(&meme.title)
        || contains(&meme.description)
        || meme.tags.iter().any(|t| contains(t))
        || meme.ai_labels.iter().any(|l| contains(l))
        || contains(&meme.ai_text_ocr)
        || contains(&meme.ai_emotion)
}
