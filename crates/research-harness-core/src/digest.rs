//! Digest rendering for downstream language-model consumption.
//!
//! Groups a subject's records by [`Category`] (records without one land in
//! an "Other" bucket) and renders a Markdown-ish text with bounded size:
//!
//! ```text
//! # Collected Real Data
//!
//!
//! ## Competitors
//!
//!
//! ### Source 1: Acme Corp
//!
//! URL: https://acme.example
//!
//!
//! Title: Acme Corp ...
//! ```
//!
//! At most [`MAX_RECORDS_PER_CATEGORY`] records are rendered per category
//! (the first ones in insertion order) and each record's content is cut to
//! [`MAX_CONTENT_CHARS`] characters.

use std::borrow::Cow;

use anyhow::Result;

use crate::models::{Category, CollectedRecord};
use crate::store::Store;

/// Top heading; an empty corpus renders as exactly this string.
pub const DIGEST_HEADING: &str = "# Collected Real Data\n";
pub const MAX_RECORDS_PER_CATEGORY: usize = 20;
pub const MAX_CONTENT_CHARS: usize = 1000;
pub const TRUNCATION_MARKER: &str = "...";

const OTHER_HEADING: &str = "Other";

/// Load all records of `research_id` and render them with [`render_digest`].
pub async fn format_for_consumption(store: &dyn Store, research_id: &str) -> Result<String> {
    let records = store.records_for_research(research_id, None).await?;
    Ok(render_digest(&records))
}

/// Render records into a digest. Categories appear in first-seen order.
pub fn render_digest(records: &[CollectedRecord]) -> String {
    let mut groups: Vec<(Option<Category>, Vec<&CollectedRecord>)> = Vec::new();
    for record in records {
        match groups.iter_mut().find(|(c, _)| *c == record.category) {
            Some((_, members)) => members.push(record),
            None => groups.push((record.category, vec![record])),
        }
    }

    let mut parts = vec![DIGEST_HEADING.to_string()];
    for (category, members) in &groups {
        let heading = category.map_or(OTHER_HEADING, |c| c.display_name());
        parts.push(format!("\n## {}\n", heading));

        for (i, record) in members.iter().take(MAX_RECORDS_PER_CATEGORY).enumerate() {
            let title = record
                .title
                .as_deref()
                .filter(|t| !t.is_empty())
                .unwrap_or("Untitled");
            parts.push(format!("\n### Source {}: {}\n", i + 1, title));

            if let Some(url) = record.source_url.as_deref().filter(|u| !u.is_empty()) {
                parts.push(format!("URL: {}\n", url));
            }
            if let Some(content) = record.content() {
                parts.push(format!("\n{}\n", truncate_content(content)));
            }
        }
    }

    parts.join("\n")
}

/// Cut `content` to [`MAX_CONTENT_CHARS`] characters, appending the marker when cut.
pub fn truncate_content(content: &str) -> Cow<'_, str> {
    match content.char_indices().nth(MAX_CONTENT_CHARS) {
        Some((byte_idx, _)) => Cow::Owned(format!("{}{}", &content[..byte_idx], TRUNCATION_MARKER)),
        None => Cow::Borrowed(content),
    }
}
