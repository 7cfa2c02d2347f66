//! Picks which result to send and how to send it.

use rand::{seq::SliceRandom, Rng};

use crate::{
    messaging::types::{InlineKind, InlineResult},
    provider::{BooruProvider, ImageResult},
    Error, Result,
};

/// Inline query answers are capped at this many results.
pub const MAX_INLINE_RESULTS: usize = 50;

pub const CAPTION_RANDOM_TOP: &str = "Random top scoring image in last 3 days";
pub const CAPTION_BEST: &str = "Best recent image for your search";
pub const CAPTION_RANDOM: &str = "Random recent image for your search";

/// Formats the chat transport cannot render as a photo.
const DOCUMENT_FORMATS: &[&str] = &["gif"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Document,
    Animation,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MediaSource {
    /// The transport fetches the media itself.
    Url(String),
    /// Bytes downloaded by us and uploaded as a file part.
    Upload(Vec<u8>),
}

/// Everything the transport needs to send one result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    pub kind: MediaKind,
    pub source: MediaSource,
    pub filename: String,
    pub caption: String,
}

impl Delivery {
    /// URL the media would be fetched from, if not already uploaded.
    pub fn url(&self) -> Option<&str> {
        match &self.source {
            MediaSource::Url(u) => Some(u),
            MediaSource::Upload(_) => None,
        }
    }

    pub fn with_upload(mut self, bytes: Vec<u8>) -> Self {
        self.source = MediaSource::Upload(bytes);
        self
    }
}

/// Second caption line describing how the image was chosen.
pub fn caption_line(empty_search: bool, random: bool) -> &'static str {
    match (empty_search, random) {
        (true, _) => CAPTION_RANDOM_TOP,
        (false, false) => CAPTION_BEST,
        (false, true) => CAPTION_RANDOM,
    }
}

/// Head of the score-sorted list, or a uniformly random element when `random`.
pub fn select<'a, R>(entries: &'a [ImageResult], random: bool, rng: &mut R) -> Option<&'a ImageResult>
where
    R: Rng + ?Sized,
{
    if random {
        entries.choose(rng)
    } else {
        entries.first()
    }
}

/// Decide media kind and URL for an entry.
pub fn plan(provider: &dyn BooruProvider, entry: &ImageResult, line: &str) -> Result<Delivery> {
    let caption = format!("{}\n{}", provider.permalink(entry.id), line);

    if let Some(url) = provider.animation_url(entry) {
        return Ok(Delivery {
            kind: MediaKind::Animation,
            source: MediaSource::Url(url),
            filename: format!("{}.mp4", entry.id),
            caption,
        });
    }

    let url = provider
        .media_url(entry)
        .ok_or_else(|| Error::Parse(format!("entry {} has no media url", entry.id)))?;
    let kind = if DOCUMENT_FORMATS.contains(&entry.original_format.as_str()) {
        MediaKind::Document
    } else {
        MediaKind::Photo
    };
    Ok(Delivery {
        kind,
        source: MediaSource::Url(url),
        filename: filename(entry),
        caption,
    })
}

fn filename(entry: &ImageResult) -> String {
    if entry.original_format.is_empty() {
        entry.id.to_string()
    } else {
        format!("{}.{}", entry.id, entry.original_format)
    }
}

/// Inline answers for the first [`MAX_INLINE_RESULTS`] deliverable entries.
pub fn inline_results(provider: &dyn BooruProvider, entries: &[ImageResult]) -> Vec<InlineResult> {
    entries
        .iter()
        .filter_map(|entry| {
            let media_url = provider.media_url(entry)?;
            let thumb_url = provider.thumb_url(entry).unwrap_or_else(|| media_url.clone());
            let kind = if media_url.to_lowercase().ends_with(".gif") {
                InlineKind::Gif
            } else {
                InlineKind::Photo
            };
            Some(InlineResult {
                kind,
                id: entry.id.to_string(),
                media_url,
                thumb_url,
                width: entry.width,
                height: entry.height,
                caption: provider.permalink(entry.id),
            })
        })
        .take(MAX_INLINE_RESULTS)
        .collect()
}
