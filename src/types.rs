//! Core gallery types: image ids, tags, and published images.

use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Image identifier: creation time in milliseconds since the Unix epoch.
///
/// Unique per image and the default sort key (descending = newest first).
pub type ImageId = u64;

/// Active tag filter. Empty means "no filtering".
pub type TagSet = BTreeSet<Tag>;

/// Enumerated category label attachable to an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tag {
    Portrait,
    Landscape,
    Street,
    Nature,
    Architecture,
    Travel,
    Wildlife,
    Night,
    #[serde(rename = "Black & White")]
    BlackAndWhite,
    Film,
}

impl Tag {
    /// Every tag, in declaration order.
    pub const ALL: [Tag; 10] = [
        Tag::Portrait,
        Tag::Landscape,
        Tag::Street,
        Tag::Nature,
        Tag::Architecture,
        Tag::Travel,
        Tag::Wildlife,
        Tag::Night,
        Tag::BlackAndWhite,
        Tag::Film,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Tag::Portrait => "Portrait",
            Tag::Landscape => "Landscape",
            Tag::Street => "Street",
            Tag::Nature => "Nature",
            Tag::Architecture => "Architecture",
            Tag::Travel => "Travel",
            Tag::Wildlife => "Wildlife",
            Tag::Night => "Night",
            Tag::BlackAndWhite => "Black & White",
            Tag::Film => "Film",
        }
    }

    /// Filter chip order: selected tags first, then the rest, each group in
    /// declaration order.
    pub fn display_order(selected: &TagSet) -> Vec<Tag> {
        let (mut active, rest): (Vec<Tag>, Vec<Tag>) =
            Tag::ALL.iter().copied().partition(|t| selected.contains(t));
        active.extend(rest);
        active
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tag {
    type Err = ApiError;

    /// Case-insensitive; accepts the display label or the identifier form
    /// (`black-and-white`, `blackandwhite`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        let squashed: String = wanted
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect();
        Tag::ALL
            .iter()
            .copied()
            .find(|t| {
                t.as_str().eq_ignore_ascii_case(wanted)
                    || format!("{:?}", t).to_lowercase() == squashed
            })
            .ok_or_else(|| ApiError::UnknownTag(wanted.to_string()))
    }
}

/// Return `selected` with `tag` added if absent, removed if present.
pub fn toggle_tag(selected: &TagSet, tag: Tag) -> TagSet {
    let mut next = selected.clone();
    if !next.remove(&tag) {
        next.insert(tag);
    }
    next
}

/// Parse a comma-separated tag list (`"Portrait, night"`). Blank entries are ignored.
pub fn parse_tag_list(raw: &str) -> Result<TagSet, ApiError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Tag::from_str)
        .collect()
}

/// A published gallery entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub id: ImageId,
    pub title: String,
    /// Publicly fetchable address of the stored asset. Immutable once set.
    pub url: String,
    /// Category labels; order is not meaningful.
    pub tags: Vec<Tag>,
}

impl Image {
    /// Any-of match against a tag filter. An empty filter matches everything.
    pub fn matches_any(&self, selected: &TagSet) -> bool {
        selected.is_empty() || self.tags.iter().any(|t| selected.contains(t))
    }
}

/// Stored document shape of an image.
///
/// Records written before tagging existed carry no `tags` field; those decode
/// to an empty tag list. Labels outside the current vocabulary are dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageDocument {
    pub id: ImageId,
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl ImageDocument {
    pub fn into_image(self) -> Image {
        let tags = self
            .tags
            .unwrap_or_default()
            .into_iter()
            .filter_map(|label| match Tag::from_str(&label) {
                Ok(tag) => Some(tag),
                Err(_) => {
                    warn!(image_id = self.id, label = %label, "Dropping unrecognized tag");
                    None
                }
            })
            .collect();
        Image {
            id: self.id,
            title: self.title,
            url: self.url,
            tags,
        }
    }
}

impl From<&Image> for ImageDocument {
    fn from(image: &Image) -> Self {
        Self {
            id: image.id,
            title: image.title.clone(),
            url: image.url.clone(),
            tags: Some(image.tags.iter().map(|t| t.as_str().to_string()).collect()),
        }
    }
}
