//! Title search over already-loaded images. Never triggers a fetch.

use crate::types::Image;
use unicode_normalization::UnicodeNormalization;

fn fold(s: &str) -> String {
    s.nfkc().flat_map(char::to_lowercase).collect()
}

/// Images whose title contains `query`, case-insensitively, in input order.
///
/// The query is trimmed; an empty query returns every image.
pub fn filter_by_title<'a>(images: &'a [Image], query: &str) -> Vec<&'a Image> {
    let needle = fold(query.trim());
    if needle.is_empty() {
        return images.iter().collect();
    }
    images
        .iter()
        .filter(|image| fold(&image.title).contains(&needle))
        .collect()
}
