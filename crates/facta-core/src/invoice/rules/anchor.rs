//! Anchor text resolution.

use crate::models::document::Document;

/// Index of the first line containing any marker, case-insensitively.
///
/// Markers are tried in order: an earlier marker wins over an earlier line.
/// Empty markers never match.
pub fn find_anchor<M: AsRef<str>>(doc: &Document, markers: &[M]) -> Option<usize> {
    find_anchor_from(doc, markers, 0)
}

/// Like [`find_anchor`], ignoring lines before `start`.
pub fn find_anchor_from<M: AsRef<str>>(doc: &Document, markers: &[M], start: usize) -> Option<usize> {
    let lowered: Vec<String> = doc
        .lines()
        .iter()
        .skip(start)
        .map(|l| l.to_lowercase())
        .collect();

    markers.iter().find_map(|marker| {
        let marker = marker.as_ref().trim().to_lowercase();
        if marker.is_empty() {
            return None;
        }
        lowered
            .iter()
            .position(|line| line.contains(&marker))
            .map(|pos| start + pos)
    })
}
