//! crates/essay_core/src/render.rs
//!
//! Projects the set of inline annotations onto the *current* body as a
//! sequence of alternating plain and highlighted segments.
//!
//! The body may have drifted since the annotations were anchored, so the
//! walk is defensive: ends are clamped to the current length, annotations
//! starting past the end are skipped, and starts are clamped to the walk
//! cursor so ranges that overlap after an edit can never duplicate text.
//! Invariant: the concatenation of all segment texts equals the body
//! exactly once.

use uuid::Uuid;

use crate::annotate::{char_len, char_slice};
use crate::domain::{Annotation, AnnotationStatus};

/// Highlight metadata attached to a rendered segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Highlight {
    pub annotation_id: Uuid,
    /// Open and resolved highlights render with different styles.
    pub status: AnnotationStatus,
    /// The currently-selected annotation gets an extra emphasis state.
    pub active: bool,
}

/// One rendered slice of the body: plain text, or text covered by an
/// inline annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment<'a> {
    pub text: &'a str,
    pub highlight: Option<Highlight>,
}

impl<'a> Segment<'a> {
    fn plain(text: &'a str) -> Self {
        Segment {
            text,
            highlight: None,
        }
    }
}

/// Partitions `body` into plain and highlighted segments.
///
/// Only inline annotations participate; general feedback has no position.
/// `active` marks at most one annotation for emphasis. Total for any
/// input: zero annotations, ranges beyond the current body, and ranges
/// overlapping after an edit all yield a segment list that concatenates
/// back to `body`.
pub fn render_segments<'a>(
    body: &'a str,
    annotations: &[Annotation],
    active: Option<Uuid>,
) -> Vec<Segment<'a>> {
    let body_len = char_len(body);

    let mut inline: Vec<(&Annotation, usize, usize)> = annotations
        .iter()
        .filter_map(|a| a.range.map(|r| (a, r.start, r.end)))
        .collect();
    inline.sort_by(|a, b| a.1.cmp(&b.1).then(a.0.id.cmp(&b.0.id)));

    let mut segments = Vec::new();
    let mut cursor = 0usize;

    for (annotation, start, end) in inline {
        // The body may have shrunk past this anchor entirely.
        if start >= body_len {
            continue;
        }
        let end = end.min(body_len);
        // Overlap with an already-emitted highlight: render only the
        // uncovered remainder.
        let start = start.max(cursor);
        if end <= start {
            continue;
        }

        if start > cursor {
            if let Some(gap) = char_slice(body, cursor, start) {
                segments.push(Segment::plain(gap));
            }
        }
        if let Some(text) = char_slice(body, start, end) {
            segments.push(Segment {
                text,
                highlight: Some(Highlight {
                    annotation_id: annotation.id,
                    status: annotation.status,
                    active: active == Some(annotation.id),
                }),
            });
        }
        cursor = end;
    }

    if cursor < body_len {
        if let Some(tail) = char_slice(body, cursor, body_len) {
            segments.push(Segment::plain(tail));
        }
    }

    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AnnotationKind, TextRange};
    use chrono::Utc;

    fn inline(id_byte: u8, start: usize, end: usize, status: AnnotationStatus) -> Annotation {
        Annotation {
            id: Uuid::from_bytes([id_byte; 16]),
            document_id: Uuid::from_bytes([0xAA; 16]),
            author_id: Uuid::from_bytes([0xBB; 16]),
            kind: AnnotationKind::Inline,
            content: "comment".to_string(),
            status,
            range: Some(TextRange { start, end }),
            created_at: Utc::now(),
        }
    }

    fn concatenated(segments: &[Segment<'_>]) -> String {
        segments.iter().map(|s| s.text).collect()
    }

    #[test]
    fn no_annotations_yields_single_plain_segment() {
        let segments = render_segments("hello world", &[], None);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0], Segment::plain("hello world"));
    }

    #[test]
    fn highlights_exactly_the_anchored_substring() {
        let body = "The quick brown fox";
        let ann = inline(1, 4, 15, AnnotationStatus::Open);
        let segments = render_segments(body, &[ann], None);

        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0], Segment::plain("The "));
        assert_eq!(segments[1].text, "quick brown");
        assert_eq!(
            segments[1].highlight.map(|h| h.status),
            Some(AnnotationStatus::Open)
        );
        assert_eq!(segments[2], Segment::plain(" fox"));
        assert_eq!(concatenated(&segments), body);
    }

    #[test]
    fn shrunken_body_skips_out_of_range_annotation() {
        // Anchored at [80, 95) but the body is now 50 chars.
        let body: String = "x".repeat(50);
        let ann = inline(1, 80, 95, AnnotationStatus::Open);
        let segments = render_segments(&body, &[ann], None);

        assert_eq!(segments.len(), 1);
        assert!(segments[0].highlight.is_none());
        assert_eq!(concatenated(&segments), body);
    }

    #[test]
    fn end_is_clamped_to_current_length() {
        let body = "short body";
        let ann = inline(1, 6, 40, AnnotationStatus::Open);
        let segments = render_segments(body, &[ann], None);

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].text, "body");
        assert!(segments[1].highlight.is_some());
        assert_eq!(concatenated(&segments), body);
    }

    #[test]
    fn overlapping_ranges_never_duplicate_text() {
        let body = "abcdefghij";
        let first = inline(1, 2, 7, AnnotationStatus::Open);
        let second = inline(2, 5, 9, AnnotationStatus::Open);
        let segments = render_segments(body, &[second.clone(), first.clone()], None);

        assert_eq!(concatenated(&segments), body);
        // The overlap [5, 7) belongs to the earlier-starting annotation.
        let highlighted: Vec<&str> = segments
            .iter()
            .filter(|s| s.highlight.is_some())
            .map(|s| s.text)
            .collect();
        assert_eq!(highlighted, vec!["cdefg", "hi"]);
    }

    #[test]
    fn fully_covered_annotation_is_dropped() {
        let body = "abcdefghij";
        let outer = inline(1, 0, 8, AnnotationStatus::Open);
        let swallowed = inline(2, 3, 6, AnnotationStatus::Open);
        let segments = render_segments(body, &[outer, swallowed], None);

        assert_eq!(concatenated(&segments), body);
        assert_eq!(segments.iter().filter(|s| s.highlight.is_some()).count(), 1);
    }

    #[test]
    fn active_annotation_carries_emphasis() {
        let body = "one two three";
        let a = inline(1, 0, 3, AnnotationStatus::Resolved);
        let b = inline(2, 4, 7, AnnotationStatus::Open);
        let segments = render_segments(body, &[a.clone(), b.clone()], Some(b.id));

        let flags: Vec<(AnnotationStatus, bool)> = segments
            .iter()
            .filter_map(|s| s.highlight.map(|h| (h.status, h.active)))
            .collect();
        assert_eq!(
            flags,
            vec![
                (AnnotationStatus::Resolved, false),
                (AnnotationStatus::Open, true)
            ]
        );
    }

    #[test]
    fn general_feedback_never_renders() {
        let body = "plain text";
        let general = Annotation {
            range: None,
            kind: AnnotationKind::General,
            ..inline(1, 0, 0, AnnotationStatus::Open)
        };
        let segments = render_segments(body, &[general], None);
        assert_eq!(segments, vec![Segment::plain("plain text")]);
    }

    #[test]
    fn multibyte_bodies_slice_on_char_boundaries() {
        let body = "héllo wörld";
        let ann = inline(1, 6, 11, AnnotationStatus::Open);
        let segments = render_segments(body, &[ann], None);
        assert_eq!(segments[1].text, "wörld");
        assert_eq!(concatenated(&segments), body);
    }
}
