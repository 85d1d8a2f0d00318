//! crates/essay_core/src/annotate.rs
//!
//! The offset-anchored annotation model: turning a coach's text selection
//! into a `[start, end)` character range that is valid against the body
//! *at creation time*.
//!
//! Anchors are plain offsets. They are not re-anchored when the student
//! edits later; the renderer (see `render`) clamps stale ranges against
//! the current body, which guards against out-of-range offsets but not
//! against semantic drift. That limitation is inherited deliberately.

use crate::domain::TextRange;

/// Why a selection could not be turned into an anchor.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum AnchorError {
    #[error("Selection is empty")]
    EmptySelection,
    #[error("Selection [{start}, {end}) exceeds body length {body_len}")]
    OutOfBounds {
        start: usize,
        end: usize,
        body_len: usize,
    },
}

/// A validated inline anchor: `0 <= start < end <= char_len(body)` held
/// against the body the selection was made in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InlineAnchor {
    range: TextRange,
}

impl InlineAnchor {
    /// Validates explicit character offsets against the full document body.
    pub fn from_selection(body: &str, start: usize, end: usize) -> Result<Self, AnchorError> {
        if end <= start {
            return Err(AnchorError::EmptySelection);
        }
        let body_len = char_len(body);
        if end > body_len {
            return Err(AnchorError::OutOfBounds {
                start,
                end,
                body_len,
            });
        }
        Ok(Self {
            range: TextRange { start, end },
        })
    }

    /// Builds an anchor the way a selection UI measures one: the length of
    /// the text preceding the selection start gives `start`, the selection
    /// length gives `end - start`. Both are measured against the *full*
    /// document text, never a viewport slice.
    pub fn from_split(preceding: &str, selection: &str) -> Result<Self, AnchorError> {
        if selection.is_empty() {
            return Err(AnchorError::EmptySelection);
        }
        let start = char_len(preceding);
        Ok(Self {
            range: TextRange {
                start,
                end: start + char_len(selection),
            },
        })
    }

    pub fn range(&self) -> TextRange {
        self.range
    }

    /// The anchored substring of `body`, or `None` if the body has since
    /// shrunk past the anchor.
    pub fn anchored_text<'a>(&self, body: &'a str) -> Option<&'a str> {
        char_slice(body, self.range.start, self.range.end)
    }
}

/// Character (not byte) length of a body.
pub fn char_len(body: &str) -> usize {
    body.chars().count()
}

/// Slices `body` by character offsets, returning `None` when the range
/// does not lie fully within the body.
pub fn char_slice(body: &str, start: usize, end: usize) -> Option<&str> {
    if end < start {
        return None;
    }
    let start_byte = byte_offset(body, start)?;
    let end_byte = byte_offset(body, end)?;
    Some(&body[start_byte..end_byte])
}

/// Maps a character offset to the corresponding byte offset, `None` when
/// the offset exceeds the body length.
fn byte_offset(body: &str, char_offset: usize) -> Option<usize> {
    if char_offset == 0 {
        return Some(0);
    }
    body.char_indices()
        .nth(char_offset - 1)
        .map(|(byte_idx, c)| byte_idx + c.len_utf8())
}
