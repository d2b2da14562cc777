//! `\A` and `\G` activation.
//!
//! onig treats the search start as `\G` and the start of the text as `\A`.
//! Neither is right for TextMate rules: `\G` may only match where the last
//! begin (or while) match ended, and `\A` only on the first line of a
//! document. Both are switched off per search through oniguruma's
//! `NOT_BEGIN_POSITION` / `NOT_BEGIN_STRING` options.

use onig::SearchOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AnchorActive {
    /// `\A` may match.
    pub string_start: bool,
    /// `\G` may match.
    pub position: bool,
}

impl AnchorActive {
    pub fn new(first_line: bool, anchor_position: Option<usize>, pos: usize) -> Self {
        AnchorActive {
            string_start: first_line,
            position: anchor_position == Some(pos),
        }
    }

    pub fn to_search_options(self) -> SearchOptions {
        let mut bits = onig_sys::ONIG_OPTION_NONE;
        if !self.string_start {
            bits |= onig_sys::ONIG_OPTION_NOT_BEGIN_STRING;
        }
        if !self.position {
            bits |= onig_sys::ONIG_OPTION_NOT_BEGIN_POSITION;
        }
        SearchOptions::from_bits_retain(bits)
    }
}
