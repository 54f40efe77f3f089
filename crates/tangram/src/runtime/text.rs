//! Text buffering for the runtime lexer.
//!
//! Input is held as a buffer of UTF-16 code units because the lexical
//! automaton's transitions are keyed by code-unit intervals (see
//! [`crate::automata::CharSpan`]). The buffer supports random access, which is
//! what makes the tokenizer's longest-match backtracking a simple index reset.

use compact_str::CompactString;

/// A position in the source text, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TextPosition {
    pub line: u32,
    pub column: u32,
}

impl TextPosition {
    #[must_use]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl std::fmt::Display for TextPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A span of the input buffer: a starting code-unit index and a length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TextSpan {
    pub index: u32,
    pub length: u32,
}

impl TextSpan {
    #[must_use]
    pub const fn new(index: u32, length: u32) -> Self {
        Self { index, length }
    }

    #[must_use]
    pub const fn end(&self) -> u32 {
        self.index + self.length
    }
}

/// The lexer's input: UTF-16 code units plus line bookkeeping.
#[derive(Debug, Clone)]
pub struct TextContent {
    units: Vec<u16>,
    /// Index of the first unit of each line; `line_starts[0] == 0`.
    line_starts: Vec<u32>,
}

impl TextContent {
    #[must_use]
    pub fn new(input: &str) -> Self {
        let units: Vec<u16> = input.encode_utf16().collect();
        let mut line_starts = vec![0];
        for (i, &unit) in units.iter().enumerate() {
            if unit == u16::from(b'\n') {
                line_starts.push(u32::try_from(i).unwrap_or(u32::MAX).saturating_add(1));
            }
        }
        Self { units, line_starts }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// The code unit at `index`, or `None` past the end of input.
    #[must_use]
    pub fn unit(&self, index: usize) -> Option<u16> {
        self.units.get(index).copied()
    }

    #[must_use]
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Line/column of a code-unit index. Columns count code units.
    #[must_use]
    pub fn position(&self, index: u32) -> TextPosition {
        let line = match self.line_starts.binary_search(&index) {
            Ok(l) => l,
            Err(l) => l - 1,
        };
        TextPosition {
            line: u32::try_from(line).unwrap_or(u32::MAX) + 1,
            column: index - self.line_starts[line] + 1,
        }
    }

    /// The text covered by `span`. Unpaired surrogates are replaced, which can
    /// only happen when a span cuts a surrogate pair in half.
    #[must_use]
    pub fn span_text(&self, span: TextSpan) -> CompactString {
        let start = span.index as usize;
        let end = (span.end() as usize).min(self.units.len());
        if start >= end {
            return CompactString::default();
        }
        String::from_utf16_lossy(&self.units[start..end]).into()
    }
}
