//! Line-oriented document representation.

/// An ordered, immutable sequence of text lines.
///
/// Lines are 0-indexed here; rule definitions refer to them 1-based.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    lines: Vec<String>,
}

impl Document {
    /// Create a document from already-split lines.
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    /// Split raw text (direct extraction or OCR output) into lines.
    pub fn from_text(text: &str) -> Self {
        Self::new(text.lines().map(|l| l.trim_end_matches('\r')))
    }

    /// Number of lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the document has no lines, or only blank ones.
    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(|l| l.trim().is_empty())
    }

    /// Line at a 0-based index.
    pub fn line(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(String::as_str)
    }

    /// Line at a signed index; negative or past-the-end yields `None`.
    pub fn line_at(&self, index: i64) -> Option<&str> {
        usize::try_from(index).ok().and_then(|i| self.line(i))
    }

    /// All lines in order.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Iterate over `(index, line)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.lines.iter().map(String::as_str).enumerate()
    }
}

impl<S: Into<String>> FromIterator<S> for Document {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// Split a line on runs of whitespace into non-empty tokens.
pub fn tokenize(line: &str) -> Vec<&str> {
    line.split_whitespace().collect()
}
