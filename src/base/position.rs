//! Byte offset to line/column conversion.

/// A 1-based line/column position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineCol {
    pub line: u32,
    pub column: u32,
}

/// Maps byte offsets into a source text to line/column positions.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self { line_starts }
    }

    /// Convert a byte offset to a 1-based line/column pair.
    pub fn line_col(&self, offset: usize) -> LineCol {
        let line = self.line_starts.partition_point(|&start| start <= offset) - 1;
        LineCol {
            line: line as u32 + 1,
            column: (offset - self.line_starts[line]) as u32 + 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_line() {
        let index = LineIndex::new("abc\ndef");
        assert_eq!(index.line_col(0), LineCol { line: 1, column: 1 });
        assert_eq!(index.line_col(2), LineCol { line: 1, column: 3 });
    }

    #[test]
    fn test_second_line() {
        let index = LineIndex::new("abc\ndef");
        assert_eq!(index.line_col(4), LineCol { line: 2, column: 1 });
        assert_eq!(index.line_col(6), LineCol { line: 2, column: 3 });
    }

    #[test]
    fn test_offset_at_newline() {
        let index = LineIndex::new("a\nb");
        assert_eq!(index.line_col(1), LineCol { line: 1, column: 2 });
        assert_eq!(index.line_col(2), LineCol { line: 2, column: 1 });
    }
}
