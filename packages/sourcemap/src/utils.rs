/// Convert a byte offset into a 0-based (line, column) pair
///
/// Columns count characters, not bytes. Offsets past the end clamp to the
/// final position.
pub fn byte_offset_to_line_col(source: &str, offset: usize) -> (u32, u32) {
    let mut line = 0;
    let mut col = 0;

    for (byte_pos, ch) in source.char_indices() {
        if byte_pos >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 0;
        } else {
            col += 1;
        }
    }

    (line, col)
}

/// Same as [`byte_offset_to_line_col`] but 1-based, the convention used in
/// user-facing error positions
pub fn offset_to_position(source: &str, offset: usize) -> (u32, u32) {
    let (line, col) = byte_offset_to_line_col(source, offset);
    (line + 1, col + 1)
}

/// Number of line breaks in `text`
pub fn count_lines(text: &str) -> u32 {
    text.bytes().filter(|b| *b == b'\n').count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_offset_to_line_col() {
        let source = "line 1\nline 2\nline 3";

        assert_eq!(byte_offset_to_line_col(source, 0), (0, 0));
        assert_eq!(byte_offset_to_line_col(source, 7), (1, 0));
        assert_eq!(byte_offset_to_line_col(source, 10), (1, 3));
        assert_eq!(byte_offset_to_line_col(source, 14), (2, 0));
    }

    #[test]
    fn test_one_based_position() {
        assert_eq!(offset_to_position("a\nbc", 3), (2, 2));
    }

    #[test]
    fn test_multibyte_columns() {
        let source = "日本語\ntext";
        assert_eq!(byte_offset_to_line_col(source, 6), (0, 2));
        assert_eq!(byte_offset_to_line_col(source, 10), (1, 0));
    }

    #[test]
    fn test_out_of_bounds_clamps() {
        assert_eq!(byte_offset_to_line_col("short", 1000), (0, 5));
    }

    #[test]
    fn test_count_lines() {
        assert_eq!(count_lines("a\nb\nc\n"), 3);
        assert_eq!(count_lines(""), 0);
    }
}
