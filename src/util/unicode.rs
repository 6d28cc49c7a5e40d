use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

/// Display width in terminal cells
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Truncate a string to fit within `max_cells` terminal cells, appending `…` if truncated.
pub fn truncate_to_width(s: &str, max_cells: usize) -> String {
    if max_cells == 0 {
        return String::new();
    }
    if display_width(s) <= max_cells {
        return s.to_string();
    }
    if max_cells == 1 {
        return "\u{2026}".to_string();
    }
    let budget = max_cells - 1; // reserve 1 cell for '…'
    let mut width = 0;
    let mut result = String::new();
    for grapheme in s.graphemes(true) {
        let gw = UnicodeWidthStr::width(grapheme);
        if width + gw > budget {
            break;
        }
        width += gw;
        result.push_str(grapheme);
    }
    result.push('\u{2026}');
    result
}

/// Truncate or right-pad with spaces to exactly `cells` terminal cells
pub fn pad_to_width(s: &str, cells: usize) -> String {
    let mut out = truncate_to_width(s, cells);
    let width = display_width(&out);
    out.extend(std::iter::repeat_n(' ', cells.saturating_sub(width)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_width_cjk() {
        assert_eq!(display_width("你好"), 4);
    }

    #[test]
    fn display_width_combining() {
        // café with combining accent: c a f e ́
        assert_eq!(display_width("cafe\u{0301}"), 4);
    }

    #[test]
    fn truncate_keeps_short_strings() {
        assert_eq!(truncate_to_width("Design", 10), "Design");
    }

    #[test]
    fn truncate_appends_ellipsis() {
        assert_eq!(truncate_to_width("Landing page build", 8), "Landing\u{2026}");
        assert_eq!(truncate_to_width("abc", 1), "\u{2026}");
        assert_eq!(truncate_to_width("abc", 0), "");
    }

    #[test]
    fn truncate_never_splits_wide_chars() {
        // Each CJK char is 2 cells; 4 cells leaves room for one plus the ellipsis
        assert_eq!(truncate_to_width("你好世界", 4), "你\u{2026}");
    }

    #[test]
    fn pad_fills_to_width() {
        assert_eq!(pad_to_width("ab", 4), "ab  ");
        assert_eq!(pad_to_width("你", 3), "你 ");
        assert_eq!(pad_to_width("abcdef", 4), "abc\u{2026}");
    }
}
