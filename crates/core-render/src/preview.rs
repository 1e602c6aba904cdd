//! Plain-text rendering of a suggestion for line-oriented surfaces.

use core_diff::EditSuggestion;

/// Header line with the range label followed by `-`/`+` body lines.
pub fn preview_lines(suggestion: &EditSuggestion) -> Vec<String> {
    let mut out = vec![suggestion.range_label()];
    if suggestion.original_line_count > 0 && !suggestion.original.is_empty() {
        out.extend(suggestion.original.split('\n').map(|l| format!("- {l}")));
    }
    if !suggestion.suggested.is_empty() {
        out.extend(suggestion.suggested.split('\n').map(|l| format!("+ {l}")));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replacement_preview() {
        let s = EditSuggestion::new("old one\nold two", "new", 4, 2);
        assert_eq!(
            preview_lines(&s),
            vec!["Replace Lines 4-5", "- old one", "- old two", "+ new"]
        );
    }

    #[test]
    fn insertion_preview_has_no_removed_lines() {
        let s = EditSuggestion::new("", "\\item x", 9, 0);
        assert_eq!(preview_lines(&s), vec!["Insert at Line 9", "+ \\item x"]);
    }
}
