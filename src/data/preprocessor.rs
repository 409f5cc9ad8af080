// ============================================================
// Text Preprocessor
// ============================================================
// Cleans raw text fields before tokenisation. Spreadsheet and
// CSV exports routinely carry non-breaking spaces, Windows line
// endings, and stray control characters; left in place they
// become junk tokens.
//
// Single pass, char-level state machine:
//   - exotic whitespace (tab, NBSP, ZWSP, BOM) → plain space
//   - \r and \r\n → \n
//   - other control characters dropped
//   - runs of spaces collapsed to one
//   - at most one blank line in a row
//   - leading/trailing whitespace trimmed

pub struct TextCleaner;

impl TextCleaner {
    pub fn new() -> Self {
        Self
    }

    /// Normalise a raw text string for downstream tokenisation.
    pub fn clean(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut pending_space = false;
        let mut newline_run = 0usize;
        let mut prev_was_cr = false;

        for c in text.chars() {
            // \r\n is ONE line ending; the \r already produced it
            if c == '\n' && prev_was_cr {
                prev_was_cr = false;
                continue;
            }
            prev_was_cr = c == '\r';

            let c = match c {
                '\t' | '\u{00A0}' | '\u{200B}' | '\u{FEFF}' => ' ',
                '\r' => '\n',
                c if c.is_control() && c != '\n' => continue,
                c => c,
            };

            if c == ' ' {
                pending_space = !out.is_empty() && newline_run == 0;
                continue;
            }

            if c == '\n' {
                // cap at two consecutive newlines (one blank line)
                newline_run += 1;
                pending_space = false;
                if newline_run <= 2 {
                    out.push('\n');
                }
                continue;
            }

            if pending_space {
                out.push(' ');
                pending_space = false;
            }
            newline_run = 0;
            out.push(c);
        }

        // trailing newlines from the run cap, leading from input
        out.trim_matches('\n').trim().to_string()
    }
}

impl Default for TextCleaner {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_space_runs() {
        let c = TextCleaner::new();
        assert_eq!(c.clean("hello    world"), "hello world");
    }

    #[test]
    fn test_exotic_whitespace_becomes_space() {
        let c = TextCleaner::new();
        assert_eq!(c.clean("a\u{00A0}b\tc"), "a b c");
    }

    #[test]
    fn test_windows_line_endings() {
        let c = TextCleaner::new();
        assert_eq!(c.clean("one\r\ntwo"), "one\ntwo");
        assert_eq!(c.clean("one\rtwo"), "one\ntwo");
    }

    #[test]
    fn test_control_chars_dropped() {
        let c = TextCleaner::new();
        assert_eq!(c.clean("he\x01llo"), "hello");
    }

    #[test]
    fn test_blank_line_cap() {
        let c = TextCleaner::new();
        assert_eq!(c.clean("a\n\n\n\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_trims_edges() {
        let c = TextCleaner::new();
        assert_eq!(c.clean("  padded  "), "padded");
        assert_eq!(c.clean(""), "");
    }
}
