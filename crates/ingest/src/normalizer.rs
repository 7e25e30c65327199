use regex::Regex;

/// Cleans extracted document text before planning.
///
/// Text coming out of PDF/DOC/RTF extraction carries CRLF line endings, form
/// feeds at page breaks, stray control characters and long runs of blank
/// lines. Chunk offsets are computed against the normalized text.
pub struct TextNormalizer {
    trailing_spaces: Regex,
    blank_runs: Regex,
}

impl TextNormalizer {
    pub fn new() -> Self {
        Self {
            trailing_spaces: Regex::new(r"[ \t]+\n").expect("valid regex"),
            blank_runs: Regex::new(r"\n{3,}").expect("valid regex"),
        }
    }

    pub fn normalize(&self, raw: &str) -> String {
        let mut text = raw.replace("\r\n", "\n").replace('\r', "\n");

        // Page breaks become paragraph breaks
        text = text.replace('\u{000C}', "\n\n");

        text.retain(|c| !c.is_control() || c == '\n' || c == '\t');

        let text = self.trailing_spaces.replace_all(&text, "\n");
        let text = self.blank_runs.replace_all(&text, "\n\n");

        text.trim().to_string()
    }
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::new()
    }
}
