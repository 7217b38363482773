//! Suggested-title derivation from the first user message.

use regex::Regex;

use crate::chat::core::config::TitleConfig;
use crate::chat::core::errors::{ChatError, ChatResult};

/// Appended when the source text is longer than the title budget.
const ELLIPSIS: char = '…';

/// Derives a short display title from the opening user message.
///
/// The suggestion is a whitespace-collapsed prefix of the text, cut at a word
/// boundary where possible.
#[derive(Debug)]
pub struct TitleSuggester {
    whitespace: Regex,
    max_chars: usize,
}

impl TitleSuggester {
    /// Build a suggester for the given settings.
    ///
    /// # Errors
    /// Returns an error if the configured length budget is zero.
    pub fn new(config: &TitleConfig) -> ChatResult<Self> {
        if config.max_chars == 0 {
            return Err(ChatError::InvalidConfig(
                "title.max_chars must be > 0".to_string(),
            ));
        }
        let whitespace = Regex::new(r"\s+")
            .map_err(|err| ChatError::InvalidConfig(format!("title pattern: {err}")))?;
        Ok(Self {
            whitespace,
            max_chars: config.max_chars,
        })
    }

    /// Derive a title suggestion from `text`.
    #[must_use]
    pub fn suggest(&self, text: &str) -> String {
        let collapsed = self.whitespace.replace_all(text.trim(), " ");

        if collapsed.chars().count() <= self.max_chars {
            return collapsed.into_owned();
        }

        let prefix: String = collapsed.chars().take(self.max_chars).collect();
        // Cut back to the last full word unless the prefix is a single word.
        let cut = match prefix.rfind(' ') {
            Some(pos) if pos > 0 => &prefix[..pos],
            _ => prefix.as_str(),
        };
        let mut title = cut.trim_end().to_string();
        title.push(ELLIPSIS);
        title
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suggester(max_chars: usize) -> TitleSuggester {
        TitleSuggester::new(&TitleConfig { max_chars }).unwrap()
    }

    #[test]
    fn test_short_text_is_kept_whole() {
        let title = suggester(40).suggest("How are you?");
        assert_eq!(title, "How are you?");
    }

    #[test]
    fn test_whitespace_is_collapsed() {
        let title = suggester(40).suggest("  I   need\nsome\tadvice  ");
        assert_eq!(title, "I need some advice");
    }

    #[test]
    fn test_long_text_is_cut_at_word_boundary() {
        let title =
            suggester(20).suggest("I have been struggling with a very difficult decision lately");
        assert_eq!(title, "I have been…");
        assert!(title.chars().count() <= 21);
    }

    #[test]
    fn test_single_long_word_is_truncated_hard() {
        let title = suggester(5).suggest("Antidisestablishmentarianism");
        assert_eq!(title, "Antid…");
    }

    #[test]
    fn test_zero_budget_is_rejected() {
        assert!(TitleSuggester::new(&TitleConfig { max_chars: 0 }).is_err());
    }
}
