//! Splitting model output into the main response and its justification.
//!
//! The assistant is instructed to prefix its reasoning with `Justification:`.
//! When the marker is absent, the last complete sentence stands in; a short
//! generic justification covers degenerate one-sentence replies.

use regex::Regex;

/// Justification used when none can be extracted from the response.
const GENERIC_JUSTIFICATION: &str =
    "This response aims to address your specific query with relevant information.";

/// Extracts the `Justification:` section from a model response.
#[derive(Debug)]
pub struct JustificationSplitter {
    marker: Regex,
}

impl JustificationSplitter {
    /// Compile the marker pattern.
    ///
    /// # Errors
    /// Returns an error if the pattern fails to compile.
    pub fn new() -> Result<Self, regex::Error> {
        let marker = Regex::new(r"(?s)(?:^|\n)Justification:\s*(.*?)(?:$|\n\n)")?;
        Ok(Self { marker })
    }

    /// Split `full` into `(main_response, justification)`.
    #[must_use]
    pub fn split(&self, full: &str) -> (String, String) {
        let full = full.trim();

        if let Some(caps) = self.marker.captures(full) {
            let justification = caps
                .get(1)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default();
            let main = self.marker.replace_all(full, "").trim().to_string();
            if !justification.is_empty() && !main.is_empty() {
                return (main, justification);
            }
        }

        // No usable marker: fall back to the last complete sentence.
        let sentences: Vec<&str> = full.split('.').collect();
        if sentences.len() > 2 {
            let justification = format!("{}.", sentences[sentences.len() - 2].trim());
            let main = format!("{}.", sentences[..sentences.len() - 2].join("."));
            return (main, justification);
        }

        (full.to_string(), GENERIC_JUSTIFICATION.to_string())
    }
}
