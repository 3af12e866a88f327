//! Document splitting.
//!
//! This module provides the [`Chunker`] trait, the boundary-preferring
//! [`Splitter`], and [`KeywordCategorizer`] for tagging passages whose
//! document carries no category.
//!
//! Consecutive passages of one document overlap by exactly the configured
//! number of characters, so concatenating the passages with the overlap
//! removed reproduces the document text.

use crate::config::RagConfig;
use crate::document::{Document, Passage};
use crate::error::{RagError, Result};

/// A strategy for splitting documents into passages.
pub trait Chunker: Send + Sync {
    /// Split a document into ordered passages.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::MalformedRecord`] if the document has no id or no text.
    fn chunk(&self, document: &Document) -> Result<Vec<Passage>>;
}

/// Boundary classes, tried in priority order before falling back to a hard cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    Paragraph,
    Sentence,
    Whitespace,
}

const BOUNDARY_PRIORITY: [Boundary; 3] =
    [Boundary::Paragraph, Boundary::Sentence, Boundary::Whitespace];

impl Boundary {
    /// Whether a cut at `cut` (between `chars[cut - 1]` and `chars[cut]`)
    /// falls right after a boundary of this class.
    fn ends_at(self, chars: &[char], cut: usize) -> bool {
        match self {
            Self::Paragraph => cut >= 2 && chars[cut - 2] == '\n' && chars[cut - 1] == '\n',
            Self::Sentence => {
                cut >= 2 && matches!(chars[cut - 2], '.' | '!' | '?') && chars[cut - 1].is_whitespace()
            }
            Self::Whitespace => cut >= 1 && chars[cut - 1].is_whitespace(),
        }
    }
}

/// Splits text at the largest semantic boundary that fits the budget.
///
/// For each passage the splitter looks for the last paragraph break inside
/// the next `chunk_size` characters, then the last sentence terminator, then
/// the last whitespace, and finally cuts at exactly `chunk_size` characters.
/// The next passage starts `chunk_overlap` characters before the previous
/// one ended. Text that fits in `chunk_size` is emitted as the final passage.
///
/// Sizes and offsets are measured in characters.
///
/// # Example
///
/// ```rust,ignore
/// use corpus_rag::{Document, Splitter, Chunker};
///
/// let splitter = Splitter::new(500, 50)?;
/// let passages = splitter.chunk(&Document::new("home-loan", "Home Loan", text))?;
/// ```
#[derive(Debug, Clone)]
pub struct Splitter {
    chunk_size: usize,
    chunk_overlap: usize,
    categorizer: Option<KeywordCategorizer>,
}

impl Splitter {
    /// Create a new `Splitter`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_overlap >= chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self { chunk_size, chunk_overlap, categorizer: None })
    }

    /// Create a splitter from the chunking parameters of a [`RagConfig`].
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Infer categories for passages of uncategorised documents.
    pub fn with_categorizer(mut self, categorizer: KeywordCategorizer) -> Self {
        self.categorizer = Some(categorizer);
        self
    }

    /// Maximum passage size in characters.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Overlap between consecutive passages in characters.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Compute the `(start, end)` character spans of each passage.
    fn spans(&self, chars: &[char]) -> Vec<(usize, usize)> {
        let mut spans = Vec::new();
        let mut start = 0;

        while chars.len() - start > self.chunk_size {
            let end = self.find_cut(chars, start);
            spans.push((start, end));
            start = end - self.chunk_overlap;
        }
        spans.push((start, chars.len()));

        spans
    }

    /// Pick the end of the passage starting at `start`.
    ///
    /// The cut must leave more than `chunk_overlap` characters in the passage
    /// so that the next passage starts strictly later.
    fn find_cut(&self, chars: &[char], start: usize) -> usize {
        let limit = start + self.chunk_size;
        let min_cut = start + self.chunk_overlap + 1;

        for boundary in BOUNDARY_PRIORITY {
            if let Some(cut) = (min_cut..=limit).rev().find(|&cut| boundary.ends_at(chars, cut)) {
                return cut;
            }
        }
        limit
    }

    fn category_for(&self, document: &Document, text: &str) -> String {
        match &self.categorizer {
            Some(categorizer) if document.category.trim().is_empty() => {
                categorizer.categorize(text).to_string()
            }
            _ => document.category.clone(),
        }
    }
}

impl Chunker for Splitter {
    fn chunk(&self, document: &Document) -> Result<Vec<Passage>> {
        document.validate()?;

        let chars: Vec<char> = document.text.chars().collect();
        let passages = self
            .spans(&chars)
            .into_iter()
            .enumerate()
            .map(|(i, (start, end))| {
                let text: String = chars[start..end].iter().collect();
                Passage {
                    document_id: document.id.clone(),
                    sequence_index: i as u32,
                    start_offset: start,
                    end_offset: end,
                    category: self.category_for(document, &text),
                    text,
                }
            })
            .collect();

        Ok(passages)
    }
}

/// A category and the keywords that select it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRule {
    /// The category assigned on a match.
    pub category: String,
    /// Lowercase keywords; any one of them matching selects the category.
    pub keywords: Vec<String>,
}

/// Assigns a category to text by case-insensitive keyword matching.
///
/// Rules are checked in order and the first match wins; text matching no
/// rule gets the fallback category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordCategorizer {
    rules: Vec<CategoryRule>,
    fallback: String,
}

impl KeywordCategorizer {
    /// Create a categorizer with no rules.
    pub fn new(fallback: impl Into<String>) -> Self {
        Self { rules: Vec::new(), fallback: fallback.into() }
    }

    /// Append a rule. Keywords are matched case-insensitively.
    pub fn rule<I, S>(mut self, category: impl Into<String>, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.rules.push(CategoryRule {
            category: category.into(),
            keywords: keywords.into_iter().map(|k| k.as_ref().to_lowercase()).collect(),
        });
        self
    }

    /// The rule set for the bank loan-product corpus.
    pub fn loan_products() -> Self {
        Self::new("General")
            .rule("Home Loan", ["home loan", "housing loan"])
            .rule("Vehicle Loan", ["car loan", "vehicle loan"])
            .rule("Personal Loan", ["personal loan"])
            .rule("Education Loan", ["education loan"])
            .rule("Gold Loan", ["gold loan"])
            .rule("Agriculture Loan", ["agriculture", "kisan"])
            .rule("MSME Loan", ["msme", "business"])
            .rule("Interest Rates", ["interest rate"])
    }

    /// Return the category for `text`.
    pub fn categorize(&self, text: &str) -> &str {
        let lower = text.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.keywords.iter().any(|k| lower.contains(k.as_str())))
            .map_or(self.fallback.as_str(), |rule| rule.category.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spans_of(splitter: &Splitter, text: &str) -> Vec<(usize, usize)> {
        let chars: Vec<char> = text.chars().collect();
        splitter.spans(&chars)
    }

    #[test]
    fn prefers_paragraph_break_over_sentence() {
        let splitter = Splitter::new(40, 5).unwrap();
        let text = "First para. Still first.\n\nSecond para goes on and on and on.";
        let spans = spans_of(&splitter, text);
        assert_eq!(spans[0], (0, 26));
    }

    #[test]
    fn prefers_sentence_over_whitespace() {
        let splitter = Splitter::new(30, 5).unwrap();
        let text = "One two. Three four five six seven eight";
        let spans = spans_of(&splitter, text);
        assert_eq!(spans[0], (0, 9));
        assert_eq!(spans[1].0, 4);
    }

    #[test]
    fn hard_cut_without_boundaries() {
        let splitter = Splitter::new(10, 3).unwrap();
        let spans = spans_of(&splitter, &"x".repeat(25));
        assert_eq!(spans, vec![(0, 10), (7, 17), (14, 24), (21, 25)]);
    }

    #[test]
    fn boundary_inside_overlap_is_skipped() {
        // A break that would leave no more than `overlap` characters cannot make progress.
        let splitter = Splitter::new(10, 4).unwrap();
        let spans = spans_of(&splitter, "ab cdefghijklmnop");
        assert_eq!(spans[0], (0, 10));
    }

    #[test]
    fn multibyte_text_is_split_on_characters() {
        let splitter = Splitter::new(4, 1).unwrap();
        let spans = spans_of(&splitter, "ééééééé");
        assert_eq!(spans, vec![(0, 4), (3, 7)]);
    }

    #[test]
    fn categorizer_first_matching_rule_wins() {
        let categorizer = KeywordCategorizer::loan_products();
        assert_eq!(categorizer.categorize("Housing Loan interest rate is 7.35%"), "Home Loan");
        assert_eq!(categorizer.categorize("Current interest rates"), "Interest Rates");
        assert_eq!(categorizer.categorize("Branch timings"), "General");
    }
}
