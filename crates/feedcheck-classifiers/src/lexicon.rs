//! Rule-based sentiment classifier (terminal fallback)
//!
//! Lexicon scoring used when no external model produced a valid answer.
//! Classification is a total function: any text yields a result.

use aho_corasick::{AhoCorasick, MatchKind};
use feedcheck_core::{AnalysisResult, Error, Result, Sentiment};

/// Sentiment confidence reported by the fallback, independent of match counts
pub const FALLBACK_SENTIMENT_CONFIDENCE: f32 = 0.5;

/// Category confidence reported by the fallback
pub const FALLBACK_CATEGORY_CONFIDENCE: f32 = 0.3;

/// Category label reported by the fallback
pub const FALLBACK_CATEGORY: &str = "General Feedback";

const POSITIVE_TERMS: &[&str] = &[
    "good",
    "great",
    "excellent",
    "love",
    "amazing",
    "wonderful",
    "happy",
    "fantastic",
    "awesome",
    "best",
    "helpful",
    "perfect",
    "recommend",
    "satisf",
    "pleased",
    "friendly",
    "easy to use",
    "thank",
];

const NEGATIVE_TERMS: &[&str] = &[
    "bad",
    "terrible",
    "awful",
    "hate",
    "horrible",
    "worst",
    "sad",
    "angry",
    "disappoint",
    "poor",
    "broken",
    "useless",
    "frustrat",
    "unhappy",
    "unsatisf",
    "rude",
    "refund",
    "waste",
    "crash",
    "not working",
];

/// Match counts for one text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LexiconScore {
    pub positive: usize,
    pub negative: usize,
}

impl LexiconScore {
    pub fn sentiment(&self) -> Sentiment {
        match self.positive.cmp(&self.negative) {
            std::cmp::Ordering::Greater => Sentiment::Positive,
            std::cmp::Ordering::Less => Sentiment::Negative,
            std::cmp::Ordering::Equal => Sentiment::Neutral,
        }
    }
}

/// Deterministic lexicon classifier
///
/// Terms match case-insensitively at the start of a word, so stems such as
/// `disappoint` also cover `disappointed` and `disappointing`.
pub struct RuleBasedClassifier {
    positive: AhoCorasick,
    negative: AhoCorasick,
}

impl RuleBasedClassifier {
    /// Classifier with the built-in feedback lexicon
    pub fn new() -> Result<Self> {
        Self::with_lexicon(POSITIVE_TERMS, NEGATIVE_TERMS)
    }

    /// Classifier with custom term lists
    pub fn with_lexicon<P, N>(positive: &[P], negative: &[N]) -> Result<Self>
    where
        P: AsRef<str>,
        N: AsRef<str>,
    {
        let positive = matcher(positive).map_err(|e| {
            Error::config(format!("Failed to build positive sentiment matcher: {e}"))
        })?;
        let negative = matcher(negative).map_err(|e| {
            Error::config(format!("Failed to build negative sentiment matcher: {e}"))
        })?;

        Ok(Self { positive, negative })
    }

    /// Count lexicon hits in `text`
    pub fn score(&self, text: &str) -> LexiconScore {
        LexiconScore {
            positive: count_word_starts(&self.positive, text),
            negative: count_word_starts(&self.negative, text),
        }
    }

    /// Classify `text`; always succeeds and is marked degraded
    pub fn classify(&self, text: &str) -> AnalysisResult {
        let score = self.score(text);
        AnalysisResult::fallback(
            score.sentiment(),
            FALLBACK_SENTIMENT_CONFIDENCE,
            FALLBACK_CATEGORY,
            FALLBACK_CATEGORY_CONFIDENCE,
        )
    }
}

/// Terms are `str` so every match starts on a char boundary of the text
fn matcher<T: AsRef<str>>(
    terms: &[T],
) -> std::result::Result<AhoCorasick, aho_corasick::BuildError> {
    AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .match_kind(MatchKind::LeftmostLongest)
        .build(terms.iter().map(|t| t.as_ref()))
}

fn count_word_starts(matcher: &AhoCorasick, text: &str) -> usize {
    matcher
        .find_iter(text)
        .filter(|m| {
            text[..m.start()]
                .chars()
                .next_back()
                .map_or(true, |c| !c.is_alphanumeric())
        })
        .count()
}
