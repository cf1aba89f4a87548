//! Response validation
//!
//! Model output is untrusted. A payload is accepted only when every required
//! field is present with the right type, the sentiment label is one of the
//! three known values, confidences lie in [0, 1], and the category is a
//! non-empty string of bounded length.

use crate::client::AttemptError;
use feedcheck_core::Sentiment;
use serde_json::Value;

/// Longest accepted category label, in characters
pub const MAX_CATEGORY_CHARS: usize = 100;

/// Validated sentiment dimension
#[derive(Debug, Clone, PartialEq)]
pub struct SentimentJudgment {
    pub sentiment: Sentiment,
    pub confidence: f32,
    pub reasoning: Option<String>,
}

/// Validated category dimension
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryJudgment {
    pub category: String,
    pub confidence: f32,
    pub reasoning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("field '{field}' must be a {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("unknown sentiment '{0}'")]
    UnknownSentiment(String),

    #[error("field '{field}' is {value}, expected a value in [0, 1]")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("category is empty")]
    EmptyCategory,

    #[error("category has {len} characters, limit is {max}")]
    CategoryTooLong { len: usize, max: usize },
}

impl From<ValidationError> for AttemptError {
    fn from(e: ValidationError) -> Self {
        AttemptError::Invalid(e.to_string())
    }
}

/// Validate a sentiment payload
///
/// The label is matched after trimming and lowercasing, so `"Negative"` or
/// `" positive "` are accepted and normalized. This leniency is deliberate;
/// any other label is rejected.
pub fn validate_sentiment(payload: &Value) -> Result<SentimentJudgment, ValidationError> {
    let obj = payload.as_object().ok_or(ValidationError::NotAnObject)?;

    let label = required_str(obj, "sentiment")?;
    let sentiment = label
        .parse::<Sentiment>()
        .map_err(|_| ValidationError::UnknownSentiment(label.to_string()))?;

    Ok(SentimentJudgment {
        sentiment,
        confidence: confidence(obj)?,
        reasoning: reasoning(obj),
    })
}

/// Validate a category payload
pub fn validate_category(payload: &Value) -> Result<CategoryJudgment, ValidationError> {
    let obj = payload.as_object().ok_or(ValidationError::NotAnObject)?;

    let category = required_str(obj, "category")?.trim();
    if category.is_empty() {
        return Err(ValidationError::EmptyCategory);
    }
    let len = category.chars().count();
    if len > MAX_CATEGORY_CHARS {
        return Err(ValidationError::CategoryTooLong {
            len,
            max: MAX_CATEGORY_CHARS,
        });
    }

    Ok(CategoryJudgment {
        category: category.to_string(),
        confidence: confidence(obj)?,
        reasoning: reasoning(obj),
    })
}

type Object = serde_json::Map<String, Value>;

fn required_str<'a>(obj: &'a Object, field: &'static str) -> Result<&'a str, ValidationError> {
    obj.get(field)
        .ok_or(ValidationError::MissingField(field))?
        .as_str()
        .ok_or(ValidationError::WrongType {
            field,
            expected: "string",
        })
}

fn confidence(obj: &Object) -> Result<f32, ValidationError> {
    let value = obj
        .get("confidence")
        .ok_or(ValidationError::MissingField("confidence"))?
        .as_f64()
        .ok_or(ValidationError::WrongType {
            field: "confidence",
            expected: "number",
        })?;

    if !(0.0..=1.0).contains(&value) {
        return Err(ValidationError::OutOfRange {
            field: "confidence",
            value,
        });
    }
    Ok(value as f32)
}

fn reasoning(obj: &Object) -> Option<String> {
    obj.get("reasoning")
        .and_then(Value::as_str)
        .map(str::to_string)
}
