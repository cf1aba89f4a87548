//! Prompt templates for the two classification dimensions

use crate::client::{Prompt, PromptKind};

const SYSTEM: &str = "You are an expert at analyzing customer feedback. \
Always respond with valid JSON only, no additional text.";

/// Categories suggested to the model; it may still name its own
pub const SUGGESTED_CATEGORIES: &[&str] = &[
    "Product Quality",
    "Customer Service",
    "Delivery",
    "Pricing",
    "User Experience",
    "Technical Issues",
    "Feature Request",
];

/// Sentiment prompt for `text`
pub fn sentiment(text: &str) -> Prompt {
    let user = format!(
        "Classify the sentiment of this customer feedback.\n\
         Reply with ONLY a JSON object of the form:\n\
         {{\"sentiment\": \"positive\" | \"neutral\" | \"negative\", \"confidence\": <number 0.0-1.0>, \"reasoning\": \"<one sentence>\"}}\n\n\
         Feedback: \"{text}\""
    );
    Prompt {
        kind: PromptKind::Sentiment,
        system: SYSTEM.to_string(),
        user,
    }
}

/// Category prompt for `text`
pub fn category(text: &str) -> Prompt {
    let user = format!(
        "Assign this customer feedback to one main category, such as {}, \
         or a more specific category if none fits.\n\
         Reply with ONLY a JSON object of the form:\n\
         {{\"category\": \"<category name>\", \"confidence\": <number 0.0-1.0>, \"reasoning\": \"<one sentence>\"}}\n\n\
         Feedback: \"{text}\"",
        SUGGESTED_CATEGORIES.join(", ")
    );
    Prompt {
        kind: PromptKind::Category,
        system: SYSTEM.to_string(),
        user,
    }
}
