//! Prompt and reply strings
//!
//! Every user-visible string the engine emits lives here: the intake
//! questions, the answer-prompt scaffolding, and the fixed fallback replies.
//! Deployments can override any of them from a TOML file.
//!
//! # Example Override File
//!
//! ```toml
//! greeting = "Welcome to the clinic assistant. What is your name?"
//! ask_age = "And your age?"
//! reply_quota = "The assistant is busy. Please retry in a few minutes."
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

/// The complete set of strings the chat engine speaks with.
///
/// Fields omitted from an override file keep their built-in defaults.
/// `closing` may contain a `{name}` placeholder, filled with the
/// patient's collected name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptSet {
    /// First reply of a brand-new session; must ask for the name.
    pub greeting: String,
    pub ask_age: String,
    pub ask_weight: String,
    pub ask_height: String,
    pub ask_blood_group: String,
    /// Re-prompt when the age input does not parse as a whole number.
    pub invalid_age: String,
    /// Sent once the profile is complete. `{name}` is interpolated.
    pub closing: String,
    /// Leading instruction of the generation prompt.
    pub answer_instruction: String,
    /// Trailing instruction of the generation prompt.
    pub answer_style: String,
    /// Reply when retrieval finds nothing to ground an answer on.
    pub reply_no_grounding: String,
    /// Reply when the model returns blank text.
    pub reply_blank_answer: String,
    /// Reply when the model provider reports a quota/rate limit.
    pub reply_quota: String,
    /// Reply on any other generation failure.
    pub reply_generation_failed: String,
    /// Reply when the retrieval layer itself fails.
    pub reply_retrieval_down: String,
    /// Confirmation returned by the reset endpoint.
    pub reply_reset: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            greeting: builtin::GREETING.to_string(),
            ask_age: builtin::ASK_AGE.to_string(),
            ask_weight: builtin::ASK_WEIGHT.to_string(),
            ask_height: builtin::ASK_HEIGHT.to_string(),
            ask_blood_group: builtin::ASK_BLOOD_GROUP.to_string(),
            invalid_age: builtin::INVALID_AGE.to_string(),
            closing: builtin::CLOSING.to_string(),
            answer_instruction: builtin::ANSWER_INSTRUCTION.to_string(),
            answer_style: builtin::ANSWER_STYLE.to_string(),
            reply_no_grounding: builtin::REPLY_NO_GROUNDING.to_string(),
            reply_blank_answer: builtin::REPLY_BLANK_ANSWER.to_string(),
            reply_quota: builtin::REPLY_QUOTA.to_string(),
            reply_generation_failed: builtin::REPLY_GENERATION_FAILED.to_string(),
            reply_retrieval_down: builtin::REPLY_RETRIEVAL_DOWN.to_string(),
            reply_reset: builtin::REPLY_RESET.to_string(),
        }
    }
}

impl PromptSet {
    /// Load overrides from a TOML file on top of the built-in defaults.
    pub fn from_file(path: &Path) -> Result<Self, PromptError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| PromptError::Io(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse a TOML override string on top of the built-in defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, PromptError> {
        toml::from_str(content).map_err(|e| PromptError::Parse(e.to_string()))
    }

    /// The closing prompt with the patient's name filled in.
    pub fn closing_for(&self, name: &str) -> String {
        self.closing.replace("{name}", name)
    }
}

/// Errors from prompt loading
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Built-in defaults used when no override file is configured.
pub mod builtin {
    pub const GREETING: &str =
        "Hello! I'm MediQ, your medical assistant. Before we begin, I need a few details. What is your name?";

    pub const ASK_AGE: &str = "Nice to meet you! How old are you?";

    pub const ASK_WEIGHT: &str = "What is your weight (in kg)?";

    pub const ASK_HEIGHT: &str = "What is your height (in cm)?";

    pub const ASK_BLOOD_GROUP: &str = "What is your blood group?";

    pub const INVALID_AGE: &str = "Please enter a valid age.";

    pub const CLOSING: &str =
        "Thank you, {name}! Your details are saved. You can now ask me any medical question.";

    pub const ANSWER_INSTRUCTION: &str =
        "You are a medical AI assistant. Use the retrieved context below to answer the question concisely.";

    pub const ANSWER_STYLE: &str = "Answer in 2-3 sentences:";

    pub const REPLY_NO_GROUNDING: &str = "I don't know, sorry.";

    pub const REPLY_BLANK_ANSWER: &str = "I'm sorry, I can't answer that.";

    pub const REPLY_QUOTA: &str =
        "We're experiencing high demand right now. Please try again later.";

    pub const REPLY_GENERATION_FAILED: &str =
        "Something went wrong while generating a response. Please try again.";

    pub const REPLY_RETRIEVAL_DOWN: &str =
        "Sorry, I'm currently unable to process your request.";

    pub const REPLY_RESET: &str =
        "Conversation reset. Your details and chat history have been cleared.";
}
