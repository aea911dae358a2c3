//! Prompt construction for the generative-text provider

pub mod prompt;

pub use prompt::PromptBuilder;
