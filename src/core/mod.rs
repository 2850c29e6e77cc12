pub mod error;
pub mod llm;
pub mod prompt;
pub mod rules;
pub mod types;
