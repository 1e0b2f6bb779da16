//! AI integration for the advisor flows.
//!
//! This module provides:
//! - AI provider abstraction (Gemini, Anthropic, OpenAI)
//! - Prompt template system with Handlebars
//! - Provider registry for picking a configured provider

pub mod prompts;
pub mod provider;
pub mod registry;

// Provider implementations
pub mod anthropic;
pub mod gemini;
pub mod openai;

// Re-exports
pub use prompts::{PromptManager, PromptTemplate};
pub use provider::{
    parse_ai_response, AIMessage, AIProvider, AIResponse, AIRole, GenerateOptions,
    MessageBuilder, ResponseSchema, TokenUsage,
};
pub use registry::ProviderRegistry;
