//! LLM-backed agents.

pub mod heist_adapter;
pub mod ollama;
pub mod parse;
pub mod preflight;

pub use heist_adapter::LlmHeistAgent;
pub use ollama::{ChatClient, ChatMessage, OllamaClient, OllamaError};
pub use parse::{parse_response, ParseStrategy, PARSE_STRATEGIES};
pub use preflight::{preflight_llm_agents, PreflightError};
