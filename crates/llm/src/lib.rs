//! Proposal-source collaborator: an OpenAI-compatible chat-completions
//! client.
//!
//! Implements [`sqlshadow_core::collaborators::ProposalSource`] against any
//! endpoint speaking the `/chat/completions` protocol (OpenAI, DeepSeek,
//! Ollama, vLLM, ...). The client is single-shot per attempt: the
//! orchestrator owns the retry loop and feeds rejection feedback back in
//! through the prompt.

pub mod client;
pub mod parse;
pub mod prompt;

pub use client::{LlmConfig, OpenAiChatClient};
