//! Repair of failing steps through an external oracle.
//!
//! - `oracle`: the [`RepairOracle`] seam, the scripted test oracle and
//!   the [`HealClient`] that builds prompts and absorbs oracle failures
//! - `interpreter`: maps oracle output onto typed [`crate::ActionCall`]s
//! - `client` (feature `llm`): OpenAI-compatible HTTP oracle

#[cfg(feature = "llm")]
mod client;
mod interpreter;
mod oracle;

#[cfg(feature = "llm")]
pub use client::{ChatMessage, ChatRequest, ChatResponse, ChatResponseChoice, LlmOracle, Role, Usage};
pub use interpreter::interpret;
pub use oracle::{
    strip_code_fences, HealClient, ModelConfig, RepairOracle, ScriptedOracle, DEFAULT_ELEMENT_CAP,
    SYSTEM_PROMPT,
};
