//! Repair Oracle seam and the heal client built on it.
//!
//! [`RepairOracle`] is the text-completion collaborator: `(system, user,
//! model) -> text`. [`HealClient`] owns the prompt, trims the snapshot to a
//! bounded element count, strips markdown fences from the answer and turns
//! every oracle failure into "no fix available".

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::dom::DomSnapshot;
use crate::result::{SanarError, SanarResult};

/// Elements included in the repair prompt by default
pub const DEFAULT_ELEMENT_CAP: usize = 50;

/// Fixed instruction sent with every repair request
pub const SYSTEM_PROMPT: &str = "You repair failing Playwright test steps. \
Return only the corrected Playwright code, no prose, no explanations. \
Write one statement per line in the form `await page.<locator>.<action>(...);` \
using getByRole, getByLabel, getByText, getByPlaceholder, getByTestId, locator, \
nth, first, last and filter, with the actions click, fill, check, selectOption, \
hover or page.goto. Alternatively return a JSON object \
{\"action\",\"locatorStrategy\",\"role\",\"name\",\"selector\",\"value\"}.";

/// Model parameters forwarded to the oracle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Model identifier
    pub model: String,
    /// Sampling temperature (0.0 = deterministic)
    pub temperature: f64,
    /// Maximum tokens to generate
    pub max_tokens: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.0,
            max_tokens: 512,
        }
    }
}

/// Text-completion collaborator used for repairs
#[async_trait]
pub trait RepairOracle: Send + Sync {
    /// Complete `user` under the `system` instruction
    async fn complete(&self, system: &str, user: &str, model: &ModelConfig) -> SanarResult<String>;
}

/// Oracle that replays canned answers in order.
///
/// Once the script is exhausted it answers with an empty string, which the
/// heal client treats as "no fix". Every prompt is recorded.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    replies: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<(String, String)>>,
}

impl ScriptedOracle {
    /// Oracle with no answers
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful answer
    #[must_use]
    pub fn with_reply(self, reply: impl Into<String>) -> Self {
        self.lock_replies().push_back(Ok(reply.into()));
        self
    }

    /// Queue a transport failure
    #[must_use]
    pub fn with_failure(self, message: impl Into<String>) -> Self {
        self.lock_replies().push_back(Err(message.into()));
        self
    }

    /// `(system, user)` prompts received so far
    #[must_use]
    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn lock_replies(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<String, String>>> {
        self.replies.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RepairOracle for ScriptedOracle {
    async fn complete(&self, system: &str, user: &str, _model: &ModelConfig) -> SanarResult<String> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((system.to_string(), user.to_string()));
        match self.lock_replies().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(SanarError::oracle(message)),
            None => Ok(String::new()),
        }
    }
}

/// Remove surrounding markdown code fences, keeping the first fenced block
#[must_use]
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed.to_string();
    };
    let after = &trimmed[start + 3..];
    let body = match after.find('\n') {
        Some(newline) => &after[newline + 1..],
        None => after,
    };
    let body = body.find("```").map_or(body, |end| &body[..end]);
    body.trim().to_string()
}

/// Repair client: prompt construction plus failure absorption
#[derive(Clone)]
pub struct HealClient {
    oracle: std::sync::Arc<dyn RepairOracle>,
    model: ModelConfig,
    element_cap: usize,
}

impl std::fmt::Debug for HealClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealClient")
            .field("model", &self.model)
            .field("element_cap", &self.element_cap)
            .finish_non_exhaustive()
    }
}

impl HealClient {
    /// Client over `oracle` with default model settings
    #[must_use]
    pub fn new(oracle: std::sync::Arc<dyn RepairOracle>) -> Self {
        Self {
            oracle,
            model: ModelConfig::default(),
            element_cap: DEFAULT_ELEMENT_CAP,
        }
    }

    /// Set the model parameters
    #[must_use]
    pub fn with_model(mut self, model: ModelConfig) -> Self {
        self.model = model;
        self
    }

    /// Set how many snapshot elements go into the prompt
    #[must_use]
    pub const fn with_element_cap(mut self, cap: usize) -> Self {
        self.element_cap = cap;
        self
    }

    /// Model parameters in use
    #[must_use]
    pub const fn model(&self) -> &ModelConfig {
        &self.model
    }

    /// The user message for one repair request
    #[must_use]
    pub fn user_prompt(&self, snapshot: &DomSnapshot, error: &str, failed_step: &str) -> String {
        let shown = snapshot.elements.len().min(self.element_cap);
        let mut prompt = format!(
            "Failing step:\n{failed_step}\n\nError:\n{error}\n\nCurrent URL: {}\n\n",
            snapshot.url
        );
        if let Some(extraction_error) = &snapshot.error {
            prompt.push_str(&format!("DOM extraction failed: {extraction_error}\n\n"));
        }
        prompt.push_str(&format!(
            "Interactive elements ({shown} of {}):\n",
            snapshot.elements.len()
        ));
        for element in snapshot.elements.iter().take(shown) {
            match serde_json::to_string(element) {
                Ok(line) => {
                    prompt.push_str(&line);
                    prompt.push('\n');
                }
                Err(e) => debug!(error = %e, "Skipping unserializable element"),
            }
        }
        prompt
    }

    /// Ask the oracle for a corrected step; `None` when no fix is available
    pub async fn heal(
        &self,
        snapshot: &DomSnapshot,
        error: &str,
        failed_step: &str,
    ) -> Option<String> {
        let user = self.user_prompt(snapshot, error, failed_step);
        match self.oracle.complete(SYSTEM_PROMPT, &user, &self.model).await {
            Ok(answer) => {
                let code = strip_code_fences(&answer);
                if code.is_empty() {
                    info!(step = failed_step, "Repair oracle returned no fix");
                    None
                } else {
                    debug!(step = failed_step, code = %code, "Repair oracle proposed a fix");
                    Some(code)
                }
            }
            Err(e) => {
                warn!(step = failed_step, error = %e, "Repair oracle unavailable");
                None
            }
        }
    }
}
