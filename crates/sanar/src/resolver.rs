//! Resolution executor for described steps.
//!
//! `resolve_and_act(kind, target, value, timeout)` tries, in order, the
//! session cache, the persisted heal store, the semantic candidates and
//! the scored heuristic candidates. The first locator whose action
//! succeeds wins and is cached (and persisted unless disabled).

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, info, warn};

use crate::action::{ActionKind, HealableAction};
use crate::candidate::{generate_candidates, SelectorCandidate};
use crate::driver::BrowserSession;
use crate::heal_store::{heal_key, HealDescriptor, HealStore};
use crate::locator::Locator;
use crate::scorer::score_candidates;
use crate::wait::{LoadState, POST_CLICK_IDLE_CAP_MS};

/// Where a working locator came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolutionSource {
    /// In-memory session cache
    Cache,
    /// Persisted heal store
    Store,
    /// Semantic (label/role) candidate
    Semantic,
    /// Scored heuristic candidate
    Heuristic,
}

impl fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Cache => "cache",
            Self::Store => "store",
            Self::Semantic => "semantic",
            Self::Heuristic => "heuristic",
        };
        f.write_str(name)
    }
}

/// A successful resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// The locator the action succeeded on
    pub locator: Locator,
    /// Which stage produced it
    pub source: ResolutionSource,
}

/// Resolves described steps to working locators
#[derive(Debug, Default)]
pub struct Resolver {
    cache: HashMap<String, Locator>,
    store: HealStore,
    persist_heals: bool,
}

impl Resolver {
    /// Create a resolver backed by `store`, persisting heals
    #[must_use]
    pub fn new(store: HealStore) -> Self {
        Self {
            cache: HashMap::new(),
            store,
            persist_heals: true,
        }
    }

    /// Enable or disable writing heals to the store
    #[must_use]
    pub fn with_persistence(mut self, persist: bool) -> Self {
        self.persist_heals = persist;
        self
    }

    /// The heal store
    #[must_use]
    pub const fn store(&self) -> &HealStore {
        &self.store
    }

    /// Mutable heal store
    pub fn store_mut(&mut self) -> &mut HealStore {
        &mut self.store
    }

    /// Cached locator for `(kind, target)`
    #[must_use]
    pub fn cached(&self, kind: ActionKind, target: &str) -> Option<&Locator> {
        self.cache.get(&heal_key(kind, target))
    }

    /// Resolve and perform; `false` when every stage is exhausted
    pub async fn resolve_and_act<S: BrowserSession + ?Sized>(
        &mut self,
        session: &S,
        kind: ActionKind,
        target: &str,
        value: Option<&str>,
        timeout_ms: u64,
    ) -> bool {
        self.resolve(session, kind, target, value, timeout_ms)
            .await
            .is_some()
    }

    /// Resolve and perform, reporting which locator worked
    pub async fn resolve<S: BrowserSession + ?Sized>(
        &mut self,
        session: &S,
        kind: ActionKind,
        target: &str,
        value: Option<&str>,
        timeout_ms: u64,
    ) -> Option<Resolution> {
        let key = heal_key(kind, target);
        let action = kind.to_action(value);

        if let Some(locator) = self.cache.get(&key).cloned() {
            if try_act(session, &locator, &action, timeout_ms).await {
                debug!(key = %key, locator = %locator, "Resolved from session cache");
                return Some(Resolution {
                    locator,
                    source: ResolutionSource::Cache,
                });
            }
            self.cache.remove(&key);
        }

        if let Some(descriptor) = self.store.get(kind, target).cloned() {
            let locator = descriptor.to_locator();
            if try_act(session, &locator, &action, timeout_ms).await {
                info!(key = %key, locator = %locator, "Resolved from heal store");
                self.cache.insert(key, locator.clone());
                return Some(Resolution {
                    locator,
                    source: ResolutionSource::Store,
                });
            }
            debug!(key = %key, ?descriptor, "Stored heal no longer works");
        }

        let candidates = generate_candidates(target, kind);
        for candidate in &candidates.semantic {
            let found = session.count(&candidate.locator).await.unwrap_or(0);
            if found == 0 {
                continue;
            }
            if try_act(session, &candidate.locator, &action, timeout_ms).await {
                return Some(self.succeed(kind, target, candidate, ResolutionSource::Semantic));
            }
        }

        for scored in score_candidates(session, &candidates.heuristic).await {
            if try_act(session, &scored.candidate.locator, &action, timeout_ms).await {
                return Some(self.succeed(
                    kind,
                    target,
                    &scored.candidate,
                    ResolutionSource::Heuristic,
                ));
            }
        }

        warn!(
            key = %key,
            candidates = candidates.len(),
            "No candidate resolved the target"
        );
        None
    }

    fn succeed(
        &mut self,
        kind: ActionKind,
        target: &str,
        candidate: &SelectorCandidate,
        source: ResolutionSource,
    ) -> Resolution {
        info!(
            action = %kind,
            target,
            candidate = %candidate,
            source = %source,
            "Target healed"
        );
        self.cache
            .insert(heal_key(kind, target), candidate.locator.clone());
        if self.persist_heals {
            if let Some(descriptor) = candidate.descriptor() {
                self.persist(kind, target, descriptor);
            }
        }
        Resolution {
            locator: candidate.locator.clone(),
            source,
        }
    }

    fn persist(&mut self, kind: ActionKind, target: &str, descriptor: HealDescriptor) {
        if let Err(e) = self.store.record(kind, target, descriptor) {
            warn!(action = %kind, target, error = %e, "Failed to persist heal");
        }
    }
}

/// One attempt of `action` on `locator`; clicks then absorb navigation
async fn try_act<S: BrowserSession + ?Sized>(
    session: &S,
    locator: &Locator,
    action: &HealableAction,
    timeout_ms: u64,
) -> bool {
    if let Err(e) = session.perform(locator, action, timeout_ms).await {
        debug!(locator = %locator, error = %e, "Candidate action failed");
        return false;
    }
    if matches!(action, HealableAction::Click) {
        let idle = timeout_ms.min(POST_CLICK_IDLE_CAP_MS);
        if let Err(e) = session.wait_for_load_state(LoadState::NetworkIdle, idle).await {
            debug!(error = %e, "Network did not settle after click");
        }
    }
    true
}
