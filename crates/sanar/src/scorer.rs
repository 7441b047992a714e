//! Candidate scoring against the live DOM.
//!
//! Each candidate is counted once. Zero-match candidates (and candidates
//! whose query fails) are discarded; the rest are ordered by fewest
//! matches, then strategy priority, then generation order.

use std::cmp::Ordering;

use tracing::{debug, trace};

use crate::candidate::SelectorCandidate;
use crate::driver::BrowserSession;

/// A candidate with its live match count
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredCandidate {
    /// The candidate
    pub candidate: SelectorCandidate,
    /// Elements matched at scoring time
    pub matches: usize,
    /// Position in generation order
    pub order: usize,
}

/// Ordering used to try candidates: best first
#[must_use]
pub fn compare(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    a.matches
        .cmp(&b.matches)
        .then_with(|| b.candidate.priority.cmp(&a.candidate.priority))
        .then_with(|| a.order.cmp(&b.order))
}

/// Drop zero-match entries and sort best first
#[must_use]
pub fn rank(mut scored: Vec<ScoredCandidate>) -> Vec<ScoredCandidate> {
    scored.retain(|s| s.matches > 0);
    scored.sort_by(compare);
    scored
}

/// Count every candidate once and return them ranked
pub async fn score_candidates<S: BrowserSession + ?Sized>(
    session: &S,
    candidates: &[SelectorCandidate],
) -> Vec<ScoredCandidate> {
    let mut scored = Vec::with_capacity(candidates.len());
    for (order, candidate) in candidates.iter().enumerate() {
        match session.count(&candidate.locator).await {
            Ok(matches) => {
                trace!(candidate = %candidate, matches, "Candidate counted");
                scored.push(ScoredCandidate {
                    candidate: candidate.clone(),
                    matches,
                    order,
                });
            }
            Err(e) => debug!(candidate = %candidate, error = %e, "Candidate query failed"),
        }
    }
    let ranked = rank(scored);
    debug!(
        candidates = candidates.len(),
        viable = ranked.len(),
        best = ranked.first().map(|s| s.candidate.to_string()),
        "Candidates scored"
    );
    ranked
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::candidate::Strategy;
    use crate::locator::Locator;
    use crate::mock::{MockElement, MockSession};
    use proptest::prelude::*;

    fn scored(strategy: Strategy, selector: &str, matches: usize, order: usize) -> ScoredCandidate {
        ScoredCandidate {
            candidate: SelectorCandidate::new(strategy, Locator::new(selector)),
            matches,
            order,
        }
    }

    mod ordering_tests {
        use super::*;

        #[test]
        fn test_unique_beats_ambiguous_regardless_of_order() {
            let ranked = rank(vec![
                scored(Strategy::Label, "a", 3, 0),
                scored(Strategy::Generic, "b", 1, 1),
            ]);
            assert_eq!(ranked[0].matches, 1);
        }

        #[test]
        fn test_rank_breaks_count_ties() {
            let ranked = rank(vec![
                scored(Strategy::Generic, "a", 1, 0),
                scored(Strategy::Css, "b", 1, 1),
                scored(Strategy::Text, "c", 1, 2),
            ]);
            let strategies: Vec<Strategy> = ranked.iter().map(|s| s.candidate.strategy).collect();
            assert_eq!(strategies, vec![Strategy::Css, Strategy::Text, Strategy::Generic]);
        }

        #[test]
        fn test_generation_order_breaks_full_ties() {
            let ranked = rank(vec![
                scored(Strategy::Css, "second", 2, 1),
                scored(Strategy::Css, "first", 2, 0),
            ]);
            assert_eq!(ranked[0].order, 0);
        }

        #[test]
        fn test_zero_matches_discarded() {
            let ranked = rank(vec![scored(Strategy::Label, "a", 0, 0)]);
            assert!(ranked.is_empty());
        }

        proptest! {
            #[test]
            fn prop_unique_always_first(
                counts in proptest::collection::vec(2usize..10, 0..8),
                unique_at in 0usize..8,
                strategies in proptest::collection::vec(0u8..5, 9),
            ) {
                let strategy = |i: usize| match strategies[i % strategies.len()] {
                    0 => Strategy::Label,
                    1 => Strategy::Role,
                    2 => Strategy::Css,
                    3 => Strategy::Text,
                    _ => Strategy::Generic,
                };
                let unique_at = unique_at.min(counts.len());
                let mut all: Vec<ScoredCandidate> = counts
                    .iter()
                    .enumerate()
                    .map(|(i, &n)| scored(strategy(i), "many", n, i))
                    .collect();
                all.insert(unique_at, scored(strategy(8), "one", 1, unique_at));
                let ranked = rank(all);
                prop_assert_eq!(ranked[0].matches, 1);
                for pair in ranked.windows(2) {
                    prop_assert!(compare(&pair[0], &pair[1]) != Ordering::Greater);
                }
            }
        }
    }

    mod live_tests {
        use super::*;

        #[tokio::test]
        async fn test_score_against_mock_dom() {
            let session = MockSession::new()
                .with_element(MockElement::new("input").attr("name", "username"))
                .with_element(MockElement::new("input"))
                .with_element(MockElement::new("input"));
            let candidates = vec![
                SelectorCandidate::new(Strategy::Css, Locator::new("input")),
                SelectorCandidate::new(Strategy::Css, Locator::new("#missing")),
                SelectorCandidate::new(Strategy::Css, Locator::new("[name=\"username\"]")),
                SelectorCandidate::new(Strategy::Css, Locator::new("div > p")),
            ];
            let ranked = score_candidates(&session, &candidates).await;
            assert_eq!(ranked.len(), 2);
            assert_eq!(ranked[0].candidate.locator, Locator::new("[name=\"username\"]"));
            assert_eq!(ranked[1].matches, 3);
            assert_eq!(session.count_calls(), 4);
        }
    }
}
