// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// BALLOT - QUALITY FILTERS
//
// Applied in fixed order to the enriched recommendations:
//   1. Keyword filter     – suspicious titles (bot checks, sybil traps)
//   2. Engagement filter  – sampled votes < ratio × space baseline
//
// Both work on a copy and return what they removed. Removal is global: a
// proposal dropped for one wallet is dropped from every wallet's bucket.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::config::DEFAULT_KEYWORD_TRIGGERS;
use crate::error::{BallotError, Result};
use crate::index::RemoteIndex;
use crate::types::{ChoiceInference, EnrichedRecommendations, ProposalId, SpaceId};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Default share of the space baseline a proposal must reach
pub const DEFAULT_ENGAGEMENT_RATIO: f64 = 0.3;

/// Default number of recently closed proposals averaged into a baseline
pub const DEFAULT_ENGAGEMENT_WINDOW: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RemovalReason {
    Keyword { trigger: String },
    LowEngagement { vote_count: u64, baseline: f64 },
}

/// One entry of a removal report, kept for operator review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovedProposal {
    pub title: String,
    pub space: SpaceId,
    pub reason: RemovalReason,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterOutcome {
    pub kept: EnrichedRecommendations,
    pub removed: BTreeMap<ProposalId, RemovedProposal>,
}

/// Every distinct proposal across all wallet buckets
fn distinct_proposals(enriched: &EnrichedRecommendations) -> BTreeMap<&ProposalId, &ChoiceInference> {
    enriched
        .values()
        .flat_map(|bucket| bucket.iter())
        .collect()
}

/// Copy of `enriched` without `drop`, every wallet key retained
fn without(
    enriched: &EnrichedRecommendations,
    drop: &BTreeSet<&ProposalId>,
) -> EnrichedRecommendations {
    enriched
        .iter()
        .map(|(wallet, bucket)| {
            let kept = bucket
                .iter()
                .filter(|(id, _)| !drop.contains(id))
                .map(|(id, inf)| (id.clone(), inf.clone()))
                .collect();
            (wallet.clone(), kept)
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct KeywordFilter {
    triggers: Vec<String>,
    case_sensitive: bool,
}

impl Default for KeywordFilter {
    fn default() -> Self {
        Self::new(DEFAULT_KEYWORD_TRIGGERS.iter().map(|s| s.to_string()), true)
    }
}

impl KeywordFilter {
    pub fn new<I: IntoIterator<Item = String>>(triggers: I, case_sensitive: bool) -> Self {
        Self {
            triggers: triggers.into_iter().collect(),
            case_sensitive,
        }
    }

    /// First trigger contained in `title`, if any
    pub fn matching_trigger(&self, title: &str) -> Option<&str> {
        if self.case_sensitive {
            self.triggers
                .iter()
                .find(|t| title.contains(t.as_str()))
                .map(String::as_str)
        } else {
            let lowered = title.to_lowercase();
            self.triggers
                .iter()
                .find(|t| lowered.contains(&t.to_lowercase()))
                .map(String::as_str)
        }
    }

    pub fn apply(&self, enriched: &EnrichedRecommendations) -> FilterOutcome {
        let mut removed = BTreeMap::new();
        for (id, inference) in distinct_proposals(enriched) {
            if let Some(trigger) = self.matching_trigger(&inference.title) {
                removed.insert(
                    id.clone(),
                    RemovedProposal {
                        title: inference.title.clone(),
                        space: inference.space.clone(),
                        reason: RemovalReason::Keyword {
                            trigger: trigger.to_string(),
                        },
                    },
                );
            }
        }

        for (id, entry) in &removed {
            info!("Keyword filter removed {} ({:?})", id, entry.title);
        }

        let kept = {
            let drop: BTreeSet<&ProposalId> = removed.keys().collect();
            without(enriched, &drop)
        };
        FilterOutcome { kept, removed }
    }
}

pub struct EngagementFilter<'a, I: RemoteIndex> {
    index: &'a I,
    ratio: f64,
    window: usize,
    /// space → average votes of its recent closed proposals
    baselines: BTreeMap<SpaceId, Option<f64>>,
}

impl<'a, I: RemoteIndex> EngagementFilter<'a, I> {
    pub fn new(index: &'a I, ratio: f64, window: usize) -> Self {
        Self {
            index,
            ratio,
            window,
            baselines: BTreeMap::new(),
        }
    }

    /// Average vote count of the space's most recently closed proposals.
    ///
    /// `None` when the space has no closed proposals or they drew no votes.
    /// Computed once per space for the lifetime of the filter.
    pub fn baseline(&mut self, space: &str) -> Result<Option<f64>> {
        if let Some(cached) = self.baselines.get(space) {
            return Ok(*cached);
        }

        let closed = self.index.closed_proposals(space, self.window)?;
        let mut total: u64 = 0;
        for proposal in &closed {
            total += proposal.votes.ok_or_else(|| {
                BallotError::malformed(format!("closed proposal {} has no vote count", proposal.id))
            })?;
        }

        let baseline = if closed.is_empty() || total == 0 {
            None
        } else {
            Some(total as f64 / closed.len() as f64)
        };

        debug!(
            "{}: baseline {:?} over {} closed proposal(s)",
            space,
            baseline,
            closed.len()
        );
        self.baselines.insert(space.to_string(), baseline);
        Ok(baseline)
    }

    pub fn is_under_engaged(&self, vote_count: u64, baseline: f64) -> bool {
        (vote_count as f64) < self.ratio * baseline
    }

    pub fn apply(&mut self, enriched: &EnrichedRecommendations) -> Result<FilterOutcome> {
        let mut removed = BTreeMap::new();

        for (id, inference) in distinct_proposals(enriched) {
            let Some(baseline) = self.baseline(&inference.space)? else {
                warn!(
                    "{}: no engagement baseline for {}, kept",
                    id, inference.space
                );
                continue;
            };

            if self.is_under_engaged(inference.vote_count, baseline) {
                info!(
                    "Engagement filter removed {} ({} votes vs baseline {:.1} in {})",
                    id, inference.vote_count, baseline, inference.space
                );
                removed.insert(
                    id.clone(),
                    RemovedProposal {
                        title: inference.title.clone(),
                        space: inference.space.clone(),
                        reason: RemovalReason::LowEngagement {
                            vote_count: inference.vote_count,
                            baseline,
                        },
                    },
                );
            }
        }

        let kept = {
            let drop: BTreeSet<&ProposalId> = removed.keys().collect();
            without(enriched, &drop)
        };
        Ok(FilterOutcome { kept, removed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::fixtures::proposal;
    use crate::index::MemoryIndex;
    use crate::types::ProposalState;

    fn inference(id: &str, title: &str, space: &str, vote_count: u64) -> ChoiceInference {
        ChoiceInference {
            id: id.to_string(),
            title: title.to_string(),
            pop_choice: Some(1),
            created: 0,
            vote_count,
            weighted_vote: false,
            voting_type: "single-choice".to_string(),
            space: space.to_string(),
            tally: BTreeMap::new(),
            skipped: 0,
        }
    }

    fn enriched(entries: Vec<(&str, Vec<&ChoiceInference>)>) -> EnrichedRecommendations {
        entries
            .into_iter()
            .map(|(wallet, infs)| {
                (
                    wallet.to_string(),
                    infs.into_iter().map(|i| (i.id.clone(), i.clone())).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_keyword_filter_removes_globally() {
        let bot = inference("p1", "Sybil check: Do not vote", "x.eth", 100);
        let good = inference("p2", "Treasury diversification", "x.eth", 100);
        let input = enriched(vec![("0xa", vec![&bot, &good]), ("0xb", vec![&bot]), ("0xc", vec![])]);

        let outcome = KeywordFilter::default().apply(&input);

        assert_eq!(outcome.removed.len(), 1);
        assert_eq!(outcome.removed["p1"].title, "Sybil check: Do not vote");
        assert!(outcome.kept.values().all(|bucket| !bucket.contains_key("p1")));
        assert!(outcome.kept["0xa"].contains_key("p2"));
        assert!(outcome.kept["0xb"].is_empty());
        assert!(outcome.kept.contains_key("0xc"));
        // input untouched
        assert!(input["0xb"].contains_key("p1"));
    }

    #[test]
    fn test_keyword_filter_is_case_sensitive_by_default() {
        let p = inference("p1", "Bot Check: please don't vote", "x.eth", 100);
        let input = enriched(vec![("0xa", vec![&p]), ("0xb", vec![&p])]);

        let exact = KeywordFilter::new(vec!["bot".to_string()], true).apply(&input);
        assert!(exact.removed.is_empty());
        assert_eq!(exact.kept, input);

        let capital = KeywordFilter::new(vec!["Bot".to_string()], true).apply(&input);
        assert!(capital.removed.contains_key("p1"));

        let relaxed = KeywordFilter::new(vec!["bot".to_string()], false).apply(&input);
        assert!(relaxed.removed.contains_key("p1"));
        assert!(relaxed.kept["0xa"].is_empty());
        assert!(relaxed.kept["0xb"].is_empty());
    }

    #[test]
    fn test_keyword_filter_reports_trigger() {
        let filter = KeywordFilter::default();
        assert_eq!(filter.matching_trigger("Are you human?"), Some("human"));
        assert_eq!(filter.matching_trigger("Upgrade the robot arm"), Some("bot"));
        assert_eq!(filter.matching_trigger("Budget 2025"), None);
    }

    fn closed(id: &str, space: &str, created: i64, votes: u64) -> crate::types::Proposal {
        let mut p = proposal(id, space, ProposalState::Closed, created);
        p.votes = Some(votes);
        p
    }

    #[test]
    fn test_engagement_filter_threshold() {
        let mut index = MemoryIndex::new();
        index
            .add_proposal(closed("c1", "x.eth", 10, 80))
            .add_proposal(closed("c2", "x.eth", 20, 120))
            .add_proposal(closed("c0", "x.eth", 1, 10_000));

        let low = inference("p1", "Low", "x.eth", 10);
        let ok = inference("p2", "Fine", "x.eth", 40);
        let edge = inference("p3", "Edge", "x.eth", 30);
        let input = enriched(vec![("0xa", vec![&low, &ok, &edge]), ("0xb", vec![&low])]);

        let mut filter = EngagementFilter::new(&index, DEFAULT_ENGAGEMENT_RATIO, DEFAULT_ENGAGEMENT_WINDOW);
        let outcome = filter.apply(&input).unwrap();

        // baseline = (80 + 120) / 2 = 100, the oldest closed proposal is outside the window
        assert_eq!(outcome.removed.len(), 1);
        match &outcome.removed["p1"].reason {
            RemovalReason::LowEngagement { vote_count, baseline } => {
                assert_eq!(*vote_count, 10);
                assert_eq!(*baseline, 100.0);
            }
            other => panic!("unexpected reason {:?}", other),
        }
        assert!(outcome.kept["0xa"].contains_key("p2"));
        assert!(outcome.kept["0xa"].contains_key("p3"));
        assert!(outcome.kept["0xb"].is_empty());
    }

    #[test]
    fn test_engagement_baseline_memoized_per_space() {
        let mut index = MemoryIndex::new();
        index.add_proposal(closed("c1", "x.eth", 10, 100));

        let a = inference("p1", "A", "x.eth", 90);
        let b = inference("p2", "B", "x.eth", 90);
        let input = enriched(vec![("0xa", vec![&a, &b]), ("0xb", vec![&a, &b])]);

        let mut filter = EngagementFilter::new(&index, 0.3, 2);
        filter.apply(&input).unwrap();
        assert_eq!(index.calls(), 1);
    }

    #[test]
    fn test_engagement_without_baseline_keeps_proposal() {
        let index = MemoryIndex::new();
        let p = inference("p1", "Fresh space", "new.eth", 1);
        let input = enriched(vec![("0xa", vec![&p])]);

        let mut filter = EngagementFilter::new(&index, 0.3, 2);
        let outcome = filter.apply(&input).unwrap();
        assert!(outcome.removed.is_empty());
        assert_eq!(outcome.kept, input);
    }

    #[test]
    fn test_engagement_missing_vote_count_is_fatal() {
        let mut index = MemoryIndex::new();
        index.add_proposal(proposal("c1", "x.eth", ProposalState::Closed, 10));
        let p = inference("p1", "A", "x.eth", 1);
        let input = enriched(vec![("0xa", vec![&p])]);

        let mut filter = EngagementFilter::new(&index, 0.3, 2);
        assert!(matches!(
            filter.apply(&input),
            Err(BallotError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_filters_on_empty_input() {
        let input = EnrichedRecommendations::new();
        let outcome = KeywordFilter::default().apply(&input);
        assert!(outcome.kept.is_empty() && outcome.removed.is_empty());

        let index = MemoryIndex::new();
        let mut filter = EngagementFilter::new(&index, 0.3, 2);
        let outcome = filter.apply(&input).unwrap();
        assert!(outcome.kept.is_empty() && outcome.removed.is_empty());
        assert_eq!(index.calls(), 0);
    }
}
