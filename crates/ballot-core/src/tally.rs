// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// BALLOT - TALLY INFERENCE ENGINE
//
// Infers the crowd-favoured choice of a proposal from its most recent votes.
//
// - A proposal is "weighted" if ANY sampled ballot is not a plain integer.
//   Weighted tallies collapse each weight map to its heaviest choice and
//   skip plain integer ballots.
// - Out-of-range and malformed ballots are logged and skipped; they never
//   abort the tally.
// - Below `min_sample` sampled votes there is no leading choice.
// - Ties (in a weight map or between counters): lowest choice index wins.
//   Counters live in a BTreeMap so this holds regardless of input order.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::error::Result;
use crate::index::RemoteIndex;
use crate::types::{ChoiceInference, Proposal, ProposalId, Vote, VoteChoice};
use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet};

/// Minimum sampled votes before a leading choice is inferred
pub const MIN_SAMPLE_VOTES: u64 = 50;

/// Most recent votes fetched per proposal
pub const VOTE_SAMPLE_LIMIT: usize = 1000;

/// Parse a weight map's string keys into choice indices.
///
/// Fails on any key that is not a positive integer.
pub fn normalize_weights(raw: &BTreeMap<String, f64>) -> std::result::Result<BTreeMap<u32, f64>, String> {
    let mut out = BTreeMap::new();
    for (key, weight) in raw {
        let idx: u32 = key
            .trim()
            .parse()
            .map_err(|_| format!("non-numeric choice key {:?}", key))?;
        if idx == 0 {
            return Err("choice key 0 (choices are 1-based)".to_string());
        }
        out.insert(idx, *weight);
    }
    Ok(out)
}

/// Collapse a weighted ballot to its single most-weighted choice.
///
/// Returns `None` for an empty map, and for a deliberately neutral ballot:
/// every declared choice listed with the same weight. A partial map with
/// equal weights is NOT neutral and resolves to its lowest listed index.
pub fn quadratic_voting_get_most_popular(
    weights: &BTreeMap<u32, f64>,
    choice_count: usize,
) -> Option<u32> {
    let mut iter = weights.iter();
    let (&first_idx, &first_weight) = iter.next()?;

    let all_equal = weights.values().all(|w| *w == first_weight);
    if all_equal && weights.len() == choice_count {
        return None;
    }

    let mut best = (first_idx, first_weight);
    for (&idx, &weight) in iter {
        if weight > best.1 {
            best = (idx, weight);
        }
    }
    Some(best.0)
}

/// Per-choice counters for one vote sample
#[derive(Debug, Clone, PartialEq)]
pub struct Tally {
    /// choice index (1..=N) → ballots
    pub counts: BTreeMap<u32, u64>,
    /// Ballots in the sample, including skipped ones
    pub sampled: u64,
    pub skipped: u64,
    pub weighted: bool,
}

impl Tally {
    /// Leading choice, or `None` below `min_sample` or with no counted ballot
    pub fn leading_choice(&self, min_sample: u64) -> Option<u32> {
        if self.sampled < min_sample {
            return None;
        }

        let mut best: Option<(u32, u64)> = None;
        for (&idx, &count) in &self.counts {
            match best {
                Some((_, top)) if count <= top => {}
                _ => best = Some((idx, count)),
            }
        }

        best.filter(|(_, count)| *count > 0).map(|(idx, _)| idx)
    }
}

/// Count a vote sample against `choice_count` declared choices
pub fn tally_votes(proposal_id: &str, choice_count: usize, votes: &[Vote]) -> Tally {
    let weighted = votes.iter().any(|v| !v.choice.is_single());
    let n = choice_count as u32;
    let in_range = |idx: u32| idx >= 1 && idx <= n;

    let mut tally = Tally {
        counts: (1..=n).map(|idx| (idx, 0)).collect(),
        sampled: votes.len() as u64,
        skipped: 0,
        weighted,
    };

    for vote in votes {
        let counted = match &vote.choice {
            VoteChoice::Single(_) if weighted => {
                debug!(
                    "{}: single-choice ballot from {} in weighted tally, skipped",
                    proposal_id, vote.voter
                );
                None
            }
            VoteChoice::Single(raw) => match u32::try_from(*raw).ok().filter(|idx| in_range(*idx)) {
                Some(idx) => Some(idx),
                None => {
                    warn!(
                        "{}: vote by {} for choice {} outside 1..={}, skipped",
                        proposal_id, vote.voter, raw, n
                    );
                    None
                }
            },
            VoteChoice::Weighted(raw) => match normalize_weights(raw) {
                Ok(weights) => match quadratic_voting_get_most_popular(&weights, choice_count) {
                    // neutral ballot: contributes nothing, not an anomaly
                    None => continue,
                    Some(idx) if in_range(idx) => Some(idx),
                    Some(idx) => {
                        warn!(
                            "{}: weighted vote by {} peaks at choice {} outside 1..={}, skipped",
                            proposal_id, vote.voter, idx, n
                        );
                        None
                    }
                },
                Err(reason) => {
                    warn!(
                        "{}: malformed weighted vote by {} ({}), skipped",
                        proposal_id, vote.voter, reason
                    );
                    None
                }
            },
            VoteChoice::Ranked(_) | VoteChoice::Unrecognized(_) => {
                debug!(
                    "{}: unsupported ballot shape from {}, skipped",
                    proposal_id, vote.voter
                );
                None
            }
        };

        match counted {
            Some(idx) => *tally.counts.entry(idx).or_insert(0) += 1,
            None => tally.skipped += 1,
        }
    }

    tally
}

/// Build the inference record for a proposal from its vote sample
pub fn infer_from_sample(proposal: &Proposal, votes: &[Vote], min_sample: u64) -> ChoiceInference {
    let tally = tally_votes(&proposal.id, proposal.choice_count(), votes);
    let pop_choice = tally.leading_choice(min_sample);

    debug!(
        "{}: {} sampled vote(s), weighted={}, counts={:?}, leading={:?}",
        proposal.id, tally.sampled, tally.weighted, tally.counts, pop_choice
    );

    ChoiceInference {
        id: proposal.id.clone(),
        title: proposal.title.clone(),
        pop_choice,
        created: proposal.created,
        vote_count: tally.sampled,
        weighted_vote: tally.weighted,
        voting_type: proposal.voting_type().to_string(),
        space: proposal.space.id.clone(),
        tally: tally.counts,
        skipped: tally.skipped,
    }
}

pub struct TallyEngine<'a, I: RemoteIndex> {
    index: &'a I,
    sample_limit: usize,
    min_sample: u64,
}

impl<'a, I: RemoteIndex> TallyEngine<'a, I> {
    pub fn new(index: &'a I, sample_limit: usize, min_sample: u64) -> Self {
        Self {
            index,
            sample_limit,
            min_sample,
        }
    }

    /// Sample recent votes and metadata (two queries) and infer the leading choice
    pub fn infer(&self, proposal_id: &str) -> Result<ChoiceInference> {
        let votes = self.index.votes(proposal_id, self.sample_limit)?;
        let proposal = self.index.proposal(proposal_id)?;
        Ok(infer_from_sample(&proposal, &votes, self.min_sample))
    }

    /// Infer every distinct proposal once
    pub fn infer_many<'p, P>(&self, proposal_ids: P) -> Result<BTreeMap<ProposalId, ChoiceInference>>
    where
        P: IntoIterator<Item = &'p ProposalId>,
    {
        let unique: BTreeSet<&ProposalId> = proposal_ids.into_iter().collect();
        let mut out = BTreeMap::new();
        for id in unique {
            out.insert(id.clone(), self.infer(id)?);
        }
        Ok(out)
    }
}
