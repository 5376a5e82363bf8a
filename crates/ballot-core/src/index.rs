// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// BALLOT - REMOTE INDEX BOUNDARY
//
// The pipeline only ever talks to the voting platform through this trait.
// One method per logical query shape. Implementations are synchronous: every
// call blocks the pipeline until it returns.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::error::{BallotError, Result};
use crate::types::{Proposal, ProposalId, ProposalState, SpaceId, Vote, Wallet};
use std::collections::{BTreeMap, BTreeSet};

pub trait RemoteIndex {
    /// Spaces followed by `wallet`, at most `limit` of them
    fn followed_spaces(&self, wallet: &str, limit: usize) -> Result<BTreeSet<SpaceId>>;

    /// Active proposals across `spaces`, newest first, at most `limit` in total
    fn active_proposals(&self, spaces: &BTreeSet<SpaceId>, limit: usize) -> Result<Vec<Proposal>>;

    /// Metadata of a single proposal
    fn proposal(&self, id: &str) -> Result<Proposal>;

    /// Most recent votes on a proposal, newest first
    fn votes(&self, proposal_id: &str, limit: usize) -> Result<Vec<Vote>>;

    /// Whether `wallet` has cast any vote on the proposal
    fn has_voted(&self, proposal_id: &str, wallet: &str) -> Result<bool>;

    /// Most recently closed proposals of a space, newest first
    fn closed_proposals(&self, space: &str, limit: usize) -> Result<Vec<Proposal>>;
}

impl<T: RemoteIndex + ?Sized> RemoteIndex for &T {
    fn followed_spaces(&self, wallet: &str, limit: usize) -> Result<BTreeSet<SpaceId>> {
        (**self).followed_spaces(wallet, limit)
    }

    fn active_proposals(&self, spaces: &BTreeSet<SpaceId>, limit: usize) -> Result<Vec<Proposal>> {
        (**self).active_proposals(spaces, limit)
    }

    fn proposal(&self, id: &str) -> Result<Proposal> {
        (**self).proposal(id)
    }

    fn votes(&self, proposal_id: &str, limit: usize) -> Result<Vec<Vote>> {
        (**self).votes(proposal_id, limit)
    }

    fn has_voted(&self, proposal_id: &str, wallet: &str) -> Result<bool> {
        (**self).has_voted(proposal_id, wallet)
    }

    fn closed_proposals(&self, space: &str, limit: usize) -> Result<Vec<Proposal>> {
        (**self).closed_proposals(space, limit)
    }
}

/// In-memory index used for offline runs and tests.
///
/// Mirrors the remote ordering rules: proposals newest-first by `created`,
/// votes newest-first by `created`, limits applied after ordering.
#[derive(Debug, Clone, Default)]
pub struct MemoryIndex {
    follows: BTreeMap<Wallet, BTreeSet<SpaceId>>,
    proposals: BTreeMap<ProposalId, Proposal>,
    votes: BTreeMap<ProposalId, Vec<Vote>>,
    calls: std::cell::Cell<u64>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn follow(&mut self, wallet: &str, space: &str) -> &mut Self {
        self.follows
            .entry(wallet.to_string())
            .or_default()
            .insert(space.to_string());
        self
    }

    pub fn add_proposal(&mut self, proposal: Proposal) -> &mut Self {
        self.proposals.insert(proposal.id.clone(), proposal);
        self
    }

    pub fn add_vote(&mut self, proposal_id: &str, vote: Vote) -> &mut Self {
        self.votes
            .entry(proposal_id.to_string())
            .or_default()
            .push(vote);
        self
    }

    /// Total queries answered so far
    pub fn calls(&self) -> u64 {
        self.calls.get()
    }

    fn tick(&self) {
        self.calls.set(self.calls.get() + 1);
    }

    fn newest_first<'a>(iter: impl Iterator<Item = &'a Proposal>, limit: usize) -> Vec<Proposal> {
        let mut out: Vec<Proposal> = iter.cloned().collect();
        out.sort_by(|a, b| b.created.cmp(&a.created).then_with(|| a.id.cmp(&b.id)));
        out.truncate(limit);
        out
    }
}

impl RemoteIndex for MemoryIndex {
    fn followed_spaces(&self, wallet: &str, limit: usize) -> Result<BTreeSet<SpaceId>> {
        self.tick();
        Ok(self
            .follows
            .get(wallet)
            .map(|spaces| spaces.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    fn active_proposals(&self, spaces: &BTreeSet<SpaceId>, limit: usize) -> Result<Vec<Proposal>> {
        self.tick();
        Ok(Self::newest_first(
            self.proposals
                .values()
                .filter(|p| p.state == ProposalState::Active && spaces.contains(&p.space.id)),
            limit,
        ))
    }

    fn proposal(&self, id: &str) -> Result<Proposal> {
        self.tick();
        self.proposals
            .get(id)
            .cloned()
            .ok_or_else(|| BallotError::not_found(format!("proposal {}", id)))
    }

    fn votes(&self, proposal_id: &str, limit: usize) -> Result<Vec<Vote>> {
        self.tick();
        let mut votes = self.votes.get(proposal_id).cloned().unwrap_or_default();
        votes.sort_by(|a, b| b.created.cmp(&a.created));
        votes.truncate(limit);
        Ok(votes)
    }

    fn has_voted(&self, proposal_id: &str, wallet: &str) -> Result<bool> {
        self.tick();
        Ok(self
            .votes
            .get(proposal_id)
            .is_some_and(|votes| votes.iter().any(|v| v.voter == wallet)))
    }

    fn closed_proposals(&self, space: &str, limit: usize) -> Result<Vec<Proposal>> {
        self.tick();
        Ok(Self::newest_first(
            self.proposals
                .values()
                .filter(|p| p.state == ProposalState::Closed && p.space.id == space),
            limit,
        ))
    }
}
