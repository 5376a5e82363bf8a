// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// BALLOT - CANDIDATE RESOLVER
//
// resolve(wallet) = active_proposals(joined_spaces(wallet))
//                   − VotingHistory[wallet] − IgnoreList
//
// Pure set subtraction over BTreeSets: same remote state + same history
// gives the same candidate set. Known completeness ceilings:
// - followed spaces beyond `follow_limit` are dropped by the index
// - active proposals beyond `proposal_limit` per batched query are dropped
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::error::{BallotError, Result};
use crate::history::VotingHistory;
use crate::index::RemoteIndex;
use crate::types::{IgnoreList, ProposalId, RecommendationMap, SpaceId, Wallet};
use log::{debug, info};
use rand::Rng;
use std::collections::BTreeSet;

/// Default probability of thinning a wallet's recommendations
pub const DEFAULT_THINNING_PROBABILITY: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverLimits {
    pub follow_limit: usize,
    pub proposal_limit: usize,
}

impl Default for ResolverLimits {
    fn default() -> Self {
        Self {
            follow_limit: 300,
            proposal_limit: 50,
        }
    }
}

pub struct CandidateResolver<'a, I: RemoteIndex> {
    index: &'a I,
    limits: ResolverLimits,
}

impl<'a, I: RemoteIndex> CandidateResolver<'a, I> {
    pub fn new(index: &'a I, limits: ResolverLimits) -> Self {
        Self { index, limits }
    }

    pub fn index(&self) -> &'a I {
        self.index
    }

    /// Union of all spaces the wallet follows
    pub fn joined_spaces(&self, wallet: &str) -> Result<BTreeSet<SpaceId>> {
        self.index.followed_spaces(wallet, self.limits.follow_limit)
    }

    /// Ids of active proposals across `spaces`, one batched query.
    /// An empty space set never reaches the index.
    pub fn active_proposals(&self, spaces: &BTreeSet<SpaceId>) -> Result<BTreeSet<ProposalId>> {
        if spaces.is_empty() {
            return Ok(BTreeSet::new());
        }

        let proposals = self
            .index
            .active_proposals(spaces, self.limits.proposal_limit)?;

        let active_spaces: BTreeSet<&str> = proposals.iter().map(|p| p.space.id.as_str()).collect();
        debug!(
            "Found {} active proposal(s) for {:?}",
            proposals.len(),
            active_spaces
        );

        Ok(proposals.into_iter().map(|p| p.id).collect())
    }

    /// Active, unvoted, non-ignored proposals for one wallet
    pub fn resolve_with(
        &self,
        wallet: &str,
        history: &VotingHistory,
        ignore: &IgnoreList,
    ) -> Result<BTreeSet<ProposalId>> {
        let voted = history
            .voted(wallet)
            .ok_or_else(|| BallotError::UnknownWallet(wallet.to_string()))?;

        let spaces = self.joined_spaces(wallet)?;
        let active = self.active_proposals(&spaces)?;

        let candidates: BTreeSet<ProposalId> = active
            .into_iter()
            .filter(|id| !voted.contains(id) && !ignore.contains(id))
            .collect();

        debug!(
            "{}: {} space(s), {} candidate(s) {:?}",
            wallet,
            spaces.len(),
            candidates.len(),
            candidates
        );
        Ok(candidates)
    }

    /// Resolve every wallet into a fresh recommendation map
    pub fn resolve_all<'w, W>(
        &self,
        wallets: W,
        history: &VotingHistory,
        ignore: &IgnoreList,
    ) -> Result<RecommendationMap>
    where
        W: IntoIterator<Item = &'w Wallet>,
    {
        let mut map = RecommendationMap::new();
        for wallet in wallets {
            let candidates = self.resolve_with(wallet, history, ignore)?;
            map.insert(wallet.clone(), candidates.into_iter().collect());
        }

        info!(
            "Resolved {} wallet(s), {} recommendation(s) in total",
            map.len(),
            map.values().map(Vec::len).sum::<usize>()
        );
        Ok(map)
    }
}

/// Randomly drop one recommendation from some wallets.
///
/// Each wallet with a non-empty list independently loses exactly one
/// uniformly chosen proposal with probability `probability`. Returns the
/// thinned map and a map of what was removed (only wallets that lost one).
/// This keeps wallets from casting identical vote patterns at the cost of
/// occasionally skipping a legitimate proposal.
pub fn diversity_thin<R: Rng + ?Sized>(
    map: &RecommendationMap,
    probability: f64,
    rng: &mut R,
) -> (RecommendationMap, RecommendationMap) {
    // NaN would make gen_bool panic; treat it as "never thin"
    let probability = if probability.is_nan() {
        0.0
    } else {
        probability.clamp(0.0, 1.0)
    };
    let mut thinned = map.clone();
    let mut removed = RecommendationMap::new();

    for (wallet, proposals) in thinned.iter_mut() {
        if proposals.is_empty() || !rng.gen_bool(probability) {
            continue;
        }
        let idx = rng.gen_range(0..proposals.len());
        let dropped = proposals.remove(idx);
        info!("Diversity thinning: skipping {} for {}", dropped, wallet);
        removed.insert(wallet.clone(), vec![dropped]);
    }

    (thinned, removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::fixtures::proposal;
    use crate::index::MemoryIndex;
    use crate::types::ProposalState;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn wallets(ws: &[&str]) -> BTreeSet<Wallet> {
        ws.iter().map(|w| w.to_string()).collect()
    }

    fn index() -> MemoryIndex {
        let mut index = MemoryIndex::new();
        index
            .follow("0xa", "x.eth")
            .follow("0xa", "y.eth")
            .follow("0xb", "y.eth")
            .add_proposal(proposal("p1", "x.eth", ProposalState::Active, 100))
            .add_proposal(proposal("p2", "y.eth", ProposalState::Active, 200))
            .add_proposal(proposal("p3", "y.eth", ProposalState::Closed, 300))
            .add_proposal(proposal("p4", "z.eth", ProposalState::Active, 400));
        index
    }

    #[test]
    fn test_resolve_subtracts_history_and_ignores() {
        let index = index();
        let resolver = CandidateResolver::new(&index, ResolverLimits::default());
        let mut history = VotingHistory::empty_for(&wallets(&["0xa", "0xb"]));
        history.record("0xb", "p2");

        let none = IgnoreList::default();
        let a = resolver.resolve_with("0xa", &history, &none).unwrap();
        assert_eq!(a.into_iter().collect::<Vec<_>>(), vec!["p1", "p2"]);

        let b = resolver.resolve_with("0xb", &history, &none).unwrap();
        assert!(b.is_empty());

        let ignore = IgnoreList::new(["p1"]);
        let a = resolver.resolve_with("0xa", &history, &ignore).unwrap();
        assert_eq!(a.into_iter().collect::<Vec<_>>(), vec!["p2"]);
    }

    #[test]
    fn test_resolve_unknown_wallet_is_fatal() {
        let index = index();
        let resolver = CandidateResolver::new(&index, ResolverLimits::default());
        let history = VotingHistory::empty_for(&wallets(&["0xa"]));
        let err = resolver
            .resolve_with("0xb", &history, &IgnoreList::default())
            .unwrap_err();
        assert!(matches!(err, BallotError::UnknownWallet(w) if w == "0xb"));
    }

    #[test]
    fn test_wallet_without_follows_skips_proposal_query() {
        let index = index();
        let resolver = CandidateResolver::new(&index, ResolverLimits::default());
        let history = VotingHistory::empty_for(&wallets(&["0xlonely"]));

        let out = resolver
            .resolve_with("0xlonely", &history, &IgnoreList::default())
            .unwrap();
        assert!(out.is_empty());
        // only the follows query was issued
        assert_eq!(index.calls(), 1);
    }

    #[test]
    fn test_proposal_limit_drops_older_proposals() {
        let index = index();
        let limits = ResolverLimits {
            follow_limit: 300,
            proposal_limit: 1,
        };
        let resolver = CandidateResolver::new(&index, limits);
        let history = VotingHistory::empty_for(&wallets(&["0xa"]));
        let a = resolver
            .resolve_with("0xa", &history, &IgnoreList::default())
            .unwrap();
        assert_eq!(a.into_iter().collect::<Vec<_>>(), vec!["p2"]);
    }

    #[test]
    fn test_resolve_all_is_idempotent() {
        let index = index();
        let resolver = CandidateResolver::new(&index, ResolverLimits::default());
        let ws = wallets(&["0xa", "0xb"]);
        let history = VotingHistory::empty_for(&ws);

        let first = resolver.resolve_all(&ws, &history, &IgnoreList::default()).unwrap();
        let second = resolver.resolve_all(&ws, &history, &IgnoreList::default()).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    fn sample_map() -> RecommendationMap {
        let mut map = RecommendationMap::new();
        map.insert("0xa".to_string(), vec!["p1".to_string(), "p2".to_string()]);
        map.insert("0xb".to_string(), vec!["p3".to_string()]);
        map.insert("0xc".to_string(), Vec::new());
        map
    }

    #[test]
    fn test_thinning_probability_one_removes_exactly_one() {
        let map = sample_map();
        let mut rng = StdRng::seed_from_u64(7);
        let (thinned, removed) = diversity_thin(&map, 1.0, &mut rng);

        assert_eq!(thinned["0xa"].len(), 1);
        assert!(thinned["0xb"].is_empty());
        assert!(thinned["0xc"].is_empty());
        assert_eq!(removed.len(), 2);
        assert!(!removed.contains_key("0xc"));

        for (wallet, dropped) in &removed {
            assert_eq!(dropped.len(), 1);
            assert!(map[wallet].contains(&dropped[0]));
            assert!(!thinned[wallet].contains(&dropped[0]));
        }
    }

    #[test]
    fn test_thinning_probability_zero_is_identity() {
        let map = sample_map();
        let mut rng = StdRng::seed_from_u64(7);
        let (thinned, removed) = diversity_thin(&map, 0.0, &mut rng);
        assert_eq!(thinned, map);
        assert!(removed.is_empty());
    }

    #[test]
    fn test_thinning_nan_probability_is_identity() {
        let map = sample_map();
        let mut rng = StdRng::seed_from_u64(7);
        let (thinned, removed) = diversity_thin(&map, f64::NAN, &mut rng);
        assert_eq!(thinned, map);
        assert!(removed.is_empty());
    }

    #[test]
    fn test_thinning_is_reproducible_with_seed() {
        let map = sample_map();
        let a = diversity_thin(&map, 0.5, &mut StdRng::seed_from_u64(42));
        let b = diversity_thin(&map, 0.5, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }
}
