// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// BALLOT - VOTING HISTORY STORE
//
// wallet → set of proposal ids already voted on.
// - Append-only: an id recorded for a wallet is never removed.
// - Bootstrapped once by probing every active proposal per wallet, then
//   only appended to. Never recomputed from scratch once it exists.
// - Every current wallet has a key (possibly empty). A missing key is a
//   fatal error downstream.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::error::{BallotError, Result};
use crate::export;
use crate::index::RemoteIndex;
use crate::resolver::CandidateResolver;
use crate::types::{IgnoreList, ProposalId, RecommendationMap, Wallet};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VotingHistory(BTreeMap<Wallet, BTreeSet<ProposalId>>);

impl VotingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every wallet present with an empty set
    pub fn empty_for<'a, I>(wallets: I) -> Self
    where
        I: IntoIterator<Item = &'a Wallet>,
    {
        Self(
            wallets
                .into_iter()
                .map(|w| (w.clone(), BTreeSet::new()))
                .collect(),
        )
    }

    /// Proposals already voted on by `wallet`, `None` if the wallet is unknown
    pub fn voted(&self, wallet: &str) -> Option<&BTreeSet<ProposalId>> {
        self.0.get(wallet)
    }

    pub fn has_voted(&self, wallet: &str, proposal: &str) -> bool {
        self.0
            .get(wallet)
            .is_some_and(|voted| voted.contains(proposal))
    }

    /// Append a vote. Returns `true` if the entry is new.
    pub fn record(&mut self, wallet: &str, proposal: &str) -> bool {
        self.0
            .entry(wallet.to_string())
            .or_default()
            .insert(proposal.to_string())
    }

    /// Add every missing wallet with an empty set; returns how many were added.
    /// Wallets no longer in `wallets` are kept.
    pub fn ensure_wallets<'a, I>(&mut self, wallets: I) -> usize
    where
        I: IntoIterator<Item = &'a Wallet>,
    {
        let mut added = 0;
        for wallet in wallets {
            if !self.0.contains_key(wallet) {
                self.0.insert(wallet.clone(), BTreeSet::new());
                added += 1;
            }
        }
        added
    }

    pub fn wallets(&self) -> impl Iterator<Item = &Wallet> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total recorded (wallet, proposal) pairs
    pub fn entry_count(&self) -> usize {
        self.0.values().map(BTreeSet::len).sum()
    }
}

/// Durable voting history at a fixed document path
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
    bootstrap_attempts: u32,
}

impl HistoryStore {
    pub fn new<P: Into<PathBuf>>(path: P, bootstrap_attempts: u32) -> Self {
        Self {
            path: path.into(),
            bootstrap_attempts: bootstrap_attempts.max(1),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read the persisted history without any fallback
    pub fn read(&self) -> Result<VotingHistory> {
        export::read_json(&self.path)
    }

    pub fn save(&self, history: &VotingHistory) -> Result<()> {
        export::write_json(&self.path, history)?;
        debug!(
            "Saved voting history ({} wallets, {} entries) to {}",
            history.len(),
            history.entry_count(),
            self.path.display()
        );
        Ok(())
    }

    /// Load the history, bootstrapping it only when the document is absent.
    ///
    /// An existing document that fails to parse is an error and is left
    /// untouched: it is the only record of votes on proposals that are no
    /// longer active. A missing document is bootstrapped, persisted and read
    /// back on the next attempt. The returned history has a key for every
    /// wallet.
    pub fn load<I: RemoteIndex>(
        &self,
        wallets: &BTreeSet<Wallet>,
        resolver: &CandidateResolver<'_, I>,
    ) -> Result<VotingHistory> {
        for attempt in 1..=self.bootstrap_attempts + 1 {
            if self.exists() {
                let mut history = self.read().map_err(|e| {
                    error!("Voting history at {} unreadable: {}", self.path.display(), e);
                    e
                })?;
                let added = history.ensure_wallets(wallets);
                if added > 0 {
                    info!("Added {} new wallet(s) to voting history", added);
                    self.save(&history)?;
                }
                return Ok(history);
            }

            if attempt > self.bootstrap_attempts {
                break;
            }
            info!(
                "No voting history at {}; bootstrapping from remote index (attempt {})",
                self.path.display(),
                attempt
            );
            let history = Self::initialize(wallets, resolver)?;
            self.save(&history)?;
        }

        warn!(
            "Voting history at {} still missing after {} bootstrap attempt(s)",
            self.path.display(),
            self.bootstrap_attempts
        );
        Err(BallotError::HistoryUnavailable {
            path: self.path.clone(),
            attempts: self.bootstrap_attempts,
        })
    }

    /// Build a history from scratch.
    ///
    /// Resolves every wallet against an empty history, then checks each
    /// candidate individually for an existing vote. This costs one network
    /// `has_voted` query per (wallet, active proposal) pair.
    pub fn initialize<I: RemoteIndex>(
        wallets: &BTreeSet<Wallet>,
        resolver: &CandidateResolver<'_, I>,
    ) -> Result<VotingHistory> {
        let empty = VotingHistory::empty_for(wallets);
        let no_ignores = IgnoreList::default();
        let mut history = VotingHistory::empty_for(wallets);

        for wallet in wallets {
            let candidates = resolver.resolve_with(wallet, &empty, &no_ignores)?;
            for proposal in &candidates {
                if resolver.index().has_voted(proposal, wallet)? {
                    history.record(wallet, proposal);
                }
            }
            debug!(
                "Bootstrapped {}: {} of {} active proposal(s) already voted",
                wallet,
                history.voted(wallet).map_or(0, BTreeSet::len),
                candidates.len()
            );
        }

        info!(
            "Bootstrapped voting history for {} wallet(s), {} prior vote(s) found",
            history.len(),
            history.entry_count()
        );
        Ok(history)
    }

    /// Probe current recommendations and append any vote cast since.
    /// Returns the number of new entries.
    pub fn refresh<I: RemoteIndex>(
        history: &mut VotingHistory,
        candidates: &RecommendationMap,
        index: &I,
    ) -> Result<usize> {
        let mut appended = 0;
        for (wallet, proposals) in candidates {
            for proposal in proposals {
                if history.has_voted(wallet, proposal) {
                    continue;
                }
                if index.has_voted(proposal, wallet)? && history.record(wallet, proposal) {
                    appended += 1;
                }
            }
        }
        info!("History refresh appended {} vote(s)", appended);
        Ok(appended)
    }
}
