// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// BALLOT - DATA MODEL
//
// Wallets, spaces and proposals are opaque strings taken verbatim from the
// remote index. No case normalisation is ever applied to them.
// All maps are BTreeMap/BTreeSet so every document and tie-break is
// deterministic across runs.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Wallet address, used verbatim as an identity key
pub type Wallet = String;

/// Governance community identifier (e.g. "aave.eth")
pub type SpaceId = String;

/// Content-addressed proposal identifier
pub type ProposalId = String;

/// wallet → proposal ids still needing a vote. Replaced wholesale every run.
pub type RecommendationMap = BTreeMap<Wallet, Vec<ProposalId>>;

/// wallet → {proposal id → inference}
pub type EnrichedRecommendations = BTreeMap<Wallet, BTreeMap<ProposalId, ChoiceInference>>;

/// Voting scheme reported by the index when a proposal carries no `type`
pub const DEFAULT_VOTING_TYPE: &str = "single-choice";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalState {
    Pending,
    Active,
    Closed,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceRef {
    pub id: SpaceId,
    pub name: String,
}

/// A single governance vote item as returned by the index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub title: String,
    #[serde(default)]
    pub body: String,
    /// Choice labels; vote choices index into this list starting at 1
    pub choices: Vec<String>,
    pub start: i64,
    pub end: i64,
    #[serde(default)]
    pub snapshot: Option<String>,
    pub state: ProposalState,
    pub author: String,
    pub created: i64,
    #[serde(rename = "type", default)]
    pub voting_type: Option<String>,
    /// Total votes as counted by the index (not a sample)
    #[serde(default)]
    pub votes: Option<u64>,
    pub space: SpaceRef,
}

impl Proposal {
    pub fn voting_type(&self) -> &str {
        self.voting_type.as_deref().unwrap_or(DEFAULT_VOTING_TYPE)
    }

    /// Number of declared choices (N in 1..=N)
    pub fn choice_count(&self) -> usize {
        self.choices.len()
    }
}

/// The `choice` field of a cast vote.
///
/// Single-choice ballots are a plain 1-based index, decoded as a signed
/// integer so a negative or oversized index is still a single ballot (and
/// skipped by the tally as out of range). Weighted and quadratic
/// ballots spread weight over choice indices given as strings. Anything else
/// is kept so the tally can log it instead of failing the whole sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VoteChoice {
    Single(i64),
    Weighted(BTreeMap<String, f64>),
    Ranked(Vec<u32>),
    Unrecognized(serde_json::Value),
}

impl VoteChoice {
    pub fn is_single(&self) -> bool {
        matches!(self, VoteChoice::Single(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub voter: Wallet,
    pub choice: VoteChoice,
    #[serde(default)]
    pub created: i64,
}

/// Crowd-favoured choice inferred from a recent vote sample.
///
/// `vote_count` is the SAMPLE size (capped by the sample limit), not the
/// proposal's true total. Consumers comparing it with index totals must
/// account for that bias.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceInference {
    pub id: ProposalId,
    pub title: String,
    /// 1-based leading choice, `None` when the sample carries too little signal
    pub pop_choice: Option<u32>,
    pub created: i64,
    pub vote_count: u64,
    pub weighted_vote: bool,
    pub voting_type: String,
    pub space: SpaceId,
    #[serde(default)]
    pub tally: BTreeMap<u32, u64>,
    /// Ballots ignored as malformed or out of range
    #[serde(default)]
    pub skipped: u64,
}

/// Proposal ids excluded for every wallet (known-bad or test proposals)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IgnoreList(BTreeSet<ProposalId>);

impl IgnoreList {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ProposalId>,
    {
        Self(ids.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_set(&self) -> &BTreeSet<ProposalId> {
        &self.0
    }
}
