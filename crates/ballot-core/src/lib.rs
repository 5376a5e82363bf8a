// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// BALLOT - CORE MODULE
//
// Governance vote recommendation engine: for a set of wallets, find active
// proposals in the spaces they follow that they have not voted on yet, infer
// the crowd's leading choice for each and drop suspicious or under-engaged
// proposals before exporting the result.
//
// The remote governance index is abstracted behind `RemoteIndex`; this crate
// never performs network I/O itself.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub mod config;
pub mod error;
pub mod export;
pub mod filters;
pub mod history;
pub mod index;
pub mod pipeline;
pub mod resolver;
pub mod tally;
pub mod types;

pub use config::{load_wallets, PipelineConfig, PipelineContext};
pub use error::{BallotError, Result};
pub use history::{HistoryStore, VotingHistory};
pub use index::{MemoryIndex, RemoteIndex};
pub use pipeline::{Pipeline, PipelineOutcome};
pub use resolver::{diversity_thin, CandidateResolver, ResolverLimits};
pub use tally::{quadratic_voting_get_most_popular, TallyEngine};
pub use types::*;
