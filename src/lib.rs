//! Fixture builders shared by the end-to-end pipeline tests.
//!
//! Everything here populates a [`MemoryIndex`] the way the Snapshot hub would
//! answer, so scenarios read as "who follows what, who voted how".

use ballot_core::{
    MemoryIndex, PipelineConfig, Proposal, ProposalState, SpaceRef, Vote, VoteChoice,
};
use std::path::Path;

pub fn proposal(id: &str, space: &str, title: &str, state: ProposalState, created: i64) -> Proposal {
    Proposal {
        id: id.to_string(),
        title: title.to_string(),
        body: String::new(),
        choices: vec!["Yes".to_string(), "No".to_string()],
        start: created,
        end: created + 86_400,
        snapshot: None,
        state,
        author: "0xauthor".to_string(),
        created,
        voting_type: Some("single-choice".to_string()),
        votes: None,
        space: SpaceRef {
            id: space.to_string(),
            name: format!("{} DAO", space),
        },
    }
}

/// Closed proposal carrying the hub's total vote count
pub fn closed(id: &str, space: &str, votes: u64, created: i64) -> Proposal {
    let mut p = proposal(id, space, &format!("Closed {}", id), ProposalState::Closed, created);
    p.votes = Some(votes);
    p
}

/// Add `count` single-choice ballots for `choice` from synthetic voters
pub fn cast(index: &mut MemoryIndex, proposal_id: &str, choice: u32, count: usize, prefix: &str) {
    for i in 0..count {
        index.add_vote(
            proposal_id,
            Vote {
                voter: format!("0x{}{:04}", prefix, i),
                choice: VoteChoice::Single(i64::from(choice)),
                created: i as i64,
            },
        );
    }
}

/// Record that `voter` voted on a proposal
pub fn voted(index: &mut MemoryIndex, proposal_id: &str, voter: &str, choice: VoteChoice) {
    index.add_vote(
        proposal_id,
        Vote {
            voter: voter.to_string(),
            choice,
            created: 10_000,
        },
    );
}

/// Config with every document under `dir` and thinning disabled
pub fn config_in(dir: &Path) -> PipelineConfig {
    PipelineConfig {
        wallet_path: dir.join("wallets.txt"),
        history_path: dir.join("already_voted.json"),
        export_json_path: dir.join("to_vote.json"),
        choices_json_path: dir.join("to_vote_choices.json"),
        export_csv_path: dir.join("to_vote.csv"),
        thinning_probability: 0.0,
        ..PipelineConfig::default()
    }
}
