// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// BALLOT - PROPOSAL RESOLUTION PIPELINE
//
// history → resolve → thin → infer → keyword filter → engagement filter
//         → persist (once)
//
// Single-threaded and synchronous. Every stage works on values produced by
// the previous one; filters run in memory and the documents are written once
// at the end, so an interrupted run never leaves partially filtered output.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::config::PipelineContext;
use crate::error::Result;
use crate::export::{self, SpaceNameCache};
use crate::filters::{EngagementFilter, KeywordFilter, RemovedProposal};
use crate::history::{HistoryStore, VotingHistory};
use crate::index::RemoteIndex;
use crate::resolver::{diversity_thin, CandidateResolver, ResolverLimits};
use crate::tally::TallyEngine;
use crate::types::{EnrichedRecommendations, ProposalId, RecommendationMap, Wallet};
use log::info;
use rand::Rng;
use std::collections::{BTreeMap, BTreeSet};

/// Everything a run produced, for reporting
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineOutcome {
    /// Final wallet → {proposal → inference}, after all filters
    pub enriched: EnrichedRecommendations,
    /// Recommendations dropped by diversity thinning
    pub thinned: RecommendationMap,
    pub keyword_removed: BTreeMap<ProposalId, RemovedProposal>,
    pub engagement_removed: BTreeMap<ProposalId, RemovedProposal>,
}

impl PipelineOutcome {
    pub fn recommendations(&self) -> RecommendationMap {
        export::flatten(&self.enriched)
    }

    pub fn recommendation_count(&self) -> usize {
        self.enriched.values().map(BTreeMap::len).sum()
    }
}

/// Attach each wallet's inferences to its recommendation list
pub fn enrich(
    recommendations: &RecommendationMap,
    inferences: &BTreeMap<ProposalId, crate::types::ChoiceInference>,
) -> EnrichedRecommendations {
    recommendations
        .iter()
        .map(|(wallet, proposals)| {
            let bucket = proposals
                .iter()
                .filter_map(|id| inferences.get(id).map(|inf| (id.clone(), inf.clone())))
                .collect();
            (wallet.clone(), bucket)
        })
        .collect()
}

pub struct Pipeline<'a, I: RemoteIndex> {
    index: &'a I,
    ctx: PipelineContext,
}

impl<'a, I: RemoteIndex> Pipeline<'a, I> {
    pub fn new(index: &'a I, ctx: PipelineContext) -> Self {
        Self { index, ctx }
    }

    pub fn context(&self) -> &PipelineContext {
        &self.ctx
    }

    pub fn resolver(&self) -> CandidateResolver<'a, I> {
        CandidateResolver::new(
            self.index,
            ResolverLimits {
                follow_limit: self.ctx.config.follow_limit,
                proposal_limit: self.ctx.config.proposal_limit,
            },
        )
    }

    pub fn history_store(&self) -> HistoryStore {
        HistoryStore::new(
            &self.ctx.config.history_path,
            self.ctx.config.history_bootstrap_attempts,
        )
    }

    pub fn tally_engine(&self) -> TallyEngine<'a, I> {
        TallyEngine::new(
            self.index,
            self.ctx.config.vote_sample_limit,
            self.ctx.config.min_sample_votes,
        )
    }

    /// Load (or bootstrap) the voting history for `wallets`
    pub fn load_history(&self, wallets: &BTreeSet<Wallet>) -> Result<VotingHistory> {
        self.history_store().load(wallets, &self.resolver())
    }

    /// Resolve, thin, infer and filter, without touching the export documents
    pub fn evaluate<R: Rng + ?Sized>(
        &self,
        wallets: &BTreeSet<Wallet>,
        history: &VotingHistory,
        rng: &mut R,
    ) -> Result<PipelineOutcome> {
        let config = &self.ctx.config;

        let resolved = self
            .resolver()
            .resolve_all(wallets, history, &self.ctx.ignore)?;

        let (recommendations, thinned) =
            diversity_thin(&resolved, config.thinning_probability, rng);

        let inferences = self
            .tally_engine()
            .infer_many(recommendations.values().flatten())?;
        info!("Inferred leading choices for {} proposal(s)", inferences.len());

        let enriched = enrich(&recommendations, &inferences);

        let keyword = KeywordFilter::new(
            config.keyword_triggers.iter().cloned(),
            config.keyword_case_sensitive,
        )
        .apply(&enriched);

        let engagement = EngagementFilter::new(
            self.index,
            config.engagement_ratio,
            config.engagement_window,
        )
        .apply(&keyword.kept)?;

        info!(
            "Filters removed {} suspicious and {} under-engaged proposal(s)",
            keyword.removed.len(),
            engagement.removed.len()
        );

        Ok(PipelineOutcome {
            enriched: engagement.kept,
            thinned,
            keyword_removed: keyword.removed,
            engagement_removed: engagement.removed,
        })
    }

    /// Write the recommendation, choices and table documents
    pub fn persist(&self, outcome: &PipelineOutcome) -> Result<()> {
        let config = &self.ctx.config;
        let recommendations = outcome.recommendations();

        // space names need the remote index; resolve them before any write
        let mut cache = SpaceNameCache::new(self.index);
        let rows = export::space_rows(&recommendations, &mut cache)?;

        export::write_json(&config.export_json_path, &recommendations)?;
        export::write_json(&config.choices_json_path, &outcome.enriched)?;
        export::write_table(&config.export_csv_path, &rows)?;

        info!(
            "Exported {} recommendation(s) for {} wallet(s) to {}",
            outcome.recommendation_count(),
            recommendations.len(),
            config.export_json_path.display()
        );
        Ok(())
    }

    /// Full run: history, evaluation, one persist at the end
    pub fn run<R: Rng + ?Sized>(&self, wallets: &BTreeSet<Wallet>, rng: &mut R) -> Result<PipelineOutcome> {
        info!("Starting pipeline for {} wallet(s)", wallets.len());
        let history = self.load_history(wallets)?;
        let outcome = self.evaluate(wallets, &history, rng)?;
        self.persist(&outcome)?;
        Ok(outcome)
    }
}
