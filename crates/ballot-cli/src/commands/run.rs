use super::connect;
use crate::{print_info, print_success};
use ballot_core::filters::{RemovalReason, RemovedProposal};
use ballot_core::{load_wallets, Pipeline, PipelineContext, PipelineOutcome, ProposalId};
use colored::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;

pub fn handle(
    mut ctx: PipelineContext,
    seed: Option<u64>,
    no_thinning: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if no_thinning {
        ctx.config.thinning_probability = 0.0;
    }

    let wallets = load_wallets(&ctx.config.wallet_path)?;
    print_info(&format!(
        "Loaded {} wallet(s) from {}",
        wallets.len(),
        ctx.config.wallet_path.display()
    ));

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let client = connect(&ctx)?;
    let pipeline = Pipeline::new(&client, ctx);
    let outcome = pipeline.run(&wallets, &mut rng)?;

    print_summary(&outcome);

    let config = &pipeline.context().config;
    print_success(&format!(
        "{} recommendation(s) written to {}, {} and {}",
        outcome.recommendation_count(),
        config.export_json_path.display(),
        config.choices_json_path.display(),
        config.export_csv_path.display()
    ));
    Ok(())
}

fn print_summary(outcome: &PipelineOutcome) {
    println!();
    for (wallet, bucket) in &outcome.enriched {
        println!(
            "{} {}",
            wallet.bold(),
            format!("({} to vote)", bucket.len()).cyan()
        );
        for (id, inference) in bucket {
            let choice = inference
                .pop_choice
                .map_or_else(|| "no clear favourite".to_string(), |c| format!("choice #{}", c));
            println!("  {} {} → {}", id.dimmed(), inference.title, choice.green());
        }
    }

    for (wallet, dropped) in &outcome.thinned {
        println!(
            "{} thinning skipped {} for {}",
            "ℹ".blue(),
            dropped.join(", ").dimmed(),
            wallet
        );
    }

    print_removed("Suspicious", &outcome.keyword_removed);
    print_removed("Under-engaged", &outcome.engagement_removed);
}

fn print_removed(label: &str, removed: &BTreeMap<ProposalId, RemovedProposal>) {
    if removed.is_empty() {
        return;
    }
    println!();
    println!("{} {}", label.yellow().bold(), format!("({})", removed.len()).yellow());
    for (id, entry) in removed {
        let why = match &entry.reason {
            RemovalReason::Keyword { trigger } => format!("title contains {:?}", trigger),
            RemovalReason::LowEngagement {
                vote_count,
                baseline,
            } => format!("{} votes vs. baseline {:.1}", vote_count, baseline),
        };
        println!("  {} {} [{}]: {}", id.dimmed(), entry.title, entry.space, why);
    }
}
