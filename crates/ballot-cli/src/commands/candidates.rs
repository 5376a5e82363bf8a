use super::connect;
use crate::{print_info, print_success};
use ballot_core::{Pipeline, PipelineContext, RemoteIndex, VotingHistory};
use colored::*;

/// Resolve one wallet against the stored history without touching any file
pub fn handle(ctx: &PipelineContext, wallet: &str) -> Result<(), Box<dyn std::error::Error>> {
    let client = connect(ctx)?;
    let pipeline = Pipeline::new(&client, ctx.clone());
    let store = pipeline.history_store();

    let mut history = if store.exists() {
        store.read()?
    } else {
        print_info(&format!(
            "No voting history at {}; treating every proposal as unvoted",
            store.path().display()
        ));
        VotingHistory::new()
    };
    history.ensure_wallets([&wallet.to_string()]);

    let candidates = pipeline
        .resolver()
        .resolve_with(wallet, &history, &ctx.ignore)?;

    if candidates.is_empty() {
        print_success(&format!("{} has nothing left to vote on", wallet));
        return Ok(());
    }

    println!();
    for id in &candidates {
        let proposal = client.proposal(id)?;
        println!(
            "{} {} {}",
            id.dimmed(),
            proposal.title.bold(),
            format!("[{}]", proposal.space.name).cyan()
        );
    }
    println!();
    print_success(&format!("{} candidate(s) for {}", candidates.len(), wallet));
    Ok(())
}
