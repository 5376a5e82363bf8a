use super::connect;
use crate::{print_info, print_success};
use ballot_core::{Pipeline, PipelineContext, RemoteIndex};
use colored::*;

pub fn handle(ctx: &PipelineContext, proposal_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let client = connect(ctx)?;
    let pipeline = Pipeline::new(&client, ctx.clone());
    let inference = pipeline.tally_engine().infer(proposal_id)?;

    println!();
    println!("{} {}", "Proposal:".bold(), inference.title);
    println!("{} {}", "Space:".bold(), inference.space);
    println!(
        "{} {}{}",
        "Voting type:".bold(),
        inference.voting_type,
        if inference.weighted_vote { " (weighted)" } else { "" }
    );
    println!(
        "{} {} sampled, {} skipped",
        "Votes:".bold(),
        inference.vote_count,
        inference.skipped
    );
    for (choice, count) in &inference.tally {
        println!("  #{:<3} {}", choice, count);
    }
    println!();

    match inference.pop_choice {
        Some(choice) => {
            let label = client
                .proposal(proposal_id)?
                .choices
                .get(choice as usize - 1)
                .cloned()
                .unwrap_or_default();
            print_success(&format!("Leading choice #{} {}", choice, label.green().bold()));
        }
        None => print_info("No clear favourite (sample too small or no counted ballots)"),
    }

    if log::log_enabled!(log::Level::Debug) {
        println!("{}", serde_json::to_string_pretty(&inference)?);
    }
    Ok(())
}
