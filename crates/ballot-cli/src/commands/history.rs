use super::connect;
use crate::{print_info, print_success, HistoryCommands};
use ballot_core::{load_wallets, HistoryStore, Pipeline, PipelineContext};
use colored::*;
use std::path::PathBuf;

pub fn handle(action: HistoryCommands, ctx: PipelineContext) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        HistoryCommands::Init { wallets } => init(with_wallets(ctx, wallets)),
        HistoryCommands::Show { wallet } => show(&ctx, wallet.as_deref()),
        HistoryCommands::Refresh { wallets } => refresh(with_wallets(ctx, wallets)),
    }
}

fn with_wallets(mut ctx: PipelineContext, wallets: Option<PathBuf>) -> PipelineContext {
    if let Some(path) = wallets {
        ctx.config.wallet_path = path;
    }
    ctx
}

fn init(ctx: PipelineContext) -> Result<(), Box<dyn std::error::Error>> {
    let wallets = load_wallets(&ctx.config.wallet_path)?;
    let client = connect(&ctx)?;
    let pipeline = Pipeline::new(&client, ctx);
    let store = pipeline.history_store();

    if store.exists() {
        print_info(&format!("Overwriting {}", store.path().display()));
    }
    let history = HistoryStore::initialize(&wallets, &pipeline.resolver())?;
    store.save(&history)?;

    print_success(&format!(
        "Voting history for {} wallet(s) saved to {} ({} prior vote(s))",
        history.len(),
        store.path().display(),
        history.entry_count()
    ));
    Ok(())
}

fn show(ctx: &PipelineContext, wallet: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let store = HistoryStore::new(
        &ctx.config.history_path,
        ctx.config.history_bootstrap_attempts,
    );
    if !store.exists() {
        print_info(&format!(
            "No voting history at {} (run `ballot history init`)",
            store.path().display()
        ));
        return Ok(());
    }
    let history = store.read()?;

    match wallet {
        Some(wallet) => match history.voted(wallet) {
            Some(voted) => {
                println!("{} {}", wallet.bold(), format!("({} voted)", voted.len()).cyan());
                for id in voted {
                    println!("  {}", id);
                }
            }
            None => print_info(&format!("{} is not in the voting history", wallet)),
        },
        None => {
            for w in history.wallets() {
                let count = history.voted(w).map_or(0, |v| v.len());
                println!("{} {}", w.bold(), format!("({} voted)", count).cyan());
            }
            print_success(&format!(
                "{} wallet(s), {} recorded vote(s)",
                history.len(),
                history.entry_count()
            ));
        }
    }
    Ok(())
}

fn refresh(ctx: PipelineContext) -> Result<(), Box<dyn std::error::Error>> {
    let wallets = load_wallets(&ctx.config.wallet_path)?;
    let client = connect(&ctx)?;
    let pipeline = Pipeline::new(&client, ctx);
    let store = pipeline.history_store();

    let mut history = pipeline.load_history(&wallets)?;
    let candidates = pipeline
        .resolver()
        .resolve_all(&wallets, &history, &pipeline.context().ignore)?;
    let appended = HistoryStore::refresh(&mut history, &candidates, &client)?;
    if appended > 0 {
        store.save(&history)?;
    }

    print_success(&format!(
        "Appended {} vote(s); {} recorded in total",
        appended,
        history.entry_count()
    ));
    Ok(())
}
