pub mod candidates;
pub mod export;
pub mod history;
pub mod infer;
pub mod run;

use ballot_core::PipelineContext;
use ballot_index::SnapshotClient;

/// Snapshot client built from the resolved configuration
pub fn connect(ctx: &PipelineContext) -> Result<SnapshotClient, Box<dyn std::error::Error>> {
    let client = SnapshotClient::from_config(&ctx.config)?;
    log::debug!(
        "Using remote index {} (retry {:?})",
        client.endpoint(),
        client.retry_policy()
    );
    Ok(client)
}
