use super::connect;
use crate::print_success;
use ballot_core::export::export_readable_csv;
use ballot_core::PipelineContext;
use std::path::PathBuf;

pub fn handle(
    ctx: &PipelineContext,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let input = input.unwrap_or_else(|| ctx.config.export_json_path.clone());
    let output = output.unwrap_or_else(|| ctx.config.export_csv_path.clone());

    let client = connect(ctx)?;
    let rows = export_readable_csv(&input, &output, &client)?;

    print_success(&format!(
        "Wrote {} row(s) from {} to {}",
        rows,
        input.display(),
        output.display()
    ));
    Ok(())
}
