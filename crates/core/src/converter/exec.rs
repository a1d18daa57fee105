//! Run-then-classify step shared by the backends and pipelines.

use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::classify::{classify, ExitReport};
use super::error::ConverterError;
use crate::context::ConversionContext;
use crate::format::Format;
use crate::process::{ProcessOutcome, ToolInvocation};

/// Runs `invocation` and maps its exit to a typed result.
///
/// `expected_output` feeds the benign-exit check; `target` is the format the
/// run should have produced.
pub async fn execute(
    ctx: &ConversionContext,
    invocation: &ToolInvocation,
    target: Option<Format>,
    expected_output: Option<&Path>,
    cancel: &CancellationToken,
) -> Result<ProcessOutcome, ConverterError> {
    debug!(command = %invocation.command_line(), "Running tool");
    let outcome = ctx.processes.run(invocation, cancel).await?;

    let result = classify(ExitReport {
        tool: invocation.tool,
        exit_code: outcome.exit_code,
        stderr: &outcome.stderr,
        target,
        output_exists: expected_output.is_some_and(Path::exists),
    });

    if let Err(e) = &result {
        warn!(
            tool = invocation.tool.name(),
            exit_code = ?outcome.exit_code,
            error = %e,
            "Tool run failed"
        );
    }
    result.map(|()| outcome)
}
