//! GDB batch invocation and output interpretation
//!
//! One decode spawns exactly one GDB process that lists the source line for
//! every address; the captured output is then matched back to the addresses.

pub mod batch;
pub mod interpret;

pub use batch::{GdbBatch, GdbOutput};
pub use interpret::{
    classify_line, correlate, correlate_output, Correlation, FrameLocation, LineMatch, ResolvedFrame,
};

use std::path::Path;
use std::time::Duration;

use tracing::info;

use crate::error::{DecodeError, Result};

/// Resolve `addresses` against `firmware` with the GDB at `gdb`.
///
/// Returns one frame per address, in input order. Fails before spawning
/// anything when `addresses` is empty.
pub async fn resolve_addresses(
    gdb: &Path,
    firmware: &Path,
    addresses: &[u32],
    timeout: Option<Duration>,
    correlation: Correlation,
) -> Result<Vec<ResolvedFrame>> {
    if addresses.is_empty() {
        return Err(DecodeError::NoAddresses);
    }

    let output = GdbBatch::new(gdb, firmware, addresses).run(timeout).await?;
    let frames = correlate_output(addresses, &output.stdout, &output.stderr, correlation);

    let resolved = frames.iter().filter(|f| f.is_resolved()).count();
    info!(
        "Resolved {}/{} addresses ({:?} correlation)",
        resolved,
        frames.len(),
        correlation
    );
    Ok(frames)
}
