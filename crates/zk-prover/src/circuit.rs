//! Circuit sizing.

use tracing::debug;
use zk_dispatch::{DispatchError, EngineWorker};

/// Round `v` up to the next power of two. Zero rounds up to 2.
pub fn pow2ceil(v: u64) -> u64 {
    if v == 0 {
        return 2;
    }
    v.next_power_of_two()
}

/// Ask the engine for the gate count of a serialized constraint system and
/// round it up to an FFT-friendly size.
pub async fn circuit_size(
    worker: &EngineWorker,
    constraint_system: &[u8],
) -> Result<u64, DispatchError> {
    let addr = worker.transfer_to_heap(constraint_system).await?;
    let exact = worker
        .get_exact_circuit_size(addr, constraint_system.len() as u64)
        .await?;
    worker.bbfree(addr).await?;

    let size = pow2ceil(exact);
    debug!(exact = exact, size = size, "Circuit size probed");
    Ok(size)
}
