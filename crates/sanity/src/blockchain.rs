use alloy_primitives::B256;
use guardian_storage::{event::CachedEvent, headers::CacheHeaders};
use tracing::{error, info};

/// A cache may never extend past the block the caller currently sees as the chain head.
pub fn verify_cache_block<H: CacheHeaders>(headers: &H, current_block: u64) -> bool {
    let is_valid = current_block >= headers.end_block();
    if is_valid {
        info!(
            cached_start_block = headers.start_block(),
            cached_end_block = headers.end_block(),
            current_block,
            "Events cache has valid age"
        );
    } else {
        error!(
            cached_start_block = headers.start_block(),
            cached_end_block = headers.end_block(),
            current_block,
            "Events cache is newer than the current block"
        );
    }
    is_valid
}

/// First event mined at `block_number` under a hash other than `block_hash`.
pub fn find_reorganized_event<E: CachedEvent>(
    events: &[E],
    block_number: u64,
    block_hash: B256,
) -> Option<&E> {
    events
        .iter()
        .find(|event| event.block_number() == block_number && event.block_hash() != block_hash)
}
