//! Request batching for sequence node fetches.

/// Size of the batch fetched first around a reference node.
pub const PRIORITY_WINDOW: usize = 50;

/// Most keys in any other batch.
pub const BATCH_SIZE: usize = 200;

/// Sequence batches allowed in flight at once.
pub const MAX_CONCURRENT_BATCHES: usize = 6;

/// Splits sequence keys into fetch batches.
///
/// With a reference key and more than [`PRIORITY_WINDOW`] keys, a window of
/// exactly [`PRIORITY_WINDOW`] keys around the reference is carved out and
/// returned first; the window is shifted, not shrunk, near either end. A
/// reference key missing from the list anchors the window at the start. The
/// remaining keys follow in original order in chunks of at most
/// [`BATCH_SIZE`].
pub fn sequence_batches(keys: &[String], reference_key: Option<&str>) -> Vec<Vec<String>> {
    let mut remaining: Vec<String> = keys.to_vec();
    let mut batches = Vec::new();

    if let Some(reference) = reference_key {
        if remaining.len() > PRIORITY_WINDOW {
            let index = remaining.iter().position(|k| k == reference).unwrap_or(0);
            let start = index
                .saturating_sub(PRIORITY_WINDOW / 2)
                .min(remaining.len() - PRIORITY_WINDOW);
            batches.push(remaining.drain(start..start + PRIORITY_WINDOW).collect());
        }
    }

    batches.extend(remaining.chunks(BATCH_SIZE).map(<[String]>::to_vec));
    batches
}
