use qst_core::derive_substream_seed;

const INIT_STREAM: u64 = 0;
const EPOCH_STREAM: u64 = 1;
const SAMPLING_STREAM: u64 = 2;

/// Seed used to initialise model parameters.
pub fn init_seed(master_seed: u64) -> u64 {
    derive_substream_seed(master_seed, INIT_STREAM)
}

/// Seed for the shuffling and Gibbs chains of one epoch.
///
/// Depends only on the epoch number, so a run resumed from a checkpoint
/// replays the same streams as an uninterrupted one.
pub fn epoch_seed(master_seed: u64, epoch: usize) -> u64 {
    let stream = derive_substream_seed(master_seed, EPOCH_STREAM);
    derive_substream_seed(stream, epoch as u64)
}

/// Seed for post-training sampling and observable estimation.
pub fn sampling_seed(master_seed: u64, slot: usize) -> u64 {
    let stream = derive_substream_seed(master_seed, SAMPLING_STREAM);
    derive_substream_seed(stream, slot as u64)
}
