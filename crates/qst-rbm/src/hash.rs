use sha2::{Digest, Sha256};

use crate::rbm::BinaryRbm;
use crate::wavefunction::ModelKind;

fn update_network(hasher: &mut Sha256, rbm: &BinaryRbm) {
    hasher.update((rbm.num_visible() as u64).to_le_bytes());
    hasher.update((rbm.num_hidden() as u64).to_le_bytes());
    for value in rbm
        .weights()
        .iter()
        .chain(rbm.visible_bias().iter())
        .chain(rbm.hidden_bias().iter())
    {
        hasher.update(value.to_bits().to_le_bytes());
    }
}

/// Computes the canonical parameter hash for a model.
///
/// The digest covers the family, every shape and the exact bit pattern of
/// every parameter, so two models hash equal only if they are bit-identical.
pub fn params_hash(kind: ModelKind, networks: &[&BinaryRbm]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_str().as_bytes());
    hasher.update((networks.len() as u64).to_le_bytes());
    for rbm in networks {
        update_network(&mut hasher, rbm);
    }
    hex::encode(hasher.finalize())
}
