use std::collections::HashMap;
use std::sync::RwLock;

use sha2::{Digest, Sha384};

use crate::Error;

const ORIGIN_INDEX_DOMAIN: &[u8] = b"rltoken-core/origin-index/v1";

/// Maps origin names to their per-origin EC scalar (`origin_index_sk`),
/// guarded by a reader-writer lock: `evaluate` and `origin_index_key` take
/// the read lock, `add_origin` takes the write lock.
///
/// Scalars are derived deterministically from a 32-byte issuer master
/// secret and the origin name, so a restarted issuer recovers the same
/// `origin_index_sk` for every previously registered origin without
/// persisting a table of scalars itself.
pub struct OriginRegistry {
    master_secret: [u8; 32],
    index: RwLock<HashMap<String, rltoken_ec::EcScalar>>,
}

impl OriginRegistry {
    pub fn new(master_secret: [u8; 32]) -> Self {
        OriginRegistry {
            master_secret,
            index: RwLock::new(HashMap::new()),
        }
    }

    /// Derives (if not already present) and stores `origin_index_sk` for
    /// `name`. Idempotent: re-registering an already-known origin is a
    /// no-op, since the derivation is deterministic in `name`.
    pub fn add_origin(&self, name: &str) -> Result<(), Error> {
        let mut index = self.index.write().expect("origin registry lock poisoned");
        if !index.contains_key(name) {
            let scalar = derive_origin_scalar(&self.master_secret, name)?;
            index.insert(name.to_string(), scalar);
        }
        Ok(())
    }

    /// Looks up `origin_index_sk` for `name`. Fails with
    /// [`Error::UnknownOrigin`] if `name` has not been registered via
    /// [`add_origin`].
    pub fn origin_index_key(&self, name: &str) -> Result<rltoken_ec::EcScalar, Error> {
        let index = self.index.read().expect("origin registry lock poisoned");
        index.get(name).cloned().ok_or(Error::UnknownOrigin)
    }
}

fn derive_origin_scalar(master_secret: &[u8; 32], name: &str) -> Result<rltoken_ec::EcScalar, Error> {
    let mut hasher = Sha384::new();
    hasher.update(ORIGIN_INDEX_DOMAIN);
    hasher.update(master_secret);
    hasher.update(name.as_bytes());
    let digest = hasher.finalize();
    Ok(rltoken_ec::EcScalar::from_be_bytes_mod_order(&digest)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_origin_is_deterministic() {
        let registry = OriginRegistry::new([42u8; 32]);
        registry.add_origin("origin.example").unwrap();
        let a = registry.origin_index_key("origin.example").unwrap();
        registry.add_origin("origin.example").unwrap();
        let b = registry.origin_index_key("origin.example").unwrap();
        // Re-deriving must reach the same point on the curve.
        let base = rltoken_ec::generate_key(&mut rand::rngs::OsRng).public;
        let pa = rltoken_ec::blind_public_key(&base, &a).unwrap();
        let pb = rltoken_ec::blind_public_key(&base, &b).unwrap();
        assert_eq!(pa.to_bytes(), pb.to_bytes());
    }

    #[test]
    fn unregistered_origin_is_unknown() {
        let registry = OriginRegistry::new([1u8; 32]);
        assert_eq!(
            registry.origin_index_key("nowhere.example").unwrap_err(),
            Error::UnknownOrigin
        );
    }

    #[test]
    fn distinct_origins_derive_distinct_scalars() {
        let registry = OriginRegistry::new([3u8; 32]);
        registry.add_origin("a.example").unwrap();
        registry.add_origin("b.example").unwrap();
        let sk_a = registry.origin_index_key("a.example").unwrap();
        let sk_b = registry.origin_index_key("b.example").unwrap();
        let base = rltoken_ec::generate_key(&mut rand::rngs::OsRng).public;
        let pa = rltoken_ec::blind_public_key(&base, &sk_a).unwrap();
        let pb = rltoken_ec::blind_public_key(&base, &sk_b).unwrap();
        assert_ne!(pa.to_bytes(), pb.to_bytes());
    }
}
