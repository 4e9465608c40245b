//! JSON test-vector interchange types, hex-encoded fields, consumed
//! verbatim. Two shapes: `origin_encryption` exercises HPKE origin-name
//! sealing in isolation, and `anon_origin_id` exercises the EC
//! blind/unblind chain that produces the anonymous index. Both are
//! optional — nothing in the core depends on these types at runtime.

use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use sha2::{Digest, Sha256};

use crate::Error;

/// DHKEM-X25519, the only KEM this protocol recognizes.
pub const CANONICAL_KEM_ID: u16 = 0x0020;
/// HKDF-SHA256, the only KDF this protocol recognizes.
pub const CANONICAL_KDF_ID: u16 = 0x0001;
/// AES-128-GCM, the only AEAD this protocol recognizes.
pub const CANONICAL_AEAD_ID: u16 = 0x0001;

/// A test vector for HPKE origin-name sealing.
#[serde_as]
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OriginEncryptionVector {
    pub kem_id: u16,
    pub kdf_id: u16,
    pub aead_id: u16,
    #[serde_as(as = "serde_with::hex::Hex")]
    pub origin_name_key_seed: Vec<u8>,
    #[serde_as(as = "serde_with::hex::Hex")]
    pub origin_name_key: Vec<u8>,
    pub token_type: u16,
    #[serde_as(as = "serde_with::hex::Hex")]
    pub origin_name_key_id: Vec<u8>,
    #[serde_as(as = "serde_with::hex::Hex")]
    pub request_key: Vec<u8>,
    #[serde_as(as = "serde_with::hex::Hex")]
    pub token_key_id: Vec<u8>,
    #[serde_as(as = "serde_with::hex::Hex")]
    pub blinded_msg: Vec<u8>,
    pub origin_name: String,
    #[serde_as(as = "serde_with::hex::Hex")]
    pub encrypted_origin_name: Vec<u8>,
}

impl OriginEncryptionVector {
    /// Replays the vector: rejects any non-canonical ciphersuite before
    /// deriving the HPKE key pair, then checks that `origin_name_key` and
    /// `origin_name_key_id` match what `origin_name_key_seed` derives, and
    /// that `encrypted_origin_name` decrypts back to `origin_name`.
    pub fn verify(&self) -> Result<(), Error> {
        if self.kem_id != CANONICAL_KEM_ID
            || self.kdf_id != CANONICAL_KDF_ID
            || self.aead_id != CANONICAL_AEAD_ID
            || self.token_type != crate::TOKEN_TYPE
        {
            return Err(Error::UnsupportedSuite);
        }

        let seed: [u8; 32] = self
            .origin_name_key_seed
            .as_slice()
            .try_into()
            .map_err(|_| Error::MalformedRequest)?;
        let sk_name = rltoken_hpke::PrivateNameKey::from_seed(&seed)?;
        let pk_name = sk_name.public();

        if pk_name.marshal() != self.origin_name_key {
            return Err(Error::MalformedRequest);
        }
        let name_key_id: [u8; 32] = Sha256::digest(&self.origin_name_key).into();
        if name_key_id.as_slice() != self.origin_name_key_id {
            return Err(Error::MalformedRequest);
        }

        let token_key_id_byte = *self.token_key_id.first().ok_or(Error::MalformedRequest)?;
        let decrypted = rltoken_hpke::decrypt_origin_name(
            &sk_name,
            token_key_id_byte,
            &self.blinded_msg,
            &self.request_key,
            &self.encrypted_origin_name,
        )?;
        if decrypted != self.origin_name {
            return Err(Error::MalformedRequest);
        }
        Ok(())
    }
}

/// A test vector for the EC blind/unblind chain that produces an
/// anonymous origin index: `sk_sign`/`pk_sign` is the client's long-term
/// key pair, `sk_origin` is the issuer's per-origin scalar, `request_blind`
/// is the client's fresh per-issuance scalar `r`.
#[serde_as]
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AnonOriginIdVector {
    #[serde_as(as = "serde_with::hex::Hex")]
    pub sk_sign: Vec<u8>,
    #[serde_as(as = "serde_with::hex::Hex")]
    pub pk_sign: Vec<u8>,
    #[serde_as(as = "serde_with::hex::Hex")]
    pub sk_origin: Vec<u8>,
    #[serde_as(as = "serde_with::hex::Hex")]
    pub request_blind: Vec<u8>,
    #[serde_as(as = "serde_with::hex::Hex")]
    pub request_key: Vec<u8>,
    #[serde_as(as = "serde_with::hex::Hex")]
    pub index_key: Vec<u8>,
    #[serde_as(as = "serde_with::hex::Hex")]
    pub anon_issuer_origin_id: Vec<u8>,
}

impl AnonOriginIdVector {
    /// Replays the EC blind/unblind chain from the raw scalars and checks
    /// every intermediate and final value against the vector.
    pub fn verify(&self) -> Result<(), Error> {
        let client_key = rltoken_ec::create_key(&self.sk_sign)?;
        if client_key.public.to_bytes().as_slice() != self.pk_sign {
            return Err(Error::MalformedRequest);
        }

        let origin_sk = rltoken_ec::EcScalar::from_be_bytes_mod_order(&self.sk_origin)?;
        let r = rltoken_ec::EcScalar::from_be_bytes_mod_order(&self.request_blind)?;

        let request_key = rltoken_ec::blind_public_key(&client_key.public, &r)?;
        if request_key.to_bytes().as_slice() != self.request_key {
            return Err(Error::MalformedRequest);
        }

        let blinded_request_key = rltoken_ec::blind_public_key(&request_key, &origin_sk)?;
        let index_key = rltoken_ec::unblind_public_key(&blinded_request_key, &r)?;
        if index_key.to_bytes().as_slice() != self.index_key {
            return Err(Error::MalformedRequest);
        }

        let anon_id = crate::compute_index(&client_key.public.to_bytes(), &index_key.to_bytes());
        if anon_id.as_slice() != self.anon_issuer_origin_id {
            return Err(Error::MalformedRequest);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn origin_encryption_vector_roundtrips() {
        let seed = [21u8; 32];
        let sk_name = rltoken_hpke::PrivateNameKey::from_seed(&seed).unwrap();
        let pk_name = sk_name.public();
        let origin_name_key = pk_name.marshal();
        let origin_name_key_id: [u8; 32] = Sha256::digest(&origin_name_key).into();

        let blinded_msg = vec![0x55u8; 64];
        let request_key = vec![0x66u8; rltoken_ec::ENCODED_POINT_LEN];
        let token_key_id = vec![0x07u8];

        let encrypted_origin_name = rltoken_hpke::encrypt_origin_name(
            &pk_name,
            token_key_id[0],
            &blinded_msg,
            &request_key,
            "origin.example",
            &mut OsRng,
        )
        .unwrap();

        let vector = OriginEncryptionVector {
            kem_id: CANONICAL_KEM_ID,
            kdf_id: CANONICAL_KDF_ID,
            aead_id: CANONICAL_AEAD_ID,
            origin_name_key_seed: seed.to_vec(),
            origin_name_key,
            token_type: crate::TOKEN_TYPE,
            origin_name_key_id: origin_name_key_id.to_vec(),
            request_key,
            token_key_id,
            blinded_msg,
            origin_name: "origin.example".to_string(),
            encrypted_origin_name,
        };
        vector.verify().unwrap();
    }

    #[test]
    fn origin_encryption_vector_rejects_foreign_suite() {
        let mut vector = OriginEncryptionVector {
            kem_id: CANONICAL_KEM_ID,
            kdf_id: CANONICAL_KDF_ID,
            aead_id: CANONICAL_AEAD_ID,
            origin_name_key_seed: vec![0u8; 32],
            origin_name_key: vec![0u8; 32],
            token_type: crate::TOKEN_TYPE,
            origin_name_key_id: vec![0u8; 32],
            request_key: vec![0u8; rltoken_ec::ENCODED_POINT_LEN],
            token_key_id: vec![0u8],
            blinded_msg: vec![0u8; 16],
            origin_name: "origin.example".to_string(),
            encrypted_origin_name: vec![0u8; 48],
        };
        vector.kem_id = 0x0010;
        assert_eq!(vector.verify().unwrap_err(), Error::UnsupportedSuite);
    }

    #[test]
    fn anon_origin_id_vector_roundtrips() {
        let client = rltoken_ec::create_key(&[9u8; 48]).unwrap();
        let origin_sk_bytes = [3u8; 48];
        let r_bytes = [5u8; 48];

        let origin_sk = rltoken_ec::EcScalar::from_be_bytes_mod_order(&origin_sk_bytes).unwrap();
        let r = rltoken_ec::EcScalar::from_be_bytes_mod_order(&r_bytes).unwrap();

        let request_key = rltoken_ec::blind_public_key(&client.public, &r).unwrap();
        let blinded_request_key = rltoken_ec::blind_public_key(&request_key, &origin_sk).unwrap();
        let index_key = rltoken_ec::unblind_public_key(&blinded_request_key, &r).unwrap();
        let anon_id = crate::compute_index(&client.public.to_bytes(), &index_key.to_bytes());

        let vector = AnonOriginIdVector {
            sk_sign: vec![9u8; 48],
            pk_sign: client.public.to_bytes().to_vec(),
            sk_origin: origin_sk_bytes.to_vec(),
            request_blind: r_bytes.to_vec(),
            request_key: request_key.to_bytes().to_vec(),
            index_key: index_key.to_bytes().to_vec(),
            anon_issuer_origin_id: anon_id.to_vec(),
        };
        vector.verify().unwrap();
    }
}
