//! HPKE sealing of the origin name under the issuer's name key, bound to the
//! outer token request so a client cannot swap origins between two
//! in-flight requests.
//!
//! The ciphersuite is fixed: DHKEM-X25519, HKDF-SHA256, AES-128-GCM. Any
//! other suite is out of scope for this crate entirely — there is no
//! parameter to select one, which is the "reject before key derivation"
//! requirement made structural rather than checked at runtime.

#![forbid(unsafe_code)]

use hpke::{
    aead::AesGcm128, kdf::HkdfSha256, kem::X25519HkdfSha256, Deserializable, Kem as KemTrait,
    OpModeR, OpModeS, Serializable,
};
use rand_core::CryptoRngCore;
use thiserror::Error;

type Kem = X25519HkdfSha256;
type Kdf = HkdfSha256;
type Aead = AesGcm128;

/// The fixed prefix of the HPKE `info` string, binding the encrypted origin
/// name to the outer token request. Exposed as a constant so callers can
/// reference it rather than re-deriving the literal.
pub const TOKEN_REQUEST_INFO_PREFIX: &[u8] = b"TokenRequest";

/// Length in bytes of the KEM encapsulation (`enc`) for DHKEM-X25519.
pub const ENCAPPED_KEY_LEN: usize = 32;

/// Length in bytes of the AEAD authentication tag for AES-128-GCM.
pub const AEAD_TAG_LEN: usize = 16;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum HpkeNameError {
    /// The encapsulated key or ciphertext was the wrong length, or the HPKE
    /// setup failed.
    #[error("malformed HPKE input")]
    Malformed,
    /// The AEAD tag did not verify, or an HPKE internal error occurred
    /// during open.
    #[error("HPKE decryption failed")]
    DecryptFailure,
    /// The decrypted origin name was not valid UTF-8.
    #[error("decrypted origin name was not valid UTF-8")]
    InvalidOriginName,
}

/// The issuer's HPKE private key for origin-name sealing, derived
/// deterministically from a 32-byte seed via the KEM's `DeriveKeyPair`.
pub struct PrivateNameKey {
    sk: <Kem as KemTrait>::PrivateKey,
    pk: <Kem as KemTrait>::PublicKey,
}

/// The issuer's HPKE public key for origin-name sealing.
#[derive(Clone)]
pub struct PublicNameKey(<Kem as KemTrait>::PublicKey);

impl PrivateNameKey {
    /// Derives an HPKE key pair deterministically from `seed` using the
    /// KEM's `DeriveKeyPair` algorithm.
    pub fn from_seed(seed: &[u8; 32]) -> Result<Self, HpkeNameError> {
        let (sk, pk) = Kem::derive_keypair(seed).map_err(|_| HpkeNameError::Malformed)?;
        Ok(PrivateNameKey { sk, pk })
    }

    /// The matching public key, to be distributed to clients.
    pub fn public(&self) -> PublicNameKey {
        PublicNameKey(self.pk.clone())
    }
}

impl PublicNameKey {
    /// The canonical KEM public-key encoding (32 bytes for X25519).
    pub fn marshal(&self) -> Vec<u8> {
        self.0.to_bytes().to_vec()
    }

    /// Parses a canonical KEM public-key encoding.
    pub fn unmarshal(bytes: &[u8]) -> Result<Self, HpkeNameError> {
        let pk = <Kem as KemTrait>::PublicKey::from_bytes(bytes)
            .map_err(|_| HpkeNameError::Malformed)?;
        Ok(PublicNameKey(pk))
    }
}

fn build_info(token_key_id_byte: u8, blinded_msg: &[u8], index_request: &[u8]) -> Vec<u8> {
    let mut info = Vec::with_capacity(
        TOKEN_REQUEST_INFO_PREFIX.len() + 1 + blinded_msg.len() + index_request.len(),
    );
    info.extend_from_slice(TOKEN_REQUEST_INFO_PREFIX);
    info.push(token_key_id_byte);
    info.extend_from_slice(blinded_msg);
    info.extend_from_slice(index_request);
    info
}

/// Seals `origin_name` to `pk_name`, with `info = "TokenRequest" ||
/// token_key_id_byte || blinded_msg || index_request` and empty AAD.
/// Returns the on-wire `enc || ciphertext` concatenation.
pub fn encrypt_origin_name(
    pk_name: &PublicNameKey,
    token_key_id_byte: u8,
    blinded_msg: &[u8],
    index_request: &[u8],
    origin_name: &str,
    rng: &mut impl CryptoRngCore,
) -> Result<Vec<u8>, HpkeNameError> {
    let info = build_info(token_key_id_byte, blinded_msg, index_request);
    let (encapped_key, ciphertext) = hpke::single_shot_seal::<Aead, Kdf, Kem, _>(
        &OpModeS::Base,
        &pk_name.0,
        &info,
        origin_name.as_bytes(),
        &[],
        rng,
    )
    .map_err(|_| HpkeNameError::Malformed)?;

    let mut out = Vec::with_capacity(ENCAPPED_KEY_LEN + ciphertext.len());
    out.extend_from_slice(&encapped_key.to_bytes());
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Inverse of [`encrypt_origin_name`]. Fails with
/// [`HpkeNameError::DecryptFailure`] if the AEAD tag does not verify, or
/// with [`HpkeNameError::Malformed`] if `encrypted_origin_name` is too
/// short to contain a valid `enc`.
pub fn decrypt_origin_name(
    sk_name: &PrivateNameKey,
    token_key_id_byte: u8,
    blinded_msg: &[u8],
    index_request: &[u8],
    encrypted_origin_name: &[u8],
) -> Result<String, HpkeNameError> {
    if encrypted_origin_name.len() < ENCAPPED_KEY_LEN + AEAD_TAG_LEN {
        return Err(HpkeNameError::Malformed);
    }
    let (enc_bytes, ciphertext) = encrypted_origin_name.split_at(ENCAPPED_KEY_LEN);
    let encapped_key = <Kem as KemTrait>::EncappedKey::from_bytes(enc_bytes)
        .map_err(|_| HpkeNameError::Malformed)?;

    let info = build_info(token_key_id_byte, blinded_msg, index_request);
    let plaintext = hpke::single_shot_open::<Aead, Kdf, Kem>(
        &OpModeR::Base,
        &sk_name.sk,
        &encapped_key,
        &info,
        ciphertext,
        &[],
    )
    .map_err(|_| HpkeNameError::DecryptFailure)?;

    String::from_utf8(plaintext).map_err(|_| HpkeNameError::InvalidOriginName)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_core::OsRng;

    #[test]
    fn roundtrip() {
        let seed = [1u8; 32];
        let sk = PrivateNameKey::from_seed(&seed).unwrap();
        let pk = sk.public();

        let blinded_msg = b"fake-blinded-message";
        let index_request = b"fake-index-request-49-bytes-long-enough";

        let encrypted = encrypt_origin_name(
            &pk,
            0x07,
            blinded_msg,
            index_request,
            "origin.example",
            &mut OsRng,
        )
        .unwrap();

        let decrypted =
            decrypt_origin_name(&sk, 0x07, blinded_msg, index_request, &encrypted).unwrap();
        assert_eq!(decrypted, "origin.example");
    }

    #[test]
    fn tampering_blinded_msg_breaks_decryption() {
        let seed = [2u8; 32];
        let sk = PrivateNameKey::from_seed(&seed).unwrap();
        let pk = sk.public();

        let blinded_msg = b"fake-blinded-message";
        let index_request = b"fake-index-request-49-bytes-long-enough";

        let encrypted = encrypt_origin_name(
            &pk,
            0x01,
            blinded_msg,
            index_request,
            "origin.example",
            &mut OsRng,
        )
        .unwrap();

        let mut tampered_msg = blinded_msg.to_vec();
        tampered_msg[0] ^= 0x01;

        let result = decrypt_origin_name(&sk, 0x01, &tampered_msg, index_request, &encrypted);
        assert_eq!(result.unwrap_err(), HpkeNameError::DecryptFailure);
    }

    #[test]
    fn malformed_enc_is_rejected() {
        let seed = [3u8; 32];
        let sk = PrivateNameKey::from_seed(&seed).unwrap();

        let too_short = vec![0u8; 4];
        let result = decrypt_origin_name(&sk, 0x00, b"", b"", &too_short);
        assert_eq!(result.unwrap_err(), HpkeNameError::Malformed);
    }

    #[test]
    fn public_key_marshal_roundtrips() {
        let seed = [4u8; 32];
        let sk = PrivateNameKey::from_seed(&seed).unwrap();
        let marshaled = sk.public().marshal();
        let unmarshaled = PublicNameKey::unmarshal(&marshaled).unwrap();
        assert_eq!(unmarshaled.marshal(), marshaled);
    }
}
