//! Multiplicative EC key-blinding over P-384.
//!
//! These primitives hold no notion of "client", "issuer", or "origin" — they
//! only know about scalars and points on a single named curve. The
//! rate-limited-issuance orchestrator (`rltoken-core`) is what gives them
//! meaning.

#![forbid(unsafe_code)]

use elliptic_curve::{
    ops::Reduce,
    sec1::{FromEncodedPoint, ToEncodedPoint},
    Field,
};
use p384::{AffinePoint, EncodedPoint, NistP384, ProjectivePoint, Scalar};
use rand_core::CryptoRngCore;
use thiserror::Error;
use zeroize::Zeroizing;

/// The fixed-width SEC1 compressed encoding of a P-384 public key: one tag
/// byte plus a 48-byte field element.
pub const ENCODED_POINT_LEN: usize = 49;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum EcError {
    /// The scalar was zero, or the encoded bytes could not be parsed.
    #[error("invalid EC scalar")]
    InvalidScalar,
    /// The operation produced the point at infinity, or a point could not be
    /// decoded from its encoding.
    #[error("invalid EC point")]
    InvalidPoint,
}

/// An EC private scalar. The canonical 48-byte big-endian encoding is the
/// actual backing store (wrapped in [`Zeroizing`]) rather than a `p384`
/// `Scalar` value, so drop genuinely wipes the secret rather than an
/// unrelated copy of it. Never serialized in compressed point form — only
/// [`EcPublicKey`] is.
#[derive(Clone)]
pub struct EcScalar(Zeroizing<[u8; 48]>);

impl EcScalar {
    /// Interprets `bytes` as a big-endian integer, reduced modulo the curve
    /// order `n`. Fails if the reduced value is zero.
    pub fn from_be_bytes_mod_order(bytes: &[u8]) -> Result<Self, EcError> {
        let reduced = reduce_be_bytes(bytes);
        if bool::from(reduced.is_zero()) {
            return Err(EcError::InvalidScalar);
        }
        Ok(EcScalar::from_reduced(reduced))
    }

    fn from_reduced(scalar: Scalar) -> Self {
        let field_bytes = scalar.to_bytes();
        let mut buf = [0u8; 48];
        buf.copy_from_slice(field_bytes.as_slice());
        EcScalar(Zeroizing::new(buf))
    }

    /// Reconstructs the `p384` scalar from the zeroized canonical backing
    /// store. Cheap (a single reduction of an already-reduced value), and
    /// never holds the reconstructed `Scalar` any longer than the call that
    /// needs it.
    fn inner(&self) -> Scalar {
        let field_bytes = elliptic_curve::FieldBytes::<NistP384>::clone_from_slice(&self.0[..]);
        Scalar::reduce_bytes(&field_bytes)
    }
}

/// An EC public key, always carried as a validated curve point. Serializes
/// to the 49-byte SEC1 compressed encoding required by the wire format.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct EcPublicKey(AffinePoint);

impl EcPublicKey {
    /// Encodes this key as compressed SEC1: `02/03 || X`, 49 bytes wide.
    pub fn to_bytes(&self) -> [u8; ENCODED_POINT_LEN] {
        let encoded = self.0.to_encoded_point(true);
        let mut out = [0u8; ENCODED_POINT_LEN];
        out.copy_from_slice(encoded.as_bytes());
        out
    }

    /// Decodes a compressed SEC1 point, rejecting the identity and any
    /// malformed encoding.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EcError> {
        let encoded = EncodedPoint::from_bytes(bytes).map_err(|_| EcError::InvalidPoint)?;
        let affine = Option::<AffinePoint>::from(AffinePoint::from_encoded_point(&encoded))
            .ok_or(EcError::InvalidPoint)?;
        if bool::from(ProjectivePoint::from(affine).is_identity()) {
            return Err(EcError::InvalidPoint);
        }
        Ok(EcPublicKey(affine))
    }

    fn from_projective(p: ProjectivePoint) -> Result<Self, EcError> {
        if bool::from(p.is_identity()) {
            return Err(EcError::InvalidPoint);
        }
        Ok(EcPublicKey(p.to_affine()))
    }
}

/// A keypair produced by [`create_key`] or [`generate_key`].
pub struct EcKeyPair {
    pub private: EcScalar,
    pub public: EcPublicKey,
}

/// Interprets `scalar_bytes` as a big-endian integer modulo the curve order,
/// and derives the matching public key `d * G`. Fails with
/// [`EcError::InvalidScalar`] if the reduced scalar is zero.
pub fn create_key(scalar_bytes: &[u8]) -> Result<EcKeyPair, EcError> {
    let private = EcScalar::from_be_bytes_mod_order(scalar_bytes)?;
    let public = EcPublicKey::from_projective(ProjectivePoint::GENERATOR * private.inner())?;
    Ok(EcKeyPair { private, public })
}

/// Samples a uniformly random private scalar in `[1, n-1]` and derives its
/// public key.
pub fn generate_key(rng: &mut impl CryptoRngCore) -> EcKeyPair {
    loop {
        let candidate = Scalar::random(&mut *rng);
        if !bool::from(candidate.is_zero()) {
            let private = EcScalar::from_reduced(candidate);
            let public = EcPublicKey::from_projective(ProjectivePoint::GENERATOR * private.inner())
                .expect("non-zero scalar times generator is never the identity");
            return EcKeyPair { private, public };
        }
    }
}

/// Returns `r * pk`. Fails with [`EcError::InvalidPoint`] if the result is
/// the point at infinity (which cannot happen for a non-zero `r` and a valid
/// `pk`, but is checked regardless since this is an externally observable
/// contract).
pub fn blind_public_key(pk: &EcPublicKey, r: &EcScalar) -> Result<EcPublicKey, EcError> {
    EcPublicKey::from_projective(ProjectivePoint::from(pk.0) * r.inner())
}

/// Returns `r^-1 * pk`, inverting `r` modulo the curve order. `r` must be
/// non-zero, which [`EcScalar`] already guarantees by construction.
pub fn unblind_public_key(pk: &EcPublicKey, r: &EcScalar) -> Result<EcPublicKey, EcError> {
    let inv = Option::<Scalar>::from(r.inner().invert()).ok_or(EcError::InvalidScalar)?;
    EcPublicKey::from_projective(ProjectivePoint::from(pk.0) * inv)
}

/// Left-pads `bytes` (at most 48 of them) into the 48-byte big-endian field
/// used by P-384 scalar reduction.
fn pad_to_48(bytes: &[u8]) -> elliptic_curve::FieldBytes<NistP384> {
    debug_assert!(bytes.len() <= 48);
    let mut wide = [0u8; 48];
    wide[48 - bytes.len()..].copy_from_slice(bytes);
    wide.into()
}

/// Reduces an arbitrary-length big-endian integer modulo the curve order.
/// Inputs of 48 bytes or fewer reduce directly; longer inputs are folded in
/// 48-byte big-endian windows via Horner's method (`acc = acc * 2^384 +
/// window`), so no high-order bytes are silently dropped.
fn reduce_be_bytes(bytes: &[u8]) -> Scalar {
    if bytes.len() <= 48 {
        return Scalar::reduce_bytes(&pad_to_48(bytes));
    }

    let window_shift = two_pow_384_mod_n();
    let first_len = {
        let rem = bytes.len() % 48;
        if rem == 0 {
            48
        } else {
            rem
        }
    };

    let mut acc = Scalar::reduce_bytes(&pad_to_48(&bytes[..first_len]));
    let mut offset = first_len;
    while offset < bytes.len() {
        let window = &bytes[offset..offset + 48];
        let window_scalar = Scalar::reduce_bytes(&pad_to_48(window));
        acc = acc * window_shift + window_scalar;
        offset += 48;
    }
    acc
}

/// `2^384 mod n`, the Horner multiplier for folding one more 48-byte window
/// into an accumulated scalar. Computed by square-and-multiply over the
/// scalar field rather than stored as a precomputed constant, since it is
/// only ever needed for the rare over-length scalar input.
fn two_pow_384_mod_n() -> Scalar {
    let mut result = Scalar::ONE;
    let mut base = Scalar::from(2u64);
    let mut exponent: u32 = 384;
    while exponent > 0 {
        if exponent & 1 == 1 {
            result *= base;
        }
        base = base * base;
        exponent >>= 1;
    }
    result
}
