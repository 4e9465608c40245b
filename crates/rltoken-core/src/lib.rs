//! Orchestrates components A-D into the rate-limited issuance protocol:
//! wire types for `TokenRequest`/`TokenResponse`/`Token`, the origin
//! registry, and the client/issuer-side steps that tie a blinded RSA-PSS
//! signature to an anonymous per-(client, origin) index.
//!
//! This plays the role `geph5-broker-protocol` plays for `mizaru2` in the
//! teacher workspace: a thin crate of plain data types plus orchestration
//! functions, with no transport trait of its own.

#![forbid(unsafe_code)]

mod error;
mod registry;
mod wire;
pub mod vectors;

pub use error::Error;
pub use registry::OriginRegistry;
pub use wire::{Token, TokenRequest, TokenResponse, TOKEN_TYPE};

pub use rltoken_ec::{EcPublicKey, EcScalar};
pub use rltoken_hpke::{PrivateNameKey, PublicNameKey};
pub use rltoken_rsa::{IssuerPrivateKey, IssuerPublicKey};

use rltoken_rsa::{Authenticator, BlindedMessage, BlindedSignature, PreparedState};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

/// Client-side scratch pad retained between [`create_token_request`] and
/// [`finalize_token`]. Opaque to callers; destroyed (and its scalar
/// material zeroized) after `finalize_token` consumes it.
pub struct TokenRequestState {
    nonce: [u8; 32],
    challenge_context: [u8; 32],
    token_key_id: [u8; 32],
    rsa_state: PreparedState,
    r: EcScalar,
    client_pk: EcPublicKey,
}

impl Drop for TokenRequestState {
    fn drop(&mut self) {
        self.nonce.zeroize();
        self.challenge_context.zeroize();
    }
}

/// `token_input = u16(token_type) || nonce[32] || challenge_context[32] ||
/// token_key_id[32]` — the canonical string the RSA-PSS signature is over.
fn build_token_input(nonce: &[u8; 32], challenge_context: &[u8; 32], token_key_id: &[u8; 32]) -> Vec<u8> {
    let mut input = Vec::with_capacity(2 + 32 + 32 + 32);
    input.extend_from_slice(&TOKEN_TYPE.to_be_bytes());
    input.extend_from_slice(nonce);
    input.extend_from_slice(challenge_context);
    input.extend_from_slice(token_key_id);
    input
}

/// `compute_index(client_pk_enc, index_key_enc) = SHA-256(u16_be(len) ||
/// client_pk_enc || u16_be(len) || index_key_enc)`. The length framing is
/// mandatory and part of the wire contract, not an implementation detail.
pub fn compute_index(client_pk_enc: &[u8], index_key_enc: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update((client_pk_enc.len() as u16).to_be_bytes());
    hasher.update(client_pk_enc);
    hasher.update((index_key_enc.len() as u16).to_be_bytes());
    hasher.update(index_key_enc);
    hasher.finalize().into()
}

/// Client step: forms a blinded request for a token bound to `origin_name`,
/// deriving `request_key` from `blind_scalar` and `client_pk`.
///
/// `blind_scalar` is supplied by the caller rather than sampled internally,
/// so that test harnesses can reproduce deterministic vectors by
/// substituting a fixed value; only the PSS blinding factor and the HPKE
/// ephemeral key are drawn from `rng`.
#[tracing::instrument(skip_all, fields(origin_name = origin_name))]
pub fn create_token_request<R: rand::RngCore + rand::CryptoRng>(
    challenge: &[u8],
    nonce: [u8; 32],
    blind_scalar: &[u8],
    client_pk: &EcPublicKey,
    issuer_pk: &IssuerPublicKey,
    issuer_name_pk: &PublicNameKey,
    origin_name: &str,
    rng: &mut R,
) -> Result<(TokenRequest, TokenRequestState), Error> {
    match create_token_request_inner(
        challenge,
        nonce,
        blind_scalar,
        client_pk,
        issuer_pk,
        issuer_name_pk,
        origin_name,
        rng,
    ) {
        Ok(out) => {
            tracing::debug!("created token request");
            Ok(out)
        }
        Err(e) => {
            tracing::warn!(err = %e, "failed to create token request");
            Err(e)
        }
    }
}

fn create_token_request_inner<R: rand::RngCore + rand::CryptoRng>(
    challenge: &[u8],
    nonce: [u8; 32],
    blind_scalar: &[u8],
    client_pk: &EcPublicKey,
    issuer_pk: &IssuerPublicKey,
    issuer_name_pk: &PublicNameKey,
    origin_name: &str,
    rng: &mut R,
) -> Result<(TokenRequest, TokenRequestState), Error> {
    let r = rltoken_ec::EcScalar::from_be_bytes_mod_order(blind_scalar)?;
    let request_key = rltoken_ec::blind_public_key(client_pk, &r)?;
    let request_key_enc = request_key.to_bytes();

    let token_key_id = issuer_pk.token_key_id()?;
    let token_key_id_byte = token_key_id[0];

    let challenge_context: [u8; 32] = Sha256::digest(challenge).into();
    let token_input = build_token_input(&nonce, &challenge_context, &token_key_id);

    let (blinded_msg, rsa_state) = rltoken_rsa::prepare(issuer_pk, &token_input, rng)?;

    let encrypted_origin_name = rltoken_hpke::encrypt_origin_name(
        issuer_name_pk,
        token_key_id_byte,
        &blinded_msg.0,
        &request_key_enc,
        origin_name,
        rng,
    )?;

    let request = TokenRequest {
        token_key_id_byte,
        blinded_msg: blinded_msg.0.clone(),
        request_key: request_key_enc,
        encrypted_origin_name,
    };
    let state = TokenRequestState {
        nonce,
        challenge_context,
        token_key_id,
        rsa_state,
        r,
        client_pk: *client_pk,
    };
    Ok((request, state))
}

/// Issuer step: decrypts the origin name, looks up its index key, signs the
/// blinded message, and returns the blinded response. Touches no issuer
/// state on failure — a rejected request never mutates `registry`.
#[tracing::instrument(skip_all)]
pub fn evaluate<R: rand::RngCore + rand::CryptoRng>(
    registry: &OriginRegistry,
    sk: &IssuerPrivateKey,
    sk_name: &PrivateNameKey,
    request: &TokenRequest,
    rng: &mut R,
) -> Result<TokenResponse, Error> {
    match evaluate_inner(registry, sk, sk_name, request, rng) {
        Ok(out) => {
            tracing::debug!("evaluated token request");
            Ok(out)
        }
        Err(e) => {
            tracing::warn!(err = %e, "rejected token request");
            Err(e)
        }
    }
}

fn evaluate_inner<R: rand::RngCore + rand::CryptoRng>(
    registry: &OriginRegistry,
    sk: &IssuerPrivateKey,
    sk_name: &PrivateNameKey,
    request: &TokenRequest,
    rng: &mut R,
) -> Result<TokenResponse, Error> {
    let request_key = EcPublicKey::from_bytes(&request.request_key)?;

    let origin_name = rltoken_hpke::decrypt_origin_name(
        sk_name,
        request.token_key_id_byte,
        &request.blinded_msg,
        &request.request_key,
        &request.encrypted_origin_name,
    )?;

    let origin_index_sk = registry.origin_index_key(&origin_name)?;
    let blinded_request_key = rltoken_ec::blind_public_key(&request_key, &origin_index_sk)?;

    let blinded_msg = BlindedMessage(request.blinded_msg.clone());
    let blinded_signature = rltoken_rsa::evaluate(sk, &blinded_msg, rng)?;

    Ok(TokenResponse {
        blinded_signature: blinded_signature.0,
        blinded_request_key: blinded_request_key.to_bytes(),
    })
}

/// Client step: unblinds the signature and the response's index key,
/// producing the finalized `Token` and its `anon_origin_id`. Consumes
/// `state`.
#[tracing::instrument(skip_all)]
pub fn finalize_token(
    issuer_pk: &IssuerPublicKey,
    state: TokenRequestState,
    response: &TokenResponse,
) -> Result<(Token, [u8; 32]), Error> {
    match finalize_token_inner(issuer_pk, state, response) {
        Ok(out) => {
            tracing::debug!("finalized token");
            Ok(out)
        }
        Err(e) => {
            tracing::warn!(err = %e, "failed to finalize token");
            Err(e)
        }
    }
}

fn finalize_token_inner(
    issuer_pk: &IssuerPublicKey,
    state: TokenRequestState,
    response: &TokenResponse,
) -> Result<(Token, [u8; 32]), Error> {
    if response.blinded_request_key.len() != rltoken_ec::ENCODED_POINT_LEN {
        return Err(Error::MalformedRequest);
    }
    let blinded_request_key = EcPublicKey::from_bytes(&response.blinded_request_key)?;
    let index_key = rltoken_ec::unblind_public_key(&blinded_request_key, &state.r)?;

    let client_pk_enc = state.client_pk.to_bytes();
    let index_key_enc = index_key.to_bytes();
    let anon_origin_id = compute_index(&client_pk_enc, &index_key_enc);

    let blinded_sig = BlindedSignature(response.blinded_signature.clone());
    let nonce = state.nonce;
    let challenge_context = state.challenge_context;
    let token_key_id = state.token_key_id;
    let authenticator: Authenticator = rltoken_rsa::finalize(issuer_pk, state.rsa_state, &blinded_sig)?;

    let token = Token {
        token_type: TOKEN_TYPE,
        nonce,
        challenge_context,
        token_key_id,
        authenticator: authenticator.0,
    };
    Ok((token, anon_origin_id))
}

/// Verifies a finalized [`Token`]'s authenticator under the issuer's RSA
/// public key, reconstructing the canonical token input from the token's
/// own fields.
pub fn verify_token(issuer_pk: &IssuerPublicKey, token: &Token) -> Result<(), Error> {
    if token.token_type != TOKEN_TYPE {
        return Err(Error::UnsupportedSuite);
    }
    let token_input = build_token_input(&token.nonce, &token.challenge_context, &token.token_key_id);
    rltoken_rsa::verify(
        issuer_pk,
        &token_input,
        &Authenticator(token.authenticator.clone()),
    )?;
    Ok(())
}

/// Origin-side check: given a presented `(client_pk, anon_origin_id)` and
/// the origin's own index key (obtained from the issuer out of band),
/// recomputes the index independently and compares.
pub fn verify_anon_origin_id(
    registry: &OriginRegistry,
    origin_name: &str,
    client_pk: &EcPublicKey,
    anon_origin_id: &[u8; 32],
) -> Result<bool, Error> {
    let origin_index_sk = registry.origin_index_key(origin_name)?;
    let index_key = rltoken_ec::blind_public_key(client_pk, &origin_index_sk)?;
    let computed = compute_index(&client_pk.to_bytes(), &index_key.to_bytes());
    Ok(&computed == anon_origin_id)
}
