use thiserror::Error;

/// The seven error kinds the protocol distinguishes. `MalformedRequest`,
/// `UnknownOrigin`, and `DecryptFailure` must be indistinguishable in
/// timing to a network attacker; callers that forward failures to a
/// transport should collapse all three to a single "rejected" status and
/// reserve the precise variant for local logging.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// EC scalar is zero or could not be parsed.
    #[error("invalid EC scalar")]
    InvalidScalar,
    /// EC operation produced the identity point, or a malformed encoding.
    #[error("invalid EC point")]
    InvalidPoint,
    /// Wire lengths wrong, or `blinded_msg >= N`.
    #[error("malformed request")]
    MalformedRequest,
    /// HPKE open failed: AEAD tag mismatch or malformed encapsulation.
    #[error("HPKE decryption failed")]
    DecryptFailure,
    /// Decrypted origin name is not in the origin registry.
    #[error("unknown origin")]
    UnknownOrigin,
    /// Unblinded RSA-PSS signature failed verification.
    #[error("invalid signature")]
    InvalidSignature,
    /// Non-canonical HPKE ciphersuite or token type.
    #[error("unsupported suite")]
    UnsupportedSuite,
}

impl From<rltoken_ec::EcError> for Error {
    fn from(e: rltoken_ec::EcError) -> Self {
        match e {
            rltoken_ec::EcError::InvalidScalar => Error::InvalidScalar,
            rltoken_ec::EcError::InvalidPoint => Error::InvalidPoint,
        }
    }
}

impl From<rltoken_hpke::HpkeNameError> for Error {
    fn from(e: rltoken_hpke::HpkeNameError) -> Self {
        match e {
            rltoken_hpke::HpkeNameError::Malformed => Error::MalformedRequest,
            rltoken_hpke::HpkeNameError::DecryptFailure => Error::DecryptFailure,
            rltoken_hpke::HpkeNameError::InvalidOriginName => Error::MalformedRequest,
        }
    }
}

impl From<rltoken_rsa::RsaTokenError> for Error {
    fn from(e: rltoken_rsa::RsaTokenError) -> Self {
        match e {
            rltoken_rsa::RsaTokenError::MalformedRequest => Error::MalformedRequest,
            rltoken_rsa::RsaTokenError::InvalidSignature => Error::InvalidSignature,
            // Not separately observable to a network attacker; folded into
            // a uniform "rejected" status.
            rltoken_rsa::RsaTokenError::OperationFailed => Error::MalformedRequest,
        }
    }
}
