use crate::Error;

/// The only token type this protocol issues.
pub const TOKEN_TYPE: u16 = 0x0003;

const EC_POINT_LEN: usize = rltoken_ec::ENCODED_POINT_LEN;

/// `u8 token_key_id || u8[k] blinded_msg || u8[49] request_key || u16
/// len_enc_name || u8[len_enc_name] encrypted_origin_name`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenRequest {
    pub token_key_id_byte: u8,
    pub blinded_msg: Vec<u8>,
    pub request_key: [u8; EC_POINT_LEN],
    pub encrypted_origin_name: Vec<u8>,
}

impl TokenRequest {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            1 + self.blinded_msg.len() + EC_POINT_LEN + 2 + self.encrypted_origin_name.len(),
        );
        out.push(self.token_key_id_byte);
        out.extend_from_slice(&self.blinded_msg);
        out.extend_from_slice(&self.request_key);
        out.extend_from_slice(&(self.encrypted_origin_name.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.encrypted_origin_name);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let header_len = 1 + rltoken_rsa::MODULUS_LEN + EC_POINT_LEN + 2;
        if bytes.len() < header_len {
            return Err(Error::MalformedRequest);
        }
        let token_key_id_byte = bytes[0];
        let mut offset = 1;

        let blinded_msg = bytes[offset..offset + rltoken_rsa::MODULUS_LEN].to_vec();
        offset += rltoken_rsa::MODULUS_LEN;

        let mut request_key = [0u8; EC_POINT_LEN];
        request_key.copy_from_slice(&bytes[offset..offset + EC_POINT_LEN]);
        offset += EC_POINT_LEN;

        let len_enc_name = u16::from_be_bytes([bytes[offset], bytes[offset + 1]]) as usize;
        offset += 2;

        if bytes.len() != offset + len_enc_name {
            return Err(Error::MalformedRequest);
        }
        let encrypted_origin_name = bytes[offset..offset + len_enc_name].to_vec();

        Ok(TokenRequest {
            token_key_id_byte,
            blinded_msg,
            request_key,
            encrypted_origin_name,
        })
    }
}

/// `u8[k] blinded_signature || u8[49] blinded_request_key`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenResponse {
    pub blinded_signature: Vec<u8>,
    pub blinded_request_key: [u8; EC_POINT_LEN],
}

impl TokenResponse {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.blinded_signature.len() + EC_POINT_LEN);
        out.extend_from_slice(&self.blinded_signature);
        out.extend_from_slice(&self.blinded_request_key);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != rltoken_rsa::MODULUS_LEN + EC_POINT_LEN {
            return Err(Error::MalformedRequest);
        }
        let blinded_signature = bytes[..rltoken_rsa::MODULUS_LEN].to_vec();
        let mut blinded_request_key = [0u8; EC_POINT_LEN];
        blinded_request_key.copy_from_slice(&bytes[rltoken_rsa::MODULUS_LEN..]);
        Ok(TokenResponse {
            blinded_signature,
            blinded_request_key,
        })
    }
}

/// `u16 token_type=0x0003 || u8[32] nonce || u8[32] challenge_context ||
/// u8[32] token_key_id || u8[k] authenticator`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub token_type: u16,
    pub nonce: [u8; 32],
    pub challenge_context: [u8; 32],
    pub token_key_id: [u8; 32],
    pub authenticator: Vec<u8>,
}

impl Token {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + 32 + 32 + 32 + self.authenticator.len());
        out.extend_from_slice(&self.token_type.to_be_bytes());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.challenge_context);
        out.extend_from_slice(&self.token_key_id);
        out.extend_from_slice(&self.authenticator);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != 2 + 32 + 32 + 32 + rltoken_rsa::MODULUS_LEN {
            return Err(Error::MalformedRequest);
        }
        let token_type = u16::from_be_bytes([bytes[0], bytes[1]]);
        if token_type != TOKEN_TYPE {
            return Err(Error::UnsupportedSuite);
        }
        let mut offset = 2;
        let mut nonce = [0u8; 32];
        nonce.copy_from_slice(&bytes[offset..offset + 32]);
        offset += 32;
        let mut challenge_context = [0u8; 32];
        challenge_context.copy_from_slice(&bytes[offset..offset + 32]);
        offset += 32;
        let mut token_key_id = [0u8; 32];
        token_key_id.copy_from_slice(&bytes[offset..offset + 32]);
        offset += 32;
        let authenticator = bytes[offset..].to_vec();

        Ok(Token {
            token_type,
            nonce,
            challenge_context,
            token_key_id,
            authenticator,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_request_roundtrips() {
        let request = TokenRequest {
            token_key_id_byte: 0x42,
            blinded_msg: vec![0xab; rltoken_rsa::MODULUS_LEN],
            request_key: [0x01; EC_POINT_LEN],
            encrypted_origin_name: vec![0x99; 60],
        };
        let bytes = request.to_bytes();
        let decoded = TokenRequest::from_bytes(&bytes).unwrap();
        assert_eq!(request, decoded);
    }

    #[test]
    fn token_request_rejects_truncated_input() {
        let bytes = vec![0u8; 10];
        assert_eq!(
            TokenRequest::from_bytes(&bytes).unwrap_err(),
            Error::MalformedRequest
        );
    }

    #[test]
    fn token_roundtrips() {
        let token = Token {
            token_type: TOKEN_TYPE,
            nonce: [0x11; 32],
            challenge_context: [0x22; 32],
            token_key_id: [0x33; 32],
            authenticator: vec![0xaa; rltoken_rsa::MODULUS_LEN],
        };
        let bytes = token.to_bytes();
        let decoded = Token::from_bytes(&bytes).unwrap();
        assert_eq!(token, decoded);
    }

    #[test]
    fn token_rejects_wrong_token_type() {
        let mut token = Token {
            token_type: TOKEN_TYPE,
            nonce: [0u8; 32],
            challenge_context: [0u8; 32],
            token_key_id: [0u8; 32],
            authenticator: vec![0u8; rltoken_rsa::MODULUS_LEN],
        };
        token.token_type = 0x0004;
        let bytes = token.to_bytes();
        assert_eq!(Token::from_bytes(&bytes).unwrap_err(), Error::UnsupportedSuite);
    }
}
