//! Verification of Publicly Verifiable Tokens.
//!
//! Any relying party that knows the issuer's public key can check a token;
//! no secret is involved.

use blind_rsa_signatures::{PublicKey, Signature};
use log::debug;

use crate::{
    TokenKeyId, TokenType,
    auth::authorize::Token,
    common::{
        blind_rsa::{BlindRsa, Rsabssa},
        errors::{KeyMaterialError, VerifyTokenError},
    },
};

use super::{deserialize_public_key, public_key_to_token_key_id, token_key_to_token_key_id};

/// Checks tokens issued under a single issuer key.
#[derive(Debug)]
pub struct Verifier<B: BlindRsa = Rsabssa> {
    public_key: PublicKey,
    token_key_id: TokenKeyId,
    blind_rsa: B,
}

impl Verifier {
    /// Creates a verifier for the given issuer public key.
    ///
    /// # Errors
    /// Returns an error if the public key cannot be exported.
    pub fn new(public_key: PublicKey) -> Result<Self, KeyMaterialError> {
        Self::with_blind_rsa(public_key, Rsabssa)
    }

    /// Creates a verifier from a serialized token key.
    ///
    /// # Errors
    /// Returns an error if the token key cannot be imported.
    pub fn from_token_key(token_key: &[u8]) -> Result<Self, KeyMaterialError> {
        Ok(Self {
            public_key: deserialize_public_key(token_key)?,
            token_key_id: token_key_to_token_key_id(token_key),
            blind_rsa: Rsabssa,
        })
    }
}

impl<B: BlindRsa> Verifier<B> {
    /// Creates a verifier on top of a specific blind RSA implementation.
    ///
    /// # Errors
    /// Returns an error if the public key cannot be exported.
    pub fn with_blind_rsa(public_key: PublicKey, blind_rsa: B) -> Result<Self, KeyMaterialError> {
        let token_key_id = public_key_to_token_key_id(&public_key)?;
        Ok(Self {
            public_key,
            token_key_id,
            blind_rsa,
        })
    }

    /// Returns the token key ID of the issuer key.
    #[must_use]
    pub const fn token_key_id(&self) -> &TokenKeyId {
        &self.token_key_id
    }

    /// Verifies the token's authenticator over its payload. Returns `false`
    /// if the token was issued under another key or the signature does not
    /// verify.
    #[must_use]
    pub fn verify(&self, token: &Token) -> bool {
        if token.token_type() != TokenType::Public {
            return false;
        }
        if token.payload().token_key_id() != &self.token_key_id {
            debug!("Token was issued under another key");
            return false;
        }
        let signature = Signature(token.authenticator().to_vec());
        self.blind_rsa
            .verify(&self.public_key, &signature, &token.payload().serialize())
    }
}

/// Verifies a token against the issuer's public key.
///
/// # Errors
/// Returns an error if the public key cannot be exported.
pub fn verify(public_key: &PublicKey, token: &Token) -> Result<bool, VerifyTokenError> {
    Ok(Verifier::new(public_key.clone())?.verify(token))
}

/// Verifies a token against the issuer's serialized token key.
///
/// # Errors
/// Returns an error if the token key cannot be imported.
pub fn verify_with_token_key(token_key: &[u8], token: &Token) -> Result<bool, VerifyTokenError> {
    Ok(Verifier::from_token_key(token_key)?.verify(token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        NK, TokenPayload,
        public_tokens::{KEYSIZE_IN_BITS, KeyPair, serialize_public_key},
    };
    use rand::rngs::OsRng;

    #[test]
    fn rejects_forged_tokens() {
        let key_pair = KeyPair::generate(&mut OsRng, KEYSIZE_IN_BITS).unwrap();
        let verifier = Verifier::new(key_pair.pk.clone()).unwrap();

        let payload =
            TokenPayload::new(TokenType::Public, [0u8; 32], [0u8; 32], *verifier.token_key_id());
        let token = Token::new(payload, [0x55; NK]);
        assert!(!verifier.verify(&token));
        assert_eq!(verify(&key_pair.pk, &token), Ok(false));

        let token_key = serialize_public_key(&key_pair.pk).unwrap();
        assert_eq!(verify_with_token_key(&token_key, &token), Ok(false));
        assert_eq!(
            verify_with_token_key(&token_key[..10], &token),
            Err(VerifyTokenError::KeyMaterial(KeyMaterialError::Import))
        );
    }
}
