//! Server-side implementation of Publicly Verifiable Token protocol.

use std::fmt;

use blind_rsa_signatures::{KeyPair, PublicKey};
use log::{debug, warn};
use rand::{CryptoRng, RngCore};

use crate::{
    TokenKeyId, TruncatedTokenKeyId,
    auth::authenticate::{PrivateToken, RedemptionContext},
    common::{
        blind_rsa::{BlindRsa, Rsabssa},
        errors::{CreateKeypairError, IssueTokenResponseError, KeyMaterialError},
    },
    truncate_token_key_id,
};

use super::{
    KEYSIZE_IN_BITS, TokenRequest, TokenResponse, build_private_token, serialize_public_key,
    token_key_to_token_key_id,
};

/// Issuer side of the Publicly Verifiable Token protocol.
///
/// The issuer holds a single keypair and is stateless between requests. The
/// secret key is never exposed.
pub struct IssuerServer<B: BlindRsa = Rsabssa> {
    name: String,
    key_pair: KeyPair,
    token_key: Vec<u8>,
    token_key_id: TokenKeyId,
    blind_rsa: B,
}

impl<B: BlindRsa> fmt::Debug for IssuerServer<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuerServer")
            .field("name", &self.name)
            .field("truncated_token_key_id", &self.truncated_token_key_id())
            .field("blind_rsa", &self.blind_rsa)
            .finish_non_exhaustive()
    }
}

impl IssuerServer {
    /// Creates a new issuer from an existing keypair.
    ///
    /// # Errors
    /// Returns an error if the public key cannot be exported.
    pub fn new(name: impl Into<String>, key_pair: KeyPair) -> Result<Self, KeyMaterialError> {
        Self::with_blind_rsa(name, key_pair, Rsabssa)
    }

    /// Creates a new issuer with a freshly generated 2048-bit keypair.
    ///
    /// # Errors
    /// Returns an error if creating the keypair fails.
    pub fn generate<R: RngCore + CryptoRng>(
        rng: &mut R,
        name: impl Into<String>,
    ) -> Result<Self, CreateKeypairError> {
        let key_pair = KeyPair::generate(rng, KEYSIZE_IN_BITS)
            .inspect_err(|e| warn!(error:% = e; "Failed to generate keypair"))
            .map_err(|_| CreateKeypairError::KeyGenerationError)?;
        Ok(Self::new(name, key_pair)?)
    }
}

impl<B: BlindRsa> IssuerServer<B> {
    /// Creates a new issuer on top of a specific blind RSA implementation.
    ///
    /// # Errors
    /// Returns an error if the public key cannot be exported.
    pub fn with_blind_rsa(
        name: impl Into<String>,
        key_pair: KeyPair,
        blind_rsa: B,
    ) -> Result<Self, KeyMaterialError> {
        let token_key = serialize_public_key(&key_pair.pk)?;
        let token_key_id = token_key_to_token_key_id(&token_key);
        Ok(Self {
            name: name.into(),
            key_pair,
            token_key,
            token_key_id,
            blind_rsa,
        })
    }

    /// Returns the issuer name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the issuer's public key.
    #[must_use]
    pub const fn public_key(&self) -> &PublicKey {
        &self.key_pair.pk
    }

    /// Returns the serialized public key, as published to clients.
    #[must_use]
    pub fn token_key(&self) -> &[u8] {
        &self.token_key
    }

    /// Returns the token key ID.
    #[must_use]
    pub const fn token_key_id(&self) -> &TokenKeyId {
        &self.token_key_id
    }

    /// Returns the truncated token key ID clients put into their requests.
    #[must_use]
    pub fn truncated_token_key_id(&self) -> TruncatedTokenKeyId {
        truncate_token_key_id(&self.token_key_id)
    }

    /// Builds a [`PrivateToken`] for this issuer.
    ///
    /// # Errors
    /// Returns an error if the public key cannot be exported.
    pub fn private_token(
        &self,
        redemption_context: Option<RedemptionContext>,
        origin_info: &[String],
        max_age: Option<usize>,
    ) -> Result<PrivateToken, KeyMaterialError> {
        build_private_token(
            &self.name,
            &self.key_pair.pk,
            redemption_context,
            origin_info,
            max_age,
        )
    }

    /// Issues a new token response.
    ///
    /// # Errors
    /// Returns an error if the request was made for another key or cannot be
    /// signed.
    pub fn issue_token_response<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        token_request: &TokenRequest,
    ) -> Result<TokenResponse, IssueTokenResponseError> {
        if token_request.truncated_token_key_id() != self.truncated_token_key_id() {
            debug!(
                truncated_token_key_id = token_request.truncated_token_key_id();
                "Token request for unknown key"
            );
            return Err(IssueTokenResponseError::KeyIdMismatch);
        }

        // blind_sig = rsabssa_blind_sign(skI, TokenRequest.blinded_msg)
        let blind_sig = self
            .blind_rsa
            .blind_sign(rng, &self.key_pair.sk, token_request.blinded_msg())
            .inspect_err(|e| warn!(error:% = e; "Failed to blind sign token request"))
            .map_err(|_| IssueTokenResponseError::BlindSigningError)?;

        TokenResponse::new(&blind_sig.0).map_err(|_| IssueTokenResponseError::BlindSigningError)
    }
}
