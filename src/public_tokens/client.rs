//! Client-side implementation of the Publicly Verifiable Token protocol.

use std::fmt;

use blind_rsa_signatures::{BlindSignature, BlindingResult, PublicKey};
use log::{debug, warn};
use rand::{CryptoRng, RngCore};

use crate::{
    NK, Nonce, TokenPayload, TokenType,
    auth::{authenticate::PrivateToken, authorize::Token},
    common::{
        blind_rsa::{BlindRsa, Rsabssa},
        errors::{IssueTokenError, IssueTokenRequestError},
    },
    truncate_token_key_id,
};

use super::{TokenRequest, TokenResponse, deserialize_public_key, token_key_to_token_key_id};

/// State that is kept between the token request and the token response.
///
/// It holds the blinding inverse and must be handed back to
/// [`Client::issue_token`] together with the response to the request it was
/// created with. It is consumed there, so a state can only be finalized once.
pub struct TokenState {
    token_payload: TokenPayload,
    blinding_result: BlindingResult,
    public_key: PublicKey,
}

impl TokenState {
    /// Returns the payload that will be signed.
    #[must_use]
    pub const fn token_payload(&self) -> &TokenPayload {
        &self.token_payload
    }
}

impl fmt::Debug for TokenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenState")
            .field("token_payload", &self.token_payload)
            .finish_non_exhaustive()
    }
}

/// The client side of the Publicly Verifiable Token protocol.
///
/// [`Client::issue_token_request`] and [`Client::issue_token`] pass the
/// blinding state explicitly and can be used for any number of concurrent
/// requests. [`Client::create_token_request`] and [`Client::finalize`] keep
/// a single pending state inside the client instead.
#[derive(Debug, Default)]
pub struct Client<B: BlindRsa = Rsabssa> {
    blind_rsa: B,
    pending: Option<TokenState>,
}

impl Client {
    /// Create a new client.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            blind_rsa: Rsabssa,
            pending: None,
        }
    }
}

impl<B: BlindRsa> Client<B> {
    /// Create a new client on top of a specific blind RSA implementation.
    #[must_use]
    pub const fn with_blind_rsa(blind_rsa: B) -> Self {
        Self {
            blind_rsa,
            pending: None,
        }
    }

    /// Issue a token request.
    ///
    /// # Errors
    /// Returns an error if the challenge is invalid, the token key cannot be
    /// imported or blinding fails.
    pub fn issue_token_request<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        private_token: &PrivateToken,
    ) -> Result<(TokenRequest, TokenState), IssueTokenRequestError> {
        let mut nonce: Nonce = [0u8; 32];
        rng.fill_bytes(&mut nonce);

        let challenge_digest = private_token
            .challenge()
            .digest()
            .map_err(|_| IssueTokenRequestError::InvalidTokenChallenge)?;

        let token_key_id = token_key_to_token_key_id(private_token.token_key());

        // nonce = random(32)
        // challenge_digest = SHA256(challenge)
        // token_input = concat(0x0002, nonce, challenge_digest, token_key_id)
        // blinded_msg, blind_inv = rsabssa_blind(pkI, token_input)

        let token_payload =
            TokenPayload::new(TokenType::Public, nonce, challenge_digest, token_key_id);

        let public_key = deserialize_public_key(private_token.token_key())?;

        let blinding_result = self
            .blind_rsa
            .blind(rng, &public_key, &token_payload.serialize())
            .inspect_err(|e| warn!(error:% = e; "Failed to blind token input"))
            .map_err(|_| IssueTokenRequestError::BlindingError)?;

        let truncated_token_key_id = truncate_token_key_id(&token_key_id);
        let token_request = TokenRequest::new(truncated_token_key_id, &blinding_result.blind_msg.0)
            .inspect_err(|e| warn!(error:% = e; "Blinded message does not match the token type"))
            .map_err(|_| IssueTokenRequestError::BlindingError)?;

        debug!(truncated_token_key_id = truncated_token_key_id; "Created token request");

        let token_state = TokenState {
            token_payload,
            blinding_result,
            public_key,
        };
        Ok((token_request, token_state))
    }

    /// Issue a token.
    ///
    /// # Errors
    /// Returns an error if the token response does not finalize into a valid
    /// signature for the state's payload.
    pub fn issue_token(
        &self,
        token_response: TokenResponse,
        token_state: TokenState,
    ) -> Result<Token, IssueTokenError> {
        // authenticator = rsabssa_finalize(pkI, token_input, blind_sig, blind_inv)
        let TokenState {
            token_payload,
            blinding_result,
            public_key,
        } = token_state;
        let blind_sig = BlindSignature(token_response.blind_sig().to_vec());
        let signature = self
            .blind_rsa
            .finalize(
                &public_key,
                &blind_sig,
                &blinding_result,
                &token_payload.serialize(),
            )
            .inspect_err(|e| warn!(error:% = e; "Failed to finalize blind signature"))
            .map_err(|_| IssueTokenError::InvalidTokenResponse)?;
        let authenticator: [u8; NK] = signature
            .0
            .as_slice()
            .try_into()
            .map_err(|_| IssueTokenError::InvalidTokenResponse)?;
        Ok(Token::new(token_payload, authenticator))
    }

    /// Issue a token request and keep its state as the pending request of
    /// this client. A previously pending request is discarded and can no
    /// longer be finalized.
    ///
    /// # Errors
    /// Returns an error if the challenge is invalid, the token key cannot be
    /// imported or blinding fails. No request is pending afterwards.
    pub fn create_token_request<R: RngCore + CryptoRng>(
        &mut self,
        rng: &mut R,
        private_token: &PrivateToken,
    ) -> Result<TokenRequest, IssueTokenRequestError> {
        if self.pending.take().is_some() {
            debug!("Discarding pending token request");
        }
        let (token_request, token_state) = self.issue_token_request(rng, private_token)?;
        self.pending = Some(token_state);
        Ok(token_request)
    }

    /// Finalize the pending token request with the issuer's response. The
    /// pending state is cleared whether finalization succeeds or not.
    ///
    /// # Errors
    /// Returns an error if no request is pending or the response is invalid.
    pub fn finalize(&mut self, token_response: TokenResponse) -> Result<Token, IssueTokenError> {
        let token_state = self
            .pending
            .take()
            .ok_or(IssueTokenError::NoPendingRequest)?;
        self.issue_token(token_response, token_state)
    }

    /// Returns `true` if a token request is waiting for its response.
    #[must_use]
    pub const fn has_pending_request(&self) -> bool {
        self.pending.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::authenticate::TokenChallenge,
        public_tokens::{KEYSIZE_IN_BITS, KeyPair, build_private_token},
    };
    use rand::rngs::OsRng;

    #[test]
    fn request_binds_challenge_and_key() {
        let key_pair = KeyPair::generate(&mut OsRng, KEYSIZE_IN_BITS).unwrap();
        let private_token = build_private_token(
            "issuer.example",
            &key_pair.pk,
            Some([1u8; 32]),
            &["origin.example".to_string()],
            None,
        )
        .unwrap();

        let client = Client::new();
        let (token_request, token_state) = client
            .issue_token_request(&mut OsRng, &private_token)
            .unwrap();

        let payload = token_state.token_payload();
        assert_eq!(
            payload.challenge_digest(),
            &private_token.challenge().digest().unwrap()
        );
        assert_eq!(
            payload.token_key_id(),
            &token_key_to_token_key_id(private_token.token_key())
        );
        assert_eq!(
            token_request.truncated_token_key_id(),
            truncate_token_key_id(payload.token_key_id())
        );
        // The blinded message does not reveal the payload
        assert_ne!(&token_request.blinded_msg()[..TokenPayload::SIZE], payload.serialize());
        assert!(!format!("{token_state:?}").contains("blinding_result"));
    }

    #[test]
    fn invalid_token_key() {
        let challenge = TokenChallenge::new(TokenType::Public, "issuer.example", None, &[]);
        let private_token = PrivateToken::new(challenge, b"not a key".to_vec(), None);

        let mut client = Client::new();
        assert_eq!(
            client
                .create_token_request(&mut OsRng, &private_token)
                .unwrap_err(),
            IssueTokenRequestError::KeyMaterial(crate::common::errors::KeyMaterialError::Import)
        );
        assert!(!client.has_pending_request());
    }

    #[test]
    fn finalize_without_request() {
        let mut client = Client::new();
        let response = TokenResponse::new(&[0u8; NK]).unwrap();
        assert_eq!(
            client.finalize(response).unwrap_err(),
            IssueTokenError::NoPendingRequest
        );
    }
}
