//! Transport that serves token requests from in-process issuers.
use async_trait::async_trait;
use http::StatusCode;
use rand::rngs::OsRng;
use std::collections::HashMap;

use crate::{
    TokenType,
    common::errors::TransportError,
    public_tokens::{TokenRequest, TokenResponse, server::IssuerServer},
    transport::{
        IssuerDirectory, IssuerTransport, build_token_request, parse_token_response,
        serve_token_request,
    },
};

/// Routes token requests to issuers living in the same process. Every
/// exchange goes through the same HTTP framing a networked transport uses.
#[derive(Default, Debug)]
pub struct LocalTransport {
    issuers: HashMap<String, (IssuerDirectory, IssuerServer)>,
}

impl LocalTransport {
    /// Registers an issuer under its name.
    #[must_use]
    pub fn with_issuer(mut self, issuer: IssuerServer) -> Self {
        let directory = IssuerDirectory::new("/token-request")
            .with_token_key(TokenType::Public, issuer.token_key());
        self.issuers
            .insert(issuer.name().to_string(), (directory, issuer));
        self
    }

    /// Returns the directory of a registered issuer.
    #[must_use]
    pub fn directory(&self, issuer_name: &str) -> Option<&IssuerDirectory> {
        self.issuers.get(issuer_name).map(|(directory, _)| directory)
    }
}

#[async_trait]
impl IssuerTransport for LocalTransport {
    async fn send_token_request(
        &self,
        issuer_name: &str,
        token_request: &TokenRequest,
    ) -> Result<TokenResponse, TransportError> {
        let Some((directory, issuer)) = self.issuers.get(issuer_name) else {
            return Err(TransportError::UnexpectedStatus(StatusCode::NOT_FOUND));
        };
        let uri = directory.request_uri(issuer_name)?;
        let request = build_token_request(uri, token_request)?;
        let response = serve_token_request(issuer, &mut OsRng, &request);
        parse_token_response(&response)
    }
}
