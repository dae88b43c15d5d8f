//! HTTP framing of the issuance exchange and the seam to the network.
//!
//! The client POSTs a serialized [`TokenRequest`] to the issuer request URI
//! advertised in the issuer directory and receives a serialized
//! [`TokenResponse`]. Performing the actual HTTP exchange is left to an
//! [`IssuerTransport`] implementation.

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use http::{
    HeaderValue, Method, Request, Response, StatusCode, Uri,
    header::{ACCEPT, CONTENT_TYPE},
};
use log::{debug, warn};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use tls_codec::Serialize as TlsSerialize;

use crate::{
    TokenType,
    auth::{authenticate::PrivateToken, authorize::Token},
    common::{
        blind_rsa::BlindRsa,
        errors::{FetchTokenError, IssueTokenResponseError, TransportError},
    },
    public_tokens::{TokenRequest, TokenResponse, client::Client, server::IssuerServer},
};

/// Media type of a serialized token request
pub const TOKEN_REQUEST_MEDIA_TYPE: &str = "application/private-token-request";
/// Media type of a serialized token response
pub const TOKEN_RESPONSE_MEDIA_TYPE: &str = "application/private-token-response";
/// Well-known path of the issuer directory
pub const ISSUER_DIRECTORY_PATH: &str = "/.well-known/private-token-issuer-directory";

/// Returns the URI of the issuer directory of `issuer_name`.
///
/// # Errors
/// Returns an error if the issuer name is not a valid authority.
pub fn issuer_directory_uri(issuer_name: &str) -> Result<Uri, TransportError> {
    format!("https://{issuer_name}{ISSUER_DIRECTORY_PATH}")
        .parse()
        .map_err(|_| TransportError::InvalidUri)
}

/// A token key entry of the issuer directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TokenKeyEntry {
    /// Token type the key is used for
    pub token_type: u16,
    /// Base64url encoded token key
    pub token_key: String,
    /// Unix timestamp from which on the key is in use
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<u64>,
}

/// The issuer directory, published by an issuer at
/// [`ISSUER_DIRECTORY_PATH`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IssuerDirectory {
    /// URI token requests are sent to, absolute or relative to the issuer
    pub issuer_request_uri: String,
    /// Keys the issuer currently signs with
    pub token_keys: Vec<TokenKeyEntry>,
}

impl IssuerDirectory {
    /// Creates a directory without keys.
    #[must_use]
    pub fn new(issuer_request_uri: impl Into<String>) -> Self {
        Self {
            issuer_request_uri: issuer_request_uri.into(),
            token_keys: Vec::new(),
        }
    }

    /// Adds a token key to the directory.
    #[must_use]
    pub fn with_token_key(mut self, token_type: TokenType, token_key: &[u8]) -> Self {
        self.token_keys.push(TokenKeyEntry {
            token_type: token_type as u16,
            token_key: URL_SAFE_NO_PAD.encode(token_key),
            not_before: None,
        });
        self
    }

    /// Parses a JSON encoded directory.
    ///
    /// # Errors
    /// Returns an error if the document is not a valid directory.
    pub fn from_json(json: &[u8]) -> Result<Self, TransportError> {
        serde_json::from_slice(json)
            .inspect_err(|e| warn!(error:% = e; "Failed to parse issuer directory"))
            .map_err(|_| TransportError::InvalidDirectory)
    }

    /// Encodes the directory as JSON.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be encoded.
    pub fn to_json(&self) -> Result<Vec<u8>, TransportError> {
        serde_json::to_vec(self).map_err(|_| TransportError::InvalidDirectory)
    }

    /// Resolves the issuer request URI of the issuer `issuer_name`.
    ///
    /// # Errors
    /// Returns an error if the request URI is not valid.
    pub fn request_uri(&self, issuer_name: &str) -> Result<Uri, TransportError> {
        let uri = if self.issuer_request_uri.starts_with('/') {
            format!("https://{issuer_name}{}", self.issuer_request_uri)
        } else {
            self.issuer_request_uri.clone()
        };
        let uri: Uri = uri.parse().map_err(|_| TransportError::InvalidUri)?;
        if uri.scheme().is_none() || uri.authority().is_none() {
            return Err(TransportError::InvalidUri);
        }
        Ok(uri)
    }

    /// Returns the decoded token keys for the given token type.
    ///
    /// # Errors
    /// Returns an error if a key is not valid base64url.
    pub fn token_keys_for(&self, token_type: TokenType) -> Result<Vec<Vec<u8>>, TransportError> {
        self.token_keys
            .iter()
            .filter(|entry| entry.token_type == token_type as u16)
            .map(|entry| {
                URL_SAFE_NO_PAD
                    .decode(entry.token_key.trim_end_matches('='))
                    .map_err(|_| TransportError::InvalidDirectory)
            })
            .collect()
    }
}

fn has_content_type(headers: &http::HeaderMap, media_type: &str) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|value| value.trim().eq_ignore_ascii_case(media_type))
}

/// Frames a token request as an HTTP request to `uri`.
///
/// # Errors
/// Returns an error if the token request cannot be serialized.
pub fn build_token_request(
    uri: Uri,
    token_request: &TokenRequest,
) -> Result<Request<Vec<u8>>, TransportError> {
    let body = token_request
        .tls_serialize_detached()
        .map_err(|_| TransportError::InvalidRequest)?;
    let mut request = Request::new(body);
    *request.method_mut() = Method::POST;
    *request.uri_mut() = uri;
    let headers = request.headers_mut();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static(TOKEN_REQUEST_MEDIA_TYPE),
    );
    headers.insert(ACCEPT, HeaderValue::from_static(TOKEN_RESPONSE_MEDIA_TYPE));
    Ok(request)
}

/// Extracts the token request from an HTTP request.
///
/// # Errors
/// Returns an error if the request is not a POST with a token request body.
pub fn parse_token_request(request: &Request<Vec<u8>>) -> Result<TokenRequest, TransportError> {
    if request.method() != Method::POST {
        return Err(TransportError::InvalidRequest);
    }
    if !has_content_type(request.headers(), TOKEN_REQUEST_MEDIA_TYPE) {
        return Err(TransportError::UnexpectedContentType);
    }
    Ok(TokenRequest::deserialize(request.body())?)
}

/// Frames a token response as an HTTP response.
///
/// # Errors
/// Returns an error if the token response cannot be serialized.
pub fn build_token_response(
    token_response: &TokenResponse,
) -> Result<Response<Vec<u8>>, TransportError> {
    let body = token_response
        .tls_serialize_detached()
        .map_err(|_| TransportError::InvalidRequest)?;
    let mut response = Response::new(body);
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static(TOKEN_RESPONSE_MEDIA_TYPE),
    );
    Ok(response)
}

/// Extracts the token response from an HTTP response.
///
/// # Errors
/// Returns an error if the issuer did not answer with a token response.
pub fn parse_token_response(response: &Response<Vec<u8>>) -> Result<TokenResponse, TransportError> {
    if response.status() != StatusCode::OK {
        return Err(TransportError::UnexpectedStatus(response.status()));
    }
    if !has_content_type(response.headers(), TOKEN_RESPONSE_MEDIA_TYPE) {
        return Err(TransportError::UnexpectedContentType);
    }
    Ok(TokenResponse::deserialize(response.body())?)
}

fn error_response(status: StatusCode) -> Response<Vec<u8>> {
    let mut response = Response::new(Vec::new());
    *response.status_mut() = status;
    response
}

/// Answers an HTTP token request on behalf of `issuer`. Malformed requests
/// are answered with `400 Bad Request`, requests for another key with
/// `422 Unprocessable Entity`.
pub fn serve_token_request<B: BlindRsa, R: RngCore + CryptoRng>(
    issuer: &IssuerServer<B>,
    rng: &mut R,
    request: &Request<Vec<u8>>,
) -> Response<Vec<u8>> {
    let token_request = match parse_token_request(request) {
        Ok(token_request) => token_request,
        Err(e) => {
            debug!(error:% = e; "Rejecting token request");
            return error_response(StatusCode::BAD_REQUEST);
        }
    };
    let result = issuer
        .issue_token_response(rng, &token_request)
        .map_err(TransportError::from)
        .and_then(|token_response| build_token_response(&token_response));
    match result {
        Ok(response) => response,
        Err(TransportError::Issuer(IssueTokenResponseError::KeyIdMismatch)) => {
            error_response(StatusCode::UNPROCESSABLE_ENTITY)
        }
        Err(_) => error_response(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

/// Delivers token requests to issuers.
#[async_trait]
pub trait IssuerTransport: Send + Sync {
    /// Sends `token_request` to the issuer `issuer_name` and returns its
    /// response.
    async fn send_token_request(
        &self,
        issuer_name: &str,
        token_request: &TokenRequest,
    ) -> Result<TokenResponse, TransportError>;
}

/// Runs the client side of the issuance protocol for `private_token` over
/// `transport`.
///
/// # Errors
/// Returns an error if creating the request, the exchange with the issuer or
/// the finalization of the token fails.
pub async fn fetch_token<T: IssuerTransport, B: BlindRsa, R: RngCore + CryptoRng>(
    transport: &T,
    rng: &mut R,
    client: &Client<B>,
    private_token: &PrivateToken,
) -> Result<Token, FetchTokenError> {
    let (token_request, token_state) = client.issue_token_request(rng, private_token)?;
    let issuer_name = private_token.challenge().issuer_name();
    let token_response = transport
        .send_token_request(&issuer_name, &token_request)
        .await?;
    Ok(client.issue_token(token_response, token_state)?)
}
