use rand::rngs::OsRng;
use tls_codec::Serialize;

use privacypass_public::{
    NK, TokenPayload, TokenType,
    auth::{authenticate::TokenChallenge, authorize::Token},
    common::errors::IssueTokenError,
    public_tokens::{
        TokenRequest, TokenResponse, build_private_token,
        client::Client,
        server::IssuerServer,
        verifier::{Verifier, verify, verify_with_token_key},
    },
};

#[test]
fn public_tokens_cycle() {
    let rng = &mut OsRng;

    // Issuer: Create a new keypair
    let issuer = IssuerServer::generate(rng, "issuer.example").unwrap();

    // Client: Receive the challenge and the issuer's key
    let private_token =
        build_private_token("issuer.example", issuer.public_key(), None, &[], Some(3600)).unwrap();
    assert_eq!(private_token.max_age(), Some(3600));

    // Client: Create client
    let mut client = Client::new();

    // Client: Prepare a TokenRequest after having received a challenge
    let token_request = client.create_token_request(rng, &private_token).unwrap();
    assert!(client.has_pending_request());

    let token_request_bytes = token_request.tls_serialize_detached().unwrap();
    assert_eq!(token_request_bytes.len(), 259);
    assert_eq!(&token_request_bytes[..2], &[0x00, 0x02]);

    // Issuer: Issue a TokenResponse
    let token_request = TokenRequest::deserialize(&token_request_bytes).unwrap();
    let token_response = issuer.issue_token_response(rng, &token_request).unwrap();
    let token_response_bytes = token_response.tls_serialize_detached().unwrap();
    assert_eq!(token_response_bytes.len(), 256);

    // Client: Turn the TokenResponse into a Token
    let token_response = TokenResponse::deserialize(&token_response_bytes).unwrap();
    let token = client.finalize(token_response).unwrap();
    assert!(!client.has_pending_request());

    assert_eq!(token.payload().serialize().len(), 98);
    assert_eq!(token.authenticator().len(), 256);
    assert_eq!(
        token.payload().challenge_digest(),
        &private_token.challenge().digest().unwrap()
    );

    // Verifier: Check the token with the issuer's public key
    assert_eq!(verify(issuer.public_key(), &token), Ok(true));
    assert_eq!(verify_with_token_key(issuer.token_key(), &token), Ok(true));

    // The token survives serialization
    let token = Token::deserialize(&token.serialize()).unwrap();
    assert_eq!(verify(issuer.public_key(), &token), Ok(true));
}

#[test]
fn concurrent_requests() {
    let rng = &mut OsRng;
    let issuer = IssuerServer::generate(rng, "issuer.example").unwrap();
    let private_token = issuer
        .private_token(Some([7u8; 32]), &["origin.example".to_string()], None)
        .unwrap();
    let verifier = Verifier::from_token_key(private_token.token_key()).unwrap();

    let client = Client::new();
    let (first_request, first_state) = client.issue_token_request(rng, &private_token).unwrap();
    let (second_request, second_state) = client.issue_token_request(rng, &private_token).unwrap();

    // Fresh nonces and blinds for every request
    assert_ne!(
        first_state.token_payload().nonce(),
        second_state.token_payload().nonce()
    );
    assert_ne!(first_request.blinded_msg(), second_request.blinded_msg());

    // Responses can be finalized in any order
    let second_response = issuer.issue_token_response(rng, &second_request).unwrap();
    let first_response = issuer.issue_token_response(rng, &first_request).unwrap();
    let second_token = client.issue_token(second_response, second_state).unwrap();
    let first_token = client.issue_token(first_response, first_state).unwrap();

    assert!(verifier.verify(&first_token));
    assert!(verifier.verify(&second_token));
    assert_ne!(first_token.authenticator(), second_token.authenticator());
}

#[test]
fn finalize_is_one_shot() {
    let rng = &mut OsRng;
    let issuer = IssuerServer::generate(rng, "issuer.example").unwrap();
    let private_token = issuer.private_token(None, &[], None).unwrap();

    let mut client = Client::new();
    let token_request = client.create_token_request(rng, &private_token).unwrap();
    let token_response = issuer.issue_token_response(rng, &token_request).unwrap();

    assert!(client.finalize(token_response.clone()).is_ok());
    assert_eq!(
        client.finalize(token_response),
        Err(IssueTokenError::NoPendingRequest)
    );

    // A failed finalization clears the pending request as well
    client.create_token_request(rng, &private_token).unwrap();
    let bogus_response = TokenResponse::new(&[1u8; NK]).unwrap();
    assert_eq!(
        client.finalize(bogus_response.clone()),
        Err(IssueTokenError::InvalidTokenResponse)
    );
    assert_eq!(
        client.finalize(bogus_response),
        Err(IssueTokenError::NoPendingRequest)
    );
}

#[test]
fn new_request_replaces_pending_request() {
    let rng = &mut OsRng;
    let issuer = IssuerServer::generate(rng, "issuer.example").unwrap();
    let private_token = issuer.private_token(None, &[], None).unwrap();

    // The request that replaced the pending one finalizes
    let mut client = Client::new();
    let _discarded_request = client.create_token_request(rng, &private_token).unwrap();
    let current_request = client.create_token_request(rng, &private_token).unwrap();
    let current_response = issuer.issue_token_response(rng, &current_request).unwrap();
    let token = client.finalize(current_response).unwrap();
    assert_eq!(verify(issuer.public_key(), &token), Ok(true));
    assert!(!client.has_pending_request());

    // The response to a discarded request does not finalize anymore
    let mut client = Client::new();
    let stale_request = client.create_token_request(rng, &private_token).unwrap();
    client.create_token_request(rng, &private_token).unwrap();
    let stale_response = issuer.issue_token_response(rng, &stale_request).unwrap();
    assert_eq!(
        client.finalize(stale_response),
        Err(IssueTokenError::InvalidTokenResponse)
    );
    assert!(!client.has_pending_request());
}

#[test]
fn negative_verification() {
    let rng = &mut OsRng;
    let issuer = IssuerServer::generate(rng, "issuer.example").unwrap();
    let other_issuer = IssuerServer::generate(rng, "other.example").unwrap();
    let private_token = issuer.private_token(None, &[], None).unwrap();

    let client = Client::new();
    let (token_request, token_state) = client.issue_token_request(rng, &private_token).unwrap();
    let token_response = issuer.issue_token_response(rng, &token_request).unwrap();
    let token = client.issue_token(token_response, token_state).unwrap();
    assert_eq!(verify(issuer.public_key(), &token), Ok(true));

    // Flipped authenticator bit
    let mut authenticator = [0u8; NK];
    authenticator.copy_from_slice(token.authenticator());
    authenticator[NK - 1] ^= 0x01;
    let flipped = Token::new(token.payload().clone(), authenticator);
    assert_eq!(verify(issuer.public_key(), &flipped), Ok(false));

    // Different issuer
    assert_eq!(verify(other_issuer.public_key(), &token), Ok(false));

    // Payload bound to another key ID
    let payload = token.payload();
    let rebound = Token::from_slice(
        TokenPayload::new(
            TokenType::Public,
            payload.nonce(),
            *payload.challenge_digest(),
            *other_issuer.token_key_id(),
        ),
        token.authenticator(),
    )
    .unwrap();
    assert_eq!(verify(other_issuer.public_key(), &rebound), Ok(false));
}

#[test]
fn challenge_wire_format() {
    let challenge = TokenChallenge::new(
        TokenType::Public,
        "issuer.example",
        None,
        &["origin.example".to_string()],
    );
    assert_eq!(
        hex::encode(challenge.serialize().unwrap()),
        "0002000e6973737565722e6578616d706c6500000e6f726967696e2e6578616d706c65"
    );

    let challenge = TokenChallenge::new(TokenType::Public, "issuer.example", Some([0xab; 32]), &[]);
    let bytes = challenge.serialize().unwrap();
    assert_eq!(bytes[18], 32);
    assert_eq!(&bytes[19..51], &[0xab; 32]);
    assert_eq!(&bytes[51..], &[0x00, 0x00]);
}
