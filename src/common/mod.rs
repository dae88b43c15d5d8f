//! Types and seams shared by the client, issuer and verifier.

pub mod blind_rsa;
pub mod errors;
