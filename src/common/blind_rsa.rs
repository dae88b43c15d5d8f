//! Blind RSA capability used by the client, the issuer and the verifier.
//!
//! The protocol code never touches the RSA arithmetic directly. It goes
//! through [`BlindRsa`], which [`Rsabssa`] implements on top of the
//! `blind-rsa-signatures` crate with the RSABSSA-SHA384-PSS-Deterministic
//! parameters (SHA-384, PSS encoding with a 48-byte salt, no message
//! randomization).

use std::fmt::Debug;

use blind_rsa_signatures::{
    BlindSignature, BlindingResult, Error, Options, PublicKey, SecretKey, Signature,
};
use rand::{CryptoRng, RngCore};

/// Operations of a blind RSA signature scheme.
pub trait BlindRsa: Debug + Send + Sync {
    /// Blinds `msg` for the holder of `public_key`. The returned result
    /// contains the blinded message and the secret blinding inverse.
    ///
    /// # Errors
    /// Returns an error if the message cannot be encoded or blinded.
    fn blind<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        public_key: &PublicKey,
        msg: &[u8],
    ) -> Result<BlindingResult, Error>;

    /// Signs a blinded message. The signature only depends on the key and the
    /// blinded message; `rng` is used for side-channel protection.
    ///
    /// # Errors
    /// Returns an error if the blinded message is not valid for the key.
    fn blind_sign<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        secret_key: &SecretKey,
        blinded_msg: &[u8],
    ) -> Result<BlindSignature, Error>;

    /// Unblinds a blind signature and checks it against `msg`.
    ///
    /// # Errors
    /// Returns an error if the resulting signature is not valid.
    fn finalize(
        &self,
        public_key: &PublicKey,
        blind_sig: &BlindSignature,
        blinding_result: &BlindingResult,
        msg: &[u8],
    ) -> Result<Signature, Error>;

    /// Verifies a finalized signature over `msg`.
    fn verify(&self, public_key: &PublicKey, signature: &Signature, msg: &[u8]) -> bool;
}

/// RSABSSA-SHA384-PSS-Deterministic backed by `blind-rsa-signatures`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Rsabssa;

impl BlindRsa for Rsabssa {
    fn blind<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        public_key: &PublicKey,
        msg: &[u8],
    ) -> Result<BlindingResult, Error> {
        let options = Options::default();
        public_key.blind(rng, msg, false, &options)
    }

    fn blind_sign<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        secret_key: &SecretKey,
        blinded_msg: &[u8],
    ) -> Result<BlindSignature, Error> {
        let options = Options::default();
        secret_key.blind_sign(rng, blinded_msg, &options)
    }

    fn finalize(
        &self,
        public_key: &PublicKey,
        blind_sig: &BlindSignature,
        blinding_result: &BlindingResult,
        msg: &[u8],
    ) -> Result<Signature, Error> {
        let options = Options::default();
        public_key.finalize(blind_sig, &blinding_result.secret, None, msg, &options)
    }

    fn verify(&self, public_key: &PublicKey, signature: &Signature, msg: &[u8]) -> bool {
        let options = Options::default();
        signature.verify(public_key, None, msg, &options).is_ok()
    }
}
