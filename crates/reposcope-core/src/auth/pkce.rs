use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::{thread_rng, Rng, RngCore};
use sha2::{Digest, Sha256};

/// Unreserved characters permitted in a code verifier per RFC 7636 §4.1.
const VERIFIER_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

/// Verifier length used when callers have no reason to pick another one.
pub const DEFAULT_VERIFIER_LENGTH: usize = 64;

/// Bytes of entropy behind the anti-CSRF state token.
pub const STATE_ENTROPY_BYTES: usize = 32;

/// PKCE code verifier and challenge pair.
#[derive(Debug, Clone)]
pub struct PkcePair {
    verifier: String,
    challenge: String,
}

impl PkcePair {
    /// Create a random verifier/challenge pair with the default verifier length.
    pub fn generate() -> Self {
        Self::with_verifier_length(DEFAULT_VERIFIER_LENGTH)
    }

    /// Create a pair with an explicit verifier length. RFC 7636 requires a
    /// length in [43, 128]; staying inside that range is the caller's job.
    pub fn with_verifier_length(length: usize) -> Self {
        let verifier = generate_verifier(length);
        let challenge = generate_challenge(&verifier);
        Self {
            verifier,
            challenge,
        }
    }

    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    pub fn challenge(&self) -> &str {
        &self.challenge
    }
}

/// Sample `length` characters uniformly from the verifier alphabet.
///
/// `thread_rng` is a CSPRNG, which the flow depends on: a guessable
/// verifier would let an attacker redeem a stolen authorization code.
pub fn generate_verifier(length: usize) -> String {
    let mut rng = thread_rng();
    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..VERIFIER_ALPHABET.len());
            VERIFIER_ALPHABET[idx] as char
        })
        .collect()
}

/// Derive the S256 challenge: SHA-256 over the verifier's UTF-8 bytes,
/// base64url-encoded without padding. Pure function of its input.
pub fn generate_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// Random state token: base64url encoding of `entropy_bytes` CSPRNG bytes.
pub fn generate_state(entropy_bytes: usize) -> String {
    let mut bytes = vec![0u8; entropy_bytes];
    thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
