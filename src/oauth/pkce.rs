//! Usage: PKCE verifier/challenge and anti-forgery `state` for the authorization-code flow.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

pub(crate) const CHALLENGE_METHOD: &str = "S256";

#[derive(Debug, Clone)]
pub(crate) struct PkcePair {
    pub(crate) code_verifier: String,
    pub(crate) code_challenge: String,
}

pub(crate) fn generate_pkce_pair() -> PkcePair {
    let code_verifier = random_url_token::<64>();
    let code_challenge = code_challenge_s256(&code_verifier);

    PkcePair {
        code_verifier,
        code_challenge,
    }
}

pub(crate) fn code_challenge_s256(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

pub(crate) fn generate_state() -> String {
    random_url_token::<24>()
}

fn random_url_token<const N: usize>() -> String {
    let mut random = [0u8; N];
    rand::thread_rng().fill_bytes(&mut random);
    URL_SAFE_NO_PAD.encode(random)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_pair_has_valid_lengths_and_consistent_challenge() {
        let pair = generate_pkce_pair();
        assert!(pair.code_verifier.len() >= 43);
        assert!(pair.code_verifier.len() <= 128);

        let expected = code_challenge_s256(&pair.code_verifier);
        assert_eq!(pair.code_challenge, expected);
    }

    #[test]
    fn challenge_matches_rfc7636_vector() {
        assert_eq!(
            code_challenge_s256("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn states_are_random() {
        assert_ne!(generate_state(), generate_state());
    }
}
