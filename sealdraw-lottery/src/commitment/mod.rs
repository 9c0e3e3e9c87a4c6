pub mod scheme;

pub use scheme::CommitmentScheme;

use rand::RngCore;
use sealdraw_core::Digest;
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::fmt;
use std::str::FromStr;

/// Participant secret, a 256-bit unsigned integer in big-endian form.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Secret([u8; 32]);

impl Secret {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<u64> for Secret {
    fn from(value: u64) -> Self {
        Self::from(u128::from(value))
    }
}

impl From<u128> for Secret {
    fn from(value: u128) -> Self {
        let mut bytes = [0u8; 32];
        bytes[16..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

// never print the secret itself in debug output
impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(..)")
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid secret '{0}': expected a decimal number or up to 32 hex bytes with 0x prefix")]
pub struct ParseSecretError(String);

impl FromStr for Secret {
    type Err = ParseSecretError;

    /// Accepts `0x`-prefixed hex (left padded to 32 bytes) or a decimal
    /// integer that fits in 128 bits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(raw) = s.strip_prefix("0x") {
            let decoded = hex::decode(raw).map_err(|_| ParseSecretError(s.to_string()))?;
            if decoded.len() > 32 {
                return Err(ParseSecretError(s.to_string()));
            }
            let mut bytes = [0u8; 32];
            bytes[32 - decoded.len()..].copy_from_slice(&decoded);
            return Ok(Self(bytes));
        }

        s.parse::<u128>()
            .map(Self::from)
            .map_err(|_| ParseSecretError(s.to_string()))
    }
}

impl From<Secret> for String {
    fn from(secret: Secret) -> Self {
        secret.to_string()
    }
}

impl TryFrom<String> for Secret {
    type Error = ParseSecretError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// SHA-256 over the 32-byte encoding of the secret.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashCommitment;

impl CommitmentScheme for HashCommitment {
    type Secret = Secret;
    type Commitment = Digest;

    fn commit(secret: &Secret) -> Digest {
        let mut hasher = Sha256::new();
        hasher.update(secret.as_bytes());
        Digest::new(hasher.finalize().into())
    }

    fn verify(commitment: &Digest, secret: &Secret) -> bool {
        Self::commit(secret) == *commitment
    }
}

/// Commitment hash a buyer submits with a purchase.
pub fn commit(secret: &Secret) -> Digest {
    HashCommitment::commit(secret)
}

/// Rnd secret for commitment
pub fn generate_secret() -> Secret {
    let mut secret = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut secret);
    Secret(secret)
}

/// Folds one revealed secret into the running draw seed.
pub fn mix_seed(seed: &Digest, secret: &Secret) -> Digest {
    Digest::sha256(&[seed.as_bytes(), secret.as_bytes()])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commitment_scheme() {
        let secret = generate_secret();
        let commitment = commit(&secret);

        assert!(HashCommitment::verify(&commitment, &secret));
        assert!(!HashCommitment::verify(&commitment, &Secret::from(7u64)));
        assert!(!commitment.is_zero());
    }

    #[test]
    fn test_secret_parsing_pads_to_uint256() {
        let decimal: Secret = "261".parse().unwrap();
        let hex: Secret = "0x0105".parse().unwrap();

        assert_eq!(decimal, hex);
        assert_eq!(decimal, Secret::from(261u64));
        assert_eq!(decimal.as_bytes()[31], 0x05);
        assert!("0xzz".parse::<Secret>().is_err());
        assert!("-1".parse::<Secret>().is_err());
    }

    #[test]
    fn test_seed_mixing_depends_on_order() {
        let a = Secret::from(1u64);
        let b = Secret::from(2u64);

        let ab = mix_seed(&mix_seed(&Digest::ZERO, &a), &b);
        let ba = mix_seed(&mix_seed(&Digest::ZERO, &b), &a);
        assert_ne!(ab, ba);
    }
}
