// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2026 Grid Engine Contributors.
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Ed25519 ("Solana-style") wallet signature verification.
//!
//! The public key always arrives base58-encoded. The signature's encoding is not specified by
//! callers, so three decodings are tried in turn: base58, then base64, then hex — matching the
//! fallback chain the original verifier used.

use base64::prelude::*;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};

use crate::error::CryptographyError;

/// Verifies an Ed25519 signature over `message`, trying base58, base64, and hex decodings of
/// `signature` in that order.
///
/// # Errors
///
/// Returns [`CryptographyError::MalformedKey`] if `public_key_b58` is not a valid base58-encoded
/// 32-byte Ed25519 public key, [`CryptographyError::MalformedSignature`] if none of the three
/// decodings produce a well-formed 64-byte signature, or
/// [`CryptographyError::SignatureMismatch`] if decoding succeeds but verification fails.
pub fn verify_ed25519(
    signature: &str,
    public_key_b58: &str,
    message: &[u8],
) -> Result<(), CryptographyError> {
    let pubkey_bytes = bs58::decode(public_key_b58)
        .into_vec()
        .map_err(|e| CryptographyError::MalformedKey(e.to_string()))?;
    let pubkey_bytes: [u8; 32] = pubkey_bytes
        .try_into()
        .map_err(|_| CryptographyError::MalformedKey("expected a 32-byte public key".into()))?;
    let verifying_key = VerifyingKey::from_bytes(&pubkey_bytes)
        .map_err(|e| CryptographyError::MalformedKey(e.to_string()))?;

    let sig_bytes = decode_signature_any_encoding(signature)?;
    let signature = Signature::from_bytes(&sig_bytes);

    verifying_key
        .verify(message, &signature)
        .map_err(|_| CryptographyError::SignatureMismatch)
}

fn decode_signature_any_encoding(signature: &str) -> Result<[u8; 64], CryptographyError> {
    let candidate = bs58::decode(signature)
        .into_vec()
        .ok()
        .or_else(|| BASE64_STANDARD.decode(signature).ok())
        .or_else(|| hex::decode(signature.strip_prefix("0x").unwrap_or(signature)).ok())
        .ok_or_else(|| {
            CryptographyError::MalformedSignature(
                "signature was not valid base58, base64, or hex".into(),
            )
        })?;

    candidate.try_into().map_err(|_| {
        CryptographyError::MalformedSignature("expected a 64-byte Ed25519 signature".into())
    })
}

#[cfg(test)]
mod tests {
    use ed25519_dalek::{Signer, SigningKey};

    use super::*;

    fn keypair() -> SigningKey {
        // A fixed 32-byte seed so tests are deterministic without depending on an RNG feature.
        SigningKey::from_bytes(&[7u8; 32])
    }

    #[test]
    fn verifies_base58_encoded_signature() {
        let signing_key = keypair();
        let message = b"Please sign this message to confirm your identity.";
        let signature = signing_key.sign(message);
        let pubkey_b58 = bs58::encode(signing_key.verifying_key().to_bytes()).into_string();
        let sig_b58 = bs58::encode(signature.to_bytes()).into_string();

        assert!(verify_ed25519(&sig_b58, &pubkey_b58, message).is_ok());
    }

    #[test]
    fn verifies_base64_encoded_signature() {
        let signing_key = keypair();
        let message = b"message";
        let signature = signing_key.sign(message);
        let pubkey_b58 = bs58::encode(signing_key.verifying_key().to_bytes()).into_string();
        let sig_b64 = BASE64_STANDARD.encode(signature.to_bytes());

        assert!(verify_ed25519(&sig_b64, &pubkey_b58, message).is_ok());
    }

    #[test]
    fn verifies_hex_encoded_signature() {
        let signing_key = keypair();
        let message = b"message";
        let signature = signing_key.sign(message);
        let pubkey_b58 = bs58::encode(signing_key.verifying_key().to_bytes()).into_string();
        let sig_hex = hex::encode(signature.to_bytes());

        assert!(verify_ed25519(&sig_hex, &pubkey_b58, message).is_ok());
    }

    #[test]
    fn rejects_signature_over_tampered_message() {
        let signing_key = keypair();
        let signature = signing_key.sign(b"original");
        let pubkey_b58 = bs58::encode(signing_key.verifying_key().to_bytes()).into_string();
        let sig_b58 = bs58::encode(signature.to_bytes()).into_string();

        assert!(matches!(
            verify_ed25519(&sig_b58, &pubkey_b58, b"tampered"),
            Err(CryptographyError::SignatureMismatch)
        ));
    }

    #[test]
    fn rejects_malformed_public_key() {
        assert!(matches!(
            verify_ed25519("abc", "not-valid-base58!!", b"m"),
            Err(CryptographyError::MalformedKey(_))
        ));
    }
}
