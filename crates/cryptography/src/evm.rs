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

//! EVM wallet signature verification (EIP-191 `personal_sign` recovery).

use alloy_primitives::{Address, Signature, eip191_hash_message};

use crate::error::CryptographyError;

/// Recovers the signer address from `signature` over `message` and compares it
/// case-insensitively against `expected_address`.
///
/// # Errors
///
/// Returns [`CryptographyError::MalformedSignature`] if `signature` is not a well-formed
/// 65-byte hex-encoded EIP-191 signature, [`CryptographyError::MalformedKey`] if
/// `expected_address` does not parse as a 20-byte hex address, or
/// [`CryptographyError::SignatureMismatch`] if recovery succeeds but the address differs.
pub fn verify_personal_sign(
    signature: &str,
    expected_address: &str,
    message: &str,
) -> Result<(), CryptographyError> {
    let sig_bytes = decode_hex_signature(signature)
        .map_err(|e| CryptographyError::MalformedSignature(e.to_string()))?;
    let signature = Signature::try_from(sig_bytes.as_slice())
        .map_err(|e| CryptographyError::MalformedSignature(e.to_string()))?;

    let expected: Address = expected_address
        .parse()
        .map_err(|_| CryptographyError::MalformedKey(expected_address.to_string()))?;

    let hash = eip191_hash_message(message.as_bytes());
    let recovered = signature
        .recover_address_from_prehash(&hash)
        .map_err(|_| CryptographyError::SignatureMismatch)?;

    if recovered == expected {
        Ok(())
    } else {
        Err(CryptographyError::SignatureMismatch)
    }
}

fn decode_hex_signature(signature: &str) -> Result<Vec<u8>, hex::FromHexError> {
    hex::decode(signature.strip_prefix("0x").unwrap_or(signature))
}

#[cfg(test)]
mod tests {
    use alloy_signer::SignerSync;
    use alloy_signer_local::PrivateKeySigner;

    use super::*;

    fn signer() -> PrivateKeySigner {
        "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318"
            .parse()
            .expect("valid test private key")
    }

    #[test]
    fn recovers_and_matches_signer_address() {
        let signer = signer();
        let address = signer.address();
        let message = "Please sign this message to confirm your identity.\nTimestamp: 1700000000\nNonce: abc";
        let signature = signer.sign_message_sync(message.as_bytes()).unwrap();
        let sig_hex = format!("0x{}", hex::encode(signature.as_bytes()));

        assert!(verify_personal_sign(&sig_hex, &address.to_string(), message).is_ok());
    }

    #[test]
    fn rejects_signature_from_a_different_key() {
        let signer = signer();
        let message = "some message";
        let signature = signer.sign_message_sync(message.as_bytes()).unwrap();
        let sig_hex = format!("0x{}", hex::encode(signature.as_bytes()));

        let other_address = "0x000000000000000000000000000000000000aa";
        assert!(matches!(
            verify_personal_sign(&sig_hex, other_address, message),
            Err(CryptographyError::SignatureMismatch)
        ));
    }

    #[test]
    fn rejects_malformed_signature_hex() {
        let result = verify_personal_sign("not-hex", "0x000000000000000000000000000000000000aa", "m");
        assert!(matches!(
            result,
            Err(CryptographyError::MalformedSignature(_))
        ));
    }
}
