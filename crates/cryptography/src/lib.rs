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

//! Wallet challenge/response authentication (C4).
//!
//! Two wallet families are supported: EVM wallets (addresses prefixed `0x`), verified via
//! EIP-191 personal-sign recovery, and Ed25519 "Solana-style" wallets, verified against a
//! base58-encoded public key with the signature tried in base58, then base64, then hex.
//! Every verification consumes a nonce exactly once through a pluggable [`NonceStore`].

#![warn(rustc::all)]
#![deny(nonstandard_style)]
#![deny(missing_debug_implementations)]

pub mod challenge;
pub mod error;
pub mod evm;
pub mod nonce;
pub mod solana;
pub mod verifier;

pub use crate::{
    challenge::Challenge,
    error::CryptographyError,
    nonce::NonceStore,
    verifier::{VerificationOutcome, WalletSignatureVerifier, WalletType},
};
