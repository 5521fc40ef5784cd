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

//! `GET /api/auth/challenge` (spec.md §6).

use axum::extract::State;
use grid_cryptography::Challenge;

use crate::{envelope::Envelope, state::AppState};

/// Issues a fresh signing challenge: a timestamp, a random nonce, and the exact message the
/// client's wallet must sign to authenticate a subsequent request.
pub async fn get_challenge(State(_state): State<AppState>) -> Envelope<Challenge> {
    Envelope::ok(Challenge::generate(chrono::Utc::now()))
}
