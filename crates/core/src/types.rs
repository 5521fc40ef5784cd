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

//! Core domain types: instruments, sessions, prices, quantities, and the grid/direction enums.

use std::{fmt, str::FromStr, sync::LazyLock};

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A price, represented with exact decimal arithmetic (never `f64`) so that grid-step
/// comparisons are tick-exact rather than subject to floating-point drift.
pub type Price = Decimal;

/// An order quantity, represented with exact decimal arithmetic.
pub type Qty = Decimal;

static TICKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^PERP_[A-Z]+_USDC$").expect("static regex is valid"));

/// A perpetual instrument identifier of the form `PERP_<BASE>_USDC` (§6).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstrumentId(String);

impl InstrumentId {
    /// Validates and constructs an [`InstrumentId`] from a raw ticker string.
    ///
    /// # Errors
    ///
    /// Returns an error if `ticker` does not match `^PERP_[A-Z]+_USDC$`.
    pub fn parse(ticker: &str) -> Result<Self, InvalidInstrument> {
        if TICKER_RE.is_match(ticker) {
            Ok(Self(ticker.to_string()))
        } else {
            Err(InvalidInstrument(ticker.to_string()))
        }
    }

    /// Returns the ticker as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Error returned when a ticker does not match the `PERP_<BASE>_USDC` convention.
#[derive(Debug, thiserror::Error)]
#[error("invalid instrument ticker: {0} (expected PERP_<BASE>_USDC)")]
pub struct InvalidInstrument(pub String);

/// Identifies a session uniquely: `"{user_id}_{instrument}"` (§3).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Builds the canonical session id for a (user, instrument) pair.
    #[must_use]
    pub fn new(user_id: &str, instrument: &InstrumentId) -> Self {
        Self(format!("{user_id}_{instrument}"))
    }

    /// Returns the `user_id` prefix of this session id, splitting on the first underscore
    /// before `PERP_` (used by `/api/grid/stop` to derive the owning user, per §6).
    #[must_use]
    pub fn user_id(&self) -> &str {
        self.0
            .split_once("_PERP_")
            .map_or(self.0.as_str(), |(user, _)| user)
    }

    /// Returns the raw session id string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wraps an opaque session id string already in canonical form, e.g. a path parameter
    /// supplied by an HTTP client for `/api/grid/status/{session_id}` or `/api/grid/stop`.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The side taken by the session relative to `current_price` (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
    Both,
}

/// The side of a grid order or fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Returns the opposite side, used when emitting counter-orders (§4.7).
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => f.write_str("BUY"),
            Self::Sell => f.write_str("SELL"),
        }
    }
}

/// The ladder spacing model (§3, §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GridType {
    Arithmetic,
    Geometric,
}

impl FromStr for Direction {
    type Err = InvalidEnumValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LONG" => Ok(Self::Long),
            "SHORT" => Ok(Self::Short),
            "BOTH" => Ok(Self::Both),
            other => Err(InvalidEnumValue(other.to_string())),
        }
    }
}

impl FromStr for GridType {
    type Err = InvalidEnumValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ARITHMETIC" => Ok(Self::Arithmetic),
            "GEOMETRIC" => Ok(Self::Geometric),
            other => Err(InvalidEnumValue(other.to_string())),
        }
    }
}

/// Error returned when parsing an unrecognized enum string value.
#[derive(Debug, thiserror::Error)]
#[error("invalid enum value: {0}")]
pub struct InvalidEnumValue(pub String);

/// The lifecycle state of a [`SessionId`] (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Creating,
    Running,
    Stopping,
    Stopped,
    Failed,
}

/// The lifecycle state of a tracked grid order (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Open,
    Filled,
    Cancelled,
    Unknown,
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("PERP_BTC_USDC", true)]
    #[case("PERP_ETH_USDC", true)]
    #[case("perp_btc_usdc", false)]
    #[case("PERP_BTC_USDT", false)]
    #[case("PERP_USDC", false)]
    #[case("BTCUSDT", false)]
    fn validates_ticker_pattern(#[case] ticker: &str, #[case] valid: bool) {
        assert_eq!(InstrumentId::parse(ticker).is_ok(), valid);
    }

    #[test]
    fn session_id_is_user_and_instrument_joined() {
        let instrument = InstrumentId::parse("PERP_ETH_USDC").unwrap();
        let id = SessionId::new("u1", &instrument);
        assert_eq!(id.as_str(), "u1_PERP_ETH_USDC");
        assert_eq!(id.user_id(), "u1");
    }

    #[test]
    fn order_side_opposite_round_trips() {
        assert_eq!(OrderSide::Buy.opposite(), OrderSide::Sell);
        assert_eq!(OrderSide::Sell.opposite().opposite(), OrderSide::Sell);
    }

    #[rstest]
    #[case("LONG", Direction::Long)]
    #[case("both", Direction::Both)]
    fn parses_direction_case_insensitively(#[case] raw: &str, #[case] expected: Direction) {
        assert_eq!(raw.parse::<Direction>().unwrap(), expected);
    }

    #[test]
    fn from_raw_round_trips_a_canonical_session_id() {
        let instrument = InstrumentId::parse("PERP_ETH_USDC").unwrap();
        let built = SessionId::new("u1", &instrument);
        let from_raw = SessionId::from_raw(built.as_str());
        assert_eq!(built, from_raw);
        assert_eq!(from_raw.user_id(), "u1");
    }
}
