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

//! Functions for correctness checks similar to the *design by contract* philosophy.
//!
//! A condition is a predicate which must be true just prior to the execution of some section
//! of code for correct behavior as per the grid engine's invariants (request validation,
//! ladder construction, session registry bookkeeping).
//!
//! An [`anyhow::Result`] is returned with a descriptive message when the condition check fails.

use std::{
    collections::{HashMap, HashSet},
    fmt::{Debug, Display},
    hash::Hash,
};

use rust_decimal::Decimal;

/// A message prefix usable with `expect` or other assertion-related calls.
pub const FAILED: &str = "Condition failed";

/// Checks the `predicate` is true.
///
/// # Errors
///
/// Returns an error if the validation check fails.
#[inline(always)]
pub fn check_predicate_true(predicate: bool, fail_msg: &str) -> anyhow::Result<()> {
    if !predicate {
        anyhow::bail!("{fail_msg}")
    }
    Ok(())
}

/// Checks the `predicate` is false.
///
/// # Errors
///
/// Returns an error if the validation check fails.
#[inline(always)]
pub fn check_predicate_false(predicate: bool, fail_msg: &str) -> anyhow::Result<()> {
    if predicate {
        anyhow::bail!("{fail_msg}")
    }
    Ok(())
}

/// Checks the string `s` is not empty.
///
/// # Errors
///
/// Returns an error if `s` is empty.
#[inline(always)]
pub fn check_nonempty_string<T: AsRef<str>>(s: T, param: &str) -> anyhow::Result<()> {
    if s.as_ref().is_empty() {
        anyhow::bail!("invalid string for '{param}', was empty");
    }
    Ok(())
}

/// Checks the string `s` has semantic meaning: non-empty, not all whitespace, ASCII-only.
///
/// # Errors
///
/// Returns an error if `s` is empty, all-whitespace, or contains a non-ASCII character.
#[inline(always)]
pub fn check_valid_string<T: AsRef<str>>(s: T, param: &str) -> anyhow::Result<()> {
    let s = s.as_ref();

    if s.is_empty() {
        anyhow::bail!("invalid string for '{param}', was empty");
    }

    let mut has_non_whitespace = false;
    for c in s.chars() {
        if !c.is_whitespace() {
            has_non_whitespace = true;
        }
        if !c.is_ascii() {
            anyhow::bail!("invalid string for '{param}' contained a non-ASCII char, was '{s}'");
        }
    }

    if !has_non_whitespace {
        anyhow::bail!("invalid string for '{param}', was all whitespace");
    }

    Ok(())
}

/// Checks the `value` is strictly positive (per §6's `total_margin > 0` / `grid_levels >= 2`
/// style request invariants).
///
/// # Errors
///
/// Returns an error if `value` is zero or negative.
#[inline(always)]
pub fn check_positive_decimal(value: Decimal, param: &str) -> anyhow::Result<()> {
    if value <= Decimal::ZERO {
        anyhow::bail!("invalid value for '{param}' not positive, was {value}")
    }
    Ok(())
}

/// Checks `value` is in the inclusive range `[lower, upper]` (used for bounds validation:
/// `lower_bound <= current_price <= upper_bound`, per §6).
///
/// # Errors
///
/// Returns an error if `value` falls outside `[lower, upper]`.
#[inline(always)]
pub fn check_in_range_inclusive_decimal(
    value: Decimal,
    lower: Decimal,
    upper: Decimal,
    param: &str,
) -> anyhow::Result<()> {
    if value < lower || value > upper {
        anyhow::bail!("invalid value for '{param}' not in range [{lower}, {upper}], was {value}")
    }
    Ok(())
}

/// Checks the `usize` value is in range `[l, r]` (inclusive); used for `grid_levels` bounds.
///
/// # Errors
///
/// Returns an error if the validation check fails.
#[inline(always)]
pub fn check_in_range_inclusive_usize(
    value: usize,
    l: usize,
    r: usize,
    param: &str,
) -> anyhow::Result<()> {
    if value < l || value > r {
        anyhow::bail!("invalid usize for '{param}' not in range [{l}, {r}], was {value}")
    }
    Ok(())
}

/// Checks the slice is **not** empty.
///
/// # Errors
///
/// Returns an error if the validation check fails.
#[inline(always)]
pub fn check_slice_not_empty<T>(slice: &[T], param: &str) -> anyhow::Result<()> {
    if slice.is_empty() {
        anyhow::bail!(
            "the '{param}' slice `&[{}]` was empty",
            std::any::type_name::<T>()
        )
    }
    Ok(())
}

/// Checks the `key` is **not** in the `map` (used by the session registry to enforce
/// (user, instrument) uniqueness before admitting a `Creating` reservation).
///
/// # Errors
///
/// Returns an error if the validation check fails.
#[inline(always)]
pub fn check_key_not_in_map<K, V>(
    key: &K,
    map: &HashMap<K, V>,
    key_name: &str,
    map_name: &str,
) -> anyhow::Result<()>
where
    K: Hash + Eq + Display + Clone,
    V: Debug,
{
    if map.contains_key(key) {
        anyhow::bail!(
            "the '{key_name}' key {key} was already in the '{map_name}' map `&<{}, {}>`",
            std::any::type_name::<K>(),
            std::any::type_name::<V>(),
        )
    }
    Ok(())
}

/// Checks the `key` is in the `map`.
///
/// # Errors
///
/// Returns an error if the validation check fails.
#[inline(always)]
pub fn check_key_in_map<K, V>(
    key: &K,
    map: &HashMap<K, V>,
    key_name: &str,
    map_name: &str,
) -> anyhow::Result<()>
where
    K: Hash + Eq + Display + Clone,
    V: Debug,
{
    if !map.contains_key(key) {
        anyhow::bail!(
            "the '{key_name}' key {key} was not in the '{map_name}' map `&<{}, {}>`",
            std::any::type_name::<K>(),
            std::any::type_name::<V>(),
        )
    }
    Ok(())
}

/// Checks the `member` is **not** in the `set`.
///
/// # Errors
///
/// Returns an error if the validation check fails.
#[inline(always)]
pub fn check_member_not_in_set<V>(
    member: &V,
    set: &HashSet<V>,
    member_name: &str,
    set_name: &str,
) -> anyhow::Result<()>
where
    V: Hash + Eq + Display + Clone,
{
    if set.contains(member) {
        anyhow::bail!(
            "the '{member_name}' member was already in the '{set_name}' set `&<{}>`",
            std::any::type_name::<V>(),
        )
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use rust_decimal_macros::dec;

    use super::*;

    #[rstest]
    #[case(false, false)]
    #[case(true, true)]
    fn test_check_predicate_true(#[case] predicate: bool, #[case] expected: bool) {
        let result = check_predicate_true(predicate, "the predicate was false").is_ok();
        assert_eq!(result, expected);
    }

    #[rstest]
    #[case("")]
    fn test_check_nonempty_string_rejects_empty(#[case] s: &str) {
        assert!(check_nonempty_string(s, "value").is_err());
    }

    #[rstest]
    #[case("")]
    #[case(" ")]
    #[case("🦀")]
    fn test_check_valid_string_with_invalid_values(#[case] s: &str) {
        assert!(check_valid_string(s, "value").is_err());
    }

    #[rstest]
    #[case(dec!(1), true)]
    #[case(dec!(0), false)]
    #[case(dec!(-1), false)]
    fn test_check_positive_decimal(#[case] value: Decimal, #[case] expected: bool) {
        assert_eq!(check_positive_decimal(value, "total_margin").is_ok(), expected);
    }

    #[rstest]
    #[case(dec!(50), dec!(10), dec!(100), true)]
    #[case(dec!(10), dec!(10), dec!(100), true)]
    #[case(dec!(100), dec!(10), dec!(100), true)]
    #[case(dec!(9.99), dec!(10), dec!(100), false)]
    #[case(dec!(100.01), dec!(10), dec!(100), false)]
    fn test_check_in_range_inclusive_decimal(
        #[case] value: Decimal,
        #[case] lower: Decimal,
        #[case] upper: Decimal,
        #[case] expected: bool,
    ) {
        let result = check_in_range_inclusive_decimal(value, lower, upper, "current_price").is_ok();
        assert_eq!(result, expected);
    }

    #[rstest]
    #[case(&HashMap::<String, u32>::new(), "k", "sessions", true)]
    fn test_check_key_not_in_map_when_absent(
        #[case] map: &HashMap<String, u32>,
        #[case] key: &str,
        #[case] map_name: &str,
        #[case] expected: bool,
    ) {
        let result = check_key_not_in_map(&key.to_string(), map, "key", map_name).is_ok();
        assert_eq!(result, expected);
    }

    #[test]
    fn test_check_key_not_in_map_when_present() {
        let map = HashMap::from([("u1_PERP_BTC_USDC".to_string(), 1u32)]);
        assert!(check_key_not_in_map(
            &"u1_PERP_BTC_USDC".to_string(),
            &map,
            "session_id",
            "active_sessions"
        )
        .is_err());
    }
}
