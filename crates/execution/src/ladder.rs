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

//! Ladder construction for the grid engine (C7): the fixed set of price levels computed once
//! at session start (spec.md §4.7).

use grid_core::{Direction, GridType, OrderSide, Price, Qty};
use rust_decimal::{Decimal, MathematicalOps};

use crate::error::ExecutionError;

/// A single computed price level in the ladder, fixed for the session's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLevel {
    pub price: Price,
    pub side: OrderSide,
    pub quantity: Qty,
}

/// The spacing step used to derive a fill's counter-order price, carried alongside the ladder
/// since geometric ladders need the ratio rather than a fixed additive step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Spacing {
    Arithmetic { step: Decimal },
    Geometric { ratio: Decimal },
}

impl Spacing {
    /// The counter-order price one step above `price`, per spec.md §4.7's fill-reaction rule.
    #[must_use]
    pub fn step_up(&self, price: Price) -> Price {
        match self {
            Self::Arithmetic { step } => price + step,
            Self::Geometric { ratio } => price * ratio,
        }
    }

    /// The counter-order price one step below `price`.
    #[must_use]
    pub fn step_down(&self, price: Price) -> Price {
        match self {
            Self::Arithmetic { step } => price - step,
            Self::Geometric { ratio } => price / ratio,
        }
    }
}

/// The fixed ladder computed for a session at start time.
#[derive(Debug, Clone)]
pub struct Ladder {
    pub levels: Vec<GridLevel>,
    pub spacing: Spacing,
    pub lower_bound: Price,
    pub upper_bound: Price,
}

/// Parameters needed to build a [`Ladder`] (spec.md §3, §4.7).
#[derive(Debug, Clone, Copy)]
pub struct LadderParams {
    pub lower_bound: Price,
    pub upper_bound: Price,
    pub grid_type: GridType,
    pub grid_ratio: Option<Decimal>,
    pub grid_levels: u32,
    pub total_margin: Decimal,
    pub current_price: Price,
    pub direction: Direction,
}

/// Builds the fixed ladder for a session, per spec.md §4.7's construction rules.
///
/// # Errors
///
/// Returns [`ExecutionError::InvalidLadder`] if the band is non-positive, `grid_levels < 2`, or
/// `grid_type` is `Geometric` without a ratio in `(0, 1)`.
pub fn build_ladder(params: LadderParams) -> Result<Ladder, ExecutionError> {
    if params.lower_bound >= params.upper_bound {
        return Err(ExecutionError::InvalidLadder(
            "lower_bound must be strictly less than upper_bound".into(),
        ));
    }
    if params.grid_levels < 2 {
        return Err(ExecutionError::InvalidLadder("grid_levels must be >= 2".into()));
    }

    let n = Decimal::from(params.grid_levels);
    let prices = match params.grid_type {
        GridType::Arithmetic => {
            let step = (params.upper_bound - params.lower_bound) / n;
            (1..params.grid_levels)
                .map(|i| params.lower_bound + Decimal::from(i) * step)
                .collect::<Vec<_>>()
        }
        GridType::Geometric => {
            let ratio = params.grid_ratio.ok_or_else(|| {
                ExecutionError::InvalidLadder("grid_ratio required for GEOMETRIC".into())
            })?;
            if ratio <= Decimal::ZERO || ratio >= Decimal::ONE {
                return Err(ExecutionError::InvalidLadder(
                    "grid_ratio must be in (0, 1)".into(),
                ));
            }
            // grid_ratio expresses the spacing compression; the per-level multiplicative factor
            // applied upward from the lower bound is therefore its reciprocal.
            let factor = Decimal::ONE / ratio;
            (1..params.grid_levels)
                .map(|i| params.lower_bound * factor.powi(i64::from(i)))
                .filter(|p| *p >= params.lower_bound && *p <= params.upper_bound)
                .collect::<Vec<_>>()
        }
    };

    let nominal_qty = params.total_margin / n;

    let levels = prices
        .into_iter()
        .filter_map(|price| {
            let side = match params.direction {
                _ if price == params.current_price => None,
                Direction::Long if price < params.current_price => Some(OrderSide::Buy),
                Direction::Long => None,
                Direction::Short if price > params.current_price => Some(OrderSide::Sell),
                Direction::Short => None,
                Direction::Both if price < params.current_price => Some(OrderSide::Buy),
                Direction::Both => Some(OrderSide::Sell),
            }?;
            Some(GridLevel { price, side, quantity: nominal_qty / price })
        })
        .collect();

    let spacing = match params.grid_type {
        GridType::Arithmetic => {
            Spacing::Arithmetic { step: (params.upper_bound - params.lower_bound) / n }
        }
        GridType::Geometric => Spacing::Geometric {
            ratio: Decimal::ONE / params.grid_ratio.expect("validated above"),
        },
    };

    Ok(Ladder { levels, spacing, lower_bound: params.lower_bound, upper_bound: params.upper_bound })
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn base_params() -> LadderParams {
        LadderParams {
            lower_bound: dec!(90),
            upper_bound: dec!(110),
            grid_type: GridType::Arithmetic,
            grid_ratio: None,
            grid_levels: 4,
            total_margin: dec!(400),
            current_price: dec!(100),
            direction: Direction::Both,
        }
    }

    #[test]
    fn arithmetic_levels_are_evenly_spaced() {
        let mut params = base_params();
        params.current_price = dec!(97);
        let ladder = build_ladder(params).unwrap();
        let prices: Vec<_> = ladder.levels.iter().map(|l| l.price).collect();
        assert_eq!(prices, vec![dec!(95), dec!(100), dec!(105)]);
    }

    #[test]
    fn both_direction_splits_sides_on_current_price() {
        let ladder = build_ladder(base_params()).unwrap();
        let sides: Vec<_> = ladder.levels.iter().map(|l| (l.price, l.side)).collect();
        assert_eq!(sides, vec![(dec!(95), OrderSide::Buy), (dec!(105), OrderSide::Sell)]);
    }

    #[test]
    fn level_equal_to_current_price_is_skipped_entirely() {
        let ladder = build_ladder(base_params()).unwrap();
        assert!(ladder.levels.iter().all(|l| l.price != dec!(100)));
    }

    #[test]
    fn long_direction_keeps_only_buy_levels() {
        let mut params = base_params();
        params.direction = Direction::Long;
        let ladder = build_ladder(params).unwrap();
        assert!(ladder.levels.iter().all(|l| l.side == OrderSide::Buy));
        assert_eq!(ladder.levels.len(), 1);
    }

    #[test]
    fn short_direction_keeps_only_sell_levels() {
        let mut params = base_params();
        params.direction = Direction::Short;
        let ladder = build_ladder(params).unwrap();
        assert!(ladder.levels.iter().all(|l| l.side == OrderSide::Sell));
        assert_eq!(ladder.levels.len(), 1);
    }

    #[test]
    fn nominal_quantity_is_margin_over_levels_over_price() {
        let ladder = build_ladder(base_params()).unwrap();
        let level = ladder.levels.iter().find(|l| l.price == dec!(95)).unwrap();
        assert_eq!(level.quantity, dec!(400) / dec!(4) / dec!(95));
    }

    #[test]
    fn geometric_levels_are_discarded_outside_the_band() {
        let params = LadderParams {
            lower_bound: dec!(100),
            upper_bound: dec!(200),
            grid_type: GridType::Geometric,
            grid_ratio: Some(dec!(0.9)),
            grid_levels: 10,
            total_margin: dec!(1000),
            current_price: dec!(150),
            direction: Direction::Both,
        };
        let ladder = build_ladder(params).unwrap();
        assert!(ladder.levels.iter().all(|l| l.price >= dec!(100) && l.price <= dec!(200)));
    }

    #[test]
    fn rejects_inverted_band() {
        let mut params = base_params();
        params.lower_bound = dec!(110);
        params.upper_bound = dec!(90);
        assert!(matches!(build_ladder(params), Err(ExecutionError::InvalidLadder(_))));
    }

    #[test]
    fn rejects_too_few_levels() {
        let mut params = base_params();
        params.grid_levels = 1;
        assert!(matches!(build_ladder(params), Err(ExecutionError::InvalidLadder(_))));
    }

    #[test]
    fn rejects_geometric_without_ratio() {
        let mut params = base_params();
        params.grid_type = GridType::Geometric;
        assert!(matches!(build_ladder(params), Err(ExecutionError::InvalidLadder(_))));
    }

    #[test]
    fn spacing_step_up_and_down_are_inverse_for_arithmetic() {
        let spacing = Spacing::Arithmetic { step: dec!(5) };
        assert_eq!(spacing.step_up(dec!(100)), dec!(105));
        assert_eq!(spacing.step_down(spacing.step_up(dec!(100))), dec!(100));
    }

    #[test]
    fn spacing_step_up_and_down_are_inverse_for_geometric() {
        let spacing = Spacing::Geometric { ratio: dec!(1.1) };
        assert_eq!(spacing.step_down(spacing.step_up(dec!(100))), dec!(100));
    }
}
