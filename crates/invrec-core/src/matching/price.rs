//! Price drift against the last purchase price.

use rust_decimal::Decimal;

use crate::models::line::{DriftDirection, PriceDrift};
use crate::values::round_to;

/// Compare `current` with `last`.
///
/// No last price, or a last price of zero, yields [`DriftDirection::New`]
/// without a percentage. A percentage too large to represent is left out
/// and only the direction is reported.
pub fn compare(current: Decimal, last: Option<Decimal>, precision: u32) -> PriceDrift {
    let Some(last) = last.filter(|p| !p.is_zero()) else {
        return PriceDrift {
            percent: None,
            direction: DriftDirection::New,
        };
    };

    let percent = current
        .checked_sub(last)
        .and_then(|diff| diff.checked_div(last))
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .map(|p| round_to(p, precision));

    // An unrepresentable percentage still has a direction
    let direction = match percent {
        Some(p) if p > Decimal::ZERO => DriftDirection::Up,
        Some(p) if p < Decimal::ZERO => DriftDirection::Down,
        Some(_) => DriftDirection::Same,
        None if current > last => DriftDirection::Up,
        None if current < last => DriftDirection::Down,
        None => DriftDirection::Same,
    };

    PriceDrift { percent, direction }
}
