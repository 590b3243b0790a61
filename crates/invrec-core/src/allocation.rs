//! Pro-rata allocation of shared invoice costs over line items.

use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::models::config::PricingConfig;
use crate::models::invoice::SharedExpenses;
use crate::models::line::{AllocatedLineItem, MatchedLineItem};
use crate::values::round_to;

/// Spreads shared expenses over lines by net value.
///
/// Stateless: every call recomputes from its inputs.
#[derive(Debug, Clone, Copy)]
pub struct ExpenseAllocator {
    money_precision: u32,
    unit_cost_precision: u32,
}

impl ExpenseAllocator {
    pub fn new(pricing: &PricingConfig) -> Self {
        Self {
            money_precision: pricing.money_precision,
            unit_cost_precision: pricing.unit_cost_precision,
        }
    }

    /// Allocate `expenses` over `items`.
    ///
    /// Shares are rounded to money precision and the rounding residue goes
    /// to the first line with the largest net total, so shares always add up
    /// to the rounded expense total. A zero subtotal or zero expenses give
    /// zero shares and leave prices unchanged, as does a subtotal or share
    /// that cannot be represented.
    pub fn allocate(&self, items: &[MatchedLineItem], expenses: &SharedExpenses) -> Vec<AllocatedLineItem> {
        let total = round_to(expenses.total(), self.money_precision);
        let subtotal = items
            .iter()
            .try_fold(Decimal::ZERO, |sum, i| sum.checked_add(i.line.net_total));

        let zero_shares = || vec![Decimal::ZERO; items.len()];
        let shares = match subtotal {
            _ if total.is_zero() => zero_shares(),
            Some(subtotal) if subtotal.is_zero() => zero_shares(),
            Some(subtotal) => self.shares(items, subtotal, total).unwrap_or_else(|| {
                warn!("Shared expenses of {} could not be allocated over {}", total, subtotal);
                zero_shares()
            }),
            None => {
                warn!("Subtotal out of range; shared expenses of {} not allocated", total);
                zero_shares()
            }
        };

        items
            .iter()
            .zip(shares)
            .map(|(item, share)| {
                let unit_expense = share
                    .checked_div(item.line.quantity)
                    .map_or(Decimal::ZERO, |unit| round_to(unit, self.unit_cost_precision));
                let landed_unit_price = item
                    .line
                    .unit_price
                    .checked_add(unit_expense)
                    .unwrap_or(item.line.unit_price);

                AllocatedLineItem {
                    tax_amount: item.line.tax_amount(self.money_precision),
                    expense_share: share,
                    unit_expense,
                    landed_unit_price,
                    item: item.clone(),
                }
            })
            .collect()
    }

    fn shares(&self, items: &[MatchedLineItem], subtotal: Decimal, total: Decimal) -> Option<Vec<Decimal>> {
        let mut shares = items
            .iter()
            .map(|i| {
                let share = i.line.net_total.checked_div(subtotal)?.checked_mul(total)?;
                Some(round_to(share, self.money_precision))
            })
            .collect::<Option<Vec<Decimal>>>()?;

        let allocated = shares
            .iter()
            .try_fold(Decimal::ZERO, |sum, share| sum.checked_add(*share))?;
        let residue = total.checked_sub(allocated)?;
        if !residue.is_zero() {
            let largest = items
                .iter()
                .enumerate()
                .fold(None::<(usize, Decimal)>, |best, (idx, item)| match best {
                    Some((_, net)) if net >= item.line.net_total => best,
                    _ => Some((idx, item.line.net_total)),
                });
            if let Some((idx, _)) = largest {
                debug!("Allocation residue {} added to line {}", residue, idx + 1);
                shares[idx] = shares[idx].checked_add(residue)?;
            }
        }
        Some(shares)
    }
}
