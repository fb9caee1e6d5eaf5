//! Summary and payment-report aggregation.
//!
//! Everything here operates on already-loaded collections so the GraphQL
//! resolvers, the seed command, and the tests all roll numbers up the same
//! way. Orphaned commission rows (order gone, row left behind by an import)
//! are skipped with a warning, never a hard failure.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;
use tracing::warn;
use uuid::Uuid;

use entity::{brand, commission, payment, sales_order};

use crate::commission::{commission_due_cents, Ledger, LedgerEntry};

#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    pub brand_id: Option<Uuid>,
    pub season_ids: Option<HashSet<Uuid>>,
}

impl ReportFilter {
    fn matches(&self, order: &sales_order::Model) -> bool {
        if let Some(brand_id) = self.brand_id {
            if order.brand_id != brand_id {
                return false;
            }
        }
        if let Some(seasons) = &self.season_ids {
            match order.season_id {
                Some(season_id) if seasons.contains(&season_id) => {}
                _ => return false,
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Summary {
    pub total_sales_cents: i64,
    pub commission_earned_cents: i64,
    pub commission_paid_cents: i64,
    pub commission_outstanding_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentGroup {
    pub paid_on: Option<NaiveDate>,
    pub subtotal_cents: i64,
    pub entry_count: i32,
}

/// Orders whose stage is in `excluded` drop out of every sum. The earned
/// figure rounds once per brand over the non-overridden total, so the
/// dashboard does not accumulate per-order rounding; overridden orders
/// contribute their own rounded due.
pub fn summarize(
    orders: &[sales_order::Model],
    commissions: &[commission::Model],
    brands: &[brand::Model],
    excluded: &HashSet<String>,
    filter: &ReportFilter,
) -> Summary {
    let brand_rates: HashMap<Uuid, i32> =
        brands.iter().map(|b| (b.id, b.commission_bps)).collect();
    let known_orders: HashMap<Uuid, &sales_order::Model> =
        orders.iter().map(|o| (o.id, o)).collect();

    let mut total_sales_cents = 0_i64;
    let mut earned_cents = 0_i64;
    let mut brand_totals: BTreeMap<Uuid, i64> = BTreeMap::new();
    let mut matched: HashSet<Uuid> = HashSet::new();

    for order in orders {
        if excluded.contains(order.stage.as_str()) || !filter.matches(order) {
            continue;
        }
        matched.insert(order.id);
        total_sales_cents += order.total_cents;
        match order.commission_override_bps {
            Some(rate) => earned_cents += commission_due_cents(order.total_cents, rate),
            None => *brand_totals.entry(order.brand_id).or_default() += order.total_cents,
        }
    }
    for (brand_id, brand_total) in brand_totals {
        let rate = brand_rates.get(&brand_id).copied().unwrap_or(0);
        earned_cents += commission_due_cents(brand_total, rate);
    }

    let mut paid_cents = 0_i64;
    for row in commissions {
        if !known_orders.contains_key(&row.order_id) {
            warn!(commission_id = %row.id, order_id = %row.order_id, "skipping orphaned commission");
            continue;
        }
        if matched.contains(&row.order_id) {
            paid_cents += row.amount_paid_cents;
        }
    }

    Summary {
        total_sales_cents,
        commission_earned_cents: earned_cents,
        commission_paid_cents: paid_cents,
        commission_outstanding_cents: (earned_cents - paid_cents).max(0),
    }
}

/// Groups every matched commission's ledger entries by payment date. Dated
/// groups come first in calendar order; entries without a date collect into
/// a single trailing unscheduled group. Group subtotals sum to the same
/// `commission_paid_cents` as [`summarize`] under the same filter.
pub fn payment_report(
    orders: &[sales_order::Model],
    commissions: &[commission::Model],
    payments: &[payment::Model],
    excluded: &HashSet<String>,
    filter: &ReportFilter,
) -> Vec<PaymentGroup> {
    let known_orders: HashMap<Uuid, &sales_order::Model> =
        orders.iter().map(|o| (o.id, o)).collect();
    let mut rows_by_commission: HashMap<Uuid, Vec<&payment::Model>> = HashMap::new();
    for row in payments {
        rows_by_commission.entry(row.commission_id).or_default().push(row);
    }

    let mut dated: BTreeMap<NaiveDate, (i64, i32)> = BTreeMap::new();
    let mut unscheduled: Option<(i64, i32)> = None;

    for row in commissions {
        let Some(order) = known_orders.get(&row.order_id) else {
            warn!(commission_id = %row.id, order_id = %row.order_id, "skipping orphaned commission");
            continue;
        };
        if excluded.contains(order.stage.as_str()) || !filter.matches(order) {
            continue;
        }
        let mut rows = rows_by_commission.remove(&row.id).unwrap_or_default();
        rows.sort_by_key(|p| p.position);
        let entries: Vec<LedgerEntry> = rows
            .into_iter()
            .map(|p| LedgerEntry {
                amount_cents: p.amount_cents,
                paid_on: p.paid_on,
            })
            .collect();
        let ledger = Ledger::resolve(entries, row.amount_paid_cents, row.paid_on);
        for entry in ledger.entries() {
            match entry.paid_on {
                Some(date) => {
                    let slot = dated.entry(date).or_default();
                    slot.0 += entry.amount_cents;
                    slot.1 += 1;
                }
                None => {
                    let slot = unscheduled.get_or_insert((0, 0));
                    slot.0 += entry.amount_cents;
                    slot.1 += 1;
                }
            }
        }
    }

    let mut groups: Vec<PaymentGroup> = dated
        .into_iter()
        .map(|(date, (subtotal_cents, entry_count))| PaymentGroup {
            paid_on: Some(date),
            subtotal_cents,
            entry_count,
        })
        .collect();
    if let Some((subtotal_cents, entry_count)) = unscheduled {
        groups.push(PaymentGroup {
            paid_on: None,
            subtotal_cents,
            entry_count,
        });
    }
    groups
}
