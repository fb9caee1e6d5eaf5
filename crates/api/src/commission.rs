//! Commission derivation and payment-ledger recomputation.
//!
//! Money is integer cents, rates are basis points (0..=10000). Everything in
//! this module is pure: resolvers load the records, call in here, and persist
//! the derived fields in the same transaction as the triggering write.

use chrono::NaiveDate;
use thiserror::Error;

use entity::commission::PayStatus;

pub const MAX_RATE_BPS: i32 = 10_000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommissionError {
    #[error("order total must be non-negative")]
    NegativeTotal,
    #[error("payment amount must be positive")]
    NonPositivePayment,
    #[error("commission rate must be between 0 and 10000 basis points")]
    RateOutOfRange,
    #[error("stored paid amount {stored} does not match ledger sum {summed}")]
    LedgerMismatch { stored: i64, summed: i64 },
}

pub fn validate_total_cents(total_cents: i64) -> Result<i64, CommissionError> {
    if total_cents < 0 {
        return Err(CommissionError::NegativeTotal);
    }
    Ok(total_cents)
}

pub fn validate_rate_bps(rate_bps: i32) -> Result<i32, CommissionError> {
    if !(0..=MAX_RATE_BPS).contains(&rate_bps) {
        return Err(CommissionError::RateOutOfRange);
    }
    Ok(rate_bps)
}

pub fn validate_payment_cents(amount_cents: i64) -> Result<i64, CommissionError> {
    if amount_cents <= 0 {
        return Err(CommissionError::NonPositivePayment);
    }
    Ok(amount_cents)
}

/// Order-level override wins over the brand default, including an explicit 0.
pub fn effective_rate_bps(override_bps: Option<i32>, brand_default_bps: i32) -> i32 {
    override_bps.unwrap_or(brand_default_bps)
}

/// Round-half-up on cents. The widening avoids overflow for any realistic
/// order total.
pub fn commission_due_cents(total_cents: i64, rate_bps: i32) -> i64 {
    ((total_cents as i128 * rate_bps as i128 + 5_000) / 10_000) as i64
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub amount_cents: i64,
    pub paid_on: Option<NaiveDate>,
}

/// How a commission's payments are represented. Rows imported from the old
/// system carry a single scalar paid amount/date instead of payment rows;
/// that scalar reads as one synthetic entry until a structured payment is
/// recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ledger {
    Structured(Vec<LedgerEntry>),
    LegacyScalar {
        amount_cents: i64,
        paid_on: Option<NaiveDate>,
    },
    Empty,
}

impl Ledger {
    pub fn resolve(
        entries: Vec<LedgerEntry>,
        scalar_paid_cents: i64,
        scalar_paid_on: Option<NaiveDate>,
    ) -> Self {
        if !entries.is_empty() {
            Ledger::Structured(entries)
        } else if scalar_paid_cents > 0 {
            Ledger::LegacyScalar {
                amount_cents: scalar_paid_cents,
                paid_on: scalar_paid_on,
            }
        } else {
            Ledger::Empty
        }
    }

    pub fn entries(&self) -> Vec<LedgerEntry> {
        match self {
            Ledger::Structured(entries) => entries.clone(),
            Ledger::LegacyScalar {
                amount_cents,
                paid_on,
            } => vec![LedgerEntry {
                amount_cents: *amount_cents,
                paid_on: *paid_on,
            }],
            Ledger::Empty => vec![],
        }
    }

    pub fn total_cents(&self) -> i64 {
        self.entries().iter().map(|e| e.amount_cents).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedState {
    pub amount_paid_cents: i64,
    pub amount_remaining_cents: i64,
    pub pay_status: PayStatus,
}

pub fn classify(amount_paid_cents: i64, commission_due_cents: i64) -> PayStatus {
    if amount_paid_cents <= 0 && commission_due_cents > 0 {
        PayStatus::Unpaid
    } else if amount_paid_cents < commission_due_cents {
        PayStatus::Partial
    } else {
        PayStatus::Paid
    }
}

/// Full re-sum from the ledger, never incremental.
pub fn recompute(commission_due_cents: i64, ledger: &Ledger) -> DerivedState {
    let amount_paid_cents = ledger.total_cents();
    let amount_remaining_cents = (commission_due_cents - amount_paid_cents).max(0);
    DerivedState {
        amount_paid_cents,
        amount_remaining_cents,
        pay_status: classify(amount_paid_cents, commission_due_cents),
    }
}

/// Invariant check for a row that claims structured payments: the stored paid
/// aggregate must match the summed ledger exactly. A mismatch means some
/// writer bypassed the recompute path and the operation must fail loudly.
pub fn verify_ledger_sum(stored_paid_cents: i64, ledger: &Ledger) -> Result<(), CommissionError> {
    if matches!(ledger, Ledger::Empty | Ledger::LegacyScalar { .. }) {
        return Ok(());
    }
    let summed = ledger.total_cents();
    if stored_paid_cents != summed {
        return Err(CommissionError::LedgerMismatch {
            stored: stored_paid_cents,
            summed,
        });
    }
    Ok(())
}
