//! # Installment Schedules
//!
//! Splits the financed part of a credit sale into a fixed schedule.
//!
//! ## Schedule Shape
//! ```text
//! financed = 100.00, n = 3, monthly, start = Jan 31
//!
//!   #1  33.34  due Jan 31   ◄── remainder cents go to the earliest rows
//!   #2  33.33  due Feb 28   ◄── month math clamps to the last day
//!   #3  33.33  due Mar 31
//!       ─────
//!      100.00  (always exact)
//! ```
//!
//! The schedule is computed once when the sale is recorded. Paying rows
//! flips them to `Paid`; amounts and dates never change afterwards.

use chrono::{DateTime, Duration, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::MAX_INSTALLMENTS;

// =============================================================================
// Frequency
// =============================================================================

/// Spacing between consecutive due dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    /// Every 7 days.
    Weekly,
    /// Every 14 days.
    Biweekly,
    /// Same day each calendar month.
    Monthly,
}

impl Frequency {
    /// Due date of the row `offset` periods after `start`.
    ///
    /// Returns `None` only if the date leaves chrono's supported range.
    pub fn advance(&self, start: NaiveDate, offset: u32) -> Option<NaiveDate> {
        match self {
            Frequency::Weekly => start.checked_add_signed(Duration::days(7 * offset as i64)),
            Frequency::Biweekly => start.checked_add_signed(Duration::days(14 * offset as i64)),
            Frequency::Monthly => start.checked_add_months(Months::new(offset)),
        }
    }
}

// =============================================================================
// Installment
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum InstallmentStatus {
    Pending,
    Paid,
}

/// One row of the schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Installment {
    /// 1-based position in the schedule.
    pub number: u32,
    pub amount_cents: i64,
    #[ts(as = "String")]
    pub due_date: NaiveDate,
    pub status: InstallmentStatus,
    #[ts(as = "Option<String>")]
    pub paid_at: Option<DateTime<Utc>>,
}

impl Installment {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    #[inline]
    pub fn is_paid(&self) -> bool {
        self.status == InstallmentStatus::Paid
    }

    /// Pending and due strictly before `as_of`.
    pub fn is_overdue(&self, as_of: NaiveDate) -> bool {
        !self.is_paid() && self.due_date < as_of
    }
}

// =============================================================================
// Installment Plan
// =============================================================================

/// The fixed schedule attached to a credit sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct InstallmentPlan {
    pub number_of_installments: u32,
    pub frequency: Frequency,
    pub installments: Vec<Installment>,
}

impl InstallmentPlan {
    /// Builds the schedule for `financed` split into `count` rows.
    ///
    /// ## Rules
    /// - `1 ≤ count ≤ MAX_INSTALLMENTS`
    /// - `financed` must be positive
    /// - row `i` (1-based) is due `start + (i − 1) × period`
    ///
    /// ## Example
    /// ```rust
    /// use chrono::NaiveDate;
    /// use mercado_core::installment::{Frequency, InstallmentPlan};
    /// use mercado_core::Money;
    ///
    /// let start = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
    /// let plan = InstallmentPlan::generate(Money::from_cents(3_000), 2, Frequency::Weekly, start)
    ///     .unwrap();
    /// assert_eq!(plan.installments[1].due_date, NaiveDate::from_ymd_opt(2026, 3, 8).unwrap());
    /// ```
    pub fn generate(
        financed: Money,
        count: u32,
        frequency: Frequency,
        start: NaiveDate,
    ) -> CoreResult<Self> {
        if count == 0 || count > MAX_INSTALLMENTS {
            return Err(CoreError::InvalidInstallmentPlan {
                reason: format!(
                    "number of installments must be between 1 and {}",
                    MAX_INSTALLMENTS
                ),
            });
        }
        if !financed.is_positive() {
            return Err(CoreError::InvalidInstallmentPlan {
                reason: "nothing left to finance".to_string(),
            });
        }

        let mut installments = Vec::with_capacity(count as usize);
        for (idx, amount) in financed.split_even(count).into_iter().enumerate() {
            let offset = idx as u32;
            let due_date = frequency.advance(start, offset).ok_or_else(|| {
                CoreError::InvalidInstallmentPlan {
                    reason: "due date out of range".to_string(),
                }
            })?;
            installments.push(Installment {
                number: offset + 1,
                amount_cents: amount.cents(),
                due_date,
                status: InstallmentStatus::Pending,
                paid_at: None,
            });
        }

        Ok(InstallmentPlan {
            number_of_installments: count,
            frequency,
            installments,
        })
    }

    pub fn get(&self, number: u32) -> Option<&Installment> {
        self.installments.iter().find(|i| i.number == number)
    }

    /// Sum of rows not yet paid.
    pub fn pending_total(&self) -> Money {
        self.installments
            .iter()
            .filter(|i| !i.is_paid())
            .map(Installment::amount)
            .sum()
    }

    pub fn is_settled(&self) -> bool {
        self.installments.iter().all(Installment::is_paid)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
