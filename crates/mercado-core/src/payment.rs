//! # Collecting Payments on Credit Sales
//!
//! Two ways to pay down a pending sale:
//!
//! ```text
//! ┌──────────────────────────┐        ┌──────────────────────────────┐
//! │ Sale WITH a plan         │        │ Sale WITHOUT a plan          │
//! │                          │        │                              │
//! │ pay_installments([2,3])  │        │ apply_payment(25.00)         │
//! │  • rows 2,3 → Paid       │        │  • 0 < amount ≤ remaining    │
//! │  • amount = Σ rows       │        │                              │
//! └────────────┬─────────────┘        └──────────────┬───────────────┘
//!              └──────────────┬──────────────────────┘
//!                             ▼
//!          one Payment appended, remaining −= amount
//!          remaining == 0  →  status = Paid
//! ```
//!
//! The caller also lowers the customer's balance by the returned payment's
//! amount; that write belongs to the persistence layer.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::installment::InstallmentStatus;
use crate::money::Money;
use crate::types::{Payment, PaymentMethod, Sale, SaleStatus};

impl Sale {
    /// Marks the selected installments paid and records one payment for
    /// their sum.
    ///
    /// Duplicate numbers in `numbers` count once.
    pub fn pay_installments(
        &mut self,
        payment_id: String,
        numbers: &[u32],
        method: PaymentMethod,
        note: Option<String>,
        at: DateTime<Utc>,
    ) -> CoreResult<Payment> {
        self.ensure_pending("pay installments")?;

        let selected: BTreeSet<u32> = numbers.iter().copied().collect();
        if selected.is_empty() {
            return Err(ValidationError::required("installments").into());
        }

        let sale_id = self.id.clone();
        let plan = self
            .installment_plan
            .as_mut()
            .ok_or_else(|| CoreError::InvalidSaleStatus {
                sale_id: sale_id.clone(),
                current_status: SaleStatus::Pending.as_str().to_string(),
                reason: "sale has no installment plan".to_string(),
            })?;

        // Check every selection before touching anything
        for &number in &selected {
            match plan.get(number) {
                None => {
                    return Err(CoreError::UnknownInstallment {
                        sale_id: sale_id.clone(),
                        number,
                    })
                }
                Some(row) if row.is_paid() => {
                    return Err(CoreError::InstallmentAlreadyPaid {
                        sale_id: sale_id.clone(),
                        number,
                    })
                }
                Some(_) => {}
            }
        }

        let mut amount = Money::zero();
        for row in plan
            .installments
            .iter_mut()
            .filter(|row| selected.contains(&row.number))
        {
            row.status = InstallmentStatus::Paid;
            row.paid_at = Some(at);
            amount += row.amount();
        }
        let settled = plan.is_settled();

        let payment = Payment {
            id: payment_id,
            sale_id,
            amount_cents: amount.cents(),
            method,
            paid_at: at,
            installment_numbers: selected.into_iter().collect(),
            note,
        };
        self.record(payment.clone(), settled);
        Ok(payment)
    }

    /// Records a free-form payment against a sale without an installment
    /// plan.
    pub fn apply_payment(
        &mut self,
        payment_id: String,
        amount: Money,
        method: PaymentMethod,
        note: Option<String>,
        at: DateTime<Utc>,
    ) -> CoreResult<Payment> {
        self.ensure_pending("accept a payment")?;

        if self.installment_plan.is_some() {
            return Err(CoreError::InvalidSaleStatus {
                sale_id: self.id.clone(),
                current_status: self.status.as_str().to_string(),
                reason: "sale is paid by installments".to_string(),
            });
        }
        if !amount.is_positive() {
            return Err(CoreError::InvalidPaymentAmount {
                reason: "amount must be positive".to_string(),
            });
        }
        if amount > self.remaining_balance() {
            return Err(CoreError::InvalidPaymentAmount {
                reason: format!(
                    "amount {} exceeds remaining balance {}",
                    amount,
                    self.remaining_balance()
                ),
            });
        }

        let settled = amount == self.remaining_balance();
        let payment = Payment {
            id: payment_id,
            sale_id: self.id.clone(),
            amount_cents: amount.cents(),
            method,
            paid_at: at,
            installment_numbers: Vec::new(),
            note,
        };
        self.record(payment.clone(), settled);
        Ok(payment)
    }

    fn ensure_pending(&self, action: &str) -> CoreResult<()> {
        if self.status == SaleStatus::Paid {
            return Err(CoreError::InvalidSaleStatus {
                sale_id: self.id.clone(),
                current_status: self.status.as_str().to_string(),
                reason: format!("cannot {} on a paid sale", action),
            });
        }
        Ok(())
    }

    fn record(&mut self, payment: Payment, settled: bool) {
        self.remaining_balance_cents = (self.remaining_balance() - payment.amount())
            .cents()
            .max(0);
        if settled {
            self.remaining_balance_cents = 0;
            self.status = SaleStatus::Paid;
        }
        self.payments.push(payment);
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::installment::{Frequency, InstallmentPlan};
    use crate::types::SaleType;
    use chrono::NaiveDate;

    fn credit_sale(remaining: i64, plan: Option<InstallmentPlan>) -> Sale {
        Sale {
            id: "s-1".to_string(),
            date: Utc::now(),
            subtotal_cents: remaining,
            discount_cents: 0,
            total_cents: remaining,
            cost_total_cents: remaining / 2,
            profit_cents: remaining - remaining / 2,
            sale_type: SaleType::Credit,
            items: vec![],
            customer_id: Some("c-1".to_string()),
            status: SaleStatus::Pending,
            payments: vec![],
            remaining_balance_cents: remaining,
            installment_plan: plan,
        }
    }

    fn planned_sale() -> Sale {
        let start = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
        let plan =
            InstallmentPlan::generate(Money::from_cents(10_000), 3, Frequency::Monthly, start).unwrap();
        credit_sale(10_000, Some(plan))
    }

    #[test]
    fn test_pay_selected_installments() {
        let mut sale = planned_sale();
        let payment = sale
            .pay_installments("p-1".into(), &[2, 3, 3], PaymentMethod::Cash, None, Utc::now())
            .unwrap();

        assert_eq!(payment.amount_cents, 6_666);
        assert_eq!(payment.installment_numbers, vec![2, 3]);
        assert_eq!(sale.remaining_balance_cents, 3_334);
        assert_eq!(sale.status, SaleStatus::Pending);
        assert_eq!(sale.pending_installments().count(), 1);
    }

    #[test]
    fn test_paying_every_installment_settles_sale() {
        let mut sale = planned_sale();
        sale.pay_installments("p-1".into(), &[1], PaymentMethod::Card, None, Utc::now())
            .unwrap();
        sale.pay_installments("p-2".into(), &[2, 3], PaymentMethod::Cash, None, Utc::now())
            .unwrap();

        assert_eq!(sale.status, SaleStatus::Paid);
        assert_eq!(sale.remaining_balance_cents, 0);
        assert_eq!(sale.total_paid().cents(), 10_000);
        assert_eq!(sale.payments.len(), 2);
    }

    #[test]
    fn test_repaying_is_rejected_without_side_effects() {
        let mut sale = planned_sale();
        sale.pay_installments("p-1".into(), &[1], PaymentMethod::Cash, None, Utc::now())
            .unwrap();

        let err = sale
            .pay_installments("p-2".into(), &[2, 1], PaymentMethod::Cash, None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, CoreError::InstallmentAlreadyPaid { number: 1, .. }));
        // Row 2 must still be pending
        assert_eq!(sale.pending_installments().count(), 2);
        assert_eq!(sale.remaining_balance_cents, 6_666);
    }

    #[test]
    fn test_unknown_and_empty_selection() {
        let mut sale = planned_sale();
        let err = sale
            .pay_installments("p-1".into(), &[4], PaymentMethod::Cash, None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, CoreError::UnknownInstallment { number: 4, .. }));

        let err = sale
            .pay_installments("p-1".into(), &[], PaymentMethod::Cash, None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn test_free_form_payment() {
        let mut sale = credit_sale(5_000, None);
        sale.apply_payment("p-1".into(), Money::from_cents(2_000), PaymentMethod::Transfer, None, Utc::now())
            .unwrap();
        assert_eq!(sale.remaining_balance_cents, 3_000);
        assert_eq!(sale.status, SaleStatus::Pending);

        sale.apply_payment("p-2".into(), Money::from_cents(3_000), PaymentMethod::Cash, None, Utc::now())
            .unwrap();
        assert_eq!(sale.status, SaleStatus::Paid);

        let err = sale
            .apply_payment("p-3".into(), Money::from_cents(1), PaymentMethod::Cash, None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidSaleStatus { .. }));
    }

    #[test]
    fn test_free_form_payment_limits() {
        let mut sale = credit_sale(5_000, None);
        assert!(sale
            .apply_payment("p".into(), Money::from_cents(5_001), PaymentMethod::Cash, None, Utc::now())
            .is_err());
        assert!(sale
            .apply_payment("p".into(), Money::zero(), PaymentMethod::Cash, None, Utc::now())
            .is_err());

        let mut planned = planned_sale();
        let err = planned
            .apply_payment("p".into(), Money::from_cents(100), PaymentMethod::Cash, None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidSaleStatus { .. }));
    }
}
