//! Derived status policy for invoices and installments.
//!
//! The ladder is normative: paid in full beats everything, any payment at
//! all shields from overdue, and overdue only applies once the due date is
//! strictly in the past. Aggregates re-run these functions after every
//! applied event with that event's date, never the wall clock.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::invoice::{InstallmentStatus, InvoiceStatus};

/// Derive an invoice status from its paid/total amounts and due date.
pub fn invoice_status(
    paid: Decimal,
    total: Decimal,
    due_date: Option<NaiveDate>,
    as_of: NaiveDate,
) -> InvoiceStatus {
    if paid >= total {
        return InvoiceStatus::Paid;
    }
    if paid > Decimal::ZERO {
        return InvoiceStatus::PartiallyPaid;
    }
    if due_date.is_some_and(|due| due < as_of) {
        return InvoiceStatus::Overdue;
    }
    InvoiceStatus::Unpaid
}

/// Derive an installment status; same ladder with a `Pending` base.
pub fn installment_status(
    paid: Decimal,
    amount: Decimal,
    due_date: NaiveDate,
    as_of: NaiveDate,
) -> InstallmentStatus {
    if paid >= amount {
        return InstallmentStatus::Paid;
    }
    if paid > Decimal::ZERO {
        return InstallmentStatus::PartiallyPaid;
    }
    if due_date < as_of {
        return InstallmentStatus::Overdue;
    }
    InstallmentStatus::Pending
}
