//! Billing domain module (event-sourced).
//!
//! This crate contains the business rules for client invoices, installment
//! plans, payment reconciliation and firm expenses, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod expense;
pub mod invoice;
pub mod policy;

pub use expense::{
    Expense, ExpenseCommand, ExpenseEvent, ExpenseId, ExpenseRecorded, ExpenseVoided,
    RecordExpense, VoidExpense,
};
pub use invoice::{
    CreateInvoice, DefineInstallmentPlan, DeleteInvoice, DeletePayment, Installment,
    InstallmentPart, InstallmentPlanDefined, InstallmentStatus, Invoice, InvoiceCommand,
    InvoiceCreated, InvoiceDeleted, InvoiceEvent, InvoiceId, InvoiceMarkedOverdue, InvoiceStatus,
    InvoiceUpdated, MarkOverdue, PaymentDeleted, PaymentId, PaymentMethod, PaymentRecord,
    PaymentRecorded, RecordPayment, UpdateInvoice,
};
