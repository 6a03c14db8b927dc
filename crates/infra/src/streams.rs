//! Canonical aggregate-type names for event streams.
//!
//! Every stream in the store is keyed by `(aggregate_type, aggregate_id)`.
//! Projections and the dispatcher match on these constants instead of
//! free-hand strings, so a typo fails to compile rather than silently
//! routing events nowhere.

/// Case lifecycle aggregate.
pub const CASE: &str = "case";

/// Invoice aggregate (billing).
pub const INVOICE: &str = "billing.invoice";

/// Expense aggregate (billing).
pub const EXPENSE: &str = "billing.expense";

/// Staff member aggregate (registry of people who may act).
pub const STAFF: &str = "staff";
