use axum::{Router, routing::get};

pub mod billing;
pub mod cases;
pub mod expenses;
pub mod feeds;
pub mod invoices;
pub mod payments;
pub mod staff;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/reminders", get(feeds::reminders))
        .route("/activity", get(feeds::activity))
        .nest("/cases", cases::router())
        .nest("/invoices", invoices::router())
        .nest("/payments", payments::router())
        .nest("/billing", billing::router())
        .nest("/expenses", expenses::router())
        .nest("/staff", staff::router())
}
