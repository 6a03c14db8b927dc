//! Outbound hearing notifications.
//!
//! Delivery is a side effect outside the event-sourced core, so it sits
//! behind a trait: the scheduler composes the message and who gets it, the
//! notifier decides how it leaves the building. Failures are reported, not
//! fatal; the reminder stays pending and is retried on the next tick.

use std::sync::Mutex;

use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;
use tracing::info;

use chancery_cases::CaseId;
use chancery_core::UserId;

/// A composed hearing reminder, ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HearingReminder {
    pub case_id: CaseId,
    pub case_number: String,
    pub stage: u32,
    pub hearing_date: NaiveDate,
    pub hearing_time: NaiveTime,
    pub location: Option<String>,
    /// Deduplicated staff recipients.
    pub recipients: Vec<UserId>,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("reminder delivery failed: {0}")]
    Delivery(String),
}

/// Sink for outbound reminders.
pub trait Notifier: Send + Sync {
    fn notify(&self, reminder: &HearingReminder) -> Result<(), NotifyError>;
}

/// Notifier that writes reminders to the log.
///
/// Default delivery channel for single-office deployments; the log line
/// carries everything a front desk needs to chase people down.
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl TracingNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl Notifier for TracingNotifier {
    fn notify(&self, reminder: &HearingReminder) -> Result<(), NotifyError> {
        info!(
            case_number = %reminder.case_number,
            stage = reminder.stage,
            hearing_date = %reminder.hearing_date,
            hearing_time = %reminder.hearing_time,
            location = reminder.location.as_deref().unwrap_or("unspecified"),
            recipients = reminder.recipients.len(),
            "hearing reminder"
        );
        Ok(())
    }
}

/// Notifier that collects reminders in memory, for tests.
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    sent: Mutex<Vec<HearingReminder>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<HearingReminder> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(_) => vec![],
        }
    }
}

impl Notifier for CollectingNotifier {
    fn notify(&self, reminder: &HearingReminder) -> Result<(), NotifyError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(reminder.clone());
        }
        Ok(())
    }
}
