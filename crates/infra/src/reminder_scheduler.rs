//! Dispatching due hearing reminders.
//!
//! The scheduler ticks over the reminders projection, composes a message per
//! due entry, and hands it to the [`Notifier`]. Recipients are the assigned
//! lawyer plus every active lawyer, secretary, and director; accountants are
//! not chased about hearings. Delivery is at-least-once: only a successful
//! notify marks the entry dispatched, so a failed delivery is retried on the
//! next tick and a crash between notify and mark can re-send.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use chancery_core::{AggregateRoot, StaffRole, UserId};

use crate::notify::{HearingReminder, Notifier};
use crate::projections::{CasesProjection, RemindersProjection, StaffDirectoryProjection};

/// Outcome of one scheduler tick.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReminderRunReport {
    /// Reminders that were due this tick.
    pub due: usize,
    /// Successfully handed to the notifier and marked dispatched.
    pub dispatched: usize,
    /// Left pending for the next tick.
    pub failed: usize,
}

pub struct ReminderScheduler {
    reminders: Arc<RemindersProjection>,
    cases: Arc<CasesProjection>,
    staff: Arc<StaffDirectoryProjection>,
    notifier: Arc<dyn Notifier>,
}

impl ReminderScheduler {
    pub fn new(
        reminders: Arc<RemindersProjection>,
        cases: Arc<CasesProjection>,
        staff: Arc<StaffDirectoryProjection>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            reminders,
            cases,
            staff,
            notifier,
        }
    }

    /// Dispatch everything due at `now`.
    pub fn run_once(&self, now: DateTime<Utc>) -> ReminderRunReport {
        let due = self.reminders.due(now);
        let mut report = ReminderRunReport {
            due: due.len(),
            ..ReminderRunReport::default()
        };

        for entry in due {
            let Some(case) = self.cases.get(&entry.case_id) else {
                // Case projection is behind or the case is gone; the entry
                // will be retried or removed by a later event.
                debug!(case_id = %entry.case_id, stage = entry.stage, "reminder case not found");
                report.failed += 1;
                continue;
            };

            let reminder = HearingReminder {
                case_id: entry.case_id,
                case_number: case.case_number().to_string(),
                stage: entry.stage,
                hearing_date: entry.hearing_date,
                hearing_time: entry.hearing_time,
                location: entry.location.clone(),
                recipients: self.recipients(case.assigned_lawyer()),
            };

            match self.notifier.notify(&reminder) {
                Ok(()) => {
                    self.reminders.mark_dispatched(entry.case_id, entry.stage, now);
                    report.dispatched += 1;
                }
                Err(e) => {
                    warn!(
                        case_number = %reminder.case_number,
                        stage = reminder.stage,
                        error = %e,
                        "reminder delivery failed, will retry"
                    );
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// Assigned lawyer plus all active lawyers, secretaries, and directors.
    fn recipients(&self, assigned_lawyer: Option<UserId>) -> Vec<UserId> {
        let mut set: HashSet<UserId> = HashSet::new();
        if let Some(lawyer) = assigned_lawyer {
            set.insert(lawyer);
        }
        for member in self.staff.active() {
            match member.role() {
                StaffRole::Lawyer
                | StaffRole::ApprovingLawyer
                | StaffRole::Secretary
                | StaffRole::Director => {
                    set.insert(*member.id());
                }
                StaffRole::Accountant => {}
            }
        }

        let mut recipients: Vec<UserId> = set.into_iter().collect();
        recipients.sort_by_key(|u| *u.as_uuid());
        recipients
    }
}
