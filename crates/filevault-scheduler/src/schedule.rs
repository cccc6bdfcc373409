//! Schedule expression parsing.
//!
//! Two forms are accepted:
//! - cron with five fields (`min hour dom month dow`) or six fields
//!   (`sec min hour dom month dow`), including ranges, steps, lists, month
//!   and weekday names, and `@` aliases such as `@daily`
//! - an RFC 3339 timestamp, which fires exactly once

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use croner::Cron;
use croner::parser::{CronParser, Seconds};

use filevault_core::error::AppError;

/// How far ahead an occurrence is searched for before giving up.
const HORIZON_DAYS: i64 = 5 * 366;

/// Errors produced while parsing or evaluating a schedule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    /// The expression is malformed.
    #[error("Invalid schedule expression '{expression}': {reason}")]
    InvalidExpression {
        /// The rejected expression.
        expression: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The expression never fires again within the search horizon.
    #[error("Schedule '{expression}' has no upcoming occurrence")]
    NoUpcomingOccurrence {
        /// The exhausted expression.
        expression: String,
    },
}

impl From<ScheduleError> for AppError {
    fn from(err: ScheduleError) -> Self {
        AppError::validation(err.to_string())
    }
}

#[derive(Debug, Clone)]
enum Recurrence {
    Cron(Cron),
    Once(DateTime<Utc>),
}

/// A parsed schedule expression.
#[derive(Debug, Clone)]
pub struct Schedule {
    expression: String,
    recurrence: Recurrence,
}

impl Schedule {
    /// Parse an expression.
    pub fn parse(expression: &str) -> Result<Self, ScheduleError> {
        let trimmed = expression.trim();
        let invalid = |reason: String| ScheduleError::InvalidExpression {
            expression: expression.to_string(),
            reason,
        };

        if trimmed.is_empty() {
            return Err(invalid("expression is empty".to_string()));
        }

        if let Ok(at) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(Self {
                expression: trimmed.to_string(),
                recurrence: Recurrence::Once(at.with_timezone(&Utc)),
            });
        }

        if !trimmed.starts_with('@') {
            let fields = trimmed.split_whitespace().count();
            if fields != 5 && fields != 6 {
                return Err(invalid(format!("expected 5 or 6 fields, found {fields}")));
            }
        }

        let cron = CronParser::builder()
            .seconds(Seconds::Optional)
            .build()
            .parse(trimmed)
            .map_err(|e| invalid(e.to_string()))?;

        Ok(Self {
            expression: trimmed.to_string(),
            recurrence: Recurrence::Cron(cron),
        })
    }

    /// The earliest fire time strictly after `after`.
    pub fn next_fire_time(&self, after: DateTime<Utc>) -> Result<DateTime<Utc>, ScheduleError> {
        let exhausted = || ScheduleError::NoUpcomingOccurrence {
            expression: self.expression.clone(),
        };

        let next = match &self.recurrence {
            Recurrence::Once(at) => *at,
            Recurrence::Cron(cron) => cron
                .find_next_occurrence(&after, false)
                .map_err(|_| exhausted())?,
        };
        if next <= after || next - after > TimeDelta::days(HORIZON_DAYS) {
            return Err(exhausted());
        }
        Ok(next)
    }

    /// The next `count` fire times after `after`.
    pub fn upcoming(&self, after: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
        let mut times = Vec::with_capacity(count);
        let mut cursor = after;
        while times.len() < count {
            match self.next_fire_time(cursor) {
                Ok(next) => {
                    times.push(next);
                    cursor = next;
                }
                Err(_) => break,
            }
        }
        times
    }

    /// The normalized source expression.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Whether the schedule fires at most once.
    pub fn is_one_shot(&self) -> bool {
        matches!(self.recurrence, Recurrence::Once(_))
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}
