// libs/session-series-cell/src/services/periodicity.rs
use chrono::{DateTime, Duration, Months, Utc};

use crate::models::{Periodicity, SessionError};

/// Date of the occurrence after `current`.
///
/// `Monthly` keeps the day of month and clamps to the last day when the
/// target month is shorter (Jan 31 -> Feb 28). The clamp carries forward
/// when applied repeatedly, so Jan 31 -> Feb 28 -> Mar 28.
pub fn next_date(current: DateTime<Utc>, periodicity: Periodicity) -> Result<DateTime<Utc>, SessionError> {
    let next = match periodicity {
        Periodicity::Weekly => current.checked_add_signed(Duration::days(7)),
        Periodicity::BiWeekly => current.checked_add_signed(Duration::days(14)),
        Periodicity::Monthly => current.checked_add_months(Months::new(1)),
        Periodicity::None => {
            return Err(SessionError::InvalidPeriodicity(periodicity.to_string()));
        }
    };

    next.ok_or_else(|| SessionError::InvalidTime(format!("{} after {} is out of range", periodicity, current)))
}

/// Start times of `count` follow-ups; the i-th is `next_date` applied i times to `start`.
pub fn follow_up_dates(
    start: DateTime<Utc>,
    periodicity: Periodicity,
    count: usize,
) -> Result<Vec<DateTime<Utc>>, SessionError> {
    let mut dates = Vec::with_capacity(count);
    let mut current = start;
    for _ in 0..count {
        current = next_date(current, periodicity)?;
        dates.push(current);
    }
    Ok(dates)
}
