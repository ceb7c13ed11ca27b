//! `timer.cron`: fires each time a cron schedule comes due.
//!
//! State is `{"lastExecution": <rfc3339>}`, holding the next fire time
//! computed on the previous evaluation.

use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cron::Schedule;
use serde_json::{json, Value};

use crate::domain::models::{ParameterField, ParameterSchema};
use crate::domain::ports::{required_str, ActionHandler, CheckOutcome, Clock, HandlerContext, HandlerError};
use crate::services::handler_registry::HandlerInfo;

pub(crate) fn info() -> HandlerInfo {
    HandlerInfo::new("Cron timer", "Triggers every time the cron schedule comes due").with_parameters(
        ParameterSchema::fields([(
            "cron",
            ParameterField::string("Cron expression (crontab 5 fields, or 6/7 with seconds)").example("*/5 * * * *"),
        )]),
    )
}

/// `timer.cron` action. Reads the current time from `clock`.
pub struct CronTimerAction {
    clock: Arc<dyn Clock>,
}

impl CronTimerAction {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

/// Parse a cron expression.
///
/// Classic 5-field crontab expressions get a `0` seconds field prepended,
/// and their numeric day-of-week values (0-7, Sunday = 0 or 7) are
/// rewritten to the `cron` crate's numbering (1-7, Sunday = 1). 6- and
/// 7-field expressions are passed through as-is.
pub fn parse_schedule(expr: &str) -> Result<Schedule, HandlerError> {
    let invalid =
        |reason: String| HandlerError::InvalidParameters(format!("invalid cron expression '{expr}': {reason}"));

    let fields: Vec<&str> = expr.split_whitespace().collect();
    let normalized = if let [minute, hour, dom, month, dow] = fields[..] {
        let dow = crontab_day_of_week(dow).map_err(invalid)?;
        format!("0 {minute} {hour} {dom} {month} {dow}")
    } else {
        expr.to_string()
    };
    Schedule::from_str(&normalized).map_err(|e| invalid(e.to_string()))
}

/// Rewrite a crontab day-of-week field. Named days (`Mon`, `Fri`) and
/// `*`/`?` need no rewriting and are kept verbatim.
fn crontab_day_of_week(field: &str) -> Result<String, String> {
    if field == "*" || field == "?" {
        return Ok(field.to_string());
    }

    let mut out = Vec::new();
    for token in field.split(',') {
        match crontab_days(token)? {
            Some(days) => out.extend(days.into_iter().map(|d| (d + 1).to_string())),
            None => out.push(token.to_string()),
        }
    }
    out.sort_unstable();
    out.dedup();
    Ok(out.join(","))
}

/// Expand one numeric day-of-week token (`n`, `a-b`, `*/s`, `a-b/s`, `n/s`)
/// into crontab days 0-6. Returns `None` for tokens that are not numeric.
fn crontab_days(token: &str) -> Result<Option<BTreeSet<u32>>, String> {
    let (base, step) = match token.split_once('/') {
        Some((base, step)) => (base, Some(step)),
        None => (token, None),
    };

    let (start, end) = if base == "*" {
        (0, 6)
    } else if let Some((a, b)) = base.split_once('-') {
        match (a.parse::<u32>(), b.parse::<u32>()) {
            (Ok(a), Ok(b)) => (a, b),
            _ => return Ok(None),
        }
    } else {
        match base.parse::<u32>() {
            Ok(n) if step.is_some() => (n, 6),
            Ok(n) => (n, n),
            Err(_) => return Ok(None),
        }
    };

    let step = match step {
        None => 1,
        Some(s) => match s.parse::<usize>() {
            Ok(s) if s > 0 => s,
            _ => return Err(format!("invalid day-of-week step in '{token}'")),
        },
    };
    if start > end || end > 7 {
        return Err(format!("day-of-week '{token}' is outside 0-7"));
    }

    Ok(Some((start..=end).step_by(step).map(|d| d % 7).collect()))
}

fn last_execution(state: Option<&Value>) -> Option<DateTime<Utc>> {
    state
        .and_then(|s| s.get("lastExecution"))
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

#[async_trait]
impl ActionHandler for CronTimerAction {
    async fn check(
        &self,
        parameters: &Value,
        current_state: Option<&Value>,
        _ctx: &HandlerContext,
    ) -> Result<CheckOutcome, HandlerError> {
        let expr = required_str(parameters, "cron")?;
        let schedule = parse_schedule(expr)?;
        let now = self.clock.now();

        let next = schedule
            .after(&now)
            .next()
            .ok_or_else(|| HandlerError::InvalidParameters(format!("cron expression '{expr}' never fires again")))?;
        let state = json!({ "lastExecution": next.to_rfc3339() });

        Ok(match last_execution(current_state) {
            None => CheckOutcome::baseline(state),
            Some(due) if now >= due => CheckOutcome::fire(state),
            Some(_) => CheckOutcome::idle(),
        })
    }
}
