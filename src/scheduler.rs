use chrono::{DateTime, Utc};
use croner::Cron;
use regex::Regex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::ScheduleConfig;
use crate::monitor::MonitorHandle;
use crate::types::ReportKind;

struct Schedule {
    kind: ReportKind,
    cron: Cron,
    expr: String,
    next_run: Option<DateTime<Utc>>,
}

impl Schedule {
    fn new(kind: ReportKind, input: &str, now: DateTime<Utc>) -> anyhow::Result<Self> {
        let expr = parse_schedule(input)?;
        let cron = Cron::new(&expr)
            .parse()
            .map_err(|e| anyhow::anyhow!("Failed to parse cron '{}': {}", expr, e))?;
        let next_run = next_after(&cron, now);
        Ok(Self {
            kind,
            cron,
            expr,
            next_run,
        })
    }
}

fn next_after(cron: &Cron, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    cron.find_next_occurrence(&after, false).ok()
}

/// Fires daily and weekly digest triggers at their cron times (UTC).
///
/// Only decides *when*; composing and sending belongs to the monitor.
pub struct ReportScheduler {
    schedules: Vec<Schedule>,
    tick_interval: Duration,
}

impl ReportScheduler {
    pub fn new(config: &ScheduleConfig) -> anyhow::Result<Self> {
        Self::starting_at(config, Utc::now())
    }

    fn starting_at(config: &ScheduleConfig, now: DateTime<Utc>) -> anyhow::Result<Self> {
        let schedules = vec![
            Schedule::new(ReportKind::Daily, &config.daily, now)?,
            Schedule::new(ReportKind::Weekly, &config.weekly, now)?,
        ];
        for s in &schedules {
            info!(kind = s.kind.as_str(), cron = %s.expr, next_run = ?s.next_run, "Report scheduled");
        }
        Ok(Self {
            schedules,
            tick_interval: Duration::from_secs(config.tick_interval_secs.max(1)),
        })
    }

    /// Triggers whose time has come. Each fires at most once per call, even
    /// if several occurrences were missed, and its next run moves past `now`.
    fn due(&mut self, now: DateTime<Utc>) -> Vec<ReportKind> {
        let mut fired = Vec::new();
        for schedule in &mut self.schedules {
            let Some(next) = schedule.next_run else {
                continue;
            };
            if next > now {
                continue;
            }
            fired.push(schedule.kind);
            schedule.next_run = next_after(&schedule.cron, now);
            if schedule.next_run.is_none() {
                error!(cron = %schedule.expr, "No further occurrences; schedule disabled");
            }
        }
        fired
    }

    pub fn spawn(mut self, monitor: MonitorHandle, shutdown: CancellationToken) {
        tokio::spawn(async move {
            info!("Report scheduler spawned");
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(self.tick_interval) => {}
                }
                for kind in self.due(Utc::now()) {
                    if monitor.request_report(kind).await.is_err() {
                        warn!(kind = kind.as_str(), "Monitor is gone; dropping scheduled report");
                    } else {
                        info!(kind = kind.as_str(), "Fired scheduled report");
                    }
                }
            }
            info!("Report scheduler stopped");
        });
    }
}

/// Parse a human-friendly schedule string into a 5-field cron expression.
/// Supports natural shortcuts and raw cron pass-through.
pub fn parse_schedule(input: &str) -> anyhow::Result<String> {
    let input = input.trim();

    match input.to_lowercase().as_str() {
        "hourly" => return Ok("0 * * * *".to_string()),
        "daily" => return Ok("0 0 * * *".to_string()),
        "weekly" => return Ok("0 0 * * 1".to_string()),
        "monthly" => return Ok("0 0 1 * *".to_string()),
        _ => {}
    }

    // "every Nm" / "every N minutes"
    let re_minutes = Regex::new(r"(?i)^every\s+(\d+)\s*(?:m|min|mins|minutes?)$")?;
    if let Some(caps) = re_minutes.captures(input) {
        let n: u32 = caps[1].parse()?;
        if n == 0 || n > 59 {
            anyhow::bail!("Minutes interval must be between 1 and 59");
        }
        return Ok(format!("*/{} * * * *", n));
    }

    // "every Nh" / "every N hours"
    let re_hours = Regex::new(r"(?i)^every\s+(\d+)\s*(?:h|hrs?|hours?)$")?;
    if let Some(caps) = re_hours.captures(input) {
        let n: u32 = caps[1].parse()?;
        if n == 0 || n > 23 {
            anyhow::bail!("Hours interval must be between 1 and 23");
        }
        return Ok(format!("0 */{} * * *", n));
    }

    // "daily at 8am" / "daily at 14:30"
    let re_daily = Regex::new(r"(?i)^daily\s+at\s+(\d{1,2})(?::(\d{2}))?\s*(am|pm)?$")?;
    if let Some(caps) = re_daily.captures(input) {
        let (hour, minute) = parse_time_captures(&caps)?;
        return Ok(format!("{} {} * * *", minute, hour));
    }

    // "weekdays at 8:30" (Mon-Fri)
    let re_weekdays = Regex::new(r"(?i)^weekdays?\s+at\s+(\d{1,2})(?::(\d{2}))?\s*(am|pm)?$")?;
    if let Some(caps) = re_weekdays.captures(input) {
        let (hour, minute) = parse_time_captures(&caps)?;
        return Ok(format!("{} {} * * 1-5", minute, hour));
    }

    // "workdays at 8am" (Mon-Sat)
    let re_workdays = Regex::new(r"(?i)^workdays?\s+at\s+(\d{1,2})(?::(\d{2}))?\s*(am|pm)?$")?;
    if let Some(caps) = re_workdays.captures(input) {
        let (hour, minute) = parse_time_captures(&caps)?;
        return Ok(format!("{} {} * * 1-6", minute, hour));
    }

    // "mondays at 9am"
    let re_mondays = Regex::new(r"(?i)^mondays?\s+at\s+(\d{1,2})(?::(\d{2}))?\s*(am|pm)?$")?;
    if let Some(caps) = re_mondays.captures(input) {
        let (hour, minute) = parse_time_captures(&caps)?;
        return Ok(format!("{} {} * * 1", minute, hour));
    }

    let parts: Vec<&str> = input.split_whitespace().collect();
    if parts.len() == 5 {
        Cron::new(input)
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid cron expression '{}': {}", input, e))?;
        return Ok(input.to_string());
    }

    anyhow::bail!(
        "Unrecognized schedule format '{}'. Use a shortcut (e.g. 'workdays at 8am', 'mondays at 0:00') or a 5-field cron expression.",
        input
    )
}

/// Extract hour and minute from regex captures with optional AM/PM.
fn parse_time_captures(caps: &regex::Captures) -> anyhow::Result<(u32, u32)> {
    let mut hour: u32 = caps[1].parse()?;
    let minute: u32 = caps.get(2).map_or(Ok(0), |m| m.as_str().parse())?;
    if let Some(ampm) = caps.get(3) {
        let ampm = ampm.as_str().to_lowercase();
        if ampm == "pm" && hour < 12 {
            hour += 12;
        } else if ampm == "am" && hour == 12 {
            hour = 0;
        }
    }
    if hour > 23 {
        anyhow::bail!("Hour must be between 0 and 23");
    }
    if minute > 59 {
        anyhow::bail!("Minute must be between 0 and 59");
    }
    Ok((hour, minute))
}
