use crate::error::TaskError;
use crate::queue::TaskQueue;
use chrono::{DateTime, Days, NaiveTime, Utc};
use serde_json::Value;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// When a scheduled task fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Fixed interval, first fire one interval after start.
    Every(Duration),
    /// Once a day at the given UTC wall-clock time.
    Daily { hour: u32, minute: u32 },
}

impl Schedule {
    /// Daily schedule, validated.
    ///
    /// # Errors
    /// [`TaskError::InvalidSchedule`] for an hour above 23 or a minute above 59.
    pub fn daily(hour: u32, minute: u32) -> Result<Self, TaskError> {
        if NaiveTime::from_hms_opt(hour, minute, 0).is_none() {
            return Err(TaskError::InvalidSchedule {
                message: format!("{hour:02}:{minute:02} is not a time of day").into(),
                context: None,
            });
        }
        Ok(Self::Daily { hour, minute })
    }

    /// First fire strictly after `now`.
    ///
    /// # Errors
    /// [`TaskError::InvalidSchedule`] for a zero interval or an invalid time of day.
    pub fn next_after(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, TaskError> {
        match *self {
            Self::Every(interval) => {
                if interval.is_zero() {
                    return Err(TaskError::InvalidSchedule {
                        message: "interval must be positive".into(),
                        context: None,
                    });
                }
                chrono::Duration::from_std(interval)
                    .ok()
                    .and_then(|step| now.checked_add_signed(step))
                    .ok_or_else(|| TaskError::InvalidSchedule {
                        message: "interval is out of range".into(),
                        context: None,
                    })
            },
            Self::Daily { hour, minute } => {
                let time = NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| {
                    TaskError::InvalidSchedule {
                        message: format!("{hour:02}:{minute:02} is not a time of day").into(),
                        context: None,
                    }
                })?;
                let today = now.date_naive().and_time(time).and_utc();
                if today > now {
                    return Ok(today);
                }
                today.checked_add_days(Days::new(1)).ok_or_else(|| TaskError::InvalidSchedule {
                    message: "next day is out of range".into(),
                    context: None,
                })
            },
        }
    }
}

/// A task enqueued on a [`Schedule`].
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub task: &'static str,
    pub schedule: Schedule,
    pub payload: Value,
}

impl ScheduledTask {
    #[must_use]
    pub const fn new(task: &'static str, schedule: Schedule, payload: Value) -> Self {
        Self { task, schedule, payload }
    }
}

/// Periodically enqueues tasks on a [`TaskQueue`].
#[derive(Debug)]
pub struct Scheduler {
    queue: TaskQueue,
    entries: Vec<ScheduledTask>,
}

impl Scheduler {
    #[must_use]
    pub const fn new(queue: TaskQueue) -> Self {
        Self { queue, entries: Vec::new() }
    }

    /// Adds an entry; its first fire time is validated here.
    ///
    /// # Errors
    /// [`TaskError::InvalidSchedule`] for a schedule that can never fire.
    pub fn add(&mut self, entry: ScheduledTask) -> Result<&mut Self, TaskError> {
        entry.schedule.next_after(Utc::now())?;
        self.entries.push(entry);
        Ok(self)
    }

    #[must_use]
    pub fn entries(&self) -> &[ScheduledTask] {
        &self.entries
    }

    /// Spawns one timer per entry; all of them stop when `cancel` fires.
    pub fn start(self, cancel: &CancellationToken) -> Vec<JoinHandle<()>> {
        info!(entries = self.entries.len(), "Scheduler started");
        self.entries
            .into_iter()
            .map(|entry| {
                let queue = self.queue.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move { run_entry(queue, entry, cancel).await })
            })
            .collect()
    }
}

async fn run_entry(queue: TaskQueue, entry: ScheduledTask, cancel: CancellationToken) {
    loop {
        let now = Utc::now();
        let next = match entry.schedule.next_after(now) {
            Ok(next) => next,
            Err(err) => {
                error!(task = entry.task, error = %err, "Schedule stopped");
                return;
            },
        };
        let wait = (next - now).to_std().unwrap_or_default();
        debug!(task = entry.task, next = %next, "Next scheduled run");

        tokio::select! {
            () = cancel.cancelled() => return,
            () = tokio::time::sleep(wait) => {},
        }

        match queue.enqueue(entry.task, entry.payload.clone()) {
            Ok(task_id) => info!(task = entry.task, %task_id, "Scheduled task enqueued"),
            Err(err) => error!(task = entry.task, error = %err, "Scheduled task not enqueued"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, h, m, s).unwrap()
    }

    #[test]
    fn daily_fires_later_today() {
        let next = Schedule::daily(12, 30).unwrap().next_after(at(8, 0, 0)).unwrap();
        assert_eq!(next, at(12, 30, 0));
    }

    #[test]
    fn daily_rolls_over_to_tomorrow() {
        let next = Schedule::daily(0, 0).unwrap().next_after(at(0, 0, 0)).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap());
    }

    #[test]
    fn every_adds_interval() {
        let next = Schedule::Every(Duration::from_secs(90)).next_after(at(1, 0, 0)).unwrap();
        assert_eq!(next, at(1, 1, 30));
    }

    #[test]
    fn invalid_schedules_are_rejected() {
        assert!(Schedule::daily(24, 0).is_err());
        assert!(Schedule::daily(3, 60).is_err());
        assert!(Schedule::Every(Duration::ZERO).next_after(at(0, 0, 0)).is_err());
    }
}
