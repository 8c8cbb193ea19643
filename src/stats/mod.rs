//! Statistics on jobs the bot has rebuilt.
//!
//! The build API lists every job on a branch for a given day. Jobs the bot
//! triggered carry a reason naming the bot's user, either on the job itself
//! or on the first request that produced it.

use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

/// A job as listed by `GET {root}/{branch}?date=...`.
///
/// Only the fields needed for statistics are decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Job {
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub requests: Option<Vec<JobRequest>>,
    #[serde(default)]
    pub status: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct JobRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

impl Job {
    /// Returns true if the job's own reason, or its first request's, is `reason`.
    pub fn rebuilt_with(&self, reason: &str) -> bool {
        let first_request = self
            .requests
            .as_deref()
            .and_then(<[JobRequest]>::first)
            .and_then(|r| r.reason.as_deref());
        first_request == Some(reason) || self.reason.as_deref() == Some(reason)
    }

    fn failed(&self) -> bool {
        matches!(self.status, Some(1 | 2))
    }

    fn passed(&self) -> bool {
        self.status == Some(0)
    }
}

/// The rebuild reason the build API records for jobs triggered by `user`.
pub fn bot_reason(user: &str) -> String {
    format!("Self-serve: Rebuilt by {}", user)
}

/// Job counts for one or more days.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DaySummary {
    /// Every job on the branch.
    pub jobs: usize,
    /// Jobs the bot rebuilt.
    pub bot_jobs: usize,
    /// Bot jobs that failed (status 1 or 2).
    pub failed: usize,
    /// Bot jobs that passed (status 0).
    pub passed: usize,
}

impl DaySummary {
    /// Share of all jobs the bot rebuilt, as a percentage.
    pub fn bot_share(&self) -> f64 {
        percent(self.bot_jobs, self.jobs)
    }

    pub fn failed_share(&self) -> f64 {
        percent(self.failed, self.bot_jobs)
    }

    pub fn passed_share(&self) -> f64 {
        percent(self.passed, self.bot_jobs)
    }
}

impl AddAssign for DaySummary {
    fn add_assign(&mut self, rhs: Self) {
        self.jobs += rhs.jobs;
        self.bot_jobs += rhs.bot_jobs;
        self.failed += rhs.failed;
        self.passed += rhs.passed;
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Counts a day's jobs, picking out those rebuilt with `bot_reason`.
pub fn summarize(jobs: &[Job], bot_reason: &str) -> DaySummary {
    let bot: Vec<&Job> = jobs.iter().filter(|j| j.rebuilt_with(bot_reason)).collect();
    DaySummary {
        jobs: jobs.len(),
        bot_jobs: bot.len(),
        failed: bot.iter().filter(|j| j.failed()).count(),
        passed: bot.iter().filter(|j| j.passed()).count(),
    }
}
