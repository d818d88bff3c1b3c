use std::collections::BTreeMap;

use crate::contest::ContestLog;
use crate::deadlines::{Schedule, ScheduleBook};
use crate::error::EngineError;

/// Credit granted (before deadline scaling) to an accepted submission whose
/// raw score is not positive, e.g. a zero-weight checker result.
pub const LENIENT_ZERO_CREDIT: f64 = 0.5;

/// How to credit an accepted submission with raw_score <= 0. Chosen per
/// assignment type by the caller; exams run strict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZeroPolicy {
    #[default]
    Lenient,
    Strict,
}

impl ZeroPolicy {
    pub fn zero_credit(self) -> f64 {
        match self {
            ZeroPolicy::Lenient => LENIENT_ZERO_CREDIT,
            ZeroPolicy::Strict => 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StudentRecord {
    pub student_id: String,
    pub login: String,
    pub name: String,
    pub group: Option<String>,
    /// problem title -> best credited score. Keys span the full global
    /// problem set, zero when never credited.
    pub problems: BTreeMap<String, f64>,
    /// Derived: always the sum of `problems` values.
    pub total: f64,
}

impl StudentRecord {
    pub fn zeroed(student_id: &str, login: &str, name: &str, problems: &[String]) -> Self {
        Self {
            student_id: student_id.to_string(),
            login: login.to_string(),
            name: name.to_string(),
            group: None,
            problems: problems.iter().map(|p| (p.clone(), 0.0)).collect(),
            total: 0.0,
        }
    }

    pub fn recompute_total(&mut self) {
        self.total = self.problems.values().sum();
    }
}

/// Fold one accepted submission into a record. The merge is a max, so a
/// later, worse submission never lowers an already credited score, and the
/// fold is order independent.
pub fn credit(
    record: &mut StudentRecord,
    problem: &str,
    time_ms: i64,
    raw_score: f64,
    schedule: &Schedule,
    policy: ZeroPolicy,
) {
    let scale = schedule.scale_at(time_ms);
    let base = if raw_score > 0.0 {
        raw_score
    } else {
        policy.zero_credit()
    };
    let credited = scale * base;

    let slot = record.problems.entry(problem.to_string()).or_insert(0.0);
    if credited > *slot {
        log::debug!(
            "{}: {} credited {} (scale {}, raw {})",
            record.login,
            problem,
            credited,
            scale,
            raw_score
        );
        *slot = credited;
    }
}

/// Score a whole contest: seed a zeroed record per user, fold every accepted
/// submission under the schedule the resolver picks for that student, then
/// derive totals. A submission whose author is missing from the user table is
/// fatal; it means a corrupt or mismatched dump.
pub fn score_contest(
    log: &ContestLog,
    schedules: &ScheduleBook,
    policy: ZeroPolicy,
) -> Result<BTreeMap<String, StudentRecord>, EngineError> {
    let users = log.user_table();

    let mut records: BTreeMap<String, StudentRecord> = log
        .users
        .iter()
        .map(|u| {
            (
                u.login.clone(),
                StudentRecord::zeroed(&u.id, &u.login, &u.displayed_name, &log.problems),
            )
        })
        .collect();

    let mut folded = 0_usize;
    for submit in &log.submissions {
        if !submit.is_accepted() {
            continue;
        }
        let user = users
            .get(submit.user_id.as_str())
            .ok_or_else(|| EngineError::UnknownStudent {
                user_id: submit.user_id.clone(),
            })?;
        let schedule = schedules.resolve(&user.login);
        if let Some(record) = records.get_mut(&user.login) {
            credit(
                record,
                &submit.problem_title,
                submit.absolute_time,
                submit.score,
                schedule,
                policy,
            );
            folded += 1;
        }
    }

    equalize_problem_keys(&mut records);
    for record in records.values_mut() {
        record.recompute_total();
    }
    log::info!(
        "folded {} accepted submission(s) into {} record(s)",
        folded,
        records.len()
    );
    Ok(records)
}

/// Every record carries the union of problem keys, absent ones at zero. A
/// submission may reference a title missing from the dump's problem list.
fn equalize_problem_keys(records: &mut BTreeMap<String, StudentRecord>) {
    let mut all_keys: Vec<String> = Vec::new();
    for record in records.values() {
        for key in record.problems.keys() {
            if !all_keys.iter().any(|k| k == key) {
                all_keys.push(key.clone());
            }
        }
    }
    for record in records.values_mut() {
        for key in &all_keys {
            record.problems.entry(key.clone()).or_insert(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contest::{ContestUser, Submission};
    use crate::deadlines::Deadline;

    fn sched(pairs: &[(i64, f64)]) -> Schedule {
        Schedule::new(
            pairs
                .iter()
                .map(|&(until_ms, scale)| Deadline { until_ms, scale })
                .collect(),
        )
    }

    fn record(problems: &[&str]) -> StudentRecord {
        let problems: Vec<String> = problems.iter().map(|s| s.to_string()).collect();
        StudentRecord::zeroed("1", "alice", "Alice A.", &problems)
    }

    #[test]
    fn late_submission_scales_down_and_max_wins() {
        let s = sched(&[(100, 1.0), (200, 0.5)]);
        let mut r = record(&["A"]);

        credit(&mut r, "A", 150, 80.0, &s, ZeroPolicy::Lenient);
        assert_eq!(r.problems["A"], 40.0);

        credit(&mut r, "A", 50, 80.0, &s, ZeroPolicy::Lenient);
        assert_eq!(r.problems["A"], 80.0);

        // Worse resubmission never lowers the credited score.
        credit(&mut r, "A", 150, 80.0, &s, ZeroPolicy::Lenient);
        assert_eq!(r.problems["A"], 80.0);
    }

    #[test]
    fn zero_score_policy_default_vs_strict() {
        let s = sched(&[(100, 1.0)]);

        let mut lenient = record(&["A"]);
        credit(&mut lenient, "A", 50, 0.0, &s, ZeroPolicy::Lenient);
        assert_eq!(lenient.problems["A"], 0.5);

        let mut strict = record(&["A"]);
        credit(&mut strict, "A", 50, 0.0, &s, ZeroPolicy::Strict);
        assert_eq!(strict.problems["A"], 0.0);
    }

    #[test]
    fn past_every_cutoff_credits_nothing() {
        let s = sched(&[(100, 1.0), (200, 0.5)]);
        let mut r = record(&["A"]);
        credit(&mut r, "A", 200, 80.0, &s, ZeroPolicy::Lenient);
        assert_eq!(r.problems["A"], 0.0);
    }

    fn toy_log(submissions: Vec<Submission>) -> ContestLog {
        ContestLog {
            contest_name: "hw1".to_string(),
            problems: vec!["A".to_string(), "B".to_string()],
            users: vec![
                ContestUser {
                    id: "1".to_string(),
                    login: "alice".to_string(),
                    displayed_name: "Alice A.".to_string(),
                },
                ContestUser {
                    id: "2".to_string(),
                    login: "bob".to_string(),
                    displayed_name: "Bob B.".to_string(),
                },
            ],
            submissions,
        }
    }

    fn submit(user_id: &str, problem: &str, time: i64, score: f64, verdict: &str) -> Submission {
        Submission {
            user_id: user_id.to_string(),
            problem_title: problem.to_string(),
            absolute_time: time,
            score,
            verdict: verdict.to_string(),
        }
    }

    #[test]
    fn fold_is_order_independent() {
        let subs = vec![
            submit("1", "A", 150, 80.0, "OK"),
            submit("1", "A", 50, 80.0, "OK"),
            submit("1", "B", 90, 30.0, "OK"),
            submit("2", "A", 10, 100.0, "OK"),
            submit("2", "B", 180, 0.0, "OK"),
        ];
        let book = ScheduleBook::new(sched(&[(100, 1.0), (200, 0.5)]));

        let forward =
            score_contest(&toy_log(subs.clone()), &book, ZeroPolicy::Lenient).expect("score");
        let mut reversed_subs = subs;
        reversed_subs.reverse();
        let reversed =
            score_contest(&toy_log(reversed_subs), &book, ZeroPolicy::Lenient).expect("score");

        assert_eq!(forward, reversed);
        assert_eq!(forward["alice"].problems["A"], 80.0);
        assert_eq!(forward["alice"].problems["B"], 30.0);
        assert_eq!(forward["alice"].total, 110.0);
        // bob's accepted zero-score B at scale 0.5 credits 0.25 under lenient.
        assert_eq!(forward["bob"].problems["B"], 0.25);
        assert_eq!(forward["bob"].total, 100.25);
    }

    #[test]
    fn rejected_submissions_are_ignored() {
        let subs = vec![submit("1", "A", 50, 80.0, "WA")];
        let book = ScheduleBook::new(sched(&[(100, 1.0)]));
        let out = score_contest(&toy_log(subs), &book, ZeroPolicy::Lenient).expect("score");
        assert_eq!(out["alice"].total, 0.0);
    }

    #[test]
    fn unknown_student_is_fatal() {
        let subs = vec![submit("99", "A", 50, 80.0, "OK")];
        let book = ScheduleBook::new(sched(&[(100, 1.0)]));
        let err = score_contest(&toy_log(subs), &book, ZeroPolicy::Lenient).expect_err("fail");
        assert_eq!(
            err,
            EngineError::UnknownStudent {
                user_id: "99".to_string()
            }
        );
    }

    #[test]
    fn override_schedule_replaces_global() {
        let subs = vec![
            submit("1", "A", 150, 80.0, "OK"),
            submit("2", "A", 150, 80.0, "OK"),
        ];
        let mut overrides = std::collections::HashMap::new();
        overrides.insert("alice".to_string(), sched(&[(1000, 1.0)]));
        let book = ScheduleBook::with_overrides(sched(&[(100, 1.0)]), overrides);

        let out = score_contest(&toy_log(subs), &book, ZeroPolicy::Lenient).expect("score");
        assert_eq!(out["alice"].problems["A"], 80.0);
        assert_eq!(out["bob"].problems["A"], 0.0);
    }

    #[test]
    fn problem_keys_are_equalized_across_records() {
        let subs = vec![submit("1", "C", 50, 10.0, "OK")];
        let book = ScheduleBook::new(sched(&[(100, 1.0)]));
        let out = score_contest(&toy_log(subs), &book, ZeroPolicy::Lenient).expect("score");
        // "C" is not in the dump's problem list but every record carries it.
        assert_eq!(out["alice"].problems["C"], 10.0);
        assert_eq!(out["bob"].problems["C"], 0.0);
        assert_eq!(out["bob"].problems.len(), 3);
    }
}
