use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

/// Normalized contest dump. Extraction from the judge's markup happens
/// upstream; this engine only consumes the flattened shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContestLog {
    pub contest_name: String,
    #[serde(default)]
    pub problems: Vec<String>,
    #[serde(default)]
    pub users: Vec<ContestUser>,
    #[serde(default)]
    pub submissions: Vec<Submission>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContestUser {
    pub id: String,
    pub login: String,
    pub displayed_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub user_id: String,
    pub problem_title: String,
    /// Milliseconds since epoch.
    pub absolute_time: i64,
    pub score: f64,
    pub verdict: String,
}

impl Submission {
    pub fn is_accepted(&self) -> bool {
        self.verdict == "OK"
    }
}

impl ContestLog {
    /// user id -> user, for resolving submission authors.
    pub fn user_table(&self) -> HashMap<&str, &ContestUser> {
        self.users.iter().map(|u| (u.id.as_str(), u)).collect()
    }
}

pub fn load_contest_log(path: &Path) -> anyhow::Result<ContestLog> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading contest dump {}", path.display()))?;
    let log: ContestLog = serde_json::from_str(&text)
        .with_context(|| format!("parsing contest dump {}", path.display()))?;
    log::info!(
        "contest {:?}: {} problem(s), {} user(s), {} submission(s)",
        log.contest_name,
        log.problems.len(),
        log.users.len(),
        log.submissions.len()
    );
    Ok(log)
}
