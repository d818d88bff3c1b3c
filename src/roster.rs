use std::collections::BTreeMap;
use std::path::Path;

use crate::error::EngineError;
use crate::scoring::StudentRecord;

/// Authoritative identity and metadata for one student, keyed by login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub login: String,
    pub name: String,
    pub group: String,
}

/// One roster line: `<login> <display name tokens...> <group>`. The login is
/// the first token, the group the last, everything between is the name.
pub fn parse_roster_line(line: &str) -> Result<RosterEntry, EngineError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 2 {
        return Err(EngineError::MalformedRoster {
            line: line.to_string(),
        });
    }
    let login = tokens[0].to_string();
    let group = tokens[tokens.len() - 1].to_string();
    let name = tokens[1..tokens.len() - 1].join(" ");
    Ok(RosterEntry { login, name, group })
}

pub fn parse_roster_file(path: &Path) -> anyhow::Result<BTreeMap<String, RosterEntry>> {
    let text = std::fs::read_to_string(path)?;
    let mut roster = BTreeMap::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let entry = parse_roster_line(line)?;
        roster.insert(entry.login.clone(), entry);
    }
    log::debug!("loaded {} roster entr(ies) from {}", roster.len(), path.display());
    Ok(roster)
}

/// Cross-reference computed records against the roster. Logins outside the
/// roster are dropped (staff test accounts and the like); roster logins with
/// no submissions are backfilled at zero; roster metadata overrides whatever
/// the dump reported. Without a roster this is an identity pass.
pub fn reconcile(
    records: BTreeMap<String, StudentRecord>,
    roster: Option<&BTreeMap<String, RosterEntry>>,
) -> BTreeMap<String, StudentRecord> {
    let Some(roster) = roster else {
        return records;
    };

    let problem_keys: Vec<String> = records
        .values()
        .next()
        .map(|r| r.problems.keys().cloned().collect())
        .unwrap_or_default();

    let mut out: BTreeMap<String, StudentRecord> = BTreeMap::new();
    let mut dropped = 0_usize;
    let mut backfilled = 0_usize;

    for (login, mut record) in records {
        match roster.get(&login) {
            Some(entry) => {
                record.name = entry.name.clone();
                record.group = Some(entry.group.clone());
                out.insert(login, record);
            }
            None => {
                log::debug!("dropping non-roster login {:?}", login);
                dropped += 1;
            }
        }
    }

    for (login, entry) in roster {
        if out.contains_key(login) {
            continue;
        }
        let mut record = StudentRecord::zeroed(login, login, &entry.name, &problem_keys);
        record.group = Some(entry.group.clone());
        out.insert(login.clone(), record);
        backfilled += 1;
    }

    log::info!(
        "roster reconcile: {} kept, {} dropped, {} backfilled",
        out.len() - backfilled,
        dropped,
        backfilled
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn computed(login: &str, name: &str, total_on_a: f64) -> StudentRecord {
        let mut r = StudentRecord::zeroed("id", login, name, &["A".to_string()]);
        r.problems.insert("A".to_string(), total_on_a);
        r.recompute_total();
        r
    }

    #[test]
    fn roster_line_splits_login_name_group() {
        let e = parse_roster_line("alice Alice Ann Smith 101").expect("parse");
        assert_eq!(e.login, "alice");
        assert_eq!(e.name, "Alice Ann Smith");
        assert_eq!(e.group, "101");
    }

    #[test]
    fn two_token_line_has_empty_name() {
        let e = parse_roster_line("alice 101").expect("parse");
        assert_eq!(e.login, "alice");
        assert_eq!(e.name, "");
        assert_eq!(e.group, "101");
    }

    #[test]
    fn short_line_is_malformed() {
        let err = parse_roster_line("alice").expect_err("fail");
        assert!(matches!(err, EngineError::MalformedRoster { .. }));
    }

    #[test]
    fn reconcile_filters_backfills_and_overrides_metadata() {
        let mut records = BTreeMap::new();
        records.insert("alice".to_string(), computed("alice", "alice (dump)", 80.0));
        records.insert("mallory".to_string(), computed("mallory", "Mallory", 99.0));

        let mut roster = BTreeMap::new();
        roster.insert(
            "alice".to_string(),
            RosterEntry {
                login: "alice".to_string(),
                name: "Alice Smith".to_string(),
                group: "A".to_string(),
            },
        );
        roster.insert(
            "bob".to_string(),
            RosterEntry {
                login: "bob".to_string(),
                name: "Bob Jones".to_string(),
                group: "B".to_string(),
            },
        );

        let out = reconcile(records, Some(&roster));

        // Output login set is exactly the roster's key set.
        let logins: Vec<&str> = out.keys().map(|s| s.as_str()).collect();
        assert_eq!(logins, vec!["alice", "bob"]);

        let alice = &out["alice"];
        assert_eq!(alice.name, "Alice Smith");
        assert_eq!(alice.group.as_deref(), Some("A"));
        assert_eq!(alice.total, 80.0);

        let bob = &out["bob"];
        assert_eq!(bob.total, 0.0);
        assert_eq!(bob.problems["A"], 0.0);
        assert_eq!(bob.group.as_deref(), Some("B"));
    }

    #[test]
    fn no_roster_is_identity() {
        let mut records = BTreeMap::new();
        records.insert("alice".to_string(), computed("alice", "Alice", 80.0));
        let out = reconcile(records.clone(), None);
        assert_eq!(out, records);
    }

    #[test]
    fn empty_submissions_backfill_whole_roster() {
        let mut roster = BTreeMap::new();
        roster.insert(
            "alice".to_string(),
            RosterEntry {
                login: "alice".to_string(),
                name: "alice".to_string(),
                group: "A".to_string(),
            },
        );
        let out = reconcile(BTreeMap::new(), Some(&roster));
        assert_eq!(out.len(), 1);
        assert_eq!(out["alice"].total, 0.0);
        assert_eq!(out["alice"].group.as_deref(), Some("A"));
    }
}
