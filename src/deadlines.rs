use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};

use crate::error::EngineError;

/// Naive deadline timestamps are interpreted in this fixed offset unless the
/// caller configures another one. The source contests ran on UTC+3 wall time.
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = 3;

pub fn offset_from_hours(hours: i32) -> Option<FixedOffset> {
    FixedOffset::east_opt(hours * 3600)
}

pub fn default_offset() -> FixedOffset {
    use chrono::Offset;
    offset_from_hours(DEFAULT_UTC_OFFSET_HOURS).unwrap_or_else(|| chrono::Utc.fix())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deadline {
    /// Cutoff instant, milliseconds since epoch.
    pub until_ms: i64,
    /// Credit multiplier granted to submissions strictly before `until_ms`.
    pub scale: f64,
}

/// An unordered set of deadlines. Evaluation considers all of them: an early
/// full-credit cutoff and a later reduced-credit cutoff may both still be in
/// the future, and the best scale wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schedule {
    deadlines: Vec<Deadline>,
}

impl Schedule {
    pub fn new(deadlines: Vec<Deadline>) -> Self {
        Self { deadlines }
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }

    pub fn deadlines(&self) -> &[Deadline] {
        &self.deadlines
    }

    /// Maximum scale over deadlines whose cutoff is strictly after `time_ms`.
    /// A submission made at the cutoff instant does not qualify for it.
    /// Returns 0 when every cutoff has passed.
    pub fn scale_at(&self, time_ms: i64) -> f64 {
        let mut max_scale = 0.0_f64;
        for d in &self.deadlines {
            if time_ms < d.until_ms {
                max_scale = max_scale.max(d.scale);
            }
        }
        max_scale
    }
}

/// Global schedule plus per-login overrides. An override fully replaces the
/// global schedule for that login; there is no merging.
#[derive(Debug, Clone, Default)]
pub struct ScheduleBook {
    global: Schedule,
    overrides: HashMap<String, Schedule>,
}

impl ScheduleBook {
    pub fn new(global: Schedule) -> Self {
        Self {
            global,
            overrides: HashMap::new(),
        }
    }

    pub fn with_overrides(global: Schedule, overrides: HashMap<String, Schedule>) -> Self {
        Self { global, overrides }
    }

    pub fn resolve(&self, login: &str) -> &Schedule {
        self.overrides.get(login).unwrap_or(&self.global)
    }

    pub fn has_override(&self, login: &str) -> bool {
        self.overrides.contains_key(login)
    }
}

/// One line of a deadlines file: `<timestamp>=<scale>`.
pub fn parse_deadline_line(line: &str, offset: FixedOffset) -> Result<Deadline, EngineError> {
    let malformed = |reason: &str| EngineError::MalformedDeadline {
        line: line.to_string(),
        reason: reason.to_string(),
    };

    let (time_token, scale_token) = line
        .split_once('=')
        .ok_or_else(|| malformed("missing '='"))?;

    let until_ms =
        parse_time_token(time_token, offset).ok_or_else(|| malformed("unparseable timestamp"))?;

    let scale = scale_token
        .trim()
        .parse::<f64>()
        .map_err(|_| malformed("unparseable scale"))?;
    if !(0.0..=1.0).contains(&scale) {
        return Err(malformed("scale outside [0, 1]"));
    }

    Ok(Deadline { until_ms, scale })
}

/// Accepts raw epoch milliseconds, RFC 3339, or `YYYY-MM-DD[ HH:MM[:SS]]`.
/// Tokens without an explicit zone resolve in `offset`.
fn parse_time_token(token: &str, offset: FixedOffset) -> Option<i64> {
    let t = token.trim();
    if t.is_empty() {
        return None;
    }
    if t.chars().all(|c| c.is_ascii_digit()) {
        return t.parse::<i64>().ok();
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(t) {
        return Some(dt.timestamp_millis());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(t, fmt) {
            return local_millis(naive, offset);
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(t, "%Y-%m-%d") {
        let naive = d.and_hms_opt(0, 0, 0)?;
        return local_millis(naive, offset);
    }
    None
}

fn local_millis(naive: NaiveDateTime, offset: FixedOffset) -> Option<i64> {
    use chrono::TimeZone;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.timestamp_millis())
}

pub fn parse_schedule_lines<'a, I>(lines: I, offset: FixedOffset) -> Result<Schedule, EngineError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut deadlines = Vec::new();
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        deadlines.push(parse_deadline_line(line, offset)?);
    }
    Ok(Schedule::new(deadlines))
}

pub fn parse_deadlines_file(path: &Path, offset: FixedOffset) -> anyhow::Result<Schedule> {
    let text = std::fs::read_to_string(path)?;
    let schedule = parse_schedule_lines(text.lines(), offset)?;
    log::debug!(
        "loaded {} deadline(s) from {}",
        schedule.deadlines().len(),
        path.display()
    );
    Ok(schedule)
}

/// Extension file: blocks separated by a `==` line. The first non-empty line
/// of a block is a login; the remaining lines are that login's full override
/// schedule.
pub fn parse_extensions_text(
    text: &str,
    offset: FixedOffset,
) -> Result<HashMap<String, Schedule>, EngineError> {
    let mut overrides: HashMap<String, Schedule> = HashMap::new();
    let mut login: Option<String> = None;
    let mut deadlines: Vec<Deadline> = Vec::new();

    let mut flush = |login: &mut Option<String>, deadlines: &mut Vec<Deadline>| {
        if let Some(l) = login.take() {
            overrides.insert(l, Schedule::new(std::mem::take(deadlines)));
        } else {
            deadlines.clear();
        }
    };

    for raw in text.lines() {
        let t = raw.trim();
        if t == "==" {
            flush(&mut login, &mut deadlines);
            continue;
        }
        if t.is_empty() {
            continue;
        }
        if login.is_none() {
            login = Some(t.to_string());
        } else {
            deadlines.push(parse_deadline_line(t, offset)?);
        }
    }
    flush(&mut login, &mut deadlines);
    Ok(overrides)
}

pub fn parse_extensions_file(
    path: &Path,
    offset: FixedOffset,
) -> anyhow::Result<HashMap<String, Schedule>> {
    let text = std::fs::read_to_string(path)?;
    let overrides = parse_extensions_text(&text, offset)?;
    log::debug!(
        "loaded deadline override(s) for {} login(s) from {}",
        overrides.len(),
        path.display()
    );
    Ok(overrides)
}
