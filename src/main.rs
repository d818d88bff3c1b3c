use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use standings::contest::load_contest_log;
use standings::deadlines::{
    offset_from_hours, parse_deadlines_file, parse_extensions_file, ScheduleBook,
    DEFAULT_UTC_OFFSET_HOURS,
};
use standings::ledger::{
    assignment_column, seed_identity, stamp_run, sync_assignment, updates_from_records,
};
use standings::records::{
    read_records, sorted_for_ledger, to_entries, write_records, RecordOptions,
    DEFAULT_OUTPUT_DIR,
};
use standings::roster::{parse_roster_file, reconcile};
use standings::scoring::{score_contest, ZeroPolicy};
use standings::store::JsonSheet;

#[derive(Parser)]
#[command(name = "standings", about = "Contest scoring and roster-sheet sync")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Score a contest dump against deadlines and write a record file.
    Score {
        /// Normalized contest dump (JSON).
        #[arg(short, long)]
        input: PathBuf,
        /// Deadlines file: `<timestamp>=<scale>` lines.
        #[arg(short, long)]
        deadlines: PathBuf,
        /// Roster file; when given, non-roster logins are dropped and
        /// absentees are backfilled at zero.
        #[arg(long)]
        roster: Option<PathBuf>,
        /// Per-login deadline override file (`==`-separated blocks).
        #[arg(long)]
        extensions: Option<PathBuf>,
        /// Strict zero policy: accepted zero-score submissions credit 0
        /// instead of the lenient half point. Used for exams.
        #[arg(long)]
        strict: bool,
        /// Folder for the record file, created if missing.
        #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
        output_dir: PathBuf,
        /// Keep per-problem breakdowns on all-zero records.
        #[arg(long)]
        zero_breakdown: bool,
        /// Fixed UTC offset, in hours, for naive deadline timestamps.
        #[arg(long, default_value_t = DEFAULT_UTC_OFFSET_HOURS)]
        utc_offset: i32,
    },
    /// Merge a record file into one assignment column of the ledger.
    Sync {
        /// Record file produced by `score`.
        #[arg(short, long)]
        input: PathBuf,
        /// Ledger snapshot file.
        #[arg(short, long)]
        ledger: PathBuf,
        /// Assignment number (1-based) selecting the target column.
        #[arg(short, long)]
        number: usize,
        /// Never create rows; logins without one are skipped.
        #[arg(long)]
        append_only: bool,
        /// Seed identity rows first (for a ledger built from scratch).
        #[arg(long)]
        create: bool,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Score {
            input,
            deadlines,
            roster,
            extensions,
            strict,
            output_dir,
            zero_breakdown,
            utc_offset,
        } => {
            let offset = offset_from_hours(utc_offset)
                .with_context(|| format!("invalid UTC offset: {}", utc_offset))?;

            let log = load_contest_log(&input)?;
            let schedule = parse_deadlines_file(&deadlines, offset)?;
            let overrides = match &extensions {
                Some(path) => parse_extensions_file(path, offset)?,
                None => HashMap::new(),
            };
            let book = ScheduleBook::with_overrides(schedule, overrides);

            let policy = if strict {
                ZeroPolicy::Strict
            } else {
                ZeroPolicy::Lenient
            };
            let records = score_contest(&log, &book, policy)?;

            let roster_map = match &roster {
                Some(path) => Some(parse_roster_file(path)?),
                None => None,
            };
            let reconciled = reconcile(records, roster_map.as_ref());

            let opts = RecordOptions {
                output_dir,
                include_zero_breakdown: zero_breakdown,
            };
            let entries = to_entries(&reconciled, opts.include_zero_breakdown);
            let path = write_records(&log.contest_name, &entries, &opts)?;
            println!("{}", path.display());
        }
        Command::Sync {
            input,
            ledger,
            number,
            append_only,
            create,
        } => {
            let entries = read_records(&input)?;
            let headers = vec![
                "login".to_string(),
                "name".to_string(),
                "group".to_string(),
            ];
            let mut sheet = JsonSheet::open(&ledger, &headers)?;

            if create {
                let ordered = sorted_for_ledger(&entries);
                seed_identity(&mut sheet, &ordered)?;
            }

            let updates = updates_from_records(&entries);
            let outcome = sync_assignment(
                &mut sheet,
                &updates,
                assignment_column(number),
                append_only,
            )?;

            let offset = standings::deadlines::default_offset();
            stamp_run(&mut sheet, chrono::Utc::now().with_timezone(&offset))?;
            sheet.save()?;

            println!(
                "merged {} appended {} skipped {}",
                outcome.merged,
                outcome.appended,
                outcome.skipped.len()
            );
        }
    }
    Ok(())
}
