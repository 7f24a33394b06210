// report, resolved, watch: read-only views over the store

use std::path::PathBuf;
use std::sync::mpsc;

use clap::Args;
use serde::Serialize;
use tuition_client::{spawn_summary, Insight, StoreError};
use tuition_config::Settings;
use tuition_recon::dashboard::RecordView;
use tuition_recon::model::{ErrorStats, ResolvedEntry, SummaryStats};
use tuition_recon::Dashboard;

use crate::exit_codes::EXIT_OPEN_ERRORS;
use crate::insight::summarizer_or_disabled;
use crate::store::{apply_selection, load_dashboard, load_rules, open_store, SelectionArgs, StoreArgs};
use crate::{print_json, CliError};

#[derive(Args, Debug, Clone, Default)]
pub struct ReportArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Case-insensitive text search over every field
    #[arg(long, value_name = "TEXT")]
    pub search: Option<String>,

    /// Only rows with an unresolved error of an enabled kind
    #[arg(long)]
    pub errors: bool,

    /// With --errors: ignore date errors
    #[arg(long, requires = "errors")]
    pub no_date: bool,

    /// With --errors: ignore value errors
    #[arg(long, requires = "errors")]
    pub no_value: bool,

    /// Rules file (TOML). Default: rules.file from settings, else built-in rules
    #[arg(long)]
    pub rules: Option<PathBuf>,

    /// Also write the rows to a file (.xlsx or .csv)
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Ask the AI provider for a summary alongside the report
    #[arg(long)]
    pub insight: bool,

    /// Exit 5 if the selected units have unresolved errors
    #[arg(long)]
    pub fail_on_errors: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct ReportJson<'a> {
    status: tuition_recon::AnalysisStatus,
    units: &'a [String],
    stats: Option<SummaryStats>,
    errors: ErrorStats,
    records: Vec<RecordView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    insight: Option<Insight>,
    #[serde(skip_serializing_if = "Option::is_none")]
    insight_error: Option<String>,
}

pub fn cmd_report(store_args: &StoreArgs, args: ReportArgs) -> Result<(), CliError> {
    let settings = Settings::load();
    let rules = load_rules(args.rules.as_ref(), &settings)?;
    let store = open_store(store_args, &settings)?;
    let mut dash = load_dashboard(store.as_ref(), rules, &args.selection)?;

    if let Some(q) = &args.search {
        dash.set_search(q.clone());
    }
    if args.errors {
        let filter = dash.filter_mut();
        filter.toggle_active();
        filter
            .set_kinds(!args.no_date, !args.no_value)
            .map_err(CliError::recon)?;
    }

    // The summary runs while the report renders; it never decides the exit code.
    let pending = if args.insight {
        let summarizer = summarizer_or_disabled();
        let records = dash.selected_records().into_iter().cloned().collect();
        Some(spawn_summary(summarizer, records))
    } else {
        None
    };

    let view = dash.view();
    let stats = dash.stats();
    let errors = dash.error_stats();

    if let Some(path) = &args.output {
        tuition_io::write_report(path, &view).map_err(CliError::read)?;
        if !args.json {
            eprintln!("Wrote {} row(s) to {}", view.len(), path.display());
        }
    }

    let (insight, insight_error) = match pending {
        Some(handle) => match handle.join() {
            Ok(Ok(insight)) => (Some(insight), None),
            Ok(Err(e)) => (None, Some(e.to_string())),
            Err(_) => (None, Some("summary worker panicked".to_string())),
        },
        None => (None, None),
    };

    if args.json {
        print_json(&ReportJson {
            status: dash.status(),
            units: dash.selected_ids(),
            stats,
            errors: errors.clone(),
            records: view,
            insight,
            insight_error,
        })?;
    } else {
        print_table(&view);
        print_summary(&dash, stats.as_ref(), &errors);
        if let Some(insight) = &insight {
            print_insight(insight);
        }
        if let Some(e) = &insight_error {
            eprintln!("warning: AI summary failed: {}", e);
        }
    }

    let open = errors.invalid_due_date_count + errors.low_value_count;
    if args.fail_on_errors && open > 0 {
        return Err(CliError {
            code: EXIT_OPEN_ERRORS,
            message: format!("{} unresolved billing error(s)", open),
            hint: Some("resolve them with `tuition resolve`".to_string()),
        });
    }
    Ok(())
}

fn error_marker(raised: bool, unresolved: bool) -> &'static str {
    match (raised, unresolved) {
        (false, _) => "",
        (true, true) => "OPEN",
        (true, false) => "ok",
    }
}

fn print_table(view: &[RecordView]) {
    println!(
        "{:<16} {:<32} {:<10} {:>12} {:>12} {:>10} {:>7}  {:<5} {:<5}",
        "UNIT", "STUDENT", "DUE", "BILLED", "MINIMUM", "DIFF", "DIFF%", "DATE", "VALUE"
    );
    for row in view {
        let r = &row.record;
        println!(
            "{:<16} {:<32} {:<10} {:>12.2} {:>12.2} {:>10.2} {:>7.1}  {:<5} {:<5}",
            r.unit_id,
            r.student_name,
            row.due_date_display,
            r.billed,
            r.minimum,
            r.diff_abs,
            r.diff_percent,
            error_marker(row.date_error, row.date_unresolved),
            error_marker(row.value_error, row.value_unresolved),
        );
    }
}

fn print_summary(dash: &Dashboard, stats: Option<&SummaryStats>, errors: &ErrorStats) {
    eprintln!();
    eprintln!("Units:            {}", dash.selected_ids().join(", "));
    let Some(stats) = stats else {
        eprintln!("No records.");
        return;
    };
    eprintln!("Students:         {}", stats.total_rows);
    eprintln!("Total billed:     {:.2}", stats.total_billed);
    eprintln!("Total minimum:    {:.2}", stats.total_min);
    eprintln!("Average diff:     {:.2} ({:.1}%)", stats.avg_diff, stats.avg_percent);
    eprintln!("Net (minimum):    {:.2}", stats.total_min);
    eprintln!("Discounts:        {:.2}", stats.total_discount);
    eprintln!("Discount distribution:");
    for bin in &stats.distribution {
        eprintln!("  {:>8}  {:>5}", bin.range, bin.count);
    }
    eprintln!("Duplicate names:  {}", stats.duplicate_count);
    for dup in &stats.duplicates {
        eprintln!("  {} (x{})", dup.name, dup.count);
    }
    eprintln!("Open date errors: {}", errors.invalid_due_date_count);
    eprintln!("Open value errors:{}", errors.low_value_count);
    eprintln!("Students resolved:{}", errors.resolved_count);
}

pub(crate) fn print_insight(insight: &Insight) {
    eprintln!();
    eprintln!("AI summary");
    eprintln!("──────────────────────────────");
    eprintln!("{}", insight.summary);
    if !insight.anomalies.is_empty() {
        eprintln!("Anomalies:");
        for a in &insight.anomalies {
            eprintln!("  - {}", a);
        }
    }
    if !insight.recommendations.is_empty() {
        eprintln!("Recommendations:");
        for r in &insight.recommendations {
            eprintln!("  - {}", r);
        }
    }
    if !insight.financial_trend.is_empty() {
        eprintln!("Trend: {}", insight.financial_trend);
    }
}

// ============================================================================
// resolved
// ============================================================================

pub fn cmd_resolved(store_args: &StoreArgs, selection: SelectionArgs, json: bool) -> Result<(), CliError> {
    let settings = Settings::load();
    let store = open_store(store_args, &settings)?;
    let dash = load_dashboard(store.as_ref(), Default::default(), &selection)?;
    let entries: Vec<ResolvedEntry> = dash.resolved();

    if json {
        return print_json(&entries);
    }
    if entries.is_empty() {
        eprintln!("No resolutions in the selected units.");
        return Ok(());
    }
    println!("{:<25} {:<16} {:<32} {:<5}  {}", "RESOLVED AT", "UNIT", "STUDENT", "KIND", "NOTE");
    for e in &entries {
        println!(
            "{:<25} {:<16} {:<32} {:<5}  {}",
            e.resolved_at.to_rfc3339(),
            e.unit_id,
            e.name,
            e.kind,
            e.note
        );
    }
    Ok(())
}

// ============================================================================
// watch
// ============================================================================

enum WatchEvent {
    Rendered,
    Failed(StoreError),
}

fn watch_line(dash: &Dashboard) -> String {
    let errors = dash.error_stats();
    match dash.stats() {
        Some(stats) => format!(
            "[{}] {} student(s), billed {:.2}, minimum {:.2}, {} open date / {} open value error(s)",
            dash.selected_ids().join(","),
            stats.total_rows,
            stats.total_billed,
            stats.total_min,
            errors.invalid_due_date_count,
            errors.low_value_count
        ),
        None => format!("[{}] no records", dash.selected_ids().join(",")),
    }
}

pub fn cmd_watch(
    store_args: &StoreArgs,
    selection: SelectionArgs,
    rules: Option<PathBuf>,
    limit: Option<usize>,
) -> Result<(), CliError> {
    let settings = Settings::load();
    let rules = load_rules(rules.as_ref(), &settings)?;
    let store = open_store(store_args, &settings)?;

    let (tx, rx) = mpsc::channel();
    let err_tx = tx.clone();
    let mut dash = Dashboard::new(rules);
    let mut selection_applied = false;

    let subscription = store
        .subscribe(
            Box::new(move |units| {
                dash.apply_snapshot(units);
                if !selection_applied {
                    match apply_selection(&mut dash, &selection) {
                        Ok(()) => selection_applied = true,
                        // The unit may appear in a later snapshot
                        Err(e) => log::warn!("{}", e.message),
                    }
                }
                println!("{}", watch_line(&dash));
                let _ = tx.send(WatchEvent::Rendered);
            }),
            Box::new(move |e| {
                let _ = err_tx.send(WatchEvent::Failed(e));
            }),
        )
        .map_err(CliError::store)?;

    eprintln!("Watching {} store (Ctrl-C to stop)", store.backend_name());

    let mut seen = 0usize;
    while let Ok(event) = rx.recv() {
        match event {
            WatchEvent::Rendered => {
                seen += 1;
                if limit.is_some_and(|n| seen >= n) {
                    break;
                }
            }
            WatchEvent::Failed(e) => return Err(CliError::store(e)),
        }
    }
    drop(subscription);
    Ok(())
}
