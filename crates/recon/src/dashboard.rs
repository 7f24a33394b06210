//! Headless dashboard controller.
//!
//! Holds the latest store snapshot plus view state (unit selection, search,
//! error filter) and derives the report from them. Every snapshot replaces
//! the units wholesale; view state survives snapshots.

use serde::Serialize;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::aggregate::summarize;
use crate::config::RuleConfig;
use crate::filter::{matches_search, ErrorFilter};
use crate::model::{BillingRecord, ErrorStats, ResolvedEntry, SummaryStats, Unit};
use crate::normalize::format_due_date;
use crate::reconcile::{self, evaluate, RecordStatus};
use crate::ReconError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    /// No snapshot received yet.
    Connecting,
    /// At least one unit is stored.
    Ready,
    /// Connected, but the store holds no units.
    NoData,
    /// The subscription reported an error.
    Error,
}

/// One row of the filtered report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordView {
    #[serde(flatten)]
    pub record: BillingRecord,
    /// Due date rendered `dd/mm/yyyy`, or the raw text when unparsable.
    pub due_date_display: String,
    pub date_error: bool,
    pub value_error: bool,
    pub date_unresolved: bool,
    pub value_unresolved: bool,
    pub fully_resolved: bool,
}

impl RecordView {
    fn new(record: &BillingRecord, status: RecordStatus) -> Self {
        Self {
            due_date_display: format_due_date(&record.due_date),
            record: record.clone(),
            date_error: status.date_error,
            value_error: status.value_error,
            date_unresolved: status.date_unresolved,
            value_unresolved: status.value_unresolved,
            fully_resolved: status.is_fully_resolved(),
        }
    }

    pub fn status(&self) -> RecordStatus {
        RecordStatus {
            date_error: self.date_error,
            value_error: self.value_error,
            date_unresolved: self.date_unresolved,
            value_unresolved: self.value_unresolved,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Dashboard {
    rules: RuleConfig,
    status: AnalysisStatus,
    units: Vec<Unit>,
    selected: Vec<String>,
    search: String,
    filter: ErrorFilter,
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new(RuleConfig::default())
    }
}

impl Dashboard {
    pub fn new(rules: RuleConfig) -> Self {
        Self {
            rules,
            status: AnalysisStatus::Connecting,
            units: Vec::new(),
            selected: Vec::new(),
            search: String::new(),
            filter: ErrorFilter::default(),
        }
    }

    pub fn status(&self) -> AnalysisStatus {
        self.status
    }

    pub fn rules(&self) -> &RuleConfig {
        &self.rules
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn unit(&self, id: &str) -> Option<&Unit> {
        self.units.iter().find(|u| u.id == id)
    }

    pub fn selected_ids(&self) -> &[String] {
        &self.selected
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn filter(&self) -> &ErrorFilter {
        &self.filter
    }

    pub fn filter_mut(&mut self) -> &mut ErrorFilter {
        &mut self.filter
    }

    // ---------------------------------------------------------------------
    // Snapshot handling
    // ---------------------------------------------------------------------

    /// Replace the units with a fresh snapshot. If nothing is selected the
    /// first unit becomes the selection.
    pub fn apply_snapshot(&mut self, units: Vec<Unit>) {
        if self.selected.is_empty() {
            if let Some(first) = units.first() {
                self.selected.push(first.id.clone());
            }
        }
        self.status = if units.is_empty() {
            AnalysisStatus::NoData
        } else {
            AnalysisStatus::Ready
        };
        log::debug!(
            "Snapshot applied: {} units, {} selected",
            units.len(),
            self.selected.len()
        );
        self.units = units;
    }

    pub fn connection_failed(&mut self) {
        self.status = AnalysisStatus::Error;
    }

    // ---------------------------------------------------------------------
    // Selection
    // ---------------------------------------------------------------------

    pub fn toggle_unit(&mut self, id: &str) {
        if let Some(pos) = self.selected.iter().position(|s| s == id) {
            self.selected.remove(pos);
        } else {
            self.selected.push(id.to_string());
        }
    }

    /// Select every unit, or clear the selection if all are already selected.
    pub fn select_all(&mut self) {
        if self.selected.len() == self.units.len() {
            self.selected.clear();
        } else {
            self.selected = self.units.iter().map(|u| u.id.clone()).collect();
        }
    }

    /// Replace the selection. Ids must exist in the current snapshot.
    pub fn select<I, S>(&mut self, ids: I) -> Result<(), ReconError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        if let Some(missing) = ids.iter().find(|id| self.unit(id).is_none()) {
            return Err(ReconError::UnknownUnit(missing.clone()));
        }
        self.selected = ids;
        Ok(())
    }

    pub fn set_search(&mut self, query: impl Into<String>) {
        self.search = query.into();
    }

    // ---------------------------------------------------------------------
    // Derived views
    // ---------------------------------------------------------------------

    fn selected_units(&self) -> impl Iterator<Item = &Unit> {
        self.units.iter().filter(|u| self.selected.contains(&u.id))
    }

    /// Records of the selected units, sorted by student name.
    pub fn selected_records(&self) -> Vec<&BillingRecord> {
        let mut records: Vec<&BillingRecord> =
            self.selected_units().flat_map(|u| u.records.iter()).collect();
        records.sort_by_cached_key(|r| name_sort_key(&r.student_name));
        records
    }

    /// Selected records after search and error filter.
    pub fn view(&self) -> Vec<RecordView> {
        self.selected_records()
            .into_iter()
            .filter(|r| matches_search(r, &self.search))
            .filter_map(|r| {
                let ledger = self.unit(&r.unit_id).and_then(|u| u.ledger(&r.student_id));
                let status = evaluate(r, ledger, &self.rules);
                self.filter.passes(&status).then(|| RecordView::new(r, status))
            })
            .collect()
    }

    /// Summary over the selected records, ignoring search and filter.
    pub fn stats(&self) -> Option<SummaryStats> {
        summarize(self.selected_records())
    }

    pub fn error_stats(&self) -> ErrorStats {
        reconcile::error_stats(self.selected_records(), &self.units, &self.rules)
    }

    /// Resolutions of the selected units, newest first.
    pub fn resolved(&self) -> Vec<ResolvedEntry> {
        let units: Vec<Unit> = self.selected_units().cloned().collect();
        reconcile::resolved_entries(&units)
    }
}

/// Collation key for student names: accents folded, then case. "Álvaro"
/// sorts next to "Alvaro", before "Bruno". The exact lowercase name breaks ties.
fn name_sort_key(name: &str) -> (String, String) {
    let folded: String = name.nfd().filter(|c| !is_combining_mark(*c)).collect();
    (folded.to_lowercase(), name.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CellValue, ErrorKind};
    use crate::reconcile::resolve;
    use crate::transform::{prepare_upload, CONTRACT_WIDTH};
    use chrono::{TimeZone, Utc};

    fn raw_row(name: &str, due: &str, billed: f64, min: f64) -> Vec<CellValue> {
        let mut r = vec![CellValue::Empty; CONTRACT_WIDTH];
        r[2] = CellValue::text(name);
        r[11] = CellValue::text(due);
        r[14] = billed.into();
        r[16] = min.into();
        r
    }

    fn unit(name: &str, rows: Vec<Vec<CellValue>>) -> Unit {
        let mut grid = vec![vec![CellValue::text("h"); CONTRACT_WIDTH]];
        grid.extend(rows);
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let mut u = Unit::default();
        prepare_upload(None, name, &grid, now).apply_to(&mut u);
        u
    }

    fn sample() -> Vec<Unit> {
        vec![
            unit(
                "Centro",
                vec![
                    raw_row("bruno Costa", "05/03/2024", 2000.0, 1500.0),
                    raw_row("Ana Silva", "07/03/2024", 2000.0, 1500.0),
                ],
            ),
            unit("Norte", vec![raw_row("Caio Lima", "10/03/2024", 800.0, 700.0)]),
        ]
    }

    fn names(d: &Dashboard) -> Vec<String> {
        d.view().into_iter().map(|v| v.record.student_name).collect()
    }

    #[test]
    fn status_transitions() {
        let mut d = Dashboard::default();
        assert_eq!(d.status(), AnalysisStatus::Connecting);
        d.apply_snapshot(Vec::new());
        assert_eq!(d.status(), AnalysisStatus::NoData);
        assert!(d.selected_ids().is_empty());
        d.apply_snapshot(sample());
        assert_eq!(d.status(), AnalysisStatus::Ready);
        d.connection_failed();
        assert_eq!(d.status(), AnalysisStatus::Error);
    }

    #[test]
    fn accented_names_sort_with_their_base_letter() {
        let mut d = Dashboard::default();
        d.apply_snapshot(vec![unit(
            "Sul",
            vec![
                raw_row("Zeca", "05/03/2024", 2000.0, 1500.0),
                raw_row("Érica Souza", "05/03/2024", 2000.0, 1500.0),
                raw_row("Bruno", "05/03/2024", 2000.0, 1500.0),
                raw_row("Álvaro", "05/03/2024", 2000.0, 1500.0),
                raw_row("alvaro", "05/03/2024", 2000.0, 1500.0),
            ],
        )]);
        assert_eq!(names(&d), vec!["alvaro", "Álvaro", "Bruno", "Érica Souza", "Zeca"]);
    }

    #[test]
    fn first_snapshot_selects_first_unit_and_later_keep_selection() {
        let mut d = Dashboard::default();
        d.apply_snapshot(sample());
        assert_eq!(d.selected_ids(), ["centro"]);

        d.toggle_unit("norte");
        d.toggle_unit("centro");
        d.apply_snapshot(sample());
        assert_eq!(d.selected_ids(), ["norte"]);
    }

    #[test]
    fn view_sorted_case_insensitively() {
        let mut d = Dashboard::default();
        d.apply_snapshot(sample());
        assert_eq!(names(&d), vec!["Ana Silva", "bruno Costa"]);

        d.select_all();
        assert_eq!(names(&d), vec!["Ana Silva", "bruno Costa", "Caio Lima"]);
        d.select_all();
        assert!(d.view().is_empty());
        assert!(d.stats().is_none());
    }

    #[test]
    fn search_and_error_filter() {
        let mut d = Dashboard::default();
        d.apply_snapshot(sample());
        d.select(["centro", "norte"]).unwrap();

        d.set_search("SILVA");
        assert_eq!(names(&d), vec!["Ana Silva"]);
        d.set_search("");

        d.filter_mut().toggle_active();
        assert_eq!(names(&d), vec!["Ana Silva", "Caio Lima"]);

        d.filter_mut().toggle(ErrorKind::Value).unwrap();
        assert_eq!(names(&d), vec!["Ana Silva"]);
        assert!(d.filter_mut().toggle(ErrorKind::Date).is_err());
        assert_eq!(names(&d), vec!["Ana Silva"]);
    }

    #[test]
    fn stats_ignore_search() {
        let mut d = Dashboard::default();
        d.apply_snapshot(sample());
        d.set_search("nobody");
        assert!(d.view().is_empty());
        let stats = d.stats().unwrap();
        assert_eq!(stats.total_rows, 2);
        assert_eq!(stats.total_billed, 4000.0);
    }

    #[test]
    fn resolution_reflected_after_snapshot() {
        let mut units = sample();
        let mut d = Dashboard::default();
        d.apply_snapshot(units.clone());
        assert_eq!(d.error_stats().invalid_due_date_count, 1);

        let at = Utc.with_ymd_and_hms(2024, 3, 8, 10, 0, 0).unwrap();
        resolve(&units[0], "Ana Silva", "ok", ErrorKind::Date, at)
            .unwrap()
            .apply(&mut units[0]);
        d.apply_snapshot(units);

        let stats = d.error_stats();
        assert_eq!(stats.invalid_due_date_count, 0);
        assert_eq!(stats.resolved_count, 1);
        assert_eq!(d.resolved().len(), 1);

        let ana = d.view().into_iter().find(|v| v.record.student_name == "Ana Silva").unwrap();
        assert!(ana.fully_resolved);
        assert_eq!(ana.due_date_display, "07/03/2024");
    }

    #[test]
    fn select_unknown_unit() {
        let mut d = Dashboard::default();
        d.apply_snapshot(sample());
        assert_eq!(d.select(["sul"]), Err(ReconError::UnknownUnit("sul".into())));
        assert_eq!(d.selected_ids(), ["centro"]);
    }
}
