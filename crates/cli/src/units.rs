// upload, units, resolve: commands that write to the store

use std::path::PathBuf;

use chrono::Utc;
use serde::Serialize;
use tuition_config::Settings;
use tuition_recon::identity::unit_id_for;
use tuition_recon::reconcile::resolve;
use tuition_recon::{prepare_upload, ErrorKind, ReconError};

use crate::store::{open_store, StoreArgs};
use crate::{print_json, CliError};

#[derive(Serialize)]
struct UploadSummary {
    unit_id: String,
    name: String,
    rows_read: usize,
    records: usize,
    discarded: usize,
    new_students: Vec<String>,
}

pub fn cmd_upload(args: &StoreArgs, file: PathBuf, unit: String, json: bool) -> Result<(), CliError> {
    let name = unit.trim().to_string();
    let unit_id = unit_id_for(&name);
    if unit_id.is_empty() {
        return Err(CliError::usage(format!("invalid unit name: '{}'", unit)));
    }

    let settings = Settings::load();
    let store = open_store(args, &settings)?;

    let grid = tuition_io::read_grid(&file).map_err(CliError::read)?;
    let existing = store
        .load_units()
        .map_err(CliError::store)?
        .into_iter()
        .find(|u| u.id == unit_id);

    let dataset = prepare_upload(existing.as_ref(), &name, &grid, Utc::now());
    let new_students = match &existing {
        Some(u) => dataset.students.added_since(&u.students),
        None => dataset.students.iter().map(|(id, n)| (id.clone(), n.to_string())).collect(),
    };

    store.write_unit_dataset(&dataset).map_err(CliError::store)?;

    let rows_read = grid.len().saturating_sub(1);
    let summary = UploadSummary {
        unit_id: dataset.unit_id.clone(),
        name: dataset.name.clone(),
        rows_read,
        records: dataset.records.len(),
        discarded: rows_read.saturating_sub(dataset.records.len()),
        new_students: new_students.into_iter().map(|(_, n)| n).collect(),
    };

    if json {
        print_json(&summary)
    } else {
        eprintln!(
            "Uploaded {} record(s) to '{}' ({})",
            summary.records, summary.name, summary.unit_id
        );
        if summary.discarded > 0 {
            eprintln!("  {} row(s) skipped (no student name or billed amount)", summary.discarded);
        }
        if !summary.new_students.is_empty() {
            eprintln!("  {} new student(s)", summary.new_students.len());
        }
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UnitRow {
    id: String,
    name: String,
    last_updated: Option<String>,
    records: usize,
    students: usize,
    resolutions: usize,
}

pub fn cmd_list(args: &StoreArgs, json: bool) -> Result<(), CliError> {
    let settings = Settings::load();
    let store = open_store(args, &settings)?;
    let units = store.load_units().map_err(CliError::store)?;

    let rows: Vec<UnitRow> = units
        .iter()
        .map(|u| UnitRow {
            id: u.id.clone(),
            name: u.name.clone(),
            last_updated: u.last_updated.map(|t| t.to_rfc3339()),
            records: u.records.len(),
            students: u.students.len(),
            resolutions: u
                .resolutions
                .values()
                .map(|l| ErrorKind::ALL.iter().filter(|k| l.is_resolved(**k)).count())
                .sum(),
        })
        .collect();

    if json {
        return print_json(&rows);
    }

    if rows.is_empty() {
        eprintln!("No units in {} store", store.backend_name());
        return Ok(());
    }
    println!("{:<24} {:<28} {:>8} {:>8} {:>11}  {}", "ID", "NAME", "RECORDS", "STUDENTS", "RESOLUTIONS", "UPDATED");
    for r in &rows {
        println!(
            "{:<24} {:<28} {:>8} {:>8} {:>11}  {}",
            r.id,
            r.name,
            r.records,
            r.students,
            r.resolutions,
            r.last_updated.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

pub fn cmd_delete(args: &StoreArgs, unit_id: String, json: bool) -> Result<(), CliError> {
    let settings = Settings::load();
    let store = open_store(args, &settings)?;
    let units = store.load_units().map_err(CliError::store)?;
    if !units.iter().any(|u| u.id == unit_id) {
        return Err(CliError::recon(ReconError::UnknownUnit(unit_id)));
    }

    store.delete_unit(&unit_id).map_err(CliError::store)?;
    log::info!("Deleted unit '{}'", unit_id);

    if json {
        print_json(&serde_json::json!({ "deleted": unit_id }))
    } else {
        eprintln!("Deleted unit '{}'", unit_id);
        Ok(())
    }
}

pub fn cmd_resolve(
    args: &StoreArgs,
    unit_id: String,
    student: String,
    kind: ErrorKind,
    note: String,
    json: bool,
) -> Result<(), CliError> {
    let settings = Settings::load();
    let store = open_store(args, &settings)?;
    let units = store.load_units().map_err(CliError::store)?;
    let unit = units
        .iter()
        .find(|u| u.id == unit_id)
        .ok_or_else(|| CliError::recon(ReconError::UnknownUnit(unit_id.clone())))?;

    let write = resolve(unit, &student, &note, kind, Utc::now()).map_err(CliError::recon)?;
    store.write_resolution(&write).map_err(CliError::store)?;

    if json {
        print_json(&serde_json::json!({
            "unitId": write.unit_id,
            "student": student.trim(),
            "studentId": write.student_id,
            "kind": write.kind,
            "note": write.resolution.note,
            "resolvedAt": write.resolution.resolved_at,
        }))
    } else {
        eprintln!(
            "Resolved {} error for '{}' in '{}'",
            write.kind,
            student.trim(),
            write.unit_id
        );
        Ok(())
    }
}
