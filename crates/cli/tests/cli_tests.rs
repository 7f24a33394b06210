// End-to-end tests for the `tuition` binary against a file-backed store.
//
// Every test gets its own temp dir holding the settings directory, the
// store file and the input spreadsheet.
//
// Run with: cargo test -p tuition-cli --test cli_tests

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

struct Env {
    dir: TempDir,
}

impl Env {
    fn new() -> Self {
        Self { dir: tempfile::tempdir().unwrap() }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn run(&self, args: &[&str]) -> Output {
        let store_path = self.path("units.json");
        Command::new(env!("CARGO_BIN_EXE_tuition"))
            .env("TUITION_CONFIG_DIR", self.path("config"))
            .env_remove("TUITION_DATABASE_URL")
            .env_remove("TUITION_STORE_PATH")
            .env_remove("RUST_LOG")
            .args(args)
            .args(["--store", "file", "--store-path", store_path.to_str().unwrap()])
            .output()
            .expect("run tuition")
    }

    fn json(&self, args: &[&str]) -> serde_json::Value {
        let out = self.run(args);
        assert!(
            out.status.success(),
            "{:?} failed: {:?}\nstderr: {}",
            args,
            out.status,
            String::from_utf8_lossy(&out.stderr)
        );
        let stdout = String::from_utf8_lossy(&out.stdout);
        serde_json::from_str(stdout.trim())
            .unwrap_or_else(|e| panic!("stdout must be one JSON value: {}\n{}", e, stdout))
    }

    /// Semicolon CSV in the export layout: name at col 2, guardian 3,
    /// grade 9, due date 11, billed 14, minimum 16.
    fn write_billing_csv(&self, name: &str, rows: &[(&str, &str, &str, &str)]) -> PathBuf {
        let mut lines = vec![header()];
        for (student, due, billed, minimum) in rows {
            lines.push(row(student, due, billed, minimum));
        }
        let path = self.path(name);
        std::fs::write(&path, lines.join("\n") + "\n").unwrap();
        path
    }

    fn upload_sample(&self) {
        let csv = self.write_billing_csv(
            "marco.csv",
            &[
                ("Ana Souza", "05/03/2024", "R$ 1.500,00", "R$ 1.200,00"),
                ("Bruno Lima", "12/03/2024", "R$ 2.000,00", "R$ 1.500,00"),
                ("", "05/03/2024", "R$ 1.000,00", "R$ 1.000,00"),
                ("Carla Dias", "10/03/2024", "R$ 800,00", "R$ 700,00"),
            ],
        );
        let summary = self.json(&["upload", csv.to_str().unwrap(), "--unit", "Unidade Centro", "--json"]);
        assert_eq!(summary["unit_id"], "unidade-centro");
    }
}

fn header() -> String {
    (0..17).map(|i| format!("col{}", i)).collect::<Vec<_>>().join(";")
}

fn row(student: &str, due: &str, billed: &str, minimum: &str) -> String {
    let mut cells = vec![String::new(); 17];
    cells[0] = "1".into();
    cells[2] = student.into();
    cells[3] = format!("Resp. {}", student);
    cells[9] = "5º ano".into();
    cells[11] = due.into();
    cells[14] = billed.into();
    cells[16] = minimum.into();
    cells.join(";")
}

fn code(out: &Output) -> i32 {
    out.status.code().expect("exit code")
}

fn stored(path: &Path) -> serde_json::Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

// ===========================================================================
// upload / units
// ===========================================================================

#[test]
fn upload_reports_counts_and_persists_unit() {
    let env = Env::new();
    let csv = env.write_billing_csv(
        "in.csv",
        &[
            ("Ana Souza", "05/03/2024", "R$ 1.500,00", "R$ 1.200,00"),
            ("", "05/03/2024", "R$ 1.000,00", "R$ 1.000,00"),
        ],
    );
    let summary = env.json(&["upload", csv.to_str().unwrap(), "--unit", "  Unidade Centro ", "--json"]);
    assert_eq!(summary["name"], "Unidade Centro");
    assert_eq!(summary["rows_read"], 2);
    assert_eq!(summary["records"], 1);
    assert_eq!(summary["discarded"], 1);
    assert_eq!(summary["new_students"], serde_json::json!(["Ana Souza"]));

    let doc = stored(&env.path("units.json"));
    let unit = &doc["units"]["unidade-centro"];
    assert_eq!(unit["data"][0]["billed"], 1500.0);
    assert_eq!(unit["data"][0]["diffAbs"], 300.0);

    let units = env.json(&["units", "--json"]);
    assert_eq!(units[0]["id"], "unidade-centro");
    assert_eq!(units[0]["records"], 1);
    assert_eq!(units[0]["students"], 1);
}

#[test]
fn reupload_keeps_ids_and_resolutions() {
    let env = Env::new();
    env.upload_sample();
    env.json(&["resolve", "--unit", "unidade-centro", "--student", "Bruno Lima", "--kind", "date", "--json"]);
    let before = stored(&env.path("units.json"))["units"]["unidade-centro"]["students"].clone();

    let csv = env.write_billing_csv(
        "abril.csv",
        &[("Bruno Lima", "12/04/2024", "R$ 2.000,00", "R$ 1.500,00")],
    );
    let summary = env.json(&["upload", csv.to_str().unwrap(), "--unit", "Unidade Centro", "--json"]);
    assert_eq!(summary["new_students"], serde_json::json!([]));

    let unit = &stored(&env.path("units.json"))["units"]["unidade-centro"];
    assert_eq!(unit["students"], before);
    assert_eq!(unit["data"].as_array().unwrap().len(), 1);
    assert_eq!(unit["resolutions"].as_object().unwrap().len(), 1);
}

#[test]
fn delete_unit() {
    let env = Env::new();
    env.upload_sample();
    let out = env.json(&["units", "--delete", "unidade-centro", "--json"]);
    assert_eq!(out["deleted"], "unidade-centro");
    assert_eq!(env.json(&["units", "--json"]), serde_json::json!([]));

    let missing = env.run(&["units", "--delete", "unidade-centro"]);
    assert_eq!(code(&missing), 23);
}

#[test]
fn upload_missing_file_is_io_error() {
    let env = Env::new();
    let out = env.run(&["upload", env.path("nope.csv").to_str().unwrap(), "--unit", "X"]);
    assert_eq!(code(&out), 3);
}

#[test]
fn overflowing_minimum_does_not_break_other_units() {
    let env = Env::new();
    env.upload_sample();
    let csv = env.write_billing_csv("sul.csv", &[("Davi Rocha", "05/03/2024", "R$ 1.500,00", "1e400")]);
    env.json(&["upload", csv.to_str().unwrap(), "--unit", "Sul", "--json"]);

    let units = env.json(&["units", "--json"]);
    assert_eq!(units.as_array().unwrap().len(), 2);

    let report = env.json(&["report", "--unit", "sul", "--json"]);
    assert_eq!(report["records"][0]["minimum"], 0.0);
    assert_eq!(report["records"][0]["diffAbs"], 1500.0);
}

// ===========================================================================
// report
// ===========================================================================

#[test]
fn report_json_stats_and_flags() {
    let env = Env::new();
    env.upload_sample();

    let report = env.json(&["report", "--all", "--json"]);
    assert_eq!(report["status"], "ready");
    assert_eq!(report["units"], serde_json::json!(["unidade-centro"]));
    assert_eq!(report["stats"]["totalRows"], 3);
    assert_eq!(report["stats"]["totalDiscount"], 900.0);
    // 12.5%, 20% and 25%
    let counts: Vec<u64> = report["stats"]["distribution"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["count"].as_u64().unwrap())
        .collect();
    assert_eq!(counts, vec![0, 0, 1, 0, 1, 1, 0, 0]);
    assert_eq!(report["stats"]["distribution"][7]["range"], ">100%");
    assert_eq!(report["errors"]["invalidDueDateCount"], 1);
    assert_eq!(report["errors"]["lowValueCount"], 1);

    let names: Vec<&str> = report["records"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["studentName"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Ana Souza", "Bruno Lima", "Carla Dias"]);
    assert_eq!(report["records"][1]["dateUnresolved"], true);
    assert_eq!(report["records"][2]["valueError"], true);
    assert!(report.get("insight").is_none());
}

#[test]
fn report_error_filter_and_search() {
    let env = Env::new();
    env.upload_sample();

    let errors = env.json(&["report", "--errors", "--json"]);
    assert_eq!(errors["records"].as_array().unwrap().len(), 2);

    let dates_only = env.json(&["report", "--errors", "--no-value", "--json"]);
    let rows = dates_only["records"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["studentName"], "Bruno Lima");

    let both_off = env.run(&["report", "--errors", "--no-value", "--no-date"]);
    assert_eq!(code(&both_off), 2);

    let search = env.json(&["report", "--search", "CARLA", "--json"]);
    assert_eq!(search["records"].as_array().unwrap().len(), 1);
    // Search narrows the rows, not the stats
    assert_eq!(search["stats"]["totalRows"], 3);
}

#[test]
fn fail_on_errors_until_resolved() {
    let env = Env::new();
    env.upload_sample();

    let out = env.run(&["report", "--all", "--fail-on-errors"]);
    assert_eq!(code(&out), 5);

    env.json(&["resolve", "--unit", "unidade-centro", "--student", "Bruno Lima", "--kind", "date", "--note", "acordo", "--json"]);
    env.json(&["resolve", "--unit", "unidade-centro", "--student", " Carla Dias ", "--kind", "value", "--json"]);

    let out = env.run(&["report", "--all", "--fail-on-errors"]);
    assert_eq!(code(&out), 0, "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let report = env.json(&["report", "--all", "--json"]);
    assert_eq!(report["errors"]["resolvedCount"], 2);
    assert_eq!(report["errors"]["invalidDueDateCount"], 0);
}

#[test]
fn report_output_csv() {
    let env = Env::new();
    env.upload_sample();
    let out_path = env.path("pendencias.csv");
    let out = env.run(&["report", "--all", "--output", out_path.to_str().unwrap()]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let text = std::fs::read_to_string(&out_path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("unit,student,"));
    assert!(lines[2].contains("Bruno Lima") && lines[2].ends_with("open,"));
}

#[test]
fn custom_rules_file() {
    let env = Env::new();
    env.upload_sample();
    let rules = env.path("rules.toml");
    std::fs::write(&rules, "base_days = [12]\nmin_expected_value = 500.0\n").unwrap();

    let report = env.json(&["report", "--all", "--rules", rules.to_str().unwrap(), "--json"]);
    // 05/03 and 10/03 are now off-calendar; 12/03 is fine; R$ 700 clears 500
    assert_eq!(report["errors"]["invalidDueDateCount"], 2);
    assert_eq!(report["errors"]["lowValueCount"], 0);
}

#[test]
fn unknown_unit_is_not_found() {
    let env = Env::new();
    env.upload_sample();
    let out = env.run(&["report", "--unit", "nope"]);
    assert_eq!(code(&out), 23);
    assert!(String::from_utf8_lossy(&out.stderr).contains("unknown unit: nope"));
}

#[test]
fn empty_store_reports_no_data() {
    let env = Env::new();
    let report = env.json(&["report", "--json"]);
    assert_eq!(report["status"], "no_data");
    assert!(report["stats"].is_null());
}

// ===========================================================================
// resolve / resolved
// ===========================================================================

#[test]
fn resolve_and_list() {
    let env = Env::new();
    env.upload_sample();

    let res = env.json(&[
        "resolve", "--unit", "unidade-centro", "--student", "Bruno Lima", "--kind", "date",
        "--note", "Acordo com a família", "--json",
    ]);
    assert_eq!(res["kind"], "date");
    assert!(res["studentId"].as_str().is_some_and(|s| !s.is_empty()));

    let listed = env.json(&["resolved", "--all", "--json"]);
    let entries = listed.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["name"], "Bruno Lima");
    assert_eq!(entries[0]["note"], "Acordo com a família");
}

#[test]
fn resolve_unknown_student_or_kind() {
    let env = Env::new();
    env.upload_sample();

    let out = env.run(&["resolve", "--unit", "unidade-centro", "--student", "Bruno  Lima", "--kind", "date"]);
    assert_eq!(code(&out), 23);

    let out = env.run(&["resolve", "--unit", "unidade-centro", "--student", "Bruno Lima", "--kind", "price"]);
    assert_eq!(code(&out), 2);
}

// ===========================================================================
// watch / ai / rules
// ===========================================================================

#[test]
fn watch_prints_snapshot_then_exits_at_limit() {
    let env = Env::new();
    env.upload_sample();
    let out = env.run(&["watch", "--all", "--limit", "1"]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("[unidade-centro] 3 student(s)"), "stdout: {}", stdout);
}

#[test]
fn ai_disabled_by_default() {
    let env = Env::new();
    let doctor = env.run(&["ai", "doctor", "--json"]);
    assert_eq!(code(&doctor), 10);
    let val: serde_json::Value = serde_json::from_slice(&doctor.stdout).unwrap();
    assert_eq!(val["status"], "disabled");
    assert!(env.path("config").join("settings.json").exists());

    env.upload_sample();
    assert_eq!(code(&env.run(&["insight", "--all"])), 10);

    // The report still succeeds and carries the disabled payload
    let report = env.json(&["report", "--all", "--insight", "--json"]);
    assert_eq!(report["insight"]["summary"], "AI analysis is disabled.");
}

#[test]
fn rules_validate() {
    let env = Env::new();
    let good = env.path("ok.toml");
    std::fs::write(&good, "base_days = [5, 10, 15, 20]\n").unwrap();
    let val = env.json(&["rules", "validate", good.to_str().unwrap(), "--json"]);
    assert_eq!(val["valid"], true);
    assert_eq!(val["base_days"], serde_json::json!([5, 10, 15, 20]));
    assert_eq!(val["min_expected_value"], 1000.0);

    let bad = env.path("bad.toml");
    std::fs::write(&bad, "base_days = [0]\n").unwrap();
    assert_eq!(code(&env.run(&["rules", "validate", bad.to_str().unwrap()])), 2);
}
