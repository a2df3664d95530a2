mod common;

use std::fs;

use assert_cmd::Command;
use predicates::str::contains;
use rowsplice::schema::{ColumnType, Schema};

use common::TestWorkspace;

const PEOPLE: &str = "name,id,age\nAnn,1,30\nBob,2,\nCid,3,52\n";

fn rowsplice() -> Command {
    Command::cargo_bin("rowsplice").expect("binary exists")
}

#[test]
fn schema_prints_inferred_table() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("people.csv", PEOPLE);
    rowsplice()
        .args(["schema", "-i", input.to_str().unwrap(), "-f", "CSVWithNames"])
        .assert()
        .success()
        .stdout(contains("name"))
        .stdout(contains("Nullable(Integer)"));
}

#[test]
fn schema_writes_yaml_that_parse_accepts() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("people.csv", PEOPLE);
    let schema_path = workspace.path().join("people.yaml");
    rowsplice()
        .args([
            "schema",
            "-i",
            input.to_str().unwrap(),
            "-f",
            "CSVWithNames",
            "-o",
            schema_path.to_str().unwrap(),
        ])
        .assert()
        .success();

    let schema = Schema::load(&schema_path).expect("schema loads");
    assert_eq!(schema.names(), vec!["name", "id", "age"]);
    assert_eq!(schema.columns[2].datatype, ColumnType::Integer.make_nullable());

    rowsplice()
        .args([
            "parse",
            "-i",
            input.to_str().unwrap(),
            "-f",
            "CSVWithNames",
            "-s",
            schema_path.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(contains("Bob,2,\n"));
}

#[test]
fn parse_writes_rows_in_target_order() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("people.csv", PEOPLE);
    let schema = workspace.write(
        "target.yaml",
        "columns:\n  - name: id\n    type: Integer\n  - name: name\n    type: String\n  - name: age\n    type: Integer\n  - name: city\n    type: Nullable(String)\n",
    );
    let output = workspace.path().join("out.csv");
    rowsplice()
        .args([
            "parse",
            "-i",
            input.to_str().unwrap(),
            "-f",
            "CSVWithNames",
            "-s",
            schema.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
        ])
        .assert()
        .success();

    let written = fs::read_to_string(&output).expect("read output");
    assert_eq!(written, "id,name,age,city\n1,Ann,30,\n2,Bob,0,\n3,Cid,52,\n");
}

#[test]
fn parallel_parse_matches_sequential_output() {
    let workspace = TestWorkspace::new();
    let mut data = String::from("id\tname\n");
    for idx in 0..300 {
        data.push_str(&format!("{idx}\tn{idx}\n"));
    }
    let input = workspace.write("big.tsv", &data);
    let schema = workspace.write(
        "target.yaml",
        "columns:\n  - name: name\n    type: String\n  - name: id\n    type: Integer\n",
    );
    let run = |threads: &str| {
        let output = rowsplice()
            .args([
                "parse",
                "-i",
                input.to_str().unwrap(),
                "-f",
                "TSVWithNames",
                "-s",
                schema.to_str().unwrap(),
                "--threads",
                threads,
                "--unit-bytes",
                "128",
            ])
            .output()
            .expect("run rowsplice");
        assert!(output.status.success());
        String::from_utf8(output.stdout).expect("utf-8 output")
    };
    let sequential = run("1");
    assert_eq!(sequential.lines().count(), 301);
    assert_eq!(run("4"), sequential);
}

#[test]
fn parse_failure_prints_diagnostic_trace() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("bad.csv", "id,age\n1,30\n2,old\n");
    let schema = workspace.write(
        "target.yaml",
        "columns:\n  - name: id\n    type: Integer\n  - name: age\n    type: Integer\n",
    );
    rowsplice()
        .args([
            "parse",
            "-i",
            input.to_str().unwrap(),
            "-f",
            "CSVWithNames",
            "-s",
            schema.to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(contains("error[incorrect_data]"))
        .stderr(contains("at row 2"))
        .stderr(contains("Diagnostic information"))
        .stderr(contains("Column 1, name: age"));
}

#[test]
fn settings_file_enables_skipping_unknown_columns() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("extra.csv", "id;extra\n1;zz\n");
    let schema = workspace.write("target.yaml", "columns:\n  - name: id\n    type: Integer\n");
    let settings = workspace.write("settings.yaml", "skip_unknown_fields: true\n");

    rowsplice()
        .args([
            "parse",
            "-i",
            input.to_str().unwrap(),
            "-f",
            "CSVWithNames",
            "-s",
            schema.to_str().unwrap(),
            "--delimiter",
            "semicolon",
        ])
        .assert()
        .failure()
        .stderr(contains("Unknown column 'extra'"));

    rowsplice()
        .args([
            "parse",
            "-i",
            input.to_str().unwrap(),
            "-f",
            "CSVWithNames",
            "-s",
            schema.to_str().unwrap(),
            "--settings",
            settings.to_str().unwrap(),
            "--delimiter",
            ";",
        ])
        .assert()
        .success()
        .stdout(contains("id\n1\n"));
}

#[test]
fn parse_reads_stdin_with_dash() {
    let workspace = TestWorkspace::new();
    let schema = workspace.write("target.yaml", "columns:\n  - name: n\n    type: Float\n");
    rowsplice()
        .args(["parse", "-i", "-", "-f", "CSV", "-s", schema.to_str().unwrap()])
        .write_stdin("1.5\n2\n")
        .assert()
        .success()
        .stdout(contains("n\n1.5\n2\n"));
}
