use std::fs;
use std::path::Path;

use clap::Parser;
use dmap_cli::{run, Cli};
use dmap_core::{read_file, TypeTag};

fn run_args(args: &[&str]) -> anyhow::Result<String> {
    let cli = Cli::parse_from(std::iter::once("dmap").chain(args.iter().copied()));
    let mut out = Vec::new();
    run(&cli, &mut out)?;
    Ok(String::from_utf8(out).unwrap())
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

const RECORDS: &str = r#"[
    {"stid": 5, "combf": "normal scan", "xcf": [1.5, 2.5], "slist": [1, 2]},
    {"stid": 6, "combf": "camp", "xcf": [0.25, 4.0], "slist": []}
]"#;

/// Encode the sample JSON into a DMAP file under `dir`
fn encoded(dir: &Path) -> std::path::PathBuf {
    let input = dir.join("records.json");
    let output = dir.join("records.dat");
    fs::write(&input, RECORDS).unwrap();
    fs::write(dir.join("types.json"), r#"{"stid": "short", "slist": "short"}"#).unwrap();
    run_args(&[
        "encode",
        path_str(&input),
        path_str(&output),
        "--types",
        path_str(&dir.join("types.json")),
    ])
    .unwrap();
    output
}

#[test]
fn test_encode_then_read() {
    let dir = tempfile::tempdir().unwrap();
    let output = encoded(dir.path());

    let records = read_file(&output).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].scalar("stid").unwrap().tag(), TypeTag::Short);
    assert_eq!(records[0].array("xcf").unwrap().tag(), TypeTag::Float);
    assert_eq!(records[1].array("slist").unwrap().value.len(), 0);
}

#[test]
fn test_check() {
    let dir = tempfile::tempdir().unwrap();
    let output = encoded(dir.path());

    let text = run_args(&["check", path_str(&output)]).unwrap();
    assert!(text.contains("2 records"), "{}", text);

    let json = run_args(&["check", "--json", path_str(&output)]).unwrap();
    let summary: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(summary["records"], 2);
    assert_eq!(summary["validated"], false);
    assert!(summary["file_type"].is_null());
}

#[test]
fn test_check_against_dictionary_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = encoded(dir.path());

    let err = run_args(&["check", "-t", "rawacf", path_str(&output)]).unwrap_err();
    assert!(format!("{:#}", err).contains("rawacf"));

    run_args(&["check", "-t", "rawacf", "--no-validate", path_str(&output)]).unwrap();
}

#[test]
fn test_dump() {
    let dir = tempfile::tempdir().unwrap();
    let output = encoded(dir.path());

    let text = run_args(&["dump", path_str(&output)]).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(
        lines[0],
        r#"{"stid":5,"combf":"normal scan","xcf":[1.5,2.5],"slist":[1,2]}"#
    );

    let one = run_args(&["dump", "--record", "1", path_str(&output)]).unwrap();
    assert_eq!(one.trim_end(), lines[1]);

    assert!(run_args(&["dump", "--record", "2", path_str(&output)]).is_err());
}

#[test]
fn test_convert() {
    let dir = tempfile::tempdir().unwrap();
    let output = encoded(dir.path());
    let copy = dir.path().join("copy.dat");

    // No file type can be inferred from "records.dat"
    assert!(run_args(&["convert", path_str(&output), path_str(&copy)]).is_err());

    run_args(&["convert", "--no-validate", path_str(&output), path_str(&copy)]).unwrap();
    assert_eq!(fs::read(&output).unwrap(), fs::read(&copy).unwrap());
}

#[test]
fn test_corrupt_input() {
    let dir = tempfile::tempdir().unwrap();
    let output = encoded(dir.path());

    let mut data = fs::read(&output).unwrap();
    data.truncate(data.len() - 3);
    let broken = dir.path().join("broken.dat");
    fs::write(&broken, data).unwrap();

    assert!(run_args(&["check", path_str(&broken)]).is_err());
    assert!(run_args(&["dump", path_str(&broken)]).is_err());
}

#[test]
fn test_encode_rejects_bad_json() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("bad.json");
    let output = dir.path().join("bad.dat");

    fs::write(&input, r#"[{"stid": 5, "xcf": [1, "a"]}]"#).unwrap();
    assert!(run_args(&["encode", path_str(&input), path_str(&output)]).is_err());

    fs::write(&input, "not json").unwrap();
    assert!(run_args(&["encode", path_str(&input), path_str(&output)]).is_err());
    assert!(!output.exists());
}
