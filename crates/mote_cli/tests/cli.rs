use std::path::PathBuf;
use std::process::Output;

use assert_cmd::Command;

fn mote(args: &[&str]) -> Output {
    Command::cargo_bin("mote")
        .unwrap()
        .args(args)
        .output()
        .unwrap()
}

fn write_script(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

#[test]
fn usage_without_args() {
    let out = mote(&[]);
    assert_eq!(out.status.code(), Some(2));
    assert!(stderr(&out).contains("Usage: mote"));
}

#[test]
fn unknown_command_fails() {
    let out = mote(&["lint"]);
    assert_eq!(out.status.code(), Some(2));
    assert!(stderr(&out).contains("Unknown command"));
}

#[test]
fn eval_prints_the_final_value() {
    let out = mote(&["eval", "1 + 2 * 3;"]);
    assert!(out.status.success());
    assert_eq!(stdout(&out), "7\n");
}

#[test]
fn eval_of_undefined_prints_nothing() {
    let out = mote(&["eval", "var x = 1;"]);
    assert!(out.status.success());
    assert_eq!(stdout(&out), "");
}

#[test]
fn eval_json_renders_structures() {
    let out = mote(&["eval", "--json", "({name: 'box', sizes: [1, 2]});"]);
    assert!(out.status.success());
    assert_eq!(stdout(&out), "{\"name\":\"box\",\"sizes\":[1,2]}\n");
}

#[test]
fn run_executes_a_file_and_print_reaches_stdout() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_script(
        &dir,
        "greet.mote",
        "var who = 'world';\nprint('hello', who, 1 + 1);\n",
    );
    let out = mote(&["run", path.to_string_lossy().as_ref()]);
    assert!(out.status.success());
    assert_eq!(stdout(&out), "hello world 2\n");
}

#[test]
fn run_reports_uncaught_exceptions() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_script(
        &dir,
        "boom.mote",
        "function f() { throw 'broken'; }\nf();\n",
    );
    let out = mote(&["run", path.to_string_lossy().as_ref()]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("broken"));
}

#[test]
fn run_reports_syntax_errors_with_position() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_script(&dir, "bad.mote", "var x = 1;\nvar = 2;\n");
    let out = mote(&["run", path.to_string_lossy().as_ref()]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("2:5"));
}

#[test]
fn run_of_missing_file_fails() {
    let out = mote(&["run", "/no/such/file.mote"]);
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn dump_prints_the_unit_tree() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_script(&dir, "sum.mote", "var x = 1 + 2;");
    let out = mote(&["dump", path.to_string_lossy().as_ref()]);
    assert!(out.status.success());
    let text = stdout(&out);
    assert!(text.starts_with("unit nodes=4\n"));
    assert!(text.contains("binary Add"));
}

#[test]
fn compile_writes_a_loadable_unit() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_script(&dir, "unit.mote", "f(1, 'two');");
    let bin = dir.path().join("unit.motu");
    let out = mote(&[
        "compile",
        src.to_string_lossy().as_ref(),
        bin.to_string_lossy().as_ref(),
    ]);
    assert!(out.status.success());
    let bytes = std::fs::read(&bin).unwrap();
    assert!(bytes.starts_with(b"MOTU"));
    let unit = mote_ir::Unit::from_bytes(&bytes, &mote_ir::Limits::default()).unwrap();
    assert!(unit.dump_text().contains("call argc=2"));
}

#[test]
fn compile_rejects_bad_sources() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_script(&dir, "bad.mote", "var;");
    let bin = dir.path().join("bad.motu");
    let out = mote(&[
        "compile",
        src.to_string_lossy().as_ref(),
        bin.to_string_lossy().as_ref(),
    ]);
    assert_eq!(out.status.code(), Some(1));
    assert!(!bin.exists());
}
