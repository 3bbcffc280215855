//! CLI integration tests
//!
//! Run the compiled binary against synthetic ENEM and prepared IDEB files
//! and check exit codes, printed results and files in the output directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const ENEM_HEADER: &str = "NU_INSCRICAO;CO_ESCOLA;NU_IDADE;TP_SEXO;TP_ESTADO_CIVIL;TP_ENSINO;SG_UF_RESIDENCIA;Q005;TP_ESCOLA;NU_NOTA_CN;NU_NOTA_CH;NU_NOTA_LC;NU_NOTA_MT;NU_NOTA_REDACAO";

const IDEB_CSV: &str = "CO_ESCOLA,IN_RENDIMENTO,NT_PADRONIZADA,IDEB
100,0.5,5.1,3.9
101,0.9,,
102,0.6,4.8,3.1
103,0.75,,
104,0.8,5.5,4.4
105,0.55,,
";

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();

        let mut lines = vec![ENEM_HEADER.to_string()];
        lines.extend((0..80).map(enem_row));
        fs::write(dir.path().join("enem.csv"), lines.join("\n")).unwrap();
        fs::write(dir.path().join("ideb.csv"), IDEB_CSV).unwrap();

        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn output(&self) -> PathBuf {
        self.path("output")
    }

    /// Run the binary with the output directory set
    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_enem-insight"))
            .arg("--output-dir")
            .arg(self.output())
            .args(args)
            .env_remove("ENEM_INSIGHT_HOME")
            .env_remove("ENEM_INSIGHT_ENEM_PATH")
            .env_remove("ENEM_INSIGHT_ALPHA")
            .env_remove("ENEM_INSIGHT_SEED")
            .env_remove("ENEM_INSIGHT_SAMPLE_ROWS")
            .env_remove("RUST_LOG")
            .output()
            .expect("binary runs")
    }

    fn prepare(&self) -> Output {
        let enem = self.path("enem.csv");
        let ideb = self.path("ideb.csv");
        self.run(&[
            "prepare",
            "--enem",
            enem.to_str().unwrap(),
            "--ideb-csv",
            ideb.to_str().unwrap(),
        ])
    }
}

fn enem_row(i: usize) -> String {
    let school = if i % 4 == 3 {
        String::new()
    } else {
        (100 + i % 6).to_string()
    };
    let age = 17 + i % 5;
    let age_field = if i % 13 == 0 { String::new() } else { age.to_string() };
    let male = i % 2 == 1;
    let marital = if i % 9 == 0 { "2" } else { "1" };
    let schooling = if i % 7 == 0 { 2 } else { 1 };
    let uf = if (i / 3) % 2 == 0 { "SP" } else { "RJ" };
    let household = 2 + i % 4;
    let base = 450.0
        + 3.0 * age as f64
        + if male { 15.0 } else { 0.0 }
        + 10.0 * household as f64
        + ((i * 37) % 23) as f64;
    let math = if i % 19 == 5 {
        String::new()
    } else {
        format!("{:.1}", base + 20.0)
    };
    format!(
        "{};{};{};{};{};{};{};{};{};{:.1};{:.1};{:.1};{};{:.1}",
        i,
        school,
        age_field,
        if male { "M" } else { "F" },
        marital,
        schooling,
        uf,
        household,
        1 + i % 3,
        base - 10.0,
        base + 5.0,
        base,
        math,
        base - 15.0
    )
}

fn stdout_json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "stdout is not JSON ({}): {}\nstderr: {}",
            e,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        )
    })
}

fn assert_exit(output: &Output, code: i32) {
    assert_eq!(
        output.status.code(),
        Some(code),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

fn exists(dir: &Path, name: &str) -> bool {
    dir.join(name).exists()
}

#[test]
fn test_run_produces_report() {
    let fixture = Fixture::new();
    let enem = fixture.path("enem.csv");
    let ideb = fixture.path("ideb.csv");

    let output = fixture.run(&[
        "--json",
        "run",
        "--enem",
        enem.to_str().unwrap(),
        "--ideb-csv",
        ideb.to_str().unwrap(),
    ]);
    assert_exit(&output, 0);

    let report = stdout_json(&output);
    assert_eq!(report["rows"], 76);
    assert_eq!(report["normality"].as_array().unwrap().len(), 4);
    assert!(report["training"]["linear_regression"]["test_metrics"]["r2_score"].is_number());

    let out = fixture.output();
    for name in [
        "merged.csv",
        "normality.json",
        "comparisons.json",
        "training.json",
        "report.json",
    ] {
        assert!(exists(&out, name), "{} missing", name);
    }
    assert!(out.join("logs").is_dir());
}

#[test]
fn test_stages_on_prepared_dataset() {
    let fixture = Fixture::new();
    assert_exit(&fixture.prepare(), 0);
    assert!(exists(&fixture.output(), "merged.csv"));

    let normality = fixture.run(&["normality", "--json"]);
    assert_exit(&normality, 0);
    let rows = stdout_json(&normality);
    let variables: Vec<&str> = rows
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["variable"].as_str().unwrap())
        .collect();
    assert_eq!(variables, vec!["NU_IDADE", "NU_NOTA_TOT", "IN_RENDIMENTO", "Q005"]);

    let compare = fixture.run(&["compare", "--column", "TP_ESCOLA", "--json"]);
    assert_exit(&compare, 0);
    let comparison = stdout_json(&compare);
    assert_eq!(comparison["test"], "KruskalWallis");
    assert_eq!(comparison["levels"], 3);

    let train = fixture.run(&["train"]);
    assert_exit(&train, 0);
    let text = String::from_utf8_lossy(&train.stdout);
    assert!(text.contains("Linear regression"));
    assert!(text.contains("Decision tree"));
}

#[test]
fn test_compare_unknown_column_is_input_error() {
    let fixture = Fixture::new();
    assert_exit(&fixture.prepare(), 0);

    let output = fixture.run(&["compare", "--column", "NOT_A_COLUMN"]);
    assert_exit(&output, 2);
    assert!(String::from_utf8_lossy(&output.stderr).contains("NOT_A_COLUMN"));
}

#[test]
fn test_normality_without_merged_dataset() {
    let fixture = Fixture::new();
    let output = fixture.run(&["normality"]);
    assert_exit(&output, 2);
}

#[test]
fn test_prepare_without_enem_is_input_error() {
    let fixture = Fixture::new();
    let ideb = fixture.path("ideb.csv");
    let output = fixture.run(&["prepare", "--ideb-csv", ideb.to_str().unwrap()]);
    assert_exit(&output, 2);
}

#[test]
fn test_invalid_config_is_input_error() {
    let fixture = Fixture::new();
    let config = fixture.path("config.toml");
    fs::write(&config, "[model]\ntest_fraction = 1.5\n").unwrap();

    let output = fixture.run(&["--config", config.to_str().unwrap(), "train"]);
    assert_exit(&output, 2);
}

#[test]
fn test_missing_subcommand_is_usage_error() {
    let fixture = Fixture::new();
    let output = fixture.run(&[]);
    assert_exit(&output, 2);
}
