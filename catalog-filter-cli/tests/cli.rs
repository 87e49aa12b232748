use std::path::Path;
use std::path::PathBuf;

use anyhow::Result;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use pretty_assertions::assert_eq;
use serde_json::Value as JsonValue;
use tempfile::TempDir;

const CATALOG: &str = r#"{
  "entries": [
    {"id": "1", "title": "Tee", "price": 10, "sizes": ["S", "M"]},
    {"id": "2", "title": "Hoodie", "price": "49.90", "sizes": ["M", "L"], "free_shipping": true},
    {"id": "3", "title": "Shorts", "price": 25, "sizes": ["S", "L"], "installments": 2}
  ]
}"#;

fn write_catalog(dir: &Path, content: &str) -> Result<PathBuf> {
    let path = dir.join("catalog.json");
    std::fs::write(&path, content)?;
    Ok(path)
}

fn catalog_filter() -> Result<assert_cmd::Command> {
    let mut cmd = assert_cmd::Command::cargo_bin("catalog-filter")?;
    cmd.env_remove("RUST_LOG");
    Ok(cmd)
}

#[test]
fn lists_entries_matching_every_size() -> Result<()> {
    let dir = TempDir::new()?;
    let catalog = write_catalog(dir.path(), CATALOG)?;

    catalog_filter()?
        .arg("--catalog")
        .arg(&catalog)
        .args(["--size", "M"])
        .assert()
        .success()
        .stdout(
            contains("2 of 3 entries match M")
                .and(contains("Tee"))
                .and(contains("Hoodie"))
                .and(contains("Shorts").not()),
        );

    catalog_filter()?
        .arg("--catalog")
        .arg(&catalog)
        .args(["--size", "S", "--size", "L"])
        .assert()
        .success()
        .stdout(contains("1 of 3 entries match L + S").and(contains("Shorts")));

    Ok(())
}

#[test]
fn json_output_reports_view() -> Result<()> {
    let dir = TempDir::new()?;
    let catalog = write_catalog(dir.path(), CATALOG)?;
    let config = dir.path().join("engine.toml");
    std::fs::write(&config, "debounce_ms = 10\n")?;

    let output = catalog_filter()?
        .arg("--catalog")
        .arg(&catalog)
        .arg("--config")
        .arg(&config)
        .args(["--size", "L", "--json", "--facets"])
        .output()?;
    assert!(output.status.success());

    let report: JsonValue = serde_json::from_slice(&output.stdout)?;
    let ids: Vec<&str> = report["entries"]
        .as_array()
        .map(|entries| entries.iter().filter_map(|entry| entry["id"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(ids, vec!["2", "3"]);
    assert_eq!(report["total"], 3);
    assert_eq!(report["selection"], serde_json::json!(["L"]));
    assert_eq!(report["entries"][0]["price"], 49.9);
    assert_eq!(
        report["facets"],
        serde_json::json!([
            {"value": "L", "count": 2},
            {"value": "M", "count": 2},
            {"value": "S", "count": 2},
        ])
    );
    assert!(report.get("metrics").is_none());
    Ok(())
}

#[test]
fn no_filter_prints_whole_catalog_with_metrics() -> Result<()> {
    let dir = TempDir::new()?;
    let catalog = write_catalog(dir.path(), CATALOG)?;

    catalog_filter()?
        .arg("--catalog")
        .arg(&catalog)
        .arg("--metrics")
        .assert()
        .success()
        .stdout(
            contains("3 of 3 entries match no filter")
                .and(contains("Timings"))
                .and(contains("refresh.fetch")),
        );
    Ok(())
}

#[test]
fn skipped_entries_are_reported_on_stderr() -> Result<()> {
    let dir = TempDir::new()?;
    let catalog = write_catalog(
        dir.path(),
        r#"[{"id": "1", "title": "Tee", "price": 10}, {"title": "no id", "price": 1}]"#,
    )?;

    catalog_filter()?
        .arg("--catalog")
        .arg(&catalog)
        .assert()
        .success()
        .stdout(contains("1 of 1 entries match no filter"))
        .stderr(contains("entry #1 has no identifier").and(contains("1 catalog entries were skipped")));
    Ok(())
}

#[test]
fn missing_catalog_fails() -> Result<()> {
    let dir = TempDir::new()?;

    catalog_filter()?
        .arg("--catalog")
        .arg(dir.path().join("absent.json"))
        .assert()
        .failure()
        .stderr(contains("Failed to load catalog"));
    Ok(())
}

#[test]
fn invalid_config_fails() -> Result<()> {
    let dir = TempDir::new()?;
    let catalog = write_catalog(dir.path(), CATALOG)?;
    let config = dir.path().join("engine.toml");
    std::fs::write(&config, "metrics_window = 0\n")?;

    catalog_filter()?
        .arg("--catalog")
        .arg(&catalog)
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(contains("Invalid config"));
    Ok(())
}
