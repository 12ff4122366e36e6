use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

#[test]
fn test_filter_prints_normalized_form() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("conduit")?;
    cmd.args(["filter", "(&(zone=utc)(service.ranking>=1))"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("(&(zone=utc)(service.ranking>=1))"));

    Ok(())
}

#[test]
fn test_malformed_filter_exits_with_two() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("conduit")?;
    cmd.args(["filter", "(&(zone=utc)"]);

    cmd.assert()
        .code(2)
        .stderr(predicate::str::contains("invalid filter"));

    Ok(())
}

#[test]
fn test_demo_reaches_every_stage() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("conduit")?;
    cmd.arg("demo");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("time-service: RESOLVING_DEPENDENCIES"))
        .stdout(predicate::str::contains("time-service: SERVICES_EXPOSED"))
        .stdout(predicate::str::contains("time-service: ACTIVE"))
        .stdout(predicate::str::contains("time-service: bound clock-1"))
        .stdout(predicate::str::contains("time-service: unbound clock-1"))
        .stdout(predicate::str::contains("time-service clock: none"))
        .stdout(predicate::str::contains("time-service: DISPOSED"));

    Ok(())
}

#[test]
fn test_demo_with_replace_switches_clock() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("conduit")?;
    cmd.args(["demo", "--replace"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("time-service: bound clock-2"))
        .stdout(predicate::str::contains("time-service clock: clock-2"))
        .stdout(predicate::str::contains("time published: 1"));

    Ok(())
}

#[test]
fn test_demo_with_config_file() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("engine.json");
    std::fs::write(&path, r#"{ "shutdown_timeout_ms": 2000 }"#)?;

    let mut cmd = Command::cargo_bin("conduit")?;
    cmd.arg("--config").arg(&path).arg("demo");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("time-service: DISPOSED"));

    Ok(())
}

#[test]
fn test_unsupported_config_format_fails() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("engine.ini");
    std::fs::write(&path, "shutdown_timeout_ms=2000")?;

    let mut cmd = Command::cargo_bin("conduit")?;
    cmd.arg("--config").arg(&path).arg("demo");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported config format"));

    Ok(())
}
