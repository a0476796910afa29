use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;
use tempfile::tempdir;

mod common;

#[test]
fn test_malformed_csv_handling() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("robustness.csv");
    common::write_commands(
        &input,
        &[
            // Valid funding
            &["fund", "1", "media", "1", "president", "", "", "1.0"],
            // Unknown command type
            &["refund", "1", "media", "1", "president", "", "", "1.0"],
            // Missing amount
            &["fund", "1", "media", "1", "president", "", "", ""],
            // Valid funding again
            &["fund", "1", "media", "1", "president", "", "", "2.0"],
        ],
    )
    .unwrap();

    let mut cmd = Command::new(cargo_bin!("unit-ledger"));
    cmd.arg(&input);

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Error reading command"))
        .stderr(predicate::str::contains("Column 'amount' is required"))
        .stdout(predicate::str::contains("1,MEDIA,3,ACTIVE,"));
}

#[test]
fn test_invalid_data_types() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("data_types.csv");
    common::write_commands(
        &input,
        &[
            &["fund", "1", "media", "1", "president", "", "", "not_a_number"],
            &["fund", "abc", "media", "1", "president", "", "", "1.0"],
            &["fund", "1", "media", "1", "bishop", "", "", "1.0"],
            &["fund", "1", "media", "1", "president", "", "", "5.0"],
        ],
    )
    .unwrap();

    let mut cmd = Command::new(cargo_bin!("unit-ledger"));
    cmd.arg(&input);

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Error reading command"))
        .stderr(predicate::str::contains("Unknown role"))
        .stdout(predicate::str::contains("1,MEDIA,5,ACTIVE,"));
}

#[test]
fn test_unauthorized_rows_are_skipped() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("unauthorized.csv");
    common::write_commands(
        &input,
        &[
            &["fund", "1", "media", "1", "president", "", "", "500"],
            // Workers cannot move treasury money
            &["fund", "1", "media", "2", "worker", "", "", "500"],
            // Only the unit head may request a withdrawal
            &["withdraw", "1", "media", "3", "executive", "choir", "1", "100"],
            // Rejection without a reason
            &["withdraw", "1", "media", "4", "executive", "media", "2", "100"],
            &["reject", "1", "", "5", "secretary_general", "", "2"],
            // Suspension is reserved for super admins
            &["suspend", "1", "media", "1", "president"],
        ],
    )
    .unwrap();

    let mut cmd = Command::new(cargo_bin!("unit-ledger"));
    cmd.arg(&input);

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("unauthorized"))
        .stderr(predicate::str::contains("A rejection needs a reason"))
        .stdout(predicate::str::contains("1,MEDIA,500,ACTIVE,"));
}
