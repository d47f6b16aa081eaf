use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

const MPESA_VARS: &[&str] = &[
    "MPESA_CONSUMER_KEY",
    "MPESA_CONSUMER_SECRET",
    "MPESA_PASSKEY",
    "MPESA_SHORT_CODE",
    "MPESA_CALLBACK_URL",
    "MPESA_BASE_URL",
    "MPESA_CONFIRMATION_TIMEOUT_SECS",
];

#[test]
fn test_missing_configuration_is_reported() {
    let mut cmd = Command::new(cargo_bin!("wifipanel"));
    for var in MPESA_VARS {
        cmd.env_remove(var);
    }
    cmd.arg("254712345678");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("missing consumer key"));
}

#[test]
fn test_help_describes_purchase_arguments() {
    let mut cmd = Command::new(cargo_bin!("wifipanel"));
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("plan-label"))
        .stdout(predicate::str::contains("phone"));
}

#[test]
fn test_rejects_zero_price_plan() {
    let mut cmd = Command::new(cargo_bin!("wifipanel"));
    cmd.env("MPESA_CONSUMER_KEY", "key")
        .env("MPESA_CONSUMER_SECRET", "secret")
        .env("MPESA_PASSKEY", "passkey")
        .env("MPESA_CALLBACK_URL", "https://example.com/api/callback")
        .args(["254712345678", "--price-minor-units", "0"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("price must be positive"));
}
