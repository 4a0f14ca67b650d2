use assert_cmd::Command;

#[test]
fn help_lists_subcommands() {
    let output = Command::cargo_bin("covers")
        .unwrap()
        .arg("--help")
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    for subcommand in ["serve", "seed", "openapi"] {
        assert!(stdout.contains(subcommand), "missing {subcommand} in help");
    }
}

#[test]
fn openapi_prints_merged_document() {
    let output = Command::cargo_bin("covers")
        .unwrap()
        .arg("openapi")
        .env("COVERS_ENV", "local")
        .env_remove("COVERS_DATABASE__DATA_DIR")
        .output()
        .unwrap();
    assert!(output.status.success());

    let spec: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(spec["paths"]["/api/books"].is_object());
    assert!(spec["paths"]["/api/users/register"].is_object());
}

#[test]
fn seed_requires_a_password() {
    Command::cargo_bin("covers")
        .unwrap()
        .arg("seed")
        .env_remove("COVERS_SEED_PASSWORD")
        .assert()
        .failure();
}
