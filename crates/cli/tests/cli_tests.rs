#![allow(deprecated)] // cargo_bin is deprecated but still functional

use assert_cmd::Command;
use predicates::str::contains;
use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_config(root: &Path) {
    let config = format!(
        r#"
[cache]
dir = "{root}/cache"
env = "devnet"
name = "cli"

[grid]
grid_width = 20
grid_height = 20
partition_width = 10
partition_height = 10

[upload]
assets_dir = "{root}/assets"

[storage]
type = "filesystem"
path = "{root}/storage"

[registry]
path = "{root}/registry.json"
"#,
        root = root.display()
    );
    fs::write(root.join("tessera.toml"), config).unwrap();
}

fn write_item(root: &Path, index: u64) {
    let assets = root.join("assets");
    fs::create_dir_all(&assets).unwrap();
    fs::write(assets.join(format!("{index}.png")), vec![index as u8; 32]).unwrap();
    let manifest = json!({
        "name": format!("Land #{index:06}"),
        "symbol": "LAND",
        "seller_fee_basis_points": 500,
        "image": format!("{index}.png"),
        "properties": {
            "creators": [{"address": "creator", "share": 100}],
            "files": [{"type": "image/png", "uri": format!("{index}.png")}]
        }
    });
    fs::write(assets.join(format!("{index}.json")), manifest.to_string()).unwrap();
}

fn tessera(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("tessera").unwrap();
    cmd.current_dir(root)
        .env_remove("TESSERA_CONFIG")
        .env("RUST_LOG", "warn");
    cmd
}

#[test]
fn generate_permutation_writes_snake_table() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::write(root.join("snake.txt"), "0 0\n1 0\n1 1\n0 1\n").unwrap();

    tessera(root)
        .args(["generate-permutation", "--path", "snake.txt", "--width", "2"])
        .args(["--output", "out/permutation.json"])
        .assert()
        .success()
        .stdout(contains("Wrote 4 entries"));

    let table: Vec<u32> =
        serde_json::from_slice(&fs::read(root.join("out/permutation.json")).unwrap()).unwrap();
    assert_eq!(table, vec![0, 1, 3, 2]);
}

#[test]
fn generate_permutation_rejects_repeated_cell() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::write(root.join("bad.txt"), "0 0\n0 0\n").unwrap();

    tessera(root)
        .args(["generate-permutation", "--path", "bad.txt", "--width", "2"])
        .args(["--output", "permutation.json"])
        .assert()
        .failure()
        .stderr(contains("invalid path file"));
}

#[test]
fn publish_then_status() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write_config(root);
    for index in [0, 1, 2, 20, 21] {
        write_item(root, index);
    }

    tessera(root)
        .args(["publish", "--row", "0", "--col", "0"])
        .assert()
        .success()
        .stdout(contains("5 uploaded"))
        // Keys 0-2 and 10-11 sit in separate blocks of ten lines.
        .stdout(contains("2 window(s) written"));

    // Everything is recorded, so a second run has nothing to do.
    tessera(root)
        .args(["upload", "-n", "0"])
        .assert()
        .success()
        .stdout(contains("0 pending"));

    tessera(root)
        .arg("status")
        .assert()
        .success()
        .stdout(contains("[0,0]"))
        .stdout(contains("registry-"));

    assert!(root.join("cache/devnet-cli").exists());
}

#[test]
fn status_without_cache() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write_config(root);

    tessera(root)
        .arg("status")
        .assert()
        .success()
        .stdout(contains("No partitions"));
}

#[test]
fn partition_outside_grid_fails() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write_config(root);

    tessera(root)
        .args(["upload", "--row", "2", "--col", "0"])
        .assert()
        .failure()
        .stderr(contains("outside"));
}

#[test]
fn env_overrides_config_file() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write_config(root);

    tessera(root)
        .env("TESSERA_REGISTRY__WINDOW_SIZE", "0")
        .args(["sync", "-n", "0"])
        .assert()
        .failure()
        .stderr(contains("registry.window_size"));
}
