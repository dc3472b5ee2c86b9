//! Integration tests for the modinfo binary
//!
//! Only commands that never touch the network are run end to end; each
//! test points the store at its own temp directory.

use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

/// Helper to run the CLI with given args and capture output
fn run_cli(data_dir: &Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_modinfo"))
        .args(args)
        .env("MODINFO_DATA_DIR", data_dir)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute modinfo")
}

#[test]
fn test_help_flag_exits_successfully() {
    let temp_dir = TempDir::new().unwrap();
    let output = run_cli(temp_dir.path(), &["--help"]);
    assert!(
        output.status.success(),
        "Expected --help to exit successfully"
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("modinfo"), "Help should mention modinfo");
    for command in ["discover", "stats", "watch", "watchlist", "inbox", "refresh"] {
        assert!(stdout.contains(command), "Help should mention {}", command);
    }
}

#[test]
fn test_invalid_item_prints_error_and_exits() {
    let temp_dir = TempDir::new().unwrap();
    let output = run_cli(temp_dir.path(), &["stats", "notaslug"]);
    assert!(!output.status.success(), "Expected invalid item to fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Invalid item"),
        "Should print error message about invalid item: {}",
        stderr
    );
}

#[test]
fn test_watch_persists_between_runs() {
    let temp_dir = TempDir::new().unwrap();

    let output = run_cli(temp_dir.path(), &["watch", "alice/BetterMining"]);
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "Watching alice/BetterMining\n"
    );

    let output = run_cli(temp_dir.path(), &["watchlist"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("alice/BetterMining  added "));
    assert!(temp_dir.path().join("modinfo_watchlist_v2.json").exists());
}

#[test]
fn test_refresh_cooldown_holds_across_runs() {
    let temp_dir = TempDir::new().unwrap();

    let output = run_cli(temp_dir.path(), &["refresh"]);
    assert_eq!(String::from_utf8_lossy(&output.stdout), "Caches cleared\n");

    let output = run_cli(temp_dir.path(), &["refresh"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.starts_with("Refresh available in "),
        "Second refresh should be rejected: {}",
        stdout
    );
}

#[test]
fn test_empty_inbox() {
    let temp_dir = TempDir::new().unwrap();
    let output = run_cli(temp_dir.path(), &["inbox"]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "No notifications\n");
}

#[cfg(test)]
mod unit_tests {
    //! Unit tests for CLI parsing that don't require running the binary

    use clap::Parser;
    use modinfo_plus::cli::{parse_item_arg, Cli, Command};
    use modinfo_plus::ItemKey;

    #[test]
    fn test_cli_parse_stats_item() {
        let cli = Cli::parse_from(["modinfo", "stats", "alice/BetterMining"]);
        assert_eq!(
            cli.command,
            Command::Stats {
                item: ItemKey::new("alice", "BetterMining")
            }
        );
    }

    #[test]
    fn test_cli_parse_discover_page() {
        let cli = Cli::parse_from(["modinfo", "discover", "--page", "3"]);
        assert_eq!(cli.command, Command::Discover { page: 3 });
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["modinfo"]).is_err());
    }

    #[test]
    fn test_parse_item_arg_invalid_returns_error() {
        assert!(parse_item_arg("a/b/c").is_err());
        assert!(parse_item_arg("").is_err());
    }
}
