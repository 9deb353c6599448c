//! Integration tests for the cardboard CLI
//!
//! Each test drives the binary against a board file in a temp directory.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

/// Helper to create a cardboard Command isolated from the caller's environment
fn cardboard(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("cardboard");
    cmd.current_dir(dir.path())
        .env_remove("CARDBOARD_DATA")
        .env_remove("CARDBOARD_LOG")
        .env_remove("CARDBOARD_LOG_FORMAT");
    cmd
}

/// Helper to create a temporary project directory
fn create_temp_project() -> TempDir {
    TempDir::new().unwrap()
}

/// Helper to initialize a project with lists `Todo` and `Done` and cards
/// `A`, `B` in `Todo`
fn init_board(dir: &TempDir) {
    cardboard(dir).arg("init").assert().success();
    for list in ["Todo", "Done"] {
        cardboard(dir).args(["add-list", list]).assert().success();
    }
    for card in ["A", "B"] {
        cardboard(dir).args(["add-card", "Todo", card]).assert().success();
    }
}

fn stored_board(dir: &TempDir) -> Value {
    let content = fs::read_to_string(dir.path().join(".cardboard/board.json")).unwrap();
    let state: Value = serde_json::from_str(&content).unwrap();
    state["board"].clone()
}

fn stored_titles(board: &Value, list: usize) -> Vec<String> {
    board["lists"][list]["cards"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["title"].as_str().unwrap().to_string())
        .collect()
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_cardboard_help() {
        let dir = create_temp_project();
        cardboard(&dir)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("add-card"));
    }

    #[test]
    fn test_cardboard_version() {
        let dir = create_temp_project();
        cardboard(&dir).arg("--version").assert().success();
    }

    #[test]
    fn test_init_creates_structure() {
        let dir = create_temp_project();

        cardboard(&dir)
            .args(["init", "--title", "Roadmap"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Initialized cardboard project"));

        assert!(dir.path().join(".cardboard/cardboard.toml").exists());
        assert!(dir.path().join(".cardboard/board.json").exists());
        let toml = fs::read_to_string(dir.path().join(".cardboard/cardboard.toml")).unwrap();
        assert!(toml.contains("Roadmap"));
        assert_eq!(stored_board(&dir)["title"], "Roadmap");
    }

    #[test]
    fn test_init_idempotent() {
        let dir = create_temp_project();
        cardboard(&dir).arg("init").assert().success();
        cardboard(&dir)
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("already initialized"));
    }

    #[test]
    fn test_show_empty_board() {
        let dir = create_temp_project();
        cardboard(&dir).arg("init").assert().success();
        cardboard(&dir)
            .arg("show")
            .assert()
            .success()
            .stdout(predicate::str::contains("No lists yet"));
    }
}

// =============================================================================
// Board Operations
// =============================================================================

mod board_ops {
    use super::*;

    #[test]
    fn test_add_lists_and_cards() {
        let dir = create_temp_project();
        init_board(&dir);

        cardboard(&dir)
            .arg("show")
            .assert()
            .success()
            .stdout(predicate::str::contains("Todo"))
            .stdout(predicate::str::contains("0. A"))
            .stdout(predicate::str::contains("1. B"));

        let board = stored_board(&dir);
        assert_eq!(board["lists"].as_array().unwrap().len(), 2);
        assert_eq!(stored_titles(&board, 0), vec!["A", "B"]);
        assert_eq!(board["lists"][0]["cards"][1]["position"], 1);
    }

    #[test]
    fn test_add_card_by_list_number_with_description() {
        let dir = create_temp_project();
        init_board(&dir);

        cardboard(&dir)
            .args(["add-card", "2", "Shipped", "--description", "v1.0 release"])
            .assert()
            .success()
            .stdout(predicate::str::contains("v1.0 release"));

        let board = stored_board(&dir);
        assert_eq!(stored_titles(&board, 1), vec!["Shipped"]);
        assert_eq!(board["lists"][1]["cards"][0]["description"], "v1.0 release");
    }

    #[test]
    fn test_move_card_between_lists() {
        let dir = create_temp_project();
        init_board(&dir);

        cardboard(&dir)
            .args(["move", "A", "Done"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Moved"));

        let board = stored_board(&dir);
        assert_eq!(stored_titles(&board, 0), vec!["B"]);
        assert_eq!(stored_titles(&board, 1), vec!["A"]);
        assert_eq!(board["lists"][0]["cards"][0]["position"], 0);
        assert_eq!(board["lists"][1]["cards"][0]["list_id"], board["lists"][1]["id"]);
    }

    #[test]
    fn test_move_card_within_list() {
        let dir = create_temp_project();
        init_board(&dir);
        cardboard(&dir).args(["add-card", "Todo", "C"]).assert().success();

        cardboard(&dir)
            .args(["move", "C", "Todo", "--index", "0"])
            .assert()
            .success();

        let board = stored_board(&dir);
        assert_eq!(stored_titles(&board, 0), vec!["C", "A", "B"]);
        let positions: Vec<_> = board["lists"][0]["cards"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["position"].as_i64().unwrap())
            .collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn test_remove_card_renumbers() {
        let dir = create_temp_project();
        init_board(&dir);

        cardboard(&dir)
            .args(["remove-card", "A"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Removed"));

        let board = stored_board(&dir);
        assert_eq!(stored_titles(&board, 0), vec!["B"]);

        cardboard(&dir)
            .arg("show")
            .assert()
            .success()
            .stdout(predicate::str::contains("0. B"));
    }

    #[test]
    fn test_remove_list_cascades() {
        let dir = create_temp_project();
        init_board(&dir);

        cardboard(&dir)
            .args(["remove-list", "Todo"])
            .assert()
            .success()
            .stdout(predicate::str::contains("2 card(s)"));

        let board = stored_board(&dir);
        assert_eq!(board["lists"].as_array().unwrap().len(), 1);
        assert_eq!(board["lists"][0]["title"], "Done");
    }

    #[test]
    fn test_rename_and_describe_persist() {
        let dir = create_temp_project();
        init_board(&dir);

        cardboard(&dir)
            .args(["rename", "A", "  Alpha  "])
            .assert()
            .success();
        cardboard(&dir)
            .args(["describe", "Alpha", "first letter"])
            .assert()
            .success();

        let board = stored_board(&dir);
        assert_eq!(board["lists"][0]["cards"][0]["title"], "Alpha");
        assert_eq!(board["lists"][0]["cards"][0]["description"], "first letter");
    }

    #[test]
    fn test_show_json() {
        let dir = create_temp_project();
        init_board(&dir);

        let output = cardboard(&dir).args(["show", "--json"]).output().unwrap();
        assert!(output.status.success());
        let board: Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(board["lists"][0]["cards"][0]["id"]["state"], "confirmed");
        assert_eq!(board["lists"][0]["cards"][0]["title"], "A");
    }
}

// =============================================================================
// Errors
// =============================================================================

mod errors {
    use super::*;

    #[test]
    fn test_unknown_list_fails() {
        let dir = create_temp_project();
        init_board(&dir);

        cardboard(&dir)
            .args(["add-card", "Backlog", "x"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No list matches 'Backlog'"));
    }

    #[test]
    fn test_blank_titles_rejected() {
        let dir = create_temp_project();
        init_board(&dir);

        cardboard(&dir)
            .args(["add-list", "   "])
            .assert()
            .failure()
            .stderr(predicate::str::contains("title must not be empty"));
        cardboard(&dir)
            .args(["rename", "A", ""])
            .assert()
            .failure()
            .stderr(predicate::str::contains("title must not be empty"));

        // nothing reached the board file
        let board = stored_board(&dir);
        assert_eq!(board["lists"].as_array().unwrap().len(), 2);
        assert_eq!(stored_titles(&board, 0), vec!["A", "B"]);
    }

    #[test]
    fn test_corrupt_board_file_fails() {
        let dir = create_temp_project();
        cardboard(&dir).arg("init").assert().success();
        fs::write(dir.path().join(".cardboard/board.json"), "{oops").unwrap();

        cardboard(&dir)
            .arg("show")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to load board"));
    }
}

// =============================================================================
// Validation
// =============================================================================

mod validation {
    use super::*;

    #[test]
    fn test_validate_consistent_board() {
        let dir = create_temp_project();
        init_board(&dir);

        cardboard(&dir)
            .arg("validate")
            .assert()
            .success()
            .stdout(predicate::str::contains("is consistent: 2 list(s), 2 card(s)"));
    }

    #[test]
    fn test_validate_reports_position_gaps() {
        let dir = create_temp_project();
        fs::create_dir_all(dir.path().join(".cardboard")).unwrap();
        fs::write(
            dir.path().join(".cardboard/board.json"),
            r#"{
  "board": {
    "id": "board-1",
    "title": "Gappy",
    "lists": [
      {
        "id": "srv-1",
        "title": "Todo",
        "position": 0,
        "cards": [
          { "id": "srv-2", "title": "a", "position": 0, "list_id": "srv-1" },
          { "id": "srv-3", "title": "b", "position": 5, "list_id": "srv-1" }
        ]
      }
    ]
  },
  "next_id": 4
}"#,
        )
        .unwrap();

        cardboard(&dir)
            .arg("validate")
            .assert()
            .failure()
            .stdout(predicate::str::contains("has position 5 but sits at index 1"))
            .stderr(predicate::str::contains("1 problem(s) found"));

        // loading through the store repairs the order on display
        cardboard(&dir)
            .arg("show")
            .assert()
            .success()
            .stdout(predicate::str::contains("1. b"));
    }
}

// =============================================================================
// Configuration
// =============================================================================

mod configuration {
    use super::*;

    #[test]
    fn test_config_show_defaults() {
        let dir = create_temp_project();
        cardboard(&dir)
            .arg("config")
            .assert()
            .success()
            .stdout(predicate::str::contains("No cardboard.toml found"))
            .stdout(predicate::str::contains("format = \"text\""));
    }

    #[test]
    fn test_config_validate_no_config() {
        let dir = create_temp_project();
        cardboard(&dir)
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Using defaults (valid)"));
    }

    #[test]
    fn test_config_validate_with_warnings() {
        let dir = create_temp_project();
        fs::create_dir_all(dir.path().join(".cardboard")).unwrap();
        fs::write(
            dir.path().join(".cardboard/cardboard.toml"),
            "[gateway]\ndata_file = \"board.txt\"\n",
        )
        .unwrap();

        cardboard(&dir)
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("does not end in .json"));
    }

    #[test]
    fn test_data_flag_overrides_config() {
        let dir = create_temp_project();
        cardboard(&dir).arg("init").assert().success();
        let other = dir.path().join("other.json");

        cardboard(&dir)
            .args(["add-list", "Elsewhere", "--data"])
            .arg(&other)
            .assert()
            .success();

        assert!(other.exists());
        assert!(stored_board(&dir)["lists"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_init_shows_data_file_outside_config_dir() {
        let dir = create_temp_project();
        let other = dir.path().join("shared.json");

        cardboard(&dir)
            .args(["init", "--data"])
            .arg(&other)
            .assert()
            .success()
            .stdout(predicate::str::contains("└── cardboard.toml"))
            .stdout(predicate::str::contains("└── shared.json").not())
            .stdout(predicate::str::contains(other.display().to_string()));

        assert!(other.exists());
        assert!(!dir.path().join(".cardboard/board.json").exists());
    }

    #[test]
    fn test_data_env_overrides_config() {
        let dir = create_temp_project();
        cardboard(&dir).arg("init").assert().success();

        cardboard(&dir)
            .env("CARDBOARD_DATA", "env.json")
            .args(["add-list", "FromEnv"])
            .assert()
            .success();

        let content = fs::read_to_string(dir.path().join(".cardboard/env.json")).unwrap();
        assert!(content.contains("FromEnv"));
    }

    #[test]
    fn test_verbose_logs_to_stderr() {
        let dir = create_temp_project();
        cardboard(&dir).arg("init").assert().success();

        cardboard(&dir)
            .args(["--verbose", "add-list", "Loud"])
            .assert()
            .success()
            .stderr(predicate::str::contains("draft list appended"))
            .stdout(predicate::str::contains("draft list appended").not());
    }
}
