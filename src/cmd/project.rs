//! Project initialization: `cardboard init`.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};

use cardboard::board::{FileGateway, Gateway};
use cardboard::config::CardboardConfig;

pub async fn cmd_init(config: &CardboardConfig, title: Option<&str>) -> Result<()> {
    let config_file = config.config_file();
    let created = !config_file.exists();

    let board_title = title
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(config.board_title())
        .to_string();

    if created {
        std::fs::create_dir_all(&config.config_dir).with_context(|| {
            format!("Failed to create {}", config.config_dir.display())
        })?;
        let mut toml = config.toml.clone();
        toml.board.title = board_title.clone();
        toml.save(&config_file)?;
    }

    // first fetch writes the snapshot when it does not exist yet
    let data_file = config.data_file();
    let board = FileGateway::open(&data_file, &board_title)
        .fetch_board()
        .await
        .with_context(|| format!("Failed to open board file {}", data_file.display()))?;

    if created {
        println!(
            "Initialized cardboard project at {}",
            config.config_dir.display()
        );
        println!();
        println!("Created:");
        println!("  .cardboard/");
        match relative_to(&config.config_dir, &data_file) {
            Some(relative) => {
                println!("  ├── cardboard.toml   # Board title, data file, logging");
                println!("  └── {}", relative.display());
            }
            None => {
                println!("  └── cardboard.toml   # Board title, data file, logging");
                println!("  {}", data_file.display());
            }
        }
        println!();
        println!("Next steps:");
        println!("  1. Run `cardboard add-list <title>` to add a column");
        println!("  2. Run `cardboard add-card <list> <title>` to add cards");
        println!("  3. Run `cardboard show` to see the board");
    } else {
        println!(
            "Cardboard project already initialized at {}",
            config.config_dir.display()
        );
    }
    println!(
        "Board '{}' with {} list(s) in {}",
        board.title.unwrap_or_default(),
        board.lists.len(),
        data_file.display()
    );

    Ok(())
}

/// `path` relative to `dir`, when it lies inside it.
fn relative_to(dir: &Path, path: &Path) -> Option<PathBuf> {
    let relative = path.strip_prefix(dir).ok()?;
    relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
        .then(|| relative.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_to_only_accepts_paths_inside() {
        let dir = Path::new("/work/.cardboard");
        assert_eq!(
            relative_to(dir, Path::new("/work/.cardboard/board.json")),
            Some(PathBuf::from("board.json"))
        );
        assert_eq!(
            relative_to(dir, Path::new("/work/.cardboard/data/board.json")),
            Some(PathBuf::from("data/board.json"))
        );
        assert_eq!(relative_to(dir, Path::new("/work/board.json")), None);
        assert_eq!(relative_to(dir, Path::new("/work/.cardboard/../board.json")), None);
    }
}
