//! Board commands: `show`, `add-list`, `add-card`, `move`, `remove-*`,
//! `rename`, `describe`, `validate`.
//!
//! Every command opens the configured `FileGateway`, hydrates an
//! `OptimisticStore`, performs one operation and prints the result.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use console::style;

use cardboard::board::remote::CardPatch;
use cardboard::board::{Board, Card, EntityFactory, EntityRef, FileGateway, Gateway, OptimisticStore};
use cardboard::config::CardboardConfig;
use cardboard::errors::StoreError;

async fn open_store(config: &CardboardConfig) -> Result<OptimisticStore> {
    let data_file = config.data_file();
    let gateway = FileGateway::open(&data_file, config.board_title());
    OptimisticStore::load(Arc::new(gateway))
        .await
        .with_context(|| format!("Failed to load board from {}", data_file.display()))
}

/// Match a list by id, 1-based number, or case-insensitive title.
fn resolve_list(board: &Board, selector: &str) -> Result<EntityRef> {
    if let Some(list) = board.lists.iter().find(|l| l.id.as_str() == selector) {
        return Ok(list.id.clone());
    }
    if let Ok(n) = selector.parse::<usize>()
        && (1..=board.lists.len()).contains(&n)
    {
        return Ok(board.lists[n - 1].id.clone());
    }
    let matches: Vec<_> = board
        .lists
        .iter()
        .filter(|l| l.title.eq_ignore_ascii_case(selector.trim()))
        .collect();
    match matches.as_slice() {
        [list] => Ok(list.id.clone()),
        [] => bail!("No list matches '{}'", selector),
        _ => bail!(
            "'{}' matches {} lists; use the list id instead",
            selector,
            matches.len()
        ),
    }
}

/// Card location as `(list id, index in list, card)`, matched by id or
/// case-insensitive title.
fn resolve_card<'a>(board: &'a Board, selector: &str) -> Result<(EntityRef, usize, &'a Card)> {
    let mut matches = Vec::new();
    for list in &board.lists {
        for (index, card) in list.cards.iter().enumerate() {
            if card.id.as_str() == selector {
                return Ok((list.id.clone(), index, card));
            }
            if card.title.eq_ignore_ascii_case(selector.trim()) {
                matches.push((list.id.clone(), index, card));
            }
        }
    }
    match matches.len() {
        1 => Ok(matches.remove(0)),
        0 => bail!("No card matches '{}'", selector),
        n => bail!("'{}' matches {} cards; use the card id instead", selector, n),
    }
}

/// Write local title/description edits through to the gateway.
async fn persist_card(store: &OptimisticStore, card: &Card, patch: CardPatch) -> Result<()> {
    let Some(id) = card.id.as_remote() else {
        bail!("Card {} has not been saved yet", card.id);
    };
    store
        .gateway()
        .update_card(id, patch)
        .await
        .with_context(|| format!("Failed to save card {}", card.id))?;
    Ok(())
}

fn render_board(board: &Board) {
    println!();
    println!(
        "{} {}",
        style(&board.title).bold(),
        style(format!("({})", board.id)).dim()
    );
    if board.lists.is_empty() {
        println!(
            "  {}",
            style("No lists yet. Add one with `cardboard add-list <title>`.").dim()
        );
    }
    for (i, list) in board.lists.iter().enumerate() {
        println!();
        println!(
            "  {} {} {}",
            style(format!("[{}]", i + 1)).cyan(),
            style(&list.title).bold(),
            style(format!("{} · {} card(s)", list.id, list.cards.len())).dim()
        );
        for card in &list.cards {
            println!(
                "    {}. {} {}",
                card.position,
                card.title,
                style(card.id.as_str()).dim()
            );
            if !card.description.is_empty() {
                println!("       {}", style(&card.description).dim());
            }
        }
    }
    println!();
}

pub async fn cmd_show(config: &CardboardConfig, json: bool) -> Result<()> {
    let board = open_store(config).await?.snapshot()?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&board).context("Failed to serialize board")?
        );
    } else {
        render_board(&board);
    }
    Ok(())
}

pub async fn cmd_add_list(config: &CardboardConfig, title: &str) -> Result<()> {
    let store = open_store(config).await?;
    let list = store.create_list(title).await?;
    println!(
        "{} list {} {}",
        style("Added").green(),
        style(&list.title).bold(),
        style(list.id.as_str()).dim()
    );
    render_board(&store.snapshot()?);
    Ok(())
}

pub async fn cmd_add_card(
    config: &CardboardConfig,
    list: &str,
    title: &str,
    description: Option<&str>,
) -> Result<()> {
    let store = open_store(config).await?;
    let list_id = resolve_list(&store.snapshot()?, list)?;
    let Some(mut card) = store.create_card(&list_id, title).await? else {
        bail!("List {} disappeared before the card was added", list_id);
    };

    if let Some(text) = description {
        if let Some(updated) = store.update_card_description(&card.id, text)? {
            card = updated;
        }
        persist_card(
            &store,
            &card,
            CardPatch {
                description: Some(card.description.clone()),
                ..CardPatch::default()
            },
        )
        .await?;
    }

    println!(
        "{} card {} {}",
        style("Added").green(),
        style(&card.title).bold(),
        style(card.id.as_str()).dim()
    );
    render_board(&store.snapshot()?);
    Ok(())
}

pub async fn cmd_move(
    config: &CardboardConfig,
    card: &str,
    to: &str,
    index: Option<usize>,
) -> Result<()> {
    let store = open_store(config).await?;
    let board = store.snapshot()?;
    let (from, card_index, found) = resolve_card(&board, card)?;
    let to = resolve_list(&board, to)?;
    let title = found.title.clone();

    match store.move_card(&from, &to, card_index, index).await {
        Ok(Some(report)) => {
            println!(
                "{} {} to position {} ({} update(s) saved)",
                style("Moved").green(),
                style(&report.card.title).bold(),
                report.card.position,
                report.updates_sent
            );
        }
        Ok(None) => bail!("Card '{}' could not be moved", title),
        Err(err @ StoreError::PartialMove { .. }) => {
            eprintln!(
                "{} {}",
                style("warning:").yellow().bold(),
                "the board file may not match the order shown below"
            );
            render_board(&store.snapshot()?);
            return Err(err.into());
        }
        Err(err) => return Err(err.into()),
    }
    render_board(&store.snapshot()?);
    Ok(())
}

pub async fn cmd_remove_list(config: &CardboardConfig, list: &str) -> Result<()> {
    let store = open_store(config).await?;
    let board = store.snapshot()?;
    let list_id = resolve_list(&board, list)?;
    let cards = board.list(&list_id).map_or(0, |l| l.cards.len());

    if !store.remove_list(&list_id).await? {
        bail!("List {} was not found", list_id);
    }
    println!(
        "{} list {} and {} card(s)",
        style("Removed").red(),
        style(list_id.as_str()).bold(),
        cards
    );
    render_board(&store.snapshot()?);
    Ok(())
}

pub async fn cmd_remove_card(config: &CardboardConfig, card: &str) -> Result<()> {
    let store = open_store(config).await?;
    let board = store.snapshot()?;
    let (list_id, _, found) = resolve_card(&board, card)?;

    if !store.remove_card(&list_id, &found.id).await? {
        bail!("Card {} was not found", found.id);
    }
    println!(
        "{} card {}",
        style("Removed").red(),
        style(&found.title).bold()
    );
    render_board(&store.snapshot()?);
    Ok(())
}

pub async fn cmd_rename(config: &CardboardConfig, card: &str, title: &str) -> Result<()> {
    let store = open_store(config).await?;
    let board = store.snapshot()?;
    let (_, _, found) = resolve_card(&board, card)?;

    let Some(updated) = store.update_card_title(&found.id, title)? else {
        bail!("Card {} was not found", found.id);
    };
    persist_card(
        &store,
        &updated,
        CardPatch {
            title: Some(updated.title.clone()),
            ..CardPatch::default()
        },
    )
    .await?;
    println!(
        "{} {} → {}",
        style("Renamed").green(),
        found.title,
        style(&updated.title).bold()
    );
    Ok(())
}

pub async fn cmd_describe(config: &CardboardConfig, card: &str, text: &str) -> Result<()> {
    let store = open_store(config).await?;
    let board = store.snapshot()?;
    let (_, _, found) = resolve_card(&board, card)?;

    let Some(updated) = store.update_card_description(&found.id, text)? else {
        bail!("Card {} was not found", found.id);
    };
    persist_card(
        &store,
        &updated,
        CardPatch {
            description: Some(updated.description.clone()),
            ..CardPatch::default()
        },
    )
    .await?;
    println!(
        "{} description of {}",
        style("Updated").green(),
        style(&updated.title).bold()
    );
    Ok(())
}

/// Checks the board as stored, before the store renumbers anything.
pub async fn cmd_validate(config: &CardboardConfig) -> Result<()> {
    let data_file = config.data_file();
    let raw = FileGateway::open(&data_file, config.board_title())
        .fetch_board()
        .await
        .with_context(|| format!("Failed to read board from {}", data_file.display()))?;
    let mut board = EntityFactory::board_from_remote(raw)?;
    board.lists.sort_by_key(|l| l.position);
    for list in &mut board.lists {
        list.cards.sort_by_key(|c| c.position);
    }

    let problems = board.check_invariants();
    if problems.is_empty() {
        println!(
            "Board '{}' is consistent: {} list(s), {} card(s).",
            board.title,
            board.lists.len(),
            board.card_count()
        );
        return Ok(());
    }

    println!("Board problems:");
    for problem in &problems {
        println!("  - {}", problem);
    }
    bail!("{} problem(s) found in {}", problems.len(), data_file.display())
}
