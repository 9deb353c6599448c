//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module    | Commands handled                                          |
//! |-----------|-----------------------------------------------------------|
//! | `project` | `Init`                                                    |
//! | `board`   | `Show`, `AddList`, `AddCard`, `Move`, `RemoveList`,       |
//! |           | `RemoveCard`, `Rename`, `Describe`, `Validate`            |
//! | `config`  | `Config`                                                  |

pub mod board;
pub mod config;
pub mod project;

pub use board::{
    cmd_add_card, cmd_add_list, cmd_describe, cmd_move, cmd_remove_card, cmd_remove_list,
    cmd_rename, cmd_show, cmd_validate,
};
pub use config::cmd_config;
pub use project::cmd_init;
