//! Round Commands
//!
//! The closed set of actions a round can ask for, and the selector that
//! draws one per round.

use serde::{Deserialize, Serialize};

use crate::core::rng::{next_bounded, EntropySource};

/// Action players must perform during a round.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    /// Shake the block.
    #[default]
    Shake,
    /// Strike the block.
    Mine,
    /// Set the block down.
    Place,
}

impl Command {
    /// Every command, in draw order.
    pub const ALL: [Command; 3] = [Command::Shake, Command::Mine, Command::Place];

    /// Wire name of this command.
    pub fn as_str(self) -> &'static str {
        match self {
            Command::Shake => "SHAKE",
            Command::Mine => "MINE",
            Command::Place => "PLACE",
        }
    }
}

/// Picks the command for each round, uniformly over [`Command::ALL`].
pub struct CommandSelector;

impl CommandSelector {
    /// Draw the next command.
    pub fn draw<E: EntropySource + ?Sized>(source: &mut E) -> Command {
        let index = next_bounded(source, Command::ALL.len() as u32) as usize;
        Command::ALL[index]
    }
}
