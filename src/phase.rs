/// Top-level game phases and the stage counter type.
use bevy::prelude::*;
use strum::{AsRefStr, Display};

/// Mirrors `GameStore::phase` so plugins can gate systems with `in_state`.
/// The store stays authoritative; `sync_phase` copies it across each frame.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, States, Display, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum GamePhase {
    #[default]
    Menu,
    Playing,
    LevelComplete,
    GameOver,
}

/// Stage 1 is the crate puzzle, stage 2 the date proposal.
pub type Stage = u32;

pub const FIRST_STAGE: Stage = 1;
pub const PROPOSAL_STAGE: Stage = 2;
