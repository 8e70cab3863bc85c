//! Celebratory chat effects.
//!
//! A message triggers an effect either through its msgtype or by containing
//! one of the effect's emoji.

use serde::{Deserialize, Serialize};

use crate::event::{EventKind, TimelineEvent};

/// A full-screen chat effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatEffect {
    /// Confetti
    Confetti,
    /// Fireworks
    Fireworks,
    /// Rain
    Rainfall,
    /// Snow
    Snowfall,
    /// Space invaders
    SpaceInvaders,
    /// Hearts
    Hearts,
}

impl ChatEffect {
    /// Every effect, in dispatch order.
    pub const ALL: [Self; 6] =
        [Self::Confetti, Self::Fireworks, Self::Rainfall, Self::Snowfall, Self::SpaceInvaders, Self::Hearts];

    /// Emoji that trigger the effect.
    pub fn emojis(self) -> &'static [&'static str] {
        match self {
            Self::Confetti => &["🎊", "🎉"],
            Self::Fireworks => &["🎆"],
            Self::Rainfall => &["🌧️", "⛈️", "🌦️"],
            Self::Snowfall => &["❄", "🌨", "☃", "⛄"],
            Self::SpaceInvaders => &["👾"],
            Self::Hearts => &["💝"],
        }
    }

    /// Custom msgtype that triggers the effect.
    pub fn msgtype(self) -> &'static str {
        match self {
            Self::Confetti => "nic.custom.confetti",
            Self::Fireworks => "nic.custom.fireworks",
            Self::Rainfall => "io.element.effect.rainfall",
            Self::Snowfall => "io.element.effect.snowfall",
            Self::SpaceInvaders => "io.element.effects.space_invaders",
            Self::Hearts => "io.element.effect.hearts",
        }
    }

    /// Whether `event` triggers this effect.
    pub fn matches(self, event: &TimelineEvent) -> bool {
        let EventKind::Message { msgtype, body } = &event.kind else {
            return false;
        };
        msgtype == self.msgtype() || self.emojis().iter().any(|emoji| body.contains(emoji))
    }

    /// Every effect triggered by `event`.
    pub fn triggered_by(event: &TimelineEvent) -> Vec<Self> {
        Self::ALL.into_iter().filter(|effect| effect.matches(event)).collect()
    }
}
