use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Gentle,
    Motivational,
    Sarcastic,
}

impl Default for Tone {
    fn default() -> Self {
        Tone::Gentle
    }
}

impl Tone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Gentle => "gentle",
            Tone::Motivational => "motivational",
            Tone::Sarcastic => "sarcastic",
        }
    }

    /// Unknown ids fall back to the default tone.
    pub fn from_id(id: &str) -> Tone {
        match id.trim().to_ascii_lowercase().as_str() {
            "motivational" => Tone::Motivational,
            "sarcastic" => Tone::Sarcastic,
            _ => Tone::Gentle,
        }
    }

    pub fn messages(&self) -> &'static [&'static str] {
        match self {
            Tone::Sarcastic => SARCASTIC,
            Tone::Motivational => MOTIVATIONAL,
            Tone::Gentle => GENTLE,
        }
    }
}

const SARCASTIC: &[&str] = &[
    "Bold of you to call this \"networking.\"",
    "You've been marinating in the feed. Want to do the thing you came for?",
    "Your future self just cleared their throat.",
    "If scrolling paid bills, you'd be a billionaire.",
];

const MOTIVATIONAL: &[&str] = &[
    "Quick reset: what's the one thing you want to finish next?",
    "Small step now. Big relief later.",
    "Choose progress for 5 minutes. Just 5.",
];

const GENTLE: &[&str] = &[
    "Tiny nudge: do you want to stay here a bit longer?",
    "If this isn't serving you, it's okay to step away.",
];

pub fn pick_message_with<R: Rng + ?Sized>(tone: Tone, rng: &mut R) -> &'static str {
    let pool = tone.messages();
    pool.choose(rng).copied().unwrap_or(GENTLE[0])
}

/// Uniform pick from the tone's pool using the thread RNG.
pub fn pick_message(tone_id: &str) -> &'static str {
    pick_message_with(Tone::from_id(tone_id), &mut rand::thread_rng())
}
