//! Keyword intents for `voice:command` transcripts.

use crate::protocol::Command;
use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Intent {
    Random,
    Dim,
    Brighten,
    Pause,
    Divine,
}

const INTENT_PATTERNS: &[(&str, Intent)] = &[
    (r"(?i)\b(random|next|another|surprise)\b", Intent::Random),
    (r"(?i)\b(dim|darker|darken)\b", Intent::Dim),
    (r"(?i)\b(bright|brighten|brighter|lighter)\b", Intent::Brighten),
    (r"(?i)\b(pause|resume|stop|continue)\b", Intent::Pause),
    (r"(?i)\b(oracle|divine|fortune|omen)\b", Intent::Divine),
];

fn patterns() -> &'static [(Regex, Intent)] {
    static PATTERNS: OnceLock<Vec<(Regex, Intent)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        INTENT_PATTERNS
            .iter()
            .filter_map(|(pattern, intent)| Regex::new(pattern).ok().map(|re| (re, *intent)))
            .collect()
    })
}

/// Maps a transcript to the command it asks for. The first matching intent
/// wins; anything unrecognised is whispered to the oracle verbatim.
pub fn interpret(text: &str) -> Command {
    let intent = patterns()
        .iter()
        .find(|(re, _)| re.is_match(text))
        .map(|(_, intent)| *intent);

    match intent {
        Some(Intent::Random) => Command::NavigateRandom,
        Some(Intent::Dim) => Command::Dim,
        Some(Intent::Brighten) => Command::Brighten,
        Some(Intent::Pause) => Command::Pause,
        Some(Intent::Divine) => Command::Divine { location: None },
        None => Command::Whisper {
            message: text.trim().to_string(),
        },
    }
}
