use crate::Dataset;
use crate::codec::vocab::{Event, Token};
use anyhow::{Result, bail};

pub fn parse_dataset(s: &str) -> Result<Dataset> {
    match s.to_lowercase().as_str() {
        "m" | "maestro" => Ok(Dataset::Maestro),
        "g" | "giant" | "giantmidi" | "giant-midi" => Ok(Dataset::Giant),
        other => bail!("Unknown dataset '{}', expected `maestro` or `giant`..!", other),
    }
}

/// Human-readable rendering of a token sequence, one event per entry.
pub fn describe_tokens(tokens: &[Token]) -> Vec<String> {
    tokens
        .iter()
        .map(|&t| match Event::from_token(t) {
            Ok(event) => format!("{}={}", event.kind(), event.value()),
            Err(e) => format!("<{}>", e),
        })
        .collect()
}
