//! Reads a seed file, normalizes each line, and pushes it onto the
//! Frontier with an empty referrer.

use std::path::Path;

use thiserror::Error;

use crate::frontier::Frontier;
use crate::normalize::normalize;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to read seeds file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("no seed in {path} normalized successfully")]
    NoSeeds { path: String },
}

pub fn load_seeds(path: impl AsRef<Path>, frontier: &Frontier) -> Result<(), SeedError> {
    let path_ref = path.as_ref();
    let path_display = path_ref.display().to_string();
    tracing::info!(path = %path_display, "loading seeds");

    let text = std::fs::read_to_string(path_ref).map_err(|source| SeedError::Read {
        path: path_display.clone(),
        source,
    })?;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match normalize(line) {
            Ok(normalized) => frontier.push(&normalized, line, ""),
            Err(err) => tracing::warn!(seed = %line, error = %err, "couldn't normalize seed"),
        }
    }

    if frontier.is_empty() {
        return Err(SeedError::NoSeeds { path: path_display });
    }

    tracing::info!(count = frontier.len(), "loaded seeds");
    Ok(())
}
