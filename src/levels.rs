use std::fs;
use std::io;
use std::path::Path;

use thiserror::Error;

use crate::engine::Engine;

/// Error type for level parsing operations.
#[derive(Debug, Error)]
pub enum LevelError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid level {index}: {reason}")]
    InvalidLevel { index: usize, reason: String },
}

/// A collection of Sokoban levels in XSB format.
#[derive(Debug)]
pub struct Levels {
    levels: Vec<Engine>,
}

impl Levels {
    /// Parse XSB-formatted Sokoban levels from a string.
    ///
    /// The XSB format uses:
    /// - Lines starting with `;` as level separators/comments
    /// - Standard Sokoban characters (#, @, $, ., *, +, space)
    /// - Empty lines between levels (optional)
    pub fn from_text(contents: &str) -> Result<Self, LevelError> {
        let mut levels = Vec::new();
        let mut current_level = String::new();

        for line in contents.lines() {
            let line = line.trim_end_matches('\r');
            if line.trim_start().starts_with(';') || line.trim().is_empty() {
                Self::flush(&mut current_level, &mut levels)?;
                continue;
            }
            current_level.push_str(line);
            current_level.push('\n');
        }
        Self::flush(&mut current_level, &mut levels)?;

        Ok(Levels { levels })
    }

    /// Parse XSB-formatted Sokoban levels from a text file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LevelError> {
        let contents = fs::read_to_string(path)?;
        Self::from_text(&contents)
    }

    fn flush(current_level: &mut String, levels: &mut Vec<Engine>) -> Result<(), LevelError> {
        if current_level.is_empty() {
            return Ok(());
        }
        let engine =
            Engine::from_text(current_level.trim_end()).map_err(|reason| LevelError::InvalidLevel {
                index: levels.len() + 1,
                reason,
            })?;
        levels.push(engine);
        current_level.clear();
        Ok(())
    }

    /// Get the nth level (0-indexed).
    pub fn get(&self, index: usize) -> Option<&Engine> {
        self.levels.get(index)
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}
