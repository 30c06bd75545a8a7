use std::collections::VecDeque;

use forge_core::sim::SimulatedGame;
use thiserror::Error;

/// The chat window the loop talks to: reading the transcript and typing
/// slash-commands into it.
pub trait ChatSurface {
    /// Full current transcript. Idempotent snapshot of an append-only log.
    fn read_transcript(&mut self) -> Result<String, SurfaceError>;

    /// Send a slash-command. Fire-and-forget: no reply is consumed.
    fn issue_command(&mut self, command: &str) -> Result<(), SurfaceError>;
}

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("surface is not configured: {0}")]
    Unavailable(String),
    #[error("failed to spawn bridge process: {0}")]
    Spawn(String),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("non-zero exit status: {0}")]
    Status(String),
}

impl ChatSurface for SimulatedGame {
    fn read_transcript(&mut self) -> Result<String, SurfaceError> {
        Ok(self.read())
    }

    fn issue_command(&mut self, command: &str) -> Result<(), SurfaceError> {
        self.submit(command);
        Ok(())
    }
}

/// Plays back captured transcript snapshots in order, holding on the last one.
/// Issued commands are kept for inspection.
#[derive(Debug, Default)]
pub struct ReplaySurface {
    snapshots: VecDeque<String>,
    last: Option<String>,
    reads: usize,
    commands: Vec<String>,
}

impl ReplaySurface {
    pub fn new<I, S>(snapshots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            snapshots: snapshots.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn reads(&self) -> usize {
        self.reads
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }
}

impl ChatSurface for ReplaySurface {
    fn read_transcript(&mut self) -> Result<String, SurfaceError> {
        self.reads += 1;
        if let Some(next) = self.snapshots.pop_front() {
            self.last = Some(next);
        }
        self.last
            .clone()
            .ok_or_else(|| SurfaceError::Unavailable("no transcript captured".to_string()))
    }

    fn issue_command(&mut self, command: &str) -> Result<(), SurfaceError> {
        self.commands.push(command.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_holds_last_snapshot() {
        let mut surface = ReplaySurface::new(["a", "b"]);
        assert_eq!(surface.read_transcript().unwrap(), "a");
        assert_eq!(surface.read_transcript().unwrap(), "b");
        assert_eq!(surface.read_transcript().unwrap(), "b");
        assert_eq!(surface.reads(), 3);
    }

    #[test]
    fn empty_replay_reports_unavailable() {
        let mut surface = ReplaySurface::new(Vec::<String>::new());
        assert!(matches!(
            surface.read_transcript(),
            Err(SurfaceError::Unavailable(_))
        ));
    }

    #[test]
    fn replay_records_commands() {
        let mut surface = ReplaySurface::default();
        surface.issue_command("/강화").unwrap();
        assert_eq!(surface.commands(), ["/강화".to_string()]);
    }
}
