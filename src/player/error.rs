use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error("No player executable found (looked for ffplay)")]
    PlayerNotFound,
    #[error("Failed to spawn player {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Player process {pid} could not be terminated: {source}")]
    Unkillable {
        pid: u32,
        #[source]
        source: std::io::Error,
    },
}
