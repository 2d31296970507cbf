//! Backing player detection, spawning and signalling.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use crate::player::PlaybackError;

/// ffplay shipped next to the executable by the release bundle.
pub const BUNDLED_FFPLAY: &str = "./ffmpeg-master-latest-linux64-gpl/bin/ffplay";

/// Program plus fixed leading arguments; the track path is appended last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl PlayerCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Headless single-shot playback: no video window, exit at end of
    /// stream, no console output.
    pub fn ffplay(program: impl Into<PathBuf>) -> Self {
        Self::new(program).with_args(["-nodisp", "-autoexit", "-loglevel", "quiet"])
    }

    /// Resolve the ffplay binary. A configured path is taken as-is so that a
    /// bad setting surfaces as a spawn error instead of silently falling back.
    pub fn locate(configured: Option<&Path>) -> Result<Self, PlaybackError> {
        if let Some(path) = configured {
            return Ok(Self::ffplay(path));
        }

        let bundled = PathBuf::from(BUNDLED_FFPLAY);
        if bundled.exists() {
            return Ok(Self::ffplay(bundled));
        }

        match which::which("ffplay") {
            Ok(path) => Ok(Self::ffplay(path)),
            Err(e) => {
                log::warn!("ffplay not found on PATH: {}", e);
                Err(PlaybackError::PlayerNotFound)
            }
        }
    }

    fn build(&self, file: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(file)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        cmd
    }
}

/// A live child process running the backing player.
///
/// Signals are only delivered while the child has not been reaped, so a
/// recycled pid can never be hit.
#[derive(Debug)]
pub struct PlayerProcess {
    child: Child,
    reaped: bool,
}

impl PlayerProcess {
    pub fn spawn(command: &PlayerCommand, file: &Path) -> Result<Self, PlaybackError> {
        let child = command.build(file).spawn().map_err(|source| PlaybackError::Spawn {
            program: command.program.clone(),
            source,
        })?;

        Ok(Self {
            child,
            reaped: false,
        })
    }

    pub fn id(&self) -> u32 {
        self.child.id()
    }

    pub fn suspend(&self) -> io::Result<()> {
        self.signal(sys::SUSPEND)
    }

    pub fn resume(&self) -> io::Result<()> {
        self.signal(sys::CONTINUE)
    }

    /// Ask the player to exit. A suspended process is continued afterwards so
    /// it can act on the request.
    pub fn request_terminate(&self) -> io::Result<()> {
        self.signal(sys::TERMINATE)?;
        let _ = self.signal(sys::CONTINUE);
        Ok(())
    }

    pub fn force_kill(&mut self) -> io::Result<()> {
        if self.reaped {
            return Ok(());
        }
        self.child.kill()
    }

    /// Non-blocking exit check. Reaps the child when it has exited.
    pub fn try_exit(&mut self) -> io::Result<Option<ExitStatus>> {
        let status = self.child.try_wait()?;
        if status.is_some() {
            self.reaped = true;
        }
        Ok(status)
    }

    /// Block until the OS reports the child as reaped.
    pub fn wait(&mut self) -> io::Result<ExitStatus> {
        let status = self.child.wait()?;
        self.reaped = true;
        Ok(status)
    }

    pub fn is_reaped(&self) -> bool {
        self.reaped
    }

    /// Signal-0 probe. Never reaps, so an exited but unreaped child still
    /// reports `true` until the monitor collects it.
    pub fn is_signalable(&self) -> bool {
        !self.reaped && sys::probe(self.id())
    }

    fn signal(&self, signal: sys::Signal) -> io::Result<()> {
        if self.reaped {
            return Err(io::Error::new(io::ErrorKind::NotFound, "player process already reaped"));
        }
        sys::send(self.id(), signal)
    }
}

#[cfg(unix)]
mod sys {
    use std::io;

    pub type Signal = libc::c_int;

    pub const SUSPEND: Signal = libc::SIGSTOP;
    pub const CONTINUE: Signal = libc::SIGCONT;
    pub const TERMINATE: Signal = libc::SIGTERM;

    pub fn send(pid: u32, signal: Signal) -> io::Result<()> {
        // SAFETY: kill(2) has no memory-safety preconditions.
        let rc = unsafe { libc::kill(pid as libc::pid_t, signal) };
        if rc == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    pub fn probe(pid: u32) -> bool {
        send(pid, 0).is_ok()
    }
}

#[cfg(not(unix))]
mod sys {
    use std::io;

    pub type Signal = i32;

    pub const SUSPEND: Signal = 19;
    pub const CONTINUE: Signal = 18;
    pub const TERMINATE: Signal = 15;

    pub fn send(_pid: u32, _signal: Signal) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "process signals are only available on unix",
        ))
    }

    pub fn probe(_pid: u32) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ffplay_arguments_are_headless() {
        let command = PlayerCommand::ffplay("/usr/bin/ffplay");
        assert_eq!(command.program, PathBuf::from("/usr/bin/ffplay"));
        assert_eq!(command.args, vec!["-nodisp", "-autoexit", "-loglevel", "quiet"]);
    }

    #[test]
    fn test_configured_player_is_used_verbatim() {
        let command = PlayerCommand::locate(Some(Path::new("/nonexistent/ffplay"))).unwrap();
        assert_eq!(command.program, PathBuf::from("/nonexistent/ffplay"));
    }

    #[test]
    fn test_file_is_last_argument() {
        let command = PlayerCommand::new("echo").with_args(["-n"]);
        let built = command.build(Path::new("song.mp3"));
        let args: Vec<_> = built.get_args().collect();
        assert_eq!(args, vec!["-n", "song.mp3"]);
    }

    #[test]
    fn test_spawn_missing_binary_fails() {
        let command = PlayerCommand::new("/nonexistent/definitely-not-a-player");
        let result = PlayerProcess::spawn(&command, Path::new("track.mp3"));
        assert!(matches!(result, Err(PlaybackError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_signals_rejected_after_reap() {
        let mut process = PlayerProcess::spawn(&PlayerCommand::new("true"), Path::new("")).unwrap();
        process.wait().unwrap();
        assert!(process.is_reaped());
        assert!(!process.is_signalable());
        assert!(process.suspend().is_err());
        assert!(process.force_kill().is_ok());
    }
}
