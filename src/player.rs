/*!
 * Player control collaborator.
 *
 * The acquisition side only ever asks the player to load a subtitle file and
 * to select a subtitle track. Both calls are fire-and-forget: with no active
 * playback session they are dropped silently.
 */

use log::debug;
use std::fmt::Debug;
use std::fs::{File, OpenOptions};
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Commands the fetcher sends to a running player
pub trait PlayerControl: Send + Sync + Debug {
    /// Load an external subtitle file into the current session
    fn load_subtitle(&self, path: &Path);

    /// Make the subtitle at `index` the active one
    fn select_subtitle(&self, index: usize);
}

/// Player that drops every command, for runs without playback
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPlayer;

impl PlayerControl for NullPlayer {
    fn load_subtitle(&self, path: &Path) {
        debug!("No player session, not loading {:?}", path);
    }

    fn select_subtitle(&self, _index: usize) {}
}

/// Sends MPlayer slave-mode commands through a command FIFO
/// (the file given to the player's `-input file=` option)
#[derive(Debug)]
pub struct SlaveCommandPlayer {
    fifo: PathBuf,
    // Serializes writes so two commands never interleave.
    lock: Mutex<()>,
}

impl SlaveCommandPlayer {
    pub fn new(fifo: impl Into<PathBuf>) -> Self {
        Self { fifo: fifo.into(), lock: Mutex::new(()) }
    }

    /// Slave command that loads `path`
    pub fn load_command(path: &Path) -> String {
        let escaped = path.to_string_lossy().replace('\\', "\\\\").replace('"', "\\\"");
        format!("sub_load \"{}\"", escaped)
    }

    /// Slave command that selects subtitle file `index`
    pub fn select_command(index: usize) -> String {
        format!("sub_file {}", index)
    }

    fn send(&self, command: &str) {
        let _guard = self.lock.lock();
        // The FIFO exists only while a session is running.
        if !self.fifo.exists() {
            debug!("Player FIFO {:?} is gone, dropping '{}'", self.fifo, command);
            return;
        }
        let result = open_for_command(&self.fifo).and_then(|mut f| writeln!(f, "{}", command));
        match result {
            Ok(()) => {}
            Err(e) if is_no_reader(&e) => {
                debug!("No player reading {:?}, dropping '{}'", self.fifo, command);
            }
            Err(e) => debug!("Dropping player command '{}': {}", command, e),
        }
    }
}

// Never waits for a reader: a FIFO nobody has open fails with ENXIO.
#[cfg(unix)]
fn open_for_command(path: &Path) -> std::io::Result<File> {
    OpenOptions::new()
        .append(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
}

#[cfg(not(unix))]
fn open_for_command(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().append(true).open(path)
}

#[cfg(unix)]
fn is_no_reader(error: &std::io::Error) -> bool {
    error.raw_os_error() == Some(libc::ENXIO) || error.kind() == std::io::ErrorKind::WouldBlock
}

#[cfg(not(unix))]
fn is_no_reader(error: &std::io::Error) -> bool {
    error.kind() == std::io::ErrorKind::WouldBlock
}

impl PlayerControl for SlaveCommandPlayer {
    fn load_subtitle(&self, path: &Path) {
        self.send(&Self::load_command(path));
    }

    fn select_subtitle(&self, index: usize) {
        self.send(&Self::select_command(index));
    }
}
