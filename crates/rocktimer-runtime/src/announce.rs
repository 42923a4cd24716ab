//! Announcement consumers
//!
//! The coordinator emits announcements under its lock; the node hands them to
//! a bounded queue and this module drains it on its own task. A sink must
//! never block: speech is launched as a detached child process.

use std::process::Stdio;
use std::sync::Arc;

use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use rocktimer_state::Announcement;

use crate::SpeechConfig;

/// Announcement sender held by the node
pub type AnnouncementSender = mpsc::Sender<Announcement>;

/// Announcement receiver drained by [`spawn_announcer`]
pub type AnnouncementReceiver = mpsc::Receiver<Announcement>;

/// Downstream consumer of announcements
pub trait AnnouncementSink: Send + Sync {
    fn announce(&self, announcement: &Announcement);
}

/// Writes announcements to the log
#[derive(Clone, Copy, Debug, Default)]
pub struct LogAnnouncer;

impl AnnouncementSink for LogAnnouncer {
    fn announce(&self, announcement: &Announcement) {
        match announcement {
            Announcement::Armed => tracing::info!("system armed"),
            Announcement::FirstSplit { record_id, split_ms } => {
                tracing::info!(record = %record_id, split_ms, "tee to hog close")
            }
            Announcement::SecondSplit {
                record_id,
                split_ms,
                total_ms,
            } => {
                tracing::info!(record = ?record_id, split_ms, total_ms = ?total_ms, "hog to hog")
            }
        }
    }
}

/// Spoken phrase for a split: 3100 ms becomes "3 point 1 0".
/// Non-positive splits are not spoken.
pub fn speech_phrase(split_ms: f64) -> Option<String> {
    if !split_ms.is_finite() || split_ms <= 0.0 {
        return None;
    }

    let centis = (split_ms / 10.0).floor() as u64;
    let whole = centis / 100;
    let frac = centis % 100;
    Some(format!("{} point {} {}", whole, frac / 10, frac % 10))
}

/// Speaks splits through an external text-to-speech command
#[derive(Clone, Debug)]
pub struct SpeechAnnouncer {
    /// Program followed by its arguments; the phrase is appended last
    command: Vec<String>,
    announce_second_split: bool,
}

impl SpeechAnnouncer {
    pub fn new(command: Vec<String>, announce_second_split: bool) -> Self {
        SpeechAnnouncer {
            command,
            announce_second_split,
        }
    }

    /// Build from configuration; `None` when speech is disabled or no command is set
    pub fn from_config(config: &SpeechConfig) -> Option<Self> {
        if !config.enabled || config.command.is_empty() {
            return None;
        }
        Some(SpeechAnnouncer::new(
            config.command.clone(),
            config.announce_second_split,
        ))
    }

    /// Text to speak for an announcement, if any
    pub fn phrase_for(&self, announcement: &Announcement) -> Option<String> {
        match announcement {
            Announcement::Armed => None,
            Announcement::FirstSplit { split_ms, .. } => speech_phrase(*split_ms),
            Announcement::SecondSplit { split_ms, .. } if self.announce_second_split => {
                speech_phrase(*split_ms)
            }
            Announcement::SecondSplit { .. } => None,
        }
    }

    fn command_for(&self, text: &str) -> Option<Command> {
        let (program, args) = self.command.split_first()?;
        let mut command = Command::new(program);
        command
            .args(args)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(false);
        Some(command)
    }
}

impl AnnouncementSink for SpeechAnnouncer {
    fn announce(&self, announcement: &Announcement) {
        let Some(text) = self.phrase_for(announcement) else {
            return;
        };
        let Some(mut command) = self.command_for(&text) else {
            return;
        };

        match command.spawn() {
            Ok(_child) => tracing::debug!(%text, "speaking"),
            Err(e) => tracing::warn!("speech command failed: {}", e),
        }
    }
}

/// Bounded announcement channel
pub fn announcement_channel(capacity: usize) -> (AnnouncementSender, AnnouncementReceiver) {
    mpsc::channel(capacity)
}

/// Drain announcements into every sink until all senders are gone
pub fn spawn_announcer(
    mut rx: AnnouncementReceiver,
    sinks: Vec<Arc<dyn AnnouncementSink>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(announcement) = rx.recv().await {
            for sink in &sinks {
                sink.announce(&announcement);
            }
        }
        tracing::debug!("announcement queue closed");
    })
}
