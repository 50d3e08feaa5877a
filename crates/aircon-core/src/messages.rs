//! Per-device inbox.
//!
//! Every inbound channel (commands, shadow deltas, job notifications) and
//! every scheduled continuation lands in one bounded queue that only the
//! device's runner drains. The runner applies messages one at a time, so a
//! message and a tick never observe each other's half-applied state.

use tokio::sync::mpsc;

use crate::jobs::Job;

/// Default inbox capacity.
pub const DEFAULT_INBOX_CAPACITY: usize = 64;

/// A message waiting to be applied to a device.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Raw payload from the command topic.
    Command(Vec<u8>),
    /// Raw payload from the shadow delta topic.
    ShadowDelta(Vec<u8>),
    /// Raw payload from the jobs notify topic.
    JobsNotify(Vec<u8>),
    /// A job whose settle delay has elapsed.
    JobSettled(Job),
}

impl Inbound {
    /// Short channel name for logging.
    pub fn channel(&self) -> &'static str {
        match self {
            Inbound::Command(_) => "command",
            Inbound::ShadowDelta(_) => "shadow delta",
            Inbound::JobsNotify(_) => "jobs notify",
            Inbound::JobSettled(_) => "job settle",
        }
    }
}

/// Sender half handed to transports and to scheduled continuations.
pub type InboxSender = mpsc::Sender<Inbound>;

/// Receiving end of a device inbox, together with a sender the runner keeps
/// for scheduling its own continuations.
#[derive(Debug)]
pub struct Inbox {
    tx: InboxSender,
    rx: mpsc::Receiver<Inbound>,
}

impl Inbox {
    /// Create an inbox with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self { tx, rx }
    }

    /// A new sender into this inbox.
    pub fn sender(&self) -> InboxSender {
        self.tx.clone()
    }

    pub(crate) fn into_parts(self) -> (InboxSender, mpsc::Receiver<Inbound>) {
        (self.tx, self.rx)
    }
}

impl Default for Inbox {
    fn default() -> Self {
        Self::new(DEFAULT_INBOX_CAPACITY)
    }
}
