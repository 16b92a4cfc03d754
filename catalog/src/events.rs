use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

use awbw_replay::ReplayInfo;

/// Notifications a presentation layer can react to.
#[derive(Clone, Debug, PartialEq)]
pub enum CatalogEvent {
    /// A replay id the catalog hadn't seen before was ingested.
    Added(ReplayInfo),

    /// A known replay was re-ingested or had usernames filled in.
    Changed(ReplayInfo),

    Removed(ReplayInfo),
}

impl CatalogEvent {
    pub fn info(&self) -> &ReplayInfo {
        match self {
            Self::Added(info) | Self::Changed(info) | Self::Removed(info) => info,
        }
    }
}

/// Fan-out of catalog events to any number of channel receivers. Receivers that
/// have been dropped are pruned on the next notification.
#[derive(Clone, Debug, Default)]
pub struct Subscribers(Arc<Mutex<Vec<Sender<CatalogEvent>>>>);

impl Subscribers {
    pub fn subscribe(&self) -> Receiver<CatalogEvent> {
        let (sender, receiver) = mpsc::channel();

        let mut senders = self.0.lock().expect("Unable to lock catalog subscribers");
        senders.push(sender);

        receiver
    }

    pub fn notify(&self, event: CatalogEvent) {
        let mut senders = self.0.lock().expect("Unable to lock catalog subscribers");
        senders.retain(|sender| sender.send(event.clone()).is_ok());
    }
}
