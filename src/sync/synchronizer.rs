//! Synchronizer core: the two state trees plus the protocol state machine
//!
//! Everything here runs inside one actor turn. Timers are represented as
//! deadlines the actor waits on; the core only arms and clears them.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use super::applier::apply_change;
use super::{SyncSettings, UiCallback, UiEvent};
use crate::connection::ConnectionStatus;
use crate::protocol::inbound::MSG_STATE_UPDATE;
use crate::protocol::{decode, split_message, InboundMessage, PluginCommand, StateKind, StateUpdate};
use crate::state::{Document, VolatileSnapshot};

/// Owns the synchronized state and reacts to inbound frames
pub struct Synchronizer {
    settings: SyncSettings,
    /// Full state; `None` until the first `/full_state` arrives
    state: Option<Document>,
    volatile_state: Option<Document>,
    /// Outbound text channel of the live connection
    outbox: Option<mpsc::UnboundedSender<String>>,
    subscribers: Vec<UiCallback>,
    status: Arc<RwLock<ConnectionStatus>>,
    resync_deadline: Option<Instant>,
    last_update_id: Option<i64>,
    update_gaps: u64,
    updates_applied: u64,
}

impl Synchronizer {
    pub fn new(settings: SyncSettings) -> Self {
        Self {
            settings,
            state: None,
            volatile_state: None,
            outbox: None,
            subscribers: Vec::new(),
            status: Arc::new(RwLock::new(ConnectionStatus::Disconnected)),
            resync_deadline: None,
            last_update_id: None,
            update_gaps: 0,
            updates_applied: 0,
        }
    }

    /// The full state, if one was received
    pub fn state(&self) -> Option<&Document> {
        self.state.as_ref()
    }

    pub fn volatile_state(&self) -> Option<&Document> {
        self.volatile_state.as_ref()
    }

    /// Typed view of the latest volatile state
    pub fn volatile_snapshot(&self) -> Option<VolatileSnapshot> {
        self.volatile_state()
            .and_then(VolatileSnapshot::from_document)
    }

    pub fn subscribe(&mut self, callback: UiCallback) {
        self.subscribers.push(callback);
        debug!(subscribers = self.subscribers.len(), "UI subscriber added");
    }

    /// Shared status cell; the synchronizer is its only writer
    pub fn status_cell(&self) -> Arc<RwLock<ConnectionStatus>> {
        Arc::clone(&self.status)
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.read()
    }

    /// Update the connection status, notifying subscribers on change
    pub fn set_status(&mut self, status: ConnectionStatus) {
        {
            let mut current = self.status.write();
            if *current == status {
                return;
            }
            *current = status;
        }
        self.emit(&UiEvent::ConnectionChanged(status));
    }

    /// A connection opened: start a new session and ask for the full state
    pub fn attach(&mut self, outbox: mpsc::UnboundedSender<String>) {
        self.outbox = Some(outbox);
        self.set_status(ConnectionStatus::Connected);
        self.emit(&UiEvent::SessionReset);
        self.request_full_state();
    }

    /// The connection closed; pending resyncs are dropped since the next
    /// session starts with a full state anyway
    pub fn detach(&mut self) {
        self.outbox = None;
        self.resync_deadline = None;
        self.set_status(ConnectionStatus::Disconnected);
    }

    /// Send a command to the plugin. Dropped while disconnected.
    pub fn send(&mut self, command: &PluginCommand) -> bool {
        let Some(outbox) = &self.outbox else {
            debug!(address = command.address(), "not connected, command dropped");
            return false;
        };

        let text = command.encode();
        trace!(%text, "→ plugin");
        if outbox.send(text).is_err() {
            debug!(address = command.address(), "connection gone, command dropped");
            self.outbox = None;
            return false;
        }
        true
    }

    pub fn request_full_state(&mut self) {
        self.send(&PluginCommand::GetState(StateKind::Full));
    }

    pub fn request_volatile_state(&mut self) {
        self.send(&PluginCommand::GetState(StateKind::Volatile));
    }

    /// Pending burst reconciliation deadline
    pub fn resync_deadline(&self) -> Option<Instant> {
        self.resync_deadline
    }

    /// The reconciliation deadline expired: re-request the full state once
    pub fn fire_resync(&mut self) {
        self.resync_deadline = None;
        debug!("update burst settled, requesting full state");
        self.request_full_state();
    }

    /// Number of update id discontinuities seen since startup
    pub fn update_gaps(&self) -> u64 {
        self.update_gaps
    }

    pub fn updates_applied(&self) -> u64 {
        self.updates_applied
    }

    /// Handle one raw text frame from the plugin
    pub fn handle_frame(&mut self, raw: &str) {
        trace!(len = raw.len(), "← plugin");

        let msg_type = match split_message(raw) {
            Ok((msg_type, _)) => msg_type,
            Err(e) => {
                warn!("Dropping frame: {}", e);
                return;
            },
        };

        // An update without a base tree cannot be applied: ask for one instead
        if msg_type == MSG_STATE_UPDATE && self.state.is_none() {
            debug!("state update before any full state, requesting full state");
            self.request_full_state();
            return;
        }

        match decode(raw) {
            Ok(message) => self.handle_message(message),
            Err(e) => warn!(msg_type, "Dropping malformed message: {}", e),
        }
    }

    fn handle_message(&mut self, message: InboundMessage) {
        match message {
            InboundMessage::FullState { update_id, tree } => match Document::parse(&tree) {
                Ok(doc) => {
                    if self.state.is_none() {
                        info!(?update_id, "📥 Full state received");
                    } else {
                        debug!(?update_id, "full state replaced");
                    }
                    self.state = Some(doc);
                    self.last_update_id = update_id;
                    self.emit(&UiEvent::FullStateReplaced);
                },
                Err(e) => warn!(?update_id, "Ignoring unparsable full state: {}", e),
            },
            InboundMessage::VolatileState { tree } => match Document::parse(&tree) {
                Ok(doc) => {
                    self.volatile_state = Some(doc);
                    self.emit(&UiEvent::VolatileStateReplaced);
                },
                Err(e) => warn!("Ignoring unparsable volatile state: {}", e),
            },
            InboundMessage::StateUpdate(update) => self.handle_update(update),
        }
    }

    fn handle_update(&mut self, update: StateUpdate) {
        let Some(doc) = self.state.as_mut() else {
            self.request_full_state();
            return;
        };

        let events = match apply_change(doc, &update.change) {
            Ok(events) => events,
            Err(e) => {
                warn!(update_id = ?update.update_id, "Could not apply update: {}", e);
                Vec::new()
            },
        };
        self.updates_applied += 1;

        for event in &events {
            self.emit(event);
        }

        self.track_update_id(update.update_id);
        self.resync_deadline = Some(Instant::now() + self.settings.resync_debounce);
    }

    fn track_update_id(&mut self, update_id: Option<i64>) {
        // Without an id there is nothing to compare the next one against
        let Some(update_id) = update_id else {
            debug!("update without a numeric id, gap tracking skipped");
            self.last_update_id = None;
            return;
        };
        let gap = matches!(self.last_update_id, Some(last) if last.checked_add(1) != Some(update_id));
        self.last_update_id = Some(update_id);

        if gap {
            self.update_gaps += 1;
            debug!(update_id, gaps = self.update_gaps, "update id gap");
            if self.settings.resync_on_update_gap {
                self.request_full_state();
            }
        }
    }

    pub fn emit(&self, event: &UiEvent) {
        for subscriber in &self.subscribers {
            subscriber(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn connected() -> (Synchronizer, mpsc::UnboundedReceiver<String>) {
        let mut sync = Synchronizer::new(SyncSettings::default());
        let (tx, rx) = mpsc::unbounded_channel();
        sync.attach(tx);
        (sync, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
        let mut sent = Vec::new();
        while let Ok(text) = rx.try_recv() {
            sent.push(text);
        }
        sent
    }

    #[tokio::test]
    async fn test_attach_requests_full_state() {
        let (sync, mut rx) = connected();
        assert_eq!(drain(&mut rx), vec!["/get_state:full"]);
        assert_eq!(sync.status(), ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn test_unparsable_full_state_keeps_previous_tree() {
        let (mut sync, _rx) = connected();
        sync.handle_frame(r#"/full_state:1;<SOURCE_STATE uuid="r"/>"#);
        sync.handle_frame("/full_state:2;not xml at all");

        assert_eq!(sync.state().unwrap().root().uuid(), Some("r"));
    }

    #[tokio::test]
    async fn test_send_while_detached_is_dropped() {
        let mut sync = Synchronizer::new(SyncSettings::default());
        assert!(!sync.send(&PluginCommand::ClearAllSounds));
        assert_eq!(sync.status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_update_gap_tracking() {
        let settings = SyncSettings {
            resync_on_update_gap: true,
            ..SyncSettings::default()
        };
        let mut sync = Synchronizer::new(settings);
        let (tx, mut rx) = mpsc::unbounded_channel();
        sync.attach(tx);

        sync.handle_frame(r#"/full_state:10;<SOURCE_STATE uuid="r"/>"#);
        sync.handle_frame("/state_update:propertyChanged;11;r;SOURCE_STATE;a;1");
        assert_eq!(sync.update_gaps(), 0);
        drain(&mut rx);

        sync.handle_frame("/state_update:propertyChanged;14;r;SOURCE_STATE;a;2");
        assert_eq!(sync.update_gaps(), 1);
        assert_eq!(drain(&mut rx), vec!["/get_state:full"]);

        // A full state resets the sequence
        sync.handle_frame(r#"/full_state:40;<SOURCE_STATE uuid="r"/>"#);
        sync.handle_frame("/state_update:propertyChanged;41;r;SOURCE_STATE;a;3");
        assert_eq!(sync.update_gaps(), 1);
    }

    #[tokio::test]
    async fn test_missing_update_id_skips_gap_tracking() {
        let (mut sync, _rx) = connected();
        sync.handle_frame(r#"/full_state:abc;<SOURCE_STATE uuid="r"/>"#);
        assert!(sync.state().is_some());

        sync.handle_frame("/state_update:propertyChanged;5;r;SOURCE_STATE;a;1");
        sync.handle_frame("/state_update:propertyChanged;;r;SOURCE_STATE;a;2");
        sync.handle_frame("/state_update:propertyChanged;9;r;SOURCE_STATE;a;3");

        assert_eq!(sync.update_gaps(), 0);
        assert_eq!(sync.updates_applied(), 3);
        assert_eq!(sync.state().unwrap().root().attr("a"), Some("3"));
        assert!(sync.resync_deadline().is_some());
    }

    #[tokio::test]
    async fn test_status_changes_are_emitted_once() {
        let mut sync = Synchronizer::new(SyncSettings::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        sync.subscribe(Arc::new(move |event: &UiEvent| sink.lock().push(event.clone())));

        sync.set_status(ConnectionStatus::Reconnecting { attempt: 1 });
        sync.set_status(ConnectionStatus::Reconnecting { attempt: 1 });
        sync.detach();

        assert_eq!(
            *seen.lock(),
            vec![
                UiEvent::ConnectionChanged(ConnectionStatus::Reconnecting { attempt: 1 }),
                UiEvent::ConnectionChanged(ConnectionStatus::Disconnected),
            ]
        );
    }
}
