//! SyncActor - owns the synchronizer and serializes all access to it
//!
//! One task multiplexes handle commands, connection events, the volatile
//! poll interval and the reconciliation deadline with `tokio::select!`.
//! Because every branch runs to completion before the next is polled, each
//! inbound message is applied atomically with respect to readers.

use std::fmt;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, trace};

use super::handle::SyncHandle;
use super::{SyncSettings, Synchronizer, UiCallback};
use crate::connection::ConnectionStatus;
use crate::protocol::PluginCommand;

/// Closure executed against the synchronizer inside the actor
pub type SyncJob = Box<dyn FnOnce(&mut Synchronizer) + Send>;

/// Commands accepted by the actor
pub enum SyncCommand {
    /// Fire-and-forget outbound command
    Send(PluginCommand),
    /// Run a closure with exclusive access (reads and state-resolved intents)
    Run(SyncJob),
    Subscribe(UiCallback),
    /// Stop the actor; the connection task follows when its channel closes
    Shutdown,
}

impl fmt::Debug for SyncCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncCommand::Send(cmd) => f.debug_tuple("Send").field(cmd).finish(),
            SyncCommand::Run(_) => f.write_str("Run(..)"),
            SyncCommand::Subscribe(_) => f.write_str("Subscribe(..)"),
            SyncCommand::Shutdown => f.write_str("Shutdown"),
        }
    }
}

/// Events from the connection task
#[derive(Debug)]
pub enum LinkEvent {
    /// Socket open; text pushed to the sender goes out on the wire
    Opened(mpsc::UnboundedSender<String>),
    /// One inbound text frame
    Frame(String),
    /// Socket closed or failed
    Closed,
    /// About to retry after the reconnect delay
    Reconnecting { attempt: u32 },
}

/// Actor task state
pub struct SyncActor {
    core: Synchronizer,
    command_rx: mpsc::UnboundedReceiver<SyncCommand>,
    link_rx: mpsc::UnboundedReceiver<LinkEvent>,
    link_open: bool,
    /// Volatile state poll; exists only while connected
    poll: Option<Interval>,
    poll_period: Duration,
}

impl SyncActor {
    /// Spawn the actor fed by `link_rx` and return a handle to it
    pub fn spawn(settings: SyncSettings, link_rx: mpsc::UnboundedReceiver<LinkEvent>) -> SyncHandle {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let poll_period = settings.volatile_poll_interval;
        let core = Synchronizer::new(settings);
        let status = core.status_cell();

        let actor = SyncActor {
            core,
            command_rx: cmd_rx,
            link_rx,
            link_open: true,
            poll: None,
            poll_period,
        };
        tokio::spawn(actor.run());

        info!("SyncActor spawned");
        SyncHandle::new(cmd_tx, status)
    }

    async fn run(mut self) {
        debug!("SyncActor run loop started");

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => match cmd {
                    Some(SyncCommand::Shutdown) | None => {
                        info!("SyncActor received shutdown");
                        break;
                    },
                    Some(cmd) => self.handle_command(cmd),
                },
                event = self.link_rx.recv(), if self.link_open => match event {
                    Some(event) => self.handle_link_event(event),
                    None => {
                        debug!("connection task ended");
                        self.link_open = false;
                        self.poll = None;
                        self.core.detach();
                    },
                },
                _ = tick(&mut self.poll) => self.core.request_volatile_state(),
                _ = sleep_until(self.core.resync_deadline()) => self.core.fire_resync(),
            }
        }

        info!(
            updates = self.core.updates_applied(),
            update_gaps = self.core.update_gaps(),
            "SyncActor run loop terminated"
        );
    }

    fn handle_command(&mut self, cmd: SyncCommand) {
        trace!(?cmd, "Processing command");
        match cmd {
            SyncCommand::Send(command) => {
                self.core.send(&command);
            },
            SyncCommand::Run(job) => job(&mut self.core),
            SyncCommand::Subscribe(callback) => self.core.subscribe(callback),
            SyncCommand::Shutdown => {},
        }
    }

    fn handle_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Opened(outbox) => {
                self.core.attach(outbox);
                // Replaces any interval left from a previous session
                let mut poll = time::interval_at(Instant::now() + self.poll_period, self.poll_period);
                poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
                self.poll = Some(poll);
            },
            LinkEvent::Frame(text) => self.core.handle_frame(&text),
            LinkEvent::Closed => {
                self.poll = None;
                self.core.detach();
            },
            LinkEvent::Reconnecting { attempt } => {
                self.core
                    .set_status(ConnectionStatus::Reconnecting { attempt });
            },
        }
    }
}

/// Next tick of an optional interval; pending forever when there is none
async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        },
        None => std::future::pending().await,
    }
}

/// Sleep until an optional deadline; pending forever when there is none
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Create a oneshot-backed job that answers with `f`'s result
pub(super) fn query<R, F>(f: F) -> (SyncJob, oneshot::Receiver<R>)
where
    R: Send + 'static,
    F: FnOnce(&Synchronizer) -> R + Send + 'static,
{
    let (response_tx, response_rx) = oneshot::channel();
    let job: SyncJob = Box::new(move |core: &mut Synchronizer| {
        let _ = response_tx.send(f(core));
    });
    (job, response_rx)
}
