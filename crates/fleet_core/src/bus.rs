//! In-process message bus.
//!
//! Two independent publish/subscribe channels carry [`Frames`]: one from the
//! simulation to the optimizer, one back. Subscribers filter by topic.
//! Publishers wait a settling delay once before their first message, since a
//! peer that subscribes at the same moment may otherwise miss it.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::plan::Plan;
use crate::problem::Problem;
use crate::result::SimulationResult;
use crate::session::{PlanFeed, ProblemSink, RunResult};
use crate::wire::{Frames, Message, ProtocolError, StartSimulation, Topic};

const DEFAULT_SETTLE_DELAY_MS: u64 = 500;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus channel closed")]
    Closed,

    #[error("timed out waiting for a message")]
    Timeout,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

pub type BusResult<T> = Result<T, BusError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub settle_delay_ms: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
        }
    }
}

impl BusConfig {
    pub fn with_settle_delay_ms(mut self, ms: u64) -> Self {
        self.settle_delay_ms = ms;
        self
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

#[derive(Debug)]
struct Subscription {
    /// Empty means every topic, including unknown ones.
    topics: Vec<Topic>,
    sender: Sender<Frames>,
}

impl Subscription {
    fn wants(&self, topic: &[u8]) -> bool {
        self.topics.is_empty() || self.topics.iter().any(|t| t.as_str().as_bytes() == topic)
    }
}

/// One direction of the bus.
#[derive(Debug, Clone, Default)]
pub struct BusChannel {
    subscriptions: Arc<Mutex<Vec<Subscription>>>,
}

impl BusChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to `topics`; an empty slice subscribes to everything.
    pub fn subscribe(&self, topics: &[Topic]) -> Subscriber {
        let (sender, receiver) = mpsc::channel();
        self.subscriptions.lock().push(Subscription {
            topics: topics.to_vec(),
            sender,
        });
        Subscriber { receiver }
    }

    pub fn publisher(&self, settle_delay: Duration) -> Publisher {
        Publisher {
            channel: self.clone(),
            settle_delay,
            settled: settle_delay.is_zero(),
        }
    }

    /// Deliver raw frames to every interested subscriber. Returns how many received them.
    pub fn send_frames(&self, frames: &Frames) -> usize {
        let mut subscriptions = self.subscriptions.lock();
        // Subscribers that hung up are dropped on the way.
        subscriptions.retain(|s| !s.wants(&frames.topic) || s.sender.send(frames.clone()).is_ok());
        subscriptions
            .iter()
            .filter(|s| s.wants(&frames.topic))
            .count()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.lock().len()
    }
}

pub struct Publisher {
    channel: BusChannel,
    settle_delay: Duration,
    settled: bool,
}

impl Publisher {
    pub fn publish(&mut self, message: &Message) -> BusResult<usize> {
        let frames = message.encode()?;
        Ok(self.publish_frames(&frames))
    }

    pub fn publish_frames(&mut self, frames: &Frames) -> usize {
        if !self.settled {
            debug!(delay = ?self.settle_delay, "settling before first publish");
            thread::sleep(self.settle_delay);
            self.settled = true;
        }
        self.channel.send_frames(frames)
    }
}

#[derive(Debug)]
pub struct Subscriber {
    receiver: Receiver<Frames>,
}

impl Subscriber {
    pub fn recv(&self) -> BusResult<Message> {
        let frames = self.receiver.recv().map_err(|_| BusError::Closed)?;
        Ok(Message::decode(&frames)?)
    }

    pub fn recv_timeout(&self, timeout: Duration) -> BusResult<Message> {
        let frames = self.receiver.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => BusError::Timeout,
            RecvTimeoutError::Disconnected => BusError::Closed,
        })?;
        Ok(Message::decode(&frames)?)
    }

    pub fn try_recv(&self) -> BusResult<Option<Message>> {
        match self.receiver.try_recv() {
            Ok(frames) => Ok(Some(Message::decode(&frames)?)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(BusError::Closed),
        }
    }
}

/// Both directions of the bus.
#[derive(Debug, Clone, Default)]
pub struct Bus {
    pub to_optimizer: BusChannel,
    pub to_simulation: BusChannel,
}

impl Bus {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Publishes a run's problems and result on the simulation-to-optimizer channel.
pub struct BusProblemSink {
    publisher: Publisher,
}

impl BusProblemSink {
    pub fn new(publisher: Publisher) -> Self {
        Self { publisher }
    }
}

impl ProblemSink for BusProblemSink {
    fn publish_problem(&mut self, problem: &Problem) -> RunResult<()> {
        self.publisher.publish(&Message::Problem(problem.clone()))?;
        Ok(())
    }

    fn publish_result(&mut self, result: &SimulationResult) -> RunResult<()> {
        self.publisher.publish(&Message::SimResult(result.clone()))?;
        Ok(())
    }
}

/// Routes incoming plans to the inbox of the run currently in progress.
#[derive(Debug, Clone, Default)]
pub struct PlanRouter {
    inbox: Arc<Mutex<Option<Sender<PlanFeed>>>>,
}

impl PlanRouter {
    /// Open a fresh inbox for a new run, closing any previous one.
    pub fn subscribe(&self) -> Receiver<PlanFeed> {
        let (sender, receiver) = mpsc::channel();
        *self.inbox.lock() = Some(sender);
        receiver
    }

    pub fn unsubscribe(&self) {
        self.inbox.lock().take();
    }

    pub fn is_subscribed(&self) -> bool {
        self.inbox.lock().is_some()
    }

    /// Hand a plan to the active run. Returns `false` if there is none.
    pub fn deliver(&self, plan: Plan) -> bool {
        let mut inbox = self.inbox.lock();
        let delivered = inbox
            .as_ref()
            .map(|s| s.send(Ok(plan)).is_ok())
            .unwrap_or(false);
        if !delivered {
            debug!("no active run, dropping plan");
            inbox.take();
        }
        delivered
    }

    /// Pass a fault to the active run, if any, and close its inbox.
    pub fn fail(&self, fault: ProtocolError) {
        if let Some(sender) = self.inbox.lock().take() {
            if sender.send(Err(fault)).is_err() {
                debug!("run already gone, fault not delivered");
            }
        }
    }
}

/// Spawn the thread that reads optimizer-to-simulation traffic.
///
/// Plans go to `router`, start requests to `starts`. The thread ends cleanly
/// when the channel closes. On a protocol fault it hands the fault to the
/// active run, closes its inbox and ends with the error.
pub fn spawn_simulation_listener(
    subscriber: Subscriber,
    router: PlanRouter,
    starts: Sender<StartSimulation>,
) -> JoinHandle<Result<(), ProtocolError>> {
    thread::spawn(move || loop {
        match subscriber.recv() {
            Ok(Message::Solution(plan)) => {
                router.deliver(plan);
            }
            Ok(Message::Start(start)) => {
                if starts.send(start).is_err() {
                    return Ok(());
                }
            }
            Ok(other) => {
                warn!(topic = other.topic().as_str(), "ignoring message sent the wrong way");
            }
            Err(BusError::Protocol(err)) => {
                error!(%err, "protocol fault on simulation listener");
                router.fail(err.clone());
                return Err(err);
            }
            Err(BusError::Closed | BusError::Timeout) => return Ok(()),
        }
    })
}
