//! # Summary
//!
//! This module implements the per-member Paxos engine: the composition of
//! acceptor, proposer and learner behind a single lock, and the dispatch
//! target for every inbound message and every local proposal.
//!
//! Handlers compute their outbound messages while holding the lock and send
//! them after releasing it, so the transport is never called with protocol
//! state locked. Delivery delays are applied before the lock is taken.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::NodeContext;
use crate::message::{Accepted, AcceptRequest, Message, PValue, Prepare, Promise, ProposalNumber};
use crate::profile::Delivery;
use crate::role::acceptor::{Acceptor, Rejected};
use crate::role::learner::{Decision, Learner};
use crate::role::proposer::{Phase, Proposer};
use crate::socket::Transport;
use crate::state;

/// Handle to one member's Paxos engine. All clones drive the same state.
#[derive(Derivative)]
#[derivative(Clone(bound = ""))]
pub struct Engine<V: state::Value>(Arc<Inner<V>>);

struct Inner<V: state::Value> {
    context: NodeContext,
    delivery: Box<dyn Delivery>,
    transport: Arc<dyn Transport>,

    /// All protocol state of this member
    council: Mutex<Council<V>>,

    /// Retry timer for the current round, if one is armed
    timer: Mutex<Option<JoinHandle<()>>>,

    /// One-time decision notification
    decision_tx: watch::Sender<Option<Decision<V>>>,
}

struct Council<V: state::Value> {
    acceptor: Acceptor<V>,
    proposer: Proposer<V>,
    learner: Learner<V>,
}

/// Messages produced by a handler, sent once the lock is released.
enum Outbound<V: state::Value> {
    Send(String, Message<V>),
    Broadcast(Message<V>),
}

impl<V: state::Value> Engine<V> {
    pub fn new<D: Delivery>(context: NodeContext, delivery: D, transport: Arc<dyn Transport>) -> Self {
        let council = Council {
            acceptor: Acceptor::default(),
            proposer: Proposer::new(context.tag(), context.quorum()),
            learner: Learner::new(context.quorum()),
        };
        let (decision_tx, _) = watch::channel(None);
        Engine(Arc::new(Inner {
            context,
            delivery: Box::new(delivery),
            transport,
            council: Mutex::new(council),
            timer: Mutex::new(None),
            decision_tx,
        }))
    }

    pub fn id(&self) -> &str {
        self.0.context.id()
    }

    /// The decided value, once this member has learned it.
    pub fn decision(&self) -> Option<Decision<V>> {
        self.0.decision_tx.borrow().clone()
    }

    /// Watches for the decision; the channel holds `None` until it is learned.
    pub fn subscribe(&self) -> watch::Receiver<Option<Decision<V>>> {
        self.0.decision_tx.subscribe()
    }

    pub fn promised(&self) -> Option<ProposalNumber> {
        self.0.council.lock().acceptor.promised()
    }

    pub fn phase(&self) -> Phase {
        self.0.council.lock().proposer.phase()
    }

    /// Current round of the local proposer, if any.
    pub fn current_round(&self) -> Option<ProposalNumber> {
        self.0.council.lock().proposer.current()
    }

    /// Handles one raw wire line: delivery delay, drop check, decode, dispatch.
    /// Nothing is returned; bad input is logged and discarded.
    pub async fn handle_message(&self, raw: &str) {
        let id = self.id();

        let delay = self.0.delivery.delay();
        if delay > Duration::from_millis(0) {
            tokio::time::sleep(delay).await;
        }

        if self.0.delivery.should_drop() {
            warn!("[{}] dropped inbound message", id);
            return
        }

        let message = match Message::<V>::decode(raw) {
        | Ok(message) => message,
        | Err(err) => {
            warn!("[{}] discarding message: {}", id, err);
            return
        }
        };

        if !self.0.context.directory().contains(message.sender()) {
            warn!("[{}] discarding {} from unknown member {:?}", id, message.kind(), message.sender());
            return
        }

        trace!("[{}] received {:?}", id, message);

        let (outbound, decision) = {
            let mut council = self.0.council.lock();
            self.dispatch(&mut council, message)
        };

        if let Some(decision) = decision {
            self.publish(decision);
        }
        self.flush(outbound);
    }

    /// Starts a new round proposing `value`, unless consensus is already known.
    /// The local acceptor is prepared first, so this member counts toward its
    /// own quorum. Must be called from within a Tokio runtime, which hosts the
    /// retry timer.
    pub fn propose(&self, value: V) {
        let id = self.id();
        let mut outbound = Vec::new();
        let (number, decision) = {
            let mut council = self.0.council.lock();
            if let Some(decision) = council.learner.decided() {
                info!("[{}] consensus already reached on {}; not proposing {}", id, decision.value, value);
                return
            }
            let number = match council.proposer.propose(value.clone()) {
            | Some(number) => number,
            | None => {
                error!("[{}] proposal rounds exhausted; not proposing {}", id, value);
                return
            }
            };
            info!("[{}] proposing {} under {}", id, value, number);
            outbound.push(Outbound::Broadcast(Message::Prepare(Prepare {
                sender: id.to_string(),
                number,
            })));
            let decision = match council.acceptor.on_prepare(number) {
            | Ok(prior) => council.proposer
                .on_promise(id, number, prior)
                .and_then(|request| self.request(&mut council, request, &mut outbound)),
            | Err(Rejected { promised }) => {
                warn!("[{}] own acceptor refused {}: already promised {}", id, number, promised);
                None
            }
            };
            (number, decision)
        };

        match decision {
        | Some(decision) => self.publish(decision),
        | None => self.arm(number),
        }
        self.flush(outbound);
    }

    fn dispatch(&self, council: &mut Council<V>, message: Message<V>) -> (Vec<Outbound<V>>, Option<Decision<V>>) {
        let id = self.id();
        let mut outbound = Vec::new();
        let mut decision = None;

        match message {
        | Message::Prepare(prepare) => match council.acceptor.on_prepare(prepare.number) {
            | Ok(prior) => {
                council.proposer.observe(prepare.number);
                info!("[{}] promised {} to {}", id, prepare.number, prepare.sender);
                let promise = Message::Promise(Promise {
                    sender: id.to_string(),
                    number: prepare.number,
                    prior,
                });
                outbound.push(Outbound::Send(prepare.sender, promise));
            }
            | Err(Rejected { promised }) => {
                warn!("[{}] ignored PREPARE {} from {}: already promised {}", id, prepare.number, prepare.sender, promised);
            }
        },
        | Message::Promise(promise) => {
            debug!("[{}] PROMISE {} from {} (prior {:?})", id, promise.number, promise.sender, promise.prior);
            if let Some(request) = council.proposer.on_promise(&promise.sender, promise.number, promise.prior) {
                decision = self.request(council, request, &mut outbound);
            }
        }
        | Message::AcceptRequest(request) => {
            match council.acceptor.on_accept_request(request.number, request.value.clone()) {
            | Ok(()) => {
                council.proposer.observe(request.number);
                info!("[{}] accepted {} under {} from {}", id, request.value, request.number, request.sender);
                decision = self.learn(council, id, request.number, request.value.clone());
                outbound.push(Outbound::Broadcast(Message::Accepted(Accepted {
                    sender: id.to_string(),
                    number: request.number,
                    value: request.value,
                })));
            }
            | Err(Rejected { promised }) => {
                warn!("[{}] rejected ACCEPT_REQUEST {} from {}: already promised {}", id, request.number, request.sender, promised);
            }
            }
        }
        | Message::Accepted(accepted) => {
            debug!("[{}] ACCEPTED {} = {} from {}", id, accepted.number, accepted.value, accepted.sender);
            decision = self.learn(council, &accepted.sender, accepted.number, accepted.value);
        }
        }

        (outbound, decision)
    }

    /// Broadcasts the Accept-Request a promise quorum earned, accepting it
    /// locally as well so this member's vote reaches every learner.
    fn request(&self, council: &mut Council<V>, request: PValue<V>, outbound: &mut Vec<Outbound<V>>) -> Option<Decision<V>> {
        let id = self.id();
        info!("[{}] quorum promised {}; requesting accept of {}", id, request.number, request.value);
        outbound.push(Outbound::Broadcast(Message::AcceptRequest(AcceptRequest {
            sender: id.to_string(),
            number: request.number,
            value: request.value.clone(),
        })));
        match council.acceptor.on_accept_request(request.number, request.value.clone()) {
        | Ok(()) => {
            outbound.push(Outbound::Broadcast(Message::Accepted(Accepted {
                sender: id.to_string(),
                number: request.number,
                value: request.value.clone(),
            })));
            self.learn(council, id, request.number, request.value)
        }
        | Err(Rejected { promised }) => {
            warn!("[{}] own acceptor refused {}: already promised {}", id, request.number, promised);
            None
        }
        }
    }

    /// Feeds one acceptance to the learner, retiring the proposer on decision.
    fn learn(&self, council: &mut Council<V>, acceptor: &str, number: ProposalNumber, value: V) -> Option<Decision<V>> {
        let decision = council.learner.on_accepted(acceptor, number, value)?;
        council.proposer.retire();
        info!("[{}] consensus reached: {} (proposal {})", self.id(), decision.value, decision.number);
        Some(decision)
    }

    fn publish(&self, decision: Decision<V>) {
        self.0.decision_tx.send_replace(Some(decision));
    }

    /// Arms the retry timer for `number`, replacing any timer still pending.
    fn arm(&self, number: ProposalNumber) {
        let engine = self.clone();
        let delay = self.0.context.retry_delay();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            engine.retry(number);
        });
        if let Some(previous) = self.0.timer.lock().replace(timer) {
            previous.abort();
        }
    }

    /// Fired by the retry timer. Only acts if `number` is still the current
    /// round and nothing has been decided.
    fn retry(&self, number: ProposalNumber) {
        let value = {
            let council = self.0.council.lock();
            if council.learner.decided().is_some() {
                None
            } else {
                council.proposer.retry(number)
            }
        };
        match value {
        | Some(value) => {
            info!("[{}] round {} timed out without consensus; retrying", self.id(), number);
            // Detach rather than abort: this task is the one holding the slot.
            self.0.timer.lock().take();
            self.propose(value);
        }
        | None => debug!("[{}] retry timer for {} is stale", self.id(), number),
        }
    }

    fn flush(&self, outbound: Vec<Outbound<V>>) {
        for message in outbound {
            match message {
            | Outbound::Send(member, message) => {
                if let Some(line) = self.encode(&message) {
                    trace!("[{}] sending {} {} to {}", self.id(), message.kind(), message.number(), member);
                    self.0.transport.send_to(&member, line);
                }
            }
            | Outbound::Broadcast(message) => {
                if let Some(line) = self.encode(&message) {
                    trace!("[{}] broadcasting {} {}", self.id(), message.kind(), message.number());
                    for peer in self.0.context.peers() {
                        self.0.transport.send_to(peer, line.clone());
                    }
                }
            }
            }
        }
    }

    fn encode(&self, message: &Message<V>) -> Option<String> {
        message.encode()
            .map_err(|err| error!("[{}] failed to encode {}: {}", self.id(), message.kind(), err))
            .ok()
    }
}
