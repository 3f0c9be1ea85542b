//! # Summary
//!
//! This module defines the `Proposer`, which drives one round at a time:
//! it allocates a fresh proposal number, counts Promises for that number
//! only, and produces the Accept-Request the instant a quorum has promised.
//!
//! The proposer never re-broadcasts within a round. Lost messages are
//! recovered by starting a new, strictly higher round when the retry timer
//! armed by [`crate::Engine`] fires.

use hashbrown::HashSet as Set;

use crate::message::{PValue, ProposalNumber};
use crate::state;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Nothing proposed yet
    Idle,

    /// Prepare sent, collecting Promises
    Preparing,

    /// Quorum promised, Accept-Request sent
    AwaitingAccept,

    /// Consensus learned; terminal
    Decided,
}

#[derive(Clone, Debug)]
pub struct Proposer<V: state::Value> {
    /// Unique tag of this member
    tag: u64,

    /// Promises needed before sending Accept-Request
    quorum: usize,

    /// Highest round used or observed; the next round is strictly above it
    round: u64,

    phase: Phase,

    /// Number of the round currently running
    current: Option<ProposalNumber>,

    /// Value this member wants decided
    proposed: Option<V>,

    /// Members that promised `current`
    promised_by: Set<String>,

    /// Highest prior acceptance reported by any Promise for `current`
    best_prior: Option<PValue<V>>,
}

impl<V: state::Value> Proposer<V> {
    pub fn new(tag: u64, quorum: usize) -> Self {
        Proposer {
            tag,
            quorum,
            round: 0,
            phase: Phase::Idle,
            current: None,
            proposed: None,
            promised_by: Set::default(),
            best_prior: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn current(&self) -> Option<ProposalNumber> {
        self.current
    }

    pub fn promises(&self) -> usize {
        self.promised_by.len()
    }

    pub fn best_prior(&self) -> Option<&PValue<V>> {
        self.best_prior.as_ref()
    }

    /// Raises the round floor past a number seen elsewhere in the council,
    /// so the next local round outranks it.
    pub fn observe(&mut self, number: ProposalNumber) {
        self.round = std::cmp::max(self.round, number.round);
    }

    /// Starts a new round for `value`, returning the number to Prepare with.
    /// Callers are responsible for checking that consensus is not yet known.
    /// Returns `None` without touching any state once the round counter is
    /// exhausted, which only a peer claiming the last round can cause.
    pub fn propose(&mut self, value: V) -> Option<ProposalNumber> {
        let number = ProposalNumber::next(&mut self.round, self.tag)?;
        self.current = Some(number);
        self.proposed = Some(value);
        self.promised_by.clear();
        self.best_prior = None;
        self.phase = Phase::Preparing;
        Some(number)
    }

    /// Counts a Promise from `acceptor` for `number`. Promises for any other
    /// round are discarded, and each acceptor counts once per round. Returns the
    /// proposal to send as Accept-Request exactly once, when the promise count
    /// first reaches quorum.
    pub fn on_promise(&mut self, acceptor: &str, number: ProposalNumber, prior: Option<PValue<V>>) -> Option<PValue<V>> {
        if self.current != Some(number) || self.phase == Phase::Decided {
            return None
        }

        self.promised_by.insert(acceptor.to_string());

        if let Some(prior) = prior {
            let higher = self.best_prior
                .as_ref()
                .map_or(true, |best| prior.number > best.number);
            if higher {
                self.best_prior = Some(prior);
            }
        }

        if self.phase != Phase::Preparing || self.promised_by.len() < self.quorum {
            return None
        }

        let value = match (&self.best_prior, &self.proposed) {
        | (Some(prior), _) => prior.value.clone(),
        | (None, Some(proposed)) => proposed.clone(),
        | (None, None) => return None,
        };
        self.phase = Phase::AwaitingAccept;
        Some(PValue { number, value })
    }

    /// Decides whether the retry timer armed for `number` should start a new
    /// round, returning the value to re-propose. Stale or decided rounds are no-ops.
    pub fn retry(&self, number: ProposalNumber) -> Option<V> {
        match self.phase {
        | Phase::Preparing | Phase::AwaitingAccept if self.current == Some(number) => self.proposed.clone(),
        | _ => None,
        }
    }

    /// Retires the proposer once consensus is learned.
    pub fn retire(&mut self) {
        self.phase = Phase::Decided;
    }
}
