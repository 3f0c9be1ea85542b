use hashbrown::{HashMap as Map, HashSet as Set};

use crate::message::ProposalNumber;
use crate::state;

/// The value a quorum accepted, and the proposal number of the Accepted
/// message that completed the quorum.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decision<V: state::Value> {
    pub value: V,
    pub number: ProposalNumber,
}

/// Tallies Accepted messages per value and declares the decision once any
/// value reaches a quorum. The tally is keyed by value alone, so the same
/// value accepted under different proposal numbers counts together, but each
/// acceptor counts at most once per value.
#[derive(Clone, Debug)]
pub struct Learner<V: state::Value> {
    quorum: usize,
    tally: Map<V, Set<String>>,
    decided: Option<Decision<V>>,
}

impl<V: state::Value> Learner<V> {
    pub fn new(quorum: usize) -> Self {
        Learner {
            quorum,
            tally: Map::default(),
            decided: None,
        }
    }

    pub fn decided(&self) -> Option<&Decision<V>> {
        self.decided.as_ref()
    }

    pub fn tally(&self, value: &V) -> usize {
        self.tally.get(value).map_or(0, Set::len)
    }

    /// Records that `acceptor` accepted `value`. Returns the decision only on
    /// the call that produces it; once decided, further acceptances are ignored.
    pub fn on_accepted(&mut self, acceptor: &str, number: ProposalNumber, value: V) -> Option<Decision<V>> {
        if self.decided.is_some() {
            return None
        }
        let acceptors = self.tally.entry(value.clone()).or_insert_with(Set::default);
        acceptors.insert(acceptor.to_string());
        if acceptors.len() < self.quorum {
            return None
        }
        let decision = Decision { value, number };
        self.decided = Some(decision.clone());
        Some(decision)
    }
}
