//! # Summary
//!
//! This module defines the `Acceptor`, which acts as Paxos's distributed
//! memory for the single decree. State lives in memory only.

use crate::message::{PValue, ProposalNumber};
use crate::state;

/// Returned when a request falls below the number already promised.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Rejected {
    pub promised: ProposalNumber,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Acceptor<V: state::Value> {
    /// Highest proposal number promised; never decreases
    promised: Option<ProposalNumber>,

    /// Most recently accepted proposal, numbered at most `promised`
    accepted: Option<PValue<V>>,
}

impl<V: state::Value> Default for Acceptor<V> {
    fn default() -> Self {
        Acceptor { promised: None, accepted: None }
    }
}

impl<V: state::Value> Acceptor<V> {
    pub fn promised(&self) -> Option<ProposalNumber> {
        self.promised
    }

    pub fn accepted(&self) -> Option<&PValue<V>> {
        self.accepted.as_ref()
    }

    /// Promises `number` if it is strictly higher than anything promised so far,
    /// returning the previously accepted proposal to report in the reply.
    pub fn on_prepare(&mut self, number: ProposalNumber) -> Result<Option<PValue<V>>, Rejected> {
        match self.promised {
        | Some(promised) if number <= promised => Err(Rejected { promised }),
        | _ => {
            self.promised = Some(number);
            Ok(self.accepted.clone())
        }
        }
    }

    /// Accepts `value` under `number` unless a strictly higher number was promised.
    /// A request at exactly the promised number is the one that was granted.
    pub fn on_accept_request(&mut self, number: ProposalNumber, value: V) -> Result<(), Rejected> {
        match self.promised {
        | Some(promised) if number < promised => Err(Rejected { promised }),
        | _ => {
            self.promised = Some(number);
            self.accepted = Some(PValue { number, value });
            Ok(())
        }
        }
    }
}
