//! # Summary
//!
//! Protocol messages exchanged between council members, and their wire
//! encoding: one JSON object per line, carrying
//! `{type, proposalNumber, senderId, value, priorAcceptedNumber}`.

use std::convert::TryFrom;

use serde_derive::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::state;

/// Totally ordered `(round, tag)` pair identifying one proposal attempt.
///
/// Ordering compares `round` first and breaks ties with `tag`, which is
/// unique per member, so two distinct proposers never produce equal numbers.
#[derive(Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
#[derive(Copy, Clone, Default, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProposalNumber {
    pub round: u64,
    pub tag: u64,
}

impl ProposalNumber {
    pub fn new(round: u64, tag: u64) -> Self {
        ProposalNumber { round, tag }
    }

    /// Advances the proposer's private round counter and returns the fresh number.
    /// Returns `None`, leaving the counter untouched, once rounds are exhausted.
    pub fn next(round: &mut u64, tag: u64) -> Option<Self> {
        *round = round.checked_add(1)?;
        Some(ProposalNumber { round: *round, tag })
    }
}

impl std::fmt::Display for ProposalNumber {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(fmt, "{}.{}", self.round, self.tag)
    }
}

impl std::str::FromStr for ProposalNumber {
    type Err = DecodeError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || DecodeError::ProposalNumber(s.to_string());
        let mut parts = s.trim().splitn(2, '.');
        let round = parts.next()
            .and_then(|round| round.parse().ok())
            .ok_or_else(malformed)?;
        let tag = parts.next()
            .and_then(|tag| tag.parse().ok())
            .ok_or_else(malformed)?;
        Ok(ProposalNumber { round, tag })
    }
}

impl TryFrom<String> for ProposalNumber {
    type Error = DecodeError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ProposalNumber> for String {
    fn from(number: ProposalNumber) -> Self {
        number.to_string()
    }
}

/// A value together with the proposal number it was accepted under.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PValue<V: state::Value> {
    pub number: ProposalNumber,
    pub value: V,
}

/// Phase 1a: proposer asks acceptors to promise `number`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Prepare {
    pub sender: String,
    pub number: ProposalNumber,
}

/// Phase 1b: acceptor promises `number`, reporting what it last accepted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Promise<V: state::Value> {
    pub sender: String,
    pub number: ProposalNumber,
    pub prior: Option<PValue<V>>,
}

/// Phase 2a: proposer asks acceptors to accept `value` under `number`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AcceptRequest<V: state::Value> {
    pub sender: String,
    pub number: ProposalNumber,
    pub value: V,
}

/// Phase 2b: acceptor announces it accepted `value` under `number`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Accepted<V: state::Value> {
    pub sender: String,
    pub number: ProposalNumber,
    pub value: V,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message<V: state::Value> {
    Prepare(Prepare),
    Promise(Promise<V>),
    AcceptRequest(AcceptRequest<V>),
    Accepted(Accepted<V>),
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Kind {
    Prepare,
    Promise,
    AcceptRequest,
    Accepted,
}

impl Kind {
    fn name(self) -> &'static str {
        match self {
        | Kind::Prepare => "PREPARE",
        | Kind::Promise => "PROMISE",
        | Kind::AcceptRequest => "ACCEPT_REQUEST",
        | Kind::Accepted => "ACCEPTED",
        }
    }
}

/// Flat on-the-wire shape. Proposal numbers stay strings here so that a
/// malformed number is reported as such rather than as a JSON error.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(bound(serialize = "", deserialize = ""))]
struct Wire<V: state::Value> {
    #[serde(rename = "type")]
    kind: Kind,
    proposal_number: String,
    sender_id: String,
    #[serde(default)]
    value: Option<V>,
    #[serde(default)]
    prior_accepted_number: Option<String>,
}

impl<V: state::Value> Message<V> {
    pub fn number(&self) -> ProposalNumber {
        match self {
        | Message::Prepare(m) => m.number,
        | Message::Promise(m) => m.number,
        | Message::AcceptRequest(m) => m.number,
        | Message::Accepted(m) => m.number,
        }
    }

    pub fn sender(&self) -> &str {
        match self {
        | Message::Prepare(m) => &m.sender,
        | Message::Promise(m) => &m.sender,
        | Message::AcceptRequest(m) => &m.sender,
        | Message::Accepted(m) => &m.sender,
        }
    }

    /// Wire tag of this message.
    pub fn kind(&self) -> &'static str {
        self.wire_kind().name()
    }

    fn wire_kind(&self) -> Kind {
        match self {
        | Message::Prepare(_) => Kind::Prepare,
        | Message::Promise(_) => Kind::Promise,
        | Message::AcceptRequest(_) => Kind::AcceptRequest,
        | Message::Accepted(_) => Kind::Accepted,
        }
    }

    /// Encodes this message as a single line of JSON, without the trailing newline.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        let kind = self.wire_kind();
        let proposal_number = self.number().to_string();
        let sender_id = self.sender().to_string();
        let (value, prior_accepted_number) = match self {
        | Message::Prepare(_) => (None, None),
        | Message::Promise(m) => match &m.prior {
            | Some(prior) => (Some(prior.value.clone()), Some(prior.number.to_string())),
            | None => (None, None),
        },
        | Message::AcceptRequest(m) => (Some(m.value.clone()), None),
        | Message::Accepted(m) => (Some(m.value.clone()), None),
        };
        serde_json::to_string(&Wire {
            kind,
            proposal_number,
            sender_id,
            value,
            prior_accepted_number,
        })
    }

    /// Decodes and validates one wire line.
    pub fn decode(line: &str) -> Result<Self, DecodeError> {
        let wire: Wire<V> = serde_json::from_str(line.trim())?;
        let number = wire.proposal_number.parse()?;
        let sender = wire.sender_id;
        let kind = wire.kind.name();
        let required = |value: Option<V>| value.ok_or(DecodeError::MissingField { kind, field: "value" });
        let message = match wire.kind {
        | Kind::Prepare => Message::Prepare(Prepare { sender, number }),
        | Kind::Promise => {
            let prior = match (wire.prior_accepted_number, wire.value) {
            | (Some(prior), Some(value)) => Some(PValue { number: prior.parse()?, value }),
            | (None, None) => None,
            | _ => return Err(DecodeError::PartialPrior),
            };
            Message::Promise(Promise { sender, number, prior })
        }
        | Kind::AcceptRequest => Message::AcceptRequest(AcceptRequest {
            sender,
            number,
            value: required(wire.value)?,
        }),
        | Kind::Accepted => Message::Accepted(Accepted {
            sender,
            number,
            value: required(wire.value)?,
        }),
        };
        Ok(message)
    }
}
