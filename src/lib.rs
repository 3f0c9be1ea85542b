//! Single-decree Paxos among a fixed council of members.
//!
//! Every member runs an [`Engine`], which plays proposer, acceptor and
//! learner at once. Members talk to each other through a [`Transport`],
//! and every inbound message passes through a [`Delivery`] policy that
//! can delay or drop it to simulate an unreliable network.

#[macro_use] extern crate derivative;
#[macro_use] extern crate log;

mod config;
mod directory;
mod engine;
mod error;
mod message;
mod profile;
mod role;
mod socket;
mod state;

pub use crate::config::NodeContext;
pub use crate::directory::{Address, PeerDirectory};
pub use crate::engine::Engine;
pub use crate::error::{ConfigError, DecodeError};
pub use crate::message::{Accepted, AcceptRequest, Message, PValue, Prepare, Promise, ProposalNumber};
pub use crate::profile::{Delivery, DeliveryProfile};
pub use crate::role::acceptor::{Acceptor, Rejected};
pub use crate::role::learner::{Decision, Learner};
pub use crate::role::proposer::{Phase, Proposer};
pub use crate::socket::{serve, TcpTransport, Transport};
pub use crate::state::Value;
