//! # Summary
//!
//! The three Paxos roles every council member plays. Each role is a plain
//! state machine with no I/O: handlers take a decoded message and report
//! what should happen next, leaving sending, locking and timers to
//! [`crate::Engine`].

/// Promise/accept memory.
pub(crate) mod acceptor;

/// Decision detection.
pub(crate) mod learner;

/// Round driver.
pub(crate) mod proposer;
