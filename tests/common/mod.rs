//! In-memory council for integration tests. Messages are routed between
//! engines on spawned tasks, so delivery order is up to the scheduler.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use council_paxos::{Decision, Delivery, Engine, Message, NodeContext, PeerDirectory, Transport};
use parking_lot::{Mutex, RwLock};
use rand::Rng;

/// One recorded send: `(from, to, message)`.
pub type Sent = (String, String, Message<String>);

#[derive(Default)]
pub struct Network {
    engines: RwLock<HashMap<String, Engine<String>>>,
    partitioned: RwLock<HashSet<String>>,
    sent: Mutex<Vec<Sent>>,
}

impl Network {
    /// Cuts `member` off: nothing it sends or is sent arrives.
    pub fn partition(&self, member: &str) {
        self.partitioned.write().insert(member.to_string());
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().clone()
    }

    /// Recorded sends of one wire type.
    pub fn sent_of(&self, kind: &str) -> Vec<Sent> {
        self.sent()
            .into_iter()
            .filter(|(_, _, message)| message.kind() == kind)
            .collect()
    }
}

/// The transport half handed to a single engine.
pub struct Link {
    from: String,
    network: Arc<Network>,
}

impl Transport for Link {
    fn send_to(&self, member: &str, line: String) {
        if let Ok(message) = Message::decode(&line) {
            self.network.sent.lock().push((self.from.clone(), member.to_string(), message));
        }
        {
            let partitioned = self.network.partitioned.read();
            if partitioned.contains(member) || partitioned.contains(&self.from) {
                return
            }
        }
        if let Some(engine) = self.network.engines.read().get(member).cloned() {
            tokio::spawn(async move { engine.handle_message(&line).await });
        }
    }
}

/// Delivers everything instantly.
#[derive(Copy, Clone, Debug)]
pub struct Instant;

impl Delivery for Instant {
    fn delay(&self) -> Duration {
        Duration::from_millis(0)
    }

    fn should_drop(&self) -> bool {
        false
    }
}

/// Random delay up to `jitter_ms`, dropping with probability `drop`.
#[derive(Copy, Clone, Debug)]
pub struct Lossy {
    pub jitter_ms: u64,
    pub drop: f64,
}

impl Delivery for Lossy {
    fn delay(&self) -> Duration {
        Duration::from_millis(rand::thread_rng().gen_range(0..=self.jitter_ms))
    }

    fn should_drop(&self) -> bool {
        self.drop > 0.0 && rand::thread_rng().gen_bool(self.drop)
    }
}

/// Drops every message.
#[derive(Copy, Clone, Debug)]
pub struct BlackHole;

impl Delivery for BlackHole {
    fn delay(&self) -> Duration {
        Duration::from_millis(0)
    }

    fn should_drop(&self) -> bool {
        true
    }
}

pub fn ids(size: usize) -> Vec<String> {
    (1..=size).map(|i| format!("M{}", i)).collect()
}

pub fn directory(size: usize) -> PeerDirectory {
    ids(size)
        .iter()
        .enumerate()
        .map(|(i, id)| format!("{},localhost,{}\n", id, 9001 + i))
        .collect::<String>()
        .parse()
        .expect("valid directory")
}

/// Builds a council of `size` members `M1..Mn`, each with the delivery policy
/// returned by `delivery` for its ID.
pub fn council<D, F>(size: usize, retry: Duration, delivery: F) -> (Arc<Network>, Vec<Engine<String>>)
where
    D: Delivery,
    F: Fn(&str) -> D,
{
    let network = Arc::new(Network::default());
    let directory = directory(size);
    let engines = ids(size)
        .into_iter()
        .map(|id| {
            let context = NodeContext::new(id.clone(), directory.clone())
                .expect("member in directory")
                .with_retry_delay(retry);
            let link = Link { from: id.clone(), network: network.clone() };
            let engine = Engine::new(context, delivery(&id), Arc::new(link));
            network.engines.write().insert(id, engine.clone());
            engine
        })
        .collect();
    (network, engines)
}

pub fn decisions(engines: &[Engine<String>]) -> Vec<Option<Decision<String>>> {
    engines.iter().map(Engine::decision).collect()
}

/// Lets virtual time pass so in-flight messages and timers run.
pub async fn settle(duration: Duration) {
    tokio::time::sleep(duration).await;
}

/// Wire line for a message, as a peer would send it.
pub fn line(message: Message<String>) -> String {
    message.encode().expect("encodable")
}
