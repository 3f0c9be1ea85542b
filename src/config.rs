use std::sync::Arc;
use std::time::Duration;

use crate::directory::PeerDirectory;
use crate::error::ConfigError;

/// Identity and tuning for one council member, built once at startup
/// and handed to the engine and transport.
#[derive(Clone, Debug)]
pub struct NodeContext {
    /// Member ID, as listed in the peer directory
    id: String,

    /// Proposer tag used to break ties between equal rounds
    tag: u64,

    /// Read-only view of the whole council
    directory: Arc<PeerDirectory>,

    /// How long a round may go without a decision before re-proposing
    retry_delay: Duration,

    /// Connection attempts per outbound message
    send_attempts: usize,

    /// Base delay between connection attempts, multiplied by the attempt number
    send_backoff: Duration,
}

impl NodeContext {
    pub fn new<I: Into<String>>(id: I, directory: PeerDirectory) -> Result<Self, ConfigError> {
        let id = id.into();
        directory.address(&id)?;
        let tag = tags(&directory)?
            .into_iter()
            .find(|(member, _)| *member == id)
            .map(|(_, tag)| tag)
            .ok_or_else(|| ConfigError::UnknownMember {
                id: id.clone(),
                known: directory.members().map(String::from).collect(),
            })?;
        Ok(NodeContext {
            id,
            tag,
            directory: Arc::new(directory),
            retry_delay: Duration::from_millis(3000),
            send_attempts: 5,
            send_backoff: Duration::from_millis(100),
        })
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_send_attempts(mut self, send_attempts: usize) -> Self {
        self.send_attempts = send_attempts.max(1);
        self
    }

    pub fn with_send_backoff(mut self, send_backoff: Duration) -> Self {
        self.send_backoff = send_backoff;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tag(&self) -> u64 {
        self.tag
    }

    pub fn directory(&self) -> &Arc<PeerDirectory> {
        &self.directory
    }

    pub fn quorum(&self) -> usize {
        self.directory.quorum()
    }

    /// Every member except this one.
    pub fn peers(&self) -> impl Iterator<Item = &str> {
        let id = self.id.as_str();
        self.directory.members().filter(move |member| *member != id)
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    pub fn send_attempts(&self) -> usize {
        self.send_attempts
    }

    pub fn send_backoff(&self) -> Duration {
        self.send_backoff
    }
}

/// Assigns every member its proposer tag: trailing digits of the ID when
/// present (`M4` is 4), otherwise its 1-based position in sorted order.
fn tags(directory: &PeerDirectory) -> Result<Vec<(&str, u64)>, ConfigError> {
    let mut assigned: Vec<(&str, u64)> = Vec::with_capacity(directory.len());
    for (index, member) in directory.members().enumerate() {
        let digits = member.len() - member.trim_end_matches(|c: char| c.is_ascii_digit()).len();
        let tag = member[member.len() - digits..]
            .parse::<u64>()
            .unwrap_or(index as u64 + 1);
        if let Some((first, _)) = assigned.iter().find(|(_, other)| *other == tag) {
            return Err(ConfigError::DuplicateTag {
                first: first.to_string(),
                second: member.to_string(),
                tag,
            })
        }
        assigned.push((member, tag));
    }
    Ok(assigned)
}
