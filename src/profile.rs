//! # Summary
//!
//! Fault injection for inbound messages. A [`Delivery`] policy decides how
//! long each message is held back and whether it is dropped outright; it
//! knows nothing about the protocol, so the engine accepts any policy.

use std::time::Duration;

use rand::Rng;

use crate::error::ConfigError;

/// Per-message delivery policy, sampled independently for every message.
pub trait Delivery: Send + Sync + 'static {
    /// Artificial delay to apply before the message is handled.
    fn delay(&self) -> Duration;

    /// Whether the message should be discarded.
    fn should_drop(&self) -> bool;
}

/// Named network reliability classes selectable at startup.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DeliveryProfile {
    /// No delay, no loss
    Reliable,

    /// Moderate delay, no loss
    Standard,

    /// Wide delay, no loss
    Latent,

    /// Moderate delay, and one in five messages lost
    Failure,
}

impl DeliveryProfile {
    /// Bounds of the uniformly sampled delay in milliseconds, as `[low, high)`.
    pub fn delay_bounds(self) -> Option<(u64, u64)> {
        match self {
        | DeliveryProfile::Reliable => None,
        | DeliveryProfile::Standard => Some((50, 150)),
        | DeliveryProfile::Latent => Some((500, 1500)),
        | DeliveryProfile::Failure => Some((100, 300)),
        }
    }

    pub fn drop_probability(self) -> f64 {
        match self {
        | DeliveryProfile::Failure => 0.2,
        | _ => 0.0,
        }
    }
}

impl Delivery for DeliveryProfile {
    fn delay(&self) -> Duration {
        match self.delay_bounds() {
        | Some((low, high)) => Duration::from_millis(rand::thread_rng().gen_range(low..high)),
        | None => Duration::from_millis(0),
        }
    }

    fn should_drop(&self) -> bool {
        let p = self.drop_probability();
        p > 0.0 && rand::thread_rng().gen_bool(p)
    }
}

impl std::str::FromStr for DeliveryProfile {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
        | "reliable" => Ok(DeliveryProfile::Reliable),
        | "standard" => Ok(DeliveryProfile::Standard),
        | "latent" => Ok(DeliveryProfile::Latent),
        | "failure" => Ok(DeliveryProfile::Failure),
        | _ => Err(ConfigError::UnknownProfile(s.to_string())),
        }
    }
}

impl std::fmt::Display for DeliveryProfile {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
        | DeliveryProfile::Reliable => "reliable",
        | DeliveryProfile::Standard => "standard",
        | DeliveryProfile::Latent => "latent",
        | DeliveryProfile::Failure => "failure",
        };
        write!(fmt, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [DeliveryProfile; 4] = [
        DeliveryProfile::Reliable,
        DeliveryProfile::Standard,
        DeliveryProfile::Latent,
        DeliveryProfile::Failure,
    ];

    #[test]
    fn names_parse_back() {
        for profile in ALL.iter() {
            assert_eq!(profile.to_string().parse::<DeliveryProfile>().unwrap(), *profile);
        }
        assert_eq!("FAILURE".parse::<DeliveryProfile>().unwrap(), DeliveryProfile::Failure);
        assert!(matches!(
            "flaky".parse::<DeliveryProfile>(),
            Err(ConfigError::UnknownProfile(_))
        ));
    }

    #[test]
    fn reliable_is_instant_and_lossless() {
        for _ in 0..1000 {
            assert_eq!(DeliveryProfile::Reliable.delay(), Duration::from_millis(0));
            assert!(!DeliveryProfile::Reliable.should_drop());
        }
    }

    #[test]
    fn delays_stay_within_bounds() {
        for profile in ALL.iter() {
            if let Some((low, high)) = profile.delay_bounds() {
                for _ in 0..500 {
                    let delay = profile.delay();
                    assert!(delay >= Duration::from_millis(low));
                    assert!(delay < Duration::from_millis(high));
                }
            }
        }
    }

    #[test]
    fn only_failure_drops() {
        for profile in &[DeliveryProfile::Standard, DeliveryProfile::Latent] {
            assert!((0..1000).all(|_| !profile.should_drop()));
        }
        let dropped = (0..10_000)
            .filter(|_| DeliveryProfile::Failure.should_drop())
            .count();
        assert!(dropped > 1_500 && dropped < 2_500, "dropped {} of 10000", dropped);
    }
}
