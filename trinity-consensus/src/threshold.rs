//! Threshold rules and the verdict over per-chain outcomes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use trinity_common::{ChainId, ChainVerificationStatus, ConsensusStatus, Result, TrinityError};

/// How many of the required chains must verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ThresholdPolicy {
    /// `floor(n / 2) + 1`, so 2-of-3 and 2-of-2.
    #[default]
    Majority,
    All,
    AtLeast(usize),
}

impl ThresholdPolicy {
    /// Verified chains needed out of `chains` required chains.
    pub fn required(&self, chains: usize) -> Result<usize> {
        if chains == 0 {
            return Err(TrinityError::invalid_params("at least one chain is required"));
        }
        match *self {
            ThresholdPolicy::Majority => Ok(chains / 2 + 1),
            ThresholdPolicy::All => Ok(chains),
            ThresholdPolicy::AtLeast(n) if (1..=chains).contains(&n) => Ok(n),
            ThresholdPolicy::AtLeast(n) => Err(TrinityError::invalid_params(format!(
                "threshold {n} is not satisfiable with {chains} chains"
            ))),
        }
    }
}

impl fmt::Display for ThresholdPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThresholdPolicy::Majority => f.write_str("majority"),
            ThresholdPolicy::All => f.write_str("all"),
            ThresholdPolicy::AtLeast(n) => write!(f, "{n}"),
        }
    }
}

impl FromStr for ThresholdPolicy {
    type Err = TrinityError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "majority" => Ok(ThresholdPolicy::Majority),
            "all" => Ok(ThresholdPolicy::All),
            other => other
                .parse::<usize>()
                .map(ThresholdPolicy::AtLeast)
                .map_err(|_| TrinityError::invalid_params(format!("unknown threshold {s}"))),
        }
    }
}

/// Overall status for a set of per-chain outcomes.
///
/// Only counts matter, so the verdict does not depend on arrival order.
/// `Pending` is returned only while the deadline is open and some chain
/// has not reported.
pub fn decide<I>(threshold: usize, statuses: I, deadline_passed: bool) -> ConsensusStatus
where
    I: IntoIterator<Item = ChainVerificationStatus>,
{
    let mut verified = 0;
    let mut outstanding = 0;
    for status in statuses {
        match status {
            ChainVerificationStatus::Verified => verified += 1,
            ChainVerificationStatus::Pending => outstanding += 1,
            _ => {}
        }
    }
    if verified >= threshold {
        ConsensusStatus::Verified
    } else if outstanding > 0 && !deadline_passed {
        ConsensusStatus::Pending
    } else {
        ConsensusStatus::Rejected
    }
}

/// Chains a vault at `level` must be confirmed on.
pub fn chains_for_security_level(level: u8) -> Vec<ChainId> {
    match level {
        4.. => ChainId::ALL.to_vec(),
        3 => vec![ChainId::Ethereum, ChainId::Solana],
        _ => vec![ChainId::Ethereum],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ChainVerificationStatus::*;

    #[test]
    fn test_required_counts() {
        assert_eq!(ThresholdPolicy::Majority.required(3).unwrap(), 2);
        assert_eq!(ThresholdPolicy::Majority.required(2).unwrap(), 2);
        assert_eq!(ThresholdPolicy::Majority.required(1).unwrap(), 1);
        assert_eq!(ThresholdPolicy::All.required(3).unwrap(), 3);
        assert_eq!(ThresholdPolicy::AtLeast(1).required(3).unwrap(), 1);
        assert!(ThresholdPolicy::AtLeast(4).required(3).is_err());
        assert!(ThresholdPolicy::AtLeast(0).required(3).is_err());
        assert!(ThresholdPolicy::Majority.required(0).is_err());
    }

    #[test]
    fn test_parse() {
        assert_eq!("majority".parse::<ThresholdPolicy>().unwrap(), ThresholdPolicy::Majority);
        assert_eq!("ALL".parse::<ThresholdPolicy>().unwrap(), ThresholdPolicy::All);
        assert_eq!("2".parse::<ThresholdPolicy>().unwrap(), ThresholdPolicy::AtLeast(2));
        assert!("most".parse::<ThresholdPolicy>().is_err());
    }

    #[test]
    fn test_two_verified_one_unreachable() {
        assert_eq!(decide(2, [Verified, Verified, Unavailable], true), ConsensusStatus::Verified);
        assert_eq!(decide(2, [Verified, Timeout, Verified], true), ConsensusStatus::Verified);
    }

    #[test]
    fn test_one_verified_two_rejected() {
        assert_eq!(decide(2, [Verified, Rejected, Rejected], true), ConsensusStatus::Rejected);
        assert_eq!(decide(2, [Rejected, Timeout, Verified], true), ConsensusStatus::Rejected);
    }

    #[test]
    fn test_pending_only_while_deadline_open() {
        assert_eq!(decide(2, [Verified, Pending, Rejected], false), ConsensusStatus::Pending);
        assert_eq!(decide(2, [Verified, Pending, Rejected], true), ConsensusStatus::Rejected);
    }

    #[test]
    fn test_security_levels() {
        assert_eq!(chains_for_security_level(5), ChainId::ALL.to_vec());
        assert_eq!(chains_for_security_level(4).len(), 3);
        assert_eq!(
            chains_for_security_level(3),
            vec![ChainId::Ethereum, ChainId::Solana]
        );
        assert_eq!(chains_for_security_level(1), vec![ChainId::Ethereum]);
        assert_eq!(chains_for_security_level(0), vec![ChainId::Ethereum]);
    }
}
