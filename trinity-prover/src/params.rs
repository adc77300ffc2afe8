//! Predicate parameter schema.
//!
//! [`PredicateParams`] holds the private side of a proof request. The only
//! way out of it into a proof record is [`PredicateParams::public_inputs`],
//! which builds the whitelisted projection.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use trinity_common::{
    ChainId, ParamBag, PredicateInputs, PredicateType, Result, TimeConditionKind, TrinityError,
};

/// Token identifier used when a balance range names no token.
pub const NATIVE_TOKEN: &str = "native";

#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "predicate", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PredicateParams {
    Ownership {
        address: String,
        nonce: String,
    },
    ContentExistence {
        content_hash: String,
        timestamp: u64,
        /// Underlying content; when present it must hash to `content_hash`.
        content: Option<String>,
    },
    TimeCondition {
        condition: TimeConditionKind,
        window_start: u64,
        window_end: u64,
    },
    BalanceRange {
        min_amount: u128,
        max_amount: u128,
        token_address: Option<String>,
    },
    AccessRights {
        resource_id: String,
        required_level: u32,
    },
    MultiParty {
        participants: Vec<String>,
        threshold: u32,
        operation: String,
    },
}

// Private bounds, levels and participant identities stay out of logs.
impl fmt::Debug for PredicateParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicateParams")
            .field("predicate", &self.predicate_type())
            .finish_non_exhaustive()
    }
}

impl PredicateParams {
    pub fn predicate_type(&self) -> PredicateType {
        match self {
            PredicateParams::Ownership { .. } => PredicateType::Ownership,
            PredicateParams::ContentExistence { .. } => PredicateType::ContentExistence,
            PredicateParams::TimeCondition { .. } => PredicateType::TimeCondition,
            PredicateParams::BalanceRange { .. } => PredicateType::BalanceRange,
            PredicateParams::AccessRights { .. } => PredicateType::AccessRights,
            PredicateParams::MultiParty { .. } => PredicateType::MultiParty,
        }
    }

    /// Reject missing or inconsistent parameters.
    pub fn validate(&self) -> Result<()> {
        match self {
            PredicateParams::Ownership { address, nonce } => {
                require_non_empty("address", address)?;
                require_non_empty("nonce", nonce)
            }
            PredicateParams::ContentExistence {
                content_hash,
                content,
                ..
            } => {
                require_non_empty("contentHash", content_hash)?;
                if let Some(content) = content {
                    let expected = content_hash_of(content.as_bytes());
                    if !expected.eq_ignore_ascii_case(content_hash) {
                        return Err(TrinityError::invalid_params(
                            "content does not match contentHash",
                        ));
                    }
                }
                Ok(())
            }
            PredicateParams::TimeCondition {
                window_start,
                window_end,
                ..
            } => {
                if window_start >= window_end {
                    return Err(TrinityError::invalid_params(
                        "time window start must precede its end",
                    ));
                }
                Ok(())
            }
            PredicateParams::BalanceRange {
                min_amount,
                max_amount,
                token_address,
            } => {
                if min_amount > max_amount {
                    return Err(TrinityError::invalid_params(
                        "minAmount must not exceed maxAmount",
                    ));
                }
                if let Some(token) = token_address {
                    require_non_empty("tokenAddress", token)?;
                }
                Ok(())
            }
            PredicateParams::AccessRights { resource_id, .. } => {
                require_non_empty("resourceId", resource_id)
            }
            PredicateParams::MultiParty {
                participants,
                threshold,
                operation,
            } => {
                require_non_empty("operation", operation)?;
                if participants.is_empty() {
                    return Err(TrinityError::invalid_params("participants must not be empty"));
                }
                if *threshold == 0 || *threshold as usize > participants.len() {
                    return Err(TrinityError::invalid_params(format!(
                        "threshold must be between 1 and {}",
                        participants.len()
                    )));
                }
                Ok(())
            }
        }
    }

    /// The secret-free projection stored on the proof.
    pub fn public_inputs(&self) -> PredicateInputs {
        match self {
            PredicateParams::Ownership { address, nonce } => PredicateInputs::Ownership {
                address: address.clone(),
                nonce: nonce.clone(),
            },
            PredicateParams::ContentExistence {
                content_hash,
                timestamp,
                ..
            } => PredicateInputs::ContentExistence {
                content_hash: content_hash.clone(),
                timestamp: *timestamp,
            },
            PredicateParams::TimeCondition { condition, .. } => PredicateInputs::TimeCondition {
                condition: *condition,
                has_time_window: true,
            },
            PredicateParams::BalanceRange { token_address, .. } => PredicateInputs::BalanceRange {
                token_address: token_address
                    .clone()
                    .unwrap_or_else(|| NATIVE_TOKEN.to_string()),
                has_range_constraint: true,
            },
            PredicateParams::AccessRights { resource_id, .. } => PredicateInputs::AccessRights {
                resource_id: resource_id.clone(),
                has_access_check: true,
            },
            PredicateParams::MultiParty {
                participants,
                threshold,
                operation,
            } => PredicateInputs::MultiParty {
                participant_count: u32::try_from(participants.len()).unwrap_or(u32::MAX),
                threshold: *threshold,
                operation: operation.clone(),
            },
        }
    }

    /// Canonical encoding of the full parameter set, fed into the witness.
    pub(crate) fn private_material(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Build typed parameters from an untyped JSON bag.
    ///
    /// Accepts the camelCase keys callers send over HTTP: `address`, `nonce`,
    /// `contentHash`, `timestamp`, `content`, `condition`, `timeWindow`
    /// (`{start, end}`) or `windowStart`/`windowEnd`, `minAmount`,
    /// `maxAmount`, `tokenAddress`, `resourceId`, `requiredLevel`,
    /// `participants`, `threshold`, `operation`.
    pub fn from_param_bag(predicate: PredicateType, bag: &ParamBag) -> Result<Self> {
        let params = match predicate {
            PredicateType::Ownership => PredicateParams::Ownership {
                address: required_str(bag, "address")?,
                nonce: required_string_like(bag, "nonce")?,
            },
            PredicateType::ContentExistence => PredicateParams::ContentExistence {
                content_hash: required_str(bag, "contentHash")?,
                timestamp: required_u64(bag, "timestamp")?,
                content: optional_str(bag, "content")?,
            },
            PredicateType::TimeCondition => {
                let condition = required_str(bag, "condition")?.parse()?;
                let (window_start, window_end) = match bag.get("timeWindow") {
                    Some(Value::Object(window)) => (
                        as_u64("timeWindow.start", window.get("start"))?,
                        as_u64("timeWindow.end", window.get("end"))?,
                    ),
                    Some(_) => {
                        return Err(TrinityError::invalid_params(
                            "timeWindow must be an object with start and end",
                        ))
                    }
                    None => (
                        required_u64(bag, "windowStart")?,
                        required_u64(bag, "windowEnd")?,
                    ),
                };
                PredicateParams::TimeCondition {
                    condition,
                    window_start,
                    window_end,
                }
            }
            PredicateType::BalanceRange => PredicateParams::BalanceRange {
                min_amount: required_u128(bag, "minAmount")?,
                max_amount: required_u128(bag, "maxAmount")?,
                token_address: optional_str(bag, "tokenAddress")?,
            },
            PredicateType::AccessRights => PredicateParams::AccessRights {
                resource_id: required_str(bag, "resourceId")?,
                required_level: u32::try_from(required_u64(bag, "requiredLevel")?)
                    .map_err(|_| TrinityError::invalid_params("requiredLevel out of range"))?,
            },
            PredicateType::MultiParty => {
                let participants = match bag.get("participants") {
                    Some(Value::Array(items)) => items
                        .iter()
                        .map(|item| {
                            item.as_str().map(str::to_string).ok_or_else(|| {
                                TrinityError::invalid_params("participants must be strings")
                            })
                        })
                        .collect::<Result<Vec<_>>>()?,
                    _ => return Err(missing("participants")),
                };
                PredicateParams::MultiParty {
                    participants,
                    threshold: u32::try_from(required_u64(bag, "threshold")?)
                        .map_err(|_| TrinityError::invalid_params("threshold out of range"))?,
                    operation: required_str(bag, "operation")?,
                }
            }
            PredicateType::Identity => {
                return Err(TrinityError::invalid_params(
                    "IDENTITY proofs have no parameter schema",
                ))
            }
        };
        params.validate()?;
        Ok(params)
    }
}

/// Hash used for content existence: `0x` + blake3 hex.
pub fn content_hash_of(content: &[u8]) -> String {
    format!("0x{}", blake3::hash(content).to_hex())
}

/// Transient input to proof generation; never persisted.
#[derive(Debug, Clone)]
pub struct ProofRequest {
    pub vault_id: String,
    pub params: PredicateParams,
    /// Chains this request may be generated for; empty means any.
    pub target_chains: Vec<ChainId>,
}

impl ProofRequest {
    pub fn new(vault_id: impl Into<String>, params: PredicateParams) -> Self {
        Self {
            vault_id: vault_id.into(),
            params,
            target_chains: Vec::new(),
        }
    }

    pub fn with_target_chains(mut self, chains: impl IntoIterator<Item = ChainId>) -> Self {
        self.target_chains = chains.into_iter().collect();
        self
    }

    pub fn from_param_bag(
        vault_id: impl Into<String>,
        predicate: PredicateType,
        bag: &ParamBag,
    ) -> Result<Self> {
        Ok(Self::new(vault_id, PredicateParams::from_param_bag(predicate, bag)?))
    }

    pub fn predicate_type(&self) -> PredicateType {
        self.params.predicate_type()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BAG HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

fn missing(key: &str) -> TrinityError {
    TrinityError::invalid_params(format!("missing required parameter {key}"))
}

fn require_non_empty(key: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(TrinityError::invalid_params(format!("{key} must not be empty")));
    }
    Ok(())
}

fn required_str(bag: &ParamBag, key: &str) -> Result<String> {
    match bag.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(TrinityError::invalid_params(format!("{key} must be a string"))),
        None => Err(missing(key)),
    }
}

fn optional_str(bag: &ParamBag, key: &str) -> Result<Option<String>> {
    match bag.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(TrinityError::invalid_params(format!("{key} must be a string"))),
    }
}

/// Strings, or numbers rendered as strings (nonces arrive either way).
fn required_string_like(bag: &ParamBag, key: &str) -> Result<String> {
    match bag.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(_) => Err(TrinityError::invalid_params(format!("{key} must be a string"))),
        None => Err(missing(key)),
    }
}

fn required_u64(bag: &ParamBag, key: &str) -> Result<u64> {
    match bag.get(key) {
        None => Err(missing(key)),
        value => as_u64(key, value),
    }
}

fn as_u64(key: &str, value: Option<&Value>) -> Result<u64> {
    let invalid = || TrinityError::invalid_params(format!("{key} must be a non-negative integer"));
    match value {
        Some(Value::Number(n)) => n.as_u64().ok_or_else(invalid),
        Some(Value::String(s)) => s.trim().parse().map_err(|_| invalid()),
        Some(_) => Err(invalid()),
        None => Err(missing(key)),
    }
}

fn required_u128(bag: &ParamBag, key: &str) -> Result<u128> {
    let invalid = || TrinityError::invalid_params(format!("{key} must be a non-negative integer"));
    match bag.get(key) {
        Some(Value::Number(n)) => n.as_u64().map(u128::from).ok_or_else(invalid),
        Some(Value::String(s)) => s.trim().parse().map_err(|_| invalid()),
        Some(_) => Err(invalid()),
        None => Err(missing(key)),
    }
}
