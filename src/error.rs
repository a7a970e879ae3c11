//! Error type shared by every component of the engine.
//!
//! Each variant carries a stable upper-snake code (see [`EngineError::code`])
//! so callers and replaying validators can match on the failure kind
//! without parsing messages. Any error returned by a handler aborts the
//! whole transaction.

use thiserror::Error;

use crate::types::Amount;

/// All failures surfaced by the engine.
#[derive(Error, Debug)]
pub enum EngineError {
    // ------------------------------------------------------------------
    // Odds arithmetic
    // ------------------------------------------------------------------
    #[error("invalid {kind} odds format '{value}': {reason}")]
    InvalidOddsFormat {
        kind: &'static str,
        value: String,
        reason: String,
    },

    #[error("odds value must be positive: {0}")]
    OddsNotPositive(String),

    #[error("decimal odds must be greater than one: {0}")]
    OddsLessOrEqualOne(String),

    #[error("moneyline odds can not be zero")]
    OddsZero,

    // ------------------------------------------------------------------
    // Markets
    // ------------------------------------------------------------------
    #[error("market not found: {0}")]
    MarketNotFound(String),

    #[error("market {uid} is not active (status {status})")]
    MarketNotActive { uid: String, status: String },

    #[error("bet placement is closed for market {0}")]
    MarketPlacementClosed(String),

    #[error("odds {odds_uid} does not exist in market {market_uid}")]
    MarketInvalidOddsUid {
        market_uid: String,
        odds_uid: String,
    },

    #[error("odds {odds_uid} of market {market_uid} quoted differently: {reason}")]
    MarketOddsMismatch {
        market_uid: String,
        odds_uid: String,
        reason: String,
    },

    #[error("market already exists: {0}")]
    MarketAlreadyExists(String),

    #[error("invalid market: {0}")]
    MarketInvalid(String),

    #[error("market {uid} can not move from {from} to {to}")]
    MarketStatusTransition {
        uid: String,
        from: String,
        to: String,
    },

    #[error("odds {odds_uid} of market {market_uid} has locked exposure and can not change")]
    OddsUpdateLocked {
        market_uid: String,
        odds_uid: String,
    },

    // ------------------------------------------------------------------
    // Order book
    // ------------------------------------------------------------------
    #[error("insufficient liquidity: required {required}, available {available}")]
    InsufficientLiquidity { required: Amount, available: Amount },

    #[error("participation {index} not found in market {market_uid}")]
    ParticipationNotFound { market_uid: String, index: u64 },

    #[error("participation {index} of market {market_uid} is not settled")]
    ParticipationNotSettled { market_uid: String, index: u64 },

    // ------------------------------------------------------------------
    // Bets
    // ------------------------------------------------------------------
    #[error("bet amount {amount} is lower than minimum {min}")]
    BetAmountTooLow { amount: Amount, min: Amount },

    #[error("bet {0} would pay no profit")]
    BetPayoutProfitZero(String),

    #[error("bet uid already exists: {0}")]
    BetUidExists(String),

    #[error("bet not found: {bettor}/{uid}")]
    BetNotFound { bettor: String, uid: String },

    // ------------------------------------------------------------------
    // Tickets and oracle
    // ------------------------------------------------------------------
    #[error("invalid ticket: {0}")]
    TicketInvalid(String),

    #[error("ticket expired at {expiration}, block time {now}")]
    TicketExpired { expiration: u64, now: u64 },

    #[error("ticket carries {valid} valid signatures, threshold is {threshold}")]
    TicketSignatureThresholdUnmet { valid: u32, threshold: u32 },

    // ------------------------------------------------------------------
    // House ledger
    // ------------------------------------------------------------------
    #[error("deposit {amount} is lower than minimum {min}")]
    DepositTooLow { amount: Amount, min: Amount },

    #[error("deposit not found: {depositor}/{market_uid}/{index}")]
    DepositNotFound {
        depositor: String,
        market_uid: String,
        index: u64,
    },

    #[error("withdrawal of {requested} exceeds withdrawable {withdrawable}")]
    WithdrawExceedsBalance {
        requested: Amount,
        withdrawable: Amount,
    },

    #[error("full withdrawal must request exactly {withdrawable}, got {requested}")]
    WithdrawModeMismatch {
        requested: Amount,
        withdrawable: Amount,
    },

    #[error("amount must be positive, got {0}")]
    InvalidAmount(Amount),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("authorization allowance {allowance} is lower than {requested}")]
    AuthorizationExceeded { allowance: Amount, requested: Amount },

    // ------------------------------------------------------------------
    // Bank
    // ------------------------------------------------------------------
    #[error("insufficient funds in {address}: balance {balance}, required {required}")]
    InsufficientFunds {
        address: String,
        balance: Amount,
        required: Amount,
    },

    // ------------------------------------------------------------------
    // Parameters and configuration
    // ------------------------------------------------------------------
    #[error("invalid parameter type for {param}: {reason}")]
    ParamInvalidType { param: String, reason: String },

    #[error("parameter {param} out of range: {reason}")]
    ParamOutOfRange { param: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ConfigRead(#[from] std::io::Error),

    // ------------------------------------------------------------------
    // Internal
    // ------------------------------------------------------------------
    #[error("key component is {len} bytes, at most {max} allowed")]
    KeyTooLong { len: usize, max: usize },

    #[error("arithmetic overflow in {0}")]
    ArithmeticOverflow(&'static str),

    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl EngineError {
    /// Stable code identifying the failure kind.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::InvalidOddsFormat { .. } => "INVALID_ODDS_FORMAT",
            EngineError::OddsNotPositive(_) => "ODDS_NOT_POSITIVE",
            EngineError::OddsLessOrEqualOne(_) => "ODDS_LE_ONE",
            EngineError::OddsZero => "ODDS_ZERO",
            EngineError::MarketNotFound(_) => "MARKET_NOT_FOUND",
            EngineError::MarketNotActive { .. } => "MARKET_NOT_ACTIVE",
            EngineError::MarketPlacementClosed(_) => "MARKET_PLACEMENT_CLOSED",
            EngineError::MarketInvalidOddsUid { .. } => "MARKET_INVALID_ODDS_UID",
            EngineError::MarketOddsMismatch { .. } => "MARKET_ODDS_MISMATCH",
            EngineError::MarketAlreadyExists(_) => "MARKET_ALREADY_EXISTS",
            EngineError::MarketInvalid(_) => "MARKET_INVALID",
            EngineError::MarketStatusTransition { .. } => "MARKET_STATUS_TRANSITION",
            EngineError::OddsUpdateLocked { .. } => "ODDS_UPDATE_LOCKED",
            EngineError::InsufficientLiquidity { .. } => "INSUFFICIENT_LIQUIDITY",
            EngineError::ParticipationNotFound { .. } => "PARTICIPATION_NOT_FOUND",
            EngineError::ParticipationNotSettled { .. } => "PARTICIPATION_NOT_SETTLED",
            EngineError::BetAmountTooLow { .. } => "BET_AMOUNT_TOO_LOW",
            EngineError::BetPayoutProfitZero(_) => "BET_PAYOUT_PROFIT_ZERO",
            EngineError::BetUidExists(_) => "BET_UID_EXISTS",
            EngineError::BetNotFound { .. } => "BET_NOT_FOUND",
            EngineError::TicketInvalid(_) => "TICKET_INVALID",
            EngineError::TicketExpired { .. } => "TICKET_EXPIRED",
            EngineError::TicketSignatureThresholdUnmet { .. } => {
                "TICKET_SIGNATURE_THRESHOLD_UNMET"
            }
            EngineError::DepositTooLow { .. } => "DEPOSIT_TOO_LOW",
            EngineError::DepositNotFound { .. } => "DEPOSIT_NOT_FOUND",
            EngineError::WithdrawExceedsBalance { .. } => "WITHDRAW_EXCEEDS_BALANCE",
            EngineError::WithdrawModeMismatch { .. } => "WITHDRAW_MODE_MISMATCH",
            EngineError::InvalidAmount(_) => "INVALID_AMOUNT",
            EngineError::Unauthorized(_) => "UNAUTHORIZED",
            EngineError::AuthorizationExceeded { .. } => "AUTHORIZATION_EXCEEDED",
            EngineError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            EngineError::ParamInvalidType { .. } => "PARAM_INVALID_TYPE",
            EngineError::ParamOutOfRange { .. } => "PARAM_OUT_OF_RANGE",
            EngineError::ConfigRead(_) => "CONFIG",
            EngineError::KeyTooLong { .. } => "KEY_TOO_LONG",
            EngineError::ArithmeticOverflow(_) => "ARITHMETIC_OVERFLOW",
            EngineError::Codec(_) => "CODEC",
            EngineError::InvariantViolation(_) => "INVARIANT_VIOLATION",
        }
    }

    /// Whether the host should treat this failure as consensus-halting.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::InvariantViolation(_))
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = EngineError> = std::result::Result<T, E>;
