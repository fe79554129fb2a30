//! Error taxonomy shared by the pool, the vault and their collaborators.

/// Every failure aborts the whole operation; see [`crate::Engine::transact`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum OliveError {
    /// Null account, zero amount, inverted time range or out-of-bounds leverage
    #[error("invalid argument")]
    InvalidArgument,

    /// Caller lacks the capability or allow-list membership
    #[error("unauthorized")]
    Unauthorized,

    /// Global circuit breaker is off
    #[error("protocol disabled")]
    Disabled,

    /// Pool cannot fund a borrow or withdrawal
    #[error("insufficient liquidity")]
    InsufficientLiquidity,

    /// Burn exceeds the holder's balance
    #[error("insufficient shares")]
    InsufficientShares,

    /// Operation would leave, or found, hf < 1 where not permitted
    #[error("health factor violation")]
    HealthFactorViolation,

    /// Minimum output not met
    #[error("slippage")]
    Slippage,

    /// Current time is past the caller's deadline
    #[error("deadline expired")]
    DeadlineExpired,

    /// Checked arithmetic overflowed
    #[error("math overflow")]
    MathOverflow,

    /// Configuration failed validation or could not be parsed
    #[error("invalid config")]
    InvalidConfig,

    /// An external collaborator (ledger, oracle, strategy, ...) refused the call
    #[error("collaborator failure")]
    CollaboratorFailure,

    /// Account already acted at this timestamp and the same-block guard is on
    #[error("same block transaction")]
    SameBlockTransaction,
}

pub type Result<T> = core::result::Result<T, OliveError>;
