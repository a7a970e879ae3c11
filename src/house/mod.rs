//! House ledger.
//!
//! A house deposit becomes one participation of the market's order book.
//! The participation fee goes to the fee collector, the rest is held in
//! `house_reserve` until the market settles and the house withdraws:
//!
//! ```text
//! withdrawable = liquidity + actual_profit - total_withdrawn
//! ```
//!
//! Deposits and withdrawals may be signed by a grantee acting for the
//! depositor under an [`Authorization`].

use tracing::info;

use crate::bank::{Transfer, FEE_COLLECTOR, HOUSE_RESERVE};
use crate::engine::Ctx;
use crate::error::{EngineError, Result};
use crate::market::get_market;
use crate::orderbook::{self, query};
use crate::store::{get_value, keys, values_with_prefix, KvStore};
use crate::types::dec;
use crate::types::msgs::{MsgDeposit, MsgGrantAuthorization, MsgRevokeAuthorization, MsgWithdraw};
use crate::types::{
    Amount, Authorization, AuthorizationKind, Deposit, Event, MarketStatus, Withdrawal,
    WithdrawalMode,
};

// ============================================================================
// Queries
// ============================================================================

pub fn get_deposit(store: &dyn KvStore, depositor: &str, market_uid: &str, index: u64) -> Result<Deposit> {
    get_value(store, &keys::deposit(depositor, market_uid, index)?)?.ok_or_else(|| {
        EngineError::DepositNotFound {
            depositor: depositor.to_string(),
            market_uid: market_uid.to_string(),
            index,
        }
    })
}

/// Every deposit of `depositor`, ordered by market then participation.
pub fn deposits_of(store: &dyn KvStore, depositor: &str) -> Result<Vec<Deposit>> {
    values_with_prefix(store, &keys::deposits_of(depositor)?)
}

pub fn withdrawals_of(store: &dyn KvStore, depositor: &str, market_uid: &str) -> Result<Vec<Withdrawal>> {
    values_with_prefix(store, &keys::withdrawals_of(depositor, market_uid)?)
}

pub fn get_authorization(
    store: &dyn KvStore,
    granter: &str,
    grantee: &str,
    kind: AuthorizationKind,
    market_uid: &str,
) -> Result<Option<Authorization>> {
    get_value(store, &keys::authorization(granter, grantee, kind, market_uid)?)
}

/// Amount the depositor can still take out of a settled participation.
pub fn withdrawable(store: &dyn KvStore, depositor: &str, market_uid: &str, index: u64) -> Result<Amount> {
    let deposit = get_deposit(store, depositor, market_uid, index)?;
    let participation = query::participation(store, market_uid, index)?;
    dec::checked_sub(participation.settled_balance(), deposit.total_withdrawn, "withdrawable")
}

// ============================================================================
// Authorizations
// ============================================================================

/// Spend `amount` of the grant letting `grantee` act for `granter`.
///
/// An exhausted grant is removed.
fn consume_authorization(
    ctx: &mut Ctx<'_>,
    granter: &str,
    grantee: &str,
    kind: AuthorizationKind,
    market_uid: &str,
    amount: Amount,
) -> Result<()> {
    let key = keys::authorization(granter, grantee, kind, market_uid)?;
    let mut grant: Authorization = ctx.get(&key)?.ok_or_else(|| {
        EngineError::Unauthorized(format!(
            "{} has no {} grant from {} on market {}",
            grantee, kind, granter, market_uid
        ))
    })?;

    let allowance = grant.spend_limit;
    if grant.spend(amount).is_none() {
        return Err(EngineError::AuthorizationExceeded {
            allowance,
            requested: amount,
        });
    }
    if grant.is_exhausted() {
        ctx.delete(&key);
    } else {
        ctx.set(key, &grant)?;
    }
    Ok(())
}

pub fn grant_authorization(ctx: &mut Ctx<'_>, msg: &MsgGrantAuthorization) -> Result<()> {
    if msg.spend_limit <= 0 {
        return Err(EngineError::InvalidAmount(msg.spend_limit));
    }
    if msg.granter == msg.grantee {
        return Err(EngineError::Unauthorized(format!(
            "{} can not grant itself",
            msg.granter
        )));
    }
    get_market(&*ctx.store, &msg.market_uid)?;

    let grant = Authorization {
        granter: msg.granter.clone(),
        grantee: msg.grantee.clone(),
        market_uid: msg.market_uid.clone(),
        kind: msg.kind,
        spend_limit: msg.spend_limit,
    };
    ctx.set(
        keys::authorization(&msg.granter, &msg.grantee, msg.kind, &msg.market_uid)?,
        &grant,
    )?;

    info!(
        granter = %msg.granter,
        grantee = %msg.grantee,
        market_uid = %msg.market_uid,
        kind = %msg.kind,
        spend_limit = %msg.spend_limit,
        "authorization granted"
    );
    ctx.emit(Event::AuthorizationGranted {
        granter: grant.granter,
        grantee: grant.grantee,
        market_uid: grant.market_uid,
        kind: grant.kind,
        spend_limit: grant.spend_limit,
    });
    Ok(())
}

pub fn revoke_authorization(ctx: &mut Ctx<'_>, msg: &MsgRevokeAuthorization) -> Result<()> {
    let key = keys::authorization(&msg.granter, &msg.grantee, msg.kind, &msg.market_uid)?;
    if !ctx.has(&key) {
        return Err(EngineError::Unauthorized(format!(
            "no {} grant from {} to {} on market {}",
            msg.kind, msg.granter, msg.grantee, msg.market_uid
        )));
    }
    ctx.delete(&key);

    info!(
        granter = %msg.granter,
        grantee = %msg.grantee,
        market_uid = %msg.market_uid,
        kind = %msg.kind,
        "authorization revoked"
    );
    ctx.emit(Event::AuthorizationRevoked {
        granter: msg.granter.clone(),
        grantee: msg.grantee.clone(),
        market_uid: msg.market_uid.clone(),
        kind: msg.kind,
    });
    Ok(())
}

// ============================================================================
// Deposit
// ============================================================================

/// Participation fee on a deposit, truncated to whole atoms.
pub fn participation_fee(amount: Amount, rate: rust_decimal::Decimal) -> Result<Amount> {
    dec::mul_div_atoms(amount, rate, rust_decimal::Decimal::ONE)
}

/// Add house liquidity to an open market.
///
/// Returns the new participation index.
pub fn deposit(ctx: &mut Ctx<'_>, msg: &MsgDeposit) -> Result<u64> {
    let params = ctx.house_params()?;
    if msg.amount < params.min_deposit {
        return Err(EngineError::DepositTooLow {
            amount: msg.amount,
            min: params.min_deposit,
        });
    }

    let market = get_market(&*ctx.store, &msg.market_uid)?;
    if market.status != MarketStatus::Active {
        return Err(EngineError::MarketNotActive {
            uid: market.uid,
            status: market.status.to_string(),
        });
    }
    if market.placement_closed(ctx.now()) {
        return Err(EngineError::MarketPlacementClosed(market.uid));
    }

    if msg.creator != msg.depositor {
        consume_authorization(
            ctx,
            &msg.depositor,
            &msg.creator,
            AuthorizationKind::Deposit,
            &msg.market_uid,
            msg.amount,
        )?;
    }

    let fee = participation_fee(msg.amount, params.house_participation_fee)?;
    let liquidity = dec::checked_sub(msg.amount, fee, "deposit liquidity")?;

    ctx.multi_send(&[
        Transfer::new(&msg.depositor, FEE_COLLECTOR, fee),
        Transfer::new(&msg.depositor, HOUSE_RESERVE, liquidity),
    ])?;

    let index = orderbook::add_participation(ctx, &market, &msg.depositor, liquidity, fee)?;

    let record = Deposit {
        depositor: msg.depositor.clone(),
        creator: msg.creator.clone(),
        market_uid: market.uid.clone(),
        participation_index: index,
        amount: msg.amount,
        fee,
        liquidity,
        withdrawal_count: 0,
        total_withdrawn: 0,
        created_at: ctx.now(),
    };
    ctx.set(keys::deposit(&msg.depositor, &market.uid, index)?, &record)?;

    info!(
        depositor = %msg.depositor,
        market_uid = %market.uid,
        participation_index = index,
        amount = %msg.amount,
        fee = %fee,
        "deposit accepted"
    );
    ctx.emit(Event::Deposited {
        depositor: msg.depositor.clone(),
        market_uid: market.uid,
        participation_index: index,
        amount: msg.amount,
        fee,
        liquidity,
    });
    Ok(index)
}

// ============================================================================
// Withdraw
// ============================================================================

/// Pay out part or all of a settled participation.
///
/// Returns the withdrawal id (1-based per deposit).
pub fn withdraw(ctx: &mut Ctx<'_>, msg: &MsgWithdraw) -> Result<u64> {
    if msg.amount <= 0 {
        return Err(EngineError::InvalidAmount(msg.amount));
    }

    let mut record = get_deposit(&*ctx.store, &msg.depositor, &msg.market_uid, msg.participation_index)?;
    let participation = query::participation(&*ctx.store, &msg.market_uid, msg.participation_index)?;
    if !participation.is_settled {
        return Err(EngineError::ParticipationNotSettled {
            market_uid: msg.market_uid.clone(),
            index: msg.participation_index,
        });
    }

    let available = dec::checked_sub(participation.settled_balance(), record.total_withdrawn, "withdrawable")?;
    if msg.amount > available {
        return Err(EngineError::WithdrawExceedsBalance {
            requested: msg.amount,
            withdrawable: available,
        });
    }
    if msg.mode == WithdrawalMode::Full && msg.amount != available {
        return Err(EngineError::WithdrawModeMismatch {
            requested: msg.amount,
            withdrawable: available,
        });
    }

    if msg.creator != msg.depositor {
        consume_authorization(
            ctx,
            &msg.depositor,
            &msg.creator,
            AuthorizationKind::Withdraw,
            &msg.market_uid,
            msg.amount,
        )?;
    }

    ctx.send(HOUSE_RESERVE, &msg.depositor, msg.amount)?;

    record.withdrawal_count += 1;
    record.total_withdrawn = dec::checked_add(record.total_withdrawn, msg.amount, "total withdrawn")?;
    let id = record.withdrawal_count;
    ctx.set(
        keys::deposit(&msg.depositor, &msg.market_uid, msg.participation_index)?,
        &record,
    )?;

    let withdrawal = Withdrawal {
        id,
        depositor: msg.depositor.clone(),
        creator: msg.creator.clone(),
        market_uid: msg.market_uid.clone(),
        participation_index: msg.participation_index,
        amount: msg.amount,
        mode: msg.mode,
        height: ctx.height(),
    };
    ctx.set(
        keys::withdrawal(&msg.depositor, &msg.market_uid, msg.participation_index, id)?,
        &withdrawal,
    )?;

    info!(
        depositor = %msg.depositor,
        market_uid = %msg.market_uid,
        participation_index = msg.participation_index,
        withdrawal_id = id,
        amount = %msg.amount,
        remaining = %(available - msg.amount),
        "withdrawal paid"
    );
    ctx.emit(Event::Withdrawn {
        depositor: msg.depositor.clone(),
        market_uid: msg.market_uid.clone(),
        participation_index: msg.participation_index,
        withdrawal_id: id,
        amount: msg.amount,
    });
    Ok(id)
}
