use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::allowance::{AllowanceResolver, AllowanceState};
use crate::error::DistributorClientError;
use crate::error_queue::ErrorQueue;
use crate::event::{emit, ClientEvent};
use crate::ledger::{approve_call, LedgerWriter, TxHash, TxStatus};
use crate::state::{Address, ErrorReport, ErrorSource, RawAmount, RequiredAmount};

/// Which control a gated action exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GateMode {
    /// Data loading or an authorization in flight; control disabled.
    Loading,
    NeedsAuthorization,
    Ready,
}

/// Pure gate decision.
///
/// A failed read with no known value keeps the control disabled; an unknown
/// allowance with no error (no holder) asks for authorization.
pub fn decide(required: RawAmount, allowance: &AllowanceState, authorization_in_flight: bool) -> GateMode {
    if allowance.loading || authorization_in_flight {
        return GateMode::Loading;
    }
    match allowance.amount {
        Some(amount) if amount >= required => GateMode::Ready,
        None if allowance.error.is_some() => GateMode::Loading,
        _ => GateMode::NeedsAuthorization,
    }
}

/// One `(holder, spender, asset)` authorization triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ApprovalKey {
    pub holder: Address,
    pub spender: Address,
    pub token: Address,
}

/// Session-wide set of authorizations currently in flight.
#[derive(Debug, Clone, Default)]
pub struct ApprovalRegistry {
    in_flight: Arc<Mutex<HashSet<ApprovalKey>>>,
}

impl ApprovalRegistry {
    /// Claims `key`; `None` if an authorization for it is already in flight.
    pub fn try_acquire(&self, key: ApprovalKey) -> Option<ApprovalGuard> {
        if !self.in_flight.lock().insert(key.clone()) {
            return None;
        }
        Some(ApprovalGuard {
            in_flight: Arc::clone(&self.in_flight),
            key,
        })
    }

    pub fn is_in_flight(&self, key: &ApprovalKey) -> bool {
        self.in_flight.lock().contains(key)
    }
}

/// Releases its triple when dropped, whichever way the authorization ends.
pub struct ApprovalGuard {
    in_flight: Arc<Mutex<HashSet<ApprovalKey>>>,
    key: ApprovalKey,
}

impl Drop for ApprovalGuard {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.key);
    }
}

/// State object rendered by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateControl {
    pub mode: GateMode,
    pub enabled: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalOutcome {
    /// Authorization confirmed; `mode` is the decision on the re-read allowance.
    Authorized { tx: TxHash, mode: GateMode },
    /// The allowance already covers the required amount; nothing submitted.
    AlreadyAuthorized,
    /// Control disabled or another authorization for the triple in flight.
    Suppressed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome<T> {
    Performed(T),
    Authorization(ApprovalOutcome),
    Disabled,
}

/**
 * Allowance-gated action
 *
 * Exposes exactly one of two controls for a dependent action that needs
 * `required` raw units authorized:
 * - `NeedsAuthorization`: `authorize` submits `approve(spender, required)`,
 *   waits for confirmation and re-reads the allowance. The dependent action
 *   is NOT chained; the user activates it again once the gate reports Ready.
 * - `Ready`: `perform` runs the caller's pre-action and action.
 *
 * The triple stays registered as in flight until the post-confirmation read
 * has landed, so the gate cannot re-open on a stale allowance.
 */
pub struct ApprovalGate {
    resolver: Arc<AllowanceResolver>,
    writer: Arc<dyn LedgerWriter>,
    required: RawAmount,
    registry: ApprovalRegistry,
    errors: ErrorQueue,
    events: broadcast::Sender<ClientEvent>,
}

impl ApprovalGate {
    /// Normalizes `required`; malformed or negative amounts are rejected here,
    /// before any control is exposed.
    pub fn new(
        resolver: Arc<AllowanceResolver>,
        writer: Arc<dyn LedgerWriter>,
        required: &RequiredAmount,
        registry: ApprovalRegistry,
        errors: ErrorQueue,
        events: broadcast::Sender<ClientEvent>,
    ) -> Result<Self, DistributorClientError> {
        let required = required.normalize()?;
        Ok(Self {
            resolver,
            writer,
            required,
            registry,
            errors,
            events,
        })
    }

    pub fn required(&self) -> RawAmount {
        self.required
    }

    pub fn resolver(&self) -> &Arc<AllowanceResolver> {
        &self.resolver
    }

    fn key(&self) -> Option<ApprovalKey> {
        self.resolver.holder().map(|holder| ApprovalKey {
            holder,
            spender: self.resolver.spender().clone(),
            token: self.resolver.token().clone(),
        })
    }

    fn authorization_in_flight(&self) -> bool {
        self.key()
            .map(|key| self.registry.is_in_flight(&key))
            .unwrap_or(false)
    }

    pub fn mode(&self) -> GateMode {
        decide(
            self.required,
            &self.resolver.state(),
            self.authorization_in_flight(),
        )
    }

    pub fn control(&self) -> GateControl {
        let allowance = self.resolver.state();
        let mode = decide(self.required, &allowance, self.authorization_in_flight());
        GateControl {
            mode,
            enabled: mode != GateMode::Loading,
            error: allowance.error.map(|err| err.to_string()),
        }
    }

    /// Activates whichever control the gate currently exposes.
    pub async fn trigger<P, F, Fut, T>(
        &self,
        pre_action: P,
        action: F,
    ) -> Result<GateOutcome<T>, DistributorClientError>
    where
        P: FnOnce(),
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, DistributorClientError>>,
    {
        match self.mode() {
            GateMode::Loading => Ok(GateOutcome::Disabled),
            GateMode::NeedsAuthorization => self.authorize().await.map(GateOutcome::Authorization),
            GateMode::Ready => self.perform(pre_action, action).await.map(GateOutcome::Performed),
        }
    }

    /// Runs the dependent action; refuses unless the gate is Ready.
    pub async fn perform<P, F, Fut, T>(&self, pre_action: P, action: F) -> Result<T, DistributorClientError>
    where
        P: FnOnce(),
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, DistributorClientError>>,
    {
        if self.mode() != GateMode::Ready {
            return Err(DistributorClientError::NotReady);
        }
        pre_action();
        action().await
    }

    /// Submits an authorization for the required amount.
    pub async fn authorize(&self) -> Result<ApprovalOutcome, DistributorClientError> {
        match self.mode() {
            GateMode::Ready => return Ok(ApprovalOutcome::AlreadyAuthorized),
            GateMode::Loading => return Ok(ApprovalOutcome::Suppressed),
            GateMode::NeedsAuthorization => {}
        }
        let Some(key) = self.key() else {
            return Err(DistributorClientError::DataUnavailable {
                origin: "allowance",
                reason: "no holder connected".into(),
            });
        };
        let Some(_guard) = self.registry.try_acquire(key.clone()) else {
            debug!(holder = %key.holder, "authorization already in flight");
            return Ok(ApprovalOutcome::Suppressed);
        };

        // Another tab or wallet may have authorized since the last poll.
        let current = self.resolver.refresh().await;
        if matches!(current.amount, Some(amount) if amount >= self.required) {
            debug!(holder = %key.holder, "allowance already sufficient");
            return Ok(ApprovalOutcome::AlreadyAuthorized);
        }

        let call = approve_call(&key.token, &key.spender, self.required)?;
        info!(token = %key.token, spender = %key.spender, amount = %self.required, "submitting authorization");
        let tx = self
            .writer
            .submit(&call)
            .await
            .map_err(|err| self.record_failure(as_submission_failure(err)))?;
        emit(
            &self.events,
            ClientEvent::AuthorizationSubmitted {
                token: key.token.clone(),
                spender: key.spender.clone(),
                holder: key.holder.clone(),
                amount: self.required,
                tx: tx.clone(),
            },
        );

        let receipt = self
            .writer
            .confirm(&tx)
            .await
            .map_err(|err| self.record_failure(as_submission_failure(err)))?;
        if let TxStatus::Reverted { reason } = receipt.status {
            return Err(self.record_failure(DistributorClientError::TransactionReverted {
                tx: tx.to_string(),
                reason,
            }));
        }

        let allowance = self.resolver.refresh().await;
        let mode = decide(self.required, &allowance, false);
        info!(%tx, ?mode, "authorization confirmed");
        emit(
            &self.events,
            ClientEvent::AuthorizationConfirmed {
                token: key.token,
                spender: key.spender,
                holder: key.holder,
                allowance: allowance.amount,
                tx: tx.clone(),
            },
        );
        Ok(ApprovalOutcome::Authorized { tx, mode })
    }

    fn record_failure(&self, err: DistributorClientError) -> DistributorClientError {
        warn!(error = %err, "authorization failed");
        self.errors
            .add_error(ErrorReport::new(ErrorSource::Authorization, &err));
        err
    }
}

pub(crate) fn as_submission_failure(err: DistributorClientError) -> DistributorClientError {
    match err {
        DistributorClientError::SubmissionFailed(_)
        | DistributorClientError::TransactionReverted { .. } => err,
        other => DistributorClientError::SubmissionFailed(other.to_string()),
    }
}
