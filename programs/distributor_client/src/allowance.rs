use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::debug;

use crate::error::DistributorClientError;
use crate::error_queue::ErrorQueue;
use crate::ledger::{allowance_call, LedgerReader};
use crate::state::{Address, ErrorSource, RawAmount};
use crate::utils::decode_return;
use crate::watch::{FetchFn, Snapshot, Watched};

/// What a caller sees of an allowance.
///
/// `amount: None` means unknown (no holder, not read yet, or the read failed)
/// and is never the same thing as a resolved zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowanceState {
    pub amount: Option<RawAmount>,
    pub loading: bool,
    pub error: Option<DistributorClientError>,
}

impl From<Snapshot<RawAmount>> for AllowanceState {
    fn from(snapshot: Snapshot<RawAmount>) -> Self {
        Self {
            amount: snapshot.value,
            loading: snapshot.loading,
            error: snapshot.error,
        }
    }
}

/**
 * Allowance resolver
 *
 * Keeps `allowance(holder, spender)` on one asset contract fresh. The holder
 * is the connected account and may change or disappear at any time; every
 * change restarts the watch so reads issued for a previous holder are never
 * applied.
 */
pub struct AllowanceResolver {
    reader: Arc<dyn LedgerReader>,
    token: Address,
    spender: Address,
    holder: Mutex<Option<Address>>,
    watched: Watched<RawAmount>,
}

impl AllowanceResolver {
    pub fn new(
        reader: Arc<dyn LedgerReader>,
        token: Address,
        spender: Address,
        poll_interval: Duration,
        errors: ErrorQueue,
        runtime: Handle,
    ) -> Self {
        Self {
            reader,
            token,
            spender,
            holder: Mutex::new(None),
            watched: Watched::new(runtime, poll_interval, Some((errors, ErrorSource::Allowance))),
        }
    }

    pub fn token(&self) -> &Address {
        &self.token
    }

    pub fn spender(&self) -> &Address {
        &self.spender
    }

    pub fn holder(&self) -> Option<Address> {
        self.holder.lock().clone()
    }

    /// Points the resolver at `holder`, or idles it when `None`.
    pub fn set_holder(&self, holder: Option<Address>) {
        let mut current = self.holder.lock();
        if *current == holder && (holder.is_none() || self.watched.is_watching()) {
            return;
        }
        *current = holder.clone();

        match holder {
            Some(holder) => {
                debug!(token = %self.token, spender = %self.spender, %holder, "watching allowance");
                self.watched.start(self.fetch_for(holder));
            }
            None => self.watched.stop(),
        }
    }

    fn fetch_for(&self, holder: Address) -> FetchFn<RawAmount> {
        let reader = Arc::clone(&self.reader);
        let call = allowance_call(&self.token, &holder, &self.spender);
        Arc::new(move || {
            let reader = Arc::clone(&reader);
            let call = call.clone();
            Box::pin(async move {
                let call = call?;
                let payload = reader.read(&call).await?;
                decode_return::<u128>(&payload).map(RawAmount::from)
            })
        })
    }

    pub fn state(&self) -> AllowanceState {
        self.watched.snapshot().into()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot<RawAmount>> {
        self.watched.subscribe()
    }

    /// Re-reads the allowance and returns a state no older than this call.
    pub async fn refresh(&self) -> AllowanceState {
        self.watched.refresh().await.into()
    }

    pub fn stop(&self) {
        *self.holder.lock() = None;
        self.watched.stop();
    }
}
