//! Human-in-the-loop confirmation as a request/response channel.
//!
//! The eligibility stage holds a [`ConfirmationRequester`] and awaits a decision
//! for every account it cannot accept on its own. Whatever front end is attached
//! drains requests from the matching [`ConfirmationHandler`] and answers them by
//! correlation id. Missing answers are always read as "declined".

use parking_lot::Mutex;
use rust_decimal::Decimal;
use solana_sdk::pubkey::Pubkey;
use std::{
    collections::HashMap,
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationReason {
    ValueAboveCeiling { value_usd: Decimal, ceiling_usd: Decimal },
    PriceUnavailable,
}

impl fmt::Display for ConfirmationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfirmationReason::ValueAboveCeiling { value_usd, ceiling_usd } => {
                write!(f, "balance worth ${} exceeds the ${} burn ceiling", value_usd.round_dp(2), ceiling_usd)
            }
            ConfirmationReason::PriceUnavailable => write!(f, "no USD price available"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationRequest {
    pub id: u64,
    pub account: Pubkey,
    pub mint: Pubkey,
    pub reason: ConfirmationReason,
}

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<bool>>>>;

pub fn confirmation_channel(capacity: usize) -> (ConfirmationRequester, ConfirmationHandler) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
    (
        ConfirmationRequester { tx, pending: pending.clone(), next_id: Arc::new(AtomicU64::new(1)) },
        ConfirmationHandler { rx, pending },
    )
}

#[derive(Clone)]
pub struct ConfirmationRequester {
    tx: mpsc::Sender<ConfirmationRequest>,
    pending: PendingMap,
    next_id: Arc<AtomicU64>,
}

impl ConfirmationRequester {
    /// Emits a request and suspends until it is resolved. Returns `true` only on
    /// an explicit approval.
    pub async fn request(&self, account: Pubkey, mint: Pubkey, reason: ConfirmationReason) -> bool {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (answer_tx, answer_rx) = oneshot::channel();
        self.pending.lock().insert(id, answer_tx);

        let request = ConfirmationRequest { id, account, mint, reason };
        if self.tx.send(request).await.is_err() {
            self.pending.lock().remove(&id);
            log::warn!("No confirmation handler attached; declining account {account}");
            return false;
        }

        answer_rx.await.unwrap_or(false)
    }
}

pub struct ConfirmationHandler {
    rx: mpsc::Receiver<ConfirmationRequest>,
    pending: PendingMap,
}

impl ConfirmationHandler {
    pub async fn next_request(&mut self) -> Option<ConfirmationRequest> {
        self.rx.recv().await
    }

    /// Answers request `id`. Returns `false` when the id is unknown or the
    /// requester has already given up.
    pub fn resolve(&self, id: u64, approved: bool) -> bool {
        match self.pending.lock().remove(&id) {
            Some(answer) => answer.send(approved).is_ok(),
            None => {
                log::warn!("Ignoring answer for unknown confirmation request {id}");
                false
            }
        }
    }

    /// Answers every request with `decide` until all requesters are dropped.
    pub async fn serve<F>(mut self, mut decide: F)
    where
        F: FnMut(&ConfirmationRequest) -> bool,
    {
        while let Some(request) = self.next_request().await {
            let approved = decide(&request);
            self.resolve(request.id, approved);
        }
    }
}

impl Drop for ConfirmationHandler {
    fn drop(&mut self) {
        // Close first so no request can slip in after the pending map is cleared.
        self.rx.close();
        self.pending.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_request_resolved_by_id() {
        let (requester, mut handler) = confirmation_channel(4);
        let account = Pubkey::new_unique();
        let mint = Pubkey::new_unique();

        let ask = tokio::spawn(async move {
            requester.request(account, mint, ConfirmationReason::PriceUnavailable).await
        });

        let request = handler.next_request().await.unwrap();
        assert_eq!(request.account, account);
        assert_eq!(request.mint, mint);
        assert_eq!(request.reason, ConfirmationReason::PriceUnavailable);
        assert!(handler.resolve(request.id, true));

        assert!(ask.await.unwrap());
    }

    #[tokio::test]
    async fn test_decline() {
        let (requester, handler) = confirmation_channel(4);
        let serve = tokio::spawn(handler.serve(|_| false));

        let approved = requester
            .request(
                Pubkey::new_unique(),
                Pubkey::new_unique(),
                ConfirmationReason::ValueAboveCeiling { value_usd: dec!(15), ceiling_usd: dec!(10) },
            )
            .await;
        assert!(!approved);

        drop(requester);
        serve.await.unwrap();
    }

    #[tokio::test]
    async fn test_dropped_handler_declines() {
        let (requester, handler) = confirmation_channel(4);
        drop(handler);
        let approved = requester
            .request(Pubkey::new_unique(), Pubkey::new_unique(), ConfirmationReason::PriceUnavailable)
            .await;
        assert!(!approved);
    }

    #[tokio::test]
    async fn test_handler_dropped_with_pending_request_declines() {
        let (requester, mut handler) = confirmation_channel(4);
        let ask = tokio::spawn(async move {
            requester
                .request(Pubkey::new_unique(), Pubkey::new_unique(), ConfirmationReason::PriceUnavailable)
                .await
        });

        let _request = handler.next_request().await.unwrap();
        drop(handler);
        assert!(!ask.await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_id_is_ignored() {
        let (_requester, handler) = confirmation_channel(4);
        assert!(!handler.resolve(42, true));
    }

    #[tokio::test]
    async fn test_concurrent_requests_are_correlated() {
        let (requester, mut handler) = confirmation_channel(4);
        let approve_me = Pubkey::new_unique();
        let decline_me = Pubkey::new_unique();

        let first = {
            let requester = requester.clone();
            tokio::spawn(async move {
                requester.request(approve_me, Pubkey::new_unique(), ConfirmationReason::PriceUnavailable).await
            })
        };
        let second = tokio::spawn(async move {
            requester.request(decline_me, Pubkey::new_unique(), ConfirmationReason::PriceUnavailable).await
        });

        let a = handler.next_request().await.unwrap();
        let b = handler.next_request().await.unwrap();
        assert_ne!(a.id, b.id);

        // Answer in reverse order of arrival.
        for request in [b, a] {
            handler.resolve(request.id, request.account == approve_me);
        }

        assert!(first.await.unwrap());
        assert!(!second.await.unwrap());
    }

    #[test]
    fn test_reason_display() {
        let reason =
            ConfirmationReason::ValueAboveCeiling { value_usd: dec!(15.456), ceiling_usd: dec!(10) };
        assert_eq!(reason.to_string(), "balance worth $15.46 exceeds the $10 burn ceiling");
    }
}
