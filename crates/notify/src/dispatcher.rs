//! Routes an evaluation to the notifiers configured for a rule.
//!
//! Deliveries run concurrently and independently: one failing channel
//! never blocks the others.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use herald_core::EvaluationContext;
use tokio_util::sync::CancellationToken;

use crate::notifier::{DeliveryResult, Notifier};

/// Notifiers keyed by uid.
#[derive(Default)]
pub struct Dispatcher {
    notifiers: HashMap<String, Arc<dyn Notifier>>,
}

impl Dispatcher {
    /// Create an empty dispatcher.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(notifiers: HashMap<String, Arc<dyn Notifier>>) -> Self {
        Self { notifiers }
    }

    /// Add or replace a notifier.
    pub fn insert(&mut self, uid: impl Into<String>, notifier: Arc<dyn Notifier>) {
        self.notifiers.insert(uid.into(), notifier);
    }

    /// Remove a notifier (e.g., on deletion).
    pub fn remove(&mut self, uid: &str) -> Option<Arc<dyn Notifier>> {
        self.notifiers.remove(uid)
    }

    /// Replace every notifier (e.g., after a configuration reload).
    pub fn rebuild(&mut self, notifiers: HashMap<String, Arc<dyn Notifier>>) {
        self.notifiers = notifiers;
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    /// Dispatch `ctx` to each notifier in `uids` whose policy accepts it.
    ///
    /// Returns one result per attempted delivery, in `uids` order. Unknown
    /// uids and declined notifiers produce no result.
    pub async fn dispatch(
        &self,
        ctx: &EvaluationContext,
        uids: &[String],
        cancel: &CancellationToken,
    ) -> Vec<DeliveryResult> {
        let mut targets = Vec::with_capacity(uids.len());
        for uid in uids {
            let Some(notifier) = self.notifiers.get(uid) else {
                tracing::warn!(rule_id = ctx.rule_id, uid = %uid, "Unknown notifier, skipping");
                continue;
            };
            if !notifier.should_notify(ctx) {
                tracing::debug!(
                    rule_id = ctx.rule_id,
                    notifier = notifier.name(),
                    state = %ctx.state,
                    previous_state = %ctx.previous_state,
                    "Notification not required for this transition"
                );
                continue;
            }
            targets.push(notifier.clone());
        }

        if targets.is_empty() {
            tracing::debug!(rule_id = ctx.rule_id, "No notifiers to dispatch to");
            return Vec::new();
        }

        join_all(targets.iter().map(|n| n.dispatch(ctx, cancel))).await
    }

    /// Send a test notification through one notifier.
    pub async fn test_notify(&self, uid: &str) -> Option<DeliveryResult> {
        match self.notifiers.get(uid) {
            Some(notifier) => Some(notifier.test().await),
            None => None,
        }
    }
}
