//! Scripted adapter for demo mode and tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::time::Instant;
use zsecret_common::{AdapterErrorKind, Amount, ChainBalance, ChainId, WalletAddress};

use crate::ChainAdapter;

/// What the next fetch returns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MockScript {
    Balance {
        transparent: Amount,
        shielded: Option<Amount>,
        pending: Amount,
    },
    Fail(AdapterErrorKind),
    /// Never answers; the caller's deadline decides.
    Hang,
    /// Panics inside `fetch`.
    Panic,
}

pub struct MockAdapter {
    chain_id: ChainId,
    script: Mutex<MockScript>,
    delay: Duration,
    calls: AtomicUsize,
    last_account: Mutex<Option<String>>,
}

impl MockAdapter {
    pub fn new(chain_id: ChainId, script: MockScript) -> Self {
        Self {
            chain_id,
            script: Mutex::new(script),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            last_account: Mutex::new(None),
        }
    }

    pub fn balance(
        chain_id: ChainId,
        transparent: Amount,
        shielded: Option<Amount>,
        pending: Amount,
    ) -> Self {
        Self::new(
            chain_id,
            MockScript::Balance {
                transparent,
                shielded,
                pending,
            },
        )
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_script(&self, script: MockScript) {
        if let Ok(mut guard) = self.script.lock() {
            *guard = script;
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Account the last fetch resolved for this chain.
    pub fn last_account(&self) -> Option<String> {
        self.last_account.lock().ok().and_then(|g| g.clone())
    }

    fn current_script(&self) -> MockScript {
        self.script
            .lock()
            .map(|g| g.clone())
            .unwrap_or(MockScript::Fail(AdapterErrorKind::InvalidData))
    }
}

#[async_trait]
impl ChainAdapter for MockAdapter {
    fn chain_id(&self) -> &ChainId {
        &self.chain_id
    }

    async fn fetch(&self, address: &WalletAddress, deadline: Instant) -> ChainBalance {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_account.lock() {
            *last = Some(address.for_chain(&self.chain_id).to_string());
        }

        let script = self.current_script();
        let delay = self.delay;
        let answered = tokio::time::timeout_at(deadline, async move {
            tokio::time::sleep(delay).await;
            match script {
                MockScript::Hang => futures::future::pending().await,
                other => other,
            }
        })
        .await;

        match answered {
            Ok(MockScript::Balance {
                transparent,
                shielded,
                pending,
            }) => ChainBalance::ok(
                self.chain_id.clone(),
                transparent,
                shielded,
                pending,
                Utc::now(),
            ),
            Ok(MockScript::Fail(kind)) => {
                ChainBalance::failed(self.chain_id.clone(), kind, "scripted failure")
            }
            Ok(MockScript::Panic) => panic!("scripted panic in {} adapter", self.chain_id),
            Ok(MockScript::Hang) | Err(_) => ChainBalance::timeout(self.chain_id.clone()),
        }
    }
}
