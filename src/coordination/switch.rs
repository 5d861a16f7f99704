//! Chain switch coordination
//!
//! The wallet's active chain is the one piece of shared mutable state in a run.
//! Only this coordinator asks the wallet to change it.

use crate::chain::Chain;
use crate::config::OrchestratorConfig;
use crate::error::SwitchError;
use crate::metrics;
use crate::wallet::Wallet;

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, info, warn};

pub struct ChainSwitchCoordinator {
    wallet: Arc<dyn Wallet>,
    timeout: Duration,
    poll_interval: Duration,
}

impl ChainSwitchCoordinator {
    pub fn new(wallet: Arc<dyn Wallet>, config: &OrchestratorConfig) -> Self {
        Self {
            wallet,
            timeout: config.switch_timeout(),
            poll_interval: config.switch_poll_interval(),
        }
    }

    async fn active_chain(&self, target: u64) -> Result<Option<u64>, SwitchError> {
        self.wallet
            .active_chain_id()
            .await
            .map_err(|source| SwitchError::Wallet { target, source })
    }

    /// Bring the wallet onto `target` and confirm it landed there.
    ///
    /// No switch is requested when the wallet is already on `target`. A switch
    /// that is not observed within the timeout is reported, never retried.
    pub async fn ensure_active_chain(&self, target: &Chain) -> Result<(), SwitchError> {
        let target_id = target.id();

        let account = self
            .wallet
            .account()
            .await
            .map_err(|source| SwitchError::Wallet {
                target: target_id,
                source,
            })?;
        if account.is_none() {
            return Err(SwitchError::NotConnected);
        }

        let current = self.active_chain(target_id).await?;
        if current == Some(target_id) {
            debug!(chain_id = target_id, "Wallet already on target chain");
            return Ok(());
        }

        info!(chain_id = target_id, from = ?current, "Chain switch requested");
        metrics::record_switch_requested(target_id);

        let started = Instant::now();
        let deadline = started + self.timeout;
        let mut last_seen = current;

        // the wallet may hold the request open (user prompt), so the request
        // itself counts against the deadline
        let confirmed = timeout_at(deadline, async {
            self.wallet
                .request_switch(target)
                .await
                .map_err(|source| SwitchError::Wallet {
                    target: target_id,
                    source,
                })?;

            loop {
                last_seen = self.active_chain(target_id).await?;
                if last_seen == Some(target_id) {
                    return Ok::<_, SwitchError>(());
                }
                sleep(self.poll_interval).await;
            }
        })
        .await;

        let waited = started.elapsed();
        match confirmed {
            Ok(Ok(())) => {
                info!(
                    chain_id = target_id,
                    waited_ms = waited.as_millis() as u64,
                    "Chain switch confirmed"
                );
                metrics::record_switch_confirmed(target_id, waited.as_secs_f64());
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_elapsed) => {
                warn!(
                    chain_id = target_id,
                    active = ?last_seen,
                    waited_ms = waited.as_millis() as u64,
                    "Chain switch timed out"
                );
                metrics::record_switch_timeout(target_id);
                Err(SwitchError::SwitchTimeout {
                    target: target_id,
                    active: last_seen,
                    waited,
                })
            }
        }
    }
}
