use common::config::PaymentServiceConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::payment_client::PaymentGateway;

/// Admission-control gate read by the checkout entry point. When the
/// gate is closed, checkout is rejected before the cart, balance or
/// order tables are touched.
#[cfg_attr(test, mockall::automock)]
pub trait AdmissionGate: Send + Sync {
    fn is_available(&self) -> bool;
}

/// Handle to the background health probe. Cheap to clone; reading the
/// flag is a single atomic load.
#[derive(Clone)]
pub struct HealthHandle {
    available: Arc<AtomicBool>,
    task: Arc<JoinHandle<()>>,
}

impl HealthHandle {
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }

    /// Stop the probe loop; called on process shutdown.
    pub fn shutdown(&self) {
        self.task.abort();
    }
}

impl AdmissionGate for HealthHandle {
    fn is_available(&self) -> bool {
        self.is_available()
    }
}

/// Background probe against the remote payment service. Starts
/// unavailable and flips the flag on every probe outcome; the first
/// probe fires after a short initial delay, then on a fixed period. The
/// loop runs independently of request traffic.
pub struct HealthMonitor;

impl HealthMonitor {
    pub fn spawn(
        gateway: Arc<dyn PaymentGateway>,
        config: &PaymentServiceConfig,
    ) -> HealthHandle {
        let available = Arc::new(AtomicBool::new(false));
        let flag = available.clone();
        let initial_delay = config.health_probe_initial_delay();
        let interval = config.health_probe_interval();
        let probe_timeout = config.health_probe_timeout();

        let task = tokio::spawn(async move {
            tokio::time::sleep(initial_delay).await;

            loop {
                let healthy =
                    match tokio::time::timeout(probe_timeout, gateway.check_health()).await {
                        Ok(Ok(())) => true,
                        Ok(Err(e)) => {
                            warn!("Payment service health probe failed: {}", e);
                            false
                        }
                        Err(_) => {
                            warn!(
                                "Payment service health probe timed out after {:?}",
                                probe_timeout
                            );
                            false
                        }
                    };

                let was = flag.swap(healthy, Ordering::Relaxed);
                if was != healthy {
                    if healthy {
                        info!("Payment service is available, admitting checkouts");
                    } else {
                        warn!("Payment service is unavailable, rejecting checkouts");
                    }
                }

                tokio::time::sleep(interval).await;
            }
        });

        HealthHandle {
            available,
            task: Arc::new(task),
        }
    }
}
