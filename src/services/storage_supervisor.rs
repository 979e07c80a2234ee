//! Background supervision of the result store connection.

use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{result_store::ResultStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Keep a result store installed, reconnecting with exponential backoff and
/// flipping the shared state to degraded mode while the backend is down.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn ResultStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.install_result_store(store.clone()).await;
                info!("result store connected; leaving degraded mode");
                delay = INITIAL_DELAY;

                loop {
                    sleep(HEALTH_POLL_INTERVAL).await;
                    if let Err(err) = store.health_check().await {
                        warn!(error = %err, "result store health check failed; entering degraded mode");
                        state.clear_result_store().await;
                        break;
                    }
                }
            }
            Err(err) => {
                warn!(error = %err, "result store connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}
