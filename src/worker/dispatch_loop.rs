use std::{sync::Arc, time::Duration};

use anyhow::Result;
use chrono::Utc;
use tracing::{error, info};

use crate::{
    application::{
        rate_limit::CounterStore,
        usecases::{connect::AccessTokenProvider, scheduling::SchedulingUseCase},
    },
    domain::repositories::{posts::PostRepository, scheduled_posts::ScheduledPostRepository},
    x_api::XApiGateway,
};

/// Polls for due rows and publishes them one at a time. A failing row is
/// logged and left marked failed; the loop itself never exits on row errors.
pub async fn run<SP, P, X, A, C>(
    scheduled_post_repository: Arc<SP>,
    scheduling_use_case: Arc<SchedulingUseCase<SP, P, X, A, C>>,
    poll_interval_seconds: u64,
) -> Result<()>
where
    SP: ScheduledPostRepository + Send + Sync + 'static,
    P: PostRepository + Send + Sync + 'static,
    X: XApiGateway + Send + Sync + 'static,
    A: AccessTokenProvider + 'static,
    C: CounterStore + Send + Sync + 'static,
{
    info!("dispatch: starting worker loop");
    loop {
        match scheduled_post_repository.list_due(Utc::now()).await {
            Ok(due_rows) => {
                if !due_rows.is_empty() {
                    info!(count = due_rows.len(), "dispatch: due rows found");
                }
                for row in due_rows {
                    if let Err(e) = scheduling_use_case.dispatch(row.id).await {
                        error!(
                            scheduled_post_id = %row.id,
                            error = %e,
                            "dispatch: failed to publish row"
                        );
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "dispatch: error listing due rows");
            }
        }

        tokio::time::sleep(Duration::from_secs(poll_interval_seconds)).await;
    }
}
