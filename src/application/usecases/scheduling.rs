use std::sync::Arc;

use anyhow::{Result as AnyResult, anyhow};
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    application::{
        rate_limit::{CounterStore, RESCHEDULE_BACKOFF_SECONDS, RateLimiter},
        usecases::connect::AccessTokenProvider,
    },
    domain::{
        entities::scheduled_posts::InsertScheduledPostEntity,
        repositories::{posts::PostRepository, scheduled_posts::ScheduledPostRepository},
        value_objects::{
            enums::scheduled_post_statuses::ScheduledPostStatus,
            scheduling_model::{QueueAnalyticsDto, SchedulePostModel, ScheduledPostDto},
        },
    },
    x_api::{MAX_POST_CHARS, XApiGateway, XPublicMetrics},
};

#[derive(Debug, Error)]
pub enum SchedulingError {
    #[error("{0}")]
    Validation(String),
    #[error("scheduled post not found")]
    NotFound,
    #[error("post has already been published")]
    AlreadyPosted,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl SchedulingError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            SchedulingError::Validation(_) | SchedulingError::AlreadyPosted => {
                StatusCode::BAD_REQUEST
            }
            SchedulingError::NotFound => StatusCode::NOT_FOUND,
            SchedulingError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type SchedulingResult<T> = std::result::Result<T, SchedulingError>;

#[derive(Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    Posted { x_post_id: String },
    /// The row was published by an earlier run; nothing to do.
    AlreadyPosted,
    /// Posting allowance exhausted; pushed forward past the window reset.
    Rescheduled { until: DateTime<Utc> },
}

pub struct SchedulingUseCase<SP, P, X, A, C>
where
    SP: ScheduledPostRepository + Send + Sync + 'static,
    P: PostRepository + Send + Sync + 'static,
    X: XApiGateway + Send + Sync + 'static,
    A: AccessTokenProvider + 'static,
    C: CounterStore + Send + Sync + 'static,
{
    scheduled_post_repository: Arc<SP>,
    post_repository: Arc<P>,
    x_api_gateway: Arc<X>,
    access_token_provider: Arc<A>,
    rate_limiter: RateLimiter<C>,
}

impl<SP, P, X, A, C> SchedulingUseCase<SP, P, X, A, C>
where
    SP: ScheduledPostRepository + Send + Sync + 'static,
    P: PostRepository + Send + Sync + 'static,
    X: XApiGateway + Send + Sync + 'static,
    A: AccessTokenProvider + 'static,
    C: CounterStore + Send + Sync + 'static,
{
    pub fn new(
        scheduled_post_repository: Arc<SP>,
        post_repository: Arc<P>,
        x_api_gateway: Arc<X>,
        access_token_provider: Arc<A>,
        rate_limiter: RateLimiter<C>,
    ) -> Self {
        Self {
            scheduled_post_repository,
            post_repository,
            x_api_gateway,
            access_token_provider,
            rate_limiter,
        }
    }

    pub async fn schedule(
        &self,
        user_id: Uuid,
        model: SchedulePostModel,
    ) -> SchedulingResult<Uuid> {
        let content = model.content.trim().to_string();

        if content.is_empty() {
            return Err(SchedulingError::Validation(
                "content must not be empty".to_string(),
            ));
        }

        if content.chars().count() > MAX_POST_CHARS {
            return Err(SchedulingError::Validation(format!(
                "content is {} chars, limit is {}",
                content.chars().count(),
                MAX_POST_CHARS
            )));
        }

        if model.scheduled_for <= Utc::now() {
            return Err(SchedulingError::Validation(
                "scheduled_for must be in the future".to_string(),
            ));
        }

        if let Some(post_id) = model.post_id {
            let draft = self
                .post_repository
                .find_by_id_for_user(post_id, user_id)
                .await
                .map_err(SchedulingError::Internal)?
                .ok_or(SchedulingError::NotFound)?;

            self.post_repository
                .mark_scheduled(draft.id)
                .await
                .map_err(SchedulingError::Internal)?;
        }

        let scheduled_post_id = self
            .scheduled_post_repository
            .create(InsertScheduledPostEntity {
                user_id,
                post_id: model.post_id,
                content,
                scheduled_for: model.scheduled_for,
                status: ScheduledPostStatus::Pending.to_string(),
            })
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "scheduling: failed to create scheduled post");
                SchedulingError::Internal(err)
            })?;

        info!(
            %user_id,
            %scheduled_post_id,
            scheduled_for = %model.scheduled_for,
            "scheduling: post scheduled"
        );
        Ok(scheduled_post_id)
    }

    pub async fn queue(&self, user_id: Uuid) -> SchedulingResult<Vec<ScheduledPostDto>> {
        let entities = self
            .scheduled_post_repository
            .list_for_user(user_id)
            .await
            .map_err(SchedulingError::Internal)?;

        Ok(entities.iter().map(ScheduledPostDto::from_entity).collect())
    }

    pub async fn analytics(&self, user_id: Uuid) -> SchedulingResult<QueueAnalyticsDto> {
        self.scheduled_post_repository
            .queue_analytics(user_id)
            .await
            .map_err(SchedulingError::Internal)
    }

    /// Live engagement numbers for a published row, straight from the
    /// platform.
    pub async fn post_metrics(
        &self,
        user_id: Uuid,
        scheduled_post_id: Uuid,
    ) -> SchedulingResult<XPublicMetrics> {
        let entity = self
            .scheduled_post_repository
            .find_by_id_for_user(scheduled_post_id, user_id)
            .await
            .map_err(SchedulingError::Internal)?
            .ok_or(SchedulingError::NotFound)?;

        let Some(x_post_id) = entity.x_post_id else {
            return Err(SchedulingError::Validation(
                "post has not been published yet".to_string(),
            ));
        };

        let access_token = self
            .access_token_provider
            .access_token_for(user_id)
            .await
            .map_err(SchedulingError::Internal)?;

        self.x_api_gateway
            .fetch_post_metrics(access_token, x_post_id)
            .await
            .map_err(|err| {
                error!(%user_id, %scheduled_post_id, x_api_error = ?err, "scheduling: metrics fetch failed");
                SchedulingError::Internal(err)
            })
    }

    pub async fn remove(&self, user_id: Uuid, scheduled_post_id: Uuid) -> SchedulingResult<()> {
        let entity = self
            .scheduled_post_repository
            .find_by_id_for_user(scheduled_post_id, user_id)
            .await
            .map_err(SchedulingError::Internal)?
            .ok_or(SchedulingError::NotFound)?;

        if ScheduledPostStatus::from_str(&entity.status) == ScheduledPostStatus::Posted {
            return Err(SchedulingError::AlreadyPosted);
        }

        self.scheduled_post_repository
            .delete(scheduled_post_id)
            .await
            .map_err(SchedulingError::Internal)?;

        info!(%user_id, %scheduled_post_id, "scheduling: scheduled post removed");
        Ok(())
    }

    /// Publishes one due row. Idempotent on already-posted rows, pushes
    /// forward instead of failing when the posting allowance is exhausted.
    pub async fn dispatch(&self, scheduled_post_id: Uuid) -> AnyResult<DispatchOutcome> {
        let entity = self
            .scheduled_post_repository
            .find_by_id(scheduled_post_id)
            .await?;

        if ScheduledPostStatus::from_str(&entity.status) == ScheduledPostStatus::Posted {
            info!(%scheduled_post_id, "scheduling: row already posted, skipping");
            return Ok(DispatchOutcome::AlreadyPosted);
        }

        if !self.rate_limiter.check(entity.user_id).await? {
            let reset_in = self.rate_limiter.time_to_reset(entity.user_id).await?;
            let until = Utc::now()
                + Duration::seconds(reset_in as i64)
                + Duration::seconds(RESCHEDULE_BACKOFF_SECONDS);

            self.scheduled_post_repository
                .reschedule(scheduled_post_id, until)
                .await?;

            warn!(
                user_id = %entity.user_id,
                %scheduled_post_id,
                %until,
                "scheduling: rate limited, rescheduled past window reset"
            );
            return Ok(DispatchOutcome::Rescheduled { until });
        }

        let access_token = match self
            .access_token_provider
            .access_token_for(entity.user_id)
            .await
        {
            Ok(token) => token,
            Err(err) => {
                self.scheduled_post_repository
                    .mark_failed(scheduled_post_id, err.to_string())
                    .await?;
                return Err(anyhow!(err).context("scheduling: no usable access token"));
            }
        };

        let x_post_id = match self
            .x_api_gateway
            .create_post(access_token, entity.content.clone())
            .await
        {
            Ok(id) => id,
            Err(err) => {
                self.scheduled_post_repository
                    .mark_failed(scheduled_post_id, err.to_string())
                    .await?;
                return Err(err.context("scheduling: publish failed"));
            }
        };

        self.rate_limiter.increment(entity.user_id).await?;
        self.scheduled_post_repository
            .mark_posted(scheduled_post_id, x_post_id.clone(), Utc::now())
            .await?;

        info!(
            user_id = %entity.user_id,
            %scheduled_post_id,
            %x_post_id,
            "scheduling: post published"
        );
        Ok(DispatchOutcome::Posted { x_post_id })
    }
}
