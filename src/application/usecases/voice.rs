use std::sync::Arc;

use anyhow::Result as AnyResult;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    ai::VoiceModelRegistry,
    application::usecases::connect::{AccessTokenProvider, AnalysisTrigger},
    domain::{
        entities::posts::InsertPostEntity,
        repositories::{
            posts::PostRepository, subscriptions::SubscriptionRepository, users::UserRepository,
        },
        value_objects::{
            discovery_model::ViralPostDto,
            enums::post_statuses::PostStatus,
            voice::{DraftPostDto, RemixRequestModel, RemixedPostDto, VoiceProfile},
        },
    },
    x_api::XApiGateway,
};

const TIMELINE_FETCH_COUNT: u32 = 50;
const DISCOVERY_FETCH_COUNT: u32 = 25;
const DISCOVERY_MIN_ENGAGEMENT: u64 = 50;
const DISCOVERY_LIMIT: usize = 10;

#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("voice analysis has not completed yet")]
    AnalysisIncomplete,
    #[error("a pro subscription is required for this feature")]
    ProRequired,
    #[error("{0}")]
    Validation(String),
    #[error("upstream service failed")]
    Upstream(#[source] anyhow::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl VoiceError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            VoiceError::AnalysisIncomplete | VoiceError::Validation(_) => StatusCode::BAD_REQUEST,
            VoiceError::ProRequired => StatusCode::FORBIDDEN,
            VoiceError::Upstream(_) => StatusCode::BAD_GATEWAY,
            VoiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type VoiceResult<T> = std::result::Result<T, VoiceError>;

pub struct VoiceUseCase<U, P, S, X, A>
where
    U: UserRepository + Send + Sync + 'static,
    P: PostRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    X: XApiGateway + Send + Sync + 'static,
    A: AccessTokenProvider + 'static,
{
    user_repository: Arc<U>,
    post_repository: Arc<P>,
    subscription_repository: Arc<S>,
    x_api_gateway: Arc<X>,
    access_token_provider: Arc<A>,
    registry: Arc<VoiceModelRegistry>,
}

impl<U, P, S, X, A> VoiceUseCase<U, P, S, X, A>
where
    U: UserRepository + Send + Sync + 'static,
    P: PostRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    X: XApiGateway + Send + Sync + 'static,
    A: AccessTokenProvider + 'static,
{
    pub fn new(
        user_repository: Arc<U>,
        post_repository: Arc<P>,
        subscription_repository: Arc<S>,
        x_api_gateway: Arc<X>,
        access_token_provider: Arc<A>,
        registry: Arc<VoiceModelRegistry>,
    ) -> Self {
        Self {
            user_repository,
            post_repository,
            subscription_repository,
            x_api_gateway,
            access_token_provider,
            registry,
        }
    }

    /// Reads the user's recent timeline and derives a voice profile from it.
    pub async fn analyze(&self, user_id: Uuid) -> VoiceResult<VoiceProfile> {
        let user = self.user_repository.find_by_id(user_id).await.map_err(|err| {
            error!(%user_id, db_error = ?err, "voice: user lookup failed");
            VoiceError::Internal(err)
        })?;

        let access_token = self
            .access_token_provider
            .access_token_for(user_id)
            .await
            .map_err(VoiceError::Internal)?;

        let posts = self
            .x_api_gateway
            .fetch_user_posts(access_token, user.x_user_id.clone(), TIMELINE_FETCH_COUNT)
            .await
            .map_err(|err| {
                error!(%user_id, x_api_error = ?err, "voice: timeline fetch failed");
                VoiceError::Upstream(err)
            })?;

        if posts.is_empty() {
            return Err(VoiceError::Validation(
                "no posts available to analyze".to_string(),
            ));
        }

        let texts: Vec<String> = posts.into_iter().map(|post| post.text).collect();
        let model = self.registry.resolve(&user.preferred_backend);

        let profile = model.analyze_voice(texts).await.map_err(|err| {
            error!(%user_id, model_error = ?err, "voice: analysis failed");
            VoiceError::Upstream(err)
        })?;

        let profile_json =
            serde_json::to_value(&profile).map_err(|err| VoiceError::Internal(err.into()))?;
        let detected_niche = profile.primary_niche().map(str::to_string);

        self.user_repository
            .update_voice_profile(user_id, profile_json, detected_niche, chrono::Utc::now())
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "voice: failed to persist profile");
                VoiceError::Internal(err)
            })?;

        info!(%user_id, "voice: analysis complete");
        Ok(profile)
    }

    /// Rewrites a source post in the user's voice and saves it as a draft.
    /// Pro-only.
    pub async fn remix(
        &self,
        user_id: Uuid,
        request: RemixRequestModel,
    ) -> VoiceResult<RemixedPostDto> {
        if request.source_text.trim().is_empty() {
            return Err(VoiceError::Validation(
                "source_text must not be empty".to_string(),
            ));
        }

        let is_pro = self
            .subscription_repository
            .find_by_user_id(user_id)
            .await
            .map_err(VoiceError::Internal)?
            .map(|subscription| subscription.is_pro())
            .unwrap_or(false);

        if !is_pro {
            warn!(%user_id, "voice: remix blocked, pro required");
            return Err(VoiceError::ProRequired);
        }

        let user = self.user_repository.find_by_id(user_id).await.map_err(|err| {
            error!(%user_id, db_error = ?err, "voice: user lookup failed");
            VoiceError::Internal(err)
        })?;

        if !user.analysis_complete {
            return Err(VoiceError::AnalysisIncomplete);
        }

        let profile: VoiceProfile = user
            .voice_profile
            .clone()
            .and_then(|value| serde_json::from_value(value).ok())
            .ok_or(VoiceError::AnalysisIncomplete)?;

        let model = self.registry.resolve(&user.preferred_backend);
        let content = model
            .remix(request.source_text, profile)
            .await
            .map_err(|err| {
                error!(%user_id, model_error = ?err, "voice: remix failed");
                VoiceError::Upstream(err)
            })?;

        let backend_used = user.preferred_backend.clone();
        let post_id = self
            .post_repository
            .create(InsertPostEntity {
                user_id,
                content: content.clone(),
                source_post_id: request.source_post_id,
                source_author: request.source_author,
                backend_used: Some(backend_used.clone()),
                status: PostStatus::Draft.to_string(),
            })
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "voice: failed to save draft");
                VoiceError::Internal(err)
            })?;

        info!(%user_id, %post_id, "voice: remix saved as draft");
        Ok(RemixedPostDto {
            post_id,
            content,
            backend_used,
        })
    }

    pub async fn drafts(&self, user_id: Uuid) -> VoiceResult<Vec<DraftPostDto>> {
        let entities = self
            .post_repository
            .list_drafts_for_user(user_id)
            .await
            .map_err(VoiceError::Internal)?;

        Ok(entities.iter().map(DraftPostDto::from_entity).collect())
    }

    /// Surfaces high-engagement posts from the user's detected niche as
    /// remix candidates.
    pub async fn discover(&self, user_id: Uuid) -> VoiceResult<Vec<ViralPostDto>> {
        let user = self.user_repository.find_by_id(user_id).await.map_err(|err| {
            error!(%user_id, db_error = ?err, "voice: user lookup failed");
            VoiceError::Internal(err)
        })?;

        let niche = user.detected_niche.ok_or(VoiceError::AnalysisIncomplete)?;
        let query = format!("{} -is:retweet -is:reply lang:en", niche);

        let hits = self
            .x_api_gateway
            .search_recent(query, DISCOVERY_FETCH_COUNT)
            .await
            .map_err(|err| {
                error!(%user_id, x_api_error = ?err, "voice: discovery search failed");
                VoiceError::Upstream(err)
            })?;

        let mut viral: Vec<ViralPostDto> = hits
            .into_iter()
            .map(|hit| ViralPostDto {
                post_id: hit.post.id,
                author_username: hit.author_username,
                text: hit.post.text,
                like_count: hit.post.public_metrics.like_count,
                retweet_count: hit.post.public_metrics.retweet_count,
                reply_count: hit.post.public_metrics.reply_count,
            })
            .filter(|post| post.engagement() >= DISCOVERY_MIN_ENGAGEMENT)
            .collect();

        viral.sort_by(|a, b| b.engagement().cmp(&a.engagement()));
        viral.truncate(DISCOVERY_LIMIT);

        Ok(viral)
    }
}

/// Spawned analysis off the connect callback, detached so the HTTP response
/// never waits on model latency.
pub struct BackgroundAnalysis<U, P, S, X, A>
where
    U: UserRepository + Send + Sync + 'static,
    P: PostRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    X: XApiGateway + Send + Sync + 'static,
    A: AccessTokenProvider + 'static,
{
    voice_use_case: Arc<VoiceUseCase<U, P, S, X, A>>,
}

impl<U, P, S, X, A> BackgroundAnalysis<U, P, S, X, A>
where
    U: UserRepository + Send + Sync + 'static,
    P: PostRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    X: XApiGateway + Send + Sync + 'static,
    A: AccessTokenProvider + 'static,
{
    pub fn new(voice_use_case: Arc<VoiceUseCase<U, P, S, X, A>>) -> Self {
        Self { voice_use_case }
    }
}

impl<U, P, S, X, A> AnalysisTrigger for BackgroundAnalysis<U, P, S, X, A>
where
    U: UserRepository + Send + Sync + 'static,
    P: PostRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    X: XApiGateway + Send + Sync + 'static,
    A: AccessTokenProvider + Send + Sync + 'static,
{
    fn trigger(&self, user_id: Uuid) {
        let voice_use_case = Arc::clone(&self.voice_use_case);
        tokio::spawn(async move {
            if let Err(err) = voice_use_case.analyze(user_id).await {
                warn!(%user_id, analysis_error = ?err, "voice: background analysis failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{MockVoiceModel, VoiceModelRegistry};
    use crate::application::usecases::connect::MockAccessTokenProvider;
    use crate::domain::entities::subscriptions::SubscriptionEntity;
    use crate::domain::entities::users::UserEntity;
    use crate::domain::repositories::posts::MockPostRepository;
    use crate::domain::repositories::subscriptions::MockSubscriptionRepository;
    use crate::domain::repositories::users::MockUserRepository;
    use crate::domain::value_objects::enums::ai_backends::AiBackend;
    use crate::domain::value_objects::enums::plan_types::PlanType;
    use crate::domain::value_objects::enums::subscription_statuses::SubscriptionStatus;
    use crate::x_api::{MockXApiGateway, XPost, XPublicMetrics, XSearchHit};
    use chrono::Utc;
    use std::collections::HashMap;

    fn sample_user(user_id: Uuid, analysis_complete: bool) -> UserEntity {
        let now = Utc::now();
        UserEntity {
            id: user_id,
            email: None,
            x_user_id: "1234".to_string(),
            x_username: "builder".to_string(),
            x_access_token: Some("ciphertext".to_string()),
            x_refresh_token: None,
            x_token_expires_at: Some(now + chrono::Duration::hours(1)),
            detected_niche: Some("indie hacking".to_string()),
            voice_profile: analysis_complete.then(|| {
                serde_json::json!({
                    "niche": ["indie hacking"],
                    "tone": "direct",
                    "topics": ["saas"],
                    "best_content": []
                })
            }),
            analysis_complete,
            auto_pilot_enabled: false,
            posts_per_day: 3,
            preferred_backend: AiBackend::Claude.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    fn pro_subscription(user_id: Uuid) -> SubscriptionEntity {
        let now = Utc::now();
        SubscriptionEntity {
            id: Uuid::new_v4(),
            user_id,
            stripe_customer_id: Some("cus_1".to_string()),
            stripe_subscription_id: Some("sub_1".to_string()),
            stripe_price_id: Some("price_pro".to_string()),
            status: SubscriptionStatus::Active.to_string(),
            plan_type: PlanType::Pro.to_string(),
            current_period_start: Some(now),
            current_period_end: Some(now + chrono::Duration::days(30)),
            cancel_at_period_end: false,
            canceled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn registry_with(model: MockVoiceModel) -> Arc<VoiceModelRegistry> {
        let mut models: HashMap<AiBackend, Arc<dyn crate::ai::VoiceModel + Send + Sync>> =
            HashMap::new();
        models.insert(AiBackend::Claude, Arc::new(model));
        Arc::new(VoiceModelRegistry::with_models(models))
    }

    fn use_case(
        user_repo: MockUserRepository,
        post_repo: MockPostRepository,
        subscription_repo: MockSubscriptionRepository,
        x_api: MockXApiGateway,
        tokens: MockAccessTokenProvider,
        registry: Arc<VoiceModelRegistry>,
    ) -> VoiceUseCase<
        MockUserRepository,
        MockPostRepository,
        MockSubscriptionRepository,
        MockXApiGateway,
        MockAccessTokenProvider,
    > {
        VoiceUseCase::new(
            Arc::new(user_repo),
            Arc::new(post_repo),
            Arc::new(subscription_repo),
            Arc::new(x_api),
            Arc::new(tokens),
            registry,
        )
    }

    #[tokio::test]
    async fn analyze_persists_profile_and_niche() {
        let user_id = Uuid::new_v4();
        let user = sample_user(user_id, false);

        let mut user_repo = MockUserRepository::new();
        user_repo.expect_find_by_id().returning(move |_| {
            let user = user.clone();
            Box::pin(async move { Ok(user) })
        });
        user_repo
            .expect_update_voice_profile()
            .withf(|_, profile, niche, _| {
                profile.get("tone").is_some() && niche.as_deref() == Some("fintech")
            })
            .times(1)
            .returning(|_, _, _, _| Box::pin(async { Ok(()) }));

        let mut tokens = MockAccessTokenProvider::new();
        tokens
            .expect_access_token_for()
            .returning(|_| Box::pin(async { Ok("token".to_string()) }));

        let mut x_api = MockXApiGateway::new();
        x_api.expect_fetch_user_posts().returning(|_, _, _| {
            Box::pin(async {
                Ok(vec![XPost {
                    id: "1".to_string(),
                    text: "observation about payments".to_string(),
                    author_id: None,
                    public_metrics: XPublicMetrics::default(),
                }])
            })
        });

        let mut model = MockVoiceModel::new();
        model.expect_analyze_voice().returning(|_| {
            Box::pin(async {
                Ok(VoiceProfile {
                    niche: vec!["fintech".to_string()],
                    tone: "dry".to_string(),
                    topics: vec!["payments".to_string()],
                    best_content: vec![],
                })
            })
        });

        let use_case = use_case(
            user_repo,
            MockPostRepository::new(),
            MockSubscriptionRepository::new(),
            x_api,
            tokens,
            registry_with(model),
        );

        let profile = use_case.analyze(user_id).await.unwrap();
        assert_eq!(profile.primary_niche(), Some("fintech"));
    }

    #[tokio::test]
    async fn analyze_rejects_empty_timeline() {
        let user_id = Uuid::new_v4();
        let user = sample_user(user_id, false);

        let mut user_repo = MockUserRepository::new();
        user_repo.expect_find_by_id().returning(move |_| {
            let user = user.clone();
            Box::pin(async move { Ok(user) })
        });
        user_repo.expect_update_voice_profile().times(0);

        let mut tokens = MockAccessTokenProvider::new();
        tokens
            .expect_access_token_for()
            .returning(|_| Box::pin(async { Ok("token".to_string()) }));

        let mut x_api = MockXApiGateway::new();
        x_api
            .expect_fetch_user_posts()
            .returning(|_, _, _| Box::pin(async { Ok(vec![]) }));

        let use_case = use_case(
            user_repo,
            MockPostRepository::new(),
            MockSubscriptionRepository::new(),
            x_api,
            tokens,
            registry_with(MockVoiceModel::new()),
        );

        let result = use_case.analyze(user_id).await;
        assert!(matches!(result, Err(VoiceError::Validation(_))));
    }

    #[tokio::test]
    async fn remix_requires_pro() {
        let user_id = Uuid::new_v4();

        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_find_by_user_id()
            .returning(|_| Box::pin(async { Ok(None) }));

        let mut post_repo = MockPostRepository::new();
        post_repo.expect_create().times(0);

        let use_case = use_case(
            MockUserRepository::new(),
            post_repo,
            subscription_repo,
            MockXApiGateway::new(),
            MockAccessTokenProvider::new(),
            registry_with(MockVoiceModel::new()),
        );

        let result = use_case
            .remix(
                user_id,
                RemixRequestModel {
                    source_text: "viral take".to_string(),
                    source_post_id: None,
                    source_author: None,
                },
            )
            .await;

        assert!(matches!(result, Err(VoiceError::ProRequired)));
    }

    #[tokio::test]
    async fn remix_requires_completed_analysis() {
        let user_id = Uuid::new_v4();
        let user = sample_user(user_id, false);

        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo.expect_find_by_user_id().returning(move |_| {
            let subscription = pro_subscription(user_id);
            Box::pin(async move { Ok(Some(subscription)) })
        });

        let mut user_repo = MockUserRepository::new();
        user_repo.expect_find_by_id().returning(move |_| {
            let user = user.clone();
            Box::pin(async move { Ok(user) })
        });

        let use_case = use_case(
            user_repo,
            MockPostRepository::new(),
            subscription_repo,
            MockXApiGateway::new(),
            MockAccessTokenProvider::new(),
            registry_with(MockVoiceModel::new()),
        );

        let result = use_case
            .remix(
                user_id,
                RemixRequestModel {
                    source_text: "viral take".to_string(),
                    source_post_id: None,
                    source_author: None,
                },
            )
            .await;

        assert!(matches!(result, Err(VoiceError::AnalysisIncomplete)));
    }

    #[tokio::test]
    async fn remix_saves_draft_with_backend() {
        let user_id = Uuid::new_v4();
        let post_id = Uuid::new_v4();
        let user = sample_user(user_id, true);

        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo.expect_find_by_user_id().returning(move |_| {
            let subscription = pro_subscription(user_id);
            Box::pin(async move { Ok(Some(subscription)) })
        });

        let mut user_repo = MockUserRepository::new();
        user_repo.expect_find_by_id().returning(move |_| {
            let user = user.clone();
            Box::pin(async move { Ok(user) })
        });

        let mut model = MockVoiceModel::new();
        model
            .expect_remix()
            .returning(|_, _| Box::pin(async { Ok("remixed take".to_string()) }));

        let mut post_repo = MockPostRepository::new();
        post_repo
            .expect_create()
            .withf(|insert| {
                insert.status == "draft" && insert.backend_used.as_deref() == Some("claude")
            })
            .times(1)
            .returning(move |_| Box::pin(async move { Ok(post_id) }));

        let use_case = use_case(
            user_repo,
            post_repo,
            subscription_repo,
            MockXApiGateway::new(),
            MockAccessTokenProvider::new(),
            registry_with(model),
        );

        let draft = use_case
            .remix(
                user_id,
                RemixRequestModel {
                    source_text: "viral take".to_string(),
                    source_post_id: Some("42".to_string()),
                    source_author: Some("someone".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(draft.post_id, post_id);
        assert_eq!(draft.content, "remixed take");
    }

    #[tokio::test]
    async fn discover_filters_and_ranks_by_engagement() {
        let user_id = Uuid::new_v4();
        let user = sample_user(user_id, true);

        let mut user_repo = MockUserRepository::new();
        user_repo.expect_find_by_id().returning(move |_| {
            let user = user.clone();
            Box::pin(async move { Ok(user) })
        });

        let mut x_api = MockXApiGateway::new();
        x_api
            .expect_search_recent()
            .withf(|query, _| query.contains("-is:retweet") && query.contains("indie hacking"))
            .returning(|_, _| {
                let hit = |id: &str, likes: u64| XSearchHit {
                    post: XPost {
                        id: id.to_string(),
                        text: "take".to_string(),
                        author_id: Some("9".to_string()),
                        public_metrics: XPublicMetrics {
                            like_count: likes,
                            retweet_count: 0,
                            reply_count: 0,
                        },
                    },
                    author_username: "someone".to_string(),
                };
                Box::pin(async move { Ok(vec![hit("low", 3), hit("high", 900), hit("mid", 120)]) })
            });

        let use_case = use_case(
            user_repo,
            MockPostRepository::new(),
            MockSubscriptionRepository::new(),
            x_api,
            MockAccessTokenProvider::new(),
            registry_with(MockVoiceModel::new()),
        );

        let viral = use_case.discover(user_id).await.unwrap();

        let ids: Vec<&str> = viral.iter().map(|post| post.post_id.as_str()).collect();
        assert_eq!(ids, vec!["high", "mid"]);
    }
}
