use anyhow::Result;
use axum::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::posts::{InsertPostEntity, PostEntity};

#[async_trait]
#[automock]
pub trait PostRepository {
    async fn create(&self, insert_post_entity: InsertPostEntity) -> Result<Uuid>;
    async fn find_by_id_for_user(&self, post_id: Uuid, user_id: Uuid)
    -> Result<Option<PostEntity>>;
    async fn list_drafts_for_user(&self, user_id: Uuid) -> Result<Vec<PostEntity>>;
    async fn mark_scheduled(&self, post_id: Uuid) -> Result<()>;
}
