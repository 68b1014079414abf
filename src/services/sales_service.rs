use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{found, NotificationService, ServiceError};
use crate::api::sales::{
    ActivityStatus, CreateActivity, CreateOpportunity, CreatePipeline, CreateSalesComment, CreateStage,
    MoveOpportunity, UpdateActivity, UpdateOpportunity, UpdatePipeline, UpdateSalesComment, UpdateStage,
};
use crate::database::models::{
    OpportunityDetail, PipelineDetail, SalesActivity, SalesComment, SalesOpportunity, SalesPipeline, SalesStage,
    StageWithOpportunities,
};
use crate::notifications::{NewNotification, NotificationDispatcher};
use crate::ordering::postgres::{SALES_OPPORTUNITIES, SALES_STAGES};
use crate::ordering::{PgOrderedStore, Reorderer};

const PIPELINE_COLUMNS: &str = "id, name, description, is_active, created_at, updated_at";
const STAGE_COLUMNS: &str = "id, pipeline_id, name, description, color, position, created_at, updated_at";
const OPPORTUNITY_COLUMNS: &str = "id, stage_id, title, description, company, contact, email, phone, value, \
     priority, tags, position, assigned_to_id, created_by_id, created_at, updated_at";
const COMMENT_COLUMNS: &str = "id, opportunity_id, user_id, content, is_pinned, created_at, updated_at";
const ACTIVITY_COLUMNS: &str = "id, opportunity_id, activity_type, title, description, scheduled_date, \
     scheduled_time, status, completed_date, completed_time, assigned_to_id, created_at, updated_at";

pub struct SalesService {
    pool: PgPool,
    reorderer: Reorderer,
    notifier: Arc<dyn NotificationDispatcher>,
}

impl SalesService {
    pub fn new(pool: PgPool) -> Self {
        let notifier = Arc::new(NotificationService::new(pool.clone()));
        Self {
            pool,
            reorderer: Reorderer::from_config(),
            notifier,
        }
    }

    // ---- pipelines ----

    pub async fn create_pipeline(&self, dto: CreatePipeline) -> Result<SalesPipeline, ServiceError> {
        let sql = format!(
            "INSERT INTO sales_pipelines (name, description) VALUES ($1, $2) RETURNING {}",
            PIPELINE_COLUMNS
        );
        let pipeline = sqlx::query_as::<_, SalesPipeline>(&sql)
            .bind(dto.name.trim())
            .bind(&dto.description)
            .fetch_one(&self.pool)
            .await?;
        tracing::info!("Created pipeline {} ({})", pipeline.id, pipeline.name);
        Ok(pipeline)
    }

    /// Active pipelines, newest first, with their ordered stages and opportunities
    pub async fn list_pipelines(&self) -> Result<Vec<PipelineDetail>, ServiceError> {
        let sql = format!(
            "SELECT {} FROM sales_pipelines WHERE is_active ORDER BY created_at DESC",
            PIPELINE_COLUMNS
        );
        let pipelines = sqlx::query_as::<_, SalesPipeline>(&sql).fetch_all(&self.pool).await?;
        let ids: Vec<Uuid> = pipelines.iter().map(|p| p.id).collect();

        let mut stages = self.stages_with_opportunities(&ids).await?;
        Ok(pipelines
            .into_iter()
            .map(|pipeline| PipelineDetail {
                stages: stages.remove(&pipeline.id).unwrap_or_default(),
                pipeline,
            })
            .collect())
    }

    pub async fn get_pipeline(&self, id: Uuid) -> Result<PipelineDetail, ServiceError> {
        let sql = format!("SELECT {} FROM sales_pipelines WHERE id = $1", PIPELINE_COLUMNS);
        let pipeline = sqlx::query_as::<_, SalesPipeline>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let pipeline = found(pipeline, "Pipeline", id)?;

        let mut stages = self.stages_with_opportunities(&[id]).await?;
        Ok(PipelineDetail {
            stages: stages.remove(&id).unwrap_or_default(),
            pipeline,
        })
    }

    pub async fn update_pipeline(&self, id: Uuid, dto: UpdatePipeline) -> Result<SalesPipeline, ServiceError> {
        let sql = format!(
            "UPDATE sales_pipelines SET name = COALESCE($2, name), description = COALESCE($3, description), \
             is_active = COALESCE($4, is_active), updated_at = NOW() WHERE id = $1 RETURNING {}",
            PIPELINE_COLUMNS
        );
        let pipeline = sqlx::query_as::<_, SalesPipeline>(&sql)
            .bind(id)
            .bind(dto.name.as_deref().map(str::trim))
            .bind(&dto.description)
            .bind(dto.is_active)
            .fetch_optional(&self.pool)
            .await?;
        found(pipeline, "Pipeline", id)
    }

    /// Soft delete: the pipeline is deactivated and drops out of the listing
    pub async fn delete_pipeline(&self, id: Uuid) -> Result<SalesPipeline, ServiceError> {
        let sql = format!(
            "UPDATE sales_pipelines SET is_active = FALSE, updated_at = NOW() WHERE id = $1 RETURNING {}",
            PIPELINE_COLUMNS
        );
        let pipeline = sqlx::query_as::<_, SalesPipeline>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let pipeline = found(pipeline, "Pipeline", id)?;
        tracing::info!("Deactivated pipeline {}", id);
        Ok(pipeline)
    }

    async fn stages_with_opportunities(
        &self,
        pipeline_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<StageWithOpportunities>>, ServiceError> {
        let sql = format!(
            "SELECT {} FROM sales_stages WHERE pipeline_id = ANY($1) ORDER BY pipeline_id, position",
            STAGE_COLUMNS
        );
        let stages = sqlx::query_as::<_, SalesStage>(&sql)
            .bind(pipeline_ids)
            .fetch_all(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {} FROM sales_opportunities WHERE stage_id IN \
             (SELECT id FROM sales_stages WHERE pipeline_id = ANY($1)) ORDER BY stage_id, position",
            OPPORTUNITY_COLUMNS
        );
        let opportunities = sqlx::query_as::<_, SalesOpportunity>(&sql)
            .bind(pipeline_ids)
            .fetch_all(&self.pool)
            .await?;

        let mut by_stage: HashMap<Uuid, Vec<SalesOpportunity>> = HashMap::new();
        for opportunity in opportunities {
            by_stage.entry(opportunity.stage_id).or_default().push(opportunity);
        }

        let mut by_pipeline: HashMap<Uuid, Vec<StageWithOpportunities>> = HashMap::new();
        for stage in stages {
            let opportunities = by_stage.remove(&stage.id).unwrap_or_default();
            by_pipeline
                .entry(stage.pipeline_id)
                .or_default()
                .push(StageWithOpportunities { stage, opportunities });
        }
        Ok(by_pipeline)
    }

    // ---- stages ----

    pub async fn create_stage(&self, pipeline_id: Uuid, dto: CreateStage) -> Result<SalesStage, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let position = {
            let mut store = PgOrderedStore::new(SALES_STAGES, &mut tx);
            self.reorderer.insert_at(&mut store, &pipeline_id, dto.position).await?
        };

        let sql = format!(
            "INSERT INTO sales_stages (pipeline_id, name, description, color, position) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            STAGE_COLUMNS
        );
        let stage = sqlx::query_as::<_, SalesStage>(&sql)
            .bind(pipeline_id)
            .bind(dto.name.trim())
            .bind(&dto.description)
            .bind(&dto.color)
            .bind(position)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!("Created stage {} in pipeline {} at position {}", stage.id, pipeline_id, position);
        Ok(stage)
    }

    /// A `position` in the update repositions the stage within its pipeline
    pub async fn update_stage(&self, id: Uuid, dto: UpdateStage) -> Result<SalesStage, ServiceError> {
        let mut tx = self.pool.begin().await?;
        if let Some(position) = dto.position {
            let mut store = PgOrderedStore::new(SALES_STAGES, &mut tx);
            self.reorderer.move_within(&mut store, &id, position).await?;
        }

        let sql = format!(
            "UPDATE sales_stages SET name = COALESCE($2, name), description = COALESCE($3, description), \
             color = COALESCE($4, color), updated_at = NOW() WHERE id = $1 RETURNING {}",
            STAGE_COLUMNS
        );
        let stage = sqlx::query_as::<_, SalesStage>(&sql)
            .bind(id)
            .bind(dto.name.as_deref().map(str::trim))
            .bind(&dto.description)
            .bind(&dto.color)
            .fetch_optional(&mut *tx)
            .await?;
        let stage = found(stage, "Stage", id)?;
        tx.commit().await?;
        Ok(stage)
    }

    pub async fn move_stage(&self, id: Uuid, new_position: i32) -> Result<SalesStage, ServiceError> {
        let mut tx = self.pool.begin().await?;
        {
            let mut store = PgOrderedStore::new(SALES_STAGES, &mut tx);
            self.reorderer.move_within(&mut store, &id, new_position).await?;
        }
        let stage = fetch_stage(&mut tx, id).await?;
        tx.commit().await?;
        Ok(stage)
    }

    /// Refused while the stage still holds opportunities
    pub async fn delete_stage(&self, id: Uuid) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await?;
        fetch_stage(&mut tx, id).await?;

        let held: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales_opportunities WHERE stage_id = $1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if held > 0 {
            return Err(ServiceError::BadRequest(format!(
                "Cannot delete a stage that still holds {} opportunities",
                held
            )));
        }

        {
            let mut store = PgOrderedStore::new(SALES_STAGES, &mut tx);
            self.reorderer.remove(&mut store, &id).await?;
        }
        tx.commit().await?;
        tracing::info!("Deleted stage {}", id);
        Ok(())
    }

    // ---- opportunities ----

    /// Inserted at `position`, or appended to the stage when absent
    pub async fn create_opportunity(&self, dto: CreateOpportunity, actor: Uuid) -> Result<SalesOpportunity, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let position = {
            let mut store = PgOrderedStore::new(SALES_OPPORTUNITIES, &mut tx);
            self.reorderer
                .insert_or_append(&mut store, &dto.stage_id, dto.position)
                .await?
        };

        let sql = format!(
            "INSERT INTO sales_opportunities (stage_id, title, description, company, contact, email, phone, value, \
             priority, tags, position, assigned_to_id, created_by_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) RETURNING {}",
            OPPORTUNITY_COLUMNS
        );
        let opportunity = sqlx::query_as::<_, SalesOpportunity>(&sql)
            .bind(dto.stage_id)
            .bind(dto.title.trim())
            .bind(&dto.description)
            .bind(dto.company.trim())
            .bind(dto.contact.trim())
            .bind(&dto.email)
            .bind(&dto.phone)
            .bind(dto.value)
            .bind(dto.priority.as_str())
            .bind(&dto.tags)
            .bind(position)
            .bind(dto.assigned_to_id)
            .bind(actor)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!("Created opportunity {} in stage {}", opportunity.id, opportunity.stage_id);
        if let Some(assignee) = opportunity.assigned_to_id.filter(|assignee| *assignee != actor) {
            self.notify(NewNotification::sales_assigned(assignee, &opportunity.title, opportunity.id))
                .await;
        }
        Ok(opportunity)
    }

    /// Comments come pinned first then newest; activities by schedule
    pub async fn get_opportunity(&self, id: Uuid) -> Result<OpportunityDetail, ServiceError> {
        let sql = format!("SELECT {} FROM sales_opportunities WHERE id = $1", OPPORTUNITY_COLUMNS);
        let opportunity = sqlx::query_as::<_, SalesOpportunity>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let opportunity = found(opportunity, "Opportunity", id)?;

        let sql = format!("SELECT {} FROM sales_stages WHERE id = $1", STAGE_COLUMNS);
        let stage = sqlx::query_as::<_, SalesStage>(&sql)
            .bind(opportunity.stage_id)
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {} FROM sales_comments WHERE opportunity_id = $1 ORDER BY is_pinned DESC, created_at DESC",
            COMMENT_COLUMNS
        );
        let comments = sqlx::query_as::<_, SalesComment>(&sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {} FROM sales_activities WHERE opportunity_id = $1 ORDER BY scheduled_date",
            ACTIVITY_COLUMNS
        );
        let activities = sqlx::query_as::<_, SalesActivity>(&sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await?;

        Ok(OpportunityDetail {
            opportunity,
            stage,
            comments,
            activities,
        })
    }

    /// `stageId` and `position` in the update go through the reorder engine
    pub async fn update_opportunity(
        &self,
        id: Uuid,
        dto: UpdateOpportunity,
        actor: Uuid,
    ) -> Result<SalesOpportunity, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let before = fetch_opportunity(&mut tx, id).await?;

        if dto.stage_id.is_some() || dto.position.is_some() {
            let target = dto.stage_id.unwrap_or(before.stage_id);
            let mut store = PgOrderedStore::new(SALES_OPPORTUNITIES, &mut tx);
            self.reorderer
                .move_or_append(&mut store, &id, &target, dto.position)
                .await?;
        }

        let sql = format!(
            "UPDATE sales_opportunities SET title = COALESCE($2, title), description = COALESCE($3, description), \
             company = COALESCE($4, company), contact = COALESCE($5, contact), email = COALESCE($6, email), \
             phone = COALESCE($7, phone), value = COALESCE($8, value), priority = COALESCE($9, priority), \
             assigned_to_id = COALESCE($10, assigned_to_id), tags = COALESCE($11, tags), updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            OPPORTUNITY_COLUMNS
        );
        let opportunity = sqlx::query_as::<_, SalesOpportunity>(&sql)
            .bind(id)
            .bind(dto.title.as_deref().map(str::trim))
            .bind(&dto.description)
            .bind(dto.company.as_deref().map(str::trim))
            .bind(dto.contact.as_deref().map(str::trim))
            .bind(&dto.email)
            .bind(&dto.phone)
            .bind(dto.value)
            .bind(dto.priority.map(|p| p.as_str()))
            .bind(dto.assigned_to_id)
            .bind(&dto.tags)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        let reassigned = dto
            .assigned_to_id
            .filter(|assignee| Some(*assignee) != before.assigned_to_id && *assignee != actor);
        if let Some(assignee) = reassigned {
            self.notify(NewNotification::sales_assigned(assignee, &opportunity.title, opportunity.id))
                .await;
        }
        Ok(opportunity)
    }

    pub async fn move_opportunity(&self, id: Uuid, dto: MoveOpportunity) -> Result<SalesOpportunity, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let moved = {
            let mut store = PgOrderedStore::new(SALES_OPPORTUNITIES, &mut tx);
            self.reorderer
                .move_or_append(&mut store, &id, &dto.stage_id, dto.position)
                .await?
        };
        let opportunity = fetch_opportunity(&mut tx, id).await?;
        tx.commit().await?;

        tracing::debug!("Opportunity {} now at {}@{}", id, moved.scope, moved.position);
        Ok(opportunity)
    }

    pub async fn delete_opportunity(&self, id: Uuid) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await?;
        {
            let mut store = PgOrderedStore::new(SALES_OPPORTUNITIES, &mut tx);
            self.reorderer.remove(&mut store, &id).await?;
        }
        tx.commit().await?;
        tracing::info!("Deleted opportunity {}", id);
        Ok(())
    }

    // ---- comments ----

    pub async fn create_comment(
        &self,
        opportunity_id: Uuid,
        dto: CreateSalesComment,
        actor: Uuid,
    ) -> Result<SalesComment, ServiceError> {
        self.ensure_opportunity(opportunity_id).await?;
        let sql = format!(
            "INSERT INTO sales_comments (opportunity_id, user_id, content, is_pinned) VALUES ($1, $2, $3, $4) \
             RETURNING {}",
            COMMENT_COLUMNS
        );
        let comment = sqlx::query_as::<_, SalesComment>(&sql)
            .bind(opportunity_id)
            .bind(actor)
            .bind(dto.content.trim())
            .bind(dto.is_pinned)
            .fetch_one(&self.pool)
            .await?;
        Ok(comment)
    }

    /// Only the author may edit a comment
    pub async fn update_comment(&self, id: Uuid, dto: UpdateSalesComment, actor: Uuid) -> Result<SalesComment, ServiceError> {
        let sql = format!(
            "UPDATE sales_comments SET content = COALESCE($3, content), is_pinned = COALESCE($4, is_pinned), \
             updated_at = NOW() WHERE id = $1 AND user_id = $2 RETURNING {}",
            COMMENT_COLUMNS
        );
        let comment = sqlx::query_as::<_, SalesComment>(&sql)
            .bind(id)
            .bind(actor)
            .bind(dto.content.as_deref().map(str::trim))
            .bind(dto.is_pinned)
            .fetch_optional(&self.pool)
            .await?;
        found(comment, "Comment", id)
    }

    pub async fn delete_comment(&self, id: Uuid, actor: Uuid) -> Result<(), ServiceError> {
        let deleted: Option<Uuid> =
            sqlx::query_scalar("DELETE FROM sales_comments WHERE id = $1 AND user_id = $2 RETURNING id")
                .bind(id)
                .bind(actor)
                .fetch_optional(&self.pool)
                .await?;
        found(deleted, "Comment", id)?;
        Ok(())
    }

    // ---- activities ----

    /// The activity belongs to `assignedToId`, or to the creator when absent
    pub async fn create_activity(
        &self,
        opportunity_id: Uuid,
        dto: CreateActivity,
        actor: Uuid,
    ) -> Result<SalesActivity, ServiceError> {
        self.ensure_opportunity(opportunity_id).await?;
        let sql = format!(
            "INSERT INTO sales_activities (opportunity_id, activity_type, title, description, scheduled_date, \
             scheduled_time, assigned_to_id) VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            ACTIVITY_COLUMNS
        );
        let activity = sqlx::query_as::<_, SalesActivity>(&sql)
            .bind(opportunity_id)
            .bind(dto.activity_type.as_str())
            .bind(dto.title.trim())
            .bind(&dto.description)
            .bind(dto.scheduled_date)
            .bind(&dto.scheduled_time)
            .bind(dto.assigned_to_id.unwrap_or(actor))
            .fetch_one(&self.pool)
            .await?;
        Ok(activity)
    }

    /// Activities can only be changed by the user they are assigned to
    pub async fn update_activity(&self, id: Uuid, dto: UpdateActivity, actor: Uuid) -> Result<SalesActivity, ServiceError> {
        let sql = format!(
            "UPDATE sales_activities SET activity_type = COALESCE($3, activity_type), title = COALESCE($4, title), \
             description = COALESCE($5, description), scheduled_date = COALESCE($6, scheduled_date), \
             scheduled_time = COALESCE($7, scheduled_time), status = COALESCE($8, status), \
             completed_date = COALESCE($9, completed_date), completed_time = COALESCE($10, completed_time), \
             updated_at = NOW() WHERE id = $1 AND assigned_to_id = $2 RETURNING {}",
            ACTIVITY_COLUMNS
        );
        let activity = sqlx::query_as::<_, SalesActivity>(&sql)
            .bind(id)
            .bind(actor)
            .bind(dto.activity_type.map(|t| t.as_str()))
            .bind(dto.title.as_deref().map(str::trim))
            .bind(&dto.description)
            .bind(dto.scheduled_date)
            .bind(&dto.scheduled_time)
            .bind(dto.status.map(|s| s.as_str()))
            .bind(dto.completed_date)
            .bind(&dto.completed_time)
            .fetch_optional(&self.pool)
            .await?;
        found(activity, "Activity", id)
    }

    /// Marks the activity completed now, with the completion time as `HH:MM`
    pub async fn complete_activity(&self, id: Uuid, actor: Uuid) -> Result<SalesActivity, ServiceError> {
        let now = Utc::now();
        let sql = format!(
            "UPDATE sales_activities SET status = $3, completed_date = $4, completed_time = $5, updated_at = NOW() \
             WHERE id = $1 AND assigned_to_id = $2 RETURNING {}",
            ACTIVITY_COLUMNS
        );
        let activity = sqlx::query_as::<_, SalesActivity>(&sql)
            .bind(id)
            .bind(actor)
            .bind(ActivityStatus::Completed.as_str())
            .bind(now)
            .bind(now.format("%H:%M").to_string())
            .fetch_optional(&self.pool)
            .await?;
        found(activity, "Activity", id)
    }

    pub async fn delete_activity(&self, id: Uuid, actor: Uuid) -> Result<(), ServiceError> {
        let deleted: Option<Uuid> =
            sqlx::query_scalar("DELETE FROM sales_activities WHERE id = $1 AND assigned_to_id = $2 RETURNING id")
                .bind(id)
                .bind(actor)
                .fetch_optional(&self.pool)
                .await?;
        found(deleted, "Activity", id)?;
        Ok(())
    }

    async fn ensure_opportunity(&self, id: Uuid) -> Result<(), ServiceError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM sales_opportunities WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        if !exists {
            return Err(ServiceError::not_found("Opportunity", id));
        }
        Ok(())
    }

    async fn notify(&self, notification: NewNotification) {
        let user = notification.user_id;
        if let Err(e) = self.notifier.dispatch(notification).await {
            tracing::warn!("Failed to notify user {}: {}", user, e);
        }
    }
}

async fn fetch_stage(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<SalesStage, ServiceError> {
    let sql = format!("SELECT {} FROM sales_stages WHERE id = $1", STAGE_COLUMNS);
    let stage = sqlx::query_as::<_, SalesStage>(&sql)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;
    found(stage, "Stage", id)
}

async fn fetch_opportunity(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<SalesOpportunity, ServiceError> {
    let sql = format!("SELECT {} FROM sales_opportunities WHERE id = $1", OPPORTUNITY_COLUMNS);
    let opportunity = sqlx::query_as::<_, SalesOpportunity>(&sql)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;
    found(opportunity, "Opportunity", id)
}
