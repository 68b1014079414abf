use sqlx::PgPool;
use uuid::Uuid;

use super::{found, ServiceError};
use crate::api::support::{CreateFaq, CreateTicket, FaqQuery, UpdateFaq, UpdateTicket};
use crate::api::{Page, PageQuery};
use crate::database::models::{Faq, SupportTicket, FAQ_COLUMNS, TICKET_COLUMNS};

/// Active FAQs match on category and, optionally, a search term in the question or answer
const FAQ_FILTER: &str = "is_active AND ($1::text IS NULL OR category = $1) \
     AND ($2::text IS NULL OR question ILIKE $2 OR answer ILIKE $2)";

/// Support tickets, visible only to the user who opened them, and the FAQ.
pub struct SupportService {
    pool: PgPool,
}

impl SupportService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ---- tickets ----

    pub async fn create_ticket(&self, user_id: Uuid, dto: CreateTicket) -> Result<SupportTicket, ServiceError> {
        let sql = format!(
            "INSERT INTO support_tickets (user_id, subject, description, category, priority) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            TICKET_COLUMNS
        );
        let ticket = sqlx::query_as::<_, SupportTicket>(&sql)
            .bind(user_id)
            .bind(dto.subject.trim())
            .bind(dto.description.trim())
            .bind(dto.category.as_str())
            .bind(dto.priority.as_str())
            .fetch_one(&self.pool)
            .await?;
        tracing::info!("User {} opened ticket {}", user_id, ticket.id);
        Ok(ticket)
    }

    /// The user's own tickets, newest first
    pub async fn list_tickets(&self, user_id: Uuid, query: PageQuery) -> Result<Page<SupportTicket>, ServiceError> {
        let sql = format!(
            "SELECT {} FROM support_tickets WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
            TICKET_COLUMNS
        );
        let tickets = sqlx::query_as::<_, SupportTicket>(&sql)
            .bind(user_id)
            .bind(query.limit())
            .bind(query.offset())
            .fetch_all(&self.pool)
            .await?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM support_tickets WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(query.into_page(tickets, total))
    }

    pub async fn get_ticket(&self, user_id: Uuid, id: Uuid) -> Result<SupportTicket, ServiceError> {
        self.owned_ticket(user_id, id).await
    }

    pub async fn update_ticket(&self, user_id: Uuid, id: Uuid, dto: UpdateTicket) -> Result<SupportTicket, ServiceError> {
        self.owned_ticket(user_id, id).await?;
        let sql = format!(
            "UPDATE support_tickets SET subject = COALESCE($2, subject), description = COALESCE($3, description), \
             category = COALESCE($4, category), priority = COALESCE($5, priority), status = COALESCE($6, status), \
             assigned_to = COALESCE($7, assigned_to), updated_at = NOW() WHERE id = $1 RETURNING {}",
            TICKET_COLUMNS
        );
        let ticket = sqlx::query_as::<_, SupportTicket>(&sql)
            .bind(id)
            .bind(dto.subject.as_deref().map(str::trim))
            .bind(dto.description.as_deref().map(str::trim))
            .bind(dto.category.map(|c| c.as_str()))
            .bind(dto.priority.map(|p| p.as_str()))
            .bind(dto.status.map(|s| s.as_str()))
            .bind(&dto.assigned_to)
            .fetch_optional(&self.pool)
            .await?;
        found(ticket, "Support ticket", id)
    }

    pub async fn delete_ticket(&self, user_id: Uuid, id: Uuid) -> Result<(), ServiceError> {
        self.owned_ticket(user_id, id).await?;
        sqlx::query("DELETE FROM support_tickets WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        tracing::info!("User {} deleted ticket {}", user_id, id);
        Ok(())
    }

    async fn owned_ticket(&self, user_id: Uuid, id: Uuid) -> Result<SupportTicket, ServiceError> {
        let sql = format!("SELECT {} FROM support_tickets WHERE id = $1", TICKET_COLUMNS);
        let ticket = sqlx::query_as::<_, SupportTicket>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let ticket = found(ticket, "Support ticket", id)?;
        if ticket.user_id != user_id {
            return Err(ServiceError::Forbidden("Tickets are only visible to their author".to_string()));
        }
        Ok(ticket)
    }

    // ---- FAQs ----

    pub async fn create_faq(&self, dto: CreateFaq) -> Result<Faq, ServiceError> {
        let sql = format!(
            "INSERT INTO faqs (question, answer, category, position, is_active) VALUES ($1, $2, $3, $4, $5) \
             RETURNING {}",
            FAQ_COLUMNS
        );
        let faq = sqlx::query_as::<_, Faq>(&sql)
            .bind(dto.question.trim())
            .bind(dto.answer.trim())
            .bind(dto.category.trim())
            .bind(dto.position)
            .bind(dto.is_active.unwrap_or(true))
            .fetch_one(&self.pool)
            .await?;
        tracing::info!("Created FAQ {} in {}", faq.id, faq.category);
        Ok(faq)
    }

    /// Active entries by position, newest first within a position
    pub async fn list_faqs(&self, query: FaqQuery) -> Result<Page<Faq>, ServiceError> {
        let paging = query.paging();
        let category = query.category.as_deref().map(str::trim).filter(|c| !c.is_empty());
        let pattern = query.search_pattern();

        let sql = format!(
            "SELECT {} FROM faqs WHERE {} ORDER BY position, created_at DESC LIMIT $3 OFFSET $4",
            FAQ_COLUMNS, FAQ_FILTER
        );
        let faqs = sqlx::query_as::<_, Faq>(&sql)
            .bind(category)
            .bind(&pattern)
            .bind(paging.limit())
            .bind(paging.offset())
            .fetch_all(&self.pool)
            .await?;

        let sql = format!("SELECT COUNT(*) FROM faqs WHERE {}", FAQ_FILTER);
        let total: i64 = sqlx::query_scalar(&sql)
            .bind(category)
            .bind(&pattern)
            .fetch_one(&self.pool)
            .await?;
        Ok(paging.into_page(faqs, total))
    }

    /// Reading an entry counts a view
    pub async fn get_faq(&self, id: Uuid) -> Result<Faq, ServiceError> {
        let sql = format!(
            "UPDATE faqs SET views = views + 1 WHERE id = $1 RETURNING {}",
            FAQ_COLUMNS
        );
        let faq = sqlx::query_as::<_, Faq>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        found(faq, "FAQ", id)
    }

    pub async fn update_faq(&self, id: Uuid, dto: UpdateFaq) -> Result<Faq, ServiceError> {
        let sql = format!(
            "UPDATE faqs SET question = COALESCE($2, question), answer = COALESCE($3, answer), \
             category = COALESCE($4, category), position = COALESCE($5, position), \
             is_active = COALESCE($6, is_active), updated_at = NOW() WHERE id = $1 RETURNING {}",
            FAQ_COLUMNS
        );
        let faq = sqlx::query_as::<_, Faq>(&sql)
            .bind(id)
            .bind(dto.question.as_deref().map(str::trim))
            .bind(dto.answer.as_deref().map(str::trim))
            .bind(dto.category.as_deref().map(str::trim))
            .bind(dto.position)
            .bind(dto.is_active)
            .fetch_optional(&self.pool)
            .await?;
        found(faq, "FAQ", id)
    }

    pub async fn delete_faq(&self, id: Uuid) -> Result<(), ServiceError> {
        let result = sqlx::query("DELETE FROM faqs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::not_found("FAQ", id));
        }
        tracing::info!("Deleted FAQ {}", id);
        Ok(())
    }

    /// Distinct categories of the active entries, alphabetical
    pub async fn faq_categories(&self) -> Result<Vec<String>, ServiceError> {
        let categories = sqlx::query_scalar("SELECT DISTINCT category FROM faqs WHERE is_active ORDER BY category")
            .fetch_all(&self.pool)
            .await?;
        Ok(categories)
    }
}
