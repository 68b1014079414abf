use std::collections::HashMap;
use std::sync::Arc;

use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{found, NotificationService, ServiceError};
use crate::api::kanban::{
    CommentBody, CreateBoard, CreateCard, CreateColumn, MoveCard, UpdateBoard, UpdateCard, UpdateColumn,
};
use crate::database::models::{
    BoardDetail, BoardSummary, CardActivity, CardComment, CardDetail, ColumnSummary, ColumnWithCards, KanbanBoard,
    KanbanCard, KanbanColumn,
};
use crate::notifications::{recipients, NewNotification, NotificationDispatcher};
use crate::ordering::postgres::{KANBAN_CARDS, KANBAN_COLUMNS};
use crate::ordering::{PgOrderedStore, Reorderer};

const BOARD_COLUMNS: &str = "id, name, description, is_active, created_at, updated_at";
const COLUMN_COLUMNS: &str = "id, board_id, name, color, card_limit, position, created_at, updated_at";
const CARD_COLUMNS: &str = "id, column_id, title, description, position, priority, due_date, tags, \
     assigned_to_id, created_by_id, created_at, updated_at";

/// Most recent card activities returned with a card
const CARD_ACTIVITY_LIMIT: i64 = 20;

/// Boards, columns, cards and card comments.
///
/// Column and card positions go through the shared [`Reorderer`]; every
/// reorder runs in one transaction holding the scope's advisory lock.
pub struct KanbanService {
    pool: PgPool,
    reorderer: Reorderer,
    notifier: Arc<dyn NotificationDispatcher>,
}

impl KanbanService {
    pub fn new(pool: PgPool) -> Self {
        let notifier = Arc::new(NotificationService::new(pool.clone()));
        Self {
            pool,
            reorderer: Reorderer::from_config(),
            notifier,
        }
    }

    // ---- boards ----

    pub async fn create_board(&self, dto: CreateBoard) -> Result<KanbanBoard, ServiceError> {
        let sql = format!(
            "INSERT INTO kanban_boards (name, description) VALUES ($1, $2) RETURNING {}",
            BOARD_COLUMNS
        );
        let board = sqlx::query_as::<_, KanbanBoard>(&sql)
            .bind(dto.name.trim())
            .bind(&dto.description)
            .fetch_one(&self.pool)
            .await?;
        tracing::info!("Created board {} ({})", board.id, board.name);
        Ok(board)
    }

    /// Newest board first, each with its ordered columns and their card counts
    pub async fn list_boards(&self) -> Result<Vec<BoardSummary>, ServiceError> {
        let sql = format!("SELECT {} FROM kanban_boards ORDER BY created_at DESC", BOARD_COLUMNS);
        let boards = sqlx::query_as::<_, KanbanBoard>(&sql).fetch_all(&self.pool).await?;

        let columns = sqlx::query_as::<_, ColumnSummary>(
            "SELECT c.id, c.board_id, c.name, c.color, c.card_limit, c.position, c.created_at, c.updated_at, \
             (SELECT COUNT(*) FROM kanban_cards k WHERE k.column_id = c.id) AS card_count \
             FROM kanban_columns c ORDER BY c.board_id, c.position",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut by_board: HashMap<Uuid, Vec<ColumnSummary>> = HashMap::new();
        for column in columns {
            by_board.entry(column.column.board_id).or_default().push(column);
        }

        Ok(boards
            .into_iter()
            .map(|board| BoardSummary {
                columns: by_board.remove(&board.id).unwrap_or_default(),
                board,
            })
            .collect())
    }

    pub async fn get_board(&self, id: Uuid) -> Result<BoardDetail, ServiceError> {
        let sql = format!("SELECT {} FROM kanban_boards WHERE id = $1", BOARD_COLUMNS);
        let board = sqlx::query_as::<_, KanbanBoard>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let board = found(board, "Board", id)?;

        let sql = format!(
            "SELECT {} FROM kanban_columns WHERE board_id = $1 ORDER BY position",
            COLUMN_COLUMNS
        );
        let columns = sqlx::query_as::<_, KanbanColumn>(&sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {} FROM kanban_cards WHERE column_id IN (SELECT id FROM kanban_columns WHERE board_id = $1) \
             ORDER BY column_id, position",
            CARD_COLUMNS
        );
        let cards = sqlx::query_as::<_, KanbanCard>(&sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await?;

        let mut by_column: HashMap<Uuid, Vec<KanbanCard>> = HashMap::new();
        for card in cards {
            by_column.entry(card.column_id).or_default().push(card);
        }

        let columns = columns
            .into_iter()
            .map(|column| ColumnWithCards {
                cards: by_column.remove(&column.id).unwrap_or_default(),
                column,
            })
            .collect();

        Ok(BoardDetail { board, columns })
    }

    pub async fn update_board(&self, id: Uuid, dto: UpdateBoard) -> Result<KanbanBoard, ServiceError> {
        let sql = format!(
            "UPDATE kanban_boards SET name = COALESCE($2, name), description = COALESCE($3, description), \
             is_active = COALESCE($4, is_active), updated_at = NOW() WHERE id = $1 RETURNING {}",
            BOARD_COLUMNS
        );
        let board = sqlx::query_as::<_, KanbanBoard>(&sql)
            .bind(id)
            .bind(dto.name.as_deref().map(str::trim))
            .bind(&dto.description)
            .bind(dto.is_active)
            .fetch_optional(&self.pool)
            .await?;
        found(board, "Board", id)
    }

    /// Columns, cards, comments and activities go with the board
    pub async fn delete_board(&self, id: Uuid) -> Result<(), ServiceError> {
        let deleted: Option<Uuid> = sqlx::query_scalar("DELETE FROM kanban_boards WHERE id = $1 RETURNING id")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        found(deleted, "Board", id)?;
        tracing::info!("Deleted board {}", id);
        Ok(())
    }

    // ---- columns ----

    pub async fn create_column(&self, board_id: Uuid, dto: CreateColumn) -> Result<KanbanColumn, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let position = {
            let mut store = PgOrderedStore::new(KANBAN_COLUMNS, &mut tx);
            self.reorderer.insert_at(&mut store, &board_id, dto.position).await?
        };

        let sql = format!(
            "INSERT INTO kanban_columns (board_id, name, color, card_limit, position) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            COLUMN_COLUMNS
        );
        let column = sqlx::query_as::<_, KanbanColumn>(&sql)
            .bind(board_id)
            .bind(dto.name.trim())
            .bind(&dto.color)
            .bind(dto.limit)
            .bind(position)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!("Created column {} on board {} at position {}", column.id, board_id, position);
        Ok(column)
    }

    /// Updates name, color and limit; a `position` moves the column within its board
    pub async fn update_column(&self, id: Uuid, dto: UpdateColumn) -> Result<KanbanColumn, ServiceError> {
        let mut tx = self.pool.begin().await?;
        if let Some(position) = dto.position {
            let mut store = PgOrderedStore::new(KANBAN_COLUMNS, &mut tx);
            self.reorderer.move_within(&mut store, &id, position).await?;
        }

        let sql = format!(
            "UPDATE kanban_columns SET name = COALESCE($2, name), color = COALESCE($3, color), \
             card_limit = COALESCE($4, card_limit), updated_at = NOW() WHERE id = $1 RETURNING {}",
            COLUMN_COLUMNS
        );
        let column = sqlx::query_as::<_, KanbanColumn>(&sql)
            .bind(id)
            .bind(dto.name.as_deref().map(str::trim))
            .bind(&dto.color)
            .bind(dto.limit)
            .fetch_optional(&mut *tx)
            .await?;
        let column = found(column, "Column", id)?;
        tx.commit().await?;
        Ok(column)
    }

    pub async fn move_column(&self, id: Uuid, new_position: i32) -> Result<KanbanColumn, ServiceError> {
        let mut tx = self.pool.begin().await?;
        {
            let mut store = PgOrderedStore::new(KANBAN_COLUMNS, &mut tx);
            self.reorderer.move_within(&mut store, &id, new_position).await?;
        }
        let column = fetch_column(&mut tx, id).await?;
        tx.commit().await?;
        Ok(column)
    }

    /// Deletes the column with its cards and compacts the board's column positions
    pub async fn delete_column(&self, id: Uuid) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await?;
        let slot = {
            let mut store = PgOrderedStore::new(KANBAN_COLUMNS, &mut tx);
            self.reorderer.remove(&mut store, &id).await?
        };
        tx.commit().await?;
        tracing::info!("Deleted column {} from board {} (was at {})", id, slot.scope, slot.position);
        Ok(())
    }

    // ---- cards ----

    pub async fn create_card(&self, column_id: Uuid, dto: CreateCard, actor: Uuid) -> Result<KanbanCard, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let position = {
            let mut store = PgOrderedStore::new(KANBAN_CARDS, &mut tx);
            self.reorderer.insert_at(&mut store, &column_id, dto.position).await?
        };

        let sql = format!(
            "INSERT INTO kanban_cards (column_id, title, description, position, priority, due_date, tags, \
             assigned_to_id, created_by_id) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {}",
            CARD_COLUMNS
        );
        let card = sqlx::query_as::<_, KanbanCard>(&sql)
            .bind(column_id)
            .bind(dto.title.trim())
            .bind(&dto.description)
            .bind(position)
            .bind(dto.priority.as_str())
            .bind(dto.due_date)
            .bind(&dto.tags)
            .bind(dto.assigned_to_id)
            .bind(actor)
            .fetch_one(&mut *tx)
            .await?;

        log_activity(
            &mut tx,
            card.id,
            actor,
            "created",
            &format!("Card \"{}\" was created", card.title),
        )
        .await?;
        let board_id = board_of_column(&mut tx, column_id).await?;
        tx.commit().await?;

        if let Some(assignee) = card.assigned_to_id.filter(|assignee| *assignee != actor) {
            self.notify(NewNotification::task_assigned(assignee, &card.title, card.id, board_id))
                .await;
        }
        Ok(card)
    }

    /// The card with its comments and latest activities, newest first
    pub async fn get_card(&self, id: Uuid) -> Result<CardDetail, ServiceError> {
        let sql = format!("SELECT {} FROM kanban_cards WHERE id = $1", CARD_COLUMNS);
        let card = sqlx::query_as::<_, KanbanCard>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let card = found(card, "Card", id)?;

        let comments = sqlx::query_as::<_, CardComment>(
            "SELECT id, card_id, user_id, content, created_at, updated_at FROM kanban_card_comments \
             WHERE card_id = $1 ORDER BY created_at DESC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let activities = sqlx::query_as::<_, CardActivity>(
            "SELECT id, card_id, user_id, action, description, created_at FROM kanban_card_activities \
             WHERE card_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(id)
        .bind(CARD_ACTIVITY_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        Ok(CardDetail {
            card,
            comments,
            activities,
        })
    }

    pub async fn update_card(&self, id: Uuid, dto: UpdateCard, actor: Uuid) -> Result<KanbanCard, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let before = fetch_card(&mut tx, id).await?;

        if let Some(position) = dto.position {
            let mut store = PgOrderedStore::new(KANBAN_CARDS, &mut tx);
            self.reorderer.move_within(&mut store, &id, position).await?;
        }

        let sql = format!(
            "UPDATE kanban_cards SET title = COALESCE($2, title), description = COALESCE($3, description), \
             priority = COALESCE($4, priority), due_date = COALESCE($5, due_date), tags = COALESCE($6, tags), \
             assigned_to_id = COALESCE($7, assigned_to_id), updated_at = NOW() WHERE id = $1 RETURNING {}",
            CARD_COLUMNS
        );
        let card = sqlx::query_as::<_, KanbanCard>(&sql)
            .bind(id)
            .bind(dto.title.as_deref().map(str::trim))
            .bind(&dto.description)
            .bind(dto.priority.map(|p| p.as_str()))
            .bind(dto.due_date)
            .bind(&dto.tags)
            .bind(dto.assigned_to_id)
            .fetch_one(&mut *tx)
            .await?;

        let reassigned = dto.assigned_to_id.filter(|assignee| Some(*assignee) != before.assigned_to_id);
        if reassigned.is_some() {
            log_activity(&mut tx, id, actor, "assigned", "Card was assigned").await?;
        }
        let board_id = board_of_column(&mut tx, card.column_id).await?;
        tx.commit().await?;

        if let Some(assignee) = reassigned.filter(|assignee| *assignee != actor) {
            self.notify(NewNotification::task_assigned(assignee, &card.title, card.id, board_id))
                .await;
        }
        Ok(card)
    }

    /// Move a card within its column or into another column
    pub async fn move_card(&self, id: Uuid, dto: MoveCard, actor: Uuid) -> Result<KanbanCard, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let source: Option<(Uuid, String, i32)> = sqlx::query_as(
            "SELECT c.id, c.name, k.position FROM kanban_cards k JOIN kanban_columns c ON c.id = k.column_id \
             WHERE k.id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let (source_column, source_name, source_position) = found(source, "Card", id)?;

        let moved = {
            let mut store = PgOrderedStore::new(KANBAN_CARDS, &mut tx);
            self.reorderer
                .move_across(&mut store, &id, &dto.target_column_id, dto.new_position)
                .await?
        };

        if moved.scope != source_column || moved.position != source_position {
            let target_name: String = sqlx::query_scalar("SELECT name FROM kanban_columns WHERE id = $1")
                .bind(moved.scope)
                .fetch_one(&mut *tx)
                .await?;
            log_activity(
                &mut tx,
                id,
                actor,
                "moved",
                &format!("Card moved from \"{}\" to \"{}\"", source_name, target_name),
            )
            .await?;
        }

        let card = fetch_card(&mut tx, id).await?;
        tx.commit().await?;
        Ok(card)
    }

    pub async fn delete_card(&self, id: Uuid) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await?;
        {
            let mut store = PgOrderedStore::new(KANBAN_CARDS, &mut tx);
            self.reorderer.remove(&mut store, &id).await?;
        }
        tx.commit().await?;
        tracing::info!("Deleted card {}", id);
        Ok(())
    }

    // ---- comments ----

    /// Notifies the card's creator and assignee, except the commenter
    pub async fn create_comment(&self, card_id: Uuid, dto: CommentBody, actor: Uuid) -> Result<CardComment, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let card = fetch_card(&mut tx, card_id).await?;

        let comment = sqlx::query_as::<_, CardComment>(
            "INSERT INTO kanban_card_comments (card_id, user_id, content) VALUES ($1, $2, $3) \
             RETURNING id, card_id, user_id, content, created_at, updated_at",
        )
        .bind(card_id)
        .bind(actor)
        .bind(dto.content.trim())
        .fetch_one(&mut *tx)
        .await?;
        log_activity(&mut tx, card_id, actor, "commented", "Comment added").await?;

        let commenter: (String, String) = sqlx::query_as("SELECT first_name, last_name FROM users WHERE id = $1")
            .bind(actor)
            .fetch_one(&mut *tx)
            .await?;
        let board_id = board_of_column(&mut tx, card.column_id).await?;
        tx.commit().await?;

        let commenter = format!("{} {}", commenter.0, commenter.1);
        for user in recipients(actor, [Some(card.created_by_id), card.assigned_to_id]) {
            self.notify(NewNotification::task_comment(user, &card.title, card.id, &commenter, board_id))
                .await;
        }
        Ok(comment)
    }

    /// Only the author may edit a comment
    pub async fn update_comment(&self, id: Uuid, dto: CommentBody, actor: Uuid) -> Result<CardComment, ServiceError> {
        let comment = sqlx::query_as::<_, CardComment>(
            "UPDATE kanban_card_comments SET content = $3, updated_at = NOW() WHERE id = $1 AND user_id = $2 \
             RETURNING id, card_id, user_id, content, created_at, updated_at",
        )
        .bind(id)
        .bind(actor)
        .bind(dto.content.trim())
        .fetch_optional(&self.pool)
        .await?;
        found(comment, "Comment", id)
    }

    pub async fn delete_comment(&self, id: Uuid, actor: Uuid) -> Result<(), ServiceError> {
        let deleted: Option<Uuid> =
            sqlx::query_scalar("DELETE FROM kanban_card_comments WHERE id = $1 AND user_id = $2 RETURNING id")
                .bind(id)
                .bind(actor)
                .fetch_optional(&self.pool)
                .await?;
        found(deleted, "Comment", id)?;
        Ok(())
    }

    /// Notification failures are logged; the change they describe is already committed
    async fn notify(&self, notification: NewNotification) {
        let user = notification.user_id;
        if let Err(e) = self.notifier.dispatch(notification).await {
            tracing::warn!("Failed to notify user {}: {}", user, e);
        }
    }
}

async fn fetch_column(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<KanbanColumn, ServiceError> {
    let sql = format!("SELECT {} FROM kanban_columns WHERE id = $1", COLUMN_COLUMNS);
    let column = sqlx::query_as::<_, KanbanColumn>(&sql)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;
    found(column, "Column", id)
}

async fn fetch_card(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<KanbanCard, ServiceError> {
    let sql = format!("SELECT {} FROM kanban_cards WHERE id = $1", CARD_COLUMNS);
    let card = sqlx::query_as::<_, KanbanCard>(&sql)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;
    found(card, "Card", id)
}

async fn board_of_column(tx: &mut Transaction<'_, Postgres>, column_id: Uuid) -> Result<Uuid, ServiceError> {
    let board: Option<Uuid> = sqlx::query_scalar("SELECT board_id FROM kanban_columns WHERE id = $1")
        .bind(column_id)
        .fetch_optional(&mut **tx)
        .await?;
    found(board, "Column", column_id)
}

async fn log_activity(
    tx: &mut Transaction<'_, Postgres>,
    card_id: Uuid,
    user_id: Uuid,
    action: &str,
    description: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO kanban_card_activities (card_id, user_id, action, description) VALUES ($1, $2, $3, $4)")
        .bind(card_id)
        .bind(user_id)
        .bind(action)
        .bind(description)
        .execute(&mut **tx)
        .await?;
    Ok(())
}
