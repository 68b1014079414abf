//! Postgres ordered store running inside a caller-owned transaction.

use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use super::{OrderedStore, OrderingError, PositionRange, Slot};

/// Describes one positioned table: the rows, the column holding their scope
/// and the table the scope id points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderedTable {
    pub kind: &'static str,
    pub table: &'static str,
    pub scope_column: &'static str,
    pub scope_table: &'static str,
}

pub const KANBAN_COLUMNS: OrderedTable = OrderedTable {
    kind: "Column",
    table: "kanban_columns",
    scope_column: "board_id",
    scope_table: "kanban_boards",
};

pub const KANBAN_CARDS: OrderedTable = OrderedTable {
    kind: "Card",
    table: "kanban_cards",
    scope_column: "column_id",
    scope_table: "kanban_columns",
};

pub const SALES_STAGES: OrderedTable = OrderedTable {
    kind: "Stage",
    table: "sales_stages",
    scope_column: "pipeline_id",
    scope_table: "sales_pipelines",
};

pub const SALES_OPPORTUNITIES: OrderedTable = OrderedTable {
    kind: "Opportunity",
    table: "sales_opportunities",
    scope_column: "stage_id",
    scope_table: "sales_stages",
};

impl OrderedTable {
    /// Advisory lock key text for one scope of this table
    pub fn lock_key(&self, scope: &impl std::fmt::Display) -> String {
        format!("{}:{}", self.table, scope)
    }
}

/// Take transaction-scoped advisory locks for the given keys in sorted order,
/// so two writers touching the same pair of scopes cannot deadlock.
pub async fn lock_keys(
    tx: &mut Transaction<'_, Postgres>,
    mut keys: Vec<String>,
) -> Result<(), sqlx::Error> {
    keys.sort();
    keys.dedup();
    for key in keys {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1)::bigint)")
            .bind(&key)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

pub struct PgOrderedStore<'a, 'c> {
    table: OrderedTable,
    tx: &'a mut Transaction<'c, Postgres>,
}

impl<'a, 'c> PgOrderedStore<'a, 'c> {
    pub fn new(table: OrderedTable, tx: &'a mut Transaction<'c, Postgres>) -> Self {
        Self { table, tx }
    }
}

#[async_trait]
impl<'a, 'c> OrderedStore for PgOrderedStore<'a, 'c> {
    type Id = Uuid;
    type Scope = Uuid;

    fn kind(&self) -> &'static str {
        self.table.kind
    }

    async fn slot_of(&mut self, id: &Uuid) -> Result<Option<Slot<Uuid>>, OrderingError> {
        let sql = format!(
            "SELECT {scope}, position FROM {table} WHERE id = $1",
            scope = self.table.scope_column,
            table = self.table.table
        );
        let row: Option<(Uuid, i32)> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&mut **self.tx)
            .await?;
        Ok(row.map(|(scope, position)| Slot::new(scope, position)))
    }

    async fn scope_exists(&mut self, scope: &Uuid) -> Result<bool, OrderingError> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)",
            self.table.scope_table
        );
        let (exists,): (bool,) = sqlx::query_as(&sql)
            .bind(scope)
            .fetch_one(&mut **self.tx)
            .await?;
        Ok(exists)
    }

    async fn len(&mut self, scope: &Uuid) -> Result<i32, OrderingError> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {} = $1",
            self.table.table, self.table.scope_column
        );
        let (count,): (i64,) = sqlx::query_as(&sql)
            .bind(scope)
            .fetch_one(&mut **self.tx)
            .await?;
        Ok(i32::try_from(count).unwrap_or(i32::MAX))
    }

    async fn shift(&mut self, scope: &Uuid, range: PositionRange, delta: i32) -> Result<u64, OrderingError> {
        let sql = format!(
            "UPDATE {table} SET position = position + $1, updated_at = NOW() \
             WHERE {scope} = $2 AND position >= $3 AND ($4::int IS NULL OR position <= $4)",
            table = self.table.table,
            scope = self.table.scope_column
        );
        let result = sqlx::query(&sql)
            .bind(delta)
            .bind(scope)
            .bind(range.start)
            .bind(range.end)
            .execute(&mut **self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn place(&mut self, id: &Uuid, slot: &Slot<Uuid>) -> Result<(), OrderingError> {
        let sql = format!(
            "UPDATE {table} SET {scope} = $2, position = $3, updated_at = NOW() WHERE id = $1",
            table = self.table.table,
            scope = self.table.scope_column
        );
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(slot.scope)
            .bind(slot.position)
            .execute(&mut **self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(OrderingError::NotFound(format!("{} {}", self.table.kind, id)));
        }
        Ok(())
    }

    async fn delete(&mut self, id: &Uuid) -> Result<(), OrderingError> {
        let sql = format!("DELETE FROM {} WHERE id = $1", self.table.table);
        let result = sqlx::query(&sql).bind(id).execute(&mut **self.tx).await?;
        if result.rows_affected() == 0 {
            return Err(OrderingError::NotFound(format!("{} {}", self.table.kind, id)));
        }
        Ok(())
    }

    async fn lock_scopes(&mut self, scopes: &[Uuid]) -> Result<(), OrderingError> {
        let keys = scopes.iter().map(|scope| self.table.lock_key(scope)).collect();
        lock_keys(&mut *self.tx, keys).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_keys_are_namespaced_by_table() {
        let scope = Uuid::nil();
        assert_eq!(
            KANBAN_CARDS.lock_key(&scope),
            "kanban_cards:00000000-0000-0000-0000-000000000000"
        );
        assert_ne!(KANBAN_CARDS.lock_key(&scope), KANBAN_COLUMNS.lock_key(&scope));
    }

    #[test]
    fn every_table_points_at_its_parent() {
        assert_eq!(KANBAN_CARDS.scope_table, KANBAN_COLUMNS.table);
        assert_eq!(SALES_OPPORTUNITIES.scope_table, SALES_STAGES.table);
    }
}
