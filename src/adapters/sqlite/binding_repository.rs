//! SQLite implementation of the BindingRepository.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::SqlitePool;
use tracing::warn;
use uuid::Uuid;

use crate::adapters::sqlite::{parse_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ActionInstance, Binding, ReactionInstance};
use crate::domain::ports::BindingRepository;

#[derive(Clone)]
pub struct SqliteBindingRepository {
    pool: SqlitePool,
}

impl SqliteBindingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const SELECT_BINDINGS: &str = r#"
    SELECT b.id, b.name, b.is_active, b.user_id, b.created_at, b.updated_at,
           a.service AS action_service, a.type AS action_type,
           a.parameters AS action_parameters, a.current_state AS action_state,
           a.revision AS action_revision,
           r.service AS reaction_service, r.type AS reaction_type,
           r.parameters AS reaction_parameters
    FROM bindings b
    JOIN binding_actions a ON a.binding_id = b.id
    JOIN binding_reactions r ON r.binding_id = b.id
"#;

#[derive(Debug, sqlx::FromRow)]
struct BindingRow {
    id: String,
    name: String,
    is_active: i32,
    user_id: String,
    created_at: String,
    updated_at: String,
    action_service: String,
    action_type: String,
    action_parameters: String,
    action_state: Option<String>,
    action_revision: i64,
    reaction_service: String,
    reaction_type: String,
    reaction_parameters: String,
}

fn row_to_binding(row: BindingRow) -> DomainResult<Binding> {
    let current_state = row
        .action_state
        .map(|s| serde_json::from_str::<Value>(&s))
        .transpose()?;

    Ok(Binding {
        id: parse_uuid(&row.id)?,
        name: row.name,
        is_active: row.is_active != 0,
        user_id: parse_uuid(&row.user_id)?,
        action: ActionInstance {
            service: row.action_service,
            kind: row.action_type,
            parameters: serde_json::from_str(&row.action_parameters)?,
            current_state,
            revision: row.action_revision,
        },
        reaction: ReactionInstance {
            service: row.reaction_service,
            kind: row.reaction_type,
            parameters: serde_json::from_str(&row.reaction_parameters)?,
        },
        created_at: parse_datetime(&row.created_at)?,
        updated_at: parse_datetime(&row.updated_at)?,
    })
}

/// Fail with `BindingNotFound` when an UPDATE/DELETE touched no row.
fn ensure_found(rows_affected: u64, id: Uuid) -> DomainResult<()> {
    if rows_affected == 0 {
        Err(DomainError::BindingNotFound(id))
    } else {
        Ok(())
    }
}

#[async_trait]
impl BindingRepository for SqliteBindingRepository {
    async fn create(&self, binding: &Binding) -> DomainResult<()> {
        let id = binding.id.to_string();
        let action_state = binding
            .action
            .current_state
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"INSERT INTO bindings (id, name, is_active, user_id, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&id)
        .bind(&binding.name)
        .bind(i32::from(binding.is_active))
        .bind(binding.user_id.to_string())
        .bind(binding.created_at.to_rfc3339())
        .bind(binding.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"INSERT INTO binding_actions (binding_id, service, type, parameters, current_state, revision)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&id)
        .bind(&binding.action.service)
        .bind(&binding.action.kind)
        .bind(serde_json::to_string(&binding.action.parameters)?)
        .bind(action_state)
        .bind(binding.action.revision)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"INSERT INTO binding_reactions (binding_id, service, type, parameters)
               VALUES (?, ?, ?, ?)"#,
        )
        .bind(&id)
        .bind(&binding.reaction.service)
        .bind(&binding.reaction.kind)
        .bind(serde_json::to_string(&binding.reaction.parameters)?)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Binding>> {
        let query = format!("{SELECT_BINDINGS} WHERE b.id = ?");
        let row: Option<BindingRow> = sqlx::query_as(&query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_binding).transpose()
    }

    async fn list(&self, user_id: Option<Uuid>) -> DomainResult<Vec<Binding>> {
        let rows: Vec<BindingRow> = match user_id {
            Some(user_id) => {
                let query = format!("{SELECT_BINDINGS} WHERE b.user_id = ? ORDER BY b.created_at");
                sqlx::query_as(&query)
                    .bind(user_id.to_string())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let query = format!("{SELECT_BINDINGS} ORDER BY b.created_at");
                sqlx::query_as(&query).fetch_all(&self.pool).await?
            }
        };

        rows.into_iter().map(row_to_binding).collect()
    }

    async fn list_active(&self) -> DomainResult<Vec<Binding>> {
        let query = format!("{SELECT_BINDINGS} WHERE b.is_active = 1 ORDER BY b.created_at");
        let rows: Vec<BindingRow> = sqlx::query_as(&query).fetch_all(&self.pool).await?;

        // One corrupt row must not stall every other binding.
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let id = row.id.clone();
                row_to_binding(row)
                    .inspect_err(|e| {
                        warn!(binding_id = %id, error = %e, "Skipping undecodable binding");
                    })
                    .ok()
            })
            .collect())
    }

    async fn set_active(&self, id: Uuid, active: bool) -> DomainResult<()> {
        let result = sqlx::query("UPDATE bindings SET is_active = ?, updated_at = ? WHERE id = ?")
            .bind(i32::from(active))
            .bind(Utc::now().to_rfc3339())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        ensure_found(result.rows_affected(), id)
    }

    async fn rename(&self, id: Uuid, name: &str) -> DomainResult<()> {
        let result = sqlx::query("UPDATE bindings SET name = ?, updated_at = ? WHERE id = ?")
            .bind(name)
            .bind(Utc::now().to_rfc3339())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        ensure_found(result.rows_affected(), id)
    }

    async fn update_parameters(
        &self,
        id: Uuid,
        action_parameters: &Value,
        reaction_parameters: &Value,
    ) -> DomainResult<()> {
        let id_str = id.to_string();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("UPDATE bindings SET updated_at = ? WHERE id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(&id_str)
            .execute(&mut *tx)
            .await?;
        ensure_found(result.rows_affected(), id)?;

        sqlx::query(
            r#"UPDATE binding_actions
               SET parameters = ?, current_state = NULL, revision = revision + 1
               WHERE binding_id = ?"#,
        )
        .bind(serde_json::to_string(action_parameters)?)
        .bind(&id_str)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE binding_reactions SET parameters = ? WHERE binding_id = ?")
            .bind(serde_json::to_string(reaction_parameters)?)
            .bind(&id_str)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM bindings WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        ensure_found(result.rows_affected(), id)
    }

    async fn save_action_state(
        &self,
        binding_id: Uuid,
        expected_revision: i64,
        state: &Value,
    ) -> DomainResult<()> {
        let id = binding_id.to_string();
        let result = sqlx::query(
            "UPDATE binding_actions SET current_state = ? WHERE binding_id = ? AND revision = ?",
        )
        .bind(serde_json::to_string(state)?)
        .bind(&id)
        .bind(expected_revision)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() > 0 {
            return Ok(());
        }

        let exists: Option<(i64,)> =
            sqlx::query_as("SELECT revision FROM binding_actions WHERE binding_id = ?")
                .bind(&id)
                .fetch_optional(&self.pool)
                .await?;
        match exists {
            Some(_) => Err(DomainError::StaleActionState {
                binding_id,
                expected_revision,
            }),
            None => Err(DomainError::BindingNotFound(binding_id)),
        }
    }
}
