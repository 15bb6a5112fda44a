use async_trait::async_trait;
use common::{Motorista, MotoristaPayload};

use crate::db::DbPool;
use crate::error::AppError;
use crate::resource::Resource;

const SELECT_MOTORISTA: &str = "SELECT id, nome, cnh, placa, ativo FROM motoristas";

#[async_trait]
impl Resource for Motorista {
    type Payload = MotoristaPayload;

    const COLLECTION: &'static str = "motoristas";

    async fn list(pool: &DbPool) -> Result<Vec<Self>, AppError> {
        let motoristas = sqlx::query_as(SELECT_MOTORISTA).fetch_all(pool).await?;
        Ok(motoristas)
    }

    async fn fetch(pool: &DbPool, id: i64) -> Result<Option<Self>, AppError> {
        let motorista = sqlx::query_as(&format!("{SELECT_MOTORISTA} WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(motorista)
    }

    async fn insert(pool: &DbPool, payload: MotoristaPayload) -> Result<Self, AppError> {
        let motorista: Motorista = sqlx::query_as(
            r#"
            INSERT INTO motoristas (nome, cnh, placa, ativo)
            VALUES ($1, $2, $3, $4)
            RETURNING id, nome, cnh, placa, ativo
            "#,
        )
        .bind(payload.nome.into_value())
        .bind(payload.cnh.into_value())
        .bind(payload.placa.into_value())
        .bind(payload.ativo.into_value().unwrap_or(true))
        .fetch_one(pool)
        .await?;

        tracing::info!("Registered driver {} ({})", motorista, motorista.id);
        Ok(motorista)
    }

    async fn update(pool: &DbPool, id: i64, payload: MotoristaPayload) -> Result<Self, AppError> {
        sqlx::query_as(
            r#"
            UPDATE motoristas
            SET nome = COALESCE($1, nome),
                cnh = COALESCE($2, cnh),
                placa = COALESCE($3, placa),
                ativo = COALESCE($4, ativo)
            WHERE id = $5
            RETURNING id, nome, cnh, placa, ativo
            "#,
        )
        .bind(payload.nome.into_value())
        .bind(payload.cnh.into_value())
        .bind(payload.placa.into_value())
        .bind(payload.ativo.into_value())
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound)
    }

    async fn delete(pool: &DbPool, id: i64) -> Result<bool, AppError> {
        // Rides keep existing; their motorista_id is cleared by the foreign key.
        let result = sqlx::query("DELETE FROM motoristas WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
