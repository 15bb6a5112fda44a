use async_trait::async_trait;
use chrono::Utc;
use common::{Usuario, UsuarioPayload};

use crate::db::DbPool;
use crate::error::AppError;
use crate::resource::Resource;

const SELECT_USUARIO: &str = "SELECT id, nome, telefone, data_cadastro FROM usuarios";

#[async_trait]
impl Resource for Usuario {
    type Payload = UsuarioPayload;

    const COLLECTION: &'static str = "usuarios";

    async fn list(pool: &DbPool) -> Result<Vec<Self>, AppError> {
        let usuarios = sqlx::query_as(SELECT_USUARIO).fetch_all(pool).await?;
        Ok(usuarios)
    }

    async fn fetch(pool: &DbPool, id: i64) -> Result<Option<Self>, AppError> {
        let usuario = sqlx::query_as(&format!("{SELECT_USUARIO} WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(usuario)
    }

    async fn insert(pool: &DbPool, payload: UsuarioPayload) -> Result<Self, AppError> {
        let usuario: Usuario = sqlx::query_as(
            r#"
            INSERT INTO usuarios (nome, telefone, data_cadastro)
            VALUES ($1, $2, $3)
            RETURNING id, nome, telefone, data_cadastro
            "#,
        )
        .bind(payload.nome.into_value())
        .bind(payload.telefone.into_value())
        .bind(Utc::now())
        .fetch_one(pool)
        .await?;

        tracing::info!("Registered rider {} ({})", usuario, usuario.id);
        Ok(usuario)
    }

    async fn update(pool: &DbPool, id: i64, payload: UsuarioPayload) -> Result<Self, AppError> {
        // data_cadastro is never written after insert.
        sqlx::query_as(
            r#"
            UPDATE usuarios
            SET nome = COALESCE($1, nome), telefone = COALESCE($2, telefone)
            WHERE id = $3
            RETURNING id, nome, telefone, data_cadastro
            "#,
        )
        .bind(payload.nome.into_value())
        .bind(payload.telefone.into_value())
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound)
    }

    async fn delete(pool: &DbPool, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM usuarios WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
