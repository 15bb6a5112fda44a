use async_trait::async_trait;
use chrono::Utc;
use common::{
    utils::{add_error, Price},
    Corrida, CorridaPayload,
};
use validator::ValidationErrors;

use crate::db::DbPool;
use crate::error::{is_foreign_key_violation, AppError};
use crate::resource::Resource;

pub const DEFAULT_STATUS: &str = "Pendente";

// Rider and driver are projected to their display names here; writes take ids.
const SELECT_CORRIDA: &str = r#"
    SELECT c.id,
           u.nome AS usuario,
           m.nome AS motorista,
           c.origem,
           c.destino,
           c.distancia,
           c.preco,
           c.status,
           c.data_pedido
    FROM corridas c
    JOIN usuarios u ON u.id = c.usuario_id
    LEFT JOIN motoristas m ON m.id = c.motorista_id"#;

async fn exists(pool: &DbPool, table: &str, id: i64) -> Result<bool, sqlx::Error> {
    let row: Option<(i64,)> = sqlx::query_as(&format!("SELECT id FROM {table} WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

/// Rider and driver ids named by a ride body.
#[derive(Clone, Copy, Debug)]
struct References {
    usuario: Option<i64>,
    motorista: Option<i64>,
}

impl References {
    fn of(payload: &CorridaPayload) -> Self {
        Self {
            usuario: payload.usuario.value().copied(),
            motorista: payload.motorista.value().copied(),
        }
    }

    /// Rejects ids that do not name a stored rider or driver, as field errors.
    async fn check(self, pool: &DbPool) -> Result<(), AppError> {
        let mut errors = ValidationErrors::new();

        if let Some(usuario_id) = self.usuario {
            if !exists(pool, "usuarios", usuario_id).await? {
                add_error(
                    &mut errors,
                    "usuario",
                    "does_not_exist",
                    format!("Invalid pk \"{usuario_id}\" - object does not exist."),
                );
            }
        }

        if let Some(motorista_id) = self.motorista {
            if !exists(pool, "motoristas", motorista_id).await? {
                add_error(
                    &mut errors,
                    "motorista",
                    "does_not_exist",
                    format!("Invalid pk \"{motorista_id}\" - object does not exist."),
                );
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.into())
        }
    }

    /// Maps a failed write. A referenced row deleted after [`Self::check`]
    /// surfaces as a foreign-key violation and is reported like a bad id.
    async fn write_error(self, pool: &DbPool, e: sqlx::Error) -> AppError {
        if !is_foreign_key_violation(&e) {
            return e.into();
        }
        match self.check(pool).await {
            Err(err) => err,
            Ok(()) => e.into(),
        }
    }
}

#[async_trait]
impl Resource for Corrida {
    type Payload = CorridaPayload;

    const COLLECTION: &'static str = "corridas";

    async fn list(pool: &DbPool) -> Result<Vec<Self>, AppError> {
        let corridas = sqlx::query_as(SELECT_CORRIDA).fetch_all(pool).await?;
        Ok(corridas)
    }

    async fn fetch(pool: &DbPool, id: i64) -> Result<Option<Self>, AppError> {
        let corrida = sqlx::query_as(&format!("{SELECT_CORRIDA} WHERE c.id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(corrida)
    }

    async fn insert(pool: &DbPool, payload: CorridaPayload) -> Result<Self, AppError> {
        let references = References::of(&payload);
        references.check(pool).await?;

        let inserted: Result<(i64,), sqlx::Error> = sqlx::query_as(
            r#"
            INSERT INTO corridas
                (usuario_id, motorista_id, origem, destino, distancia, preco, status, data_pedido)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(references.usuario)
        .bind(references.motorista)
        .bind(payload.origem.into_value())
        .bind(payload.destino.into_value())
        .bind(payload.distancia.into_value().unwrap_or(0.0))
        .bind(payload.preco.value().map(Price::to_storage))
        .bind(
            payload
                .status
                .into_value()
                .unwrap_or_else(|| DEFAULT_STATUS.to_string()),
        )
        .bind(Utc::now())
        .fetch_one(pool)
        .await;

        let id = match inserted {
            Ok((id,)) => id,
            Err(e) => return Err(references.write_error(pool, e).await),
        };

        let corrida = Self::fetch(pool, id).await?.ok_or_else(|| {
            AppError::InternalServerError(format!("Ride {id} vanished after insert"))
        })?;
        tracing::info!("Booked ride {} ({})", corrida, corrida.id);
        Ok(corrida)
    }

    async fn update(pool: &DbPool, id: i64, payload: CorridaPayload) -> Result<Self, AppError> {
        let references = References::of(&payload);
        references.check(pool).await?;

        // An explicit null clears the driver; an absent key leaves it alone.
        let motorista_given = !payload.motorista.is_absent();
        let updated = sqlx::query(
            r#"
            UPDATE corridas
            SET usuario_id = COALESCE($1, usuario_id),
                motorista_id = CASE WHEN $2 THEN $3 ELSE motorista_id END,
                origem = COALESCE($4, origem),
                destino = COALESCE($5, destino),
                distancia = COALESCE($6, distancia),
                preco = COALESCE($7, preco),
                status = COALESCE($8, status)
            WHERE id = $9
            "#,
        )
        .bind(references.usuario)
        .bind(motorista_given)
        .bind(references.motorista)
        .bind(payload.origem.into_value())
        .bind(payload.destino.into_value())
        .bind(payload.distancia.into_value())
        .bind(payload.preco.value().map(Price::to_storage))
        .bind(payload.status.into_value())
        .bind(id)
        .execute(pool)
        .await;

        let result = match updated {
            Ok(result) => result,
            Err(e) => return Err(references.write_error(pool, e).await),
        };

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }

        Self::fetch(pool, id).await?.ok_or(AppError::NotFound)
    }

    async fn delete(pool: &DbPool, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM corridas WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
