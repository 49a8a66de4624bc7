use inkwell_common::{
    model::{Id, InkwellSnowflakeGenerator, ModelValidationError, page::PageOutOfRangeError},
    snowflake::{ProcessId, SnowflakeTimestampError, WorkerId},
};
use sqlx::{PgPool, migrate::MigrateError};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error("Unique constraint {0} was violated")]
    UniqueViolation(String),
    #[error("Foreign key constraint {0} was violated")]
    ForeignKeyViolation(String),
    #[error(transparent)]
    PageOutOfRange(#[from] PageOutOfRangeError),
    #[error("Could not generate a snowflake: {0}")]
    Snowflake(#[from] SnowflakeTimestampError),
    #[error(transparent)]
    Migrate(#[from] MigrateError),
    #[error(transparent)]
    Sqlx(sqlx::Error),
}

impl From<sqlx::Error> for DbError {
    fn from(error: sqlx::Error) -> Self {
        if let Some(db_error) = error.as_database_error() {
            let constraint = db_error.constraint().unwrap_or_default().to_owned();
            if db_error.is_unique_violation() {
                return Self::UniqueViolation(constraint);
            }
            if db_error.is_foreign_key_violation() {
                return Self::ForeignKeyViolation(constraint);
            }
        }

        Self::Sqlx(error)
    }
}

pub struct DbClient {
    pub(crate) pool: PgPool,
    snowflake_generator: Mutex<InkwellSnowflakeGenerator>,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool, worker_id: WorkerId, process_id: ProcessId) -> Self {
        let snowflake_generator = Mutex::new(InkwellSnowflakeGenerator::new(worker_id, process_id));

        Self {
            pool,
            snowflake_generator,
        }
    }

    /// Applies the embedded migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub(crate) fn next_id<Marker>(&self) -> Result<Id<Marker>> {
        let snowflake = self
            .snowflake_generator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generate()?;

        Ok(snowflake.into())
    }
}
