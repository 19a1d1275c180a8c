use sqlx::PgPool;

/// Executes entity queries against the connection pool.
///
/// Each query is a plain struct with a `kanau::processor::Processor` impl on
/// this type, see [`crate::entities`].
#[derive(Debug, Clone)]
pub struct DatabaseProcessor {
    pub pool: PgPool,
}
