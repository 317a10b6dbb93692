use sqlx::PgPool;

/// Runs store queries against a connection pool.
///
/// Each query is a plain struct; `DatabaseProcessor` implements
/// `kanau::processor::Processor` for every one of them.
#[derive(Debug, Clone)]
pub struct DatabaseProcessor {
    pub pool: PgPool,
}
