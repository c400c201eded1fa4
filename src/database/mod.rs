pub mod connection;
pub mod migrations;
pub mod models;
pub mod repositories;

pub use connection::Database;
pub use repositories::*;

/// 数据库错误类型
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Query execution error: {0}")]
    Query(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Record not found")]
    NotFound,

    #[error("Duplicate record")]
    Duplicate,

    #[error("Database error: {0}")]
    Other(String),
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound,
            sqlx::Error::Database(db_err) => {
                // 唯一约束冲突单独归类
                if db_err.message().contains("UNIQUE") || db_err.message().contains("duplicate") {
                    DatabaseError::Duplicate
                } else {
                    DatabaseError::Query(db_err.message().to_string())
                }
            }
            _ => DatabaseError::Other(err.to_string()),
        }
    }
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;
