//! Text-to-SQL grading.

mod engine;
mod normalize;
mod scorer;
mod sqlite;

pub use engine::{QueryEngine, QueryError, ResultRows};
pub use normalize::normalize_sql;
pub use scorer::{GoldQuestions, QuestionVerdict, SqlEvaluation, SqlOutcome, SqlScorer, SqlSummary};
pub use sqlite::SqliteSnapshot;
