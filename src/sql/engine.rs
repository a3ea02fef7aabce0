use thiserror::Error;

/// Why a query could not produce rows.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum QueryError {
    /// Reference to a column or table the dataset does not have.
    #[error("schema error: {0}")]
    Schema(String),
    /// Any other failure to compile the statement.
    #[error("syntax error: {0}")]
    Syntax(String),
    /// Failure while running a compiled statement, or a rejected statement.
    #[error("runtime error: {0}")]
    Runtime(String),
}

/// Result rows as stringified tuples in canonical (sorted) order.
///
/// Two result sets are equal when they hold the same rows with the same
/// multiplicities, whatever order the engine produced them in.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResultRows(Vec<Vec<String>>);

impl ResultRows {
    pub fn new(mut rows: Vec<Vec<String>>) -> Self {
        rows.sort();
        Self(rows)
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Vec<String>> for ResultRows {
    fn from_iter<I: IntoIterator<Item = Vec<String>>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Runs one read-only query against a fixed snapshot.
pub trait QueryEngine {
    fn execute(&self, sql: &str) -> Result<ResultRows, QueryError>;
}

impl<E: QueryEngine + ?Sized> QueryEngine for &E {
    fn execute(&self, sql: &str) -> Result<ResultRows, QueryError> {
        (**self).execute(sql)
    }
}
