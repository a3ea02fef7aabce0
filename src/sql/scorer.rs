use log::{debug, warn};
use serde::Serialize;
use std::{collections::HashMap, fmt};

use super::{
    engine::{QueryEngine, QueryError},
    normalize::normalize_sql,
};
use crate::records::{scalar_key, Record};

/// Terminal state of one predicted query.
///
/// `Empty` is decided before execution; every other state follows running
/// the prediction against the snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlOutcome {
    Empty,
    ExecMatch,
    SchemaError,
    SyntaxError,
    RuntimeError,
    SemanticError,
}

impl From<&QueryError> for SqlOutcome {
    fn from(e: &QueryError) -> Self {
        match e {
            QueryError::Schema(_) => SqlOutcome::SchemaError,
            QueryError::Syntax(_) => SqlOutcome::SyntaxError,
            QueryError::Runtime(_) => SqlOutcome::RuntimeError,
        }
    }
}

impl fmt::Display for SqlOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SqlOutcome::Empty => "empty",
            SqlOutcome::ExecMatch => "exec_match",
            SqlOutcome::SchemaError => "schema_error",
            SqlOutcome::SyntaxError => "syntax_error",
            SqlOutcome::RuntimeError => "runtime_error",
            SqlOutcome::SemanticError => "semantic_error",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QuestionVerdict {
    pub id: String,
    pub exact_match: bool,
    pub outcome: SqlOutcome,
}

/// Per-model counters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SqlSummary {
    pub total: usize,
    pub exact: usize,
    pub exec_match: usize,
    pub empty: usize,
    pub schema: usize,
    pub syntax: usize,
    pub runtime: usize,
    pub semantic: usize,
}

impl SqlSummary {
    pub fn record(&mut self, v: &QuestionVerdict) {
        self.total += 1;
        if v.exact_match {
            self.exact += 1;
        }
        match v.outcome {
            SqlOutcome::Empty => self.empty += 1,
            SqlOutcome::ExecMatch => self.exec_match += 1,
            SqlOutcome::SchemaError => self.schema += 1,
            SqlOutcome::SyntaxError => self.syntax += 1,
            SqlOutcome::RuntimeError => self.runtime += 1,
            SqlOutcome::SemanticError => self.semantic += 1,
        }
    }
}

/// Gold SQL by question id. Questions without a `sql` string are dropped.
#[derive(Clone, Debug, Default)]
pub struct GoldQuestions {
    by_id: HashMap<String, String>,
}

impl GoldQuestions {
    pub fn from_records(records: &[Record]) -> Self {
        let mut by_id = HashMap::new();
        for rec in records {
            let (Some(id), Some(sql)) = (
                rec.get("id").and_then(scalar_key),
                rec.get("sql").and_then(|v| v.as_str()),
            ) else {
                continue;
            };
            if sql.trim().is_empty() {
                continue;
            }
            by_id.insert(id, sql.to_string());
        }
        Self { by_id }
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.by_id.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl<I: Into<String>, S: Into<String>> FromIterator<(I, S)> for GoldQuestions {
    fn from_iter<T: IntoIterator<Item = (I, S)>>(iter: T) -> Self {
        Self {
            by_id: iter.into_iter().map(|(i, s)| (i.into(), s.into())).collect(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct SqlEvaluation {
    pub summary: SqlSummary,
    pub verdicts: Vec<QuestionVerdict>,
}

/// Grades predicted queries against gold queries on one engine.
pub struct SqlScorer<'a, E> {
    engine: E,
    gold: &'a GoldQuestions,
}

fn is_blank(sql: &str) -> bool {
    sql.trim().trim_end_matches(';').trim().is_empty()
}

impl<'a, E: QueryEngine> SqlScorer<'a, E> {
    pub fn new(engine: E, gold: &'a GoldQuestions) -> Self {
        Self { engine, gold }
    }

    /// Exact-match flag and outcome for one pair.
    pub fn judge(&self, gold_sql: &str, predicted: &str) -> (bool, SqlOutcome) {
        let exact = normalize_sql(gold_sql) == normalize_sql(predicted);
        if is_blank(predicted) {
            return (exact, SqlOutcome::Empty);
        }

        let gold_rows = self.engine.execute(gold_sql);
        if let Err(e) = &gold_rows {
            warn!("gold query failed ({e}): {gold_sql}");
        }

        let outcome = match self.engine.execute(predicted) {
            Err(e) => {
                debug!("predicted query failed ({e}): {predicted}");
                SqlOutcome::from(&e)
            }
            Ok(rows) if gold_rows.as_ref().is_ok_and(|g| *g == rows) => SqlOutcome::ExecMatch,
            Ok(_) => SqlOutcome::SemanticError,
        };
        (exact, outcome)
    }

    /// Verdict for one prediction row, or `None` when its id has no gold query.
    pub fn verdict(&self, pred: &Record) -> Option<QuestionVerdict> {
        let id = pred.get("id").and_then(scalar_key)?;
        let gold_sql = self.gold.get(&id)?;
        let predicted = pred.get("sql").and_then(|v| v.as_str()).unwrap_or("");
        let (exact_match, outcome) = self.judge(gold_sql, predicted);
        Some(QuestionVerdict {
            id,
            exact_match,
            outcome,
        })
    }

    pub fn evaluate(&self, predictions: &[Record]) -> SqlEvaluation {
        self.evaluate_with_progress(predictions, || {})
    }

    /// [`Self::evaluate`], calling `tick` after every prediction row.
    pub fn evaluate_with_progress<F: FnMut()>(
        &self,
        predictions: &[Record],
        mut tick: F,
    ) -> SqlEvaluation {
        let mut eval = SqlEvaluation::default();
        for pred in predictions {
            match self.verdict(pred) {
                Some(v) => {
                    eval.summary.record(&v);
                    eval.verdicts.push(v);
                }
                None => warn!("prediction without a known question id: {:?}", pred.get("id")),
            }
            tick();
        }
        eval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::ResultRows;
    use proptest::prelude::*;
    use serde_json::{json, Value};

    /// Answers from a fixed table of canned results.
    #[derive(Default)]
    struct FakeEngine {
        answers: HashMap<String, Result<ResultRows, QueryError>>,
    }

    impl FakeEngine {
        fn with(mut self, sql: &str, answer: Result<Vec<Vec<&str>>, QueryError>) -> Self {
            let answer = answer.map(|rows| {
                rows.into_iter()
                    .map(|r| r.into_iter().map(String::from).collect::<Vec<_>>())
                    .collect::<ResultRows>()
            });
            self.answers.insert(sql.to_string(), answer);
            self
        }
    }

    impl QueryEngine for FakeEngine {
        fn execute(&self, sql: &str) -> Result<ResultRows, QueryError> {
            self.answers
                .get(sql)
                .cloned()
                .unwrap_or_else(|| panic!("unexpected query {sql:?}"))
        }
    }

    fn preds(v: Value) -> Vec<Record> {
        v.as_array()
            .unwrap()
            .iter()
            .map(|r| r.as_object().cloned().unwrap())
            .collect()
    }

    fn to_refs(rs: &[Vec<String>]) -> Vec<Vec<&str>> {
        rs.iter().map(|r| r.iter().map(String::as_str).collect()).collect()
    }

    const GOLD: &str = "SELECT name FROM songs WHERE popularity > 80;";

    fn gold() -> GoldQuestions {
        [("1", GOLD)].into_iter().collect()
    }

    #[test]
    fn exact_and_exec_match() {
        let engine = FakeEngine::default()
            .with(GOLD, Ok(vec![vec!["a"], vec!["b"]]))
            .with("select name from songs where popularity>80", Ok(vec![vec!["b"], vec!["a"]]));
        let gold = gold();
        let scorer = SqlScorer::new(&engine, &gold);
        let (exact, outcome) = scorer.judge(GOLD, "select name from songs where popularity>80");
        assert!(exact);
        assert_eq!(outcome, SqlOutcome::ExecMatch);
    }

    #[test]
    fn exec_match_without_exact_match() {
        let pred = "SELECT name FROM songs WHERE popularity >= 80;";
        let engine = FakeEngine::default()
            .with(GOLD, Ok(vec![vec!["a"]]))
            .with(pred, Ok(vec![vec!["a"]]));
        let gold = gold();
        let (exact, outcome) = SqlScorer::new(&engine, &gold).judge(GOLD, pred);
        assert!(!exact);
        assert_eq!(outcome, SqlOutcome::ExecMatch);
    }

    #[test]
    fn errors_are_classified() {
        let engine = FakeEngine::default()
            .with(GOLD, Ok(vec![vec!["a"]]))
            .with("s1", Err(QueryError::Schema("no such column: release_year".into())))
            .with("s2", Err(QueryError::Syntax("near \"FORM\"".into())))
            .with("s3", Err(QueryError::Runtime("boom".into())))
            .with("s4", Ok(vec![vec!["a"], vec!["a"]]));
        let gold = gold();
        let scorer = SqlScorer::new(&engine, &gold);
        assert_eq!(scorer.judge(GOLD, "s1").1, SqlOutcome::SchemaError);
        assert_eq!(scorer.judge(GOLD, "s2").1, SqlOutcome::SyntaxError);
        assert_eq!(scorer.judge(GOLD, "s3").1, SqlOutcome::RuntimeError);
        // duplicates matter
        assert_eq!(scorer.judge(GOLD, "s4").1, SqlOutcome::SemanticError);
    }

    #[test]
    fn empty_prediction_never_reaches_the_engine() {
        // the fake panics on any query it does not know
        let engine = FakeEngine::default();
        let gold = gold();
        let scorer = SqlScorer::new(&engine, &gold);
        assert_eq!(scorer.judge(GOLD, ""), (false, SqlOutcome::Empty));
        assert_eq!(scorer.judge(GOLD, "  ; "), (false, SqlOutcome::Empty));
    }

    #[test]
    fn failing_gold_makes_a_successful_prediction_semantic() {
        let engine = FakeEngine::default()
            .with(GOLD, Err(QueryError::Syntax("bad gold".into())))
            .with("p", Ok(vec![]));
        let gold = gold();
        assert_eq!(
            SqlScorer::new(&engine, &gold).judge(GOLD, "p").1,
            SqlOutcome::SemanticError
        );
    }

    #[test]
    fn evaluate_counts_every_gold_backed_prediction() {
        let engine = FakeEngine::default()
            .with(GOLD, Ok(vec![vec!["a"]]))
            .with("SELECT 'a'", Ok(vec![vec!["a"]]))
            .with("SELECT x", Err(QueryError::Schema("no such column: x".into())));
        let gold: GoldQuestions = [("1", GOLD), ("2", GOLD)].into_iter().collect();
        let predictions = preds(json!([
            {"id": 1, "sql": "SELECT 'a'"},
            {"id": "2", "sql": "SELECT x"},
            {"id": 3, "sql": "SELECT 'a'"},
            {"id": 1},
            {"sql": "SELECT 'a'"},
            {"id": 2, "sql": GOLD},
        ]));
        let eval = SqlScorer::new(&engine, &gold).evaluate(&predictions);
        assert_eq!(
            eval.summary,
            SqlSummary {
                total: 4,
                exact: 1,
                exec_match: 2,
                empty: 1,
                schema: 1,
                syntax: 0,
                runtime: 0,
                semantic: 0,
            }
        );
        assert_eq!(eval.verdicts.len(), 4);
        assert_eq!(eval.verdicts[2].outcome, SqlOutcome::Empty);
    }

    #[test]
    fn progress_ticks_once_per_row() {
        let engine = FakeEngine::default()
            .with(GOLD, Ok(vec![vec!["a"]]))
            .with("SELECT 'a'", Ok(vec![vec!["a"]]));
        let gold = gold();
        let predictions = preds(json!([
            {"id": 1, "sql": "SELECT 'a'"},
            {"id": 9, "sql": "SELECT 'a'"},
            {"id": 1, "sql": ""},
        ]));
        let mut ticks = 0;
        let eval = SqlScorer::new(&engine, &gold)
            .evaluate_with_progress(&predictions, || ticks += 1);
        assert_eq!(ticks, 3);
        assert_eq!(eval.summary.total, 2);
        assert_eq!(eval.summary.exec_match, 1);
    }

    #[test]
    fn gold_questions_without_sql_are_dropped() {
        let gold = GoldQuestions::from_records(&preds(json!([
            {"id": 1, "question": "q1", "sql": "SELECT 1"},
            {"id": 2, "question": "q2"},
            {"id": 3, "sql": "   "},
            {"question": "q4", "sql": "SELECT 4"},
        ])));
        assert_eq!(gold.len(), 1);
        assert_eq!(gold.get("1"), Some("SELECT 1"));
    }

    proptest! {
        #[test]
        fn exec_match_ignores_row_order(
            rows in prop::collection::vec(prop::collection::vec("[a-z0-9]{0,4}", 2), 0..12),
            rot in 0usize..12,
        ) {
            let mut permuted = rows.clone();
            permuted.reverse();
            if !permuted.is_empty() {
                let n = permuted.len();
                permuted.rotate_left(rot % n);
            }
            let engine = FakeEngine::default()
                .with("gold", Ok(to_refs(&rows)))
                .with("pred", Ok(to_refs(&permuted)));
            let gold: GoldQuestions = [("1", "gold")].into_iter().collect();
            let scorer = SqlScorer::new(&engine, &gold);
            prop_assert_eq!(scorer.judge("gold", "pred").1, SqlOutcome::ExecMatch);
            prop_assert_eq!(scorer.judge("pred", "gold").1, SqlOutcome::ExecMatch);
        }
    }
}
