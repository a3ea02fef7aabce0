//! Console tables and CSV output.

use itertools::Itertools;
use std::{io, path::Path};

use crate::{popularity::ModelMetrics, sql::SqlSummary};

/// `n/a` for undefined metrics.
pub fn fmt_metric(v: Option<f64>) -> String {
    v.map_or_else(|| "n/a".to_string(), |x| format!("{x:.4}"))
}

fn csv_metric(v: Option<f64>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}

pub fn metrics_table(rows: &[ModelMetrics]) -> String {
    let mut out = format!(
        "{:<10} | {:<6} | {:<6} | {:<6} | {:<6} | {}\n",
        "Model", "N", "ACC", "F1", "MAE", "HALL"
    );
    out.push_str(&format!(
        "{:-<10}-+-{:-<6}-+-{:-<6}-+-{:-<6}-+-{:-<6}-+-{:-<6}\n",
        "", "", "", "", "", ""
    ));
    for m in rows {
        out.push_str(&format!(
            "{:<10} | {:<6} | {:<6} | {:<6} | {:<6} | {}\n",
            m.model,
            m.report.joined,
            fmt_metric(m.report.accuracy),
            fmt_metric(m.report.macro_f1),
            fmt_metric(m.report.mae),
            fmt_metric(m.hallucination_rate),
        ));
    }
    out
}

pub fn sql_summary_block(model: &str, s: &SqlSummary) -> String {
    [
        format!("EVALUATION: {model}"),
        format!("Questions:    {}", s.total),
        format!("Exact Match:  {}", s.exact),
        format!("Exec Match:   {}", s.exec_match),
        format!("Empty:        {}", s.empty),
        format!("Schema Err:   {}", s.schema),
        format!("Syntax Err:   {}", s.syntax),
        format!("Runtime Err:  {}", s.runtime),
        format!("Semantic Err: {}", s.semantic),
    ]
    .iter()
    .join("\n")
}

pub fn write_metrics_csv(path: &Path, rows: &[ModelMetrics]) -> io::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record([
        "model",
        "joined",
        "unmatched",
        "skipped",
        "accuracy",
        "macro_f1",
        "mae",
        "hallucination_rate",
        "evidence_checked",
    ])?;
    for m in rows {
        wtr.write_record([
            m.model.clone(),
            m.report.joined.to_string(),
            m.report.unmatched.to_string(),
            m.report.skipped.to_string(),
            csv_metric(m.report.accuracy),
            csv_metric(m.report.macro_f1),
            csv_metric(m.report.mae),
            csv_metric(m.hallucination_rate),
            m.evidence_checked.to_string(),
        ])?;
    }
    wtr.flush()
}

pub fn write_sql_csv(path: &Path, rows: &[(String, SqlSummary)]) -> io::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record([
        "model", "total", "exact", "exec_match", "empty", "schema", "syntax", "runtime",
        "semantic",
    ])?;
    for (model, s) in rows {
        wtr.write_record([
            model.clone(),
            s.total.to_string(),
            s.exact.to_string(),
            s.exec_match.to_string(),
            s.empty.to_string(),
            s.schema.to_string(),
            s.syntax.to_string(),
            s.runtime.to_string(),
            s.semantic.to_string(),
        ])?;
    }
    wtr.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::ClassificationReport;
    use tempfile::TempDir;

    fn metrics() -> ModelMetrics {
        ModelMetrics {
            model: "GPT".to_string(),
            report: ClassificationReport {
                joined: 10,
                accuracy: Some(0.7),
                macro_f1: Some(2.0 / 3.0),
                ..ClassificationReport::default()
            },
            hallucination_rate: None,
            evidence_checked: 0,
        }
    }

    #[test]
    fn undefined_metrics_print_as_na() {
        assert_eq!(fmt_metric(None), "n/a");
        assert_eq!(fmt_metric(Some(0.5)), "0.5000");
        let table = metrics_table(&[metrics()]);
        let row = table.lines().nth(2).unwrap();
        assert!(row.starts_with("GPT"));
        assert!(row.contains("0.6667"));
        assert!(row.trim_end().ends_with("n/a"));
    }

    #[test]
    fn metrics_csv_leaves_undefined_cells_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("m.csv");
        write_metrics_csv(&path, &[metrics()]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("model,joined"));
        assert_eq!(lines.next().unwrap(), "GPT,10,0,0,0.7,0.6666666666666666,,,0");
    }

    #[test]
    fn sql_block_lists_every_counter() {
        let s = SqlSummary {
            total: 5,
            exact: 1,
            exec_match: 3,
            schema: 1,
            semantic: 1,
            ..SqlSummary::default()
        };
        let block = sql_summary_block("Claude", &s);
        assert!(block.starts_with("EVALUATION: Claude"));
        assert!(block.contains("Exec Match:   3"));
        assert_eq!(block.lines().count(), 9);
    }
}
