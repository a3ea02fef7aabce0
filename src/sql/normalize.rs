use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));
static PUNCT_SPACING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*([<>=!,(])\s*").expect("static regex"));
static CLOSE_PAREN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+\)").expect("static regex"));

/// Canonical string form of a query for exact-match comparison.
///
/// Outside quoted literals and identifiers: lowercases, collapses whitespace
/// and drops spaces around comparison operators, commas and opening
/// parentheses (and before closing ones). Quoted spans are kept verbatim.
/// A trailing `;` and one layer of enclosing parentheses are stripped. The
/// steps repeat until nothing changes, so the result is a fixpoint:
/// `normalize_sql(&normalize_sql(s)) == normalize_sql(s)`.
pub fn normalize_sql(sql: &str) -> String {
    let mut current = normalize_once(sql);
    loop {
        let next = normalize_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn normalize_once(sql: &str) -> String {
    let mut joined = String::with_capacity(sql.len());
    for (quoted, span) in spans(sql.trim()) {
        if quoted {
            joined.push_str(span);
        } else {
            joined.push_str(&tighten(span));
        }
    }

    let mut s = joined.trim();
    if let Some(rest) = s.strip_suffix(';') {
        s = rest.trim_end();
    }
    if is_wrapped(s) {
        s = s[1..s.len() - 1].trim();
    }
    s.to_string()
}

fn tighten(code: &str) -> String {
    let lowered = code.to_lowercase();
    let collapsed = WHITESPACE.replace_all(&lowered, " ");
    let tight = PUNCT_SPACING.replace_all(&collapsed, "$1");
    CLOSE_PAREN.replace_all(&tight, ")").into_owned()
}

/// Splits `sql` into `(quoted, span)` pieces. Quoted spans include their
/// quotes; an unterminated quote runs to the end.
fn spans(sql: &str) -> Vec<(bool, &str)> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut quote: Option<char> = None;
    for (i, c) in sql.char_indices() {
        match quote {
            Some(q) if c == q => {
                out.push((true, &sql[start..=i]));
                start = i + 1;
                quote = None;
            }
            Some(_) => {}
            None if c == '\'' || c == '"' => {
                if start < i {
                    out.push((false, &sql[start..i]));
                }
                start = i;
                quote = Some(c);
            }
            None => {}
        }
    }
    if start < sql.len() {
        out.push((quote.is_some(), &sql[start..]));
    }
    out
}

/// True when the first `(` outside quotes closes exactly at the final `)`.
fn is_wrapped(s: &str) -> bool {
    if !(s.starts_with('(') && s.ends_with(')')) {
        return false;
    }
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (i, c) in s.char_indices() {
        match (quote, c) {
            (Some(q), _) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return i == s.len() - 1;
                }
            }
            _ => {}
        }
    }
    false
}
