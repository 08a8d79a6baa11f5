// INSERT parser: splits text into statements and expands INSERT statements
// into one Row per value group. No full SQL grammar, only enough to get
// quoting and nesting right.

use crate::model::Row;
use regex::Regex;
use std::collections::BTreeMap;
use tracing::debug;

// Column lists known for a text, keyed by lowercase table name.
pub type ColumnsMap = BTreeMap<String, Vec<String>>;

pub struct InsertParser<'a> {
    columns_map: &'a ColumnsMap,
}

impl<'a> InsertParser<'a> {
    pub fn new(columns_map: &'a ColumnsMap) -> Self {
        Self { columns_map }
    }

    // Expand every INSERT among `statements`. Unqualified tables are
    // labeled with `default_schema`.
    pub fn parse_statements(&self, statements: &[String], default_schema: &str) -> Vec<Row> {
        let mut rows = Vec::new();
        let mut inserts = 0usize;
        for stmt in statements.iter().filter(|s| is_insert(s)) {
            inserts += 1;
            match self.expand_insert(stmt, default_schema) {
                Ok(mut expanded) => rows.append(&mut expanded),
                Err(e) => debug!("ExpandInsert: skipped statement: {}", e),
            }
        }
        debug!(
            "ParseInserts: {} statements, {} INSERTs, {} rows",
            statements.len(),
            inserts,
            rows.len()
        );
        rows
    }

    // Expand a single INSERT statement into one Row per value group.
    pub fn expand_insert(&self, insert_stmt: &str, default_schema: &str) -> Result<Vec<Row>, String> {
        let normalized = insert_stmt.trim();
        let upper = normalized.to_ascii_uppercase();
        let insert_idx = upper.find("INSERT").ok_or("not INSERT")?;
        let after_insert = normalized[insert_idx + 6..].trim_start();
        if !after_insert.to_ascii_uppercase().starts_with("INTO") {
            return Err("not INSERT INTO".into());
        }
        let rest = after_insert[4..].trim_start();

        let (qualified, rest) = split_identifier(rest).ok_or("invalid table name")?;
        let (schema, table) = match qualified.rsplit_once('.') {
            Some((s, t)) => (unquote_identifier(s), unquote_identifier(t)),
            None => (default_schema.to_string(), unquote_identifier(&qualified)),
        };
        if table.is_empty() {
            return Err("invalid table name".into());
        }

        // Explicit column list, if present.
        let mut columns: Vec<String> = Vec::new();
        let mut rest = rest.trim_start();
        if rest.starts_with('(') {
            let end = matching_paren(rest).ok_or("invalid column list")?;
            for col in rest[1..end].split(',') {
                let col = unquote_identifier(col);
                if !col.is_empty() {
                    columns.push(col);
                }
            }
            rest = rest[end + 1..].trim_start();
        }

        if !rest.to_ascii_uppercase().starts_with("VALUES") {
            return Err(format!("no VALUES clause for {}", table));
        }
        let mut values_part = rest[6..].trim();
        if let Some(stripped) = values_part.strip_suffix(';') {
            values_part = stripped.trim_end();
        }

        if columns.is_empty() {
            if let Some(cols) = self.columns_map.get(&table.to_lowercase()) {
                columns = cols.clone();
            }
        }

        let groups = split_value_groups_with_quotes(values_part);
        debug!("ExpandInsert: {}.{} has {} value groups", schema, table, groups.len());

        let mut rows = Vec::with_capacity(groups.len());
        for group in groups {
            let group = group.trim();
            let inner = group
                .strip_prefix('(')
                .and_then(|g| g.strip_suffix(')'))
                .unwrap_or(group);
            let values = parse_values_with_quotes(inner);
            if columns.is_empty() {
                columns = (1..=values.len()).map(|i| format!("column_{}", i)).collect();
            }
            if values.len() != columns.len() {
                debug!(
                    "ExpandInsert: skip row in {} (expected {}, got {})",
                    table,
                    columns.len(),
                    values.len()
                );
                continue;
            }
            rows.push(Row::new(schema.clone(), table.clone(), columns.clone(), values));
        }
        Ok(rows)
    }
}

fn is_insert(stmt: &str) -> bool {
    let upper = stmt.trim_start().to_ascii_uppercase();
    upper.starts_with("INSERT") && upper[6..].trim_start().starts_with("INTO")
}

// Finds INSERT INTO / CREATE TABLE statements inside arbitrary text. Quote
// tracking starts at each keyword, so apostrophes in surrounding prose never
// open a string.
pub struct StatementSplitter {
    start_re: Regex,
}

impl StatementSplitter {
    pub fn new() -> Result<Self, regex::Error> {
        let start_re = Regex::new(r"(?i)\b(?:INSERT\s+INTO|CREATE\s+TABLE)\b")?;
        Ok(Self { start_re })
    }

    // Statements run from a keyword to the first `;` outside quotes and
    // parentheses. A trailing unterminated statement is kept.
    pub fn split(&self, text: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut pos = 0;
        while let Some(m) = self.start_re.find_at(text, pos) {
            let rest = &text[m.start()..];
            match StatementAccumulator::new().scan(rest) {
                Some(len) => {
                    out.push(rest[..len].trim().to_string());
                    pos = m.start() + len;
                }
                None => {
                    out.push(rest.trim().to_string());
                    break;
                }
            }
        }
        out
    }
}

// Tracks quote and paren state from the start of one statement.
struct StatementAccumulator {
    in_single_quote: bool,
    in_double_quote: bool,
    escape_next: bool,
    paren_depth: i32,
}

impl StatementAccumulator {
    fn new() -> Self {
        Self {
            in_single_quote: false,
            in_double_quote: false,
            escape_next: false,
            paren_depth: 0,
        }
    }

    // Byte length of the statement at the start of `text`, terminator included.
    fn scan(&mut self, text: &str) -> Option<usize> {
        for (i, c) in text.char_indices() {
            if self.escape_next {
                self.escape_next = false;
                continue;
            }
            if c == '\\' && (self.in_single_quote || self.in_double_quote) {
                self.escape_next = true;
                continue;
            }
            if c == '\'' && !self.in_double_quote {
                self.in_single_quote = !self.in_single_quote;
            } else if c == '"' && !self.in_single_quote {
                self.in_double_quote = !self.in_double_quote;
            } else if !self.in_single_quote && !self.in_double_quote {
                match c {
                    '(' => self.paren_depth += 1,
                    ')' => self.paren_depth -= 1,
                    ';' if self.paren_depth <= 0 => return Some(i + 1),
                    _ => {}
                }
            }
        }
        None
    }
}

// Split a possibly qualified identifier off the front of `text`.
fn split_identifier(text: &str) -> Option<(String, &str)> {
    let mut end = 0;
    let mut quote: Option<char> = None;
    for (i, c) in text.char_indices() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None => {
                if c == '`' || c == '"' {
                    quote = Some(c);
                } else if c == '[' {
                    quote = Some(']');
                } else if c == '(' || c.is_whitespace() {
                    break;
                }
            }
        }
        end = i + c.len_utf8();
    }
    if end == 0 {
        return None;
    }
    Some((text[..end].to_string(), &text[end..]))
}

fn unquote_identifier(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c| matches!(c, '`' | '"' | '\'' | '[' | ']'))
        .trim()
        .to_string()
}

// Index of the parenthesis closing the one at the start of `text`.
fn matching_paren(text: &str) -> Option<usize> {
    let mut depth = 0i32;
    let mut in_quote: Option<char> = None;
    for (i, c) in text.char_indices() {
        if let Some(q) = in_quote {
            if c == q {
                in_quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' | '`' => in_quote = Some(c),
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

// Split value groups: (...),(...),... while respecting quotes.
pub(crate) fn split_value_groups_with_quotes(values_part: &str) -> Vec<String> {
    let mut groups = Vec::new();
    let mut buf = String::new();
    let mut in_single = false;
    let mut in_double = false;
    let mut escape = false;
    let mut paren_depth = 0i32;

    for c in values_part.chars() {
        if escape {
            buf.push(c);
            escape = false;
            continue;
        }
        if c == '\\' && (in_single || in_double) {
            buf.push(c);
            escape = true;
            continue;
        }
        if c == '\'' && !in_double {
            buf.push(c);
            in_single = !in_single;
            continue;
        }
        if c == '"' && !in_single {
            buf.push(c);
            in_double = !in_double;
            continue;
        }
        if !in_single && !in_double {
            if c == '(' {
                paren_depth += 1;
                buf.push(c);
                continue;
            }
            if c == ')' {
                paren_depth -= 1;
                buf.push(c);
                if paren_depth == 0 {
                    groups.push(buf.trim().to_string());
                    buf.clear();
                }
                continue;
            }
            if c == ',' && paren_depth == 0 {
                continue;
            }
        }
        buf.push(c);
    }

    if !buf.trim().is_empty() {
        groups.push(buf.trim().to_string());
    }
    groups
}

// Parse comma-separated values within a single group, respecting quotes,
// then unquote each one.
pub(crate) fn parse_values_with_quotes(values_str: &str) -> Vec<Option<String>> {
    let mut values = Vec::new();
    let mut buf = String::new();
    let mut in_single = false;
    let mut in_double = false;
    let mut escape = false;
    let mut depth = 0i32;

    for c in values_str.chars() {
        if escape {
            buf.push(c);
            escape = false;
            continue;
        }
        if c == '\\' && (in_single || in_double) {
            buf.push(c);
            escape = true;
            continue;
        }
        if c == '\'' && !in_double {
            buf.push(c);
            in_single = !in_single;
            continue;
        }
        if c == '"' && !in_single {
            buf.push(c);
            in_double = !in_double;
            continue;
        }
        if !in_single && !in_double {
            if c == '(' {
                depth += 1;
            } else if c == ')' {
                depth -= 1;
            }
        }
        if !in_single && !in_double && depth == 0 && c == ',' {
            values.push(clean_value(&buf));
            buf.clear();
        } else {
            buf.push(c);
        }
    }
    values.push(clean_value(&buf));
    values
}

// Bare NULL becomes null; quoted literals lose their quotes and escapes.
fn clean_value(raw: &str) -> Option<String> {
    let val = raw.trim();
    if val.eq_ignore_ascii_case("null") {
        return None;
    }
    for q in ['\'', '"'] {
        if val.len() >= 2 && val.starts_with(q) && val.ends_with(q) {
            return Some(unescape_literal(&val[1..val.len() - 1], q));
        }
    }
    // N'...' national string literals.
    if val.len() >= 3 && (val.starts_with("N'") || val.starts_with("n'")) && val.ends_with('\'') {
        return Some(unescape_literal(&val[2..val.len() - 1], '\''));
    }
    Some(val.to_string())
}

fn unescape_literal(body: &str, quote: char) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('0') => out.push('\0'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else if c == quote && chars.peek() == Some(&quote) {
            chars.next();
            out.push(quote);
        } else {
            out.push(c);
        }
    }
    out
}
