// Schema parser: extracts column lists and PRIMARY KEY columns from
// CREATE TABLE statements. Favors speed over complete DDL parsing.

use regex::Regex;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDefinition {
    pub schema: Option<String>,
    pub table: String,
    pub columns: Vec<String>,
    pub primary_key: Vec<String>,
}

pub struct SchemaParser {
    create_table_re: Regex,
    primary_key_re: Regex,
    column_re: Regex,
}

// Leading words of table-level constraints inside a CREATE TABLE body.
const CONSTRAINT_PREFIXES: [&str; 7] = [
    "PRIMARY KEY",
    "KEY ",
    "UNIQUE",
    "CONSTRAINT",
    "FOREIGN KEY",
    "FULLTEXT",
    "INDEX",
];

impl SchemaParser {
    // Build regexes once for reuse.
    pub fn new() -> Result<Self, regex::Error> {
        let create_table_re = Regex::new(
            r#"(?i)^\s*CREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?(?:[`"\[]?(\w+)[`"\]]?\.)?[`"\[]?(\w+)[`"\]]?"#,
        )?;
        let primary_key_re = Regex::new(r"(?i)PRIMARY\s+KEY\s*\(([^)]*)\)")?;
        let column_re = Regex::new(r#"^[`"\[]?(\w+)[`"\]]?\s+(\w+)"#)?;
        Ok(Self {
            create_table_re,
            primary_key_re,
            column_re,
        })
    }

    // Every CREATE TABLE among `statements`.
    pub fn parse_statements(&self, statements: &[String]) -> Vec<TableDefinition> {
        let defs: Vec<TableDefinition> = statements
            .iter()
            .filter_map(|stmt| self.parse_create(stmt))
            .collect();
        debug!(
            "ParseSchemas: {} tables, {} with PK",
            defs.len(),
            defs.iter().filter(|d| !d.primary_key.is_empty()).count()
        );
        defs
    }

    pub fn parse_create(&self, stmt: &str) -> Option<TableDefinition> {
        let cap = self.create_table_re.captures(stmt)?;
        let table = cap.get(2)?.as_str().to_string();
        let schema = cap.get(1).map(|m| m.as_str().to_string());

        let open = stmt.find('(')?;
        let close = stmt.rfind(')')?;
        if close <= open {
            return None;
        }
        let body = &stmt[open + 1..close];

        let mut columns = Vec::new();
        let mut primary_key = Vec::new();
        for def in split_top_level(body) {
            let def = def.trim();
            let upper = def.to_ascii_uppercase();
            if def.is_empty() || CONSTRAINT_PREFIXES.iter().any(|p| upper.starts_with(p)) {
                continue;
            }
            if let Some(m) = self.column_re.captures(def).and_then(|c| c.get(1)) {
                let col = m.as_str().to_string();
                // Column-level `id INT PRIMARY KEY`.
                if upper.contains("PRIMARY KEY") {
                    primary_key.push(col.clone());
                }
                columns.push(col);
            }
        }

        if let Some(list) = self.primary_key_re.captures(body).and_then(|c| c.get(1)) {
            primary_key = list
                .as_str()
                .split(',')
                .map(|p| p.trim().trim_matches(|c| matches!(c, '`' | '"' | '\'' | '[' | ']')))
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
        }

        debug!(
            "ParseSchemas: table {} has {} columns, PK {:?}",
            table,
            columns.len(),
            primary_key
        );
        Some(TableDefinition {
            schema,
            table,
            columns,
            primary_key,
        })
    }
}

// Split a CREATE TABLE body on commas that are outside parentheses and quotes.
fn split_top_level(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in body.char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' | '`' => quote = Some(c),
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&body[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::insert::StatementSplitter;

    fn parse_text(text: &str) -> Vec<TableDefinition> {
        let statements = StatementSplitter::new().unwrap().split(text);
        SchemaParser::new().unwrap().parse_statements(&statements)
    }

    #[test]
    fn table_level_primary_key() {
        let defs = parse_text(
            "CREATE TABLE IF NOT EXISTS `hr`.`orders` (\n  `region` varchar(10) NOT NULL,\n  \
             `order_no` int,\n  `total` decimal(10,2),\n  PRIMARY KEY (`region`, `order_no`)\n);",
        );
        assert_eq!(defs.len(), 1);
        let d = &defs[0];
        assert_eq!(d.schema.as_deref(), Some("hr"));
        assert_eq!(d.table, "orders");
        assert_eq!(d.columns, vec!["region", "order_no", "total"]);
        assert_eq!(d.primary_key, vec!["region", "order_no"]);
    }

    #[test]
    fn column_level_primary_key_and_plain_names() {
        let defs = parse_text("create table users (id INT PRIMARY KEY, name TEXT);");
        assert_eq!(defs[0].schema, None);
        assert_eq!(defs[0].columns, vec!["id", "name"]);
        assert_eq!(defs[0].primary_key, vec!["id"]);
    }

    #[test]
    fn ignores_other_statements() {
        assert!(parse_text("INSERT INTO t VALUES (1);").is_empty());
    }

    #[test]
    fn create_table_after_prose() {
        let defs = parse_text("Users' table:\nCREATE TABLE users (id INT PRIMARY KEY);");
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].primary_key, vec!["id"]);
    }
}
