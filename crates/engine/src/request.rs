//! Prefix/keyword classification of a line of text into a typed [`Statement`].
//!
//! Grounded on `original_source/src/database.c`'s `sscanf`/`strtok`-based dispatch
//! (case-sensitive keyword prefixes, fixed statement shapes) but written as an
//! idiomatic Rust classifier rather than a port of the C scanning calls. This is
//! intentionally not a general SQL grammar: each statement shape in SPEC_FULL.md §6
//! is recognized by prefix, and arguments are extracted with plain string splitting.

use catalog::ColumnSchema;
use common::{DbError, DbResult};
use types::SqlType;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Predicate {
    pub column: String,
    pub op: CompareOp,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    Begin,
    Commit,
    Rollback,
    CreateTable {
        name: String,
        columns: Vec<ColumnSchema>,
    },
    CreateIndex {
        name: String,
        table: String,
        column: String,
        unique: bool,
    },
    DropIndex {
        name: String,
        table: String,
    },
    Insert {
        table: String,
        values: Vec<String>,
    },
    Update {
        table: String,
        column: String,
        value: String,
        pk: i32,
    },
    Delete {
        table: String,
        pk: i32,
    },
    Select {
        table: String,
        predicate: Option<Predicate>,
    },
}

fn usage(msg: impl Into<String>) -> DbError {
    DbError::Usage(msg.into())
}

/// Classify one line of text. Returns a [`DbError::Usage`] for anything that does
/// not match one of the recognized statement shapes.
pub fn classify(text: &str) -> DbResult<Statement> {
    let text = text.trim();
    if let Some(rest) = text.strip_prefix("BEGIN") {
        require_empty(rest)?;
        return Ok(Statement::Begin);
    }
    if let Some(rest) = text.strip_prefix("COMMIT") {
        require_empty(rest)?;
        return Ok(Statement::Commit);
    }
    if let Some(rest) = text.strip_prefix("ROLLBACK") {
        require_empty(rest)?;
        return Ok(Statement::Rollback);
    }
    if let Some(rest) = text.strip_prefix("CREATE TABLE") {
        return parse_create_table(rest);
    }
    if let Some(rest) = text.strip_prefix("CREATE UNIQUE INDEX") {
        return parse_create_index(rest, true);
    }
    if let Some(rest) = text.strip_prefix("CREATE INDEX") {
        return parse_create_index(rest, false);
    }
    if let Some(rest) = text.strip_prefix("DROP INDEX") {
        return parse_drop_index(rest);
    }
    if let Some(rest) = text.strip_prefix("INSERT INTO") {
        return parse_insert(rest);
    }
    if let Some(rest) = text.strip_prefix("UPDATE") {
        return parse_update(rest);
    }
    if let Some(rest) = text.strip_prefix("DELETE FROM") {
        return parse_delete(rest);
    }
    if let Some(rest) = text.strip_prefix("SELECT * FROM") {
        return parse_select(rest);
    }
    Err(usage(format!("unrecognized statement: '{text}'")))
}

fn require_empty(rest: &str) -> DbResult<()> {
    if rest.trim().is_empty() {
        Ok(())
    } else {
        Err(usage(format!("unexpected trailing text: '{}'", rest.trim())))
    }
}

fn matching_parens(s: &str) -> DbResult<(usize, usize)> {
    let open = s.find('(').ok_or_else(|| usage("expected '('"))?;
    let close = s.rfind(')').ok_or_else(|| usage("expected ')'"))?;
    if close < open {
        return Err(usage("mismatched parentheses"));
    }
    Ok((open, close))
}

fn parse_create_table(rest: &str) -> DbResult<Statement> {
    let rest = rest.trim();
    let (open, close) = matching_parens(rest)?;
    let name = rest[..open].trim().to_string();
    if name.is_empty() {
        return Err(usage("CREATE TABLE requires a table name"));
    }
    let mut columns = Vec::new();
    for def in rest[open + 1..close].split(',') {
        let def = def.trim();
        if def.is_empty() {
            continue;
        }
        let (col_name, rest) = def
            .split_once(char::is_whitespace)
            .ok_or_else(|| usage(format!("malformed column definition: '{def}'")))?;
        let rest = rest.trim();
        let (type_token, is_primary) = match rest.strip_suffix("PRIMARY KEY") {
            Some(ty) => (ty.trim(), true),
            None => (rest, false),
        };
        let ty = SqlType::parse(type_token)
            .ok_or_else(|| usage(format!("unknown column type: '{type_token}'")))?;
        columns.push(ColumnSchema::new(col_name.trim(), ty, is_primary));
    }
    if columns.is_empty() {
        return Err(usage("CREATE TABLE requires at least one column"));
    }
    // By convention (SPEC_FULL.md §3) the first column is always the primary key,
    // whether or not the definition spelled out "PRIMARY KEY" explicitly.
    if !columns.iter().any(|c| c.is_primary_key) {
        columns[0].is_primary_key = true;
    }
    Ok(Statement::CreateTable { name, columns })
}

fn parse_create_index(rest: &str, unique: bool) -> DbResult<Statement> {
    let rest = rest.trim();
    let (left, right) = rest
        .split_once(" ON ")
        .ok_or_else(|| usage("CREATE INDEX requires 'ON <table>(<column>)'"))?;
    let name = left.trim().to_string();
    let right = right.trim();
    let (open, close) = matching_parens(right)?;
    let table = right[..open].trim().to_string();
    let column = right[open + 1..close].trim().to_string();
    if name.is_empty() || table.is_empty() || column.is_empty() {
        return Err(usage("CREATE INDEX requires an index name, table, and column"));
    }
    Ok(Statement::CreateIndex {
        name,
        table,
        column,
        unique,
    })
}

fn parse_drop_index(rest: &str) -> DbResult<Statement> {
    let rest = rest.trim();
    let (left, right) = rest
        .split_once(" ON ")
        .ok_or_else(|| usage("DROP INDEX requires 'ON <table>'"))?;
    Ok(Statement::DropIndex {
        name: left.trim().to_string(),
        table: right.trim().to_string(),
    })
}

fn parse_insert(rest: &str) -> DbResult<Statement> {
    let rest = rest.trim();
    let values_at = rest
        .find(" VALUES")
        .ok_or_else(|| usage("INSERT INTO requires 'VALUES (...)'"))?;
    let table = rest[..values_at].trim().to_string();
    if table.is_empty() {
        return Err(usage("INSERT INTO requires a table name"));
    }
    let after_values = &rest[values_at + " VALUES".len()..];
    let (open, close) = matching_parens(after_values)?;
    let values = after_values[open + 1..close]
        .split(',')
        .map(|v| v.trim().to_string())
        .collect();
    Ok(Statement::Insert { table, values })
}

fn parse_update(rest: &str) -> DbResult<Statement> {
    let rest = rest.trim();
    let (table_part, rest) = rest
        .split_once(" SET ")
        .ok_or_else(|| usage("UPDATE requires 'SET <col>=<val> WHERE id = <int>'"))?;
    let table = table_part.trim().to_string();
    let (assign, where_part) = rest
        .split_once(" WHERE ")
        .ok_or_else(|| usage("UPDATE requires a WHERE clause"))?;
    let (column, value) = assign
        .split_once('=')
        .ok_or_else(|| usage(format!("malformed SET clause: '{assign}'")))?;
    let pk = parse_id_predicate(where_part)?;
    Ok(Statement::Update {
        table,
        column: column.trim().to_string(),
        value: value.trim().to_string(),
        pk,
    })
}

fn parse_delete(rest: &str) -> DbResult<Statement> {
    let rest = rest.trim();
    let (table, where_part) = rest
        .split_once(" WHERE ")
        .ok_or_else(|| usage("DELETE FROM requires a WHERE clause"))?;
    let pk = parse_id_predicate(where_part)?;
    Ok(Statement::Delete {
        table: table.trim().to_string(),
        pk,
    })
}

/// Parse the fixed `id = <int>` shape UPDATE/DELETE use to target one row.
fn parse_id_predicate(where_part: &str) -> DbResult<i32> {
    let (column, value) = where_part
        .split_once('=')
        .ok_or_else(|| usage(format!("malformed WHERE clause: '{where_part}'")))?;
    if column.trim() != "id" {
        return Err(usage("UPDATE/DELETE only support 'WHERE id = <int>'"));
    }
    value
        .trim()
        .parse::<i32>()
        .map_err(|_| usage(format!("expected an integer id, got '{}'", value.trim())))
}

fn parse_select(rest: &str) -> DbResult<Statement> {
    let rest = rest.trim();
    if let Some((table_part, where_part)) = rest.split_once(" WHERE ") {
        let table = table_part.trim().to_string();
        let predicate = Some(parse_predicate(where_part.trim())?);
        Ok(Statement::Select { table, predicate })
    } else {
        Ok(Statement::Select {
            table: rest.to_string(),
            predicate: None,
        })
    }
}

fn parse_predicate(where_part: &str) -> DbResult<Predicate> {
    let (op, op_start, op_len) = find_operator(where_part)
        .ok_or_else(|| usage(format!("expected a comparison operator in '{where_part}'")))?;
    let column = where_part[..op_start].trim().to_string();
    let value = where_part[op_start + op_len..].trim().to_string();
    if column.is_empty() || value.is_empty() {
        return Err(usage(format!("malformed WHERE clause: '{where_part}'")));
    }
    Ok(Predicate { column, op, value })
}

/// Find the first comparison operator in `s`, checking two-character operators
/// before their single-character prefixes so `!=`/`<=`/`>=` are not mistaken for
/// `=`/`<`/`>`.
fn find_operator(s: &str) -> Option<(CompareOp, usize, usize)> {
    for i in 0..s.len() {
        if let Some(two) = s.get(i..i + 2) {
            let op = match two {
                "!=" => Some(CompareOp::Ne),
                "<=" => Some(CompareOp::Le),
                ">=" => Some(CompareOp::Ge),
                _ => None,
            };
            if let Some(op) = op {
                return Some((op, i, 2));
            }
        }
        if let Some(one) = s.get(i..i + 1) {
            let op = match one {
                "=" => Some(CompareOp::Eq),
                "<" => Some(CompareOp::Lt),
                ">" => Some(CompareOp::Gt),
                _ => None,
            };
            if let Some(op) = op {
                return Some((op, i, 1));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_transaction_control() {
        assert_eq!(classify("BEGIN").unwrap(), Statement::Begin);
        assert_eq!(classify("COMMIT").unwrap(), Statement::Commit);
        assert_eq!(classify("ROLLBACK").unwrap(), Statement::Rollback);
    }

    #[test]
    fn classifies_create_table_with_primary_key_marker() {
        let stmt = classify("CREATE TABLE users(id INT PRIMARY KEY, name VARCHAR(255))").unwrap();
        match stmt {
            Statement::CreateTable { name, columns } => {
                assert_eq!(name, "users");
                assert_eq!(columns.len(), 2);
                assert!(columns[0].is_primary_key);
                assert!(!columns[1].is_primary_key);
                assert_eq!(columns[1].ty, SqlType::Varchar(255));
            }
            other => panic!("expected CreateTable, got {other:?}"),
        }
    }

    #[test]
    fn create_table_defaults_first_column_to_primary_key() {
        let stmt = classify("CREATE TABLE p(id INT, name VARCHAR(50), price INT)").unwrap();
        match stmt {
            Statement::CreateTable { columns, .. } => {
                assert!(columns[0].is_primary_key);
                assert!(!columns[1].is_primary_key);
            }
            other => panic!("expected CreateTable, got {other:?}"),
        }
    }

    #[test]
    fn classifies_create_and_drop_index() {
        let stmt = classify("CREATE INDEX price_idx ON p(price)").unwrap();
        assert_eq!(
            stmt,
            Statement::CreateIndex {
                name: "price_idx".into(),
                table: "p".into(),
                column: "price".into(),
                unique: false,
            }
        );

        let stmt = classify("CREATE UNIQUE INDEX u_idx ON p(price)").unwrap();
        assert_eq!(
            stmt,
            Statement::CreateIndex {
                name: "u_idx".into(),
                table: "p".into(),
                column: "price".into(),
                unique: true,
            }
        );

        let stmt = classify("DROP INDEX price_idx ON p").unwrap();
        assert_eq!(
            stmt,
            Statement::DropIndex {
                name: "price_idx".into(),
                table: "p".into(),
            }
        );
    }

    #[test]
    fn classifies_insert() {
        let stmt = classify("INSERT INTO users VALUES (1, 'Alice')").unwrap();
        assert_eq!(
            stmt,
            Statement::Insert {
                table: "users".into(),
                values: vec!["1".into(), "'Alice'".into()],
            }
        );
    }

    #[test]
    fn classifies_update() {
        let stmt = classify("UPDATE users SET name='Alicia' WHERE id = 1").unwrap();
        assert_eq!(
            stmt,
            Statement::Update {
                table: "users".into(),
                column: "name".into(),
                value: "'Alicia'".into(),
                pk: 1,
            }
        );
    }

    #[test]
    fn classifies_delete() {
        let stmt = classify("DELETE FROM users WHERE id = 2").unwrap();
        assert_eq!(
            stmt,
            Statement::Delete {
                table: "users".into(),
                pk: 2,
            }
        );
    }

    #[test]
    fn classifies_select_without_predicate() {
        let stmt = classify("SELECT * FROM users").unwrap();
        assert_eq!(
            stmt,
            Statement::Select {
                table: "users".into(),
                predicate: None,
            }
        );
    }

    #[test]
    fn classifies_select_with_each_operator() {
        for (text, expected_op) in [
            ("SELECT * FROM users WHERE id = 1", CompareOp::Eq),
            ("SELECT * FROM users WHERE id != 1", CompareOp::Ne),
            ("SELECT * FROM users WHERE id < 1", CompareOp::Lt),
            ("SELECT * FROM users WHERE id <= 1", CompareOp::Le),
            ("SELECT * FROM users WHERE id > 1", CompareOp::Gt),
            ("SELECT * FROM users WHERE id >= 1", CompareOp::Ge),
        ] {
            let stmt = classify(text).unwrap();
            match stmt {
                Statement::Select { predicate, .. } => {
                    assert_eq!(predicate.unwrap().op, expected_op);
                }
                other => panic!("expected Select, got {other:?}"),
            }
        }
    }

    #[test]
    fn unrecognized_text_is_a_usage_error() {
        let err = classify("EXPLAIN users").unwrap_err();
        assert!(matches!(err, DbError::Usage(_)));
    }
}
