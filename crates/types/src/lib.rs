use std::cmp::Ordering;

/// A column's declared storage type, as it appears in a `CREATE TABLE` definition.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SqlType {
    Int,
    Varchar(u16),
    Float,
    Double,
    Text,
    Date,
    Timestamp,
    Boolean,
}

impl SqlType {
    /// Parse a column type token from a `CREATE TABLE` definition, e.g. `"VARCHAR(255)"`.
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        if let Some(rest) = token
            .strip_prefix("VARCHAR(")
            .or_else(|| token.strip_prefix("varchar("))
        {
            let len = rest.trim_end_matches(')').trim().parse::<u16>().ok()?;
            return Some(SqlType::Varchar(len));
        }
        match token.to_ascii_uppercase().as_str() {
            "INT" => Some(SqlType::Int),
            "FLOAT" => Some(SqlType::Float),
            "DOUBLE" => Some(SqlType::Double),
            "TEXT" => Some(SqlType::Text),
            "DATE" => Some(SqlType::Date),
            "TIMESTAMP" => Some(SqlType::Timestamp),
            "BOOLEAN" => Some(SqlType::Boolean),
            _ => None,
        }
    }
}

/// An owned column value. Rows are ultimately stored as `|`-joined text, so this type
/// exists for typed comparisons and secondary-index value extraction rather than as
/// the on-disk row representation.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
    Boolean(bool),
    Null,
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Parse a trimmed column string as the given declared type. Returns `None` on
    /// malformed input; callers treat that as a usage error.
    pub fn parse(raw: &str, ty: &SqlType) -> Option<Value> {
        match ty {
            SqlType::Int => raw.parse::<i64>().ok().map(Value::Int),
            SqlType::Float | SqlType::Double => raw.parse::<f64>().ok().map(Value::Float),
            SqlType::Boolean => match raw.to_ascii_lowercase().as_str() {
                "true" | "1" => Some(Value::Boolean(true)),
                "false" | "0" => Some(Value::Boolean(false)),
                _ => None,
            },
            SqlType::Varchar(_) | SqlType::Text | SqlType::Date | SqlType::Timestamp => {
                Some(Value::Text(raw.to_string()))
            }
        }
    }

    pub fn cmp_same_type(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    pub fn eq_same_type(&self, other: &Value) -> Option<bool> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.eq(b)),
            (Value::Float(a), Value::Float(b)) => Some(a.eq(b)),
            (Value::Text(a), Value::Text(b)) => Some(a.eq(b)),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.eq(b)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::cmp::Ordering::{Equal, Greater, Less};

    #[test]
    fn sql_type_parses_varchar_length() {
        assert_eq!(SqlType::parse("VARCHAR(255)"), Some(SqlType::Varchar(255)));
        assert_eq!(SqlType::parse("varchar(10)"), Some(SqlType::Varchar(10)));
    }

    #[test]
    fn sql_type_parses_scalar_keywords() {
        assert_eq!(SqlType::parse("INT"), Some(SqlType::Int));
        assert_eq!(SqlType::parse("BOOLEAN"), Some(SqlType::Boolean));
        assert_eq!(SqlType::parse("nonsense"), None);
    }

    #[test]
    fn value_parse_respects_declared_type() {
        assert_eq!(Value::parse("42", &SqlType::Int), Some(Value::Int(42)));
        assert_eq!(Value::parse("abc", &SqlType::Int), None);
        assert_eq!(
            Value::parse("3.5", &SqlType::Double),
            Some(Value::Float(3.5))
        );
        assert_eq!(
            Value::parse("Alice", &SqlType::Varchar(255)),
            Some(Value::Text("Alice".into()))
        );
        assert_eq!(
            Value::parse("true", &SqlType::Boolean),
            Some(Value::Boolean(true))
        );
    }

    #[test]
    fn truthiness_is_strict() {
        assert_eq!(Value::Boolean(true).as_bool(), Some(true));
        assert_eq!(Value::Int(1).as_bool(), None);
        assert_eq!(Value::Null.as_bool(), None);
    }

    #[test]
    fn comparisons_require_same_type() {
        assert_eq!(Value::Int(1).cmp_same_type(&Value::Int(2)), Some(Less));
        assert_eq!(
            Value::Text("a".into()).cmp_same_type(&Value::Text("a".into())),
            Some(Equal)
        );
        assert_eq!(
            Value::Boolean(true).cmp_same_type(&Value::Boolean(false)),
            Some(Greater)
        );
        assert_eq!(Value::Int(1).cmp_same_type(&Value::Text("1".into())), None);
        assert_eq!(Value::Null.cmp_same_type(&Value::Int(1)), None);
    }

    #[test]
    fn equality_requires_same_type() {
        assert_eq!(Value::Int(1).eq_same_type(&Value::Int(1)), Some(true));
        assert_eq!(Value::Int(1).eq_same_type(&Value::Int(2)), Some(false));
        assert_eq!(Value::Text("1".into()).eq_same_type(&Value::Int(1)), None);
    }

    #[test]
    fn serde_round_trip_stability() {
        let vals = vec![
            Value::Int(-42),
            Value::Float(2.5),
            Value::Text("Ada".into()),
            Value::Boolean(true),
            Value::Null,
        ];
        let json = serde_json::to_string(&vals).unwrap();
        let back: Vec<Value> = serde_json::from_str(&json).unwrap();
        assert_eq!(vals, back);
    }

    proptest! {
        #[test]
        fn order_is_antisymmetric(i in any::<i64>(), j in any::<i64>()) {
            let a = Value::Int(i);
            let b = Value::Int(j);
            match (a.cmp_same_type(&b), b.cmp_same_type(&a)) {
                (Some(o1), Some(o2)) => assert_eq!(o1, o2.reverse()),
                _ => prop_assert!(true),
            }
        }

        #[test]
        fn eq_reflexive(val in any::<i64>()) {
            let v = Value::Int(val);
            assert_eq!(v.eq_same_type(&v), Some(true));
        }

        #[test]
        fn text_cmp_matches_std(a in ".*", b in ".*") {
            let va = Value::Text(a.clone());
            let vb = Value::Text(b.clone());
            assert_eq!(va.cmp_same_type(&vb), Some(a.cmp(&b)));
        }
    }
}
