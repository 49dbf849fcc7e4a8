use serde::{Deserialize, Serialize};
use std::fmt;

/// Statement family, taken from the leading keyword of the SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    Select,
    Insert,
    Update,
    Delete,
    Create,
    Drop,
    Alter,
    Other,
}

impl QueryType {
    pub const ALL: [QueryType; 8] = [
        QueryType::Select,
        QueryType::Insert,
        QueryType::Update,
        QueryType::Delete,
        QueryType::Create,
        QueryType::Drop,
        QueryType::Alter,
        QueryType::Other,
    ];

    /// Classifies `sql` by its first word, ignoring case and leading whitespace.
    pub fn classify(sql: &str) -> Self {
        let keyword = sql
            .trim_start()
            .split(|c: char| !c.is_ascii_alphabetic())
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();

        match keyword.as_str() {
            "select" => QueryType::Select,
            "insert" => QueryType::Insert,
            "update" => QueryType::Update,
            "delete" => QueryType::Delete,
            "create" => QueryType::Create,
            "drop" => QueryType::Drop,
            "alter" => QueryType::Alter,
            _ => QueryType::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Select => "select",
            QueryType::Insert => "insert",
            QueryType::Update => "update",
            QueryType::Delete => "delete",
            QueryType::Create => "create",
            QueryType::Drop => "drop",
            QueryType::Alter => "alter",
            QueryType::Other => "other",
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("SELECT * FROM quotes", QueryType::Select)]
    #[case("  select 1", QueryType::Select)]
    #[case("\n\tInsert INTO t VALUES (1)", QueryType::Insert)]
    #[case("UPDATE t SET a = 1", QueryType::Update)]
    #[case("delete from t", QueryType::Delete)]
    #[case("CREATE TABLE t (id INTEGER)", QueryType::Create)]
    #[case("DROP TABLE t", QueryType::Drop)]
    #[case("ALTER TABLE t ADD c TEXT", QueryType::Alter)]
    #[case("PRAGMA journal_mode", QueryType::Other)]
    #[case("WITH x AS (SELECT 1) SELECT * FROM x", QueryType::Other)]
    #[case("SELECT(1)", QueryType::Select)]
    #[case("selection", QueryType::Other)]
    #[case("", QueryType::Other)]
    fn test_classify(#[case] sql: &str, #[case] expected: QueryType) {
        assert_eq!(QueryType::classify(sql), expected);
    }

    #[test]
    fn test_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&QueryType::Select).unwrap(),
            "\"select\""
        );
        assert_eq!(QueryType::Other.to_string(), "other");
    }
}
