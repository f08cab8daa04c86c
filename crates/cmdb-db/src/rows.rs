//! Helpers shared by the row structs of every repository.

use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

/// Row struct for `count() ... GROUP ALL` queries.
#[derive(Debug, SurrealValue)]
pub(crate) struct CountRow {
    pub(crate) total: u64,
}

pub(crate) fn parse_uuid(value: &str, what: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(value).map_err(|e| DbError::Decode(format!("invalid {what} UUID: {e}")))
}

pub(crate) fn parse_opt_uuid(value: Option<&str>, what: &str) -> Result<Option<Uuid>, DbError> {
    value.map(|v| parse_uuid(v, what)).transpose()
}

/// Joins filter predicates into a `WHERE` clause (empty when none).
pub(crate) fn where_clause(predicates: &[&str]) -> String {
    if predicates.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", predicates.join(" AND "))
    }
}

pub(crate) fn total_of(rows: &[CountRow]) -> u64 {
    rows.first().map(|r| r.total).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn where_clause_joins_predicates() {
        assert_eq!(where_clause(&[]), "");
        assert_eq!(
            where_clause(&["a = $a", "b = $b"]),
            " WHERE a = $a AND b = $b"
        );
    }

    #[test]
    fn parse_uuid_reports_field() {
        let err = parse_uuid("nope", "tenant").unwrap_err();
        assert!(err.to_string().contains("tenant"));
    }
}
