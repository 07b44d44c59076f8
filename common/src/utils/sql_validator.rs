//! SQL statement validator.
//!
//! Gate for ad-hoc statements. This is a case-insensitive substring check, not
//! a parser: a keyword anywhere in the text (identifiers and string literals
//! included) rejects the statement, and comment or encoding tricks are not
//! detected.

use crate::errors::AppError;

/// Validates ad-hoc SQL statements.
pub struct SqlValidator;

/// Keywords that reject an ad-hoc statement, checked in this order.
pub const FORBIDDEN_KEYWORDS: [&str; 9] = [
    "DROP", "DELETE", "TRUNCATE", "ALTER", "CREATE", "INSERT", "UPDATE", "GRANT", "REVOKE",
];

impl SqlValidator {
    /// Validates a SQL statement against the keyword denylist.
    ///
    /// # Errors
    /// Returns `AppError::ForbiddenStatement` naming the first denylisted
    /// keyword found, or `AppError::Validation` for a blank statement.
    pub fn validate(sql: &str) -> Result<(), AppError> {
        if sql.trim().is_empty() {
            return Err(AppError::Validation("Query parameter is required".into()));
        }
        match Self::forbidden_keyword(sql) {
            Some(keyword) => Err(AppError::ForbiddenStatement(keyword.to_string())),
            None => Ok(()),
        }
    }

    /// Returns the first denylisted keyword contained in `sql`, if any.
    pub fn forbidden_keyword(sql: &str) -> Option<&'static str> {
        let sql_upper = sql.to_uppercase();
        FORBIDDEN_KEYWORDS
            .into_iter()
            .find(|keyword| sql_upper.contains(keyword))
    }
}
