// Database Models
//
// Row mapping for the `accounts` and `tokens` tables.

use tokio_postgres::Row;

use crate::auth::models::{Account, Token};

/// Trait for converting from tokio-postgres Row
pub trait FromRow {
    fn from_row(row: &Row) -> Result<Self, tokio_postgres::Error> where Self: Sized;
}

pub const ACCOUNT_COLUMNS: &str =
    "id, email, name, active, roles, last_login, created_at, updated_at";

pub const TOKEN_COLUMNS: &str = "id, token, expiry, updated_at, account_id, mobile, identifier";

impl FromRow for Account {
    fn from_row(row: &Row) -> Result<Self, tokio_postgres::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            name: row.try_get("name")?,
            active: row.try_get("active")?,
            roles: row.try_get("roles")?,
            last_login: row.try_get("last_login")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            token: Vec::new(),
        })
    }
}

impl FromRow for Token {
    fn from_row(row: &Row) -> Result<Self, tokio_postgres::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            token: row.try_get("token")?,
            expiry: row.try_get("expiry")?,
            updated_at: row.try_get("updated_at")?,
            account_id: row.try_get("account_id")?,
            mobile: row.try_get("mobile")?,
            identifier: row.try_get("identifier")?,
        })
    }
}
