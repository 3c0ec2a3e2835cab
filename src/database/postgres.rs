// PostgreSQL implementations of the store traits.

use async_trait::async_trait;
use chrono::Utc;
use tokio_postgres::error::SqlState;

use crate::auth::models::{Account, Token, ValidationErrors};
use crate::database::models::{FromRow, ACCOUNT_COLUMNS, TOKEN_COLUMNS};
use crate::database::store::{AccountStore, AuthStore, StoreError};
use crate::database::DatabaseConnection;

fn account_from(row: Option<tokio_postgres::Row>) -> Result<Account, StoreError> {
    let row = row.ok_or(StoreError::NotFound)?;
    Ok(Account::from_row(&row)?)
}

/// Unique violations can only come from `accounts.email`
fn email_conflict(err: tokio_postgres::Error) -> StoreError {
    if err.code() == Some(&SqlState::UNIQUE_VIOLATION) {
        StoreError::Validation(ValidationErrors::single("email", "email already registered"))
    } else {
        StoreError::Database(err)
    }
}

#[async_trait]
impl AuthStore for DatabaseConnection {
    async fn get_account(&self, id: i64) -> Result<Account, StoreError> {
        let client = self.pool.get().await?;
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");
        account_from(client.query_opt(sql.as_str(), &[&id]).await?)
    }

    async fn get_account_by_email(&self, email: &str) -> Result<Account, StoreError> {
        let client = self.pool.get().await?;
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1");
        account_from(client.query_opt(sql.as_str(), &[&email]).await?)
    }

    async fn update_account(&self, account: &Account) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        let n = client
            .execute(
                "UPDATE accounts SET active = $1, roles = $2, last_login = $3, updated_at = NOW() \
                 WHERE id = $4",
                &[&account.active, &account.roles, &account.last_login, &account.id],
            )
            .await?;
        if n == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn get_by_refresh_token(&self, token: &str) -> Result<(Account, Token), StoreError> {
        let client = self.pool.get().await?;
        let sql = format!("SELECT {TOKEN_COLUMNS} FROM tokens WHERE token = $1");
        let row = client.query_opt(sql.as_str(), &[&token]).await?.ok_or(StoreError::NotFound)?;
        let record = Token::from_row(&row)?;

        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");
        let account = account_from(client.query_opt(sql.as_str(), &[&record.account_id]).await?)?;
        Ok((account, record))
    }

    async fn save_refresh_token(&self, token: &mut Token) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        if token.id == 0 {
            let row = client
                .query_one(
                    "INSERT INTO tokens (token, expiry, updated_at, account_id, mobile, identifier) \
                     VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
                    &[
                        &token.token,
                        &token.expiry,
                        &token.updated_at,
                        &token.account_id,
                        &token.mobile,
                        &token.identifier,
                    ],
                )
                .await?;
            token.id = row.try_get("id")?;
            return Ok(());
        }

        let n = client
            .execute(
                "UPDATE tokens SET token = $1, expiry = $2, updated_at = $3, mobile = $4, identifier = $5 \
                 WHERE id = $6",
                &[
                    &token.token,
                    &token.expiry,
                    &token.updated_at,
                    &token.mobile,
                    &token.identifier,
                    &token.id,
                ],
            )
            .await?;
        if n == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_refresh_token(&self, token: &Token) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        client.execute("DELETE FROM tokens WHERE id = $1", &[&token.id]).await?;
        Ok(())
    }

    async fn purge_expired_tokens(&self) -> Result<u64, StoreError> {
        let client = self.pool.get().await?;
        let n = client
            .execute("DELETE FROM tokens WHERE expiry < $1", &[&Utc::now()])
            .await?;
        Ok(n)
    }
}

#[async_trait]
impl AccountStore for DatabaseConnection {
    async fn get(&self, id: i64) -> Result<Account, StoreError> {
        let client = self.pool.get().await?;
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");
        let mut account = account_from(client.query_opt(sql.as_str(), &[&id]).await?)?;

        let sql = format!("SELECT {TOKEN_COLUMNS} FROM tokens WHERE account_id = $1 ORDER BY id");
        account.token = client
            .query(sql.as_str(), &[&id])
            .await?
            .iter()
            .map(Token::from_row)
            .collect::<Result<_, _>>()?;
        Ok(account)
    }

    async fn update(&self, account: &mut Account) -> Result<(), StoreError> {
        account.validate().map_err(StoreError::Validation)?;
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "UPDATE accounts SET email = $1, name = $2, updated_at = NOW() \
                 WHERE id = $3 RETURNING updated_at",
                &[&account.email, &account.name, &account.id],
            )
            .await
            .map_err(email_conflict)?
            .ok_or(StoreError::NotFound)?;
        account.updated_at = row.try_get("updated_at")?;
        Ok(())
    }

    async fn delete(&self, account: &Account) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        // tokens go with the account through ON DELETE CASCADE
        let n = client.execute("DELETE FROM accounts WHERE id = $1", &[&account.id]).await?;
        if n == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn update_token(&self, token: &Token) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        let n = client
            .execute(
                "UPDATE tokens SET identifier = $1 WHERE id = $2",
                &[&token.identifier, &token.id],
            )
            .await?;
        if n == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_token(&self, token: &Token) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        client.execute("DELETE FROM tokens WHERE id = $1", &[&token.id]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{migrations::run_migrations, DatabaseConfig};
    use chrono::Duration;
    use uuid::Uuid;

    async fn connect() -> Option<DatabaseConnection> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let db = DatabaseConnection::new(DatabaseConfig::from_url(&url, 2).unwrap())
            .await
            .unwrap();
        run_migrations(&db).await.unwrap();
        Some(db)
    }

    async fn insert_account(db: &DatabaseConnection, email: &str) -> Account {
        let client = db.pool.get().await.unwrap();
        let id: i64 = client
            .query_one(
                "INSERT INTO accounts (email, name) VALUES ($1, 'Test') RETURNING id",
                &[&email],
            )
            .await
            .unwrap()
            .get("id");
        AccountStore::get(db, id).await.unwrap()
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL pointing at a disposable PostgreSQL database"]
    async fn duplicate_email_is_a_validation_error() {
        let Some(db) = connect().await else { return };
        let suffix = Uuid::new_v4().simple().to_string();
        let alice = insert_account(&db, &format!("alice-{suffix}@example.com")).await;
        let mut bob = insert_account(&db, &format!("bob-{suffix}@example.com")).await;

        bob.email = alice.email.clone();
        let err = AccountStore::update(&db, &mut bob).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(e) if e.get("email").is_some()));

        AccountStore::delete(&db, &alice).await.unwrap();
        AccountStore::delete(&db, &bob).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL pointing at a disposable PostgreSQL database"]
    async fn refresh_token_round_trip() {
        let Some(db) = connect().await else { return };
        let suffix = Uuid::new_v4().simple().to_string();
        let alice = insert_account(&db, &format!("alice-{suffix}@example.com")).await;

        let mut token = Token {
            id: 0,
            token: format!("t-{suffix}"),
            expiry: Utc::now() + Duration::hours(1),
            updated_at: Utc::now(),
            account_id: alice.id,
            mobile: true,
            identifier: "Chrome on Android".to_string(),
        };
        db.save_refresh_token(&mut token).await.unwrap();
        assert_ne!(token.id, 0);

        let (account, found) = db.get_by_refresh_token(&token.token).await.unwrap();
        assert_eq!(account.id, alice.id);
        assert_eq!(found.id, token.id);
        assert_eq!(found.identifier, "Chrome on Android");

        token.token = format!("t2-{suffix}");
        db.save_refresh_token(&mut token).await.unwrap();
        assert!(matches!(db.get_by_refresh_token(&format!("t-{suffix}")).await, Err(StoreError::NotFound)));

        // tokens cascade with the account
        AccountStore::delete(&db, &alice).await.unwrap();
        assert!(matches!(db.get_by_refresh_token(&token.token).await, Err(StoreError::NotFound)));
    }
}
