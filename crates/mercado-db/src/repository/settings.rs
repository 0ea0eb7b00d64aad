//! # Settings Repository
//!
//! The single `store_settings` row (public links) and admin credentials.
//!
//! Credentials arrive already hashed; this layer never sees a plain
//! password. Usernames compare case-insensitively.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use mercado_core::{AdminCredential, AdminSummary, CoreError, StoreLinks, StoreSettings};

/// Repository for store settings and admin accounts.
#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SettingsRepository { pool }
    }

    // =========================================================================
    // Links
    // =========================================================================

    pub async fn get_links(&self) -> DbResult<StoreLinks> {
        let links = sqlx::query_as::<_, StoreLinks>(
            r#"
            SELECT store_name, phone, whatsapp, email, address, instagram, facebook, tiktok
            FROM store_settings WHERE id = 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(links.unwrap_or_else(|| StoreLinks {
            store_name: "Mercado".to_string(),
            ..Default::default()
        }))
    }

    /// Replaces every link field.
    pub async fn update_links(&self, links: &StoreLinks) -> DbResult<StoreLinks> {
        debug!(store_name = %links.store_name, "Updating store links");

        sqlx::query(
            r#"
            INSERT INTO store_settings (
                id, store_name, phone, whatsapp, email, address,
                instagram, facebook, tiktok, updated_at
            ) VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT (id) DO UPDATE SET
                store_name = excluded.store_name,
                phone = excluded.phone,
                whatsapp = excluded.whatsapp,
                email = excluded.email,
                address = excluded.address,
                instagram = excluded.instagram,
                facebook = excluded.facebook,
                tiktok = excluded.tiktok,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&links.store_name)
        .bind(&links.phone)
        .bind(&links.whatsapp)
        .bind(&links.email)
        .bind(&links.address)
        .bind(&links.instagram)
        .bind(&links.facebook)
        .bind(&links.tiktok)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        self.get_links().await
    }

    /// Links plus admin usernames, as shown on the settings screen.
    pub async fn get_settings(&self) -> DbResult<StoreSettings> {
        let links = self.get_links().await?;
        let admins = self
            .list_admins()
            .await?
            .iter()
            .map(AdminSummary::from)
            .collect();
        Ok(StoreSettings { links, admins })
    }

    // =========================================================================
    // Admin credentials
    // =========================================================================

    pub async fn list_admins(&self) -> DbResult<Vec<AdminCredential>> {
        let admins = sqlx::query_as::<_, AdminCredential>(
            "SELECT username, password_hash, created_at FROM admin_credentials ORDER BY created_at, username",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(admins)
    }

    pub async fn get_admin(&self, username: &str) -> DbResult<Option<AdminCredential>> {
        let admin = sqlx::query_as::<_, AdminCredential>(
            "SELECT username, password_hash, created_at FROM admin_credentials WHERE username = ?1",
        )
        .bind(username.trim())
        .fetch_optional(&self.pool)
        .await?;
        Ok(admin)
    }

    /// Stores a new admin.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - username taken (any letter case)
    pub async fn insert_admin(&self, admin: &AdminCredential) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO admin_credentials (username, password_hash, created_at) VALUES (?1, ?2, ?3)",
        )
        .bind(&admin.username)
        .bind(&admin.password_hash)
        .bind(admin.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::from(e).with_value(&admin.username))?;

        info!(username = %admin.username, "Admin account created");
        Ok(())
    }

    pub async fn update_password(&self, username: &str, password_hash: &str) -> DbResult<()> {
        let result =
            sqlx::query("UPDATE admin_credentials SET password_hash = ?2 WHERE username = ?1")
                .bind(username.trim())
                .bind(password_hash)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Admin", username));
        }

        info!(username = %username, "Admin password changed");
        Ok(())
    }

    /// Removes an admin. The last remaining admin cannot be removed.
    pub async fn delete_admin(&self, username: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let exists: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM admin_credentials WHERE username = ?1")
                .bind(username.trim())
                .fetch_one(&mut *tx)
                .await?;
        if exists == 0 {
            return Err(DbError::not_found("Admin", username));
        }

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM admin_credentials")
            .fetch_one(&mut *tx)
            .await?;
        if total <= 1 {
            return Err(CoreError::AdminAccount {
                reason: "the last admin cannot be removed".to_string(),
            }
            .into());
        }

        sqlx::query("DELETE FROM admin_credentials WHERE username = ?1")
            .bind(username.trim())
            .execute(&mut *tx)
            .await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(username = %username, "Admin account removed");
        Ok(())
    }

    pub async fn admin_count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM admin_credentials")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn admin(username: &str) -> AdminCredential {
        AdminCredential {
            username: username.to_string(),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_update_links() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let links = StoreLinks {
            store_name: "Boutique Sol".to_string(),
            whatsapp: Some("+5491100000000".to_string()),
            instagram: Some("boutiquesol".to_string()),
            ..Default::default()
        };

        let saved = db.settings().update_links(&links).await.unwrap();
        assert_eq!(saved, links);
        assert_eq!(db.settings().get_links().await.unwrap(), links);
    }

    #[tokio::test]
    async fn test_admin_lifecycle() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.settings();

        repo.insert_admin(&admin("owner")).await.unwrap();
        let err = repo.insert_admin(&admin("OWNER")).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref field, .. } if field == "username"));

        // The only admin stays
        let err = repo.delete_admin("owner").await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::AdminAccount { .. })));

        repo.insert_admin(&admin("clerk")).await.unwrap();
        assert_eq!(repo.admin_count().await.unwrap(), 2);

        repo.update_password("clerk", "$argon2id$new").await.unwrap();
        let clerk = repo.get_admin("Clerk").await.unwrap().unwrap();
        assert_eq!(clerk.password_hash, "$argon2id$new");

        repo.delete_admin("owner").await.unwrap();
        let settings = repo.get_settings().await.unwrap();
        assert_eq!(settings.admins.len(), 1);
        assert_eq!(settings.admins[0].username, "clerk");

        assert!(matches!(
            repo.update_password("ghost", "x").await.unwrap_err(),
            DbError::NotFound { .. }
        ));
    }
}
