//! SQLite Role Store
//!
//! Relational layout mirrors the constraints of the in-memory store; unique
//! violations are mapped back onto the matching `AuthzError` variants.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use super::RoleStore;
use crate::category::{CategoryId, NewCategory, RoleCategory};
use crate::error::{AuthzError, Result};
use crate::role::{NewRole, Role, RoleId};
use crate::user::UserId;

const ROLE_COLUMNS: &str = "id, name, uname, role_category_id, weight";

pub struct SqliteRoleStore {
    pool: SqlitePool,
}

impl SqliteRoleStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a pool for `url`. An in-memory database lives and dies with its
    /// connection, so it is pinned to a single never-recycled connection.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let in_memory = url.contains(":memory:");

        let mut pool_options = SqlitePoolOptions::new();
        pool_options = if in_memory {
            pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            pool_options.max_connections(max_connections.max(1))
        };

        let pool = pool_options.connect_with(options).await?;
        info!(url = %url, in_memory, "Connected to SQLite role store");
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn parse_role(row: &SqliteRow) -> Role {
        Role {
            id: RoleId(row.get("id")),
            name: row.get("name"),
            uname: row.get("uname"),
            category_id: CategoryId(row.get("role_category_id")),
            weight: row.get("weight"),
        }
    }

    fn parse_category(row: &SqliteRow) -> RoleCategory {
        RoleCategory {
            id: CategoryId(row.get("id")),
            mname: row.get("mname"),
            superior_id: row.get::<Option<i64>, _>("superior_id").map(CategoryId),
        }
    }

    async fn category_exists(&self, id: CategoryId) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM role_categories WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }
}

/// Unique-constraint message of an sqlx error, if that is what it is.
fn unique_violation(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => Some(db.message().to_string()),
        _ => None,
    }
}

#[async_trait]
impl RoleStore for SqliteRoleStore {
    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS role_categories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                mname TEXT NOT NULL UNIQUE,
                superior_id INTEGER REFERENCES role_categories(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS roles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                uname TEXT UNIQUE,
                role_category_id INTEGER NOT NULL REFERENCES role_categories(id),
                weight REAL,
                UNIQUE (weight, role_category_id),
                UNIQUE (name, role_category_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_role_assocs (
                user_id INTEGER NOT NULL,
                role_id INTEGER NOT NULL REFERENCES roles(id),
                UNIQUE (user_id, role_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_roles_category ON roles(role_category_id)")
            .execute(&self.pool)
            .await?;

        info!("SQLite role store schema initialized");
        Ok(())
    }

    async fn list_categories(&self) -> Result<Vec<RoleCategory>> {
        let rows = sqlx::query("SELECT id, mname, superior_id FROM role_categories ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(Self::parse_category).collect())
    }

    async fn insert_category(&self, category: NewCategory) -> Result<RoleCategory> {
        if let Some(superior_id) = category.superior_id {
            if !self.category_exists(superior_id).await? {
                return Err(AuthzError::not_found("RoleCategory", superior_id));
            }
        }

        let result = sqlx::query("INSERT INTO role_categories (mname, superior_id) VALUES (?, ?)")
            .bind(&category.mname)
            .bind(category.superior_id.map(|id| id.0))
            .execute(&self.pool)
            .await
            .map_err(|e| match unique_violation(&e) {
                Some(_) => AuthzError::duplicate("RoleCategory", "mname", &category.mname),
                None => AuthzError::from(e),
            })?;

        let row = RoleCategory {
            id: CategoryId(result.last_insert_rowid()),
            mname: category.mname,
            superior_id: category.superior_id,
        };
        debug!(id = %row.id, mname = %row.mname, "Inserted category");
        Ok(row)
    }

    async fn find_role(&self, id: RoleId) -> Result<Option<Role>> {
        let query = format!("SELECT {ROLE_COLUMNS} FROM roles WHERE id = ?");
        let row = sqlx::query(&query)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(Self::parse_role))
    }

    async fn roles_in_category(&self, category_id: CategoryId) -> Result<Vec<Role>> {
        let query = format!("SELECT {ROLE_COLUMNS} FROM roles WHERE role_category_id = ? ORDER BY id");
        let rows = sqlx::query(&query)
            .bind(category_id.0)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(Self::parse_role).collect())
    }

    async fn find_roles_by_name(&self, name: &str) -> Result<Vec<Role>> {
        let query = format!("SELECT {ROLE_COLUMNS} FROM roles WHERE name = ? OR uname = ? ORDER BY id");
        let rows = sqlx::query(&query)
            .bind(name)
            .bind(name)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(Self::parse_role).collect())
    }

    async fn insert_role(&self, role: NewRole) -> Result<Role> {
        if !self.category_exists(role.category_id).await? {
            return Err(AuthzError::not_found("RoleCategory", role.category_id));
        }

        let result = sqlx::query(
            "INSERT INTO roles (name, uname, role_category_id, weight) VALUES (?, ?, ?, ?)",
        )
        .bind(&role.name)
        .bind(&role.uname)
        .bind(role.category_id.0)
        .bind(role.weight)
        .execute(&self.pool)
        .await
        .map_err(|e| match unique_violation(&e) {
            Some(message) if message.contains("roles.weight") => AuthzError::DuplicateWeight {
                weight: role.weight.unwrap_or(f64::NAN),
                category_id: role.category_id.0,
            },
            Some(message) if message.contains("roles.uname") => {
                AuthzError::duplicate("Role", "uname", role.uname.as_deref().unwrap_or_default())
            }
            Some(_) => AuthzError::duplicate("Role", "name", &role.name),
            None => AuthzError::from(e),
        })?;

        let row = role.into_role(RoleId(result.last_insert_rowid()));
        debug!(id = %row.id, name = %row.name, weight = ?row.weight, "Inserted role");
        Ok(row)
    }

    async fn roles_of_user(&self, user_id: UserId) -> Result<Vec<Role>> {
        let rows = sqlx::query(
            "SELECT r.id, r.name, r.uname, r.role_category_id, r.weight \
             FROM roles r JOIN user_role_assocs a ON a.role_id = r.id \
             WHERE a.user_id = ? ORDER BY r.id",
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(Self::parse_role).collect())
    }

    async fn assign_role(&self, user_id: UserId, role_id: RoleId) -> Result<bool> {
        if self.find_role(role_id).await?.is_none() {
            return Err(AuthzError::not_found("Role", role_id));
        }
        let result = sqlx::query("INSERT OR IGNORE INTO user_role_assocs (user_id, role_id) VALUES (?, ?)")
            .bind(user_id.0)
            .bind(role_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn revoke_role(&self, user_id: UserId, role_id: RoleId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM user_role_assocs WHERE user_id = ? AND role_id = ?")
            .bind(user_id.0)
            .bind(role_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}
