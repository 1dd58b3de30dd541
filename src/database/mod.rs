use crate::assets::MigrationAssets;
use crate::config::{DatabaseConfig, ImportConfig};
use crate::models::{Account, TeamMembership};
use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{migrate::MigrateDatabase, Pool, Sqlite};
use tracing::{debug, info};

pub mod operations;
pub mod roster;

#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
    membership_query_limit: usize,
    write_group_size: usize,
}

impl Database {
    pub fn pool(&self) -> Pool<Sqlite> {
        self.pool.clone()
    }

    pub async fn new(config: &DatabaseConfig, import_config: &ImportConfig) -> Result<Self> {
        let in_memory = config.url.contains(":memory:");

        // Create database if it doesn't exist (for SQLite)
        if !in_memory && !Sqlite::database_exists(&config.url).await? {
            Sqlite::create_database(&config.url).await?;
        }

        // An in-memory database lives only as long as its single connection
        let pool = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect(&config.url)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(config.max_connections.unwrap_or(10))
                .connect(&config.url)
                .await?
        };

        debug!("Connected to database at {}", config.url);

        Ok(Self::from_pool(pool, import_config))
    }

    pub fn from_pool(pool: Pool<Sqlite>, import_config: &ImportConfig) -> Self {
        Self {
            pool,
            membership_query_limit: import_config.membership_query_limit.max(1),
            write_group_size: import_config.write_group_size.max(1),
        }
    }

    pub async fn migrate(&self) -> Result<()> {
        self.run_embedded_migrations().await?;
        Ok(())
    }

    async fn run_embedded_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS _sqlx_migrations (
                version BIGINT PRIMARY KEY,
                description TEXT NOT NULL,
                installed_on TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                success BOOLEAN NOT NULL,
                checksum BLOB NOT NULL,
                execution_time BIGINT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        for (name, content) in MigrationAssets::get_migrations() {
            // "001_initial_schema.sql" -> 1
            let version: i64 = name
                .split('_')
                .next()
                .and_then(|v| v.parse().ok())
                .ok_or_else(|| anyhow::anyhow!("Migration {} has no numeric prefix", name))?;

            let existing = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM _sqlx_migrations WHERE version = ? AND success = true",
            )
            .bind(version)
            .fetch_one(&self.pool)
            .await?;

            if existing > 0 {
                continue;
            }

            let start = std::time::Instant::now();
            let mut transaction = self.pool.begin().await?;

            match sqlx::query(&content).execute(&mut *transaction).await {
                Ok(_) => {
                    let execution_time = start.elapsed().as_millis() as i64;
                    let checksum = Self::calculate_checksum(&content);

                    sqlx::query(
                        r#"
                        INSERT INTO _sqlx_migrations (version, description, success, checksum, execution_time)
                        VALUES (?, ?, true, ?, ?)
                        "#,
                    )
                    .bind(version)
                    .bind(&name)
                    .bind(&checksum)
                    .bind(execution_time)
                    .execute(&mut *transaction)
                    .await?;

                    transaction.commit().await?;
                    info!("Applied migration: {} ({}ms)", name, execution_time);
                }
                Err(e) => {
                    transaction.rollback().await?;
                    return Err(anyhow::anyhow!("Migration {} failed: {}", name, e));
                }
            }
        }

        Ok(())
    }

    fn calculate_checksum(content: &str) -> Vec<u8> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};
        let mut hasher = DefaultHasher::new();
        content.hash(&mut hasher);
        hasher.finish().to_be_bytes().to_vec()
    }

    /// Insert or replace an account row
    pub async fn upsert_account(&self, account: &Account) -> Result<()> {
        sqlx::query(
            "INSERT INTO accounts (id, email, team_id, is_team_lead) VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                email = excluded.email,
                team_id = excluded.team_id,
                is_team_lead = excluded.is_team_lead",
        )
        .bind(&account.id)
        .bind(&account.email)
        .bind(&account.team_id)
        .bind(account.is_team_lead)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert or replace a roster entry
    pub async fn upsert_team_member(&self, member: &TeamMembership) -> Result<()> {
        sqlx::query(
            "INSERT INTO team_members (id, team_lead_id, email, name) VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                team_lead_id = excluded.team_lead_id,
                email = excluded.email,
                name = excluded.name",
        )
        .bind(&member.id)
        .bind(&member.team_lead_id)
        .bind(&member.email)
        .bind(&member.name)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
