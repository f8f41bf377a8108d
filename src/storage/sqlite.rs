use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::info;

use super::{
    Event, Experiment, ExperimentStatus, Funnel, FunnelKpis, ImprovementLog, Page, Storage,
    Variant,
};
use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};
use crate::storage::event_types;

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed storage implementation
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// Capped at one connection; every connection to `:memory:` would
    /// otherwise see its own empty database.
    pub async fn new_in_memory() -> StorageResult<Self> {
        let options =
            SqliteConnectOptions::from_str("sqlite::memory:").map_err(|e| {
                StorageError::Connection {
                    message: format!("Invalid database URL: {}", e),
                }
            })?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> StorageResult<()> {
        info!("Running database migrations...");

        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::Migration {
                message: format!("Failed to run migrations: {}", e),
            })?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn create_funnel(&self, funnel: &Funnel) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO funnels (id, product_name, product_description, target_audience,
                                 hidden, visitors, cta_clicks, email_captures, purchases,
                                 avg_scroll_depth, conversion_rate, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&funnel.id)
        .bind(&funnel.product_name)
        .bind(&funnel.product_description)
        .bind(&funnel.target_audience)
        .bind(funnel.hidden)
        .bind(funnel.kpis.visitors)
        .bind(funnel.kpis.cta_clicks)
        .bind(funnel.kpis.email_captures)
        .bind(funnel.kpis.purchases)
        .bind(funnel.kpis.avg_scroll_depth)
        .bind(funnel.kpis.conversion_rate)
        .bind(funnel.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_funnel(&self, id: &str) -> StorageResult<Option<Funnel>> {
        let row: Option<FunnelRow> = sqlx::query_as(
            r#"
            SELECT id, product_name, product_description, target_audience, hidden,
                   visitors, cta_clicks, email_captures, purchases,
                   avg_scroll_depth, conversion_rate, created_at
            FROM funnels
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn list_funnels(&self, include_hidden: bool) -> StorageResult<Vec<Funnel>> {
        let rows: Vec<FunnelRow> = if include_hidden {
            sqlx::query_as(
                r#"
                SELECT id, product_name, product_description, target_audience, hidden,
                       visitors, cta_clicks, email_captures, purchases,
                       avg_scroll_depth, conversion_rate, created_at
                FROM funnels
                ORDER BY created_at DESC
                "#,
            )
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query_as(
                r#"
                SELECT id, product_name, product_description, target_audience, hidden,
                       visitors, cta_clicks, email_captures, purchases,
                       avg_scroll_depth, conversion_rate, created_at
                FROM funnels
                WHERE hidden = 0
                ORDER BY created_at DESC
                "#,
            )
            .fetch_all(&self.pool)
            .await?
        };

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn update_funnel(&self, funnel: &Funnel) -> StorageResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE funnels
            SET product_name = ?, product_description = ?, target_audience = ?,
                hidden = ?, visitors = ?, cta_clicks = ?, email_captures = ?,
                purchases = ?, avg_scroll_depth = ?, conversion_rate = ?
            WHERE id = ?
            "#,
        )
        .bind(&funnel.product_name)
        .bind(&funnel.product_description)
        .bind(&funnel.target_audience)
        .bind(funnel.hidden)
        .bind(funnel.kpis.visitors)
        .bind(funnel.kpis.cta_clicks)
        .bind(funnel.kpis.email_captures)
        .bind(funnel.kpis.purchases)
        .bind(funnel.kpis.avg_scroll_depth)
        .bind(funnel.kpis.conversion_rate)
        .bind(&funnel.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::FunnelNotFound {
                funnel_id: funnel.id.clone(),
            });
        }

        Ok(())
    }

    async fn set_funnel_hidden(&self, id: &str, hidden: bool) -> StorageResult<()> {
        let result = sqlx::query("UPDATE funnels SET hidden = ? WHERE id = ?")
            .bind(hidden)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::FunnelNotFound {
                funnel_id: id.to_string(),
            });
        }

        Ok(())
    }

    async fn delete_funnel(&self, id: &str) -> StorageResult<()> {
        // Events are intentionally left orphaned
        sqlx::query("DELETE FROM pages WHERE funnel_id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM experiments WHERE funnel_id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM improvement_log WHERE funnel_id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM funnels WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn bump_funnel_kpis(
        &self,
        funnel_id: &str,
        event_type: &str,
        value: Option<f64>,
    ) -> StorageResult<()> {
        match event_type {
            event_types::PAGE_VIEW => {
                sqlx::query("UPDATE funnels SET visitors = visitors + 1 WHERE id = ?")
                    .bind(funnel_id)
                    .execute(&self.pool)
                    .await?;
            }
            event_types::CTA_CLICK => {
                sqlx::query("UPDATE funnels SET cta_clicks = cta_clicks + 1 WHERE id = ?")
                    .bind(funnel_id)
                    .execute(&self.pool)
                    .await?;
            }
            event_types::EMAIL_CAPTURE => {
                sqlx::query("UPDATE funnels SET email_captures = email_captures + 1 WHERE id = ?")
                    .bind(funnel_id)
                    .execute(&self.pool)
                    .await?;
            }
            event_types::PURCHASE => {
                sqlx::query(
                    r#"
                    UPDATE funnels
                    SET purchases = purchases + 1,
                        conversion_rate = CASE WHEN visitors > 0
                            THEN ROUND(100.0 * (purchases + 1) / visitors)
                            ELSE 0 END
                    WHERE id = ?
                    "#,
                )
                .bind(funnel_id)
                .execute(&self.pool)
                .await?;
            }
            event_types::SCROLL_DEPTH => {
                if let Some(depth) = value {
                    // Rolling blend; the event stream stays the authoritative source
                    sqlx::query(
                        r#"
                        UPDATE funnels
                        SET avg_scroll_depth = CASE WHEN avg_scroll_depth > 0
                            THEN (avg_scroll_depth + ?) / 2.0
                            ELSE ? END
                        WHERE id = ?
                        "#,
                    )
                    .bind(depth)
                    .bind(depth)
                    .bind(funnel_id)
                    .execute(&self.pool)
                    .await?;
                }
            }
            _ => {}
        }

        Ok(())
    }

    async fn upsert_page(&self, page: &Page) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO pages (id, funnel_id, component_name, order_index, page_type,
                               page_spec, source_code, generation_error, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (funnel_id, component_name) DO UPDATE SET
                order_index = excluded.order_index,
                page_type = excluded.page_type,
                page_spec = excluded.page_spec,
                source_code = excluded.source_code,
                generation_error = excluded.generation_error
            "#,
        )
        .bind(&page.id)
        .bind(&page.funnel_id)
        .bind(&page.component_name)
        .bind(page.order_index)
        .bind(&page.page_type)
        .bind(&page.page_spec)
        .bind(&page.source_code)
        .bind(&page.generation_error)
        .bind(page.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_page(
        &self,
        funnel_id: &str,
        component_name: &str,
    ) -> StorageResult<Option<Page>> {
        let row: Option<PageRow> = sqlx::query_as(
            r#"
            SELECT id, funnel_id, component_name, order_index, page_type,
                   page_spec, source_code, generation_error, created_at
            FROM pages
            WHERE funnel_id = ? AND component_name = ?
            "#,
        )
        .bind(funnel_id)
        .bind(component_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn get_funnel_pages(&self, funnel_id: &str) -> StorageResult<Vec<Page>> {
        let rows: Vec<PageRow> = sqlx::query_as(
            r#"
            SELECT id, funnel_id, component_name, order_index, page_type,
                   page_spec, source_code, generation_error, created_at
            FROM pages
            WHERE funnel_id = ?
            ORDER BY order_index ASC
            "#,
        )
        .bind(funnel_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn set_page_source(
        &self,
        funnel_id: &str,
        component_name: &str,
        source: &str,
    ) -> StorageResult<()> {
        let result = sqlx::query(
            "UPDATE pages SET source_code = ? WHERE funnel_id = ? AND component_name = ?",
        )
        .bind(source)
        .bind(funnel_id)
        .bind(component_name)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::PageNotFound {
                page: format!("{}/{}", funnel_id, component_name),
            });
        }

        Ok(())
    }

    async fn set_page_error(
        &self,
        funnel_id: &str,
        component_name: &str,
        error: Option<&str>,
    ) -> StorageResult<()> {
        let result = sqlx::query(
            "UPDATE pages SET generation_error = ? WHERE funnel_id = ? AND component_name = ?",
        )
        .bind(error)
        .bind(funnel_id)
        .bind(component_name)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::PageNotFound {
                page: format!("{}/{}", funnel_id, component_name),
            });
        }

        Ok(())
    }

    async fn create_experiment(&self, experiment: &Experiment) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO experiments (id, funnel_id, page_name, status, control_name,
                                     test_name, traffic_split, control_visitors,
                                     control_conversions, test_visitors, test_conversions,
                                     winner, started_at, concluded_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&experiment.id)
        .bind(&experiment.funnel_id)
        .bind(&experiment.page_name)
        .bind(experiment.status.to_string())
        .bind(&experiment.control_name)
        .bind(&experiment.test_name)
        .bind(experiment.traffic_split)
        .bind(experiment.control_visitors)
        .bind(experiment.control_conversions)
        .bind(experiment.test_visitors)
        .bind(experiment.test_conversions)
        .bind(experiment.winner.map(|w| w.to_string()))
        .bind(experiment.started_at.to_rfc3339())
        .bind(experiment.concluded_at.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            // The partial unique index on running experiments caught a write
            // that raced past the application-level check
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StorageError::RunningExperimentExists {
                    funnel_id: experiment.funnel_id.clone(),
                    page_name: experiment.page_name.clone(),
                }
            }
            _ => StorageError::Sqlx(e),
        })?;

        Ok(())
    }

    async fn get_experiment(&self, id: &str) -> StorageResult<Option<Experiment>> {
        let row: Option<ExperimentRow> = sqlx::query_as(
            r#"
            SELECT id, funnel_id, page_name, status, control_name, test_name,
                   traffic_split, control_visitors, control_conversions,
                   test_visitors, test_conversions, winner, started_at, concluded_at
            FROM experiments
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn get_running_experiment(
        &self,
        funnel_id: &str,
        page_name: &str,
    ) -> StorageResult<Option<Experiment>> {
        let row: Option<ExperimentRow> = sqlx::query_as(
            r#"
            SELECT id, funnel_id, page_name, status, control_name, test_name,
                   traffic_split, control_visitors, control_conversions,
                   test_visitors, test_conversions, winner, started_at, concluded_at
            FROM experiments
            WHERE funnel_id = ? AND page_name = ? AND status = 'running'
            "#,
        )
        .bind(funnel_id)
        .bind(page_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn count_page_experiments(
        &self,
        funnel_id: &str,
        page_name: &str,
    ) -> StorageResult<i64> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM experiments WHERE funnel_id = ? AND page_name = ?",
        )
        .bind(funnel_id)
        .bind(page_name)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.0)
    }

    async fn get_funnel_experiments(&self, funnel_id: &str) -> StorageResult<Vec<Experiment>> {
        let rows: Vec<ExperimentRow> = sqlx::query_as(
            r#"
            SELECT id, funnel_id, page_name, status, control_name, test_name,
                   traffic_split, control_visitors, control_conversions,
                   test_visitors, test_conversions, winner, started_at, concluded_at
            FROM experiments
            WHERE funnel_id = ?
            ORDER BY started_at ASC
            "#,
        )
        .bind(funnel_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn update_experiment(&self, experiment: &Experiment) -> StorageResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE experiments
            SET status = ?, traffic_split = ?, control_visitors = ?,
                control_conversions = ?, test_visitors = ?, test_conversions = ?,
                winner = ?, concluded_at = ?
            WHERE id = ?
            "#,
        )
        .bind(experiment.status.to_string())
        .bind(experiment.traffic_split)
        .bind(experiment.control_visitors)
        .bind(experiment.control_conversions)
        .bind(experiment.test_visitors)
        .bind(experiment.test_conversions)
        .bind(experiment.winner.map(|w| w.to_string()))
        .bind(experiment.concluded_at.map(|t| t.to_rfc3339()))
        .bind(&experiment.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::ExperimentNotFound {
                experiment_id: experiment.id.clone(),
            });
        }

        Ok(())
    }

    async fn append_event(&self, event: &Event) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO events (id, funnel_id, page_name, session_id, visitor_id,
                                event_type, value, variant, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&event.id)
        .bind(&event.funnel_id)
        .bind(&event.page_name)
        .bind(&event.session_id)
        .bind(&event.visitor_id)
        .bind(&event.event_type)
        .bind(event.value)
        .bind(&event.variant)
        .bind(event.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_funnel_events(&self, funnel_id: &str) -> StorageResult<Vec<Event>> {
        let rows: Vec<EventRow> = sqlx::query_as(
            r#"
            SELECT id, funnel_id, page_name, session_id, visitor_id,
                   event_type, value, variant, created_at
            FROM events
            WHERE funnel_id = ?
            ORDER BY created_at ASC
            "#,
        )
        .bind(funnel_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn append_improvement(&self, entry: &ImprovementLog) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO improvement_log (id, funnel_id, version, page_name,
                                         reasoning, kpi_snapshot, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.funnel_id)
        .bind(entry.version)
        .bind(&entry.page_name)
        .bind(&entry.reasoning)
        .bind(entry.kpi_snapshot.to_string())
        .bind(entry.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_funnel_improvements(
        &self,
        funnel_id: &str,
    ) -> StorageResult<Vec<ImprovementLog>> {
        let rows: Vec<ImprovementRow> = sqlx::query_as(
            r#"
            SELECT id, funnel_id, version, page_name, reasoning, kpi_snapshot, created_at
            FROM improvement_log
            WHERE funnel_id = ?
            ORDER BY version ASC
            "#,
        )
        .bind(funnel_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn append_generation_failure(
        &self,
        funnel_id: &str,
        page_name: &str,
        error: &str,
    ) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO generation_failures (id, funnel_id, page_name, error, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(funnel_id)
        .bind(page_name)
        .bind(error)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// Internal row types for SQLx mapping

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[derive(sqlx::FromRow)]
struct FunnelRow {
    id: String,
    product_name: String,
    product_description: String,
    target_audience: String,
    hidden: bool,
    visitors: i64,
    cta_clicks: i64,
    email_captures: i64,
    purchases: i64,
    avg_scroll_depth: f64,
    conversion_rate: f64,
    created_at: String,
}

impl From<FunnelRow> for Funnel {
    fn from(row: FunnelRow) -> Self {
        Self {
            id: row.id,
            product_name: row.product_name,
            product_description: row.product_description,
            target_audience: row.target_audience,
            hidden: row.hidden,
            kpis: FunnelKpis {
                visitors: row.visitors,
                cta_clicks: row.cta_clicks,
                email_captures: row.email_captures,
                purchases: row.purchases,
                avg_scroll_depth: row.avg_scroll_depth,
                conversion_rate: row.conversion_rate,
            },
            created_at: parse_timestamp(&row.created_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct PageRow {
    id: String,
    funnel_id: String,
    component_name: String,
    order_index: i64,
    page_type: Option<String>,
    page_spec: Option<String>,
    source_code: Option<String>,
    generation_error: Option<String>,
    created_at: String,
}

impl From<PageRow> for Page {
    fn from(row: PageRow) -> Self {
        Self {
            id: row.id,
            funnel_id: row.funnel_id,
            component_name: row.component_name,
            order_index: row.order_index,
            page_type: row.page_type,
            page_spec: row.page_spec,
            source_code: row.source_code,
            generation_error: row.generation_error,
            created_at: parse_timestamp(&row.created_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct ExperimentRow {
    id: String,
    funnel_id: String,
    page_name: String,
    status: String,
    control_name: String,
    test_name: String,
    traffic_split: f64,
    control_visitors: i64,
    control_conversions: i64,
    test_visitors: i64,
    test_conversions: i64,
    winner: Option<String>,
    started_at: String,
    concluded_at: Option<String>,
}

impl From<ExperimentRow> for Experiment {
    fn from(row: ExperimentRow) -> Self {
        Self {
            id: row.id,
            funnel_id: row.funnel_id,
            page_name: row.page_name,
            status: row.status.parse().unwrap_or(ExperimentStatus::Running),
            control_name: row.control_name,
            test_name: row.test_name,
            traffic_split: row.traffic_split,
            control_visitors: row.control_visitors,
            control_conversions: row.control_conversions,
            test_visitors: row.test_visitors,
            test_conversions: row.test_conversions,
            winner: row.winner.and_then(|w| w.parse::<Variant>().ok()),
            started_at: parse_timestamp(&row.started_at),
            concluded_at: row.concluded_at.map(|t| parse_timestamp(&t)),
        }
    }
}

#[derive(sqlx::FromRow)]
struct EventRow {
    id: String,
    funnel_id: String,
    page_name: String,
    session_id: String,
    visitor_id: Option<String>,
    event_type: String,
    value: Option<f64>,
    variant: Option<String>,
    created_at: String,
}

impl From<EventRow> for Event {
    fn from(row: EventRow) -> Self {
        Self {
            id: row.id,
            funnel_id: row.funnel_id,
            page_name: row.page_name,
            session_id: row.session_id,
            visitor_id: row.visitor_id,
            event_type: row.event_type,
            value: row.value,
            variant: row.variant,
            created_at: parse_timestamp(&row.created_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct ImprovementRow {
    id: String,
    funnel_id: String,
    version: i64,
    page_name: String,
    reasoning: String,
    kpi_snapshot: String,
    created_at: String,
}

impl From<ImprovementRow> for ImprovementLog {
    fn from(row: ImprovementRow) -> Self {
        Self {
            id: row.id,
            funnel_id: row.funnel_id,
            version: row.version,
            page_name: row.page_name,
            reasoning: row.reasoning,
            kpi_snapshot: serde_json::from_str(&row.kpi_snapshot)
                .unwrap_or(serde_json::Value::Null),
            created_at: parse_timestamp(&row.created_at),
        }
    }
}
