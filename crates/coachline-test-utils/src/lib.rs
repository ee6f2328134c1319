//! Throwaway coachline databases for integration tests.
//!
//! Every test binary shares one Postgres server. It is the server named by
//! `COACHLINE_TEST_PG_URL` when that is set, otherwise a testcontainers
//! Postgres started on first use. Each test then bootstraps its own
//! database through the same `coachline_db::pool` path `coachline db-init`
//! uses, so tests see the production pool settings and schema.

use sqlx::{Connection, Executor, PgConnection, PgPool};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

use coachline_db::config::DbConfig;
use coachline_db::pool;

/// Server root URL (no database path) of an already-running Postgres.
pub const TEST_PG_URL_ENV: &str = "COACHLINE_TEST_PG_URL";

const TEST_DB_PREFIX: &str = "coachline_test_";
const TEST_POOL_SIZE: u32 = 5;

enum TestServer {
    External(String),
    Container {
        root_url: String,
        _handle: ContainerAsync<Postgres>,
    },
}

impl TestServer {
    fn root_url(&self) -> &str {
        match self {
            Self::External(url) => url,
            Self::Container { root_url, .. } => root_url,
        }
    }

    fn db_config(&self, db_name: &str) -> DbConfig {
        DbConfig::new(format!("{}/{db_name}", self.root_url()))
            .with_max_connections(TEST_POOL_SIZE)
    }
}

static SERVER: OnceCell<TestServer> = OnceCell::const_new();

async fn start_server() -> TestServer {
    if let Ok(url) = std::env::var(TEST_PG_URL_ENV) {
        return TestServer::External(url.trim_end_matches('/').to_owned());
    }

    let handle = Postgres::default()
        .with_tag("17")
        .start()
        .await
        .expect("postgres container should start");
    let host = handle.get_host().await.expect("container host");
    let port = handle
        .get_host_port_ipv4(5432)
        .await
        .expect("container port 5432 should be mapped");

    TestServer::Container {
        root_url: format!("postgresql://postgres:postgres@{host}:{port}"),
        _handle: handle,
    }
}

async fn server() -> &'static TestServer {
    SERVER.get_or_init(start_server).await
}

/// Server root URL of the shared test Postgres.
pub async fn pg_url() -> &'static str {
    server().await.root_url()
}

/// Create a uniquely named, fully migrated database.
///
/// Returns `(pool, db_name)`; hand `db_name` to [`drop_test_db`] at the end
/// of the test.
pub async fn create_test_db() -> (PgPool, String) {
    let db_name = format!("{TEST_DB_PREFIX}{}", Uuid::new_v4().simple());
    let config = server().await.db_config(&db_name);

    let created = pool::ensure_database_exists(&config)
        .await
        .unwrap_or_else(|e| panic!("creating {db_name} failed: {e:#}"));
    assert!(created, "{db_name} already existed");

    let db_pool = pool::create_pool(&config)
        .await
        .unwrap_or_else(|e| panic!("connecting to {db_name} failed: {e:#}"));
    pool::run_migrations(&db_pool)
        .await
        .unwrap_or_else(|e| panic!("migrating {db_name} failed: {e:#}"));

    (db_pool, db_name)
}

/// Drop a database made by [`create_test_db`], disconnecting stragglers.
/// Dropping one that is already gone is fine.
pub async fn drop_test_db(db_name: &str) {
    assert!(
        db_name.starts_with(TEST_DB_PREFIX),
        "refusing to drop non-test database {db_name}"
    );
    let maintenance_url = server().await.db_config(db_name).maintenance_url();
    let mut conn = PgConnection::connect(&maintenance_url)
        .await
        .expect("maintenance database should accept connections");
    conn.execute(format!("DROP DATABASE IF EXISTS {db_name} WITH (FORCE)").as_str())
        .await
        .unwrap_or_else(|e| panic!("dropping {db_name} failed: {e}"));
    let _ = conn.close().await;
}
