//! [`ProbeBackend`] implementation that opens real short-lived MySQL sessions.
use std::time::Duration;

use anyhow::Result;
use sqlx::mysql::MySqlConnectOptions;
use sqlx::mysql::MySqlRow;
use sqlx::ConnectOptions;
use sqlx::Row;

use mha_context::Context;

use crate::backend::ProbeBackend;
use crate::outcome::FailureReason;
use crate::outcome::HealthOutcome;
use crate::outcome::ReplicationStatus;

/// Opens one connection per probe call and drops it immediately after; probes never share
/// or pool connections, since the spec requires each probe to be an independent, bounded SQL
/// session rather than reuse a long-lived handle.
pub struct MysqlProbe {
    username: String,
    password: String,
    timeout: Duration,
}

impl MysqlProbe {
    pub fn new(username: impl Into<String>, password: impl Into<String>, timeout: Duration) -> Self {
        MysqlProbe {
            username: username.into(),
            password: password.into(),
            timeout,
        }
    }

    fn connect_options(&self, host: &str, port: u16) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(host)
            .port(port)
            .username(&self.username)
            .password(&self.password)
    }

    async fn connect(&self, host: &str, port: u16) -> std::result::Result<sqlx::MySqlConnection, FailureReason> {
        let options = self.connect_options(host, port);
        match tokio::time::timeout(self.timeout, options.connect()).await {
            Err(_) => Err(FailureReason::Timeout),
            Ok(Err(error)) => Err(classify_connect_error(&error)),
            Ok(Ok(connection)) => Ok(connection),
        }
    }
}

fn classify_connect_error(error: &sqlx::Error) -> FailureReason {
    match error {
        sqlx::Error::Database(db_error) => {
            // MySQL error 1045 is ER_ACCESS_DENIED_ERROR.
            if db_error.code().as_deref() == Some("1045") {
                FailureReason::Auth
            } else {
                FailureReason::Unreachable(db_error.to_string())
            }
        }
        sqlx::Error::Io(io_error) => FailureReason::Unreachable(io_error.to_string()),
        other => FailureReason::Unreachable(other.to_string()),
    }
}

#[async_trait::async_trait]
impl ProbeBackend for MysqlProbe {
    async fn probe_health(&self, context: &Context, host: &str, port: u16) -> Result<HealthOutcome> {
        let mut connection = match self.connect(host, port).await {
            Err(reason) => {
                slog::debug!(
                    context.logger, "Node probe failed";
                    "host" => host, "port" => port, "reason" => %reason,
                );
                return Ok(HealthOutcome::Failed(reason));
            }
            Ok(connection) => connection,
        };

        let query = sqlx::query("SELECT 1");
        let result = tokio::time::timeout(self.timeout, query.execute(&mut connection)).await;
        let _ = sqlx::Connection::close(connection).await;
        match result {
            Err(_) => Ok(HealthOutcome::Failed(FailureReason::Timeout)),
            Ok(Err(error)) => Ok(HealthOutcome::Failed(classify_connect_error(&error))),
            Ok(Ok(_)) => Ok(HealthOutcome::Online),
        }
    }

    async fn probe_replication(
        &self,
        context: &Context,
        host: &str,
        port: u16,
    ) -> Result<ReplicationStatus> {
        let mut connection = match self.connect(host, port).await {
            Err(reason) => {
                slog::debug!(
                    context.logger, "Replication probe failed to connect";
                    "host" => host, "port" => port, "reason" => %reason,
                );
                return Ok(ReplicationStatus::default());
            }
            Ok(connection) => connection,
        };

        let row = tokio::time::timeout(
            self.timeout,
            sqlx::query("SHOW REPLICA STATUS").fetch_optional(&mut connection),
        )
        .await;
        let _ = sqlx::Connection::close(connection).await;

        let row = match row {
            Err(_) | Ok(Err(_)) => return Ok(ReplicationStatus::default()),
            Ok(Ok(None)) => return Ok(ReplicationStatus::default()),
            Ok(Ok(Some(row))) => row,
        };
        Ok(parse_replica_status(&row))
    }

    async fn probe_write_position(&self, _context: &Context, host: &str, port: u16) -> Result<String> {
        let mut connection = match self.connect(host, port).await {
            Err(_) => return Ok(String::new()),
            Ok(connection) => connection,
        };
        let row = tokio::time::timeout(
            self.timeout,
            sqlx::query("SHOW MASTER STATUS").fetch_optional(&mut connection),
        )
        .await;
        let _ = sqlx::Connection::close(connection).await;
        let gtid = match row {
            Err(_) | Ok(Err(_)) | Ok(Ok(None)) => String::new(),
            Ok(Ok(Some(row))) => column_str(&row, "Executed_Gtid_Set").unwrap_or_default(),
        };
        Ok(gtid)
    }
}

fn column_str(row: &MySqlRow, name: &str) -> Option<String> {
    row.try_get::<String, _>(name).ok()
}

fn parse_replica_status(row: &MySqlRow) -> ReplicationStatus {
    let io_running = column_str(row, "Replica_IO_Running")
        .or_else(|| column_str(row, "Slave_IO_Running"))
        .map(|value| value.eq_ignore_ascii_case("yes"))
        .unwrap_or(false);
    let sql_running = column_str(row, "Replica_SQL_Running")
        .or_else(|| column_str(row, "Slave_SQL_Running"))
        .map(|value| value.eq_ignore_ascii_case("yes"))
        .unwrap_or(false);
    let lag = column_str(row, "Seconds_Behind_Source")
        .or_else(|| column_str(row, "Seconds_Behind_Master"))
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_secs);
    let gtid = column_str(row, "Executed_Gtid_Set").unwrap_or_default();

    ReplicationStatus {
        io_running,
        sql_running,
        lag,
        gtid,
    }
}
