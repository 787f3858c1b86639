//! [`ProxyAdminBackend`] implementation that drives a real ProxySQL-style administrative
//! session over SQL.
use anyhow::Result;
use sqlx::mysql::MySqlConnectOptions;
use sqlx::ConnectOptions;
use sqlx::Connection;
use sqlx::Executor;
use sqlx::MySqlConnection;

use mha_context::Context;
use mha_errors::ProxyUnavailable;

use crate::backend::ProxyAdminBackend;
use crate::server::RoutedServer;

/// Wrap a transport-level ProxySQL admin failure as a [`ProxyUnavailable`], with `message`
/// attached as the operation that failed.
fn proxy_unavailable(message: &'static str, error: sqlx::Error) -> anyhow::Error {
    ProxyUnavailable::new(anyhow::Error::new(error).context(message)).into()
}

/// Administrative session parameters. The connection is reopened on every publish: the spec
/// calls for no long-lived shared handle to the proxy's admin interface.
pub struct SqlProxyAdmin {
    host: String,
    port: u16,
    username: String,
    password: String,
    writer_hostgroup: u16,
    reader_hostgroup: u16,
}

impl SqlProxyAdmin {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
        writer_hostgroup: u16,
        reader_hostgroup: u16,
    ) -> Self {
        SqlProxyAdmin {
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
            writer_hostgroup,
            reader_hostgroup,
        }
    }

    async fn connect(&self) -> Result<MySqlConnection> {
        let options = MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .password(&self.password);
        options
            .connect()
            .await
            .map_err(|error| proxy_unavailable("failed to open ProxySQL admin session", error))
    }

    async fn clear_hostgroup(connection: &mut MySqlConnection, hostgroup: u16) -> Result<()> {
        let query = format!("DELETE FROM mysql_servers WHERE hostgroup_id = {}", hostgroup);
        connection
            .execute(query.as_str())
            .await
            .map_err(|error| proxy_unavailable("failed to clear hostgroup", error))?;
        Ok(())
    }

    async fn insert_server(
        connection: &mut MySqlConnection,
        hostgroup: u16,
        server: &RoutedServer,
    ) -> Result<()> {
        let query = sqlx::query(
            "INSERT INTO mysql_servers (hostgroup_id, hostname, port) VALUES (?, ?, ?)",
        )
        .bind(hostgroup)
        .bind(&server.host)
        .bind(server.port);
        connection
            .execute(query)
            .await
            .map_err(|error| proxy_unavailable("failed to insert server row", error))?;
        Ok(())
    }

    async fn commit(connection: &mut MySqlConnection) -> Result<()> {
        connection
            .execute("LOAD MYSQL SERVERS TO RUNTIME")
            .await
            .map_err(|error| proxy_unavailable("failed to load servers to runtime", error))?;
        connection
            .execute("SAVE MYSQL SERVERS TO DISK")
            .await
            .map_err(|error| proxy_unavailable("failed to save servers to disk", error))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl ProxyAdminBackend for SqlProxyAdmin {
    async fn initialize(&self, context: &Context) -> Result<()> {
        let mut connection = self.connect().await?;
        connection
            .execute("SET mysql-monitor_connect_interval = 2000")
            .await
            .map_err(|error| proxy_unavailable("failed to set monitor connect interval", error))?;
        connection
            .execute("SET mysql-monitor_ping_interval = 2000")
            .await
            .map_err(|error| proxy_unavailable("failed to set monitor ping interval", error))?;
        connection
            .execute("SET mysql-monitor_read_only_interval = 2000")
            .await
            .map_err(|error| {
                proxy_unavailable("failed to set monitor read-only interval", error)
            })?;
        connection
            .execute("SET mysql-max_connections = 2000")
            .await
            .map_err(|error| proxy_unavailable("failed to set connection cap", error))?;
        connection
            .execute("LOAD MYSQL VARIABLES TO RUNTIME")
            .await
            .map_err(|error| {
                proxy_unavailable("failed to load global variables to runtime", error)
            })?;

        let writer_rule = format!(
            "INSERT INTO mysql_query_rules (active, match_pattern, destination_hostgroup, apply) \
             VALUES (1, '^SELECT.*FOR UPDATE', {}, 1)",
            self.writer_hostgroup
        );
        let reader_rule = format!(
            "INSERT INTO mysql_query_rules (active, match_pattern, destination_hostgroup, apply) \
             VALUES (1, '^SELECT', {}, 1)",
            self.reader_hostgroup
        );
        connection
            .execute(writer_rule.as_str())
            .await
            .map_err(|error| proxy_unavailable("failed to install writer query rule", error))?;
        connection
            .execute(reader_rule.as_str())
            .await
            .map_err(|error| proxy_unavailable("failed to install reader query rule", error))?;
        connection
            .execute("LOAD MYSQL QUERY RULES TO RUNTIME")
            .await
            .map_err(|error| proxy_unavailable("failed to load query rules to runtime", error))?;
        connection
            .execute("SAVE MYSQL QUERY RULES TO DISK")
            .await
            .map_err(|error| proxy_unavailable("failed to save query rules to disk", error))?;

        let _ = Connection::close(connection).await;
        slog::info!(context.logger, "Initialized ProxySQL admin interface");
        Ok(())
    }

    async fn publish_empty(&self, context: &Context) -> Result<()> {
        let mut connection = self.connect().await?;
        Self::clear_hostgroup(&mut connection, self.writer_hostgroup).await?;
        Self::clear_hostgroup(&mut connection, self.reader_hostgroup).await?;
        Self::commit(&mut connection).await?;
        let _ = Connection::close(connection).await;
        slog::debug!(context.logger, "Published empty routing table");
        Ok(())
    }

    async fn publish_routing(
        &self,
        context: &Context,
        master: RoutedServer,
        slaves: Vec<RoutedServer>,
    ) -> Result<()> {
        let mut connection = self.connect().await?;
        Self::clear_hostgroup(&mut connection, self.writer_hostgroup).await?;
        Self::insert_server(&mut connection, self.writer_hostgroup, &master).await?;
        Self::clear_hostgroup(&mut connection, self.reader_hostgroup).await?;
        for slave in &slaves {
            Self::insert_server(&mut connection, self.reader_hostgroup, slave).await?;
        }
        Self::commit(&mut connection).await?;
        let _ = Connection::close(connection).await;
        slog::debug!(
            context.logger, "Published routing table";
            "master" => %master.host, "slaves" => slaves.len(),
        );
        Ok(())
    }
}
