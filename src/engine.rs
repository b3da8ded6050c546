//! Database client execution engine.
//!
//! Every statement goes through the vendor client (`ybsql` by default) as
//! a heredoc:
//!
//! ```text
//! ybsql -A -q -t -v ON_ERROR_STOP=1 -X "host=yb89 connect_timeout=10" <<eof
//! SET ybd_query_tags TO 'ybeasy:ybeasy:ybsql(1)';
//! SELECT ...
//! eof
//! ```

use crate::config::{ClientConfig, Config, ConnectionConfig};
use crate::error::{YbError, YbResult};
use crate::executor::{Executor, ShellCommand};
use crate::result::CommandResult;
use crate::transpiler::{recover_return, ProcArgs, Transpiler};
use serde::Serialize;
use tracing::info;

/// Probe run by [`Connection::verify`].
const VERIFY_SQL: &str = "SELECT
    CURRENT_DATABASE() AS db
    , CURRENT_SCHEMA AS schema
    , SPLIT_PART(VERSION(), ' ', 4) AS version
    , SPLIT_PART(version, '-', 1) AS version_number
    , SPLIT_PART(version_number, '.', 1) AS version_major
    , SPLIT_PART(version_number, '.', 2) AS version_minor
    , SPLIT_PART(version_number, '.', 3) AS version_patch
    , rolsuper AS is_super_user
    , CURRENT_USER AS user
FROM pg_catalog.pg_roles
WHERE rolname = CURRENT_USER";

/// What the connected database reports about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DbInfo {
    pub database: String,
    pub schema: String,
    pub version: String,
    pub version_major: u32,
    pub version_minor: u32,
    pub version_patch: u32,
    pub is_super_user: bool,
    pub user: String,
}

impl DbInfo {
    /// Parse the pipe separated row returned by the probe query.
    fn parse(row: &str) -> YbResult<Self> {
        let fields: Vec<&str> = row.trim().split('|').map(str::trim).collect();
        if fields.len() != 9 {
            return Err(YbError::Config(format!(
                "unexpected connection probe output: '{}'",
                row.trim()
            )));
        }
        let number = |s: &str| {
            s.parse::<u32>()
                .map_err(|_| YbError::Config(format!("unexpected version component: '{}'", s)))
        };

        Ok(Self {
            database: fields[0].to_string(),
            schema: fields[1].to_string(),
            version: fields[2].to_string(),
            version_major: number(fields[4])?,
            version_minor: number(fields[5])?,
            version_patch: number(fields[6])?,
            is_super_user: fields[7] == "t",
            user: fields[8].to_string(),
        })
    }

    /// Version as a single comparable number, e.g. 5.2.1 is 50201.
    pub fn version_number(&self) -> u64 {
        u64::from(self.version_major) * 10000
            + u64::from(self.version_minor) * 100
            + u64::from(self.version_patch)
    }
}

/// A database connection made of client settings and an executor.
#[derive(Debug)]
pub struct Connection {
    settings: ConnectionConfig,
    client: ClientConfig,
    util_name: String,
    executor: Executor,
    transpiler: Transpiler,
}

impl Connection {
    /// Create a connection from config. A host is required.
    pub fn new(config: &Config, util_name: impl Into<String>) -> YbResult<Self> {
        if config.connection.host.as_deref().is_none_or(str::is_empty) {
            return Err(YbError::Config(
                "the host database server must be set using the YBHOST environment variable \
                 or in the [connection] host setting"
                    .to_string(),
            ));
        }

        Ok(Self {
            settings: config.connection.clone(),
            client: config.client.clone(),
            util_name: util_name.into(),
            executor: Executor::new(),
            transpiler: Transpiler::new(config.install_dir()),
        })
    }

    pub fn transpiler(&self) -> &Transpiler {
        &self.transpiler
    }

    /// Number of client round trips made so far.
    pub fn call_count(&self) -> u64 {
        self.executor.call_count()
    }

    /// Run SQL through the client.
    pub fn query(&mut self, sql: &str) -> YbResult<CommandResult> {
        let command = self.client_command(sql);
        self.executor.run(&command)
    }

    /// Transpile a stored procedure and run it as an anonymous block.
    ///
    /// The returned result has `proc_return` set from the procedure's
    /// `RETURN` value.
    pub fn call_procedure(
        &mut self,
        procedure: &str,
        args: &ProcArgs,
        pre_sql: &str,
        post_sql: &str,
    ) -> YbResult<CommandResult> {
        let block = self.transpiler.transpile(procedure, args, pre_sql, post_sql)?;
        let result = self.query(&block.sql)?;
        recover_return(result, block.return_type)
    }

    /// Run the connection probe.
    pub fn verify(&mut self) -> YbResult<DbInfo> {
        let result = self.query(VERIFY_SQL)?.into_result()?;
        let info = DbInfo::parse(result.stdout())?;
        // CURRENT_SCHEMA is empty when a configured schema does not exist
        if info.schema.is_empty() {
            return Err(YbError::Config(format!(
                "schema \"{}\" does not exist",
                self.settings.current_schema.as_deref().unwrap_or_default()
            )));
        }
        info!(
            "Connecting to Host: {}, Port: {}, DB User: {}, Super User: {}, Database: {}, Current Schema: {}, YBDB: {}",
            self.settings.host.as_deref().unwrap_or_default(),
            self.settings.port.map(|p| p.to_string()).unwrap_or_default(),
            info.user,
            info.is_super_user,
            info.database,
            info.schema,
            info.version
        );
        Ok(info)
    }

    /// Build the heredoc client invocation for `sql`.
    fn client_command(&self, sql: &str) -> ShellCommand {
        let call_id = self.executor.call_count() + 1;
        let mut statement = format!(
            "SET ybd_query_tags TO '{}:{}:ybsql({})';\n{}",
            self.client.query_tag, self.util_name, call_id, sql
        );
        if let Some(schema) = &self.settings.current_schema {
            statement = format!("SET SCHEMA '{}';\n{}", schema, statement);
        }

        let text = format!(
            "{} {} \"host={} connect_timeout={}\" <<eof\n{}\neof",
            self.client.program,
            self.client.options,
            self.settings.host.as_deref().unwrap_or_default(),
            self.settings.connect_timeout,
            statement
        );

        let env = [
            ("YBHOST", self.settings.host.clone()),
            ("YBPORT", self.settings.port.map(|p| p.to_string())),
            ("YBUSER", self.settings.dbuser.clone()),
            ("YBDATABASE", self.settings.conn_db.clone()),
            ("YBPASSWORD", self.settings.password.clone()),
        ];
        env.into_iter()
            .filter(|(_, value)| value.is_some())
            .fold(ShellCommand::new(text), |cmd, (key, value)| cmd.env(key, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config() -> Config {
        Config::from_toml_str(
            r#"
[connection]
host = "yb89"
dbuser = "dze"
current_schema = "dev"
connect_timeout = 5
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_host_required() {
        assert!(matches!(
            Connection::new(&Config::default(), "t"),
            Err(YbError::Config(_))
        ));
    }

    #[test]
    fn test_client_command() {
        let conn = Connection::new(&config(), "get_table_name").unwrap();
        let cmd = conn.client_command("SELECT 1");
        assert_eq!(
            cmd.text(),
            "ybsql -A -q -t -v ON_ERROR_STOP=1 -X \"host=yb89 connect_timeout=5\" <<eof\n\
             SET SCHEMA 'dev';\n\
             SET ybd_query_tags TO 'ybeasy:get_table_name:ybsql(1)';\n\
             SELECT 1\n\
             eof"
        );
        let expected = ShellCommand::new(cmd.text())
            .env("YBHOST", Some("yb89".into()))
            .env("YBUSER", Some("dze".into()));
        assert_eq!(cmd, expected);
    }

    #[test]
    fn test_db_info_parse() {
        let info = DbInfo::parse("stores|dev|5.2.1-12345|5.2.1|5|2|1|t|dze\n").unwrap();
        assert_eq!(info.database, "stores");
        assert_eq!(info.schema, "dev");
        assert_eq!(info.version, "5.2.1-12345");
        assert_eq!(info.version_number(), 50201);
        assert!(info.is_super_user);
        assert_eq!(info.user, "dze");

        let info = DbInfo::parse("stores|dev|x|x|4294967295|99|99|f|dze").unwrap();
        assert_eq!(info.version_number(), 42_949_672_959_999);

        assert!(DbInfo::parse("stores|dev").is_err());
        assert!(DbInfo::parse("stores|dev|x|x|a|2|1|t|dze").is_err());
    }
}
