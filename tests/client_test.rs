//! End-to-end runs against a fake `ybsql` shell script.
#![cfg(unix)]

use pretty_assertions::assert_eq;
use std::path::Path;
use tempfile::TempDir;
use ybeasy::prelude::*;

const CHUNK_PROC: &str = "CREATE OR REPLACE PROCEDURE chunk_p(
    a_table VARCHAR(128)
    , a_chunk_size BIGINT DEFAULT 1000000
    , a_dry_run BOOLEAN DEFAULT FALSE)
    RETURNS BOOLEAN
    LANGUAGE plpgsql
    AS $$
DECLARE
    v_rows BIGINT := 0;
BEGIN
    RAISE INFO 'chunking %', a_table;
    RETURN NOT a_dry_run;
END $$;
";

struct Install {
    dir: TempDir,
}

impl Install {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sql")).unwrap();
        std::fs::write(dir.path().join("sql").join("chunk_p.sql"), CHUNK_PROC).unwrap();
        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Connection whose client is `sh <script>` with the given body.
    fn connection(&self, script: &str) -> Connection {
        let script_path = self.path().join("fake_ybsql.sh");
        std::fs::write(&script_path, script).unwrap();

        let config = Config::from_toml_str(&format!(
            r#"
[connection]
host = "yb89"
dbuser = "dze"

[client]
program = "sh {}"

[paths]
install_dir = "{}"
"#,
            script_path.display(),
            self.path().display()
        ))
        .unwrap();
        Connection::new(&config, "itest").unwrap()
    }
}

#[test]
fn test_query_sends_heredoc_with_tags() {
    let install = Install::new();
    let mut conn = install.connection("cat\n");

    let first = conn.query("SELECT '$1' AS dollars").unwrap();
    assert_eq!(
        first.stdout(),
        "SET ybd_query_tags TO 'ybeasy:itest:ybsql(1)';\nSELECT '$1' AS dollars\n"
    );
    assert_eq!(first.exit_code(), 0);

    let second = conn.query("SELECT 2").unwrap();
    assert!(second.stdout().starts_with("SET ybd_query_tags TO 'ybeasy:itest:ybsql(2)';"));
    assert_eq!(conn.call_count(), 2);
}

#[test]
fn test_client_environment() {
    let install = Install::new();
    let mut conn = install.connection("echo \"$YBHOST/$YBUSER\"\n");
    let result = conn.query("SELECT 1").unwrap();
    assert_eq!(result.stdout(), "yb89/dze\n");
}

#[test]
fn test_call_procedure_recovers_return() {
    let install = Install::new();
    let mut conn = install.connection(
        "cat\necho 'INFO:  chunking sales' 1>&2\necho 'INFO:  >!>RETURN<!<:t' 1>&2\n",
    );
    let args = ProcArgs::from([("a_table".to_string(), ArgValue::from("sales"))]);

    let result = conn.call_procedure("chunk_p", &args, "", "").unwrap();

    assert_eq!(result.proc_return(), Some(ProcReturn::Bool(true)));
    assert_eq!(result.stderr(), "");
    assert!(result.stdout().contains("--proc: chunk_p\nDO $$\nDECLARE\n"));
    assert!(result.stdout().contains("    a_table VARCHAR(128) = $A$sales$A$;\n"));
    assert!(result.stdout().contains("    a_chunk_size BIGINT = 1000000;\n"));
    assert!(result.stdout().contains("    a_dry_run BOOLEAN = FALSE;\n"));
    assert!(result.stdout().contains("RAISE INFO '>!>RETURN<!<:%', NOT a_dry_run;"));
    assert!(result.stdout().ends_with("chunking sales\n"));
}

#[test]
fn test_call_procedure_null_return() {
    let install = Install::new();
    let mut conn = install.connection("echo 'INFO:  >!>RETURN<!<:<NULL>' 1>&2\n");
    let args = ProcArgs::from([("a_table".to_string(), ArgValue::from("sales"))]);

    let result = conn.call_procedure("chunk_p", &args, "", "").unwrap();
    assert_eq!(result.proc_return(), None);
}

#[test]
fn test_call_procedure_client_error() {
    let install = Install::new();
    let mut conn = install.connection("echo 'ERROR:  relation \"sales\" does not exist' 1>&2\nexit 3\n");
    let args = ProcArgs::from([("a_table".to_string(), ArgValue::from("sales"))]);

    let err = conn.call_procedure("chunk_p", &args, "", "").unwrap_err();
    assert_eq!(err.exit_code(), 3);
    assert!(err.to_string().contains("does not exist"));
}

#[test]
fn test_call_unknown_procedure() {
    let install = Install::new();
    let mut conn = install.connection("cat\n");
    assert!(matches!(
        conn.call_procedure("missing_p", &ProcArgs::new(), "", ""),
        Err(YbError::ReadFile { .. })
    ));
    assert_eq!(conn.call_count(), 0);
}

#[test]
fn test_verify() {
    let install = Install::new();
    let mut conn = install.connection("echo 'stores|dev|5.2.1-12345|5.2.1|5|2|1|f|dze'\n");
    let info = conn.verify().unwrap();
    assert_eq!(info.database, "stores");
    assert_eq!(info.schema, "dev");
    assert_eq!(info.version_number(), 50201);
    assert!(!info.is_super_user);
}

#[test]
fn test_verify_missing_schema() {
    let install = Install::new();
    let mut conn = install.connection("echo 'stores||5.2.1-12345|5.2.1|5|2|1|f|dze'\n");
    assert!(matches!(conn.verify(), Err(YbError::Config(_))));
}
