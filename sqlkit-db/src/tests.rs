//! Unit tests for the safe `SQLite` wrapper.

use std::time::Duration;

use test_case::test_case;

use super::*;

fn table(sql: &str) -> Connection {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    conn.execute_batch(sql).expect("create table");
    conn
}

#[test]
fn test_open_in_memory() {
    let conn = table("CREATE TABLE t (id INTEGER PRIMARY KEY, val TEXT);");
    conn.execute(
        "INSERT INTO t (id, val) VALUES (?1, ?2)",
        params![Value::Integer(1), Value::from("hello")],
    )
    .expect("insert");
    let result: String = conn
        .query_row("SELECT val FROM t WHERE id = ?1", params![1_i64], |row| {
            row.get(0)
        })
        .expect("query");
    assert_eq!(result, "hello");
}

#[test]
fn test_query_row_optional_none() {
    let conn = table("CREATE TABLE t (id INTEGER PRIMARY KEY);");
    let result = conn
        .query_row_optional("SELECT id FROM t WHERE id = 999", (), |row| {
            row.get::<i64, _>(0)
        })
        .expect("query");
    assert!(result.is_none());
    let err = conn
        .query_row("SELECT id FROM t WHERE id = 999", (), |row| row.get::<i64, _>(0))
        .expect_err("no rows");
    assert_eq!(err, DbError::QueryReturnedNoRows);
}

#[test]
fn test_transaction_commit() {
    let conn = table("CREATE TABLE t (id INTEGER PRIMARY KEY);");
    {
        let tx = conn.transaction().expect("begin tx");
        assert!(!tx.is_autocommit());
        tx.execute("INSERT INTO t (id) VALUES (?1)", params![42_i64])
            .expect("insert");
        tx.commit().expect("commit");
    }
    assert!(conn.is_autocommit());
    let result: i64 = conn
        .query_row("SELECT id FROM t WHERE id = 42", (), |row| row.get(0))
        .expect("query");
    assert_eq!(result, 42);
}

#[test]
fn test_transaction_rollback_on_drop() {
    let conn = table("CREATE TABLE t (id INTEGER PRIMARY KEY);");
    {
        let tx = conn.transaction().expect("begin tx");
        tx.execute("INSERT INTO t (id) VALUES (?1)", params![99_i64])
            .expect("insert");
        // Drop without commit -> rollback
    }
    let result = conn
        .query_row_optional("SELECT id FROM t WHERE id = 99", (), |row| {
            row.get::<i64, _>(0)
        })
        .expect("query");
    assert!(result.is_none());
}

#[test]
fn test_blob_round_trip() {
    let conn = table("CREATE TABLE t (id INTEGER PRIMARY KEY, data BLOB);");
    let data = vec![0xDE, 0xAD, 0xBE, 0xEF];
    conn.execute(
        "INSERT INTO t (id, data) VALUES (?1, ?2)",
        params![1_i64, data.as_slice()],
    )
    .expect("insert");
    let result: Vec<u8> = conn
        .query_row("SELECT data FROM t WHERE id = 1", (), |row| row.get(0))
        .expect("query");
    assert_eq!(result, data);

    let mut stmt = conn.prepare("SELECT data FROM t").expect("prepare");
    let len = stmt
        .query_row((), |row| row.get_blob_slice(0).map(<[u8]>::len))
        .expect("query");
    assert_eq!(len, 4);
}

#[test]
fn test_empty_blob_is_not_null() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    let value: Value = conn
        .query_row("SELECT ?1", params![Vec::<u8>::new()], |row| row.get(0))
        .expect("query");
    assert_eq!(value, Value::Blob(Vec::new()));
}

#[test]
fn test_null_handling() {
    let conn = table("CREATE TABLE t (id INTEGER PRIMARY KEY, val TEXT);");
    conn.execute(
        "INSERT INTO t (id, val) VALUES (?1, ?2)",
        params![1_i64, Null],
    )
    .expect("insert");
    let (as_ref, as_option) = conn
        .query_row("SELECT val FROM t WHERE id = 1", (), |row| {
            Ok((Value::from(row.get_ref(0)?), row.get::<Option<String>, _>(0)?))
        })
        .expect("query");
    assert_eq!(as_ref, Value::Null);
    assert_eq!(as_option, None);

    let err = conn
        .query_row("SELECT val FROM t WHERE id = 1", (), |row| row.get::<String, _>(0))
        .expect_err("null is not text");
    assert_eq!(
        err,
        DbError::InvalidColumnType {
            index: 0,
            expected: Type::Text,
            actual: Type::Null,
        }
    );
}

#[test]
fn test_typed_columns_round_trip() {
    let conn = table("CREATE TABLE t (i INTEGER, r REAL, s TEXT, b BLOB, f INTEGER);");
    conn.execute(
        "INSERT INTO t VALUES (?1, ?2, ?3, ?4, ?5)",
        params![-7_i32, 2.5_f64, "text", [1_u8, 2, 3], true],
    )
    .expect("insert");

    let mut stmt = conn.prepare("SELECT i, r, s, b, f FROM t").expect("prepare");
    stmt.query_row((), |row| {
        assert_eq!(row.column_count(), 5);
        assert_eq!(row.get_int64(0)?, -7);
        assert_eq!(row.get::<i16, _>("i")?, -7);
        assert!((row.get_float64(1)? - 2.5).abs() < f64::EPSILON);
        assert_eq!(row.get_string_slice("S")?, "text");
        assert_eq!(row.get::<Vec<u8>, _>(3)?, vec![1, 2, 3]);
        assert!(row.get_bool(4)?);
        Ok(())
    })
    .expect("query");
}

#[test_case("SELECT 'abc'", Type::Integer, Type::Text ; "text as integer")]
#[test_case("SELECT 1.5", Type::Integer, Type::Real ; "real as integer")]
#[test_case("SELECT X'01'", Type::Integer, Type::Blob ; "blob as integer")]
fn test_integer_column_type_mismatch(sql: &str, expected: Type, actual: Type) {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    let err = conn
        .query_row(sql, (), |row| row.get::<i64, _>(0))
        .expect_err("mismatch");
    assert_eq!(
        err,
        DbError::InvalidColumnType {
            index: 0,
            expected,
            actual,
        }
    );
}

#[test]
fn test_real_column_does_not_read_integer() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    let err = conn
        .query_row("SELECT 1", (), |row| row.get::<f64, _>(0))
        .expect_err("mismatch");
    assert!(matches!(
        err,
        DbError::InvalidColumnType {
            expected: Type::Real,
            actual: Type::Integer,
            ..
        }
    ));
}

#[test]
fn test_out_of_range_and_bad_index() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    let err = conn
        .query_row("SELECT 300", (), |row| row.get::<u8, _>(0))
        .expect_err("out of range");
    assert_eq!(err, DbError::IntegralValueOutOfRange { index: 0, value: 300 });

    let err = conn
        .query_row("SELECT 1", (), |row| row.get::<i64, _>(1))
        .expect_err("bad index");
    assert_eq!(err, DbError::InvalidColumnIndex(1));

    let err = conn
        .query_row("SELECT 1 AS one", (), |row| row.get::<i64, _>("two"))
        .expect_err("bad name");
    assert_eq!(err, DbError::InvalidColumnName("two".to_string()));
}

#[test]
fn test_statement_state_machine() {
    let conn = table(
        "CREATE TABLE t (x INTEGER);
         INSERT INTO t VALUES (1), (2);",
    );
    let mut stmt = conn.prepare("SELECT x FROM t ORDER BY x").expect("prepare");
    assert_eq!(stmt.state(), StatementState::Ready);
    assert!(stmt.row().is_none());

    assert_eq!(stmt.step().expect("step"), StepResult::Row);
    assert_eq!(stmt.state(), StatementState::HasRow);
    let first: i64 = stmt.row().expect("row").get(0).expect("get");
    assert_eq!(first, 1);

    assert_eq!(stmt.step().expect("step"), StepResult::Row);
    assert_eq!(stmt.step().expect("step"), StepResult::Done);
    assert_eq!(stmt.state(), StatementState::Done);
    assert!(stmt.row().is_none());

    stmt.reset().expect("reset");
    assert_eq!(stmt.state(), StatementState::Ready);
    assert_eq!(stmt.step().expect("step"), StepResult::Row);
    stmt.finalize().expect("finalize");
}

#[test]
fn test_reset_preserves_bindings() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    let mut stmt = conn.prepare("SELECT ?1").expect("prepare");
    stmt.bind(1, &5_i64).expect("bind");

    assert_eq!(stmt.step().expect("step"), StepResult::Row);
    let first: i64 = stmt.row().expect("row").get(0).expect("get");
    stmt.reset().expect("reset");
    assert_eq!(stmt.step().expect("step"), StepResult::Row);
    let second: i64 = stmt.row().expect("row").get(0).expect("get");
    assert_eq!((first, second), (5, 5));

    stmt.reset().expect("reset");
    stmt.clear_bindings().expect("clear");
    let cleared: Option<i64> = stmt.query_row((), |row| row.get(0)).expect("query");
    assert_eq!(cleared, None);
}

#[test]
fn test_empty_param_set_keeps_manual_bindings() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    let mut stmt = conn.prepare("SELECT ?1, ?2").expect("prepare");
    stmt.bind(1, "kept").expect("bind");
    stmt.bind(2, &Some(3_u32)).expect("bind");
    let (text, num): (String, u32) = stmt
        .query_row((), |row| Ok((row.get(0)?, row.get(1)?)))
        .expect("query");
    assert_eq!(text, "kept");
    assert_eq!(num, 3);

    // A positional set starts from all-NULL.
    let second: Option<i64> = stmt
        .query_row(params!["replaced"], |row| row.get(1))
        .expect("query");
    assert_eq!(second, None);
}

#[test]
fn test_named_parameters() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    let mut stmt = conn.prepare("SELECT :a, @b, $c").expect("prepare");
    assert_eq!(stmt.parameter_count(), 3);
    assert_eq!(stmt.parameter_index("@b"), Some(2));
    assert_eq!(stmt.parameter_name(3), Some("$c"));

    let all: (i64, String, f64) = stmt
        .query_row(named_params! { ":a": 1_i64, "@b": "two", "$c": 3.0_f64 }, |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })
        .expect("query");
    assert_eq!(all.0, 1);
    assert_eq!(all.1, "two");

    // "@b" was bound by the previous execution but is left out here.
    let partial: (i64, Option<String>) = stmt
        .query_row(named_params! { ":a": 10_i64 }, |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .expect("query");
    assert_eq!(partial, (10, None));

    let err = stmt
        .query_row(named_params! { ":missing": 1_i64 }, |row| row.get::<i64, _>(0))
        .expect_err("unknown name");
    assert_eq!(err, DbError::ParameterNotFound(":missing".to_string()));

    stmt.bind(":a", &7_i64).expect("bind by name");
    let err = stmt.bind("a", &7_i64).expect_err("sigil is part of the name");
    assert_eq!(err, DbError::ParameterNotFound("a".to_string()));
}

#[test]
fn test_bind_out_of_range() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    let mut stmt = conn.prepare("SELECT ?1").expect("prepare");
    for idx in [0_usize, 2] {
        let err = stmt.bind(idx, &1_i64).expect_err("out of range");
        assert_eq!(err.code().map(ErrorCode::primary), Some(25));
    }
}

#[test]
fn test_value_slice_params() {
    let conn = table("CREATE TABLE t (a, b);");
    let values = vec![Value::Integer(1), Value::Text("x".to_string())];
    conn.execute("INSERT INTO t VALUES (?1, ?2)", values.as_slice())
        .expect("insert");
    let b: String = conn
        .query_row("SELECT b FROM t WHERE a = 1", (), |row| row.get(0))
        .expect("query");
    assert_eq!(b, "x");
}

#[test]
fn test_insert_requires_exactly_one_row() {
    let conn = table("CREATE TABLE t (id INTEGER PRIMARY KEY, v INTEGER);");
    let mut insert = conn.prepare("INSERT INTO t (v) VALUES (?1)").expect("prepare");
    assert_eq!(insert.insert(params![10]).expect("insert"), 1);
    assert_eq!(insert.insert(params![20]).expect("insert"), 2);
    assert_eq!(conn.last_insert_rowid(), 2);

    let err = conn
        .prepare("INSERT INTO t (v) SELECT v FROM t WHERE 0")
        .expect("prepare")
        .insert(())
        .expect_err("no rows");
    assert_eq!(err, DbError::WrongRowCount(0));
    assert!(err.to_string().contains("0 rows"));

    let err = conn
        .prepare("INSERT INTO t (v) SELECT v FROM t")
        .expect("prepare")
        .insert(())
        .expect_err("two rows");
    assert_eq!(err, DbError::WrongRowCount(2));
    assert!(err.to_string().contains("2 rows"));
}

#[test]
fn test_execute_reports_changes() {
    let conn = table(
        "CREATE TABLE t (v INTEGER);
         INSERT INTO t VALUES (1), (2), (3);",
    );
    let changed = conn
        .execute("UPDATE t SET v = v + 1 WHERE v > ?1", params![1])
        .expect("update");
    assert_eq!(changed, 2);
    assert_eq!(conn.changes(), 2);
}

#[test]
fn test_execute_rejects_rows() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    let err = conn.execute("SELECT 1", ()).expect_err("select");
    assert_eq!(err, DbError::ExecuteReturnedResults);
}

#[test]
fn test_prepare_single_statement() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    assert!(conn.prepare("SELECT 1;").is_ok());
    assert!(conn.prepare("SELECT 1; -- trailing comment\n  ").is_ok());

    let err = conn.prepare("SELECT 1; SELECT 2;").expect_err("two statements");
    assert_eq!(err, DbError::MultipleStatements);
    let err = conn.prepare("SELECT 1; not sql").expect_err("junk tail");
    assert_eq!(err, DbError::MultipleStatements);

    let err = conn.prepare("  /* nothing */ ").expect_err("empty");
    assert_eq!(err, DbError::EmptyStatement);
    let err = conn.prepare("SELECT 1\0").expect_err("nul");
    assert_eq!(err, DbError::NulInSql);

    let err = conn.prepare("SELEC 1").expect_err("syntax");
    assert_eq!(err.code().map(ErrorCode::primary), Some(1));
    assert!(err.to_string().contains("syntax error"), "{err}");
}

#[test]
fn test_query_row_ignores_extra_rows() {
    let conn = table(
        "CREATE TABLE t (v INTEGER);
         INSERT INTO t VALUES (3), (1), (2);",
    );
    let first: i64 = conn
        .query_row("SELECT v FROM t ORDER BY v", (), |row| row.get(0))
        .expect("query");
    assert_eq!(first, 1);
}

#[test]
fn test_query_map_and_rows() {
    let conn = table(
        "CREATE TABLE t (v INTEGER);
         INSERT INTO t VALUES (1), (2), (3);",
    );
    let mut stmt = conn.prepare("SELECT v FROM t ORDER BY v").expect("prepare");
    let values = stmt
        .query_map((), |row| row.get::<i64, _>(0))
        .expect("query")
        .collect::<DbResult<Vec<_>>>()
        .expect("collect");
    assert_eq!(values, vec![1, 2, 3]);

    let mut sum = 0;
    let mut rows = stmt.query(()).expect("query");
    while let Some(row) = rows.next().expect("next") {
        sum += row.get::<i64, _>(0).expect("get");
    }
    assert!(rows.next().expect("exhausted").is_none());
    drop(rows);
    assert_eq!(sum, 6);
    assert_eq!(stmt.state(), StatementState::Ready);

    // Dropping a cursor early leaves the statement ready to run again.
    {
        let mut rows = stmt.query(()).expect("query");
        assert!(rows.next().expect("next").is_some());
    }
    assert_eq!(stmt.state(), StatementState::Ready);
}

#[test]
fn test_exists() {
    let conn = table(
        "CREATE TABLE t (v INTEGER);
         INSERT INTO t VALUES (1);",
    );
    assert!(conn
        .exists("SELECT 1 FROM t WHERE v = ?1", params![1])
        .expect("exists"));
    assert!(!conn
        .exists("SELECT 1 FROM t WHERE v = ?1", params![2])
        .expect("exists"));
}

#[test]
fn test_statement_introspection() {
    let conn = table("CREATE TABLE t (id INTEGER, name TEXT);");
    let stmt = conn.prepare("SELECT id, name FROM t WHERE id = ?").expect("prepare");
    assert_eq!(stmt.column_count(), 2);
    assert_eq!(stmt.column_names(), vec!["id", "name"]);
    assert_eq!(stmt.column_index("NAME").expect("index"), 1);
    assert_eq!(stmt.column_name(2), Err(DbError::InvalidColumnIndex(2)));
    assert_eq!(stmt.parameter_count(), 1);
    assert_eq!(stmt.parameter_name(1), None);
    assert!(stmt.readonly());
    assert_eq!(stmt.sql(), Some("SELECT id, name FROM t WHERE id = ?"));

    let insert = conn.prepare("INSERT INTO t VALUES (1, 'a')").expect("prepare");
    assert!(!insert.readonly());
    assert_eq!(insert.column_count(), 0);
}

#[test]
fn test_step_error_leaves_statement_reusable() {
    let conn = table("CREATE TABLE t (id INTEGER PRIMARY KEY);");
    let mut insert = conn.prepare("INSERT INTO t (id) VALUES (?1)").expect("prepare");
    insert.execute(params![1]).expect("first insert");
    let err = insert.execute(params![1]).expect_err("duplicate key");
    assert_eq!(err.code().map(ErrorCode::primary), Some(19));
    assert_eq!(insert.state(), StatementState::Ready);
    insert.execute(params![2]).expect("statement still usable");
}

#[test]
fn test_interrupt_handle_outlives_connection() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<InterruptHandle>();

    let conn = Connection::open_in_memory().expect("open in-memory db");
    let handle = conn.interrupt_handle();
    conn.busy_timeout(Duration::from_millis(100))
        .expect("busy timeout");
    conn.close().expect("close");
    handle.interrupt();
}

#[test]
fn test_open_flags() {
    let flags = OpenFlags::default();
    assert!(flags.contains(OpenFlags::READ_WRITE | OpenFlags::CREATE));
    assert!(!flags.contains(OpenFlags::READ_ONLY));

    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("missing.sqlite");
    let err = Connection::open(&missing, OpenFlags::READ_ONLY).expect_err("no file");
    assert_eq!(err.code().map(ErrorCode::primary), Some(14));

    let path = dir.path().join("db.sqlite");
    {
        let conn = Connection::open(&path, OpenFlags::default()).expect("create");
        conn.execute_batch("CREATE TABLE t (v INTEGER); INSERT INTO t VALUES (1);")
            .expect("write");
    }
    let conn = Connection::open(&path, OpenFlags::READ_ONLY).expect("reopen");
    let err = conn
        .execute("INSERT INTO t VALUES (2)", ())
        .expect_err("read only");
    assert_eq!(err.code().map(ErrorCode::primary), Some(8));
}

#[test]
fn test_integrity_check() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    let ok = config::integrity_check(&conn).expect("check");
    assert!(ok);
}
