use super::*;
use crate::db::dialect::Dialect;
use crate::error::ScriptError;
use std::fs;

/// Helper to split a script and keep only the statement texts
fn split(sql: &str, dialect: Dialect) -> Vec<String> {
    ScriptParser::split(sql, dialect)
        .texts()
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn oracle(sql: &str) -> Vec<String> {
    split(sql, Dialect::Oracle)
}

#[test]
fn test_simple_select_every_dialect() {
    for dialect in Dialect::all() {
        let stmts = split("SELECT 1;", dialect);
        assert_eq!(stmts.len(), 1, "{}: got {:?}", dialect, stmts);
        assert!(stmts[0].contains("SELECT 1"));
        assert_eq!(stmts[0], "SELECT 1;");
    }
}

#[test]
fn test_multiple_selects() {
    let stmts = oracle("SELECT 1 FROM DUAL;\nSELECT 2 FROM DUAL;");
    assert_eq!(stmts, vec!["SELECT 1 FROM DUAL;", "SELECT 2 FROM DUAL;"]);
}

#[test]
fn test_sequence_indices_are_contiguous() {
    let result = ScriptParser::split("SELECT 1;\n\nSELECT 2;\nSELECT 3;", Dialect::MySql);
    let indices: Vec<usize> = result.iter().map(|s| s.index).collect();
    assert_eq!(indices, vec![1, 2, 3]);
    assert_eq!(result.get(2), Some("SELECT 2;"));
    assert_eq!(result.get(0), None);
    assert_eq!(result.get(4), None);
}

#[test]
fn test_double_semicolon() {
    let stmts = oracle("SELECT 1 FROM DUAL;;");
    assert_eq!(stmts.len(), 1, "Should have 1 statement, got: {:?}", stmts);
    assert!(
        !stmts[0].ends_with(";;"),
        "Should not end with ;;: {}",
        stmts[0]
    );
}

#[test]
fn test_plsql_script_with_slash_terminators() {
    let sql = "-- Drop the function if it exists
BEGIN
   EXECUTE IMMEDIATE 'DROP FUNCTION hr.get_employee_info';
EXCEPTION
   WHEN OTHERS THEN
      IF SQLCODE != -4043 THEN
         RAISE;
      END IF;
END;
/

CREATE OR REPLACE FUNCTION hr.get_employee_info(p_emp_id IN NUMBER)
RETURN VARCHAR2 AS
    v_result VARCHAR2(200);
BEGIN
    SELECT first_name || ' ' || last_name
    INTO v_result
    FROM hr.employees
    WHERE employee_id = p_emp_id;
    RETURN v_result;
EXCEPTION
    WHEN NO_DATA_FOUND THEN
        RETURN NULL;
END;
/

GRANT EXECUTE ON hr.get_employee_info TO PUBLIC;
";
    let stmts = oracle(sql);
    assert_eq!(stmts.len(), 3, "Should have 3 statements, got: {:?}", stmts);

    assert!(stmts[0].starts_with("BEGIN"));
    assert!(stmts[0].contains("EXCEPTION"));
    assert!(stmts[0].ends_with("END;"));
    assert!(!stmts[0].contains("Drop the function"));

    assert!(stmts[1].starts_with("CREATE OR REPLACE FUNCTION"));
    assert!(stmts[1].contains("RETURN v_result;"));
    assert!(stmts[1].ends_with("END;"));
    assert!(!stmts[1].contains('/'));

    assert_eq!(stmts[2], "GRANT EXECUTE ON hr.get_employee_info TO PUBLIC;");
}

#[test]
fn test_nested_begin_end_is_one_statement() {
    let sql = "CREATE OR REPLACE PROCEDURE test_proc AS
BEGIN
    BEGIN
        NULL;
    END;
END;
/
";
    let stmts = oracle(sql);
    assert_eq!(stmts.len(), 1, "Should have 1 statement, got: {:?}", stmts);
    assert_eq!(stmts[0].matches("BEGIN").count(), 2);
    assert_eq!(stmts[0].matches("END;").count(), 2);
}

#[test]
fn test_anonymous_block_without_slash_at_eof() {
    let stmts = oracle("DECLARE x NUMBER; BEGIN x := 1; END;");
    assert_eq!(stmts.len(), 1, "Should have 1 statement, got: {:?}", stmts);
    assert_eq!(stmts[0], "DECLARE x NUMBER; BEGIN x := 1; END;");
}

#[test]
fn test_slash_inside_open_block_is_text() {
    let sql = "BEGIN\n  x := 10\n/\n2;\nEND;\n/\n";
    let stmts = oracle(sql);
    assert_eq!(stmts.len(), 1, "got: {:?}", stmts);
    assert!(stmts[0].contains("x := 10\n/\n2;"));
}

#[test]
fn test_slash_terminates_plain_statement() {
    let stmts = oracle("SELECT 1 FROM dual\n/\nSELECT 2 FROM dual;");
    assert_eq!(stmts, vec!["SELECT 1 FROM dual", "SELECT 2 FROM dual;"]);
}

#[test]
fn test_mixed_script() {
    let sql = "CREATE TABLE t (id NUMBER, name VARCHAR2(50));

INSERT INTO t VALUES (1, 'one');
INSERT INTO t VALUES (2, 'it''s; two');

BEGIN
    UPDATE t SET name = UPPER(name);
    COMMIT;
END;
/
";
    let stmts = oracle(sql);
    assert_eq!(stmts.len(), 4, "got: {:?}", stmts);
    assert_eq!(stmts[1], "INSERT INTO t VALUES (1, 'one');");
    assert_eq!(stmts[2], "INSERT INTO t VALUES (2, 'it''s; two');");
    assert!(stmts[3].starts_with("BEGIN"));
}

#[test]
fn test_multiline_comment_is_stripped() {
    let sql = "/*
 * Header comment
 */
SELECT 1 FROM dual; /* trailing */
-- line comment
SELECT 2 FROM dual;";
    let stmts = oracle(sql);
    assert_eq!(stmts, vec!["SELECT 1 FROM dual;", "SELECT 2 FROM dual;"]);
}

#[test]
fn test_nested_block_comment() {
    let stmts = oracle("/* Outer /* Inner */ still outer */ SELECT 1 FROM dual;");
    assert_eq!(stmts, vec!["SELECT 1 FROM dual;"]);

    let deep = "/* a /* b /* c */ b */ a */SELECT 2;/* x /* y */ */";
    assert_eq!(split(deep, Dialect::PostgreSql), vec!["SELECT 2;"]);
}

#[test]
fn test_unclosed_comment_yields_nothing() {
    let stmts = oracle("/* unterminated\nSELECT 1 FROM dual;\n");
    assert!(stmts.is_empty(), "got: {:?}", stmts);
}

#[test]
fn test_unclosed_comment_keeps_earlier_statements() {
    let stmts = split("SELECT 1;\n/* never closed\nSELECT 2;", Dialect::MySql);
    assert_eq!(stmts, vec!["SELECT 1;"]);
}

#[test]
fn test_unclosed_string_discards_fragment() {
    let stmts = split("SELECT 1;\nSELECT 'open;\n", Dialect::PostgreSql);
    assert_eq!(stmts, vec!["SELECT 1;"]);
}

#[test]
fn test_literals_hide_delimiters() {
    let sql = "SELECT 'a;b', '/* not a comment */', '-- nor this' FROM dual;\nSELECT \"odd;name\" FROM t;";
    let stmts = oracle(sql);
    assert_eq!(stmts.len(), 2, "got: {:?}", stmts);
    assert!(stmts[0].contains("'/* not a comment */'"));
    assert!(stmts[0].contains("'-- nor this'"));
    assert_eq!(stmts[1], "SELECT \"odd;name\" FROM t;");
}

#[test]
fn test_doubled_quotes_stay_in_literal() {
    let stmts = split("SELECT 'O''Brien; Jr' FROM t;SELECT 2;", Dialect::SqlServer);
    assert_eq!(stmts, vec!["SELECT 'O''Brien; Jr' FROM t;", "SELECT 2;"]);
}

#[test]
fn test_line_comment_does_not_close_statement() {
    let stmts = split("SELECT a, -- first\n b FROM t;", Dialect::MySql);
    assert_eq!(stmts, vec!["SELECT a,  b FROM t;"]);
}

#[test]
fn test_comment_between_tokens_leaves_gap() {
    let stmts = split("SELECT/*x*/1;\nSELECT 2--tail\nFROM t;", Dialect::PostgreSql);
    assert_eq!(stmts, vec!["SELECT 1;", "SELECT 2 FROM t;"]);
}

#[test]
fn test_internal_formatting_preserved() {
    let sql = "  SELECT id,\n         name\n    FROM t\n   WHERE id = 1;  \n\n";
    let stmts = split(sql, Dialect::PostgreSql);
    assert_eq!(stmts, vec!["SELECT id,\n         name\n    FROM t\n   WHERE id = 1;"]);
}

#[test]
fn test_trailing_fragment_without_terminator_is_emitted() {
    let stmts = split("SELECT 1;\nSELECT 2", Dialect::MySql);
    assert_eq!(stmts, vec!["SELECT 1;", "SELECT 2"]);
}

#[test]
fn test_whitespace_and_comments_only() {
    for dialect in Dialect::all() {
        assert!(split("", dialect).is_empty());
        assert!(split("  \n\t\n", dialect).is_empty());
        assert!(split("-- just a note\n/* and another */\n", dialect).is_empty());
        assert!(split(";\n;", dialect).is_empty());
    }
}

#[test]
fn test_scan_is_idempotent() {
    let sql = "BEGIN NULL; END;\n/\nSELECT 'x;y' FROM dual; -- c\nSELECT 2 FROM dual;";
    for dialect in Dialect::all() {
        let first = ScriptParser::split(sql, dialect);
        let second = ScriptParser::split(sql, dialect);
        assert_eq!(first, second, "{} should be deterministic", dialect);
    }
}

#[test]
fn test_scan_rejects_absent_text() {
    assert!(matches!(
        ScriptParser::scan(None, Dialect::Oracle),
        Err(ScriptError::MalformedInput(_))
    ));
    let result = ScriptParser::scan(Some("SELECT 1;"), Dialect::Oracle).unwrap();
    assert_eq!(result.len(), 1);
}

#[test]
fn test_case_expression_inside_block() {
    let sql = "BEGIN
    v := CASE WHEN a = 1 THEN 'one' ELSE 'other' END;
    CASE v
        WHEN 'one' THEN NULL;
    END CASE;
END;
/
SELECT 1 FROM dual;";
    let stmts = oracle(sql);
    assert_eq!(stmts.len(), 2, "got: {:?}", stmts);
    assert!(stmts[0].ends_with("END;"));
}

#[test]
fn test_end_if_and_loop_do_not_close_block() {
    let sql = "CREATE PROCEDURE p()
BEGIN
    IF x > 1 THEN
        SET x = 1;
    END IF;
    WHILE x < 10 DO
        SET x = x + 1;
    END WHILE;
END;
SELECT 2;";
    let stmts = split(sql, Dialect::MySql);
    assert_eq!(stmts.len(), 2, "got: {:?}", stmts);
    assert!(stmts[0].starts_with("CREATE PROCEDURE p()"));
    assert!(stmts[0].ends_with("END;"));
    assert_eq!(stmts[1], "SELECT 2;");
}

#[test]
fn test_oracle_loop_inside_procedure() {
    let sql = "CREATE OR REPLACE PROCEDURE fill AS
BEGIN
    FOR i IN 1..10 LOOP
        INSERT INTO t VALUES (i);
    END LOOP;
END fill;
/
";
    let stmts = oracle(sql);
    assert_eq!(stmts.len(), 1, "got: {:?}", stmts);
    assert!(stmts[0].ends_with("END fill;"));
}

#[test]
fn test_postgres_dollar_quoted_function() {
    let sql = "CREATE OR REPLACE FUNCTION add_one(i integer) RETURNS integer AS $$
BEGIN
    RETURN i + 1; -- inside body
END;
$$ LANGUAGE plpgsql;
SELECT add_one(1);";
    let stmts = split(sql, Dialect::PostgreSql);
    assert_eq!(stmts.len(), 2, "got: {:?}", stmts);
    assert!(stmts[0].contains("RETURN i + 1; -- inside body"));
    assert!(stmts[0].ends_with("LANGUAGE plpgsql;"));
    assert_eq!(stmts[1], "SELECT add_one(1);");
}

#[test]
fn test_postgres_do_block_with_tag() {
    let sql = "DO $body$ BEGIN RAISE NOTICE 'Hello; world'; END $body$;\nSELECT 1;";
    let stmts = split(sql, Dialect::PostgreSql);
    assert_eq!(
        stmts,
        vec![
            "DO $body$ BEGIN RAISE NOTICE 'Hello; world'; END $body$;",
            "SELECT 1;"
        ]
    );
}

#[test]
fn test_postgres_begin_is_transaction() {
    let stmts = split("BEGIN;\nUPDATE t SET x = 1;\nCOMMIT;", Dialect::PostgreSql);
    assert_eq!(stmts, vec!["BEGIN;", "UPDATE t SET x = 1;", "COMMIT;"]);
}

#[test]
fn test_postgres_positional_params_are_not_quotes() {
    let stmts = split("SELECT $1, $2;\nSELECT 3;", Dialect::PostgreSql);
    assert_eq!(stmts, vec!["SELECT $1, $2;", "SELECT 3;"]);
}

#[test]
fn test_dollar_is_plain_text_outside_postgres() {
    let stmts = split("SELECT $$;\nSELECT 2;", Dialect::MySql);
    assert_eq!(stmts, vec!["SELECT $$;", "SELECT 2;"]);
}

#[test]
fn test_oracle_q_quote() {
    let sql = "SELECT q'[it's; /* fine */]' FROM dual;\nSELECT nq'{x;y}' FROM dual;";
    let stmts = oracle(sql);
    assert_eq!(
        stmts,
        vec![
            "SELECT q'[it's; /* fine */]' FROM dual;",
            "SELECT nq'{x;y}' FROM dual;"
        ]
    );
}

#[test]
fn test_sqlserver_block_and_transaction() {
    let sql = "BEGIN TRANSACTION;
UPDATE accounts SET balance = 0;
COMMIT;
CREATE PROCEDURE dbo.reset AS
BEGIN
    UPDATE accounts SET balance = 0;
END;
SELECT 1;";
    let stmts = split(sql, Dialect::SqlServer);
    assert_eq!(stmts.len(), 5, "got: {:?}", stmts);
    assert_eq!(stmts[0], "BEGIN TRANSACTION;");
    assert!(stmts[3].starts_with("CREATE PROCEDURE dbo.reset AS"));
    assert!(stmts[3].ends_with("END;"));
    assert_eq!(stmts[4], "SELECT 1;");
}

#[test]
fn test_mysql_nested_begin() {
    let sql = "CREATE DEFINER=`root`@`localhost` PROCEDURE p()
BEGIN
    BEGIN
        SELECT 1;
    END;
    SELECT 2;
END;
SELECT 3;";
    let stmts = split(sql, Dialect::MySql);
    assert_eq!(stmts.len(), 2, "got: {:?}", stmts);
    assert_eq!(stmts[1], "SELECT 3;");
}

#[test]
fn test_mysql_backslash_escape_stays_in_literal() {
    let sql = "INSERT INTO t VALUES ('it\\'s; fine');\nSELECT 2;\n";
    let stmts = split(sql, Dialect::MySql);
    assert_eq!(
        stmts,
        vec!["INSERT INTO t VALUES ('it\\'s; fine');", "SELECT 2;"]
    );

    let stmts = split("SELECT \"a\\\"; b\", 'c\\\\';\nSELECT 3;", Dialect::MySql);
    assert_eq!(stmts.len(), 2, "got: {:?}", stmts);
    assert_eq!(stmts[1], "SELECT 3;");
}

#[test]
fn test_backslash_is_literal_outside_mysql() {
    let stmts = oracle("SELECT 'C:\\temp\\' FROM dual;\nSELECT 2 FROM dual;");
    assert_eq!(
        stmts,
        vec!["SELECT 'C:\\temp\\' FROM dual;", "SELECT 2 FROM dual;"]
    );
    let stmts = split("SELECT 'a\\'; SELECT 2;", Dialect::PostgreSql);
    assert_eq!(stmts, vec!["SELECT 'a\\';", "SELECT 2;"]);
}

#[test]
fn test_mysql_backtick_identifier() {
    let stmts = split("SELECT `a;b` FROM t;\nSELECT `x``;` FROM u;", Dialect::MySql);
    assert_eq!(stmts, vec!["SELECT `a;b` FROM t;", "SELECT `x``;` FROM u;"]);
}

#[test]
fn test_sqlserver_bracket_identifier() {
    let stmts = split("SELECT [a;b] FROM t;\nSELECT [x]];y] FROM u;", Dialect::SqlServer);
    assert_eq!(stmts, vec!["SELECT [a;b] FROM t;", "SELECT [x]];y] FROM u;"]);

    let stmts = split("SELECT [a;b] FROM t;", Dialect::Oracle);
    assert_eq!(stmts.len(), 2, "brackets are not identifier quotes in Oracle: {:?}", stmts);
}

#[test]
fn test_unclosed_identifier_discards_fragment() {
    let stmts = split("SELECT 1;\nSELECT `broken FROM t;", Dialect::MySql);
    assert_eq!(stmts, vec!["SELECT 1;"]);
}

#[test]
fn test_slash_after_block_on_same_line() {
    let stmts = oracle("CREATE OR REPLACE PROCEDURE name AS BEGIN BEGIN NULL; END; END; /");
    assert_eq!(
        stmts,
        vec!["CREATE OR REPLACE PROCEDURE name AS BEGIN BEGIN NULL; END; END;"]
    );

    let stmts = oracle("BEGIN NULL; END; /\nSELECT 1 FROM dual;\n");
    assert_eq!(stmts, vec!["BEGIN NULL; END;", "SELECT 1 FROM dual;"]);
}

#[test]
fn test_division_inside_block_is_kept() {
    let stmts = oracle("BEGIN x := 10 /\n 2; END;\n/\n");
    assert_eq!(stmts, vec!["BEGIN x := 10 /\n 2; END;"]);
}

#[test]
fn test_plsql_keyword_inside_identifier_is_ignored() {
    let stmts = oracle("CREATE TABLE begin_end_log (id NUMBER);\nSELECT 1 FROM dual;");
    assert_eq!(stmts.len(), 2, "got: {:?}", stmts);
}

#[test]
fn test_lowercase_block() {
    let stmts = oracle("begin\n  null;\nend;\n/\nselect 1 from dual;");
    assert_eq!(stmts, vec!["begin\n  null;\nend;", "select 1 from dual;"]);
}

#[test]
fn test_crlf_line_endings() {
    let stmts = oracle("BEGIN\r\n  NULL;\r\nEND;\r\n/\r\nSELECT 1 FROM dual;\r\n");
    assert_eq!(stmts.len(), 2, "got: {:?}", stmts);
    assert_eq!(stmts[1], "SELECT 1 FROM dual;");
}

#[test]
fn test_executable_sql() {
    assert_eq!(
        ScriptParser::executable_sql("SELECT 1 FROM dual;", Dialect::Oracle),
        "SELECT 1 FROM dual"
    );
    assert_eq!(
        ScriptParser::executable_sql("BEGIN NULL; END;", Dialect::Oracle),
        "BEGIN NULL; END;"
    );
    assert_eq!(
        ScriptParser::executable_sql("  SELECT 2 ;  ", Dialect::MySql),
        "SELECT 2"
    );
}

#[test]
fn test_parse_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("script.sql");
    fs::write(&path, "SELECT 1;\n-- done\nSELECT 2;\n").unwrap();

    let result = ScriptParser::parse_file(&path, Dialect::PostgreSql).unwrap();
    assert_eq!(result.texts(), vec!["SELECT 1;", "SELECT 2;"]);

    let missing = dir.path().join("missing.sql");
    assert_eq!(
        ScriptParser::parse_file(&missing, Dialect::PostgreSql),
        Err(ScriptError::NotFound { path: missing.clone() })
    );
    assert!(matches!(
        ScriptParser::parse_file(dir.path(), Dialect::PostgreSql),
        Err(ScriptError::NotReadable { .. })
    ));
}

#[test]
fn test_parse_result_serializes_as_list() {
    let result = ScriptParser::split("SELECT 1;\nSELECT 2;", Dialect::MySql);
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(
        json,
        serde_json::json!([
            {"index": 1, "text": "SELECT 1;"},
            {"index": 2, "text": "SELECT 2;"}
        ])
    );
}
