use super::*;
use crate::client::{IndexData, KeyType};
use crate::config::{ConnectionConfig, Quoting};

struct StubConn {
    config: ConnectionConfig,
    indexes: Vec<IndexData>,
}

impl StubConn {
    fn new() -> Self {
        Self {
            config: ConnectionConfig::new("test"),
            indexes: Vec::new(),
        }
    }

    fn with_config(config: ConnectionConfig) -> Self {
        Self {
            config,
            indexes: Vec::new(),
        }
    }
}

impl Connection for StubConn {
    fn config(&self) -> &ConnectionConfig {
        &self.config
    }
    async fn query(&self, _: &str, _: &[Value]) -> BuilderResult<ResultSet> {
        Ok(ResultSet::default())
    }
    async fn simple_query(&self, _: &str) -> BuilderResult<()> {
        Ok(())
    }
    async fn index_data(&self, _: &str) -> BuilderResult<Vec<IndexData>> {
        Ok(self.indexes.clone())
    }
}

fn compiled<T>(outcome: Outcome<T>) -> String {
    match outcome {
        Outcome::Compiled(sql) => sql,
        Outcome::Executed(_) => panic!("expected compiled SQL, statement was executed"),
        Outcome::Skipped => panic!("expected compiled SQL, statement was skipped"),
    }
}

// ── SELECT ──

#[test]
fn test_simple_select() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    assert_eq!(
        qb.get_compiled_select(true).unwrap(),
        r#"SELECT * FROM "test"."dbo"."jobs""#
    );
}

#[test]
fn test_select_with_where() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.select("id, name", None).where_("status", "open", None);
    assert_eq!(
        qb.get_compiled_select(true).unwrap(),
        r#"SELECT "id", "name" FROM "test"."dbo"."jobs" WHERE "status" = 'open'"#
    );
}

#[test]
fn test_select_aliases_and_expressions() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs j");
    qb.select("j.name AS job, COUNT(*) AS total", None)
        .select_raw("GETDATE() AS now");
    assert_eq!(
        qb.get_compiled_select(true).unwrap(),
        r#"SELECT "j"."name" AS "job", COUNT(*) AS total, GETDATE() AS now FROM "test"."dbo"."jobs" j"#
    );
}

#[test]
fn test_bracket_quoting() {
    let conn = StubConn::with_config(ConnectionConfig::new("test").with_quoting(Quoting::Brackets));
    let mut qb = Builder::new(&conn, "jobs");
    qb.select("id", None).where_("id", 1, None);
    assert_eq!(
        qb.get_compiled_select(true).unwrap(),
        "SELECT [id] FROM [test].[dbo].[jobs] WHERE [id] = 1"
    );
}

#[test]
fn test_schema_qualified_table_keeps_schema() {
    let conn = StubConn::with_config(ConnectionConfig::new("test").with_schema("sales"));
    let mut qb = Builder::new(&conn, "archive.jobs");
    assert_eq!(
        qb.get_compiled_select(true).unwrap(),
        r#"SELECT * FROM "test"."archive"."jobs""#
    );
    let mut qb = Builder::new(&conn, "jobs");
    assert_eq!(
        qb.get_compiled_select(true).unwrap(),
        r#"SELECT * FROM "test"."sales"."jobs""#
    );
}

#[test]
fn test_pagination_injects_order_by() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.limit(10).offset(20);
    assert_eq!(
        qb.get_compiled_select(true).unwrap(),
        r#"SELECT * FROM "test"."dbo"."jobs" ORDER BY (SELECT NULL) OFFSET 20 ROWS FETCH NEXT 10 ROWS ONLY"#
    );
}

#[test]
fn test_pagination_keeps_explicit_order() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.order_by("name", "desc", None).limit(10);
    assert_eq!(
        qb.get_compiled_select(true).unwrap(),
        r#"SELECT * FROM "test"."dbo"."jobs" ORDER BY "name" DESC OFFSET 0 ROWS FETCH NEXT 10 ROWS ONLY"#
    );
}

#[test]
fn test_offset_without_limit() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.offset(5);
    assert_eq!(
        qb.get_compiled_select(true).unwrap(),
        r#"SELECT * FROM "test"."dbo"."jobs" ORDER BY (SELECT NULL) OFFSET 5 ROWS"#
    );
}

#[test]
fn test_order_by_variants() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.order_by("name DESC, id", "", None);
    assert_eq!(
        qb.get_compiled_select(true).unwrap(),
        r#"SELECT * FROM "test"."dbo"."jobs" ORDER BY "name" DESC, "id""#
    );

    qb.order_by("", "RANDOM", None);
    assert_eq!(
        qb.get_compiled_select(true).unwrap(),
        r#"SELECT * FROM "test"."dbo"."jobs" ORDER BY NEWID()"#
    );

    qb.order_by("42", "random", None);
    assert_eq!(
        qb.get_compiled_select(true).unwrap(),
        r#"SELECT * FROM "test"."dbo"."jobs" ORDER BY RAND(42)"#
    );
}

#[test]
fn test_aggregates() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs j");
    qb.select_avg("price", None).select_max("j.salary", Some("top"));
    assert_eq!(
        qb.get_compiled_select(true).unwrap(),
        r#"SELECT AVG(CAST("price" AS FLOAT)) AS "price", MAX("j"."salary") AS "top" FROM "test"."dbo"."jobs" j"#
    );

    qb.select_min("j.salary", None).select_sum("qty", None).select_count("id", Some("n"));
    assert_eq!(
        qb.get_compiled_select(true).unwrap(),
        r#"SELECT MIN("j"."salary") AS "salary", SUM("qty") AS "qty", COUNT("id") AS "n" FROM "test"."dbo"."jobs" j"#
    );
}

#[test]
fn test_invalid_aggregate_is_reported_in_strict_mode() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.select_sum("a, b", None);
    let err = qb.get_compiled_select(true).unwrap_err();
    assert!(err.is_usage());
    assert!(err.to_string().contains("select_sum()"));
}

#[test]
fn test_invalid_aggregate_is_dropped_in_permissive_mode() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs").with_options(BuilderOptions::new().strict(false));
    qb.select_max("", None);
    assert_eq!(
        qb.get_compiled_select(true).unwrap(),
        r#"SELECT * FROM "test"."dbo"."jobs""#
    );
}

#[test]
fn test_group_by_fills_empty_select() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.group_by("status", None);
    assert_eq!(
        qb.get_compiled_select(true).unwrap(),
        r#"SELECT "status" FROM "test"."dbo"."jobs" GROUP BY "status""#
    );
}

#[test]
fn test_group_by_having() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.select("status", None)
        .select_count("id", Some("cnt"))
        .group_by("status", None)
        .having("cnt >", 5, None);
    assert_eq!(
        qb.get_compiled_select(true).unwrap(),
        r#"SELECT "status", COUNT("id") AS "cnt" FROM "test"."dbo"."jobs" GROUP BY "status" HAVING "cnt" > 5"#
    );
}

#[test]
fn test_distinct() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.distinct(true).select("status", None);
    assert_eq!(
        qb.get_compiled_select(true).unwrap(),
        r#"SELECT DISTINCT "status" FROM "test"."dbo"."jobs""#
    );
}

#[test]
fn test_reset_keeps_from() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.select("id", None).where_("id", 1, None).limit(3);
    qb.get_compiled_select(true).unwrap();
    assert_eq!(
        qb.get_compiled_select(true).unwrap(),
        r#"SELECT * FROM "test"."dbo"."jobs""#
    );
}

#[test]
fn test_compiled_select_without_reset_is_repeatable() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.where_("id", 1, None);
    let first = qb.get_compiled_select(false).unwrap();
    assert_eq!(qb.get_compiled_select(false).unwrap(), first);
}

// ── WHERE ──

#[test]
fn test_where_operators() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.where_("age >=", 18, None)
        .where_("name !=", "x", None)
        .or_where("name LIKE", "a%", None);
    assert_eq!(
        qb.get_compiled_select(true).unwrap(),
        r#"SELECT * FROM "test"."dbo"."jobs" WHERE "age" >= 18 AND "name" != 'x' OR "name" LIKE 'a%'"#
    );
}

#[test]
fn test_where_null_rewriting() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.where_("deleted_at", Value::Null, None)
        .where_("closed_at !=", Value::Null, None)
        .where_("owner_id IS NOT", None::<i64>, None)
        .where_("parent_id =", Value::Null, None);
    assert_eq!(
        qb.get_compiled_select(true).unwrap(),
        r#"SELECT * FROM "test"."dbo"."jobs" WHERE "deleted_at" IS NULL AND "closed_at" IS NOT NULL AND "owner_id" IS NOT NULL AND "parent_id" IS NULL"#
    );
}

#[test]
fn test_having_null_without_operator_is_verbatim() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.group_by("status", None)
        .having_raw("COUNT(id) > 1", None)
        .having("MAX(closed_at) IS", Value::Null, None);
    assert_eq!(
        qb.get_compiled_select(true).unwrap(),
        r#"SELECT "status" FROM "test"."dbo"."jobs" GROUP BY "status" HAVING COUNT(id) > 1 AND MAX(closed_at) IS NULL"#
    );
}

#[test]
fn test_where_unescaped_value() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.where_("created_at <", "GETDATE()", Some(false));
    assert_eq!(
        qb.get_compiled_select(true).unwrap(),
        r#"SELECT * FROM "test"."dbo"."jobs" WHERE created_at < GETDATE()"#
    );
    assert!(qb.binds().is_empty());
}

#[test]
fn test_where_raw_protects_each_condition() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.where_raw("a = 1 AND b.c = d.e OR (f > 2 AND g < 3)", None);
    assert_eq!(
        qb.get_compiled_select(true).unwrap(),
        r#"SELECT * FROM "test"."dbo"."jobs" WHERE "a" = 1 AND "b"."c" = "d"."e" OR ("f" > 2 AND "g" < 3)"#
    );
}

#[test]
fn test_where_between_is_one_condition() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.where_raw("price BETWEEN 1 AND 5", None).where_("qty", 2, None);
    assert_eq!(
        qb.get_compiled_select(true).unwrap(),
        r#"SELECT * FROM "test"."dbo"."jobs" WHERE "price" BETWEEN 1 AND 5 AND "qty" = 2"#
    );
}

#[test]
fn test_repeated_keys_get_distinct_binds() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.where_("id", 1, None).or_where("id", 2, None);
    assert_eq!(
        qb.get_compiled_select(false).unwrap(),
        r#"SELECT * FROM "test"."dbo"."jobs" WHERE "id" = 1 OR "id" = 2"#
    );
    let names: Vec<&str> = qb.binds().iter().map(|(name, _)| name).collect();
    assert_eq!(names, vec!["id", "id.1"]);
}

#[test]
fn test_where_groups() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.where_("a", 1, None)
        .group_start()
        .where_("b", 2, None)
        .or_where("c", 3, None)
        .group_end()
        .or_not_group_start()
        .where_("d", 4, None)
        .group_end();
    assert_eq!(
        qb.get_compiled_select(true).unwrap(),
        r#"SELECT * FROM "test"."dbo"."jobs" WHERE "a" = 1 AND ("b" = 2 OR "c" = 3) OR NOT ("d" = 4)"#
    );
}

#[test]
fn test_group_as_first_where_entry() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.group_start()
        .where_("a", 1, None)
        .or_where("b", 2, None)
        .group_end()
        .where_("c", 3, None);
    assert_eq!(
        qb.get_compiled_select(true).unwrap(),
        r#"SELECT * FROM "test"."dbo"."jobs" WHERE ("a" = 1 OR "b" = 2) AND "c" = 3"#
    );
}

#[test]
fn test_empty_group_is_dropped() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.group_start()
        .group_start()
        .group_end()
        .where_("a", 1, None)
        .group_end()
        .or_group_start()
        .group_end()
        .where_("b", 2, None);
    assert_eq!(
        qb.get_compiled_select(true).unwrap(),
        r#"SELECT * FROM "test"."dbo"."jobs" WHERE ("a" = 1) AND "b" = 2"#
    );
}

#[tokio::test]
async fn test_unclosed_group_is_a_usage_error() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.test_mode(true).group_start().where_("a", 1, None);
    let err = qb.get(None, None, true).await.unwrap_err();
    assert!(err.is_usage());
}

#[test]
fn test_group_end_without_start_is_reported() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.where_("a", 1, None).group_end();
    assert!(qb.get_compiled_select(true).unwrap_err().is_usage());
}

#[test]
fn test_where_in() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.where_in("id", [1, 2, 3], None)
        .or_where_not_in("status", ["closed", "void"], None);
    assert_eq!(
        qb.get_compiled_select(true).unwrap(),
        r#"SELECT * FROM "test"."dbo"."jobs" WHERE "id" IN (1, 2, 3) OR "status" NOT IN ('closed', 'void')"#
    );
}

#[test]
fn test_where_in_empty_lists() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.where_in("id", Vec::<i64>::new(), None)
        .or_where_not_in("id", Vec::<i64>::new(), None);
    assert_eq!(
        qb.get_compiled_select(true).unwrap(),
        r#"SELECT * FROM "test"."dbo"."jobs" WHERE 1=0 OR 1=1"#
    );
}

#[test]
fn test_like_escapes_wildcards() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.like("name", "50%_off", LikeSide::Both)
        .or_not_like("code", "AB", LikeSide::After);
    assert_eq!(
        qb.get_compiled_select(true).unwrap(),
        r#"SELECT * FROM "test"."dbo"."jobs" WHERE "name" LIKE '%50!%!_off%' ESCAPE '!' OR "code" NOT LIKE 'AB%' ESCAPE '!'"#
    );
}

#[test]
fn test_where_sub_select() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.where_("status", "open", None).where_sub("owner_id", |sub| {
        sub.select("id", None).from("users").where_("active", 1, None);
    });
    assert_eq!(
        qb.get_compiled_select(true).unwrap(),
        r#"SELECT * FROM "test"."dbo"."jobs" WHERE "status" = 'open' AND "owner_id" = (SELECT "id" FROM "test"."dbo"."users" WHERE "active" = 1)"#
    );
}

#[test]
fn test_where_in_sub_select() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.where_in_sub("owner_id", |sub| {
        sub.select("id", None).from("users").where_("name", "it's", None);
    });
    assert_eq!(
        qb.get_compiled_select(true).unwrap(),
        r#"SELECT * FROM "test"."dbo"."jobs" WHERE "owner_id" IN (SELECT "id" FROM "test"."dbo"."users" WHERE "name" = 'it''s')"#
    );
}

// ── JOIN ──

#[test]
fn test_join_protects_both_sides() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.join("users u", "u.id = jobs.owner_id", "left", None);
    assert_eq!(
        qb.get_compiled_select(true).unwrap(),
        r#"SELECT * FROM "test"."dbo"."jobs" LEFT JOIN "test"."dbo"."users" u ON "u"."id" = "jobs"."owner_id""#
    );
}

#[test]
fn test_join_type_fallback_and_using() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.join("users", "id", "sideways", None);
    assert_eq!(
        qb.get_compiled_select(true).unwrap(),
        r#"SELECT * FROM "test"."dbo"."jobs" JOIN "test"."dbo"."users" USING ("id")"#
    );
}

#[test]
fn test_join_types_are_case_insensitive() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.join("users u", "u.id = jobs.owner_id", "full  outer", None)
        .join("tags", "", "cross", None);
    assert_eq!(
        qb.get_compiled_select(true).unwrap(),
        r#"SELECT * FROM "test"."dbo"."jobs" FULL OUTER JOIN "test"."dbo"."users" u ON "u"."id" = "jobs"."owner_id" CROSS JOIN "test"."dbo"."tags""#
    );
}

#[test]
fn test_join_without_escaping() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.join("users u", "u.id = jobs.owner_id", "inner", Some(false));
    assert_eq!(
        qb.get_compiled_select(true).unwrap(),
        r#"SELECT * FROM "test"."dbo"."jobs" INNER JOIN users u ON u.id = jobs.owner_id"#
    );
}

#[test]
fn test_join_helpers_with_compound_condition() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs j");
    qb.inner_join("users u", "u.id = j.owner_id AND u.active = 1")
        .right_join("teams t", "t.id = u.team_id");
    assert_eq!(
        qb.get_compiled_select(true).unwrap(),
        r#"SELECT * FROM "test"."dbo"."jobs" j INNER JOIN "test"."dbo"."users" u ON "u"."id" = "j"."owner_id" AND "u"."active" = 1 RIGHT JOIN "test"."dbo"."teams" t ON "t"."id" = "u"."team_id""#
    );
}

// ── writes ──

#[test]
fn test_compiled_insert() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.set("name", "a", None).set("qty", 2, None);
    assert_eq!(
        qb.get_compiled_insert(true).unwrap(),
        r#"INSERT INTO "test"."dbo"."jobs" ("name","qty") VALUES ('a', 2)"#
    );
}

#[test]
fn test_set_same_column_keeps_last_value() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.set("name", "a", None).set("name", "b", None);
    assert_eq!(
        qb.get_compiled_insert(true).unwrap(),
        r#"INSERT INTO "test"."dbo"."jobs" ("name") VALUES ('b')"#
    );
}

#[test]
fn test_compiled_insert_with_identity_insert() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs").with_options(BuilderOptions::new().identity_insert(true));
    qb.set("id", 7, None);
    assert_eq!(
        qb.get_compiled_insert(true).unwrap(),
        "SET IDENTITY_INSERT \"test\".\"dbo\".\"jobs\" ON\n\
         INSERT INTO \"test\".\"dbo\".\"jobs\" (\"id\") VALUES (7)\n\
         SET IDENTITY_INSERT \"test\".\"dbo\".\"jobs\" OFF"
    );
}

#[test]
fn test_compiled_update_with_top() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.set("name", "b", None)
        .set("updated_at", "GETDATE()", Some(false))
        .where_("id", 1, None)
        .limit(5);
    assert_eq!(
        qb.get_compiled_update(true).unwrap(),
        r#"UPDATE TOP(5) "test"."dbo"."jobs" SET "name" = 'b', "updated_at" = GETDATE() WHERE "id" = 1"#
    );
}

#[test]
fn test_compiled_delete_requires_where() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    assert!(qb.get_compiled_delete(true).unwrap_err().is_usage());

    qb.where_("id", 3, None).limit(2);
    assert_eq!(
        qb.get_compiled_delete(true).unwrap(),
        r#"DELETE TOP (2) FROM "test"."dbo"."jobs" WHERE "id" = 3"#
    );
}

#[test]
fn test_insert_without_set_is_usage_error() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    assert!(qb.get_compiled_insert(true).unwrap_err().is_usage());
    assert!(qb.get_compiled_update(true).unwrap_err().is_usage());
}

#[tokio::test]
async fn test_delete_without_where() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.test_mode(true);
    let err = qb.delete(None, None, true).await.unwrap_err();
    assert!(err.is_usage());

    let mut qb = Builder::new(&conn, "jobs").with_options(BuilderOptions::new().strict(false));
    assert!(qb.delete(None, None, true).await.unwrap().is_skipped());
}

#[tokio::test]
async fn test_delete_with_only_empty_group() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.test_mode(true).group_start().group_end();
    assert!(qb.delete(None, None, true).await.unwrap_err().is_usage());

    qb.group_start().group_end();
    assert!(qb.get_compiled_delete(true).unwrap_err().is_usage());
}

#[tokio::test]
async fn test_delete_with_condition_argument() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.test_mode(true);
    let sql = compiled(qb.delete(Some("id = 3"), Some(1), true).await.unwrap());
    assert_eq!(sql, r#"DELETE TOP (1) FROM "test"."dbo"."jobs" WHERE "id" = 3"#);
}

#[tokio::test]
async fn test_insert_batch_chunks() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs").with_options(BuilderOptions::new().batch_size(2));
    qb.test_mode(true);
    let rows: Vec<BatchRow<'_>> = vec![
        vec![("id", 1.into()), ("name", "a".into())],
        vec![("name", "b".into()), ("id", 2.into())],
        vec![("id", 3.into()), ("name", Value::Null)],
    ];
    let sql = compiled(qb.insert_batch(&rows, None).await.unwrap());
    assert_eq!(
        sql,
        "INSERT INTO \"test\".\"dbo\".\"jobs\" (\"id\",\"name\") VALUES (1, 'a'), (2, 'b')\n\
         INSERT INTO \"test\".\"dbo\".\"jobs\" (\"id\",\"name\") VALUES (3, NULL)"
    );
}

#[tokio::test]
async fn test_insert_batch_rejects_mismatched_rows() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.test_mode(true);
    let rows: Vec<BatchRow<'_>> = vec![
        vec![("id", 1.into()), ("name", "a".into())],
        vec![("id", 2.into()), ("title", "b".into())],
    ];
    assert!(qb.insert_batch(&rows, None).await.unwrap_err().is_usage());
    assert!(qb.insert_batch(&[], None).await.unwrap_err().is_usage());
}

#[tokio::test]
async fn test_update_batch_builds_case_per_column() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.test_mode(true);
    let rows: Vec<BatchRow<'_>> = vec![
        vec![("id", 1.into()), ("name", "a".into()), ("qty", 5.into())],
        vec![("id", 2.into()), ("name", "b".into())],
    ];
    let sql = compiled(qb.update_batch(&rows, "id").await.unwrap());
    assert_eq!(
        sql,
        r#"UPDATE "test"."dbo"."jobs" SET "name" = CASE WHEN "id" = 1 THEN 'a' WHEN "id" = 2 THEN 'b' ELSE "name" END, "qty" = CASE WHEN "id" = 1 THEN 5 ELSE "qty" END WHERE "id" IN(1,2)"#
    );
}

#[tokio::test]
async fn test_update_batch_is_one_statement_by_default() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.test_mode(true);
    let rows: Vec<BatchRow<'_>> = (1..=150i64)
        .map(|id| vec![("id", id.into()), ("name", format!("n{id}").into())])
        .collect();
    let sql = compiled(qb.update_batch(&rows, "id").await.unwrap());

    assert!(!sql.contains('\n'));
    assert_eq!(sql.matches("UPDATE ").count(), 1);
    assert_eq!(sql.matches("WHEN ").count(), 150);
    assert_eq!(sql.matches(" IN(").count(), 1);
    let ids: Vec<String> = (1..=150).map(|id: i64| id.to_string()).collect();
    assert!(sql.ends_with(&format!(r#"WHERE "id" IN({})"#, ids.join(","))));
}

#[tokio::test]
async fn test_update_batch_rejects_rows_with_only_the_index() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.test_mode(true);
    let rows: Vec<BatchRow<'_>> = vec![vec![("id", 1.into())], vec![("id", 2.into())]];
    let err = qb.update_batch(&rows, "id").await.unwrap_err();
    assert!(err.is_usage());
    assert!(err.to_string().contains("no columns besides the index"));
}

#[tokio::test]
async fn test_update_batch_skips_rows_with_only_the_index() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs").with_options(BuilderOptions::new().update_batch_size(1));
    qb.test_mode(true);
    let rows: Vec<BatchRow<'_>> = vec![vec![("id", 1.into())], vec![("id", 2.into()), ("name", "b".into())]];
    let sql = compiled(qb.update_batch(&rows, "id").await.unwrap());
    assert_eq!(
        sql,
        r#"UPDATE "test"."dbo"."jobs" SET "name" = CASE WHEN "id" = 2 THEN 'b' ELSE "name" END WHERE "id" IN(2)"#
    );
}

#[tokio::test]
async fn test_update_batch_restores_where_per_chunk() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs").with_options(BuilderOptions::new().update_batch_size(1));
    qb.test_mode(true).where_("status", "open", None);
    let rows: Vec<BatchRow<'_>> = vec![
        vec![("id", 1.into()), ("name", "a".into())],
        vec![("id", 2.into()), ("name", "b".into())],
    ];
    let sql = compiled(qb.update_batch(&rows, "id").await.unwrap());
    assert_eq!(
        sql,
        "UPDATE \"test\".\"dbo\".\"jobs\" SET \"name\" = CASE WHEN \"id\" = 1 THEN 'a' ELSE \"name\" END WHERE \"status\" = 'open' AND \"id\" IN(1)\n\
         UPDATE \"test\".\"dbo\".\"jobs\" SET \"name\" = CASE WHEN \"id\" = 2 THEN 'b' ELSE \"name\" END WHERE \"status\" = 'open' AND \"id\" IN(2)"
    );
}

#[tokio::test]
async fn test_update_batch_requires_index_on_every_row() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.test_mode(true);
    let rows: Vec<BatchRow<'_>> = vec![
        vec![("id", 1.into()), ("name", "a".into())],
        vec![("name", "b".into())],
    ];
    let err = qb.update_batch(&rows, "id").await.unwrap_err();
    assert!(err.to_string().contains("row 1"));
}

#[tokio::test]
async fn test_increment_casts_text() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.test_mode(true).where_("id", 1, None);
    let sql = compiled(qb.increment("hits", 1).await.unwrap());
    assert_eq!(
        sql,
        r#"UPDATE "test"."dbo"."jobs" SET "hits" = CONVERT(VARCHAR(MAX),CONVERT(INT,CONVERT(VARCHAR(MAX), "hits")) + 1) WHERE "id" = 1"#
    );
}

#[tokio::test]
async fn test_decrement_without_cast() {
    let conn = StubConn::new();
    let mut qb =
        Builder::new(&conn, "jobs").with_options(BuilderOptions::new().cast_text_to_int(false));
    qb.test_mode(true).where_("id", 1, None);
    let sql = compiled(qb.decrement("hits", 2).await.unwrap());
    assert_eq!(
        sql,
        r#"UPDATE "test"."dbo"."jobs" SET "hits" = "hits" - 2 WHERE "id" = 1"#
    );
}

#[tokio::test]
async fn test_truncate_and_empty_table() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.test_mode(true);
    assert_eq!(
        compiled(qb.truncate().await.unwrap()),
        r#"TRUNCATE TABLE "test"."dbo"."jobs""#
    );
    assert_eq!(
        compiled(qb.empty_table().await.unwrap()),
        r#"DELETE FROM "test"."dbo"."jobs""#
    );
}

// ── counts ──

#[tokio::test]
async fn test_count_all() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.test_mode(true).where_("ignored", 1, None);
    assert_eq!(
        compiled(qb.count_all(true).await.unwrap()),
        r#"SELECT COUNT(*) AS "numrows" FROM "test"."dbo"."jobs""#
    );
}

#[tokio::test]
async fn test_count_all_results_plain() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.test_mode(true)
        .where_("a", 1, None)
        .order_by("a", "ASC", None)
        .limit(5)
        .offset(10);
    assert_eq!(
        compiled(qb.count_all_results(true).await.unwrap()),
        r#"SELECT COUNT(*) AS "numrows" FROM "test"."dbo"."jobs" WHERE "a" = 1"#
    );
}

#[tokio::test]
async fn test_count_all_results_distinct_restores_order_and_limit() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.test_mode(true)
        .distinct(true)
        .select("status", None)
        .order_by("status", "ASC", None)
        .limit(5);
    assert_eq!(
        compiled(qb.count_all_results(false).await.unwrap()),
        r#"SELECT COUNT(*) AS "numrows" FROM (SELECT DISTINCT "status" FROM "test"."dbo"."jobs") count_all_results"#
    );
    assert_eq!(
        qb.get_compiled_select(true).unwrap(),
        r#"SELECT DISTINCT "status" FROM "test"."dbo"."jobs" ORDER BY "status" ASC OFFSET 0 ROWS FETCH NEXT 5 ROWS ONLY"#
    );
}

// ── replace ──

#[tokio::test]
async fn test_replace_compiles_delete_and_insert() {
    let mut conn = StubConn::new();
    conn.indexes = vec![
        IndexData::new("pk_jobs", KeyType::Primary, &["id"]),
        IndexData::new("ix_name", KeyType::Index, &["name"]),
    ];
    let mut qb = Builder::new(&conn, "jobs");
    qb.test_mode(true);
    let sql = compiled(
        qb.replace([("id", Value::from(1)), ("name", Value::from("b"))])
            .await
            .unwrap(),
    );
    assert_eq!(
        sql,
        "DELETE FROM \"test\".\"dbo\".\"jobs\" WHERE \"id\" = 1\n\
         INSERT INTO \"test\".\"dbo\".\"jobs\" (\"id\",\"name\") VALUES (1,'b')"
    );
}

#[tokio::test]
async fn test_replace_without_key_columns_only_inserts() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.test_mode(true);
    let sql = compiled(qb.replace([("name", "b")]).await.unwrap());
    assert_eq!(sql, r#"INSERT INTO "test"."dbo"."jobs" ("name") VALUES ('b')"#);
}

#[tokio::test]
async fn test_replace_without_values_is_usage_error() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.test_mode(true);
    let err = qb.replace(Vec::<(&str, Value)>::new()).await.unwrap_err();
    assert!(err.is_usage());
}

// ── clones ──

#[test]
fn test_clean_clone_shares_nothing() {
    let conn = StubConn::new();
    let mut qb = Builder::new(&conn, "jobs");
    qb.where_("id", 1, None).test_mode(true);

    let mut clean = qb.clean_clone();
    assert!(clean.table().is_none());
    assert!(clean.binds().is_empty());
    assert!(clean.is_test_mode());
    clean.from("users").where_("id", 2, None);

    let copy = qb.clone();
    assert_eq!(copy.binds().len(), 1);
    assert_eq!(
        qb.get_compiled_select(false).unwrap(),
        r#"SELECT * FROM "test"."dbo"."jobs" WHERE "id" = 1"#
    );
}
