//! End-to-end analyzer tests over a small two-table schema.

use sqlbindgen_core::{
    Analyzer, Catalog, CmdKind, CommentSyntax, FileAnalysis, GenerateSettings, Generateable,
    Param, Query, QueryFile, SchemaBuilder, SqlDialect, SqlType,
};

fn catalog() -> Catalog {
    let schema = r#"
        CREATE TABLE users (
            first_name varchar NOT NULL,
            last_name  varchar,
            id         int NOT NULL AUTO_INCREMENT,
            age        int NOT NULL,
            job_status enum('applied','pending','accepted','rejected') NOT NULL
        );
        CREATE TABLE orders (
            id       int NOT NULL AUTO_INCREMENT,
            price    DECIMAL(13,4) NOT NULL,
            user_id  int NOT NULL
        );
    "#;
    let mut builder = SchemaBuilder::new();
    builder.parse(schema).unwrap();
    builder.build()
}

fn analyze(catalog: &Catalog, sql: &str) -> FileAnalysis {
    analyze_with(catalog, sql, SqlDialect::MySql)
}

fn analyze_with(catalog: &Catalog, sql: &str, dialect: SqlDialect) -> FileAnalysis {
    let analyzer = Analyzer::with_dialect(catalog, dialect);
    analyzer.analyze_file("queries.sql", sql, CommentSyntax::Block)
}

fn one_query(catalog: &Catalog, sql: &str) -> Query {
    let analysis = analyze(catalog, sql);
    assert!(
        analysis.errors.is_empty(),
        "expected no errors: {:?}",
        analysis.errors
    );
    assert_eq!(analysis.entries.len(), 1, "expected exactly one query");
    analysis.entries.into_iter().next().unwrap().query
}

fn one_error(catalog: &Catalog, sql: &str) -> String {
    let analysis = analyze(catalog, sql);
    assert!(
        analysis.entries.is_empty(),
        "expected no queries: {:?}",
        analysis.entries
    );
    assert_eq!(analysis.errors.len(), 1, "expected exactly one error");
    analysis.errors[0].message.clone()
}

fn param(ordinal: usize, name: &str, sql_type: SqlType, not_null: bool) -> Param {
    Param {
        ordinal,
        name: name.to_string(),
        sql_type,
        not_null,
    }
}

fn decimal_13_4() -> SqlType {
    SqlType::Decimal {
        precision: Some(13),
        scale: Some(4),
    }
}

#[test]
fn get_count() {
    let catalog = catalog();
    let query = one_query(
        &catalog,
        "/* name: GetCount :one */\nSELECT id my_id, COUNT(id) id_count FROM users WHERE id > 4",
    );

    assert_eq!(query.name, "GetCount");
    assert_eq!(query.cmd, CmdKind::One);
    assert_eq!(
        query.sql,
        "select id as my_id, count(id) as id_count from users where id > 4"
    );
    assert!(query.params.is_empty());
    assert_eq!(query.default_table, "users");

    assert_eq!(query.columns.len(), 2);
    let my_id = &query.columns[0];
    assert_eq!(my_id.name, "my_id");
    assert_eq!(my_id.source_table, "users");
    assert_eq!(my_id.sql_type, SqlType::Int);
    assert!(my_id.not_null);

    let id_count = &query.columns[1];
    assert_eq!(id_count.name, "id_count");
    assert_eq!(id_count.source_table, "");
    assert_eq!(id_count.sql_type, SqlType::Int);
    assert!(id_count.not_null);
}

#[test]
fn get_name_by_id() {
    let catalog = catalog();
    let query = one_query(
        &catalog,
        "/* name: GetNameByID :one */\nSELECT first_name, last_name FROM users WHERE id = ?",
    );

    assert_eq!(query.sql, "select first_name, last_name from users where id = ?");
    assert_eq!(query.params, [param(1, "id", SqlType::Int, true)]);

    assert_eq!(query.columns.len(), 2);
    assert_eq!(query.columns[0].name, "first_name");
    assert!(query.columns[0].not_null);
    assert_eq!(query.columns[0].sql_type, SqlType::Varchar { length: None });
    assert_eq!(query.columns[1].name, "last_name");
    assert!(!query.columns[1].not_null);
}

#[test]
fn get_all_expands_star_in_catalog_order() {
    let catalog = catalog();
    let query = one_query(&catalog, "/* name: GetAll :many */\nSELECT * FROM users;");

    assert_eq!(query.cmd, CmdKind::Many);
    assert!(query.params.is_empty());
    assert_eq!(
        query.sql,
        "select first_name, last_name, id, age, job_status from users"
    );

    let names: Vec<&str> = query.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["first_name", "last_name", "id", "age", "job_status"]);
    assert!(query.columns.iter().all(|c| c.source_table == "users"));
    assert_eq!(
        query.columns[4].sql_type,
        SqlType::Enum(vec![
            "applied".to_string(),
            "pending".to_string(),
            "accepted".to_string(),
            "rejected".to_string()
        ])
    );
}

#[test]
fn left_join_makes_optional_side_nullable() {
    let catalog = catalog();
    let query = one_query(
        &catalog,
        "/* name: GetAllUsersOrders :many */\n\
         SELECT u.id user_id, u.first_name, o.price, o.id order_id \
         FROM orders o LEFT JOIN users u ON u.id = o.user_id",
    );

    assert_eq!(
        query.sql,
        "select u.id as user_id, u.first_name, o.price, o.id as order_id \
         from orders as o left join users as u on u.id = o.user_id"
    );
    assert_eq!(query.default_table, "orders");

    let [user_id, first_name, price, order_id] = query.columns.as_slice() else {
        panic!("expected four columns, got {:?}", query.columns);
    };

    // users sits on the optional side of the LEFT JOIN
    assert_eq!(user_id.name, "user_id");
    assert_eq!(user_id.source_table, "users");
    assert!(!user_id.not_null);
    assert_eq!(first_name.name, "first_name");
    assert!(!first_name.not_null);

    // orders is the driving table and keeps its catalog nullability
    assert_eq!(price.name, "price");
    assert_eq!(price.sql_type, decimal_13_4());
    assert!(price.not_null);
    assert_eq!(order_id.name, "order_id");
    assert!(order_id.not_null);
}

#[test]
fn insert_params_follow_column_list() {
    let catalog = catalog();
    let query = one_query(
        &catalog,
        "/* name: InsertNewUser :exec */\nINSERT INTO users (first_name, last_name) VALUES (?, ?)",
    );

    assert_eq!(query.cmd, CmdKind::Exec);
    assert_eq!(
        query.sql,
        "insert into users (first_name, last_name) values (?, ?)"
    );
    assert!(query.columns.is_empty());
    assert_eq!(
        query.params,
        [
            param(1, "first_name", SqlType::Varchar { length: None }, true),
            param(2, "last_name", SqlType::Varchar { length: None }, false),
        ]
    );
}

#[test]
fn update_params_in_source_order() {
    let catalog = catalog();
    let query = one_query(
        &catalog,
        "/* name: UpdateUserAt :exec */\n\
         UPDATE users SET first_name = ?, last_name = ? WHERE id > ? AND first_name = ? LIMIT 3",
    );

    assert_eq!(
        query.sql,
        "update users set first_name = ?, last_name = ? where id > ? and first_name = ? limit 3"
    );
    assert!(query.columns.is_empty());
    assert_eq!(
        query.params,
        [
            param(1, "first_name", SqlType::Varchar { length: None }, true),
            param(2, "last_name", SqlType::Varchar { length: None }, false),
            param(3, "id", SqlType::Int, true),
            param(4, "first_name", SqlType::Varchar { length: None }, true),
        ]
    );
}

#[test]
fn update_limit_placeholder_becomes_limit_param() {
    let catalog = catalog();
    let query = one_query(
        &catalog,
        "/* name: TrimUsers :exec */\nUPDATE users SET last_name = ? LIMIT ?",
    );
    assert_eq!(query.sql, "update users set last_name = ? limit ?");
    assert_eq!(
        query.params,
        [
            param(1, "last_name", SqlType::Varchar { length: None }, false),
            param(2, "limit", SqlType::Int, true),
        ]
    );
}

#[test]
fn select_limit_and_offset_params() {
    let catalog = catalog();
    let query = one_query(
        &catalog,
        "/* name: PageUsers :many */\nSELECT first_name FROM users LIMIT ? OFFSET ?",
    );
    assert_eq!(query.sql, "select first_name from users limit ? offset ?");
    assert_eq!(
        query.params,
        [
            param(1, "limit", SqlType::Int, true),
            param(2, "offset", SqlType::Int, true),
        ]
    );
}

#[test]
fn insert_from_select_uses_inner_scope() {
    let catalog = catalog();
    let query = one_query(
        &catalog,
        "/* name: InsertUsersFromOrders :exec */\n\
         insert into users ( first_name ) select user_id from orders where id = ?;",
    );
    assert_eq!(
        query.sql,
        "insert into users (first_name) select user_id from orders where id = ?"
    );
    assert_eq!(query.params, [param(1, "id", SqlType::Int, true)]);
    assert_eq!(query.default_table, "users");
}

#[test]
fn update_without_where() {
    let catalog = catalog();
    let query = one_query(
        &catalog,
        "/* name: UpdateAllUsers :exec */ update users set first_name = 'Bob'",
    );
    assert_eq!(query.sql, "update users set first_name = 'Bob'");
    assert!(query.params.is_empty());
    assert!(query.columns.is_empty());
}

#[test]
fn in_and_between_take_the_column_hint() {
    let catalog = catalog();
    let query = one_query(
        &catalog,
        "/* name: FindUsers :many */\n\
         SELECT first_name FROM users WHERE job_status IN (?, ?) AND age BETWEEN ? AND ?",
    );
    assert_eq!(
        query.sql,
        "select first_name from users where job_status in (?, ?) and age between ? and ?"
    );
    let names: Vec<&str> = query.params.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["job_status", "job_status", "age", "age"]);
    assert!(query.params.iter().all(|p| p.not_null));
}

#[test]
fn qualified_comparison_drops_the_qualifier() {
    let catalog = catalog();
    let query = one_query(
        &catalog,
        "/* name: GetOrdersFor :many */\n\
         SELECT o.id FROM orders o WHERE o.user_id = ? AND o.price > ?",
    );
    assert_eq!(
        query.params,
        [
            param(1, "user_id", SqlType::Int, true),
            param(2, "price", decimal_13_4(), true),
        ]
    );
}

#[test]
fn numbered_placeholders_keep_source_order() {
    let catalog = catalog();
    let query_text = "/* name: FindUser :one */\n\
         SELECT first_name FROM users WHERE age = $2 AND first_name = $1";
    let analysis = analyze_with(&catalog, query_text, SqlDialect::PostgreSql);
    assert!(analysis.errors.is_empty(), "{:?}", analysis.errors);
    let query = &analysis.entries[0].query;

    // both dialects normalize to positional order, never reordered
    assert_eq!(
        query.sql,
        "select first_name from users where age = ? and first_name = ?"
    );
    assert_eq!(
        query.params,
        [
            param(1, "age", SqlType::Int, true),
            param(2, "first_name", SqlType::Varchar { length: None }, true),
        ]
    );
}

#[test]
fn params_match_placeholder_count_and_ordinals_increase() {
    let catalog = catalog();
    let query = one_query(
        &catalog,
        "/* name: Audit :many */\n\
         SELECT first_name FROM users WHERE id > ? AND age < ? AND job_status = ? LIMIT ?",
    );
    let placeholder_count = query.sql.matches('?').count();
    assert_eq!(query.params.len(), placeholder_count);
    for (i, p) in query.params.iter().enumerate() {
        assert_eq!(p.ordinal, i + 1);
    }
}

#[test]
fn columns_empty_iff_exec() {
    let catalog = catalog();
    // an exec command over a SELECT still projects nothing
    let query = one_query(&catalog, "/* name: Touch :exec */\nSELECT * FROM users");
    assert!(query.columns.is_empty());

    let query = one_query(&catalog, "/* name: GetAll :many */\nSELECT * FROM users");
    assert!(!query.columns.is_empty());
}

#[test]
fn one_command_requires_a_select() {
    let catalog = catalog();
    let message = one_error(
        &catalog,
        "/* name: BadCmd :one */\nDELETE FROM users WHERE id = ?",
    );
    assert!(message.contains("SELECT"), "{message}");
}

#[test]
fn derived_table_contributes_its_projection() {
    let catalog = catalog();
    let query = one_query(
        &catalog,
        "/* name: TopSpenders :many */\n\
         SELECT t.user_id FROM (SELECT user_id, price FROM orders) t WHERE t.price > ?",
    );
    assert_eq!(
        query.sql,
        "select t.user_id from (select user_id, price from orders) as t where t.price > ?"
    );
    assert_eq!(query.columns.len(), 1);
    assert_eq!(query.columns[0].name, "user_id");
    assert_eq!(query.columns[0].source_table, "orders");
    assert_eq!(query.params, [param(1, "price", decimal_13_4(), true)]);
}

#[test]
fn aggregate_projections() {
    let catalog = catalog();
    let query = one_query(
        &catalog,
        "/* name: PriceStats :one */\n\
         SELECT COUNT(*) n, SUM(price) total, MAX(price) top FROM orders",
    );
    assert_eq!(
        query.sql,
        "select count(*) as n, sum(price) as total, max(price) as top from orders"
    );
    let [n, total, top] = query.columns.as_slice() else {
        panic!("expected three columns");
    };
    assert_eq!(n.sql_type, SqlType::Int);
    assert!(n.not_null);
    assert_eq!(total.sql_type, decimal_13_4());
    assert!(!total.not_null);
    assert_eq!(top.sql_type, decimal_13_4());
    assert!(!top.not_null);
}

#[test]
fn unknown_column_fails_the_query_only() {
    let catalog = catalog();
    let sql = "/* name: Bad :one */\nSELECT nope FROM users;\n\
               /* name: Good :one */\nSELECT id FROM users;";
    let analysis = analyze(&catalog, sql);
    assert_eq!(analysis.entries.len(), 1);
    assert_eq!(analysis.entries[0].query.name, "Good");
    assert_eq!(analysis.errors.len(), 1);
    assert!(analysis.errors[0].message.contains("nope"));
    assert_eq!(analysis.errors[0].line, 2);
}

#[test]
fn unknown_table_error() {
    let catalog = catalog();
    let message = one_error(&catalog, "/* name: Bad :many */\nSELECT * FROM ghosts");
    assert!(message.contains("ghosts"), "{message}");
}

#[test]
fn ambiguous_column_error() {
    let catalog = catalog();
    let message = one_error(
        &catalog,
        "/* name: Bad :many */\nSELECT id FROM users, orders",
    );
    assert!(message.contains("ambiguous"), "{message}");
}

#[test]
fn bare_placeholder_has_no_inferable_type() {
    let catalog = catalog();
    let message = one_error(&catalog, "/* name: Bad :one */\nSELECT ? FROM users");
    assert!(message.contains("parameter"), "{message}");
}

#[test]
fn malformed_annotation_is_an_error() {
    let catalog = catalog();
    let message = one_error(&catalog, "/* name: Bad :somecmd */\nSELECT * FROM users");
    assert!(message.contains("somecmd"), "{message}");
}

#[test]
fn unannotated_statements_are_skipped() {
    let catalog = catalog();
    let sql = "-- just a remark, not an annotation\nSELECT * FROM users;";
    let analyzer = Analyzer::new(&catalog);
    let analysis = analyzer.analyze_file("queries.sql", sql, CommentSyntax::Line);
    assert!(analysis.entries.is_empty());
    assert!(analysis.errors.is_empty());
}

#[test]
fn line_annotations_work() {
    let catalog = catalog();
    let analyzer = Analyzer::new(&catalog);
    let sql = "-- name: GetAges :many\nSELECT age FROM users;";
    let analysis = analyzer.analyze_file("queries.sql", sql, CommentSyntax::Line);
    assert!(analysis.errors.is_empty(), "{:?}", analysis.errors);
    assert_eq!(analysis.entries[0].query.name, "GetAges");
}

#[test]
fn unsupported_statement_kind() {
    let catalog = catalog();
    let message = one_error(&catalog, "/* name: Bad :exec */\nDROP TABLE users");
    assert!(message.contains("DROP"), "{message}");
}

#[test]
fn analysis_is_deterministic() {
    let catalog = catalog();
    let sql = "/* name: GetAllUsersOrders :many */\n\
               SELECT u.id user_id, o.price FROM orders o LEFT JOIN users u ON u.id = o.user_id \
               WHERE o.price > ?";
    let first = one_query(&catalog, sql);
    let second = one_query(&catalog, sql);
    assert_eq!(first, second);
}

#[test]
fn normalization_is_idempotent() {
    let catalog = catalog();
    let queries = [
        "SELECT id my_id, COUNT(id) id_count FROM users WHERE id > 4",
        "SELECT * FROM users",
        "SELECT u.id user_id FROM orders o LEFT JOIN users u ON u.id = o.user_id",
        "INSERT INTO users (first_name, last_name) VALUES (?, ?)",
        "UPDATE users SET first_name = ? WHERE id > ? LIMIT 3",
        "DELETE FROM orders WHERE price < ? ORDER BY id LIMIT 10",
    ];
    for sql in queries {
        let annotated = format!("/* name: Q :exec */\n{sql}");
        let first = one_query(&catalog, &annotated);
        let reannotated = format!("/* name: Q :exec */\n{}", first.sql);
        let second = one_query(&catalog, &reannotated);
        assert_eq!(first.sql, second.sql, "not idempotent for {sql}");
    }
}

#[test]
fn multiple_queries_in_one_file() {
    let catalog = catalog();
    let sql = "/* name: GetAll :many */\nSELECT * FROM users;\n\n\
               /* name: GetOne :one */\nSELECT first_name FROM users WHERE id = ?;\n\n\
               /* name: Remove :execrows */\nDELETE FROM users WHERE id = ?;";
    let analysis = analyze(&catalog, sql);
    assert!(analysis.errors.is_empty(), "{:?}", analysis.errors);
    let names: Vec<&str> = analysis
        .entries
        .iter()
        .map(|e| e.query.name.as_str())
        .collect();
    assert_eq!(names, ["GetAll", "GetOne", "Remove"]);
    assert_eq!(analysis.entries[2].query.cmd, CmdKind::ExecRows);
    assert_eq!(analysis.entries[1].range.start, 5);
}

#[test]
fn package_analysis_preserves_file_order() {
    let catalog = catalog();
    let analyzer = Analyzer::new(&catalog);
    let files = vec![
        QueryFile {
            filename: "a.sql".to_string(),
            sql: "-- name: GetAll :many\nSELECT * FROM users;".to_string(),
            syntax: CommentSyntax::Line,
        },
        QueryFile {
            filename: "b.sql".to_string(),
            sql: "-- name: Broken :one\nSELECT nope FROM users;\n\
                  -- name: GetOrders :many\nSELECT * FROM orders;"
                .to_string(),
            syntax: CommentSyntax::Line,
        },
    ];
    let analysis = analyzer.analyze_package(&files);
    let names: Vec<&str> = analysis
        .entries
        .iter()
        .map(|e| e.query.name.as_str())
        .collect();
    assert_eq!(names, ["GetAll", "GetOrders"]);
    assert_eq!(analysis.errors.len(), 1);
    assert_eq!(analysis.errors[0].filename, "b.sql");
}

#[test]
fn bundle_round_trips_through_json() {
    let catalog = catalog();
    let analyzer = Analyzer::new(&catalog);
    let analysis = analyzer.analyze_file(
        "queries.sql",
        "/* name: GetAll :many */\nSELECT * FROM users;",
        CommentSyntax::Block,
    );
    assert!(analysis.errors.is_empty());

    let bundle = Generateable {
        catalog: catalog.clone(),
        queries: analysis.entries,
        settings: GenerateSettings {
            package: "db".to_string(),
            ..Default::default()
        },
    };
    let json = serde_json::to_string(&bundle).unwrap();
    assert!(json.contains("\"GetAll\""));
    let back: Generateable = serde_json::from_str(&json).unwrap();
    assert_eq!(back, bundle);
}
