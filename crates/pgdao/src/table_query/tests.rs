use super::*;
use crate::error::OrmError;
use crate::test_support::{Order, ScriptedExecutor, User, row};

const USER_SELECT: &str = "SELECT *, UPPER(user_name) AS name_upper FROM users";

// ==================== Rendering ====================

#[test]
fn default_select_filters_deleted_rows() {
    let q = TableQuery::<User>::new();
    let stmt = q.build_statement(Some(DEFAULT_LIMIT), Some(DEFAULT_OFFSET));
    assert_eq!(
        stmt.sql,
        format!("{USER_SELECT} WHERE is_deleted = false LIMIT 100 OFFSET 0")
    );
    assert!(stmt.params.is_empty());
}

#[test]
fn conditions_are_grouped_before_soft_delete() {
    let mut q = TableQuery::<User>::new();
    q.where_("name", Op::Eq, "ada")
        .or()
        .where_("age", Op::Gt, 30);
    let stmt = q.build_statement(None, None);
    assert_eq!(
        stmt.sql,
        format!("{USER_SELECT} WHERE (user_name = $1 OR age > $2) AND is_deleted = false")
    );
    assert_eq!(stmt.params, vec![Value::from("ada"), Value::Int(30)]);
}

#[test]
fn computed_fields_use_their_expression() {
    let mut q = TableQuery::<User>::new();
    q.where_("name_upper", Op::Like, "A%")
        .order_by("name_upper", Direction::Desc);
    let stmt = q.build_statement(None, None);
    assert_eq!(
        stmt.sql,
        format!(
            "{USER_SELECT} WHERE (UPPER(user_name) LIKE $1) AND is_deleted = false \
             ORDER BY UPPER(user_name) DESC"
        )
    );
}

#[test]
fn transform_wraps_column() {
    let mut q = TableQuery::<User>::new();
    q.where_with("email", Op::Eq, "A@B.C", Transform::Lower);
    let stmt = q.build_statement(None, None);
    assert!(stmt.sql.contains("WHERE (LOWER(email) = $1)"));
}

#[test]
fn in_list_and_null_checks() {
    let mut q = TableQuery::<User>::new();
    q.where_("age", Op::In, vec![1, 2, 3])
        .and()
        .where_("email", Op::IsNull, ())
        .and()
        .where_("id", Op::NotIn, Vec::<String>::new());
    let stmt = q.build_statement(None, None);
    assert_eq!(
        stmt.sql,
        format!(
            "{USER_SELECT} WHERE (age IN ($1, $2, $3) AND email IS NULL AND 1 = 1) \
             AND is_deleted = false"
        )
    );
    assert_eq!(stmt.params.len(), 3);
}

#[test]
fn misuse_leaves_builder_unchanged() {
    let mut q = TableQuery::<User>::new();
    q.where_("nope", Op::Eq, 1)
        .where_("age", Op::In, 5)
        .where_("age", Op::Eq, None::<i32>)
        .order_by("nope", Direction::Asc);
    assert!(q.is_idle());
}

#[test]
fn explicit_limit_and_offset_win() {
    let mut q = TableQuery::<User>::new();
    q.order_by("name", Direction::default()).limit(5).offset(10);
    let stmt = q.build_statement(Some(100), Some(0));
    assert_eq!(
        stmt.sql,
        format!("{USER_SELECT} WHERE is_deleted = false ORDER BY user_name ASC LIMIT 5 OFFSET 10")
    );

    let q = TableQuery::<User>::new();
    let stmt = q.build_statement(None, None);
    assert!(!stmt.sql.contains("LIMIT"));
    assert!(!stmt.sql.contains("OFFSET"));
}

#[test]
fn aliased_fragment_prefixes_every_column() {
    let mut q = TableQuery::<Order>::new();
    q.where_("status", Op::Eq, "open");
    let fragment = q.build_fragment(Some("table2"), None, None);
    assert_eq!(
        fragment.to_unnumbered_sql(),
        "SELECT id AS table2_id, is_deleted AS table2_is_deleted, \
         create_date AS table2_create_date, update_date AS table2_update_date, \
         user_id AS table2_user_id, total AS table2_total, status AS table2_status \
         FROM orders WHERE (status = $) AND is_deleted = false"
    );
    assert_eq!(fragment.params(), &[Value::from("open")]);
}

#[test]
fn aliased_fragment_lists_computed_fields_last() {
    let q = TableQuery::<User>::new();
    let sql = q.build_fragment(Some("table1"), None, None).to_unnumbered_sql();
    assert!(sql.contains("age AS table1_age, UPPER(user_name) AS table1_name_upper FROM users"));
}

// ==================== Execution ====================

#[tokio::test]
async fn execute_hydrates_and_resets() {
    let conn = ScriptedExecutor::new().rows(vec![
        row(&[("id", Value::from("u1")), ("user_name", Value::from("ada"))]),
        row(&[("id", Value::from("u2")), ("user_name", Value::from("bob"))]),
    ]);
    let mut q = TableQuery::<User>::new();
    q.where_("age", Op::Gte, 18);

    let users = q.execute(&conn).await.unwrap().unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[1].name, "bob");
    assert!(q.is_idle());
    assert_eq!(
        conn.sql(0),
        format!("{USER_SELECT} WHERE (age >= $1) AND is_deleted = false LIMIT 100 OFFSET 0")
    );
}

#[tokio::test]
async fn execute_passes_through_no_result() {
    let conn = ScriptedExecutor::new().no_result();
    let result = TableQuery::<User>::new().execute(&conn).await.unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn execute_failure_resets_and_propagates() {
    let conn = ScriptedExecutor::new().fail("boom");
    let mut q = TableQuery::<User>::new();
    q.where_("age", Op::Eq, 1);
    let err = q.execute(&conn).await.unwrap_err();
    assert!(matches!(err, OrmError::Other(ref m) if m == "boom"));
    assert!(q.is_idle());
}

#[tokio::test]
async fn paginated_execute_counts_then_pages() {
    let conn = ScriptedExecutor::new()
        .rows(vec![row(&[("count", Value::Int(45))])])
        .rows(vec![row(&[("id", Value::from("u11"))])]);
    let mut q = TableQuery::<User>::new();
    q.where_("age", Op::Gt, 1).limit(3).offset(7);

    let page = q
        .paginated_execute(&conn, PageRequest::new(2, 10))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(page.total_entries, 45);
    assert_eq!(page.total_pages, 5);
    assert_eq!(page.current_page, 2);
    assert!(page.has_more);
    assert_eq!(page.rows[0].id, "u11");
    assert!(q.is_idle());

    let base = format!("{USER_SELECT} WHERE (age > $1) AND is_deleted = false");
    assert_eq!(
        conn.sql(0),
        format!("SELECT COUNT(*) AS count FROM ({base}) AS count_table")
    );
    assert_eq!(conn.sql(1), format!("{base} LIMIT 10 OFFSET 10"));
    assert_eq!(conn.params(0), conn.params(1));
}

#[tokio::test]
async fn paginated_execute_without_count_is_none() {
    let conn = ScriptedExecutor::new().rows(vec![row(&[("other", Value::Int(1))])]);
    let page = TableQuery::<User>::new()
        .paginated_execute(&conn, PageRequest::default())
        .await
        .unwrap();
    assert!(page.is_none());
    assert_eq!(conn.calls().len(), 1);
}

#[tokio::test]
async fn paginated_execute_clamps_request() {
    let conn = ScriptedExecutor::new()
        .rows(vec![row(&[("count", Value::from("0"))])])
        .rows(Vec::new());
    let page = TableQuery::<User>::new()
        .paginated_execute(&conn, PageRequest { page: 0, page_size: 0 })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(page.current_page, 1);
    assert_eq!(page.page_size, 1);
    assert!(conn.sql(1).ends_with("LIMIT 1 OFFSET 0"));
}

#[tokio::test]
async fn read_by_id() {
    let conn = ScriptedExecutor::new()
        .rows(vec![row(&[("id", Value::from("u1"))])])
        .rows(Vec::new());
    let mut q = TableQuery::<User>::new();

    let user = q.read(&conn, "u1").await.unwrap();
    assert_eq!(user.map(|u| u.id), Some("u1".to_string()));
    assert_eq!(conn.params(0), vec![Value::from("u1")]);

    let missing = q.read(&conn, "u2").await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn read_combines_pending_conditions() {
    let conn = ScriptedExecutor::new();
    let mut q = TableQuery::<User>::new();
    q.where_("age", Op::Gt, 18);
    q.read(&conn, "u1").await.unwrap();
    assert!(conn.sql(0).contains("WHERE (age > $1 AND id = $2) AND is_deleted = false"));
}

#[tokio::test]
async fn read_many_by_ids() {
    let conn = ScriptedExecutor::new().rows(vec![
        row(&[("id", Value::from("a"))]),
        row(&[("id", Value::from("b"))]),
    ]);
    let mut q = TableQuery::<User>::new();
    let users = q.read_many(&conn, ["a", "b"]).await.unwrap().unwrap();
    assert_eq!(users.len(), 2);
    assert!(conn.sql(0).contains("WHERE (id IN ($1, $2))"));

    let none = q.read_many(&conn, Vec::<String>::new()).await.unwrap();
    assert_eq!(none.map(|v| v.len()), Some(0));
    assert_eq!(conn.calls().len(), 1);
}

// ==================== Mutations ====================

#[tokio::test]
async fn create_stamps_and_assigns_id() {
    let conn = ScriptedExecutor::new().rows(vec![row(&[("id", Value::from("new-id"))])]);
    let mut user = User {
        id: "ignored".into(),
        is_deleted: true,
        update_date: Some(Utc::now()),
        name: "ada".into(),
        age: 36,
        ..User::default()
    };

    let created = TableQuery::<User>::new().create(&conn, &mut user).await.unwrap();
    assert!(created);
    assert_eq!(user.id, "new-id");
    assert!(!user.is_deleted);
    assert!(user.update_date.is_none());

    assert_eq!(
        conn.sql(0),
        "INSERT INTO users (is_deleted, create_date, update_date, user_name, email, age) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING id"
    );
    let params = conn.params(0);
    assert_eq!(params[0], Value::Bool(false));
    assert_eq!(params[1], Value::Timestamp(user.create_date));
    assert_eq!(params[2], Value::Null);
    assert_eq!(params[3], Value::from("ada"));
    assert_eq!(params[5], Value::Int(36));
}

#[tokio::test]
async fn create_many_is_one_statement() {
    let conn = ScriptedExecutor::new().rows(vec![
        row(&[("id", Value::Int(7))]),
        row(&[("id", Value::Int(8))]),
    ]);
    let mut orders = vec![Order::default(), Order::default()];

    let created = TableQuery::<Order>::new()
        .create_many(&conn, &mut orders)
        .await
        .unwrap();
    assert!(created);
    assert_eq!(orders[0].id, "7");
    assert_eq!(orders[1].id, "8");
    assert_eq!(conn.calls().len(), 1);
    assert!(conn.sql(0).ends_with(
        "VALUES ($1, $2, $3, $4, $5, $6), ($7, $8, $9, $10, $11, $12) RETURNING id"
    ));
    assert_eq!(conn.params(0).len(), 12);
}

#[tokio::test]
async fn create_many_empty_skips_executor() {
    let conn = ScriptedExecutor::new();
    let created = TableQuery::<Order>::new()
        .create_many(&conn, &mut [])
        .await
        .unwrap();
    assert!(!created);
    assert!(conn.calls().is_empty());
}

#[tokio::test]
async fn create_without_result_is_false() {
    let conn = ScriptedExecutor::new().no_result();
    let mut order = Order::default();
    let created = TableQuery::<Order>::new().create(&conn, &mut order).await.unwrap();
    assert!(!created);
    assert!(order.id.is_empty());
}

#[tokio::test]
async fn update_skips_identity_columns() {
    let conn = ScriptedExecutor::new().rows(vec![row(&[("id", Value::from("u1"))])]);
    let mut user = User {
        id: "u1".into(),
        is_deleted: true,
        name: "ada".into(),
        ..User::default()
    };

    let matched = TableQuery::<User>::new().update(&conn, &mut user).await.unwrap();
    assert!(matched);
    assert!(!user.is_deleted);
    assert!(user.update_date.is_some());
    assert_eq!(
        conn.sql(0),
        "UPDATE users SET is_deleted = $1, update_date = $2, user_name = $3, email = $4, age = $5 \
         WHERE id = $6 RETURNING id"
    );
    assert_eq!(conn.params(0)[5], Value::from("u1"));
}

#[tokio::test]
async fn update_many_skips_failures() {
    let conn = ScriptedExecutor::new()
        .rows(vec![row(&[("id", Value::from("o1"))])])
        .fail("constraint")
        .rows(vec![row(&[("id", Value::from("o3"))])]);
    let orders: Vec<Order> = ["o1", "o2", "o3"]
        .into_iter()
        .map(|id| Order {
            id: id.into(),
            ..Order::default()
        })
        .collect();

    let updated = TableQuery::<Order>::new()
        .update_many(&conn, orders)
        .await
        .unwrap();
    let ids: Vec<_> = updated.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, vec!["o1", "o3"]);
    assert_eq!(conn.calls().len(), 3);
}

#[tokio::test]
async fn update_many_excludes_unmatched() {
    let conn = ScriptedExecutor::new()
        .rows(Vec::new())
        .rows(vec![row(&[("id", Value::from("o2"))])]);
    let orders = vec![
        Order {
            id: "o1".into(),
            ..Order::default()
        },
        Order {
            id: "o2".into(),
            ..Order::default()
        },
    ];
    let updated = TableQuery::<Order>::new()
        .update_many(&conn, orders)
        .await
        .unwrap();
    assert_eq!(updated.len(), 1);
    assert_eq!(updated[0].id, "o2");
}

#[tokio::test]
async fn update_many_empty_is_none() {
    let conn = ScriptedExecutor::new();
    assert!(TableQuery::<Order>::new().update_many(&conn, Vec::new()).await.is_none());
    assert!(conn.calls().is_empty());
}

#[tokio::test]
async fn delete_is_soft() {
    let conn = ScriptedExecutor::new()
        .rows(vec![row(&[("id", Value::from("o1"))])])
        .rows(Vec::new());
    let order = Order {
        id: "o1".into(),
        ..Order::default()
    };
    let q = TableQuery::<Order>::new();

    assert!(q.delete(&conn, &order).await.unwrap());
    assert_eq!(
        conn.sql(0),
        "UPDATE orders SET is_deleted = true WHERE id = $1 RETURNING id"
    );
    assert!(!q.delete(&conn, &order).await.unwrap());
}

#[tokio::test]
async fn delete_many_aborts_on_failure() {
    let conn = ScriptedExecutor::new()
        .rows(vec![row(&[("id", Value::from("o1"))])])
        .fail("lost connection");
    let orders: Vec<Order> = ["o1", "o2", "o3"]
        .into_iter()
        .map(|id| Order {
            id: id.into(),
            ..Order::default()
        })
        .collect();

    let err = TableQuery::<Order>::new()
        .delete_many(&conn, &orders)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("lost connection"));
    assert_eq!(conn.calls().len(), 2);
}

#[tokio::test]
async fn delete_many_reports_each_match() {
    let conn = ScriptedExecutor::new()
        .rows(vec![row(&[("id", Value::from("o1"))])])
        .rows(Vec::new());
    let orders = vec![Order::default(), Order::default()];
    let results = TableQuery::<Order>::new()
        .delete_many(&conn, &orders)
        .await
        .unwrap();
    assert_eq!(results, Some(vec![true, false]));

    let empty = TableQuery::<Order>::new().delete_many(&conn, &[]).await.unwrap();
    assert!(empty.is_none());
}
