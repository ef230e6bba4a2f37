use chrono::NaiveDateTime;
use dbkit_api::temporal::parse_datetime;
use dbkit_api::{
    Column, DbError, KeyedData, Kind, MemoryCursor, QueryResult, Record, Value, build_insert_sql,
    build_update_sql, materialize, params,
};

#[derive(Record, Debug, Default, Clone, PartialEq)]
struct Audit {
    created_by: String,
    #[record(rename = "updatedAt")]
    updated_at: Option<NaiveDateTime>,
}

#[derive(Record, Debug, Default, Clone, PartialEq)]
struct User {
    id: Option<i64>,
    name: String,
    age: i32,
    score: Option<f64>,
    active: bool,
    tags: Vec<String>,
    #[record(flatten)]
    audit: Audit,
    #[record(skip)]
    note: String,
    meta: serde_json::Value,
}

fn columns(names: &[&str]) -> Vec<Column> {
    names.iter().map(|n| Column::new(*n, "", Kind::Any)).collect()
}

fn sample() -> User {
    User {
        id: Some(7),
        name: "Tom".into(),
        age: 30,
        score: Some(1.5),
        active: true,
        tags: vec!["dd".into(), "mm".into()],
        audit: Audit {
            created_by: "admin".into(),
            updated_at: parse_datetime("2024-01-02 03:04:05"),
        },
        note: String::new(),
        meta: serde_json::json!({"level": 2}),
    }
}

#[test]
fn field_table_is_flat_and_ordered() {
    let names: Vec<_> = User::fields().iter().map(|f| f.name).collect();
    assert_eq!(
        names,
        vec!["id", "name", "age", "score", "active", "tags", "created_by", "updatedAt", "meta"]
    );
    let tags = &User::fields()[5];
    assert_eq!(tags.kind, Kind::Json);
    assert!(!tags.optional);
    assert!(User::fields()[3].optional);
    assert_eq!(User::fields()[7].kind, Kind::Time);
}

#[test]
fn insert_from_record_skips_skipped_fields() {
    let (sql, values) = build_insert_sql("users", &sample(), false);
    assert_eq!(
        sql,
        "insert into `users` (`id`,`name`,`age`,`score`,`active`,`tags`,`created_by`,`updatedAt`,`meta`) values (?,?,?,?,?,?,?,?,?)"
    );
    assert_eq!(values.len(), 9);
    assert_eq!(values[5], Value::from(r#"["dd","mm"]"#));
    assert_eq!(values[8], Value::from(r#"{"level":2}"#));
}

#[test]
fn absent_optional_binds_null() {
    let user = User {
        id: None,
        ..sample()
    };
    let (sql, values) = build_update_sql("users", &user, "id=?", &params![7]);
    assert!(sql.starts_with("update `users` set `id`=?,`name`=?"));
    assert!(sql.ends_with(" where id=?"));
    assert_eq!(values[0], Value::Null);
    assert_eq!(values.last(), Some(&Value::Int(7)));
}

#[test]
fn rows_into_records() {
    let mut cursor = MemoryCursor::new(
        columns(&["id", "name", "Age", "score", "active", "tags", "createdBy", "updatedAt", "extra", "note"]),
        vec![
            vec![
                Value::Int(1),
                Value::from("a"),
                Value::Int(30),
                Value::Null,
                Value::Int(1),
                Value::from(r#"["x","y"]"#),
                Value::from("root"),
                Value::from("2024-01-02 03:04:05"),
                Value::from("ignored"),
                Value::from("not mapped"),
            ],
            vec![
                Value::Int(2),
                Value::from("b"),
                Value::from("31"),
                Value::Float(2.0),
                Value::Int(0),
                Value::from("[oops"),
                Value::Null,
                Value::Null,
                Value::Null,
                Value::Null,
            ],
        ],
    );
    let mut users: Vec<User> = Vec::new();
    materialize(&mut cursor, &mut users).unwrap();
    assert_eq!(users.len(), 2);

    let first = &users[0];
    assert_eq!(first.id, Some(1));
    assert_eq!(first.age, 30);
    assert_eq!(first.score, None);
    assert!(first.active);
    assert_eq!(first.tags, vec!["x", "y"]);
    assert_eq!(first.audit.created_by, "root");
    assert_eq!(first.audit.updated_at, parse_datetime("2024-01-02 03:04:05"));
    assert_eq!(first.note, "");

    let second = &users[1];
    assert_eq!(second.age, 31);
    assert_eq!(second.score, Some(2.0));
    assert!(second.tags.is_empty());
    assert_eq!(second.audit.updated_at, None);
    assert_eq!(cursor.close_calls(), 1);
}

#[test]
fn single_record_reads_first_of_three_rows() {
    let rows = (1..=3)
        .map(|i| vec![Value::Int(i), Value::from(format!("u{i}"))])
        .collect();
    let mut cursor = MemoryCursor::new(columns(&["id", "name"]), rows);
    let mut user = User::default();
    materialize(&mut cursor, &mut user).unwrap();
    assert_eq!(user.id, Some(1));
    assert_eq!(user.name, "u1");
    assert_eq!(cursor.remaining(), 0);
    assert_eq!(cursor.close_calls(), 1);
}

#[test]
fn built_values_round_trip_through_a_cursor() {
    let user = sample();
    let pairs = user.keyed_values();
    let names: Vec<&str> = pairs.iter().map(|(k, _)| k.as_str()).collect();
    let row = pairs.iter().map(|(_, v)| v.clone()).collect();
    let mut result = QueryResult::new(
        Box::new(MemoryCursor::new(columns(&names), vec![row])),
        "select * from users",
        vec![],
        0.0,
    );
    let mut back = User::default();
    result.to(&mut back).unwrap();
    assert_eq!(back, user);
    assert_eq!(result.to(&mut back), Err(DbError::InvalidResult));
}
