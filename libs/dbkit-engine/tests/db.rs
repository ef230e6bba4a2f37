use std::collections::HashMap;

use chrono::NaiveDateTime;
use dbkit_api::temporal::parse_datetime;
use dbkit_api::{DbError, Record, Value, params};
use dbkit_engine::{Db, DbConfig};
use tempfile::TempDir;

#[derive(Record, Debug, Default, Clone, PartialEq)]
struct User {
    id: Option<i64>,
    name: String,
    age: i32,
    score: Option<f64>,
    active: bool,
    tags: Vec<String>,
    created: NaiveDateTime,
}

const SCHEMA: &str = "create table users (
    id integer primary key autoincrement,
    name text not null,
    age integer,
    score real,
    active boolean,
    tags text,
    created datetime
)";

fn open(dir: &TempDir, file: &str) -> Db {
    let path = dir.path().join(file);
    let config = DbConfig {
        host: path.to_string_lossy().into_owned(),
        max_opens: 2,
        ..DbConfig::default()
    };
    Db::open(config).unwrap()
}

fn users_db() -> (TempDir, Db) {
    let dir = tempfile::tempdir().unwrap();
    let db = open(&dir, "users.db");
    db.exec(SCHEMA, &[]).unwrap();
    (dir, db)
}

fn user(name: &str, age: i32) -> User {
    User {
        id: None,
        name: name.to_string(),
        age,
        score: Some(1.5),
        active: true,
        tags: vec!["a".into(), "b".into()],
        created: parse_datetime("2024-01-02 03:04:05").unwrap(),
    }
}

fn count(db: &Db) -> i64 {
    db.query("select count(*) from users", &[])
        .unwrap()
        .int_on_r1c1()
        .unwrap()
}

#[test]
fn insert_then_read_back_the_same_record() {
    let (_dir, db) = users_db();
    let tom = User {
        score: None,
        ..user("Tom", 30)
    };
    let r = db.insert("users", &tom).unwrap();
    assert_eq!(r.changes(), 1);
    assert_eq!(r.args()[0], Value::Null);

    let mut users: Vec<User> = Vec::new();
    db.query("select * from users", &[]).unwrap().to(&mut users).unwrap();
    assert_eq!(users.len(), 1);
    let expected = User {
        id: Some(r.id()),
        ..tom
    };
    assert_eq!(users[0], expected);
}

#[test]
fn raw_expression_is_inlined() {
    let (_dir, db) = users_db();
    let data = vec![
        ("name", Value::from("x")),
        ("age", Value::from(":20+1")),
        ("created", Value::sql_expr("datetime('now')")),
    ];
    let r = db.insert("users", &data).unwrap();
    assert_eq!(r.sql(), "insert into `users` (`name`,`age`,`created`) values (?,20+1,datetime('now'))");
    assert_eq!(r.args(), &[Value::from("x")]);
    let age = db
        .query("select age from users where id=?", &params![r.id()])
        .unwrap()
        .int_on_r1c1()
        .unwrap();
    assert_eq!(age, 21);
}

#[test]
fn update_without_where_changes_every_row() {
    let (_dir, db) = users_db();
    for (i, name) in ["a", "b", "c"].iter().enumerate() {
        db.insert("users", &user(name, i as i32)).unwrap();
    }
    let r = db.update("users", &vec![("age", 99)], "", &[]).unwrap();
    assert_eq!(r.sql(), "update `users` set `age`=?");
    assert_eq!(r.changes(), 3);
    let ages = db.query("select age from users", &[]).unwrap().ints_on_c1().unwrap();
    assert_eq!(ages, vec![99, 99, 99]);

    let r = db.update("users", &vec![("age", 1)], "name=?", &params!["b"]).unwrap();
    assert_eq!(r.changes(), 1);
}

#[test]
fn replace_overwrites_by_key() {
    let (_dir, db) = users_db();
    let first = db.insert("users", &user("a", 1)).unwrap();
    let again = User {
        id: Some(first.id()),
        ..user("renamed", 2)
    };
    db.replace("users", &again).unwrap();
    assert_eq!(count(&db), 1);
    let name = db
        .query("select name from users", &[])
        .unwrap()
        .string_on_r1c1()
        .unwrap();
    assert_eq!(name, "renamed");

    assert!(matches!(db.insert("users", &again), Err(DbError::Driver(_))));
}

#[test]
fn transactions_commit_rollback_and_drop() {
    let (_dir, db) = users_db();

    let mut tx = db.begin().unwrap();
    tx.insert("users", &user("a", 1)).unwrap();
    tx.rollback().unwrap();
    assert!(tx.is_finished());
    assert!(tx.commit().is_ok());
    drop(tx);
    assert_eq!(count(&db), 0);

    let mut tx = db.begin().unwrap();
    tx.insert("users", &user("b", 2)).unwrap();
    let in_tx = tx.query("select count(*) from users", &[]).unwrap().int_on_r1c1().unwrap();
    assert_eq!(in_tx, 1);
    tx.finish(true).unwrap();
    assert!(matches!(tx.exec("delete from users", &[]), Err(DbError::BadConnection)));
    drop(tx);
    assert_eq!(count(&db), 1);

    {
        let tx = db.begin().unwrap();
        tx.insert("users", &user("c", 3)).unwrap();
    }
    assert_eq!(count(&db), 1);
}

#[test]
fn queries_go_to_the_replica() {
    let dir = tempfile::tempdir().unwrap();
    for (file, label) in [("primary.db", "primary"), ("replica.db", "replica")] {
        let db = open(&dir, file);
        db.exec("create table t (v text)", &[]).unwrap();
        db.insert("t", &vec![("v", label.to_string())]).unwrap();
    }

    let config = DbConfig {
        host: dir.path().join("primary.db").to_string_lossy().into_owned(),
        readonly_hosts: vec![dir.path().join("replica.db").to_string_lossy().into_owned()],
        ..DbConfig::default()
    };
    let db = Db::open(config).unwrap();
    assert_eq!(db.replica_count(), 1);
    assert_eq!(db.query("select v from t", &[]).unwrap().string_on_r1c1().unwrap(), "replica");

    db.exec("update t set v = ?", &params!["written"]).unwrap();
    let tx = db.begin().unwrap();
    let primary = tx.query("select v from t", &[]).unwrap().string_on_r1c1().unwrap();
    assert_eq!(primary, "written");
}

#[test]
fn missing_replica_falls_back_to_primary() {
    let dir = tempfile::tempdir().unwrap();
    let config = DbConfig {
        host: dir.path().join("main.db").to_string_lossy().into_owned(),
        readonly_hosts: vec![dir.path().join("absent.db").to_string_lossy().into_owned()],
        ..DbConfig::default()
    };
    let db = Db::open(config).unwrap();
    assert_eq!(db.replica_count(), 0);
    db.exec("create table t (v integer)", &[]).unwrap();
    assert_eq!(db.query("select count(*) from t", &[]).unwrap().int_on_r1c1().unwrap(), 0);
}

#[test]
fn iso_datetime_text_is_normalized() {
    let (_dir, db) = users_db();
    db.exec(
        "insert into users (name, created) values (?, ?)",
        &params!["iso", "2024-01-02T03:04:05.000Z"],
    )
    .unwrap();
    let created = db
        .query("select created from users", &[])
        .unwrap()
        .string_on_r1c1()
        .unwrap();
    assert_eq!(created, "2024-01-02 03:04:05");

    let users: Vec<User> = {
        let mut users = Vec::new();
        db.query("select * from users", &[]).unwrap().to(&mut users).unwrap();
        users
    };
    assert_eq!(users[0].created, parse_datetime("2024-01-02 03:04:05").unwrap());
}

#[test]
fn single_record_from_many_rows() {
    let (_dir, db) = users_db();
    for name in ["first", "second", "third"] {
        db.insert("users", &user(name, 5)).unwrap();
    }
    let mut one = User::default();
    db.query("select * from users order by id", &[])
        .unwrap()
        .to(&mut one)
        .unwrap();
    assert_eq!(one.name, "first");
    assert_eq!(one.id, Some(1));
}

#[test]
fn null_into_optional_stays_unset() {
    let (_dir, db) = users_db();
    db.exec("insert into users (name) values ('n')", &[]).unwrap();
    let mut users: Vec<User> = Vec::new();
    db.query("select * from users", &[]).unwrap().to(&mut users).unwrap();
    assert_eq!(users[0].score, None);
    assert!(users[0].tags.is_empty());
    assert_eq!(users[0].age, 0);
}

#[test]
fn key_value_projection() {
    let (_dir, db) = users_db();
    db.insert("users", &user("a", 1)).unwrap();
    db.insert("users", &user("b", 2)).unwrap();

    let mut ages: HashMap<String, i64> = HashMap::new();
    ages.insert("a".into(), 100);
    ages.insert("keep".into(), 7);
    db.query("select name, age from users", &[])
        .unwrap()
        .to_kv(&mut ages)
        .unwrap();
    assert_eq!(ages.len(), 3);
    assert_eq!(ages["a"], 1);
    assert_eq!(ages["b"], 2);
    assert_eq!(ages["keep"], 7);

    let mut by_id: HashMap<i64, User> = HashMap::new();
    db.query("select * from users", &[]).unwrap().to_kv(&mut by_id).unwrap();
    assert_eq!(by_id[&2].name, "b");
}

#[test]
fn prepared_statements() {
    let (_dir, db) = users_db();
    let mut stmt = db.prepare("insert into users (name, age) values (?, ?)").unwrap();
    for i in 0..3 {
        stmt.exec(&params![format!("u{i}"), i]).unwrap();
    }
    stmt.close().unwrap();
    assert!(matches!(stmt.exec(&params!["x", 1]), Err(DbError::BadConnection)));
    drop(stmt);
    assert_eq!(count(&db), 3);

    assert!(db.prepare("insert into nowhere values (1)").is_err());
}

#[test]
fn map_results_follow_column_order() {
    let (_dir, db) = users_db();
    db.insert("users", &user("a", 1)).unwrap();
    let rows = db
        .query("select name, age, score from users", &[])
        .unwrap()
        .map_results()
        .unwrap();
    let keys: Vec<&str> = rows[0].keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["name", "age", "score"]);
    assert_eq!(rows[0]["age"], Value::Int(1));
    assert_eq!(
        serde_json::to_string(&rows[0]).unwrap(),
        r#"{"name":"a","age":1,"score":1.5}"#
    );
}

#[test]
fn driver_errors_are_reported() {
    let (_dir, db) = users_db();
    assert!(matches!(db.query("select nope from users", &[]), Err(DbError::Driver(_))));
    assert!(matches!(db.exec("insert into missing values (1)", &[]), Err(DbError::Driver(_))));
}

#[test]
fn double_quote_dialect_from_config() {
    let db = Db::from_url("sqlite://:memory:?quote=%22").unwrap();
    db.exec("create table \"odd table\" (v integer)", &[]).unwrap();
    let r = db.insert("odd table", &vec![("v", 1)]).unwrap();
    assert_eq!(r.sql(), r#"insert into "odd table" ("v") values (?)"#);
}

#[test]
fn query_beside_an_open_transaction_on_one_connection() {
    let db = Db::from_url("sqlite://:memory:").unwrap();
    db.exec("create table t (v integer)", &[]).unwrap();

    let mut tx = db.begin().unwrap();
    tx.exec("insert into t values (1)", &[]).unwrap();
    assert!(matches!(db.query("select count(*) from t", &[]), Err(DbError::BadConnection)));
    assert!(matches!(db.exec("insert into t values (2)", &[]), Err(DbError::BadConnection)));
    assert!(matches!(db.begin(), Err(DbError::BadConnection)));
    assert_eq!(tx.query("select count(*) from t", &[]).unwrap().int_on_r1c1().unwrap(), 1);
    tx.commit().unwrap();
    drop(tx);

    assert_eq!(db.query("select count(*) from t", &[]).unwrap().int_on_r1c1().unwrap(), 1);
}

#[test]
fn query_beside_an_open_transaction_uses_another_connection() {
    let (_dir, db) = users_db();
    let mut tx = db.begin().unwrap();
    tx.insert("users", &user("pending", 1)).unwrap();
    assert_eq!(count(&db), 0);
    tx.commit().unwrap();
    drop(tx);
    assert_eq!(count(&db), 1);
}

#[test]
fn non_iso_text_in_datetime_column_is_kept() {
    let (_dir, db) = users_db();
    db.exec(
        "insert into users (name, created) values (?, ?)",
        &params!["later", "Tomorrow"],
    )
    .unwrap();
    let created = db
        .query("select created from users", &[])
        .unwrap()
        .string_on_r1c1()
        .unwrap();
    assert_eq!(created, "Tomorrow");
}

#[test]
fn in_list_from_values() {
    let (_dir, db) = users_db();
    for (i, name) in ["a", "b", "c", "d"].iter().enumerate() {
        db.insert("users", &user(name, i as i32)).unwrap();
    }
    let (keys, mut args) = dbkit_api::in_values(["b", "d", "zz"]);
    args.push(Value::from(2));
    let names = db
        .query(
            &format!("select name from users where name in {keys} and age > ? order by name"),
            &args,
        )
        .unwrap()
        .strings_on_c1()
        .unwrap();
    assert_eq!(names, vec!["d"]);
}
