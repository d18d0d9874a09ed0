use anyhow::Result;
use rust_sqlite::{
    Assignment, ColumnDefinition, Condition, DataType, Database, DefaultValue, Error, Fragment,
    Logic, OrderBy, Params, Row, Schema, SelectOptions, Selection, SqlQuery, SqliteConfig,
    TableDefinition, Value, Where,
};
use tempfile::NamedTempFile;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn person_columns() -> Vec<ColumnDefinition> {
    vec![
        ColumnDefinition::new("id", DataType::Integer).primary_key().not_null(),
        ColumnDefinition::new("name", DataType::Text),
    ]
}

// Helper function to create an in-memory database with the person table
fn create_test_db() -> Result<Database> {
    init_tracing();
    let db = Database::open_in_memory()?;
    assert!(db.create_table("person", &person_columns())?);
    Ok(db)
}

fn insert_people(db: &Database, people: &[(i64, &str)]) -> Result<()> {
    for (id, name) in people {
        assert!(db.insert("person", &[Value::from(*id), Value::from(*name)], None)?);
    }
    Ok(())
}

fn person(id: i64, name: &str) -> Row {
    Row::new(
        vec!["id".to_string(), "name".to_string()],
        vec![Value::Integer(id), Value::from(name)],
    )
}

#[test]
fn person_scenario() -> Result<()> {
    let db = create_test_db()?;
    insert_people(&db, &[(1, "Ann")])?;

    let found = db.select(
        "person",
        &SelectOptions::new().filter(Condition::equal("id", 1)),
    )?;
    assert_eq!(found, Selection::One(person(1, "Ann")));

    assert!(db.drop_table("person")?);
    assert!(!db.has_table("person")?);
    Ok(())
}

#[test]
fn create_table_twice_is_already_exists() -> Result<()> {
    let db = create_test_db()?;
    let err = db.create_table("person", &person_columns()).unwrap_err();
    assert!(matches!(err, Error::AlreadyExists(ref name) if name == "person"));
    Ok(())
}

#[test]
fn create_table_rejects_empty_columns() -> Result<()> {
    let db = Database::open_in_memory()?;
    let err = db.create_table("empty", &[]).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    assert!(!db.has_table("empty")?);
    Ok(())
}

#[test]
fn drop_missing_table_is_false() -> Result<()> {
    let db = Database::open_in_memory()?;
    assert!(!db.drop_table("nothing_here")?);
    Ok(())
}

#[test]
fn select_shape_follows_match_count() -> Result<()> {
    let db = create_test_db()?;
    insert_people(&db, &[(1, "Ann"), (2, "Bob"), (3, "Cid")])?;

    let none = db.select(
        "person",
        &SelectOptions::new().filter(Condition::equal("name", "Zed")),
    )?;
    assert_eq!(none, Selection::Empty);

    let one = db.select(
        "person",
        &SelectOptions::new().filter(Condition::like("name", "B%")),
    )?;
    assert_eq!(one, Selection::One(person(2, "Bob")));

    let many = db.select("person", &SelectOptions::new().order_by(OrderBy::desc("id")))?;
    assert_eq!(
        many,
        Selection::Many(vec![person(3, "Cid"), person(2, "Bob"), person(1, "Ann")])
    );
    Ok(())
}

#[test]
fn select_columns_and_limit() -> Result<()> {
    let db = create_test_db()?;
    insert_people(&db, &[(1, "Ann"), (2, "Bob"), (3, "Cid")])?;

    let rows = db.select(
        "person",
        &SelectOptions::new()
            .columns(["name"])
            .order_by(OrderBy::asc("name"))
            .limit(2),
    )?;
    let names: Vec<Value> = rows
        .into_rows()
        .into_iter()
        .map(|r| r.get("name").cloned().unwrap_or(Value::Null))
        .collect();
    assert_eq!(names, vec![Value::from("Ann"), Value::from("Bob")]);
    Ok(())
}

#[test]
fn select_with_compound_where() -> Result<()> {
    let db = create_test_db()?;
    insert_people(&db, &[(1, "Ann"), (2, "Bob"), (3, "Cid"), (4, "Dee")])?;

    let filter = Where::new([
        Fragment::from(Condition::between("id", 2, 4, false)),
        Fragment::from(Logic::And),
        Fragment::from(Logic::Not),
        Fragment::from(Condition::in_set("name", ["Cid", "Dee"])?),
    ])?;
    let found = db.select("person", &SelectOptions::new().filter(filter))?;
    assert_eq!(found, Selection::One(person(2, "Bob")));
    Ok(())
}

#[test]
fn bad_order_direction_is_invalid_argument() {
    let err = OrderBy::parse("id", "SIDEWAYS").unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[test]
fn bound_values_are_never_spliced_into_sql() -> Result<()> {
    let db = create_test_db()?;
    let hostile = "x'; DROP TABLE person; --";
    insert_people(&db, &[(1, hostile)])?;

    let found = db.select(
        "person",
        &SelectOptions::new().filter(Condition::equal("name", hostile)),
    )?;
    assert_eq!(found, Selection::One(person(1, hostile)));
    assert!(db.has_table("person")?);
    Ok(())
}

#[test]
fn hostile_identifiers_are_rejected() -> Result<()> {
    let db = create_test_db()?;
    let err = db
        .select("person; DROP TABLE person", &SelectOptions::new())
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));

    let err = db
        .delete("person", &Where::from(Condition::equal("1=1 OR id", 1)))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    assert!(db.has_table("person")?);
    Ok(())
}

#[test]
fn insert_with_columns_uses_defaults() -> Result<()> {
    let db = Database::open_in_memory()?;
    db.create_table(
        "car",
        &[
            ColumnDefinition::new("id", DataType::Integer).primary_key(),
            ColumnDefinition::new("name", DataType::Text).not_null(),
            ColumnDefinition::new("year", DataType::Integer).default(2000),
            ColumnDefinition::new("added", DataType::DateTime)
                .default(DefaultValue::CurrentTimestamp),
        ],
    )?;

    assert!(db.insert("car", &[Value::from("Beetle")], Some(&["name"][..]))?);

    let row = db.select("car", &SelectOptions::new())?;
    let row = row.first().cloned().expect("one car");
    assert_eq!(row.get("id"), Some(&Value::Integer(1)));
    assert_eq!(row.get("year"), Some(&Value::Integer(2000)));
    assert!(matches!(row.get("added"), Some(Value::Text(_))));
    Ok(())
}

#[test]
fn insert_reports_engine_errors_with_prefix() -> Result<()> {
    let db = create_test_db()?;
    insert_people(&db, &[(1, "Ann")])?;

    let err = db
        .insert("person", &[Value::from(1), Value::from("Dup")], None)
        .unwrap_err();
    assert!(matches!(err, Error::Statement { op: "Insert", .. }));
    assert!(err.to_string().starts_with("Insert error: "));

    let err = db
        .insert("person", &[Value::from(2)], Some(&["id", "name"][..]))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    Ok(())
}

#[test]
fn update_reports_whether_rows_changed() -> Result<()> {
    let db = create_test_db()?;
    insert_people(&db, &[(1, "Ann"), (2, "Bob")])?;

    let filter = Where::from(Condition::equal("id", 1));
    assert!(db.update("person", &[Assignment::new("name", "Amy")], &filter, None, None)?);
    assert_eq!(
        db.select("person", &SelectOptions::new().filter(filter.clone()))?,
        Selection::One(person(1, "Amy"))
    );

    // Same value again: the snapshot does not change.
    assert!(!db.update("person", &[Assignment::new("name", "Amy")], &filter, None, None)?);

    let nobody = Where::from(Condition::equal("id", 99));
    assert!(!db.update("person", &[Assignment::new("name", "X")], &nobody, None, None)?);
    Ok(())
}

#[test]
fn update_with_order_and_limit_touches_one_row() -> Result<()> {
    let db = create_test_db()?;
    insert_people(&db, &[(1, "x"), (2, "x"), (3, "x")])?;

    let filter = Where::from(Condition::equal("name", "x"));
    assert!(db.update(
        "person",
        &[Assignment::new("name", "last")],
        &filter,
        Some(&OrderBy::desc("id")),
        Some(1),
    )?);

    let last = db.select(
        "person",
        &SelectOptions::new().filter(Condition::equal("name", "last")),
    )?;
    assert_eq!(last, Selection::One(person(3, "last")));
    assert_eq!(db.select("person", &SelectOptions::new().filter(filter))?.len(), 2);
    Ok(())
}

#[test]
fn update_without_assignments_is_invalid() -> Result<()> {
    let db = create_test_db()?;
    let err = db
        .update("person", &[], &Where::from(Condition::equal("id", 1)), None, None)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    Ok(())
}

#[test]
fn delete_removes_matching_rows() -> Result<()> {
    let db = create_test_db()?;
    insert_people(&db, &[(1, "Ann"), (2, "Bob")])?;

    assert!(db.delete("person", &Where::from(Condition::equal("name", "Ann")))?);
    assert_eq!(db.select("person", &SelectOptions::new())?, Selection::One(person(2, "Bob")));
    Ok(())
}

#[test]
fn empty_where_cannot_reach_a_mutating_call() {
    let err = Where::new(Vec::<Fragment>::new()).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[test]
fn has_column_matches_whole_names_only() -> Result<()> {
    let db = Database::open_in_memory()?;
    db.create_table(
        "account",
        &[
            ColumnDefinition::new("username", DataType::Text),
            ColumnDefinition::new("email", DataType::Text).unique(),
        ],
    )?;

    assert!(db.has_column("account", "username")?);
    assert!(db.has_column("account", "email")?);
    assert!(!db.has_column("account", "user")?);
    assert!(!db.has_column("account", "TEXT")?);
    assert!(!db.has_column("missing", "username")?);
    Ok(())
}

#[test]
fn catalog_listing() -> Result<()> {
    let db = create_test_db()?;
    db.create_table("car", &[ColumnDefinition::new("model", DataType::Text)])?;

    assert_eq!(db.get_tables()?, vec!["person".to_string(), "car".to_string()]);
    assert_eq!(db.get_columns("person")?, vec!["id".to_string(), "name".to_string()]);
    Ok(())
}

#[test]
fn raw_statements_with_named_params() -> Result<()> {
    let db = create_test_db()?;
    let changed = db.run(
        &SqlQuery::new("INSERT INTO person (id, name) VALUES (:id, :name)")
            .with_params(Params::new().with_value("id", 7).with_value("name", "Eve")),
    )?;
    assert_eq!(changed, 1);

    let rows = db.query(
        &SqlQuery::new("SELECT name FROM person WHERE id = :id")
            .with_params(Params::new().with_value("id", 7)),
    )?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("name"), Some(&Value::from("Eve")));
    Ok(())
}

#[test]
fn file_database_persists_and_applies_schema() -> Result<()> {
    init_tracing();
    let temp_file = NamedTempFile::new()?;
    let path = temp_file.path().to_string_lossy().into_owned();

    let schema = Schema::new().add_table(TableDefinition::new("person", person_columns()));
    let config = SqliteConfig::new(path.clone(), schema).with_thread_safe(false);

    let db = Database::open_with_config(&config)?;
    assert!(db.has_table("person")?);
    insert_people(&db, &[(1, "Ann")])?;
    db.close()?;

    // Reopening with the same schema must not trip over the existing table.
    let db = Database::open_with_config(&config)?;
    assert_eq!(
        db.select("person", &SelectOptions::new())?,
        Selection::One(person(1, "Ann"))
    );
    Ok(())
}

#[test]
fn open_reports_connection_errors() {
    let err = Database::open("/nonexistent-dir/definitely/missing.db").unwrap_err();
    assert!(matches!(err, Error::Connection { .. }));
}

#[test]
fn thread_safe_flag_is_accepted_by_open() -> Result<()> {
    init_tracing();
    for thread_safe in [true, false] {
        let temp_file = NamedTempFile::new()?;
        let config = SqliteConfig::new(
            temp_file.path().to_string_lossy().into_owned(),
            Schema::new().add_table(TableDefinition::new("person", person_columns())),
        )
        .with_thread_safe(thread_safe);

        let db = Database::open_with_config(&config)?;
        insert_people(&db, &[(1, "Ann")])?;
        assert_eq!(
            db.select("person", &SelectOptions::new())?,
            Selection::One(person(1, "Ann"))
        );
        db.close()?;
    }

    let db = Database::open_with_config(&SqliteConfig::in_memory().with_thread_safe(true))?;
    assert!(db.get_tables()?.is_empty());
    Ok(())
}

#[test]
fn zero_limit_means_no_limit() -> Result<()> {
    let db = create_test_db()?;
    insert_people(&db, &[(1, "x"), (2, "x"), (3, "x")])?;

    let all = db.select("person", &SelectOptions::new().limit(0))?;
    assert_eq!(all.len(), 3);

    let filter = Where::from(Condition::equal("name", "x"));
    assert!(db.update(
        "person",
        &[Assignment::new("name", "y")],
        &filter,
        Some(&OrderBy::asc("id")),
        Some(0),
    )?);
    let renamed = db.select(
        "person",
        &SelectOptions::new().filter(Condition::equal("name", "y")),
    )?;
    assert_eq!(renamed.len(), 3);
    Ok(())
}
