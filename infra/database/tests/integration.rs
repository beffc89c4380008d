use shortly_database::*;

async fn memory() -> Database {
    Database::builder().url("mem://").session("test_ns", "test_db").init().await.expect("connect to mem://")
}

#[tokio::test]
async fn connect_in_memory_and_health_check() {
    let db = memory().await;
    db.health().await.expect("health check");
}

#[tokio::test]
async fn missing_parameters_fail_validation() {
    let err = Database::builder().init().await.unwrap_err();
    assert!(matches!(err, DatabaseError::Validation { .. }));
}

#[tokio::test]
async fn migrations_apply_once() {
    let db = memory().await;
    let migrations = [
        Migration::new("links", "001", "DEFINE TABLE link SCHEMALESS;"),
        Migration::new("links", "002", "DEFINE INDEX link_code ON link FIELDS code UNIQUE;"),
    ];

    let first = db.migrate(&migrations).await.unwrap();
    assert_eq!(first.applied, vec!["links:001", "links:002"]);
    assert!(first.skipped.is_empty());

    let second = db.migrate(&migrations).await.unwrap();
    assert!(second.applied.is_empty());
    assert_eq!(second.skipped.len(), 2);
}

#[tokio::test]
async fn changed_script_aborts() {
    let db = memory().await;
    db.migrate(&[Migration::new("links", "001", "DEFINE TABLE link SCHEMALESS;")]).await.unwrap();

    let err = db
        .migrate(&[Migration::new("links", "001", "DEFINE TABLE link SCHEMAFULL;")])
        .await
        .unwrap_err();
    assert!(matches!(err, DatabaseError::Migration { .. }));
}

#[tokio::test]
async fn failing_script_is_not_recorded() {
    let db = memory().await;
    let broken = Migration::new("links", "001", "THROW 'broken';");
    assert!(db.migrate(std::slice::from_ref(&broken)).await.is_err());

    let fixed = Migration::new("links", "001", "DEFINE TABLE link SCHEMALESS;");
    let report = db.migrate(&[fixed]).await.unwrap();
    assert_eq!(report.applied, vec!["links:001"]);
}

#[tokio::test]
async fn unique_index_collisions_name_the_index() {
    let db = memory().await;
    db.migrate(&[Migration::new(
        "widgets",
        "001",
        "DEFINE TABLE widget SCHEMALESS; DEFINE INDEX widget_name ON widget FIELDS name UNIQUE;",
    )])
    .await
    .unwrap();

    let create = "CREATE widget CONTENT { name: 'gear' } RETURN NONE;";
    db.query(create).await.unwrap().check().unwrap();
    let err = db.query(create).await.unwrap().check().map_err(surrealdb::Error::from).unwrap_err();
    assert_eq!(unique_index_violation(&err).as_deref(), Some("widget_name"), "{err}");

    let thrown = db.query("THROW 'index `widget_name` is fine';").await.unwrap().check().map_err(surrealdb::Error::from).unwrap_err();
    assert_eq!(unique_index_violation(&thrown), None);
}
