//! End-to-end tests against an in-memory SQLite database
//!
//! Rendered SQL is executed through the native handle and the rows mapped
//! back, so these catch escaping and shape mistakes the string-level tests
//! cannot.

use bridge_traits::database::{DatabaseConfig, DatabaseHandle};
use core_library::adapters::SqliteHandle;
use core_library::{
    binary, boolean, in_transaction, number, string, table, Expression, IdGenerator, Identifier,
    LibraryError, Matcher, Predicate, Query, Selection, TableDefinition, Value, Values,
};
use serde::Deserialize;

async fn setup_handle() -> SqliteHandle {
    let handle = SqliteHandle::new(DatabaseConfig::in_memory())
        .await
        .expect("Failed to create handle");
    handle
        .execute(
            "CREATE TABLE notes (
                id BLOB PRIMARY KEY NOT NULL,
                body TEXT NOT NULL,
                pinned INTEGER NOT NULL DEFAULT 0,
                weight REAL
            )",
        )
        .await
        .unwrap();
    handle
        .execute(
            "CREATE TABLE tags (
                note_id BLOB NOT NULL REFERENCES notes(id),
                label TEXT NOT NULL
            )",
        )
        .await
        .unwrap();
    handle
}

fn notes() -> TableDefinition {
    table(
        "notes",
        [
            ("id", binary()),
            ("body", string()),
            ("pinned", boolean().with_default()),
            ("weight", number().or_null()),
        ],
    )
}

fn tags() -> TableDefinition {
    table(
        "tags",
        [
            ("note_id", binary().references("notes", "id")),
            ("label", string()),
        ],
    )
}

#[derive(Debug, Deserialize, PartialEq)]
struct Note {
    id: Identifier,
    body: String,
    pinned: bool,
    weight: Option<f64>,
}

#[tokio::test]
async fn test_awkward_strings_survive_the_round_trip() {
    let handle = setup_handle().await;
    let notes = notes();
    let mut ids = IdGenerator::system();

    let bodies = [
        "it's",
        "''",
        "back\\slash",
        "line\nbreak",
        "🎵 unicode",
        "",
        "'; DROP TABLE notes; --",
    ];
    let rows: Vec<Values> = bodies
        .iter()
        .map(|body| {
            Values::new()
                .set("id", ids.generate().unwrap())
                .set("body", *body)
        })
        .collect();
    Query::new(&notes)
        .insert_many(rows)
        .unwrap()
        .execute(&handle)
        .await
        .unwrap();

    for body in bodies {
        let found: Vec<Note> = Query::new(&notes)
            .where_(Matcher::new().field("body", body))
            .unwrap()
            .fetch_as(&handle)
            .await
            .unwrap();
        assert_eq!(found.len(), 1, "body {body:?}");
        assert_eq!(found[0].body, body);
        assert!(!found[0].pinned);
    }
}

#[tokio::test]
async fn test_identifiers_and_defaults_round_trip() {
    let handle = setup_handle().await;
    let notes = notes();
    let id = IdGenerator::system().generate().unwrap();

    Query::new(&notes)
        .insert(
            Values::new()
                .set("id", id)
                .set("body", "hello")
                .set("weight", 0.5),
        )
        .unwrap()
        .execute(&handle)
        .await
        .unwrap();

    let note: Note = Query::new(&notes)
        .where_(Matcher::new().field("id", id))
        .unwrap()
        .fetch_one_as(&handle)
        .await
        .unwrap();
    assert_eq!(
        note,
        Note {
            id,
            body: "hello".into(),
            pinned: false,
            weight: Some(0.5),
        }
    );
}

#[tokio::test]
async fn test_left_join_without_match_yields_null_object() {
    let handle = setup_handle().await;
    let (notes, tags) = (notes(), tags());
    let mut ids = IdGenerator::system();
    let tagged = ids.generate().unwrap();
    let untagged = ids.generate().unwrap();

    Query::new(&notes)
        .insert_many([
            Values::new().set("id", tagged).set("body", "tagged"),
            Values::new()
                .set("id", untagged)
                .set("body", "untagged")
                .set("pinned", true),
        ])
        .unwrap()
        .execute(&handle)
        .await
        .unwrap();
    Query::new(&tags)
        .insert(Values::new().set("note_id", tagged).set("label", "work"))
        .unwrap()
        .execute(&handle)
        .await
        .unwrap();

    let records = Query::new(&notes)
        .left_join(&tags)
        .unwrap()
        .on((notes.column("id").unwrap(), "=", tags.column("note_id").unwrap()))
        .unwrap()
        .select(Selection::nested([
            ("body", Selection::from(notes.column("body").unwrap())),
            ("pinned", Selection::from(notes.column("pinned").unwrap())),
            (
                "tag",
                Selection::nested([("label", Selection::from(tags.column("label").unwrap()))]),
            ),
        ]))
        .unwrap()
        .order_by(notes.column("body").unwrap())
        .unwrap()
        .fetch(&handle)
        .await
        .unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(
        records[0].path(&["tag", "label"]).unwrap().as_value(),
        Some(&Value::from("work"))
    );
    assert!(records[1].get("tag").unwrap().is_null());
    assert_eq!(
        records[1].get("pinned").unwrap().as_value(),
        Some(&Value::Bool(true))
    );
}

#[tokio::test]
async fn test_rows_with_different_columns_take_defaults() {
    let handle = setup_handle().await;
    let notes = notes();
    let mut ids = IdGenerator::system();

    let result = Query::new(&notes)
        .insert_many([
            Values::new().set("id", ids.generate().unwrap()).set("body", "a"),
            Values::new()
                .set("id", ids.generate().unwrap())
                .set("body", "b")
                .set("pinned", true)
                .set("weight", 2.5),
            Values::new().set("id", ids.generate().unwrap()).set("body", "c"),
        ])
        .unwrap()
        .execute(&handle)
        .await
        .unwrap();
    assert_eq!(result.rows_affected, 3);

    let rows: Vec<Note> = Query::new(&notes)
        .order_by(notes.column("body").unwrap())
        .unwrap()
        .fetch_as(&handle)
        .await
        .unwrap();
    let summary: Vec<(&str, bool, Option<f64>)> = rows
        .iter()
        .map(|n| (n.body.as_str(), n.pinned, n.weight))
        .collect();
    assert_eq!(
        summary,
        vec![("a", false, None), ("b", true, Some(2.5)), ("c", false, None)]
    );
}

#[tokio::test]
async fn test_mixed_column_insert_inside_transaction() {
    let handle = setup_handle().await;
    let notes = notes();
    let mut ids = IdGenerator::system();
    let insert = Query::new(&notes)
        .insert_many([
            Values::new().set("id", ids.generate().unwrap()).set("body", "x"),
            Values::new()
                .set("id", ids.generate().unwrap())
                .set("body", "y")
                .set("weight", 1.0),
        ])
        .unwrap();
    assert_eq!(insert.statements().len(), 2);

    let err = in_transaction(&handle, |tx| {
        Box::pin(async move {
            insert.execute(tx).await?;
            Err::<(), _>(LibraryError::Todo("abort".into()))
        })
    })
    .await
    .unwrap_err();
    assert!(matches!(err, LibraryError::Todo(_)));
    assert_eq!(Query::new(&notes).count(&handle).await.unwrap(), 0);
}

#[tokio::test]
async fn test_composite_key_in_filter() {
    let handle = setup_handle().await;
    let notes = notes();
    let mut ids = IdGenerator::system();

    let rows: Vec<Values> = [("a", 1.0), ("b", 2.0), ("c", 3.0)]
        .into_iter()
        .map(|(body, weight)| {
            Values::new()
                .set("id", ids.generate().unwrap())
                .set("body", body)
                .set("weight", weight)
        })
        .collect();
    Query::new(&notes)
        .insert_many(rows)
        .unwrap()
        .execute(&handle)
        .await
        .unwrap();

    let key = vec![
        Expression::from(notes.column("body").unwrap()),
        Expression::from(notes.column("weight").unwrap()),
    ];
    let wanted = vec![
        Expression::from(vec![Expression::from("a"), Expression::from(1.0)]),
        Expression::from(vec![Expression::from("c"), Expression::from(2.0)]),
        Expression::from(vec![Expression::from("c"), Expression::from(3.0)]),
    ];
    let bodies: Vec<String> = Query::new(&notes)
        .where_(Predicate::compare(key, "IN", wanted).unwrap())
        .unwrap()
        .select(notes.column("body").unwrap())
        .unwrap()
        .order_by(notes.column("body").unwrap())
        .unwrap()
        .fetch_as(&handle)
        .await
        .unwrap();
    assert_eq!(bodies, vec!["a", "c"]);
}

#[tokio::test]
async fn test_update_delete_and_count() {
    let handle = setup_handle().await;
    let notes = notes();
    let mut ids = IdGenerator::system();

    let rows: Vec<Values> = (0..5)
        .map(|i| {
            Values::new()
                .set("id", ids.generate().unwrap())
                .set("body", format!("note {i}"))
                .set("weight", f64::from(i))
        })
        .collect();
    Query::new(&notes)
        .insert_many(rows)
        .unwrap()
        .execute(&handle)
        .await
        .unwrap();

    let result = Query::new(&notes)
        .where_(Matcher::new().field("body", "note 3"))
        .unwrap()
        .update(Values::new().set("pinned", true))
        .unwrap()
        .execute(&handle)
        .await
        .unwrap();
    assert_eq!(result.rows_affected, 1);

    let pinned = Query::new(&notes)
        .where_(Matcher::new().field("pinned", true))
        .unwrap();
    assert_eq!(pinned.count(&handle).await.unwrap(), 1);

    let result = Query::new(&notes)
        .where_((notes.column("body").unwrap(), "IN", vec!["note 0", "note 1"]))
        .unwrap()
        .delete()
        .unwrap()
        .execute(&handle)
        .await
        .unwrap();
    assert_eq!(result.rows_affected, 2);
    assert_eq!(Query::new(&notes).count(&handle).await.unwrap(), 3);

    Query::new(&notes)
        .truncate()
        .unwrap()
        .execute(&handle)
        .await
        .unwrap();
    assert_eq!(Query::new(&notes).count(&handle).await.unwrap(), 0);
}

#[tokio::test]
async fn test_offset_without_limit_runs() {
    let handle = setup_handle().await;
    let notes = notes();
    let mut ids = IdGenerator::system();

    let rows: Vec<Values> = (0..4)
        .map(|i| {
            Values::new()
                .set("id", ids.generate().unwrap())
                .set("body", format!("n{i}"))
        })
        .collect();
    Query::new(&notes)
        .insert_many(rows)
        .unwrap()
        .execute(&handle)
        .await
        .unwrap();

    let bodies: Vec<String> = Query::new(&notes)
        .select(notes.column("body").unwrap())
        .unwrap()
        .order_by(notes.column("body").unwrap())
        .unwrap()
        .offset(2)
        .unwrap()
        .fetch_as(&handle)
        .await
        .unwrap();
    assert_eq!(bodies, vec!["n2", "n3"]);
}

#[tokio::test]
async fn test_transaction_rollback_discards_writes() {
    let handle = setup_handle().await;
    let notes = notes();
    let insert = Query::new(&notes)
        .insert(
            Values::new()
                .set("id", IdGenerator::system().generate().unwrap())
                .set("body", "doomed"),
        )
        .unwrap();

    let err = in_transaction(&handle, |tx| {
        Box::pin(async move {
            insert.execute(tx).await?;
            Err::<(), _>(LibraryError::Todo("abort".into()))
        })
    })
    .await
    .unwrap_err();
    assert!(matches!(err, LibraryError::Todo(_)));

    assert_eq!(Query::new(&notes).count(&handle).await.unwrap(), 0);
}

#[tokio::test]
async fn test_transaction_commit_keeps_writes() {
    let handle = setup_handle().await;
    let notes = notes();
    let insert = Query::new(&notes)
        .insert(
            Values::new()
                .set("id", IdGenerator::system().generate().unwrap())
                .set("body", "kept"),
        )
        .unwrap();
    let count = Query::new(&notes);

    let inside = in_transaction(&handle, |tx| {
        Box::pin(async move {
            insert.execute(tx).await?;
            count.count(tx).await
        })
    })
    .await
    .unwrap();
    assert_eq!(inside, 1);

    assert_eq!(Query::new(&notes).count(&handle).await.unwrap(), 1);
}
