//! End-to-end relation flows against the recording in-memory backend:
//! batched eager loading, owner resolution, association lifecycles, and
//! relation-aware filtering, all through the public surface.

use chimera_orm::{
    EntityDef, MemoryDatabase, Morphable, MorphMap, Query, QueryOperator, Record, RelationDef,
    SqlRow,
};
use serde_json::{json, Value};

static TAGS: EntityDef = EntityDef::new("Tag", "tags", "id");
static THUMBNAILS: EntityDef = EntityDef::new("Thumbnail", "thumbnails", "id");
static VIDEOS: EntityDef = EntityDef {
    name: "Video",
    table: "videos",
    primary_key: "id",
    relations: &[
        RelationDef::morph_many("tags", &TAGS, "taggable"),
        RelationDef::morph_one("thumbnail", &THUMBNAILS, "imageable"),
    ],
};
static POSTS: EntityDef = EntityDef {
    name: "Post",
    table: "posts",
    primary_key: "id",
    relations: &[RelationDef::morph_many("tags", &TAGS, "taggable")],
};
static COMMENTABLES: [&EntityDef; 2] = [&VIDEOS, &POSTS];
static COMMENTS: EntityDef = EntityDef {
    name: "Comment",
    table: "comments",
    primary_key: "id",
    relations: &[RelationDef::morph_to(
        "commentable",
        &[&VIDEOS, &POSTS],
        "commentable",
    )],
};

fn record(def: &'static EntityDef, value: Value) -> Record {
    match value {
        Value::Object(map) => Record::hydrate(def, map),
        _ => Record::new(def),
    }
}

fn rows(values: Vec<Value>) -> Vec<SqlRow> {
    values
        .into_iter()
        .filter_map(|value| match value {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn eager_collections_batch_in_one_query() {
    let db = MemoryDatabase::new();
    db.queue_rows("videos", rows(vec![json!({"id": 1}), json!({"id": 2})]));
    db.queue_rows(
        "tags",
        rows(vec![
            json!({"id": 31, "taggable_id": 1, "taggable_type": "videos"}),
            json!({"id": 32, "taggable_id": 1, "taggable_type": "videos"}),
        ]),
    );

    let records = Query::for_entity(&VIDEOS)
        .with("tags")
        .fetch(&db)
        .await
        .unwrap();

    let logged = db.statements();
    assert_eq!(logged.len(), 2);
    assert_eq!(
        logged[1].sql,
        "SELECT * FROM tags WHERE taggable_id IN ($1, $2) AND taggable_type = $3"
    );
    assert_eq!(records[0].related("tags").unwrap().as_many().len(), 2);
    assert!(records[1].related("tags").unwrap().is_empty());
}

#[tokio::test]
async fn zero_valued_keys_batch_like_any_other() {
    let db = MemoryDatabase::new();
    db.queue_rows("videos", rows(vec![json!({"id": 0}), json!({"id": 5})]));
    db.queue_rows(
        "tags",
        rows(vec![
            json!({"id": 31, "taggable_id": 0, "taggable_type": "videos"}),
        ]),
    );

    let records = Query::for_entity(&VIDEOS)
        .with("tags")
        .fetch(&db)
        .await
        .unwrap();

    assert_eq!(
        db.statements()[1].params,
        vec![json!(0), json!(5), json!("videos")]
    );
    assert_eq!(records[0].related("tags").unwrap().as_many().len(), 1);
    assert!(records[1].related("tags").unwrap().is_empty());
}

#[tokio::test]
async fn missing_pointers_resolve_to_none_without_querying() {
    let db = MemoryDatabase::new();
    let mut comment = record(
        &COMMENTS,
        json!({"id": 1, "commentable_id": null, "commentable_type": null}),
    );

    let owner = comment
        .morph_to(&COMMENTABLES, "commentable")
        .first(&db)
        .await
        .unwrap();

    assert!(owner.is_none());
    assert!(db.statements().is_empty());
}

#[tokio::test]
async fn association_lifecycle_cascades_and_dissociates() {
    let db = MemoryDatabase::new();
    let mut comment = record(&COMMENTS, json!({"id": 1}));
    let mut video = Record::new(&VIDEOS);
    video.set("title", "fresh");

    comment
        .morph_to(&COMMENTABLES, "commentable")
        .associate(&db, &mut video)
        .await
        .unwrap();

    let logged = db.statements();
    assert!(logged[0].sql.starts_with("INSERT INTO videos"));
    assert!(logged[1].sql.starts_with("UPDATE comments"));
    assert!(video.is_persisted());
    assert_eq!(comment.attr("commentable_id"), video.attr("id"));
    assert_eq!(comment.attr("commentable_type"), Some(&json!("videos")));

    db.clear_log();
    comment
        .morph_to(&COMMENTABLES, "commentable")
        .dissociate(&db)
        .await
        .unwrap();

    assert_eq!(comment.attr("commentable_id"), Some(&Value::Null));
    assert_eq!(comment.attr("commentable_type"), Some(&Value::Null));
    assert_eq!(db.statements().len(), 1);
}

#[tokio::test]
async fn saving_through_an_unpersisted_source_saves_it_first() {
    let db = MemoryDatabase::new();
    let mut video = Record::new(&VIDEOS);
    video.set("title", "draft");
    let mut tag = Record::new(&TAGS);
    tag.set("label", "rust");

    video
        .morph_many(&TAGS, "taggable")
        .save(&db, &mut tag)
        .await
        .unwrap();

    let logged = db.statements();
    assert!(logged[0].sql.starts_with("INSERT INTO videos"));
    assert!(logged[1].sql.starts_with("INSERT INTO tags"));
    assert_eq!(tag.attr("taggable_id"), video.attr("id"));
    assert_eq!(tag.attr("taggable_type"), Some(&json!("videos")));
}

#[tokio::test]
async fn duplicate_single_rows_resolve_to_the_last() {
    let db = MemoryDatabase::new();
    db.queue_rows("videos", rows(vec![json!({"id": 1})]));
    db.queue_rows(
        "thumbnails",
        rows(vec![
            json!({"id": 7, "imageable_id": 1, "imageable_type": "videos"}),
            json!({"id": 8, "imageable_id": 1, "imageable_type": "videos"}),
        ]),
    );

    let records = Query::for_entity(&VIDEOS)
        .with("thumbnail")
        .fetch(&db)
        .await
        .unwrap();

    let attached = records[0].related("thumbnail").unwrap().as_one().unwrap();
    assert_eq!(attached.attr("id"), Some(&json!(8)));
}

#[tokio::test]
async fn mixed_owners_load_one_query_per_table() {
    let db = MemoryDatabase::new();
    db.queue_rows(
        "comments",
        rows(vec![
            json!({"id": 1, "commentable_id": 10, "commentable_type": "videos"}),
            json!({"id": 2, "commentable_id": 20, "commentable_type": "posts"}),
        ]),
    );
    db.queue_rows("videos", rows(vec![json!({"id": 10, "title": "v"})]));
    db.queue_rows("posts", rows(vec![json!({"id": 20, "title": "p"})]));

    let records = Query::for_entity(&COMMENTS)
        .with("commentable")
        .fetch(&db)
        .await
        .unwrap();

    let logged = db.statements();
    assert_eq!(logged.len(), 3);
    assert_eq!(logged[1].sql, "SELECT * FROM videos WHERE id IN ($1)");
    assert_eq!(logged[2].sql, "SELECT * FROM posts WHERE id IN ($1)");

    let first = records[0].related("commentable").unwrap().as_one().unwrap();
    let second = records[1].related("commentable").unwrap().as_one().unwrap();
    assert_eq!(first.attr("title"), Some(&json!("v")));
    assert_eq!(second.attr("title"), Some(&json!("p")));
}

#[tokio::test]
async fn unsupported_methods_reject_without_querying() {
    let db = MemoryDatabase::new();
    let mut video = record(&VIDEOS, json!({"id": 1}));
    let mut extras = Vec::new();

    let err = video
        .morph_one(&THUMBNAILS, "imageable")
        .save_many(&db, &mut extras)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("save_many is not supported"));

    let mut comment = record(&COMMENTS, json!({"id": 1}));
    let err = comment
        .morph_to(&COMMENTABLES, "commentable")
        .delete(&db)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("delete is not supported"));

    assert!(db.statements().is_empty());
}

#[tokio::test]
async fn declared_relations_navigate_by_name() {
    let db = MemoryDatabase::new();
    db.queue_rows("tags", rows(vec![]));

    let mut video = record(&VIDEOS, json!({"id": 7}));
    video
        .relation_many("tags")
        .unwrap()
        .fetch(&db)
        .await
        .unwrap();
    assert_eq!(
        db.statements()[0].sql,
        "SELECT * FROM tags WHERE taggable_type = $1 AND taggable_id = $2"
    );

    let err = video.relation_many("viewers").unwrap_err();
    assert_eq!(
        err.to_string(),
        "'viewers' is not defined as a relation on Video"
    );
}

#[tokio::test]
async fn relation_filters_compose_with_execution() {
    let db = MemoryDatabase::new();
    db.queue_rows("videos", rows(vec![json!({"id": 1, "tags_count": 2})]));

    let records = Query::for_entity(&VIDEOS)
        .with_count("tags")
        .unwrap()
        .has_count("tags", QueryOperator::GreaterThan, 0)
        .unwrap()
        .fetch(&db)
        .await
        .unwrap();

    let sql = &db.statements()[0].sql;
    assert!(sql.starts_with("SELECT *, (SELECT COUNT(*) FROM tags"));
    assert!(sql.contains(") AS tags_count FROM videos WHERE (SELECT COUNT(*) FROM tags"));
    assert!(sql.ends_with(") > $1"));
    assert_eq!(records[0].attr("tags_count"), Some(&json!(2)));
}

#[tokio::test]
async fn scoped_eager_loads_constrain_their_batch() {
    let db = MemoryDatabase::new();
    db.queue_rows("videos", rows(vec![json!({"id": 1})]));
    db.queue_rows("tags", rows(vec![]));

    Query::for_entity(&VIDEOS)
        .with_scoped("tags", |query| query.where_eq("status", "live"))
        .fetch(&db)
        .await
        .unwrap();

    let batch = &db.statements()[1];
    assert_eq!(
        batch.sql,
        "SELECT * FROM tags WHERE taggable_id IN ($1) AND taggable_type = $2 AND status = $3"
    );
    assert_eq!(batch.params[2], json!("live"));
}

#[tokio::test]
async fn registered_tokens_flow_through_stamps_and_batches() {
    let db = MemoryDatabase::new();
    let map = MorphMap::new();
    map.register_as("video", &VIDEOS).unwrap();

    let mut video = record(&VIDEOS, json!({"id": 9}));
    let mut tag = Record::new(&TAGS);
    tag.set("label", "tutorial");
    video
        .morph_many_using(&TAGS, "taggable", &map)
        .save(&db, &mut tag)
        .await
        .unwrap();
    assert_eq!(tag.attr("taggable_type"), Some(&json!("video")));

    db.clear_log();
    db.queue_rows("tags", rows(vec![]));
    video
        .morph_many_using(&TAGS, "taggable", &map)
        .fetch(&db)
        .await
        .unwrap();
    assert_eq!(db.statements()[0].params[0], json!("video"));
}
