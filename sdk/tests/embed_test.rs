use serde_json::json;
use tessera_sdk::entity::{Document, EntityError, ObjectId, PropertyDescriptor, Schema, Value};
use tessera_sdk::testing::{TestEnvironment, doc};
use tessera_sdk::OdmConfig;

fn schemas() -> Vec<Schema> {
    vec![
        Schema::new("User")
            .with_property("name", PropertyDescriptor::string())
            .with_property("email", PropertyDescriptor::string()),
        Schema::new("Post")
            .with_property("title", PropertyDescriptor::string())
            .with_property("author", PropertyDescriptor::reference("User").embed(["name"]))
            .with_property(
                "readers",
                PropertyDescriptor::array_of(PropertyDescriptor::reference("User")),
            ),
    ]
}

fn env() -> TestEnvironment {
    TestEnvironment::new(schemas()).unwrap()
}

fn stub(id: &Value, fields: serde_json::Value) -> Value {
    let mut stub = doc(fields);
    stub.insert("_id".to_string(), id.clone());
    Value::Object(stub)
}

#[tokio::test]
async fn test_new_reference_is_saved_and_embedded() {
    let env = env();
    let mut post = env.odm.create("Post").unwrap();
    post.set(doc(json!({
        "title": "Hello",
        "author": {"name": "Ada", "email": "ada@example.com"}
    })))
    .await
    .unwrap();
    assert!(post.data()["author"].as_model().is_some());

    let post_id = post.save().await.unwrap();
    assert_eq!(env.db.insert_count(), 2);

    let users = env.db.documents("User");
    assert_eq!(users.len(), 1);
    let user_id = users[0]["_id"].clone();
    assert_eq!(users[0]["email"], Value::from("ada@example.com"));

    let stored = env.db.document("Post", &post_id).unwrap();
    assert_eq!(stored["author"], stub(&user_id, json!({"name": "Ada"})));
    assert_eq!(post.data()["author"], stub(&user_id, json!({"name": "Ada"})));
    assert!(post.hydrated_paths().is_empty());
}

#[tokio::test]
async fn test_array_references_store_id_only_stubs() {
    let env = env();
    let mut post = env.odm.create("Post").unwrap();
    post.set(doc(json!({"readers": [{"name": "R1"}, {"name": "R2"}]})))
        .await
        .unwrap();
    let post_id = post.save().await.unwrap();

    assert_eq!(env.db.collection_count("User"), 2);
    let stored = env.db.document("Post", &post_id).unwrap();
    let readers = stored["readers"].as_array().unwrap();
    assert_eq!(readers.len(), 2);
    for reader in readers {
        let map = reader.as_object().unwrap();
        assert_eq!(map.len(), 1);
        assert!(env.db.document("User", &map["_id"]).is_some());
    }
}

#[tokio::test]
async fn test_hydrate_loads_stubs_once() {
    let env = env();
    let user_id = env.db.seed("User", doc(json!({"name": "Ada"})));
    let post_id = env.db.seed(
        "Post",
        Document::from([("author".to_string(), stub(&user_id, json!({"name": "Ada"})))]),
    );
    let mut post = env.odm.load("Post", &post_id).await.unwrap();
    let finds = env.db.find_count();

    post.hydrate(None).await.unwrap();
    assert_eq!(env.db.find_count(), finds + 1);
    let author = post.data()["author"].as_model().unwrap();
    assert_eq!(author.identifier(), Some(&user_id));
    assert_eq!(author.name(), "User");

    post.hydrate(None).await.unwrap();
    assert_eq!(env.db.find_count(), finds + 1);
}

#[tokio::test]
async fn test_dehydrate_is_idempotent() {
    let env = env();
    let user_id = env.db.seed("User", doc(json!({"name": "Ada", "email": "a@x"})));
    let post_id = env.db.seed(
        "Post",
        Document::from([("author".to_string(), stub(&user_id, json!({"name": "Ada"})))]),
    );
    let mut post = env.odm.load("Post", &post_id).await.unwrap();
    post.hydrate(None).await.unwrap();

    post.dehydrate().unwrap();
    let once = post.data().clone();
    post.dehydrate().unwrap();
    assert_eq!(post.data(), &once);
    assert_eq!(once["author"], stub(&user_id, json!({"name": "Ada"})));
}

#[tokio::test]
async fn test_hydrate_name_filter() {
    let env = env();
    let author_id = env.db.seed("User", doc(json!({"name": "Ada"})));
    let reader_id = env.db.seed("User", doc(json!({"name": "Bob"})));
    let mut stored = Document::new();
    stored.insert("author".to_string(), stub(&author_id, json!({"name": "Ada"})));
    stored.insert(
        "readers".to_string(),
        Value::Array(vec![stub(&reader_id, json!({}))]),
    );
    let post_id = env.db.seed("Post", stored);
    let mut post = env.odm.load("Post", &post_id).await.unwrap();

    post.hydrate(Some(vec!["readers".to_string()])).await.unwrap();
    assert!(post.data()["author"].is_stub());
    let readers = post.data()["readers"].as_array().unwrap();
    assert_eq!(readers[0].as_model().unwrap().identifier(), Some(&reader_id));
    assert_eq!(
        post.hydrated_paths().iter().collect::<Vec<_>>(),
        vec!["readers"]
    );

    let finds = env.db.find_count();
    post.hydrate(Some(vec!["ghost".to_string()])).await.unwrap();
    assert_eq!(env.db.find_count(), finds);
}

#[tokio::test]
async fn test_reference_with_id_merges_existing_entity() {
    let env = env();
    let user_id = env.db.seed("User", doc(json!({"name": "Old", "email": "o@x"})));

    let mut post = env.odm.create("Post").unwrap();
    post.set(doc(json!({
        "title": "t",
        "author": {"_id": user_id.to_string(), "name": "New"}
    })))
    .await
    .unwrap();
    let post_id = post.save().await.unwrap();

    assert_eq!(env.db.partial_updates("User"), vec![doc(json!({"name": "New"}))]);
    assert_eq!(env.db.insert_count(), 1);
    assert_eq!(env.cache.invalidations("User", &user_id), 1);
    assert_eq!(env.cache.type_invalidations("Post"), 1);

    let user = env.db.document("User", &user_id).unwrap();
    assert_eq!(user["email"], Value::from("o@x"));
    assert_eq!(user["name"], Value::from("New"));

    let stored = env.db.document("Post", &post_id).unwrap();
    assert_eq!(stored["author"], stub(&user_id, json!({"name": "New"})));
}

#[tokio::test]
async fn test_merge_reference_updates_stub() {
    let env = env();
    let user_id = env.db.seed("User", doc(json!({"name": "Ada"})));
    let post_id = env.db.seed(
        "Post",
        Document::from([
            ("title".to_string(), Value::from("t")),
            ("author".to_string(), stub(&user_id, json!({"name": "Ada"}))),
        ]),
    );
    let mut post = env.odm.load("Post", &post_id).await.unwrap();

    post.merge(doc(json!({"author": {"_id": user_id.to_string(), "name": "Grace"}})))
        .await
        .unwrap();
    post.save().await.unwrap();

    let expected = Document::from([("author".to_string(), stub(&user_id, json!({"name": "Grace"})))]);
    assert_eq!(env.db.partial_updates("Post"), vec![expected]);
    let stored = env.db.document("Post", &post_id).unwrap();
    assert_eq!(stored["title"], Value::from("t"));
    assert_eq!(stored["author"], stub(&user_id, json!({"name": "Grace"})));
}

#[tokio::test]
async fn test_wrong_model_type_is_rejected() {
    let env = env();
    let other = env.odm.create("Post").unwrap();
    let mut post = env.odm.create("Post").unwrap();

    let mut input = Document::new();
    input.insert("author".to_string(), other.into());
    let err = post.set(input).await.unwrap_err();
    assert!(matches!(
        err,
        EntityError::WrongModelType { ref expected, ref actual, .. } if expected == "User" && actual == "Post"
    ));
}

#[tokio::test]
async fn test_live_model_assignment() {
    let env = env();
    let mut user = env.odm.create("User").unwrap();
    user.set(doc(json!({"name": "Live"}))).await.unwrap();

    let mut post = env.odm.create("Post").unwrap();
    let mut input = Document::new();
    input.insert("author".to_string(), user.into());
    post.set(input).await.unwrap();
    let post_id = post.save().await.unwrap();

    let stored = env.db.document("Post", &post_id).unwrap();
    let author = stored["author"].as_object().unwrap();
    assert_eq!(author["name"], Value::from("Live"));
    assert!(env.db.document("User", &author["_id"]).is_some());
}

#[tokio::test]
async fn test_cyclic_hydration_is_bounded() {
    let config = OdmConfig {
        max_hydration_depth: 3,
        ..OdmConfig::default()
    };
    let person = Schema::new("Person")
        .with_property("name", PropertyDescriptor::string())
        .with_property("friend", PropertyDescriptor::reference("Person"));
    let env = TestEnvironment::with_config(vec![person], config).unwrap();

    let a = ObjectId::new();
    let b = ObjectId::new();
    env.db.seed(
        "Person",
        doc(json!({"_id": a.to_string(), "name": "a", "friend": {"_id": b.to_string()}})),
    );
    env.db.seed(
        "Person",
        doc(json!({"_id": b.to_string(), "name": "b", "friend": {"_id": a.to_string()}})),
    );

    let mut root = env.odm.load("Person", &Value::ObjectId(a)).await.unwrap();
    let finds = env.db.find_count();
    root.hydrate(None).await.unwrap();
    assert_eq!(env.db.find_count(), finds + 3);

    let first = root.data()["friend"].as_model().unwrap();
    let second = first.data()["friend"].as_model().unwrap();
    let third = second.data()["friend"].as_model().unwrap();
    assert_eq!(third.data()["name"], Value::from("b"));
    assert!(third.data()["friend"].is_stub());
}

fn board_env() -> TestEnvironment {
    let board = Schema::new("Board").with_property(
        "meta",
        PropertyDescriptor::object().with_property(
            "editors",
            PropertyDescriptor::array_of(
                PropertyDescriptor::object()
                    .with_property("who", PropertyDescriptor::reference("User").embed(["name"]))
                    .with_property("note", PropertyDescriptor::number()),
            ),
        ),
    );
    let mut schemas = schemas();
    schemas.push(board);
    TestEnvironment::new(schemas).unwrap()
}

fn editor_at(model: &tessera_sdk::Model, index: usize) -> &Value {
    &model.data()["meta"].as_object().unwrap()["editors"].as_array().unwrap()[index]
        .as_object()
        .unwrap()["who"]
}

#[tokio::test]
async fn test_references_inside_nested_arrays() {
    let env = board_env();
    let mut board = env.odm.create("Board").unwrap();
    board
        .set(doc(json!({"meta": {"editors": [
            {"who": {"name": "Ed", "email": "ed@x"}, "note": 1},
            {"note": 2}
        ]}})))
        .await
        .unwrap();
    let board_id = board.save().await.unwrap();

    let users = env.db.documents("User");
    assert_eq!(users.len(), 1);
    let user_id = users[0]["_id"].clone();

    let stored = env.db.document("Board", &board_id).unwrap();
    let editors = stored["meta"].as_object().unwrap()["editors"].as_array().unwrap();
    assert_eq!(editors[0].as_object().unwrap()["who"], stub(&user_id, json!({"name": "Ed"})));
    assert!(!editors[1].as_object().unwrap().contains_key("who"));

    let mut loaded = env.odm.load("Board", &board_id).await.unwrap();
    loaded.hydrate(None).await.unwrap();
    let who = editor_at(&loaded, 0).as_model().unwrap();
    assert_eq!(who.identifier(), Some(&user_id));
    assert_eq!(who.data()["email"], Value::from("ed@x"));

    loaded.dehydrate().unwrap();
    assert_eq!(editor_at(&loaded, 0), &stub(&user_id, json!({"name": "Ed"})));

    loaded
        .merge(doc(json!({"meta": {"editors": [
            {"who": {"_id": user_id.to_string(), "name": "Edna"}, "note": 3}
        ]}})))
        .await
        .unwrap();
    loaded.save().await.unwrap();

    let updates = env.db.partial_updates("Board");
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].keys().collect::<Vec<_>>(), vec!["meta.editors"]);

    let stored = env.db.document("Board", &board_id).unwrap();
    let editors = stored["meta"].as_object().unwrap()["editors"].as_array().unwrap();
    assert_eq!(editors.len(), 1);
    assert_eq!(editors[0].as_object().unwrap()["who"], stub(&user_id, json!({"name": "Edna"})));
    assert_eq!(editors[0].as_object().unwrap()["note"], Value::Int(3));
    assert_eq!(env.cache.type_invalidations("Board"), 1);
}
