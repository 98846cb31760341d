use httpmock::Method::PATCH;
use httpmock::prelude::*;
use serde_json::{Map, json};

use reflectd::{AirtableStore, Record, RecordStore, RecordUpdate};

fn store_for(server: &MockServer) -> AirtableStore {
    AirtableStore::new(server.url(""), "baseX", "key123")
}

#[tokio::test]
async fn query_follows_pagination_offsets() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;

    let first = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/baseX/Feedback")
                .query_param("fields[]", "Phone")
                .matches(|req| {
                    !req.query_params
                        .as_ref()
                        .is_some_and(|params| params.iter().any(|(k, _)| k == "offset"))
                });
            then.status(200).json_body(json!({
                "records": [{ "id": "E1", "fields": { "Phone": "5550100" } }],
                "offset": "page2",
            }));
        })
        .await;

    let second = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/baseX/Feedback")
                .query_param("offset", "page2");
            then.status(200).json_body(json!({
                "records": [{ "id": "E2", "fields": { "Phone": "5550101" } }],
            }));
        })
        .await;

    let records = store_for(&server).query("Feedback", &["Phone"]).await?;

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].id, "E1");
    assert_eq!(records[1].id, "E2");
    first.assert_async().await;
    second.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn single_update_sends_typecast_patch() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;

    let mock = server
        .mock_async(|when, then| {
            when.method(PATCH)
                .path("/baseX/Feedback/E1")
                .json_body_partial(
                    json!({ "fields": { "Summary Generated": "true" }, "typecast": true })
                        .to_string(),
                );
            then.status(200).json_body(json!({ "id": "E1" }));
        })
        .await;

    let mut fields = Map::new();
    fields.insert("Summary Generated".into(), json!("true"));
    store_for(&server)
        .update("Feedback", "E1", fields, true)
        .await?;

    mock.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn batch_update_patches_records_envelope() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;

    let mock = server
        .mock_async(|when, then| {
            when.method(PATCH).path("/baseX/Feedback").json_body_partial(
                json!({ "records": [{ "id": "E1", "fields": { "Child UID": ["P1"] } }] })
                    .to_string(),
            );
            then.status(200).json_body(json!({ "records": [] }));
        })
        .await;

    let mut fields = Map::new();
    fields.insert("Child UID".into(), json!(["P1"]));
    let updates = vec![RecordUpdate {
        id: "E1".into(),
        fields,
    }];
    store_for(&server).batch_update("Feedback", &updates).await?;

    mock.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn store_errors_surface_with_status_and_body() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(PATCH).path("/baseX/Feedback/E1");
            then.status(422)
                .json_body(json!({ "error": "INVALID_VALUE_FOR_COLUMN" }));
        })
        .await;

    let err = store_for(&server)
        .update("Feedback", "E1", Map::new(), true)
        .await
        .unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("422"), "unexpected error: {msg}");
}

#[tokio::test]
async fn query_decodes_missing_fields_to_empty_maps() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(GET).path("/baseX/Profiles");
            then.status(200)
                .json_body(json!({ "records": [{ "id": "P1" }] }));
        })
        .await;

    let records = store_for(&server).query("Profiles", &["Phone number"]).await?;
    assert_eq!(records, vec![Record::new("P1", Map::new())]);
    Ok(())
}
