//! Upload API integration tests.
//!
//! Run with: `cargo test -p depot-api --test upload_flow_test`

mod helpers;

use depot_core::models::{
    CompleteUploadResponse, InitiateUploadResponse, UploadChunkResponse, UploadProgressResponse,
    UploadStatus,
};
use helpers::{api_path, setup_test_app, sha256_hex};

const TENANT_HEADER: &str = "x-tenant-id";

#[tokio::test]
async fn test_full_chunked_upload_flow() {
    let app = setup_test_app(4).await;
    let data = b"12345678abc"; // 3 chunks at chunk_size 4
    let tenant = app.tenant_id.to_string();

    let response = app
        .server
        .post(&api_path("/uploads"))
        .add_header(TENANT_HEADER, tenant.as_str())
        .json(&app.initiate_body(data, "contract"))
        .await;
    assert_eq!(response.status_code(), 200);
    let init: InitiateUploadResponse = response.json();
    assert!(!init.can_instant_upload);
    assert_eq!(init.total_chunks, 3);
    assert_eq!(init.chunk_size, 4);

    for (index, chunk) in data.chunks(4).enumerate() {
        let response = app
            .server
            .put(&api_path(&format!(
                "/uploads/{}/chunks/{}",
                init.upload_id, index
            )))
            .add_header(TENANT_HEADER, tenant.as_str())
            .bytes(chunk.to_vec().into())
            .await;
        assert_eq!(response.status_code(), 200);
        let ack: UploadChunkResponse = response.json();
        assert!(ack.success);
        assert_eq!(ack.chunk_index, index as i32);
    }

    let response = app
        .server
        .get(&api_path(&format!("/uploads/{}/progress", init.upload_id)))
        .add_header(TENANT_HEADER, tenant.as_str())
        .await;
    assert_eq!(response.status_code(), 200);
    let progress: UploadProgressResponse = response.json();
    assert_eq!(progress.uploaded_chunks, 3);
    assert_eq!(progress.uploaded_chunk_indexes, vec![0, 1, 2]);
    assert_eq!(progress.status, UploadStatus::Uploading);
    assert!((progress.percentage - 100.0).abs() < f64::EPSILON);

    let response = app
        .server
        .post(&api_path(&format!("/uploads/{}/complete", init.upload_id)))
        .add_header(TENANT_HEADER, tenant.as_str())
        .await;
    assert_eq!(response.status_code(), 200);
    let done: CompleteUploadResponse = response.json();
    assert_eq!(done.file_size, data.len() as i64);
    assert_eq!(done.file_name, "data.bin");
    assert!(done.access_url.is_some());

    // Proxied download returns the original bytes.
    let response = app
        .server
        .get(&api_path(&format!("/files/{}/download", done.attachment_id)))
        .add_header(TENANT_HEADER, tenant.as_str())
        .await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.as_bytes().as_ref(), data);

    // Presigned URL endpoint.
    let response = app
        .server
        .get(&api_path(&format!(
            "/files/{}/url?ttl_secs=120",
            done.attachment_id
        )))
        .add_header(TENANT_HEADER, tenant.as_str())
        .await;
    assert_eq!(response.status_code(), 200);
}

#[tokio::test]
async fn test_missing_tenant_header_is_unauthorized() {
    let app = setup_test_app(4).await;

    let response = app
        .server
        .post(&api_path("/uploads"))
        .json(&app.initiate_body(b"12345678", "doc"))
        .await;
    assert_eq!(response.status_code(), 401);
}

#[tokio::test]
async fn test_duplicate_chunk_is_idempotent() {
    let app = setup_test_app(4).await;
    let data = b"12345678";
    let tenant = app.tenant_id.to_string();

    let init: InitiateUploadResponse = app
        .server
        .post(&api_path("/uploads"))
        .add_header(TENANT_HEADER, tenant.as_str())
        .json(&app.initiate_body(data, "doc"))
        .await
        .json();

    for _ in 0..2 {
        let response = app
            .server
            .put(&api_path(&format!("/uploads/{}/chunks/0", init.upload_id)))
            .add_header(TENANT_HEADER, tenant.as_str())
            .bytes(b"1234".to_vec().into())
            .await;
        assert_eq!(response.status_code(), 200);
    }

    let progress: UploadProgressResponse = app
        .server
        .get(&api_path(&format!("/uploads/{}/progress", init.upload_id)))
        .add_header(TENANT_HEADER, tenant.as_str())
        .await
        .json();
    assert_eq!(progress.uploaded_chunks, 1);
}

#[tokio::test]
async fn test_complete_before_all_chunks_conflicts() {
    let app = setup_test_app(4).await;
    let data = b"12345678";
    let tenant = app.tenant_id.to_string();

    let init: InitiateUploadResponse = app
        .server
        .post(&api_path("/uploads"))
        .add_header(TENANT_HEADER, tenant.as_str())
        .json(&app.initiate_body(data, "doc"))
        .await
        .json();

    let response = app
        .server
        .post(&api_path(&format!("/uploads/{}/complete", init.upload_id)))
        .add_header(TENANT_HEADER, tenant.as_str())
        .await;
    assert_eq!(response.status_code(), 409);
}

#[tokio::test]
async fn test_cancel_then_chunk_conflicts() {
    let app = setup_test_app(4).await;
    let data = b"12345678";
    let tenant = app.tenant_id.to_string();

    let init: InitiateUploadResponse = app
        .server
        .post(&api_path("/uploads"))
        .add_header(TENANT_HEADER, tenant.as_str())
        .json(&app.initiate_body(data, "doc"))
        .await
        .json();

    let response = app
        .server
        .delete(&api_path(&format!("/uploads/{}", init.upload_id)))
        .add_header(TENANT_HEADER, tenant.as_str())
        .await;
    assert_eq!(response.status_code(), 204);

    let response = app
        .server
        .put(&api_path(&format!("/uploads/{}/chunks/0", init.upload_id)))
        .add_header(TENANT_HEADER, tenant.as_str())
        .bytes(b"1234".to_vec().into())
        .await;
    assert_eq!(response.status_code(), 409);

    // Cancelling again still acks.
    let response = app
        .server
        .delete(&api_path(&format!("/uploads/{}", init.upload_id)))
        .add_header(TENANT_HEADER, tenant.as_str())
        .await;
    assert_eq!(response.status_code(), 204);
}

#[tokio::test]
async fn test_second_identical_upload_is_instant() {
    let app = setup_test_app(4).await;
    let data = b"same bytes again";
    let tenant = app.tenant_id.to_string();

    let init: InitiateUploadResponse = app
        .server
        .post(&api_path("/uploads"))
        .add_header(TENANT_HEADER, tenant.as_str())
        .json(&app.initiate_body(data, "doc"))
        .await
        .json();

    for (index, chunk) in data.chunks(4).enumerate() {
        app.server
            .put(&api_path(&format!(
                "/uploads/{}/chunks/{}",
                init.upload_id, index
            )))
            .add_header(TENANT_HEADER, tenant.as_str())
            .bytes(chunk.to_vec().into())
            .await;
    }
    let done: CompleteUploadResponse = app
        .server
        .post(&api_path(&format!("/uploads/{}/complete", init.upload_id)))
        .add_header(TENANT_HEADER, tenant.as_str())
        .await
        .json();

    let second: InitiateUploadResponse = app
        .server
        .post(&api_path("/uploads"))
        .add_header(TENANT_HEADER, tenant.as_str())
        .json(&app.initiate_body(data, "doc"))
        .await
        .json();
    assert!(second.can_instant_upload);
    assert_eq!(second.total_chunks, 0);
    assert_eq!(second.attachment_id, Some(done.attachment_id));
}

#[tokio::test]
async fn test_wrong_chunk_length_rejected() {
    let app = setup_test_app(4).await;
    let data = b"12345678";
    let tenant = app.tenant_id.to_string();

    let init: InitiateUploadResponse = app
        .server
        .post(&api_path("/uploads"))
        .add_header(TENANT_HEADER, tenant.as_str())
        .json(&app.initiate_body(data, "doc"))
        .await
        .json();

    let response = app
        .server
        .put(&api_path(&format!("/uploads/{}/chunks/0", init.upload_id)))
        .add_header(TENANT_HEADER, tenant.as_str())
        .bytes(b"123".to_vec().into())
        .await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_chunk_hash_mismatch_rejected() {
    let app = setup_test_app(4).await;
    let data = b"12345678";
    let tenant = app.tenant_id.to_string();

    let init: InitiateUploadResponse = app
        .server
        .post(&api_path("/uploads"))
        .add_header(TENANT_HEADER, tenant.as_str())
        .json(&app.initiate_body(data, "doc"))
        .await
        .json();

    let response = app
        .server
        .put(&api_path(&format!("/uploads/{}/chunks/0", init.upload_id)))
        .add_header(TENANT_HEADER, tenant.as_str())
        .add_header("x-chunk-hash", sha256_hex(b"other"))
        .bytes(b"1234".to_vec().into())
        .await;
    assert_eq!(response.status_code(), 400);

    let response = app
        .server
        .put(&api_path(&format!("/uploads/{}/chunks/0", init.upload_id)))
        .add_header(TENANT_HEADER, tenant.as_str())
        .add_header("x-chunk-hash", sha256_hex(b"1234"))
        .bytes(b"1234".to_vec().into())
        .await;
    assert_eq!(response.status_code(), 200);
}

#[tokio::test]
async fn test_unknown_upload_id_is_not_found() {
    let app = setup_test_app(4).await;
    let tenant = app.tenant_id.to_string();

    let response = app
        .server
        .get(&api_path(&format!(
            "/uploads/{}/progress",
            uuid::Uuid::new_v4()
        )))
        .add_header(TENANT_HEADER, tenant.as_str())
        .await;
    assert_eq!(response.status_code(), 404);
}

#[tokio::test]
async fn test_sessions_not_visible_across_tenants() {
    let app = setup_test_app(4).await;
    let data = b"12345678";
    let tenant = app.tenant_id.to_string();

    let init: InitiateUploadResponse = app
        .server
        .post(&api_path("/uploads"))
        .add_header(TENANT_HEADER, tenant.as_str())
        .json(&app.initiate_body(data, "doc"))
        .await
        .json();

    let other_tenant = uuid::Uuid::new_v4().to_string();
    let response = app
        .server
        .get(&api_path(&format!("/uploads/{}/progress", init.upload_id)))
        .add_header(TENANT_HEADER, other_tenant.as_str())
        .await;
    assert_eq!(response.status_code(), 404);
}
