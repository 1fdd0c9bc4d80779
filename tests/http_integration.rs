//! End-to-end tests of the HTTP surface, driven through the router with
//! `tower::ServiceExt::oneshot` (no socket is bound).

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use common::{run_git, Fixture};

use gitgate::core::config::{Config, TaskSettings};
use gitgate::server;

fn app(fx: &Fixture) -> Router {
    server::router(fx.shared_gateway())
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> Response {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    app.clone().oneshot(request.body(body).unwrap()).await.unwrap()
}

async fn body_bytes(resp: Response) -> Vec<u8> {
    resp.into_body().collect().await.unwrap().to_bytes().to_vec()
}

async fn body_json(resp: Response) -> Value {
    serde_json::from_slice(&body_bytes(resp).await).unwrap()
}

fn header_str<'a>(resp: &'a Response, name: header::HeaderName) -> &'a str {
    resp.headers().get(name).unwrap().to_str().unwrap()
}

// ── Status and errors ──

#[tokio::test]
async fn status_reports_a_modified_file() {
    let fx = Fixture::new();
    fx.repo("demo").write("README.md", "# Changed\n");
    let app = app(&fx);

    let resp = send(&app, Method::GET, "/gitapi/status/file/demo/", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["Type"], "Status");
    assert_eq!(json["RepositoryState"], "SAFE");
    assert_eq!(json["Modified"][0]["Name"], "README.md");
    assert_eq!(
        json["Modified"][0]["Git"]["DiffLocation"],
        "/gitapi/diff/Default/file/demo/README.md"
    );
}

#[tokio::test]
async fn errors_carry_a_server_status() {
    let fx = Fixture::new();
    fx.repo("demo");
    let app = app(&fx);

    let resp = send(&app, Method::GET, "/gitapi/status/file/demo/README.md", None).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let json = body_json(resp).await;
    assert_eq!(json["Severity"], "Error");
    assert_eq!(json["HttpCode"], 400);
    assert!(json["Message"].as_str().unwrap().contains("status"));

    let resp = send(&app, Method::PUT, "/gitapi/status/file/demo/", None).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = send(&app, Method::GET, "/gitapi/commit/nosuchref/file/demo/", None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ── Diff ──

#[tokio::test]
async fn diff_defaults_to_the_patch() {
    let fx = Fixture::new();
    let demo = fx.repo("demo");
    demo.commit_file("test.txt", "test\n", "add test");
    demo.write("test.txt", "hello\n");
    let app = app(&fx);

    let resp = send(&app, Method::GET, "/gitapi/diff/Default/file/demo/", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(header_str(&resp, header::CONTENT_TYPE).starts_with("text/plain"));
    let patch = String::from_utf8(body_bytes(resp).await).unwrap();
    assert!(patch.contains("-test\n+hello\n"), "unexpected patch:\n{patch}");
}

#[tokio::test]
async fn diff_with_both_parts_is_multipart_with_json_first() {
    let fx = Fixture::new();
    let demo = fx.repo("demo");
    demo.commit_file("test.txt", "test\n", "add test");
    demo.write("test.txt", "hello\n");
    let app = app(&fx);

    let resp = send(
        &app,
        Method::GET,
        "/gitapi/diff/Default/file/demo/?parts=diff,uris&boundary=b1",
        None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(header_str(&resp, header::CONTENT_TYPE), "multipart/related; boundary=b1");

    let body = String::from_utf8(body_bytes(resp).await).unwrap();
    assert!(body.starts_with("--b1\r\nContent-Type: application/json\r\n\r\n{"));
    let json_at = body.find("application/json").unwrap();
    let text_at = body.find("text/plain").unwrap();
    assert!(json_at < text_at);
    assert!(body.contains("+hello\n"));
    assert!(body.ends_with("--b1--\r\n"));
}

#[tokio::test]
async fn diff_rejects_a_boundary_outside_rfc_2046() {
    let fx = Fixture::new();
    let demo = fx.repo("demo");
    demo.write("README.md", "# Changed\n");
    let app = app(&fx);

    for boundary in ["a%0Ab", "a%0D%0AX-Injected:%201", "semi;colon", &"x".repeat(71)] {
        let uri = format!("/gitapi/diff/Default/file/demo/?parts=uris,diff&boundary={boundary}");
        let resp = send(&app, Method::GET, &uri, None).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "boundary {boundary:?}");
        let json = body_json(resp).await;
        assert_eq!(json["HttpCode"], 400);
        assert!(json["Message"].as_str().unwrap().contains("boundary"));
    }

    // Spaces are legal bchars; the header quotes them.
    let resp = send(
        &app,
        Method::GET,
        "/gitapi/diff/Default/file/demo/?parts=uris,diff&boundary=my+boundary",
        None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        header_str(&resp, header::CONTENT_TYPE),
        "multipart/related; boundary=\"my boundary\""
    );
}

#[tokio::test]
async fn diff_uris_part_and_compare_location() {
    let fx = Fixture::new();
    let demo = fx.repo("demo");
    demo.commit_file("a.txt", "a\n", "add a");
    demo.write("a.txt", "a2\n");
    let app = app(&fx);

    let resp = send(&app, Method::GET, "/gitapi/diff/Default/file/demo/?parts=uris", None).await;
    let json = body_json(resp).await;
    assert_eq!(json["Type"], "Diff");
    assert_eq!(json["Children"][0]["NewPath"], "a.txt");

    let resp = send(
        &app,
        Method::POST,
        "/gitapi/diff/master/file/demo/",
        Some(json!({ "New": "HEAD" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(header_str(&resp, header::LOCATION), "/gitapi/diff/master..HEAD/file/demo/");

    let resp = send(&app, Method::GET, "/gitapi/diff/Default/file/demo/?parts=bogus", None).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// ── Commit and log ──

#[tokio::test]
async fn stage_commit_and_page_the_log() {
    let fx = Fixture::new();
    let demo = fx.repo("demo");
    demo.write("notes.txt", "notes\n");
    let app = app(&fx);

    let resp = send(&app, Method::PUT, "/gitapi/index/file/demo/notes.txt", None).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = send(
        &app,
        Method::POST,
        "/gitapi/commit/HEAD/file/demo/",
        Some(json!({ "Message": "add notes" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let commit = body_json(resp).await;
    assert_eq!(commit["Id"].as_str().unwrap(), demo.head());

    let resp = send(&app, Method::GET, "/gitapi/commit/HEAD/file/demo/?page=1&pageSize=1", None).await;
    let page = body_json(resp).await;
    assert_eq!(page["Children"].as_array().unwrap().len(), 1);
    assert_eq!(page["Children"][0]["Id"], commit["Id"]);
    assert_eq!(page["HasNext"], true);
    assert_eq!(page["HasPrev"], false);

    let resp = send(&app, Method::GET, "/gitapi/commit/HEAD/file/demo/notes.txt?parts=body", None).await;
    assert_eq!(body_bytes(resp).await, b"notes\n");

    let resp = send(&app, Method::POST, "/gitapi/commit/HEAD/file/demo/", Some(json!({}))).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stash_reset_and_cherry_pick_routes() {
    let fx = Fixture::new();
    let demo = fx.repo("demo");
    demo.git(&["checkout", "-b", "feature"]);
    let picked = demo.commit_file("pick.txt", "pick\n", "pick me");
    demo.git(&["checkout", "master"]);
    let app = app(&fx);

    demo.write("README.md", "# Stashed\n");
    let resp = send(
        &app,
        Method::POST,
        "/gitapi/stash/file/demo/",
        Some(json!({ "WorkingDirectoryMessage": "wip" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert!(header_str(&resp, header::LOCATION).starts_with("/gitapi/stash/"));
    assert_eq!(demo.read("README.md"), "# Test Repo\n");

    let resp = send(&app, Method::GET, "/gitapi/stash/file/demo/", None).await;
    let listing = body_json(resp).await;
    assert_eq!(listing["Type"], "StashCommit");
    assert!(listing["Children"][0]["Message"].as_str().unwrap().contains("wip"));

    let resp = send(&app, Method::PUT, "/gitapi/stash/file/demo/", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(demo.read("README.md"), "# Stashed\n");

    let resp = send(&app, Method::POST, "/gitapi/index/file/demo/", Some(json!({ "Reset": "HARD" }))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(demo.read("README.md"), "# Test Repo\n");

    let resp = send(&app, Method::POST, "/gitapi/index/file/demo/", Some(json!({ "Reset": "KEEP" }))).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = send(
        &app,
        Method::POST,
        "/gitapi/commit/HEAD/file/demo/",
        Some(json!({ "Cherry-Pick": picked })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["Result"], "OK");
    assert_eq!(body["HeadUpdated"], true);
    assert_eq!(demo.read("pick.txt"), "pick\n");

    let resp = send(
        &app,
        Method::POST,
        "/gitapi/commit/HEAD/file/demo/",
        Some(json!({ "Cherry-Pick": picked, "Merge": "feature" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// ── Branches ──

#[tokio::test]
async fn branch_lifecycle() {
    let fx = Fixture::new();
    fx.repo("demo");
    let app = app(&fx);

    let resp = send(
        &app,
        Method::POST,
        "/gitapi/branch/file/demo/",
        Some(json!({ "Name": "feature" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(header_str(&resp, header::LOCATION), "/gitapi/branch/feature/file/demo/");

    let resp = send(&app, Method::GET, "/gitapi/branch/file/demo/", None).await;
    let listing = body_json(resp).await;
    let names: Vec<&str> = listing["Children"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["Name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"feature"));
    assert!(names.contains(&"master"));

    let resp = send(
        &app,
        Method::PUT,
        "/gitapi/clone/file/demo/",
        Some(json!({ "Branch": "feature" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = send(&app, Method::GET, "/gitapi/clone/file/demo/", None).await;
    assert_eq!(body_json(resp).await["Branch"], "feature");

    let resp = send(&app, Method::DELETE, "/gitapi/branch/master/file/demo/", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = send(&app, Method::GET, "/gitapi/branch/master/file/demo/", None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ── Clone and tasks ──

#[tokio::test(flavor = "multi_thread")]
async fn clone_answers_with_a_task_that_can_be_polled() {
    let origin_dir = TempDir::new().unwrap();
    let origin = origin_dir.path().join("origin");
    std::fs::create_dir_all(&origin).unwrap();
    run_git(&origin, &["init"]);
    run_git(&origin, &["config", "user.email", "test@example.com"]);
    run_git(&origin, &["config", "user.name", "Test User"]);
    std::fs::write(origin.join("README.md"), "# Origin\n").unwrap();
    run_git(&origin, &["add", "README.md"]);
    run_git(&origin, &["commit", "-m", "Initial commit"]);

    let fx = Fixture::new();
    let mut config = Config::default();
    config.global.tasks = Some(TaskSettings {
        wait_ms: Some(0),
        ..TaskSettings::default()
    });
    let app = server::router(Arc::new(fx.gateway_with(config)));

    let resp = send(
        &app,
        Method::POST,
        "/gitapi/clone/file/copy/",
        Some(json!({ "GitUrl": origin.to_string_lossy() })),
    )
    .await;

    if resp.status() == StatusCode::ACCEPTED {
        let task_location = header_str(&resp, header::LOCATION).to_string();
        assert!(task_location.starts_with("/task/id/"));

        let mut snapshot = Value::Null;
        for _ in 0..600 {
            let resp = send(&app, Method::GET, &task_location, None).await;
            assert_eq!(resp.status(), StatusCode::OK);
            snapshot = body_json(resp).await;
            if snapshot["State"] != "Queued" && snapshot["State"] != "Running" {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert_eq!(snapshot["State"], "Completed", "task did not complete: {snapshot}");
        assert_eq!(snapshot["HttpCode"], 201);
        assert_eq!(snapshot["ResultLocation"], "/gitapi/clone/file/copy/");

        // Finished tasks carry an ETag and answer conditional polls with 304.
        let resp = send(&app, Method::GET, &task_location, None).await;
        let etag = header_str(&resp, header::ETAG).to_string();
        let conditional = Request::builder()
            .uri(&task_location)
            .header(header::IF_NONE_MATCH, &etag)
            .body(Body::empty())
            .unwrap();
        let resp = app.clone().oneshot(conditional).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_MODIFIED);

        let resp = send(&app, Method::DELETE, &task_location, None).await;
        assert_eq!(body_json(resp).await["Cancelled"], false);
    } else {
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(header_str(&resp, header::LOCATION), "/gitapi/clone/file/copy/");
    }

    assert!(fx.root().join("copy/README.md").exists());
    let resp = send(&app, Method::GET, "/gitapi/status/file/copy/", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_and_malformed_tasks() {
    let fx = Fixture::new();
    let app = app(&fx);

    let resp = send(&app, Method::GET, "/task/id/0123456789abcdef0123456789abcdef", None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = send(&app, Method::DELETE, "/task/id/not-a-task", None).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// ── Tags, config and blame ──

#[tokio::test]
async fn tag_config_and_blame_resources() {
    let fx = Fixture::new();
    let demo = fx.repo("demo");
    let head = demo.head();
    let app = app(&fx);

    let resp = send(&app, Method::POST, "/gitapi/tag/file/demo/", Some(json!({ "Name": "v1" }))).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let tag = body_json(resp).await;
    assert_eq!(tag["Id"].as_str().unwrap(), head);
    let resp = send(&app, Method::GET, "/gitapi/commit/HEAD/file/demo/", None).await;
    assert_eq!(body_json(resp).await["Children"][0]["Tags"][0], "v1");

    let resp = send(
        &app,
        Method::POST,
        "/gitapi/config/file/demo/",
        Some(json!({ "Key": "gitgate.test", "Value": "yes" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(header_str(&resp, header::LOCATION), "/gitapi/config/gitgate.test/file/demo/");

    let resp = send(
        &app,
        Method::PUT,
        "/gitapi/config/gitgate.test/file/demo/",
        Some(json!({ "Value": "no" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = send(&app, Method::GET, "/gitapi/config/gitgate.test/file/demo/", None).await;
    assert_eq!(body_json(resp).await["Value"], "no");

    let resp = send(&app, Method::DELETE, "/gitapi/config/gitgate.test/file/demo/", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = send(&app, Method::GET, "/gitapi/config/gitgate.test/file/demo/", None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = send(&app, Method::GET, "/gitapi/blame/file/demo/README.md", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let blame = body_json(resp).await;
    assert_eq!(blame["Type"], "Blame");
    assert_eq!(blame["Children"].as_array().unwrap().len(), 1);
    assert_eq!(blame["Children"][0]["CommitId"].as_str().unwrap(), head);
}
