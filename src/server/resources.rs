//! server::resources
//!
//! Handlers for everything below `/gitapi/`.
//!
//! The raw request path is parsed into a [`ResourceAddress`] and dispatched
//! on the address kind and the HTTP method. Engine calls block, so they run
//! on tokio's blocking pool; clone, fetch, pull and push are submitted to the task
//! registry and answer `202 Accepted` when they outlast the configured wait.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{header, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::error::AppError;
use super::multipart::{self, Multipart, Part};
use super::AppState;
use crate::core::address::{OperationKind, ResourceAddress};
use crate::engine::history::Paging;
use crate::engine::index::ResetBody;
use crate::engine::orchestrator::{self, CheckoutBody, CommitPost};
use crate::engine::refs::{self, BranchPost, ConfigPost, ConfigPut, TagPost};
use crate::engine::remote::{self, ClonePost, RemoteAdd, RemotePost};
use crate::engine::stash::{self, StashPost, StashPut};
use crate::engine::tasks::Outcome;
use crate::engine::{diff, history, index, status, Gateway, GatewayError, Repo, TaskKind, TaskReply, TaskSnapshot};

const OCTET_STREAM: &str = "application/octet-stream";

// ── Request ──

/// Query pairs in request order; repeated keys (`Path=a&Path=b`) are kept.
type QueryPairs = Result<Query<Vec<(String, String)>>, QueryRejection>;

/// A decoded request: method, address and query pairs.
struct ResourceRequest {
    method: Method,
    address: ResourceAddress,
    query: Vec<(String, String)>,
}

impl ResourceRequest {
    fn new(method: Method, uri: &Uri, query: QueryPairs) -> Result<Self, GatewayError> {
        let Query(query) = query.map_err(|e| GatewayError::BadRequest(format!("invalid query: {}", e.body_text())))?;
        Ok(Self {
            method,
            address: ResourceAddress::parse(uri.path())?,
            query,
        })
    }

    fn values<'a, 'k>(&'a self, key: &'k str) -> impl Iterator<Item = &'a str> + use<'a, 'k> {
        self.query
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn first(&self, key: &str) -> Option<&str> {
        self.values(key).next()
    }

    /// `parts=a,b` and `parts=a&parts=b` alike.
    fn parts(&self) -> Vec<&str> {
        self.values("parts")
            .flat_map(|v| v.split(','))
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect()
    }

    fn unsupported(&self) -> GatewayError {
        GatewayError::BadRequest(format!(
            "{} resources do not support {}",
            self.address.kind(),
            self.method
        ))
    }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, GatewayError> {
    // An empty body reads as an empty object so that missing fields get
    // their field-specific errors.
    let body: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}"
    } else {
        body
    };
    serde_json::from_slice(body).map_err(|e| GatewayError::BadRequest(format!("invalid request body: {e}")))
}

/// Run a blocking engine call on the blocking pool.
async fn blocking<T, F>(state: &AppState, f: F) -> Result<T, AppError>
where
    F: FnOnce(&Arc<Gateway>) -> Result<T, GatewayError> + Send + 'static,
    T: Send + 'static,
{
    let gateway = state.gateway.clone();
    let result = tokio::task::spawn_blocking(move || f(&gateway))
        .await
        .map_err(|e| GatewayError::Engine(format!("request aborted: {e}")))?;
    Ok(result?)
}

// ── Responses ──

fn ok<T: Serialize>(body: &T) -> Result<Response, GatewayError> {
    Ok(Json(body).into_response())
}

fn empty_ok() -> Result<Response, GatewayError> {
    ok(&json!({}))
}

fn created<T: Serialize>(location: String, body: &T) -> Result<Response, GatewayError> {
    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(body)).into_response())
}

fn raw(bytes: Vec<u8>) -> Result<Response, GatewayError> {
    Ok(([(header::CONTENT_TYPE, OCTET_STREAM)], bytes).into_response())
}

fn outcome_response(outcome: Outcome) -> Response {
    let code = StatusCode::from_u16(outcome.code).unwrap_or(StatusCode::OK);
    let mut response = (code, Json(outcome.body)).into_response();
    if let Some(location) = outcome.location {
        match HeaderValue::from_str(&location) {
            Ok(value) => {
                response.headers_mut().insert(header::LOCATION, value);
            }
            Err(_) => tracing::warn!(location = %location, "dropping unencodable Location"),
        }
    }
    response
}

/// Answer a long-running request: the operation's own response when it
/// finished within the wait, otherwise `202` pointing at the task.
fn task_response(reply: TaskReply) -> Response {
    match reply {
        TaskReply::Finished(snapshot) => finished_task(snapshot),
        TaskReply::Pending(snapshot) => {
            let location = snapshot.location.clone();
            (StatusCode::ACCEPTED, [(header::LOCATION, location)], Json(snapshot)).into_response()
        }
    }
}

fn finished_task(snapshot: TaskSnapshot) -> Response {
    if let Some(outcome) = snapshot.outcome() {
        return outcome_response(outcome);
    }
    match &snapshot.error {
        Some(status) => {
            let code = StatusCode::from_u16(status.http_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (code, Json(status)).into_response()
        }
        // Cancelled before it finished
        None => Json(snapshot).into_response(),
    }
}

// ── Handlers ──

pub async fn get_resource(State(state): State<Arc<AppState>>, uri: Uri, query: QueryPairs) -> Result<Response, AppError> {
    let request = ResourceRequest::new(Method::GET, &uri, query)?;
    blocking(&state, move |gateway| read(gateway, &request)).await
}

pub async fn put_resource(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    query: QueryPairs,
    body: Bytes,
) -> Result<Response, AppError> {
    let request = ResourceRequest::new(Method::PUT, &uri, query)?;
    blocking(&state, move |gateway| update(gateway, &request, &body)).await
}

pub async fn delete_resource(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    query: QueryPairs,
) -> Result<Response, AppError> {
    let request = ResourceRequest::new(Method::DELETE, &uri, query)?;
    blocking(&state, move |gateway| remove(gateway, &request)).await
}

pub async fn post_resource(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    query: QueryPairs,
    body: Bytes,
) -> Result<Response, AppError> {
    let request = ResourceRequest::new(Method::POST, &uri, query)?;
    match request.address.kind() {
        OperationKind::Clone => {
            let post: ClonePost = decode(&body)?;
            let job = remote::clone_job(&state.gateway, &request.address, post)?;
            let reply = state.gateway.run_task(TaskKind::Clone, job).await?;
            Ok(task_response(reply))
        }
        OperationKind::Remote if !request.address.scope().is_empty() => {
            let post: RemotePost = decode(&body)?;
            let address = request.address;
            let (kind, job) = blocking(&state, move |gateway| remote::remote_job(gateway.clone(), &address, post)).await?;
            let reply = state.gateway.run_task(kind, job).await?;
            Ok(task_response(reply))
        }
        _ => blocking(&state, move |gateway| create(gateway, &request, &body)).await,
    }
}

// ── Dispatch ──

fn read(gateway: &Gateway, request: &ResourceRequest) -> Result<Response, GatewayError> {
    let address = &request.address;
    let repo = gateway.open(address)?;
    let whole = address.scope().is_empty();
    match address.kind() {
        OperationKind::Status => {
            let snapshot = status::compute_status(&repo, address)?;
            ok(&status::render_status(&repo, address, &snapshot)?)
        }
        OperationKind::Diff => {
            let filters: Vec<String> = request.values("Path").map(str::to_string).collect();
            diff_response(&repo, request, &filters)
        }
        OperationKind::Commit if request.parts().contains(&"body") => raw(history::commit_content(&repo, address)?),
        OperationKind::Commit => {
            let paging = Paging::from_query(&request.query)?;
            ok(&history::log(&repo, address, paging)?)
        }
        OperationKind::Index => raw(index::staged_content(&repo, address)?),
        OperationKind::Clone => ok(&remote::describe_clone(&repo)?),
        OperationKind::Remote if whole => ok(&remote::list_remotes(&repo, address)?),
        OperationKind::Remote => ok(&remote::get_remote(&repo, address)?),
        OperationKind::Branch if whole => ok(&refs::list_branches(&repo, address)?),
        OperationKind::Branch => ok(&refs::get_branch(&repo, address)?),
        OperationKind::Tag if whole => ok(&refs::list_tags(&repo, address)?),
        OperationKind::Tag => ok(&refs::get_tag(&repo, address)?),
        OperationKind::Config if whole => ok(&refs::list_config(&repo, address)?),
        OperationKind::Config => ok(&refs::get_config(&repo, address)?),
        OperationKind::Blame => ok(&history::blame(&repo, address)?),
        OperationKind::Stash if whole => ok(&stash::list(&repo, address)?),
        OperationKind::Stash => ok(&stash::get(&repo, address)?),
    }
}

/// Body of `POST diff/...`: either a comparison target or path filters.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DiffPost {
    new: Option<String>,
    #[serde(default)]
    path: Vec<String>,
}

fn create(gateway: &Gateway, request: &ResourceRequest, body: &[u8]) -> Result<Response, GatewayError> {
    let address = &request.address;
    let repo = gateway.open(address)?;
    match address.kind() {
        OperationKind::Commit => {
            let action = decode::<CommitPost>(body)?.into_action()?;
            ok(&orchestrator::apply(&repo, address, action)?)
        }
        OperationKind::Index => {
            index::reset(&repo, address, &decode::<ResetBody>(body)?)?;
            empty_ok()
        }
        OperationKind::Stash if address.scope().is_empty() => {
            let view = stash::save(&repo, &decode::<StashPost>(body)?)?;
            created(view.location.clone(), &view)
        }
        OperationKind::Remote => {
            let view = remote::add_remote(&repo, &decode::<RemoteAdd>(body)?)?;
            created(view.location.clone(), &view)
        }
        OperationKind::Diff => {
            let post: DiffPost = decode(body)?;
            match post.new {
                Some(new) => {
                    let location = diff::compare_location(address, &new)?;
                    Ok((
                        [(header::LOCATION, location.clone())],
                        Json(json!({ "Location": location })),
                    )
                        .into_response())
                }
                None => diff_response(&repo, request, &post.path),
            }
        }
        OperationKind::Branch => {
            let view = refs::create_branch(&repo, &decode::<BranchPost>(body)?)?;
            created(view.location.clone(), &view)
        }
        OperationKind::Tag => {
            let view = refs::create_tag(&repo, &decode::<TagPost>(body)?)?;
            created(view.location.clone(), &view)
        }
        OperationKind::Config => {
            let post: ConfigPost = decode(body)?;
            let view = refs::set_config(&repo, &post.key, &post.value)?;
            created(view.location.clone(), &view)
        }
        _ => Err(request.unsupported()),
    }
}

fn update(gateway: &Gateway, request: &ResourceRequest, body: &[u8]) -> Result<Response, GatewayError> {
    let address = &request.address;
    let repo = gateway.open(address)?;
    match address.kind() {
        OperationKind::Clone => {
            orchestrator::checkout::checkout(&repo, &decode::<CheckoutBody>(body)?)?;
            empty_ok()
        }
        OperationKind::Index => {
            index::stage(&repo, address)?;
            empty_ok()
        }
        OperationKind::Stash => {
            stash::apply(&repo, address, &decode::<StashPut>(body)?)?;
            empty_ok()
        }
        OperationKind::Config => {
            let key = address
                .ref_or_commit()
                .ok_or_else(|| GatewayError::BadRequest("address names no config key".into()))?;
            let put: ConfigPut = decode(body)?;
            ok(&refs::set_config(&repo, key, &put.value)?)
        }
        _ => Err(request.unsupported()),
    }
}

fn remove(gateway: &Gateway, request: &ResourceRequest) -> Result<Response, GatewayError> {
    let address = &request.address;
    let repo = gateway.open(address)?;
    match address.kind() {
        OperationKind::Index => index::unstage(&repo, address)?,
        OperationKind::Branch => refs::delete_branch(&repo, address)?,
        OperationKind::Tag => refs::delete_tag(&repo, address)?,
        OperationKind::Config => refs::delete_config(&repo, address)?,
        OperationKind::Stash => stash::drop_entries(&repo, address)?,
        OperationKind::Remote => remote::remove_remote(&repo, address)?,
        _ => return Err(request.unsupported()),
    }
    empty_ok()
}

/// Serve the facets of a diff that `parts` asks for.
///
/// With both facets the JSON part comes first whatever order `parts`
/// names them in.
fn diff_response(repo: &Repo, request: &ResourceRequest, filters: &[String]) -> Result<Response, GatewayError> {
    let (mut uris, mut patch) = (false, false);
    for part in request.parts() {
        match part {
            "uris" => uris = true,
            "diff" => patch = true,
            other => return Err(GatewayError::BadRequest(format!("unknown diff part '{other}'"))),
        }
    }
    if !uris && !patch {
        patch = true;
    }

    let envelope = if uris && patch {
        let boundary = request.first("boundary").map(str::to_string);
        Some(Multipart::new(boundary).map_err(|e| GatewayError::BadRequest(e.to_string()))?)
    } else {
        None
    };

    let report = diff::compute_diff(repo, &request.address, filters)?;
    match envelope {
        Some(mut body) => {
            let json = serde_json::to_vec(&report.view)
                .map_err(|e| GatewayError::Engine(format!("encoding diff: {e}")))?;
            body.push(Part::new(multipart::JSON, json))
                .push(Part::new(multipart::PLAIN_TEXT, report.patch));
            Ok(([(header::CONTENT_TYPE, body.content_type())], body.to_bytes()).into_response())
        }
        None if uris => ok(&report.view),
        None => Ok(([(header::CONTENT_TYPE, multipart::PLAIN_TEXT)], report.patch).into_response()),
    }
}
