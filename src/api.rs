use crate::console::Console;
use crate::console::session::SessionStore;
use crate::error::{ConsoleError, ConsoleResult};
use crate::state::StateManager;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared state of the JSON API.
pub struct ApiState {
    pub console: Arc<Console>,
    pub sessions: Arc<SessionStore>,
    pub state_manager: Arc<StateManager>,
    /// Server addressed when a request names none.
    pub default_server: String,
}

/// Build the API router.
pub fn build_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/rpc", post(rpc_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// RPC request format.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    pub service: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// RPC response format.
#[derive(Debug, Serialize)]
pub struct RpcResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_code: Option<i32>,
}

impl RpcResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            backend_code: None,
        }
    }

    pub fn err(error: &ConsoleError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
            backend_code: match error {
                ConsoleError::Backend(e) => Some(e.code()),
                _ => None,
            },
        }
    }
}

async fn health_handler() -> &'static str {
    "OK"
}

async fn rpc_handler(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<RpcRequest>,
) -> (StatusCode, Json<RpcResponse>) {
    tracing::debug!(service = %req.service, method = %req.method, "RPC request");

    match dispatch_rpc(&state, &req).await {
        Ok(data) => (StatusCode::OK, Json(RpcResponse::ok(data))),
        Err(e) => {
            tracing::warn!(service = %req.service, method = %req.method, "RPC failed: {}", e);
            (e.status(), Json(RpcResponse::err(&e)))
        }
    }
}

async fn dispatch_rpc(state: &ApiState, req: &RpcRequest) -> ConsoleResult<Value> {
    let service = req.service.to_lowercase();
    let method = req.method.as_str();
    let params = &req.params;
    let server = extract_param_opt::<String>(params, "server")
        .unwrap_or_else(|| state.default_server.clone());

    match service.as_str() {
        "fs" => dispatch_fs(state, &server, method, params).await,
        "shared" => dispatch_shared(state, &server, method, params).await,
        "policy" => dispatch_policy(state, &server, method, params).await,
        "files" => dispatch_files(state, &server, method, params).await,
        "recovery" => dispatch_recovery(state, &server, method, params).await,
        "job" => dispatch_job(state, &server, method, params).await,
        "console" => dispatch_console(state, method, params).await,
        _ => Err(ConsoleError::ServiceNotFound(req.service.clone())),
    }
}

fn to_value(data: impl Serialize) -> ConsoleResult<Value> {
    serde_json::to_value(data).map_err(|e| ConsoleError::Internal(e.to_string()))
}

async fn dispatch_fs(
    state: &ApiState,
    server: &str,
    method: &str,
    params: &Value,
) -> ConsoleResult<Value> {
    let backend = state.console.backend();
    match method {
        "info" => to_value(backend.server_info(server).await?),
        "list" => to_value(backend.list_file_systems(server).await?),
        "list_generic" => to_value(backend.list_generic_file_systems(server).await?),
        "get" => {
            let name: String = extract_param(params, "name")?;
            to_value(state.console.require_fs(server, &name).await?)
        }
        "mount" => {
            let name: String = extract_param(params, "name")?;
            backend.mount(server, &name).await?;
            tracing::info!("Mounted {} on {} via RPC", name, server);
            Ok(Value::Null)
        }
        "unmount" => {
            let name: String = extract_param(params, "name")?;
            backend.unmount(server, &name).await?;
            tracing::info!("Unmounted {} on {} via RPC", name, server);
            Ok(Value::Null)
        }
        "samfsck" => {
            let name: String = extract_param(params, "name")?;
            let log_file: String = extract_param(params, "log_file")?;
            if !log_file.starts_with('/') {
                return Err(ConsoleError::InvalidParams(
                    "log_file must be an absolute path".to_string(),
                ));
            }
            let repair: bool = extract_param_opt(params, "repair").unwrap_or(false);
            let job = backend.samfsck(server, &name, &log_file, repair).await?;
            Ok(serde_json::json!({ "job_id": job }))
        }
        _ => Err(ConsoleError::MethodNotFound(method.to_string())),
    }
}

async fn dispatch_shared(
    state: &ApiState,
    server: &str,
    method: &str,
    params: &Value,
) -> ConsoleResult<Value> {
    let backend = state.console.backend();
    let name: String = extract_param(params, "name")?;
    match method {
        "members" => to_value(backend.shared_members(server, &name).await?),
        "available_hosts" => to_value(backend.hosts_not_used_by(server, &name).await?),
        _ => Err(ConsoleError::MethodNotFound(method.to_string())),
    }
}

async fn dispatch_policy(
    state: &ApiState,
    server: &str,
    method: &str,
    params: &Value,
) -> ConsoleResult<Value> {
    match method {
        "criteria" => {
            let fs: String = extract_param(params, "fs")?;
            to_value(state.console.backend().policy_criteria(server, &fs).await?)
        }
        _ => Err(ConsoleError::MethodNotFound(method.to_string())),
    }
}

async fn dispatch_files(
    state: &ApiState,
    server: &str,
    method: &str,
    params: &Value,
) -> ConsoleResult<Value> {
    let backend = state.console.backend();
    match method {
        "list" => {
            let dir: String = extract_param(params, "dir")?;
            let max_entries: usize = extract_param_opt(params, "max_entries")
                .unwrap_or(crate::console::session::DEFAULT_MAX_ENTRIES);
            let filter: Option<String> = extract_param_opt(params, "filter");
            to_value(
                backend
                    .list_directory(server, &dir, max_entries, filter.as_deref())
                    .await?,
            )
        }
        "details" => {
            let path: String = extract_param(params, "path")?;
            match backend.file_details(server, &path).await? {
                Some(entry) => to_value(entry),
                None => Err(crate::error::SamFsError::not_found().into()),
            }
        }
        _ => Err(ConsoleError::MethodNotFound(method.to_string())),
    }
}

async fn dispatch_recovery(
    state: &ApiState,
    server: &str,
    method: &str,
    params: &Value,
) -> ConsoleResult<Value> {
    let backend = state.console.backend();
    let fs: String = extract_param(params, "fs")?;
    match method {
        "schedule" => to_value(backend.recovery_point_schedule(server, &fs).await?),
        "dumps" => {
            let dir: String = extract_param(params, "dir")?;
            to_value(backend.dump_files(server, &fs, &dir).await?)
        }
        _ => Err(ConsoleError::MethodNotFound(method.to_string())),
    }
}

async fn dispatch_job(
    state: &ApiState,
    server: &str,
    method: &str,
    params: &Value,
) -> ConsoleResult<Value> {
    match method {
        "exists" => {
            let id: i64 = extract_param(params, "id")?;
            let exists = state.console.backend().job_exists(server, id).await?;
            Ok(serde_json::json!({ "id": id, "exists": exists }))
        }
        _ => Err(ConsoleError::MethodNotFound(method.to_string())),
    }
}

async fn dispatch_console(state: &ApiState, method: &str, params: &Value) -> ConsoleResult<Value> {
    match method {
        "sessions" => Ok(serde_json::json!({ "count": state.sessions.len().await })),
        "inventory" => to_value(state.state_manager.get().await),
        "backups" => {
            let names: Vec<String> = state
                .state_manager
                .list_backups()
                .await
                .iter()
                .filter_map(|p| p.file_name())
                .map(|n| n.to_string_lossy().to_string())
                .collect();
            to_value(names)
        }
        "restore_backup" => {
            let name: String = extract_param(params, "name")?;
            let restored = state.state_manager.restore_backup(&name).await?;
            tracing::info!("Restored inventory from {} via RPC", restored.display());
            Ok(Value::Null)
        }
        _ => Err(ConsoleError::MethodNotFound(method.to_string())),
    }
}

fn extract_param<T: serde::de::DeserializeOwned>(params: &Value, key: &str) -> ConsoleResult<T> {
    params
        .get(key)
        .ok_or_else(|| ConsoleError::InvalidParams(format!("Missing parameter: {}", key)))
        .and_then(|v| {
            serde_json::from_value(v.clone())
                .map_err(|e| ConsoleError::InvalidParams(format!("Invalid {}: {}", key, e)))
        })
}

fn extract_param_opt<T: serde::de::DeserializeOwned>(params: &Value, key: &str) -> Option<T> {
    params
        .get(key)
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::local::tests::SERVER;
    use crate::console::tests::demo_console;
    use crate::error::codes;
    use serde_json::json;

    async fn demo_state() -> ApiState {
        let (console, _) = demo_console().await;
        let dir = std::env::temp_dir().join(format!("samqfs-api-{}", uuid::Uuid::new_v4()));
        let state_manager = StateManager::load_or_seed(dir.join("state.json"), SERVER)
            .await
            .unwrap();
        ApiState {
            console: Arc::new(console),
            sessions: Arc::new(SessionStore::new(SERVER)),
            state_manager: Arc::new(state_manager),
            default_server: SERVER.to_string(),
        }
    }

    fn request(service: &str, method: &str, params: Value) -> RpcRequest {
        RpcRequest {
            service: service.into(),
            method: method.into(),
            params,
        }
    }

    #[tokio::test]
    async fn test_fs_list_and_get() {
        let state = demo_state().await;
        let list = dispatch_rpc(&state, &request("fs", "list", Value::Null))
            .await
            .unwrap();
        assert!(list.as_array().is_some_and(|a| !a.is_empty()));

        let fs = dispatch_rpc(&state, &request("fs", "get", json!({ "name": "samfs1" })))
            .await
            .unwrap();
        assert_eq!(fs["name"], "samfs1");
    }

    #[tokio::test]
    async fn test_errors_map_to_status() {
        let state = demo_state().await;
        let err = dispatch_rpc(&state, &request("zfs", "list", Value::Null))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err = dispatch_rpc(&state, &request("fs", "get", Value::Null))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = dispatch_rpc(&state, &request("fs", "get", json!({ "name": "gone" })))
            .await
            .unwrap_err();
        assert_eq!(RpcResponse::err(&err).backend_code, Some(codes::NOT_FOUND));
    }

    #[tokio::test]
    async fn test_samfsck_requires_absolute_log() {
        let state = demo_state().await;
        let err = dispatch_rpc(
            &state,
            &request(
                "fs",
                "samfsck",
                json!({ "name": "samfs1", "log_file": "fsck.log" }),
            ),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ConsoleError::InvalidParams(_)));
    }

    #[tokio::test]
    async fn test_console_sessions() {
        let state = demo_state().await;
        state.sessions.get_or_create(None).await;
        let data = dispatch_rpc(&state, &request("console", "sessions", Value::Null))
            .await
            .unwrap();
        assert_eq!(data["count"], 1);
    }

    #[tokio::test]
    async fn test_restore_backup_rolls_inventory_back() {
        let state = demo_state().await;
        state.state_manager.update(|s| s.log_files.push("/var/log/new.log".into())).await.unwrap();

        let backups = dispatch_rpc(&state, &request("console", "backups", Value::Null))
            .await
            .unwrap();
        let name = backups[0].as_str().unwrap().to_string();
        dispatch_rpc(
            &state,
            &request("console", "restore_backup", json!({ "name": name })),
        )
        .await
        .unwrap();
        let inventory = dispatch_rpc(&state, &request("console", "inventory", Value::Null))
            .await
            .unwrap();
        assert!(
            !inventory["log_files"]
                .as_array()
                .unwrap()
                .iter()
                .any(|f| f == "/var/log/new.log")
        );

        let err = dispatch_rpc(
            &state,
            &request("console", "restore_backup", json!({ "name": "/etc/passwd" })),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ConsoleError::State(_)));
    }
}
