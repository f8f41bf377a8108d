use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use super::SharedState;
use crate::error::{AppError, AppResult};
use crate::events::EventInput;
use crate::experiments::ensure_session_token;
use crate::funnels::CreateFunnelParams;
use crate::storage::Variant;

/// Route method calls to the appropriate handlers
pub async fn handle_method(
    state: &SharedState,
    method: &str,
    params: Option<Value>,
) -> AppResult<Value> {
    info!(method = %method, "Routing method call");

    match method {
        // Funnel repository
        "funnel.create" => handle_funnel_create(state, params).await,
        "funnel.get" => handle_funnel_get(state, params).await,
        "funnel.list" => handle_funnel_list(state, params).await,
        "funnel.update" => handle_funnel_update(state, params).await,
        "funnel.hide" => handle_funnel_hide(state, params).await,
        "funnel.restore" => handle_funnel_restore(state, params).await,
        "funnel.delete" => handle_funnel_delete(state, params).await,
        // Page generation
        "pages.generateAll" => handle_generate_all(state, params).await,
        "pages.generateOne" => handle_generate_one(state, params).await,
        // Experiments
        "experiment.create" => handle_experiment_create(state, params).await,
        "experiment.conclude" => handle_experiment_conclude(state, params).await,
        "experiment.assign" => handle_experiment_assign(state, params).await,
        // Analytics and events
        "analytics.get" => handle_analytics_get(state, params).await,
        "events.record" => handle_events_record(state, params).await,
        _ => Err(AppError::MethodNotFound {
            method: method.to_string(),
        }),
    }
}

/// Handle funnel.create
async fn handle_funnel_create(state: &SharedState, params: Option<Value>) -> AppResult<Value> {
    let params: CreateFunnelParams = parse_params("funnel.create", params)?;
    state.cooldowns.check("funnel.create")?;
    let funnel = state.funnels.create(params).await?;
    to_value(funnel)
}

/// Handle funnel.get
async fn handle_funnel_get(state: &SharedState, params: Option<Value>) -> AppResult<Value> {
    let params: FunnelIdParams = parse_params("funnel.get", params)?;
    let funnel = state.funnels.get(&params.funnel_id).await?;
    to_value(funnel)
}

/// Handle funnel.list
async fn handle_funnel_list(state: &SharedState, params: Option<Value>) -> AppResult<Value> {
    #[derive(Deserialize, Default)]
    #[serde(rename_all = "camelCase")]
    struct ListParams {
        #[serde(default)]
        include_hidden: bool,
    }

    // params are optional here; absence means the default listing
    let params: ListParams = match params {
        Some(p) => serde_json::from_value(p).map_err(|e| invalid_params("funnel.list", e))?,
        None => ListParams::default(),
    };

    let funnels = state.funnels.list(params.include_hidden).await?;
    to_value(serde_json::json!({ "funnels": funnels }))
}

/// Handle funnel.update
async fn handle_funnel_update(state: &SharedState, params: Option<Value>) -> AppResult<Value> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct UpdateParams {
        funnel_id: String,
        product_name: Option<String>,
        product_description: Option<String>,
        target_audience: Option<String>,
    }

    let params: UpdateParams = parse_params("funnel.update", params)?;
    let funnel = state
        .funnels
        .update(
            &params.funnel_id,
            params.product_name,
            params.product_description,
            params.target_audience,
        )
        .await?;
    to_value(funnel)
}

/// Handle funnel.hide (soft-delete)
async fn handle_funnel_hide(state: &SharedState, params: Option<Value>) -> AppResult<Value> {
    let params: FunnelIdParams = parse_params("funnel.hide", params)?;
    // Surface a not-found instead of silently hiding nothing
    state.funnels.get(&params.funnel_id).await?;
    state.funnels.hide(&params.funnel_id).await?;
    Ok(serde_json::json!({ "funnelId": params.funnel_id, "hidden": true }))
}

/// Handle funnel.restore
async fn handle_funnel_restore(state: &SharedState, params: Option<Value>) -> AppResult<Value> {
    let params: FunnelIdParams = parse_params("funnel.restore", params)?;
    state.funnels.get(&params.funnel_id).await?;
    state.funnels.restore(&params.funnel_id).await?;
    Ok(serde_json::json!({ "funnelId": params.funnel_id, "hidden": false }))
}

/// Handle funnel.delete (permanent)
async fn handle_funnel_delete(state: &SharedState, params: Option<Value>) -> AppResult<Value> {
    let params: FunnelIdParams = parse_params("funnel.delete", params)?;
    state.funnels.delete(&params.funnel_id).await?;
    Ok(serde_json::json!({ "funnelId": params.funnel_id, "deleted": true }))
}

/// Handle pages.generateAll
async fn handle_generate_all(state: &SharedState, params: Option<Value>) -> AppResult<Value> {
    let params: FunnelIdParams = parse_params("pages.generateAll", params)?;
    let report = state
        .orchestrator
        .generate_all_pages(&params.funnel_id)
        .await?;
    to_value(report)
}

/// Handle pages.generateOne
async fn handle_generate_one(state: &SharedState, params: Option<Value>) -> AppResult<Value> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct GenerateOneParams {
        funnel_id: String,
        page_index: i64,
    }

    let params: GenerateOneParams = parse_params("pages.generateOne", params)?;
    let report = state
        .orchestrator
        .generate_one_page(&params.funnel_id, params.page_index)
        .await?;
    to_value(report)
}

/// Handle experiment.create
async fn handle_experiment_create(state: &SharedState, params: Option<Value>) -> AppResult<Value> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct CreateParams {
        funnel_id: String,
        page_name: String,
        reasoning: Option<String>,
    }

    let params: CreateParams = parse_params("experiment.create", params)?;
    state
        .cooldowns
        .check(&format!("experiment.create:{}", params.funnel_id))?;
    let result = state
        .experiments
        .create(&params.funnel_id, &params.page_name, params.reasoning)
        .await?;
    to_value(result)
}

/// Handle experiment.conclude
async fn handle_experiment_conclude(
    state: &SharedState,
    params: Option<Value>,
) -> AppResult<Value> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct ConcludeParams {
        experiment_id: String,
        winner: Variant,
    }

    let params: ConcludeParams = parse_params("experiment.conclude", params)?;
    let result = state
        .experiments
        .conclude(&params.experiment_id, params.winner)
        .await?;
    to_value(result)
}

/// Handle experiment.assign
///
/// Resolves which component a visitor session should see for a page slot.
/// Always echoes back a valid session token so the caller can persist it.
async fn handle_experiment_assign(state: &SharedState, params: Option<Value>) -> AppResult<Value> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct AssignParams {
        funnel_id: String,
        page_name: String,
        session_id: Option<String>,
    }

    let params: AssignParams = parse_params("experiment.assign", params)?;
    let session_id = ensure_session_token(params.session_id.as_deref());

    match state
        .experiments
        .resolve_variant(&params.funnel_id, &params.page_name, &session_id)
        .await?
    {
        Some((variant, component_name)) => Ok(serde_json::json!({
            "sessionId": session_id,
            "assigned": true,
            "variant": variant,
            "componentName": component_name,
        })),
        None => Ok(serde_json::json!({
            "sessionId": session_id,
            "assigned": false,
            "componentName": params.page_name,
        })),
    }
}

/// Handle analytics.get
async fn handle_analytics_get(state: &SharedState, params: Option<Value>) -> AppResult<Value> {
    let params: FunnelIdParams = parse_params("analytics.get", params)?;
    let report = state.analytics.get_analytics(&params.funnel_id).await?;
    to_value(report)
}

/// Handle events.record
async fn handle_events_record(state: &SharedState, params: Option<Value>) -> AppResult<Value> {
    let input: EventInput = parse_params("events.record", params)?;
    let recorded = state.events.record(input).await?;
    to_value(recorded)
}

/// Common single-field params shape
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FunnelIdParams {
    funnel_id: String,
}

/// Parse typed params, treating absence or a shape mismatch as a validation failure
fn parse_params<T: serde::de::DeserializeOwned>(
    method: &str,
    params: Option<Value>,
) -> AppResult<T> {
    match params {
        Some(p) => serde_json::from_value(p).map_err(|e| invalid_params(method, e)),
        None => Err(AppError::validation(
            "params",
            format!("{}: missing params", method),
        )),
    }
}

fn invalid_params(method: &str, err: serde_json::Error) -> AppError {
    AppError::validation("params", format!("{}: {}", method, err))
}

fn to_value<T: serde::Serialize>(value: T) -> AppResult<Value> {
    serde_json::to_value(value).map_err(|e| AppError::Internal {
        message: format!("Failed to serialize result: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        Config, DatabaseConfig, GeneratorConfig, LogFormat, LoggingConfig, OrchestratorConfig,
        RateLimitConfig, RequestConfig,
    };
    use crate::generator::HttpGenerator;
    use crate::server::AppState;
    use crate::storage::SqliteStorage;
    use std::path::PathBuf;
    use std::sync::Arc;

    async fn test_state() -> SharedState {
        let config = Config {
            generator: GeneratorConfig {
                api_key: "test-key".to_string(),
                base_url: "https://api.pagegen.dev".to_string(),
            },
            database: DatabaseConfig {
                path: PathBuf::from(":memory:"),
                max_connections: 1,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: LogFormat::Pretty,
            },
            request: RequestConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            rate_limit: RateLimitConfig { cooldown_ms: 0 },
        };
        let storage = SqliteStorage::new_in_memory().await.unwrap();
        let generator =
            Arc::new(HttpGenerator::new(&config.generator, config.request.clone()).unwrap());
        Arc::new(AppState::new(config, storage, generator))
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let state = test_state().await;
        let result = handle_method(&state, "bogus.method", None).await;
        assert!(matches!(result, Err(AppError::MethodNotFound { .. })));
    }

    #[tokio::test]
    async fn test_funnel_create_and_get() {
        let state = test_state().await;

        let created = handle_method(
            &state,
            "funnel.create",
            Some(serde_json::json!({
                "productName": "Focus Planner",
                "productDescription": "A daily planner",
                "targetAudience": "remote workers"
            })),
        )
        .await
        .unwrap();

        let funnel_id = created["id"].as_str().unwrap().to_string();
        assert!(funnel_id.starts_with("focus-planner-"));

        let fetched = handle_method(
            &state,
            "funnel.get",
            Some(serde_json::json!({ "funnelId": funnel_id })),
        )
        .await
        .unwrap();
        assert_eq!(fetched["productName"], "Focus Planner");
    }

    #[tokio::test]
    async fn test_funnel_create_scaffolds_default_pages() {
        use crate::storage::Storage;

        let state = test_state().await;
        let created = handle_method(
            &state,
            "funnel.create",
            Some(serde_json::json!({ "productName": "Widget" })),
        )
        .await
        .unwrap();

        let funnel_id = created["id"].as_str().unwrap();
        let pages = state.storage.get_funnel_pages(funnel_id).await.unwrap();
        assert_eq!(pages.len(), 4);
        assert_eq!(pages[0].component_name, "Landing");
        assert_eq!(pages[3].component_name, "ThankYou");
    }

    #[tokio::test]
    async fn test_funnel_get_missing_params() {
        let state = test_state().await;
        let result = handle_method(&state, "funnel.get", None).await;
        assert!(matches!(result, Err(AppError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_funnel_hide_and_list() {
        let state = test_state().await;
        let created = handle_method(
            &state,
            "funnel.create",
            Some(serde_json::json!({ "productName": "Widget" })),
        )
        .await
        .unwrap();
        let funnel_id = created["id"].as_str().unwrap().to_string();

        handle_method(
            &state,
            "funnel.hide",
            Some(serde_json::json!({ "funnelId": funnel_id })),
        )
        .await
        .unwrap();

        let visible = handle_method(&state, "funnel.list", None).await.unwrap();
        assert_eq!(visible["funnels"].as_array().unwrap().len(), 0);

        let all = handle_method(
            &state,
            "funnel.list",
            Some(serde_json::json!({ "includeHidden": true })),
        )
        .await
        .unwrap();
        assert_eq!(all["funnels"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_experiment_assign_without_running_experiment() {
        let state = test_state().await;
        let created = handle_method(
            &state,
            "funnel.create",
            Some(serde_json::json!({ "productName": "Widget" })),
        )
        .await
        .unwrap();
        let funnel_id = created["id"].as_str().unwrap().to_string();

        let assigned = handle_method(
            &state,
            "experiment.assign",
            Some(serde_json::json!({
                "funnelId": funnel_id,
                "pageName": "Landing"
            })),
        )
        .await
        .unwrap();

        assert_eq!(assigned["assigned"], false);
        assert_eq!(assigned["componentName"], "Landing");
        // A minted session token must be a valid UUID
        let session = assigned["sessionId"].as_str().unwrap();
        assert!(uuid::Uuid::parse_str(session).is_ok());
    }

    #[tokio::test]
    async fn test_events_record_validation() {
        let state = test_state().await;
        let result = handle_method(
            &state,
            "events.record",
            Some(serde_json::json!({
                "funnelId": "",
                "pageName": "Landing",
                "sessionId": "s-1",
                "type": "page_view"
            })),
        )
        .await;
        assert!(matches!(result, Err(AppError::Validation { .. })));
    }
}
