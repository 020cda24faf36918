//! `/webhooks/{provider}`: verify the delivery's signature against the
//! raw body before touching JSON, then persist it and trigger the
//! matching pipeline.
//!
//! Raw-body-first is load-bearing: parsing to JSON and re-serialising
//! before verifying would check the signature against bytes the sender
//! never signed.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;

use zephyr_core::entities::{TriggerType, WebhookDelivery};
use zephyr_core::id::ResourceId;

use crate::error::ApiError;
use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

/// `provider`-specific signature header name and prefix stripped before
/// hex-decoding. Extend this as new providers are onboarded.
fn signature_header(provider: &str) -> Option<(&'static str, &'static str)> {
    match provider {
        "github" => Some(("x-hub-signature-256", "sha256=")),
        "generic" => Some(("x-webhook-signature", "sha256=")),
        _ => None,
    }
}

fn verify_signature(secret: &str, body: &[u8], signature: &str, prefix: &str) -> bool {
    let Some(hex_sig) = signature.strip_prefix(prefix) else {
        return false;
    };
    let Ok(sig_bytes) = hex::decode(hex_sig) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&sig_bytes).is_ok()
}

pub async fn receive(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (header_name, prefix) =
        signature_header(&provider).ok_or_else(|| ApiError::NotFound(format!("unknown provider {provider}")))?;

    let signature = headers
        .get(header_name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if let Some(secret) = state.webhook_secrets.get(&provider) {
        let signature = signature
            .as_deref()
            .ok_or_else(|| ApiError::Unauthorized("missing signature header".to_string()))?;
        if !verify_signature(secret, &body, signature, prefix) {
            return Err(ApiError::Unauthorized("signature mismatch".to_string()));
        }
    }

    let payload: serde_json::Value =
        serde_json::from_slice(&body).map_err(|err| ApiError::BadRequest(err.to_string()))?;

    let event_type = headers
        .get("x-github-event")
        .or_else(|| headers.get("x-event-type"))
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    state
        .store
        .save_webhook_delivery(WebhookDelivery {
            id: ResourceId::new(),
            provider: provider.clone(),
            event_type: event_type.clone(),
            payload: payload.clone(),
            signature,
            received_at: chrono::Utc::now(),
        })
        .await?;

    let project_id = payload
        .get("project_id")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<ResourceId>().ok());
    let pipeline_name = payload.get("pipeline_name").and_then(|v| v.as_str());
    let branch = payload
        .get("ref")
        .and_then(|v| v.as_str())
        .and_then(|r| r.strip_prefix("refs/heads/"));

    let triggered = match (project_id, pipeline_name) {
        (Some(project_id), Some(pipeline_name)) => {
            let ctx = zephyr_config::TriggerContext {
                trigger_type: Some(TriggerType::Webhook),
                branch: branch.map(str::to_string),
                commit_sha: payload.get("after").and_then(|v| v.as_str()).map(str::to_string),
                event_type,
                repository: payload.get("repository").and_then(|v| v.as_str()).map(str::to_string),
                payload: payload.clone(),
            };
            let run_id = state
                .scheduler
                .queue_pipeline_run(project_id, pipeline_name, ctx, branch, None)
                .await?;
            Some(run_id.to_string())
        }
        _ => None,
    };

    Ok(Json(json!({ "received": true, "run_id": triggered })))
}
