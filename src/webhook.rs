//! Validating admission webhook for spreads.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use kube::api::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};

use crate::api::WorkloadSpread;
use crate::field;
use crate::store::{ObjectStore, WhitelistSource};
use crate::structural::StructuralValidator;
use crate::validation::WorkloadSpreadValidator;

pub const VALIDATE_PATH: &str = "/validate-apps-kruise-io-v1alpha1-workloadspread";

/// Shared handles used by every admission request.
pub struct AdmissionState {
    pub store:      Arc<dyn ObjectStore>,
    pub whitelist:  Arc<dyn WhitelistSource>,
    pub structural: Arc<dyn StructuralValidator>,
}

pub fn router(state: Arc<AdmissionState>) -> Router {
    Router::new()
        .route(VALIDATE_PATH, post(validate_handler))
        .route("/healthz", get(|| async { "ok" }))
        .with_state(state)
}

async fn validate_handler(
    State(state): State<Arc<AdmissionState>>,
    Json(review): Json<AdmissionReview<DynamicObject>>,
) -> Json<AdmissionReview<DynamicObject>> {
    let request: AdmissionRequest<DynamicObject> = match review.try_into() {
        Ok(request) => request,
        Err(err) => {
            log::error!("malformed admission review: {err}");
            return Json(AdmissionResponse::invalid(err.to_string()).into_review());
        }
    };

    Json(admit(&state, &request).await.into_review())
}

/// Decides one admission request. Only creates and updates are inspected.
pub async fn admit(state: &AdmissionState, request: &AdmissionRequest<DynamicObject>) -> AdmissionResponse {
    let response = AdmissionResponse::from(request);

    let (new, old) = match request.operation {
        Operation::Create => (request.object.as_ref(), None),
        Operation::Update => (request.object.as_ref(), request.old_object.as_ref()),
        Operation::Delete | Operation::Connect => return response,
    };

    let new = match new.map(decode).transpose() {
        Ok(Some(new)) => new,
        Ok(None) => return response.deny("admission request carries no object"),
        Err(err) => return response.deny(format!("failed to decode WorkloadSpread: {err}")),
    };
    let old = match old.map(decode).transpose() {
        Ok(old) => old,
        Err(err) => return response.deny(format!("failed to decode old WorkloadSpread: {err}")),
    };

    let validator =
        WorkloadSpreadValidator::new(state.store.as_ref(), state.whitelist.as_ref(), state.structural.as_ref());
    let errs = match &old {
        Some(old) => validator.validate_update(old, &new).await,
        None => validator.validate(&new).await,
    };

    let namespace = new.metadata.namespace.as_deref().unwrap_or_default();
    let name = new.metadata.name.as_deref().unwrap_or_default();
    match field::aggregate(&errs) {
        Some(message) => {
            log::info!("denied {:?} of WorkloadSpread {namespace}/{name}: {message}", request.operation);
            response.deny(message)
        }
        None => {
            log::debug!("admitted {:?} of WorkloadSpread {namespace}/{name}", request.operation);
            response
        }
    }
}

fn decode(object: &DynamicObject) -> Result<WorkloadSpread, serde_json::Error> {
    serde_json::to_value(object).and_then(serde_json::from_value)
}
