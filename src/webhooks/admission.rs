//! Admission decision builder.
//!
//! Maps an admission request to allow/deny plus an optional JSON patch,
//! invoking the allocation engine only for `Namespace` CREATE and DELETE.
//! Holds no state of its own; everything is dispatched off the request.
//!
//! Error policy:
//! - CREATE: registry failures bubble up and fail the webhook call; better
//!   to block creation than to let a namespace through without a pool.
//! - DELETE: fail-open by default. A release failure is logged and the
//!   deletion is still allowed, unless `Settings::delete_fail_closed` is
//!   set. A claim annotation we cannot parse is logged and treated as
//!   nothing-to-release; it never blocks deletion.
//! - Kinds other than `Namespace` pass through untouched: the webhook
//!   configuration's resource rules are expected to scope delivery, so an
//!   unexpected kind is a configuration artifact, not a policy violation.

use json_patch::jsonptr::PointerBuf;
use json_patch::{AddOperation, Patch, PatchOperation};
use kube::core::DynamicObject;
use kube::core::admission::{AdmissionRequest, Operation};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::allocator::annotation::{CLAIM_ANNOTATION, encode_claim, parse_claim};
use crate::allocator::engine::{Allocator, ClaimOutcome, ReleaseOutcome};
use crate::config::Settings;
use crate::registry::error::RegistryError;

/// A webhook decision, independent of the envelope it travels in.
#[derive(Debug)]
pub struct Decision {
    pub allowed: bool,
    /// Human-readable reason, set on denial.
    pub message: Option<String>,
    /// RFC 6902 patch, set for successful CREATE claims.
    pub patch: Option<Patch>,
    /// Whether a pool transitioned back to available on this request.
    pub released: bool,
}

impl Decision {
    fn allow() -> Self {
        Self {
            allowed: true,
            message: None,
            patch: None,
            released: false,
        }
    }

    fn allow_with_patch(patch: Patch) -> Self {
        Self {
            allowed: true,
            message: None,
            patch: Some(patch),
            released: false,
        }
    }

    fn deny(message: String) -> Self {
        Self {
            allowed: false,
            message: Some(message),
            patch: None,
            released: false,
        }
    }
}

/// Decide an admission request.
///
/// Only returns `Err` for CREATE-path registry failures, which the
/// transport maps to an HTTP 500 (failing the webhook call). Every other
/// path embeds its outcome in the returned [`Decision`].
pub async fn decide(
    allocator: &Allocator,
    settings: &Settings,
    request: &AdmissionRequest<DynamicObject>,
) -> Result<Decision, RegistryError> {
    if request.kind.kind != "Namespace" {
        debug!(kind = %request.kind.kind, "Ignoring non-namespace kind");
        return Ok(Decision::allow());
    }

    match request.operation {
        Operation::Create => handle_create(allocator, settings, request).await,
        Operation::Delete => Ok(handle_delete(allocator, settings, request).await),
        Operation::Update | Operation::Connect => Ok(Decision::allow()),
    }
}

async fn handle_create(
    allocator: &Allocator,
    settings: &Settings,
    request: &AdmissionRequest<DynamicObject>,
) -> Result<Decision, RegistryError> {
    let namespace = request.name.as_str();
    match allocator
        .claim(&settings.placement_label, &settings.placement_value)
        .await?
    {
        ClaimOutcome::Claimed(pool_name) => {
            info!(namespace, pool = %pool_name, "Assigning pool to namespace");
            Ok(Decision::allow_with_patch(claim_patch(request, &pool_name)))
        }
        ClaimOutcome::NoPoolAvailable => {
            warn!(
                namespace,
                placement = %settings.placement_value,
                "Denying namespace creation, no pool available"
            );
            Ok(Decision::deny(format!(
                "no available subnet found for {}={}",
                settings.placement_label, settings.placement_value
            )))
        }
    }
}

/// Build the patch adding the claim annotation. When the incoming object
/// has no annotations map yet, an extra op creates it first; when it does,
/// only the key is added so existing annotations survive.
fn claim_patch(request: &AdmissionRequest<DynamicObject>, pool_name: &str) -> Patch {
    let has_annotations = request
        .object
        .as_ref()
        .and_then(|obj| obj.metadata.annotations.as_ref())
        .is_some();

    let mut ops = Vec::with_capacity(2);
    if !has_annotations {
        ops.push(PatchOperation::Add(AddOperation {
            path: PointerBuf::from_tokens(["metadata", "annotations"]),
            value: json!({}),
        }));
    }
    ops.push(PatchOperation::Add(AddOperation {
        path: PointerBuf::from_tokens(["metadata", "annotations", CLAIM_ANNOTATION]),
        value: json!(encode_claim(pool_name)),
    }));
    Patch(ops)
}

async fn handle_delete(
    allocator: &Allocator,
    settings: &Settings,
    request: &AdmissionRequest<DynamicObject>,
) -> Decision {
    let namespace = request.name.as_str();

    // The namespace may not be gettable after this call, so the claim is
    // read from the object supplied with the request.
    let Some(raw) = request
        .old_object
        .as_ref()
        .and_then(|obj| obj.metadata.annotations.as_ref())
        .and_then(|annotations| annotations.get(CLAIM_ANNOTATION))
    else {
        debug!(namespace, "Namespace carries no pool claim");
        return Decision::allow();
    };

    let pool_name = match parse_claim(raw) {
        Ok(pool_name) => pool_name,
        Err(e) => {
            warn!(namespace, error = %e, "Unparseable claim annotation, nothing to release");
            return Decision::allow();
        }
    };

    match allocator.release(&pool_name).await {
        Ok(outcome) => {
            info!(namespace, pool = %pool_name, ?outcome, "Released pool for deleted namespace");
            Decision {
                released: outcome == ReleaseOutcome::Released,
                ..Decision::allow()
            }
        }
        Err(e) if settings.delete_fail_closed => {
            warn!(namespace, pool = %pool_name, error = %e, "Denying deletion, release failed");
            Decision::deny(format!("failed to release ip pool {}: {}", pool_name, e))
        }
        Err(e) => {
            warn!(
                namespace,
                pool = %pool_name,
                error = %e,
                "Release failed, allowing deletion anyway (fail-open)"
            );
            Decision::allow()
        }
    }
}
