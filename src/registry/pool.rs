//! Calico IPPool resource type and the domain view of a pool.
//!
//! The IPPool CRD is owned by Calico; this webhook is only a client of it.
//! We derive the resource type here so the kube client can list/get/patch
//! pools, but never create or delete them. The webhook only reads
//! `spec.cidr` and the metadata labels, and only ever writes the `status`
//! label.

use std::collections::BTreeMap;
use std::fmt;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Label key carrying pool availability (`available` / `used`).
pub const STATUS_LABEL: &str = "status";

/// IPPool is Calico's cluster-scoped address-pool resource.
///
/// Only the fields this webhook reads are modeled; everything else in the
/// spec is left untouched by our label-only merge patches.
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "crd.projectcalico.org",
    version = "v1",
    kind = "IPPool",
    plural = "ippools"
)]
#[serde(rename_all = "camelCase")]
pub struct IPPoolSpec {
    /// The address block, e.g. `10.1.0.0/26`. Opaque to this webhook.
    pub cidr: String,
}

/// Availability state of a pool, stored in its `status` label.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PoolStatus {
    Available,
    Used,
}

impl PoolStatus {
    /// The canonical (lower-case) label value.
    pub fn as_label(&self) -> &'static str {
        match self {
            PoolStatus::Available => "available",
            PoolStatus::Used => "used",
        }
    }

    /// Parse a label value, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "available" => Some(PoolStatus::Available),
            "used" => Some(PoolStatus::Used),
            _ => None,
        }
    }
}

impl fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Lower-case every label key. Pools labeled by hand sometimes carry mixed
/// case (`Location`, `Status`); all comparisons and writes go through the
/// normalized form so we never end up with duplicate keys differing only
/// by case.
pub fn normalize_labels(labels: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    labels
        .iter()
        .map(|(key, value)| (key.to_ascii_lowercase(), value.clone()))
        .collect()
}

/// A pool as observed from the registry at a point in time.
///
/// Carries the raw labels exactly as stored (needed to build writes that
/// clean up mixed-case keys) and the revision token used for
/// optimistic-concurrency writes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pool {
    pub name: String,
    pub cidr: String,
    /// Labels as stored in the registry, keys not yet normalized.
    pub labels: BTreeMap<String, String>,
    /// `metadata.resourceVersion` at observation time.
    pub resource_version: Option<String>,
}

impl Pool {
    /// Convert from the kube resource representation.
    pub fn from_resource(resource: &IPPool) -> Self {
        Self {
            name: resource.metadata.name.clone().unwrap_or_default(),
            cidr: resource.spec.cidr.clone(),
            labels: resource.metadata.labels.clone().unwrap_or_default(),
            resource_version: resource.metadata.resource_version.clone(),
        }
    }

    /// Labels with keys lower-cased.
    pub fn normalized_labels(&self) -> BTreeMap<String, String> {
        normalize_labels(&self.labels)
    }

    /// Case-insensitive label lookup.
    pub fn label(&self, key: &str) -> Option<String> {
        let key = key.to_ascii_lowercase();
        self.labels
            .iter()
            .find(|(k, _)| k.to_ascii_lowercase() == key)
            .map(|(_, v)| v.clone())
    }

    /// Availability as recorded in the `status` label, if parseable.
    pub fn status(&self) -> Option<PoolStatus> {
        self.label(STATUS_LABEL)
            .and_then(|value| PoolStatus::parse(&value))
    }
}
