// courier - bitdrift's Prometheus to Cloud Monitoring forwarder
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./resource_map_test.rs"]
mod resource_map_test;

use courier_common::labels::{INSTANCE_LABEL, JOB_LABEL, LabelSet};
use courier_protobuf::protos::api::MonitoredResource;
use serde::Deserialize;

// Discovered labels set aside by relabeling for resource mapping.
pub const PROJECT_ID_LABEL: &str = "__resource_project_id";
pub const LOCATION_LABEL: &str = "__resource_location";
pub const CLUSTER_NAME_LABEL: &str = "__resource_cluster_name";

//
// Translator
//

// How a single monitored resource label obtains its value: copied from a source label, or a
// fixed literal.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Translator {
  Const { source: String },
  Fixed { value: String },
}

//
// LabelTranslation
//

// No deny_unknown_fields here: it cannot coexist with the flattened translator.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct LabelTranslation {
  pub target: String,
  #[serde(flatten)]
  pub translator: Translator,
}

#[must_use]
pub fn const_label(target: &str, source: &str) -> LabelTranslation {
  LabelTranslation {
    target: target.to_string(),
    translator: Translator::Const {
      source: source.to_string(),
    },
  }
}

#[must_use]
pub fn fixed_label(target: &str, value: &str) -> LabelTranslation {
  LabelTranslation {
    target: target.to_string(),
    translator: Translator::Fixed {
      value: value.to_string(),
    },
  }
}

//
// Translated
//

// A successful resource translation: the populated monitored resource plus the sample label
// names that were consumed and must be removed from the residual metric label set. Labels
// sourced from the target's discovered labels are not part of the sample's identity and are
// not listed.
#[derive(Debug, PartialEq)]
pub struct Translated {
  pub resource: MonitoredResource,
  pub consumed_sample_labels: Vec<String>,
}

//
// ResourceMap
//

// One candidate monitored resource type. The candidate matches iff every const translator
// finds a non-empty source label in the sample's labels or the target's discovered labels.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct ResourceMap {
  #[serde(rename = "type")]
  pub resource_type: String,
  pub labels: Vec<LabelTranslation>,
}

impl ResourceMap {
  #[must_use]
  pub fn new(resource_type: &str, labels: Vec<LabelTranslation>) -> Self {
    Self {
      resource_type: resource_type.to_string(),
      labels,
    }
  }

  #[must_use]
  pub fn translate(&self, sample_labels: &LabelSet, discovered: &LabelSet) -> Option<Translated> {
    let mut resource_labels = std::collections::HashMap::new();
    let mut consumed_sample_labels = vec![];
    for translation in &self.labels {
      let value = match &translation.translator {
        Translator::Fixed { value } => value.clone(),
        Translator::Const { source } => {
          // Sample labels shadow discovered labels so that relabeling can override discovery.
          if let Some(value) = sample_labels.get(source).filter(|value| !value.is_empty()) {
            consumed_sample_labels.push(source.clone());
            value.to_string()
          } else if let Some(value) = discovered.get(source).filter(|value| !value.is_empty()) {
            value.to_string()
          } else {
            return None;
          }
        },
      };
      resource_labels.insert(translation.target.clone(), value);
    }

    Some(Translated {
      resource: MonitoredResource {
        r#type: self.resource_type.clone(),
        labels: resource_labels,
      },
      consumed_sample_labels,
    })
  }
}

// Match a sample against an ordered candidate list. First match wins.
#[must_use]
pub fn map_to_resource(
  maps: &[ResourceMap],
  sample_labels: &LabelSet,
  discovered: &LabelSet,
) -> Option<Translated> {
  maps
    .iter()
    .find_map(|map| map.translate(sample_labels, discovered))
}

// Built-in mappings consulted after any user supplied ones. The GKE set maps onto the k8s_*
// resources; the default set covers GCE, EC2, and a generic fallback keyed on target identity.
#[must_use]
pub fn default_mappings(use_gke_resource: bool) -> Vec<ResourceMap> {
  if use_gke_resource {
    vec![
      ResourceMap::new(
        "k8s_container",
        vec![
          const_label("project_id", PROJECT_ID_LABEL),
          const_label("location", LOCATION_LABEL),
          const_label("cluster_name", CLUSTER_NAME_LABEL),
          const_label("namespace_name", "__meta_kubernetes_namespace"),
          const_label("pod_name", "__meta_kubernetes_pod_name"),
          const_label("container_name", "__meta_kubernetes_pod_container_name"),
        ],
      ),
      ResourceMap::new(
        "k8s_pod",
        vec![
          const_label("project_id", PROJECT_ID_LABEL),
          const_label("location", LOCATION_LABEL),
          const_label("cluster_name", CLUSTER_NAME_LABEL),
          const_label("namespace_name", "__meta_kubernetes_namespace"),
          const_label("pod_name", "__meta_kubernetes_pod_name"),
        ],
      ),
      ResourceMap::new(
        "k8s_node",
        vec![
          const_label("project_id", PROJECT_ID_LABEL),
          const_label("location", LOCATION_LABEL),
          const_label("cluster_name", CLUSTER_NAME_LABEL),
          const_label("node_name", "__meta_kubernetes_node_name"),
        ],
      ),
    ]
  } else {
    vec![
      ResourceMap::new(
        "gce_instance",
        vec![
          const_label("project_id", PROJECT_ID_LABEL),
          const_label("instance_id", "__meta_gce_instance_id"),
          const_label("zone", "__meta_gce_zone"),
        ],
      ),
      ResourceMap::new(
        "aws_ec2_instance",
        vec![
          const_label("project_id", PROJECT_ID_LABEL),
          const_label("instance_id", "__meta_ec2_instance_id"),
          const_label("region", "__meta_ec2_region"),
          const_label("aws_account", "__meta_ec2_owner_id"),
        ],
      ),
      ResourceMap::new(
        "generic_task",
        vec![
          const_label("project_id", PROJECT_ID_LABEL),
          const_label("location", LOCATION_LABEL),
          const_label("namespace", JOB_LABEL),
          const_label("job", JOB_LABEL),
          const_label("task_id", INSTANCE_LABEL),
        ],
      ),
    ]
  }
}
