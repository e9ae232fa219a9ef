//! Dynamic model discovery (§4.3): scans configuration for
//! `KSERVE_<MODEL_NAME>_SERVICE` keys and turns each into a `Model`.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub name: String,
    pub service: String,
    pub namespace: String,
    pub url: String,
}

/// Convert `ANOMALY_DETECTOR` -> `anomaly-detector` (§4.3).
pub fn lowercase_hyphenated(model_name: &str) -> String {
    model_name.to_ascii_lowercase().replace('_', "-")
}

/// Build the discovered model set from the already-parsed
/// `Config::kserve_model_services` map (reserved keys are excluded at
/// config-parse time, see `config::discover_kserve_services`).
pub fn build_models(
    services: &HashMap<String, String>,
    namespace: &str,
    predictor_port: u16,
) -> Vec<Model> {
    let mut models: Vec<Model> = services
        .iter()
        .map(|(model_name, service)| Model {
            name: lowercase_hyphenated(model_name),
            service: service.clone(),
            namespace: namespace.to_string(),
            url: format!(
                "http://{service}.{namespace}.svc.cluster.local:{predictor_port}"
            ),
        })
        .collect();
    models.sort_by(|a, b| a.name.cmp(&b.name));
    models
}
