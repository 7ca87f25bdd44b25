use super::Options;
use converge_cloud::{CloudError, ReconcileRequest, ReconcileResult, ResourceRef, resolve};
use std::path::Path;

/// Read a YAML or JSON manifest
pub fn load_manifest(path: &Path) -> Result<ReconcileRequest, CloudError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        CloudError::Validation(format!("cannot read manifest {}: {}", path.display(), e))
    })?;

    // JSON is valid YAML, one parser covers both
    serde_yaml::from_str(&content).map_err(|e| {
        CloudError::Validation(format!("invalid manifest {}: {}", path.display(), e))
    })
}

pub async fn apply(options: &Options, manifest: &Path) -> anyhow::Result<serde_json::Value> {
    let request = load_manifest(manifest)?;

    // Reject bad rules before credentials are needed
    request.reference().require()?;
    request.spec.normalized_rules()?;

    tracing::info!("Applying {} (state: {})", manifest.display(), request.state);

    let client = options.client()?;
    let result = options.reconciler(&client).reconcile(&request).await?;
    Ok(serde_json::to_value(result.project())?)
}

pub async fn delete(
    options: &Options,
    id: Option<u64>,
    name: Option<String>,
) -> anyhow::Result<serde_json::Value> {
    let reference = ResourceRef { id, name };
    reference.require()?;

    let client = options.client()?;
    let result = options.reconciler(&client).absent(&reference).await?;
    Ok(serde_json::to_value(result.project())?)
}

pub async fn show(options: &Options, token: &str) -> anyhow::Result<serde_json::Value> {
    let client = options.client()?;
    let firewall = resolve(&client, token).await?;
    Ok(serde_json::to_value(
        ReconcileResult::unchanged(Some(firewall)).project(),
    )?)
}
