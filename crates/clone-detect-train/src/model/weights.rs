//! Loading safetensors weights into a trainable `VarMap`.
//!
//! Backbones are built on a `VarMap` so every parameter is a `Var`. Pretrained
//! tensors are then copied in by name; parameters absent from the file (the
//! classification head) keep their initialization.

use std::collections::HashMap;
use std::path::Path;

use candle_core::{Device, Tensor};
use candle_nn::VarMap;
use tracing::{debug, info, warn};

use crate::error::{TrainError, TrainResult};

/// Outcome of copying tensors into a `VarMap`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Parameters overwritten from the file.
    pub loaded: usize,
    /// Parameters with no matching tensor.
    pub missing: Vec<String>,
}

/// Read every tensor of a safetensors file.
pub fn read_safetensors(path: &Path, device: &Device) -> TrainResult<HashMap<String, Tensor>> {
    if !path.is_file() {
        return Err(TrainError::model_load(path, "weights file not found"));
    }
    candle_core::safetensors::load(path, device)
        .map_err(|e| TrainError::model_load(path, e.to_string()))
}

/// First candidate prefix under which `names` hold a tensor, or `None` when
/// the weights are stored at the root.
///
/// A prefix matches when some name starts with `"{prefix}."`.
pub fn detect_prefix<'a>(
    names: impl IntoIterator<Item = &'a String>,
    candidates: &[&str],
) -> Option<String> {
    let names: Vec<&String> = names.into_iter().collect();
    candidates
        .iter()
        .find(|prefix| {
            let dotted = format!("{}.", prefix);
            names.iter().any(|n| n.starts_with(&dotted))
        })
        .map(|p| (*p).to_string())
}

/// Copy matching tensors into `varmap`.
///
/// With `strict`, any parameter missing from `tensors` is an error; this is
/// how fine-tuned checkpoints are restored. Shape mismatches are always
/// errors.
pub fn load_into_varmap(
    varmap: &VarMap,
    tensors: &HashMap<String, Tensor>,
    strict: bool,
) -> TrainResult<LoadReport> {
    let data = varmap
        .data()
        .lock()
        .map_err(|_| TrainError::config("parameter map lock poisoned"))?;

    let mut report = LoadReport::default();
    for (name, var) in data.iter() {
        match tensors.get(name) {
            Some(tensor) => {
                if tensor.dims() != var.dims() {
                    return Err(TrainError::config(format!(
                        "shape mismatch for '{}': model {:?}, weights {:?}",
                        name,
                        var.dims(),
                        tensor.dims()
                    )));
                }
                var.set(&tensor.to_dtype(var.dtype())?.to_device(var.device())?)?;
                report.loaded += 1;
            }
            None => report.missing.push(name.clone()),
        }
    }
    report.missing.sort();

    if strict && !report.missing.is_empty() {
        return Err(TrainError::config(format!(
            "checkpoint is missing {} parameter(s), first: '{}'",
            report.missing.len(),
            report.missing[0]
        )));
    }
    if !report.missing.is_empty() {
        debug!(missing = ?report.missing, "Parameters kept at initialization");
    }
    Ok(report)
}

/// Restore a fine-tuned checkpoint written by [`save_checkpoint`].
pub fn load_checkpoint(varmap: &VarMap, path: &Path, device: &Device) -> TrainResult<LoadReport> {
    let tensors = read_safetensors(path, device)?;
    let report = load_into_varmap(varmap, &tensors, true)?;
    info!(path = %path.display(), parameters = report.loaded, "Restored checkpoint");
    Ok(report)
}

/// Initialize a backbone from pretrained tensors read from `source`,
/// tolerating parameters the file does not have.
pub fn load_pretrained(
    varmap: &VarMap,
    tensors: &HashMap<String, Tensor>,
    source: &Path,
) -> TrainResult<LoadReport> {
    let report = load_into_varmap(varmap, tensors, false)?;
    if report.loaded == 0 {
        return Err(TrainError::model_load(
            source,
            "no parameter names matched the pretrained weights",
        ));
    }
    if !report.missing.is_empty() {
        warn!(
            path = %source.display(),
            loaded = report.loaded,
            newly_initialized = report.missing.len(),
            "Some parameters were not found in pretrained weights"
        );
    }
    Ok(report)
}

/// Write every parameter to `path`.
pub fn save_checkpoint(varmap: &VarMap, path: &Path) -> TrainResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    varmap
        .save(path)
        .map_err(|e| TrainError::model_load(path, format!("failed to save: {}", e)))?;
    info!(path = %path.display(), "Saved checkpoint");
    Ok(())
}
