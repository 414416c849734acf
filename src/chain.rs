//! # Transform Chain Module
//!
//! Esegue una sequenza ordinata di minifier su un singolo asset.
//!
//! ## Responsabilità:
//! - Lo stage `i` riceve code/map prodotti dallo stage `i - 1`
//! - I warning di tutti gli stage vengono concatenati in ordine
//! - Il primo stage che fallisce interrompe la catena
//! - `JobPayload`: forma serializzata della catena per i worker isolati
//!   (solo dati: nomi dei minifier, opzioni, input corrente)
//!
//! ## Packaging del risultato:
//! - Con source map finale → `Source::Mapped` che referenzia input e map originali
//! - Senza source map → `Source::Raw`

use crate::asset::Source;
use crate::config::Config;
use crate::error::MinimizeError;
use crate::minify::{MinifierRegistry, Minify, MinifyError, MinifyInput, MinifyOutput};
use crate::sourcemap::SourceMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

/// One minifier with the options it receives
#[derive(Clone)]
pub struct ChainStage {
    pub minifier: Arc<dyn Minify>,
    pub options: Option<Value>,
}

/// Ordered minify stages, fixed at configuration time
#[derive(Clone)]
pub struct TransformChain {
    stages: Vec<ChainStage>,
}

impl TransformChain {
    pub fn new(stages: Vec<ChainStage>) -> Self {
        Self { stages }
    }

    /// Resolve `config.minify` against the registry and pair stage options by position
    pub fn from_config(config: &Config, registry: &MinifierRegistry) -> Result<Self, MinimizeError> {
        let stages = config
            .minify
            .as_slice()
            .iter()
            .enumerate()
            .map(|(index, name)| {
                Ok(ChainStage {
                    minifier: registry.resolve(name)?,
                    options: config.stage_options(index),
                })
            })
            .collect::<Result<Vec<_>, MinimizeError>>()?;

        if stages.is_empty() {
            return Err(MinimizeError::Config("empty minify chain".to_string()));
        }
        Ok(Self { stages })
    }

    pub(crate) fn len(&self) -> usize {
        self.stages.len()
    }

    /// Minifier identities and options; feeds the cache fingerprint
    pub fn identity(&self) -> Value {
        Value::Array(
            self.stages
                .iter()
                .map(|stage| {
                    json!({
                        "minifier": stage.minifier.name(),
                        "version": stage.minifier.version(),
                        "options": stage.options,
                    })
                })
                .collect(),
        )
    }

    /// Run every stage in order on the calling thread
    pub fn run(
        &self,
        name: &str,
        input: &str,
        input_map: Option<SourceMap>,
    ) -> Result<MinifyOutput, MinifyError> {
        run_stages(
            name,
            input,
            input_map,
            self.stages
                .iter()
                .map(|stage| (stage.minifier.clone(), stage.options.clone())),
        )
    }

    /// Plain-data form of this chain applied to one input
    pub fn job(&self, name: &str, input: &str, input_map: Option<SourceMap>) -> JobPayload {
        JobPayload {
            name: name.to_string(),
            input: input.to_string(),
            input_source_map: input_map,
            stages: self
                .stages
                .iter()
                .enumerate()
                .map(|(chain_index, stage)| StagePayload {
                    chain_index,
                    minifier: stage.minifier.name().to_string(),
                    options: stage.options.clone(),
                })
                .collect(),
        }
    }
}

/// Wire form of one chain stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagePayload {
    pub chain_index: usize,
    pub minifier: String,
    #[serde(default)]
    pub options: Option<Value>,
}

/// Self-contained job sent across the worker boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPayload {
    pub name: String,
    pub input: String,
    #[serde(default)]
    pub input_source_map: Option<SourceMap>,
    pub stages: Vec<StagePayload>,
}

impl JobPayload {
    /// Rebuild the chain from names and run it
    pub fn run(&self, registry: &MinifierRegistry) -> Result<MinifyOutput, MinifyError> {
        let mut stages = self.stages.clone();
        stages.sort_by_key(|stage| stage.chain_index);

        let resolved = stages
            .into_iter()
            .map(|stage| {
                registry
                    .get(&stage.minifier)
                    .map(|minifier| (minifier, stage.options))
                    .ok_or_else(|| {
                        MinifyError::new(format!("Unknown minifier '{}'", stage.minifier))
                    })
            })
            .collect::<Result<Vec<_>, MinifyError>>()?;

        run_stages(
            &self.name,
            &self.input,
            self.input_source_map.clone(),
            resolved.into_iter(),
        )
    }
}

fn run_stages(
    name: &str,
    input: &str,
    input_map: Option<SourceMap>,
    stages: impl Iterator<Item = (Arc<dyn Minify>, Option<Value>)>,
) -> Result<MinifyOutput, MinifyError> {
    let mut result = MinifyOutput {
        code: input.to_string(),
        map: input_map,
        warnings: Vec::new(),
    };

    for (index, (minifier, options)) in stages.enumerate() {
        debug!("{}: stage {} ({})", name, index, minifier.name());

        let output = minifier.minify(MinifyInput {
            name: name.to_string(),
            code: std::mem::take(&mut result.code),
            input_source_map: result.map.take(),
            options,
        })?;

        result.code = output.code;
        result.map = output.map;
        result.warnings.extend(output.warnings);
    }

    Ok(result)
}

/// Wrap chain output as the asset's new content
pub fn package(
    name: &str,
    output: &MinifyOutput,
    original_input: &str,
    original_map: Option<&SourceMap>,
) -> Source {
    match &output.map {
        Some(map) => Source::Mapped {
            code: output.code.clone(),
            name: name.to_string(),
            map: map.clone(),
            original_source: Some(original_input.to_string()),
            inner_source_map: original_map.cloned(),
        },
        None => Source::raw(output.code.clone()),
    }
}
