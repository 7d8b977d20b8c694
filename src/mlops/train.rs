use anyhow::Result;
use std::collections::BTreeMap;

use super::config::MlopsConfig;
use super::dataset;
use super::metrics::{evaluate, EvalMetrics};
use super::registry::{ModelRegistry, Stage};
use crate::classifier::Model;

#[derive(Debug, Clone)]
pub struct TrainOutcome {
    pub run_id: String,
    pub metrics: EvalMetrics,
    pub model: Model,
}

pub fn evaluate_model(model: &Model, samples: &[dataset::Sample]) -> EvalMetrics {
    let mut y_true = Vec::with_capacity(samples.len());
    let mut y_pred = Vec::with_capacity(samples.len());
    let mut p_real = Vec::with_capacity(samples.len());
    for s in samples {
        let p = model.predict(&s.text);
        y_true.push(s.label);
        y_pred.push(p.label.as_u8());
        p_real.push(p.p_real);
    }
    evaluate(&y_true, &y_pred, &p_real)
}

/// Prepare data, fit, evaluate on the held-out split, log to the registry
/// and promote to the configured stage. CPU-bound; call from a blocking task.
pub fn train_and_log(
    cfg: &MlopsConfig,
    registry: &ModelRegistry,
    include_feedback: bool,
    save_local: bool,
) -> Result<TrainOutcome> {
    let data = dataset::prepare(cfg, include_feedback)?;
    let params = cfg.train_params();

    let texts: Vec<&str> = data.train.iter().map(|s| s.text.as_str()).collect();
    let labels: Vec<u8> = data.train.iter().map(|s| s.label).collect();
    let mut model = Model::fit(&texts, &labels, &params)?;

    let metrics = evaluate_model(&model, &data.test);
    tracing::info!(
        accuracy = metrics.accuracy,
        f1 = metrics.f1,
        roc_auc = metrics.roc_auc,
        "model evaluated"
    );

    let tags = BTreeMap::from([
        ("include_feedback".to_string(), include_feedback.to_string()),
        ("train_rows".to_string(), data.train.len().to_string()),
        ("test_rows".to_string(), data.test.len().to_string()),
    ]);
    let entry = registry.log_model(&model, metrics.to_map(), &data.hash, tags)?;
    let stage: Stage = cfg.model_stage.parse().unwrap_or(Stage::Production);
    registry.transition(&entry.run_id, stage)?;
    model.meta.run_id = Some(entry.run_id.clone());

    if save_local {
        model.save(&cfg.local_model_path())?;
        tracing::info!(path = %cfg.local_model_path().display(), "local model written");
    }

    Ok(TrainOutcome {
        run_id: entry.run_id,
        metrics,
        model,
    })
}
