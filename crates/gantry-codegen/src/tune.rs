//! Generator for the hyperparameter-tuning stage (optuna).
//!
//! Renders, per sampler: a suggest statement per search-space entry, the
//! estimator construction from suggested parameters, the sampler itself
//! (grid gets an explicit enumerated dictionary computed by the same
//! enumeration as the combination counter; random/TPE get a fixed seed),
//! and the optimize call (grid runs the full enumeration, others run the
//! configured trial count). After the search the best configuration is
//! refit on the training data and persisted like a normal training run.

use std::fmt::Write as _;

use gantry_types::{
    objective_direction, GantryError, ParamSpec, Result, Sampler, TrainerConfig, TrainerMode,
};

use crate::common::{self, SplitSource, MODEL_ARTIFACT};
use crate::py;
use crate::search::enumerate_param;

pub fn tune_script(config: &TrainerConfig, source: SplitSource) -> Result<String> {
    if config.mode != TrainerMode::Tune {
        return Err(GantryError::Generator {
            stage: "tune".into(),
            message: format!("trainer mode is {:?}, not tune", config.mode),
        });
    }
    let tuning = config.tuning_config.as_ref().ok_or_else(|| GantryError::Generator {
        stage: "tune".into(),
        message: "tune mode requires a tuning configuration".into(),
    })?;
    if tuning.search_space.is_empty() {
        return Err(GantryError::Generator {
            stage: "tune".into(),
            message: "search space is empty".into(),
        });
    }

    let model = config.model_type;
    let estimator_import = format!(
        "from {} import {}",
        model.estimator_module(),
        model.estimator_class()
    );

    let mut imports = vec![
        "import ast",
        "import time",
        "import pandas as pd",
        "import joblib",
        "import optuna",
        "from sklearn.model_selection import cross_val_score, train_test_split",
        "from sklearn.preprocessing import LabelEncoder",
        estimator_import.as_str(),
    ];
    imports.extend_from_slice(common::metric_imports());

    let mut s = common::prologue(&imports);
    s.push_str(common::save_model_helper());
    s.push_str(common::load_dataset());
    s.push_str(&common::bind_target(&config.target_column));
    s.push_str(common::preprocess_fit());
    s.push_str("\nstart_time = time.time()\n");

    // The search cross-validates on the training rows and the final model is
    // refit on the same rows: full data for self-split, the precomputed
    // train partition otherwise.
    match source {
        SplitSource::SelfSplit => {
            s.push_str("X_train, y_train = X, y\n");
        }
        SplitSource::Precomputed => {
            s.push_str(&common::split_rows(SplitSource::Precomputed, config.test_split, false));
        }
    }

    // Estimator construction. Stringified structured literals (the MLP
    // hidden_layer_sizes tuple) must be parsed before use.
    let ctor_args = model.constructor_args();
    let ctor = if ctor_args.is_empty() {
        format!("{}(**kwargs)", model.estimator_class())
    } else {
        format!("{}({}, **kwargs)", model.estimator_class(), ctor_args)
    };
    s.push_str("\n\ndef build_model(params):\n    kwargs = dict(params)\n");
    s.push_str(
        "    if isinstance(kwargs.get(\"hidden_layer_sizes\"), str):\n        kwargs[\"hidden_layer_sizes\"] = ast.literal_eval(kwargs[\"hidden_layer_sizes\"])\n",
    );
    let _ = writeln!(s, "    return {ctor}\n");

    // Objective with one suggest statement per search-space entry.
    s.push_str("\ndef objective(trial):\n    params = {}\n");
    for (name, spec) in &tuning.search_space {
        s.push_str(&suggest_statement(name, spec));
    }
    s.push_str("    model = build_model(params)\n");
    let _ = writeln!(
        s,
        "    scores = cross_val_score(model, X_train, y_train, cv={}, scoring={})",
        tuning.cv_folds,
        py::quote(&tuning.scoring_metric)
    );
    s.push_str("    return float(scores.mean())\n");

    // Per-trial reporting.
    s.push_str(
        r#"

def report_trial(study, trial):
    duration_ms = None
    if trial.datetime_start is not None and trial.datetime_complete is not None:
        duration_ms = int((trial.datetime_complete - trial.datetime_start).total_seconds() * 1000)
    emit({
        "type": "trial",
        "trialNumber": trial.number,
        "params": trial.params,
        "score": float(trial.value) if trial.value is not None else 0.0,
        "durationMs": duration_ms,
    })

"#,
    );

    // Sampler construction.
    match tuning.sampler {
        Sampler::Grid => {
            let mut entries = Vec::new();
            for (name, spec) in &tuning.search_space {
                let values = enumerate_param(spec).ok_or_else(|| GantryError::Generator {
                    stage: "tune".into(),
                    message: format!(
                        "parameter '{name}' is not enumerable; grid sampling needs a step or categorical values"
                    ),
                })?;
                entries.push(format!("    {}: {},", py::quote(name), py::list_literal(&values)));
            }
            s.push_str("search_space = {\n");
            for entry in entries {
                s.push_str(&entry);
                s.push('\n');
            }
            s.push_str("}\nsampler = optuna.samplers.GridSampler(search_space)\n");
        }
        Sampler::Random => {
            s.push_str("sampler = optuna.samplers.RandomSampler(seed=42)\n");
        }
        Sampler::Bayesian => {
            s.push_str("sampler = optuna.samplers.TPESampler(seed=42)\n");
        }
    }

    let direction = objective_direction(&tuning.scoring_metric);
    s.push_str("optuna.logging.set_verbosity(optuna.logging.WARNING)\n");
    let _ = writeln!(
        s,
        "study = optuna.create_study(direction={}, sampler=sampler)",
        py::quote(direction.as_str())
    );
    s.push_str("try:\n");
    match tuning.sampler {
        // Grid runs the full enumeration; no trial count.
        Sampler::Grid => {
            s.push_str("    study.optimize(objective, callbacks=[report_trial])\n");
        }
        Sampler::Random | Sampler::Bayesian => {
            let _ = writeln!(
                s,
                "    study.optimize(objective, n_trials={}, callbacks=[report_trial])",
                tuning.n_trials
            );
        }
    }
    s.push_str(
        r#"except Exception as exc:
    fail("Hyperparameter search failed: " + str(exc))
"#,
    );

    // Refit the best configuration and persist it like a training run.
    s.push_str(
        r#"
best_params = study.best_params
model = build_model(best_params)
try:
    model.fit(X_train, y_train)
except Exception as exc:
    fail("Refitting best model failed: " + str(exc))
"#,
    );
    let _ = writeln!(s, "save_model(model, {})", py::quote(MODEL_ARTIFACT));
    s.push_str(&common::write_model_info(model.as_str(), model.problem_type()));

    s.push_str(
        r#"
emit({
    "type": "tuningComplete",
    "bestParams": best_params,
    "bestScore": float(study.best_value),
    "totalTrials": len(study.trials),
    "durationMs": int((time.time() - start_time) * 1000),
})
"#,
    );
    s.push_str(common::epilogue());
    Ok(s)
}

/// One optuna suggest statement, indented for the objective body.
fn suggest_statement(name: &str, spec: &ParamSpec) -> String {
    let key = py::quote(name);
    match spec {
        ParamSpec::Int { min, max, step } => match step {
            Some(step) => format!(
                "    params[{key}] = trial.suggest_int({key}, {min}, {max}, step={step})\n"
            ),
            None => format!("    params[{key}] = trial.suggest_int({key}, {min}, {max})\n"),
        },
        ParamSpec::Float { min, max, distribution } => {
            let lo = py::float_literal(*min);
            let hi = py::float_literal(*max);
            match distribution {
                gantry_types::Distribution::Uniform => {
                    format!("    params[{key}] = trial.suggest_float({key}, {lo}, {hi})\n")
                }
                gantry_types::Distribution::Log => {
                    format!("    params[{key}] = trial.suggest_float({key}, {lo}, {hi}, log=True)\n")
                }
            }
        }
        ParamSpec::Categorical { values } => {
            format!(
                "    params[{key}] = trial.suggest_categorical({key}, {})\n",
                py::list_literal(values)
            )
        }
    }
}
