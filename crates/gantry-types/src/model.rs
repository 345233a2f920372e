//! Model knowledge: the closed set of supported estimators, their problem
//! type, scikit-learn class, tunable hyperparameters, and valid scoring
//! metrics.
//!
//! The generators and the search-space validator both consult this table;
//! keeping it in one place is what makes "metric valid for this model" and
//! "model has tunable parameters" agree everywhere.

use serde::{Deserialize, Serialize};

/// Whether a model predicts a class label or a continuous value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProblemType {
    Classification,
    Regression,
}

impl ProblemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProblemType::Classification => "classification",
            ProblemType::Regression => "regression",
        }
    }
}

/// The closed set of supported model types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    // Classification
    LogisticRegression,
    DecisionTree,
    RandomForest,
    GradientBoosting,
    Svm,
    Knn,
    NaiveBayes,
    Mlp,
    // Regression
    LinearRegression,
    Ridge,
    Lasso,
    DecisionTreeRegressor,
    RandomForestRegressor,
    GradientBoostingRegressor,
    Svr,
    MlpRegressor,
}

/// Scoring metrics accepted for classifiers.
pub const CLASSIFICATION_METRICS: &[&str] = &["accuracy", "precision", "recall", "f1", "roc_auc"];

/// Scoring metrics accepted for regressors.
pub const REGRESSION_METRICS: &[&str] = &[
    "r2",
    "neg_mean_squared_error",
    "neg_root_mean_squared_error",
    "neg_mean_absolute_error",
];

impl ModelType {
    pub fn problem_type(&self) -> ProblemType {
        use ModelType::*;
        match self {
            LogisticRegression | DecisionTree | RandomForest | GradientBoosting | Svm | Knn
            | NaiveBayes | Mlp => ProblemType::Classification,
            LinearRegression | Ridge | Lasso | DecisionTreeRegressor | RandomForestRegressor
            | GradientBoostingRegressor | Svr | MlpRegressor => ProblemType::Regression,
        }
    }

    /// The scikit-learn estimator class name.
    pub fn estimator_class(&self) -> &'static str {
        use ModelType::*;
        match self {
            LogisticRegression => "LogisticRegression",
            DecisionTree => "DecisionTreeClassifier",
            RandomForest => "RandomForestClassifier",
            GradientBoosting => "GradientBoostingClassifier",
            Svm => "SVC",
            Knn => "KNeighborsClassifier",
            NaiveBayes => "GaussianNB",
            Mlp => "MLPClassifier",
            LinearRegression => "LinearRegression",
            Ridge => "Ridge",
            Lasso => "Lasso",
            DecisionTreeRegressor => "DecisionTreeRegressor",
            RandomForestRegressor => "RandomForestRegressor",
            GradientBoostingRegressor => "GradientBoostingRegressor",
            Svr => "SVR",
            MlpRegressor => "MLPRegressor",
        }
    }

    /// The scikit-learn module the estimator class is imported from.
    pub fn estimator_module(&self) -> &'static str {
        use ModelType::*;
        match self {
            LogisticRegression | LinearRegression | Ridge | Lasso => "sklearn.linear_model",
            DecisionTree | DecisionTreeRegressor => "sklearn.tree",
            RandomForest | GradientBoosting | RandomForestRegressor
            | GradientBoostingRegressor => "sklearn.ensemble",
            Svm | Svr => "sklearn.svm",
            Knn => "sklearn.neighbors",
            NaiveBayes => "sklearn.naive_bayes",
            Mlp | MlpRegressor => "sklearn.neural_network",
        }
    }

    /// Extra constructor arguments baked into generated instantiation.
    ///
    /// `probability=True` on SVC keeps predict_proba available for roc_auc
    /// scoring and SHAP; seeded estimators get `random_state=42` so repeat
    /// runs are comparable.
    pub fn constructor_args(&self) -> &'static str {
        use ModelType::*;
        match self {
            LogisticRegression => "max_iter=1000, random_state=42",
            DecisionTree | RandomForest | GradientBoosting | DecisionTreeRegressor
            | RandomForestRegressor | GradientBoostingRegressor => "random_state=42",
            Svm => "probability=True, random_state=42",
            Mlp | MlpRegressor => "max_iter=500, random_state=42",
            Knn | NaiveBayes | LinearRegression | Svr => "",
            Ridge | Lasso => "random_state=42",
        }
    }

    /// Hyperparameter names the tuner may search over for this model.
    /// Empty means the model is not tunable (plain linear regression).
    pub fn tunable_params(&self) -> &'static [&'static str] {
        use ModelType::*;
        match self {
            LogisticRegression => &["C", "penalty", "solver", "max_iter"],
            DecisionTree | DecisionTreeRegressor => {
                &["max_depth", "min_samples_split", "min_samples_leaf", "criterion"]
            }
            RandomForest | RandomForestRegressor => &[
                "n_estimators",
                "max_depth",
                "min_samples_split",
                "min_samples_leaf",
                "max_features",
            ],
            GradientBoosting | GradientBoostingRegressor => {
                &["n_estimators", "learning_rate", "max_depth", "subsample"]
            }
            Svm | Svr => &["C", "kernel", "gamma"],
            Knn => &["n_neighbors", "weights", "p"],
            NaiveBayes => &["var_smoothing"],
            Mlp | MlpRegressor => &["hidden_layer_sizes", "alpha", "learning_rate_init", "activation"],
            LinearRegression => &[],
            Ridge | Lasso => &["alpha"],
        }
    }

    /// Valid scoring metrics for this model's problem type.
    pub fn valid_metrics(&self) -> &'static [&'static str] {
        match self.problem_type() {
            ProblemType::Classification => CLASSIFICATION_METRICS,
            ProblemType::Regression => REGRESSION_METRICS,
        }
    }

    /// The snake_case wire name, as serialized by the editor.
    pub fn as_str(&self) -> &'static str {
        use ModelType::*;
        match self {
            LogisticRegression => "logistic_regression",
            DecisionTree => "decision_tree",
            RandomForest => "random_forest",
            GradientBoosting => "gradient_boosting",
            Svm => "svm",
            Knn => "knn",
            NaiveBayes => "naive_bayes",
            Mlp => "mlp",
            LinearRegression => "linear_regression",
            Ridge => "ridge",
            Lasso => "lasso",
            DecisionTreeRegressor => "decision_tree_regressor",
            RandomForestRegressor => "random_forest_regressor",
            GradientBoostingRegressor => "gradient_boosting_regressor",
            Svr => "svr",
            MlpRegressor => "mlp_regressor",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_uses_snake_case_wire_names() {
        assert_eq!(
            serde_json::to_string(&ModelType::RandomForest).unwrap(),
            "\"random_forest\""
        );
        let m: ModelType = serde_json::from_str("\"gradient_boosting_regressor\"").unwrap();
        assert_eq!(m, ModelType::GradientBoostingRegressor);
    }

    #[test]
    fn wire_name_matches_serde() {
        for m in [
            ModelType::LogisticRegression,
            ModelType::Svm,
            ModelType::MlpRegressor,
            ModelType::NaiveBayes,
        ] {
            let via_serde = serde_json::to_string(&m).unwrap();
            assert_eq!(via_serde, format!("\"{}\"", m.as_str()));
        }
    }

    #[test]
    fn problem_types() {
        assert_eq!(ModelType::RandomForest.problem_type(), ProblemType::Classification);
        assert_eq!(ModelType::Lasso.problem_type(), ProblemType::Regression);
    }

    #[test]
    fn linear_regression_has_no_tunable_params() {
        assert!(ModelType::LinearRegression.tunable_params().is_empty());
        assert!(!ModelType::Ridge.tunable_params().is_empty());
    }

    #[test]
    fn metrics_match_problem_type() {
        assert!(ModelType::Knn.valid_metrics().contains(&"accuracy"));
        assert!(!ModelType::Knn.valid_metrics().contains(&"r2"));
        assert!(ModelType::Svr.valid_metrics().contains(&"r2"));
        assert!(!ModelType::Svr.valid_metrics().contains(&"f1"));
    }

    #[test]
    fn estimator_classes_and_modules() {
        assert_eq!(ModelType::Svm.estimator_class(), "SVC");
        assert_eq!(ModelType::Svm.estimator_module(), "sklearn.svm");
        assert_eq!(ModelType::Mlp.estimator_class(), "MLPClassifier");
        assert_eq!(ModelType::Mlp.estimator_module(), "sklearn.neural_network");
    }
}
