mod common;

use std::path::PathBuf;

use issue_router::{
    ClassificationModel, Classifier, ClassifierError, InferenceFailure, LabelSet, OnnxModel, RuntimeConfig,
};

// Both fixtures score `mean(input_ids * attention_mask) * [0.1, -0.2, 0.3]`.
// The dynamic one leaves its output width symbolic and also takes
// `token_type_ids`, which are added before pooling.
fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures").join(name)
}

fn labels(count: usize) -> LabelSet {
    let names = ["Printer", "Scanner", "Laptop", "Monitor"];
    LabelSet::new(names[..count].to_vec()).unwrap()
}

fn assert_scores(actual: &[f32], expected: &[f32]) {
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected) {
        assert!(a.is_finite());
        assert!((a - e).abs() < 1e-5, "got {:?}, expected {:?}", actual, expected);
    }
}

#[test]
fn test_loads_model_matching_label_count() -> Result<(), ClassifierError> {
    common::init_logger();
    let model = OnnxModel::load(fixture("three_labels.onnx"), &labels(3), &RuntimeConfig::default())?;
    assert_eq!(model.output_dim(), 3);
    assert!(model.model_path().ends_with("three_labels.onnx"));

    assert_scores(&model.score(&[2, 4], &[1, 1])?, &[0.3, -0.6, 0.9]);
    Ok(())
}

#[test]
fn test_attention_mask_reaches_the_graph() -> Result<(), ClassifierError> {
    let model = OnnxModel::load(fixture("three_labels.onnx"), &labels(3), &RuntimeConfig::default())?;
    assert_scores(&model.score(&[2, 4], &[1, 0])?, &[0.1, -0.2, 0.3]);
    Ok(())
}

#[test]
fn test_output_width_differs_from_label_count() {
    for name in ["three_labels.onnx", "three_labels_dynamic.onnx"] {
        match OnnxModel::load(fixture(name), &labels(4), &RuntimeConfig::default()) {
            Err(ClassifierError::ModelLoadError(msg)) => {
                assert!(msg.contains("3 scores") && msg.contains("4 labels"), "{}: {}", name, msg)
            }
            other => panic!("{}: expected ModelLoadError, got {:?}", name, other.map(|_| ())),
        }
    }
}

#[test]
fn test_symbolic_output_width_and_token_type_ids() -> Result<(), ClassifierError> {
    let model = OnnxModel::load(fixture("three_labels_dynamic.onnx"), &labels(3), &RuntimeConfig::default())?;
    assert_eq!(model.output_dim(), 3);
    // Zero token types leave the pooled value untouched.
    assert_scores(&model.score(&[2, 4], &[1, 1])?, &[0.3, -0.6, 0.9]);
    Ok(())
}

#[test]
fn test_rejects_malformed_inputs() -> Result<(), ClassifierError> {
    let model = OnnxModel::load(fixture("three_labels.onnx"), &labels(3), &RuntimeConfig::default())?;
    assert!(matches!(
        model.score(&[], &[]),
        Err(ClassifierError::ModelInferenceError(InferenceFailure::Engine(_)))
    ));
    assert!(matches!(
        model.score(&[1, 2], &[1]),
        Err(ClassifierError::ModelInferenceError(InferenceFailure::Engine(_)))
    ));
    Ok(())
}

#[test]
fn test_classifier_over_onnx_model() -> Result<(), ClassifierError> {
    let classifier = Classifier::builder()
        .with_vocabulary(common::vocabulary())
        .with_labels(labels(3))
        .with_onnx_model(fixture("three_labels.onnx"))?
        .build()?;
    assert!(classifier.info().model_path.is_some());

    // "laptop" and "mouse" are ids 11 and 14, pooled to 12.5.
    let ranked = classifier.classify("laptop mouse")?;
    let order: Vec<&str> = ranked.iter().map(|e| e.label.as_str()).collect();
    assert_eq!(order, vec!["Laptop", "Printer", "Scanner"]);
    let total: f32 = ranked.iter().map(|e| e.probability).sum();
    assert!((total - 1.0).abs() < 1e-6);
    Ok(())
}
