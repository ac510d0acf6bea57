//! Artifact persistence: round trips, versioning and compatibility.

use bench_change::{
    ensure_compatible, from_json, load_model, run_inference, save_model, to_json, Acquisition, Error,
    InferenceConfig, SummaryReduction, ARTIFACT_FORMAT_VERSION,
};
use bench_change_core::Vector;

use crate::common::{scalar_batch, scalar_fingerprint, scenario_model, signed_model};

#[test]
fn round_trip_preserves_predictions() {
    let model = signed_model();
    let restored = from_json(&to_json(model).unwrap()).unwrap();
    assert_eq!(&restored, model);

    for s0 in [1.0, 1.7, 2.9, 4.0] {
        let baseline = Vector::from_vec(vec![s0]);
        for (a, b) in model.candidates.iter().zip(&restored.candidates) {
            let pa = a.predict_change(&baseline).unwrap();
            let pb = b.predict_change(&baseline).unwrap();
            assert_eq!(pa, pb, "S0 = {s0}, candidate {}", a.name);
        }
    }
}

#[test]
fn save_and_load_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quadratic.json");
    save_model(scenario_model(), &path).unwrap();
    let loaded = load_model(&path).unwrap();
    assert_eq!(&loaded, scenario_model());

    // The reloaded model gives the same inference
    let batch = scalar_batch(&[(4.0, 0.4, 0.01), (2.25, -0.1, 0.005)]);
    let config = InferenceConfig::default();
    let before = run_inference(scenario_model(), &batch, &config).unwrap();
    let after = run_inference(&loaded, &batch, &config).unwrap();
    assert_eq!(before, after);
}

#[test]
fn artifact_carries_identity_and_version() {
    let json = to_json(scenario_model()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["format_version"], ARTIFACT_FORMAT_VERSION);
    assert_eq!(value["change_model"]["forward_model"], "quadratic");
    assert_eq!(value["change_model"]["fingerprint"]["reduction"], "identity");
    assert_eq!(value["change_model"]["priors"]["entries"][0][1]["family"], "uniform");
}

#[test]
fn newer_version_is_rejected() {
    let json = to_json(scenario_model()).unwrap();
    let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
    value["format_version"] = serde_json::json!(ARTIFACT_FORMAT_VERSION + 1);
    let err = from_json(&value.to_string()).unwrap_err();
    assert!(matches!(err, Error::IncompatibleArtifact { .. }));
    assert!(err.to_string().contains("incompatible artifact format version"));
}

#[test]
fn inconsistent_regression_is_rejected() {
    let mut model = scenario_model().clone();
    model.candidates[0].sensitivity.coefficients.data.pop();
    let err = from_json(&to_json(&model).unwrap()).unwrap_err();
    assert!(matches!(err, Error::CorruptArtifact { .. }), "{err}");
}

#[test]
fn missing_artifact_names_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.json");
    let err = load_model(&path).unwrap_err();
    assert!(err.to_string().contains("absent.json"));
}

#[test]
fn fingerprint_compatibility() {
    let model = scenario_model();
    assert!(ensure_compatible(model, &scalar_fingerprint()).is_ok());
    let other = Acquisition::multi_shell(&[0.0, 1.0], 8).fingerprint(SummaryReduction::Identity);
    assert!(matches!(
        ensure_compatible(model, &other),
        Err(Error::ProtocolMismatch { .. })
    ));
}
