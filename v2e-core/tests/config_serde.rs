#![cfg(feature = "serde")]

use v2e_core::{DvsModel, EmulatorConfig};

#[test]
fn config_round_trips_through_json() {
    let cfg = EmulatorConfig {
        seed: 99,
        cs_lambda_pixels: Some(2.5),
        ..EmulatorConfig::preset(DvsModel::Noisy)
    };
    let json = serde_json::to_string(&cfg).unwrap();
    let back: EmulatorConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, cfg);
}

#[test]
fn missing_fields_take_defaults() {
    let cfg: EmulatorConfig = serde_json::from_str(r#"{ "pos_thres": 0.3, "seed": 5 }"#).unwrap();
    assert_eq!(cfg.pos_thres, 0.3);
    assert_eq!(cfg.seed, 5);
    assert_eq!(cfg.neg_thres, EmulatorConfig::default().neg_thres);
    assert!(cfg.cs_lambda_pixels.is_none());
    assert!(cfg.validate().is_ok());
}
