use super::{Backend, ConfigOverrides, GraphConfig, ENV_CRITIQUE_MODEL, ENV_LM_COMMAND};
use crate::error::WorkflowError;
use std::collections::HashMap;

#[test]
fn empty_document_yields_defaults() {
    let config = GraphConfig::from_json("{}").expect("parse config");
    assert_eq!(config, GraphConfig::default());
    assert_eq!(config.draft_model, Backend::Openai);
    assert_eq!(config.max_steps, 25);
    assert_eq!(config.code_language, "python");
}

#[test]
fn backends_parse_from_json() {
    let config = GraphConfig::from_json(
        r#"{"draft_model":"anthropic","gather_model":"openai","critique_model":"command","lm_command":"llm -m local"}"#,
    )
    .expect("parse config");
    assert_eq!(config.draft_model, Backend::Anthropic);
    assert_eq!(config.critique_model, Backend::Command);
    config.validate().expect("valid config");
}

#[test]
fn unknown_backend_in_file_is_a_configuration_error() {
    let err = GraphConfig::from_json(r#"{"draft_model":"mistral"}"#).unwrap_err();
    assert!(matches!(err, WorkflowError::Configuration(_)), "{err}");
}

#[test]
fn unknown_keys_are_rejected() {
    let err = GraphConfig::from_json(r#"{"draft_modle":"openai"}"#).unwrap_err();
    assert!(matches!(err, WorkflowError::Configuration(_)), "{err}");
}

#[test]
fn unknown_backend_override_fails_fast() {
    let overrides = ConfigOverrides {
        gather_model: Some("gpt5".to_string()),
        ..ConfigOverrides::default()
    };
    let err = GraphConfig::default().with_overrides(overrides).unwrap_err();
    assert!(err.to_string().contains("gpt5"), "{err}");
}

#[test]
fn backend_names_are_case_insensitive() {
    assert_eq!("Anthropic".parse::<Backend>().expect("parse"), Backend::Anthropic);
    assert_eq!(" openai ".parse::<Backend>().expect("parse"), Backend::Openai);
}

#[test]
fn command_backend_requires_a_command() {
    let overrides = ConfigOverrides {
        draft_model: Some("command".to_string()),
        ..ConfigOverrides::default()
    };
    let err = GraphConfig::default().with_overrides(overrides).unwrap_err();
    assert!(err.to_string().contains("lm_command"), "{err}");
}

#[test]
fn zero_step_limit_is_rejected() {
    let config = GraphConfig {
        max_steps: 0,
        ..GraphConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn explicit_overrides_win_over_environment() {
    let env: HashMap<&str, &str> = HashMap::from([
        (ENV_CRITIQUE_MODEL, "anthropic"),
        (ENV_LM_COMMAND, "env-lm"),
    ]);
    let from_env = ConfigOverrides::from_lookup(|key| env.get(key).map(|v| v.to_string()));
    let explicit = ConfigOverrides {
        critique_model: Some("command".to_string()),
        ..ConfigOverrides::default()
    };
    let config = GraphConfig::default()
        .with_overrides(explicit.or(from_env))
        .expect("valid overrides");
    assert_eq!(config.critique_model, Backend::Command);
    assert_eq!(config.lm_command.as_deref(), Some("env-lm"));
}

#[test]
fn blank_environment_values_are_ignored() {
    let overrides = ConfigOverrides::from_lookup(|_| Some("  ".to_string()));
    assert!(overrides.draft_model.is_none());
    assert!(overrides.lm_command.is_none());
}
