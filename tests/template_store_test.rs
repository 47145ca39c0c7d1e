//! Tests for [`TemplateStore`] and [`DirectoryTemplateSource`].

use std::sync::Arc;

use draupnir::template::builtin::DOCKERFILE_GENERATION;
use draupnir::{DirectoryTemplateSource, DraupnirError, Template, TemplateSource, TemplateStore};

const YAML_TEMPLATE: &str = r#"
id: greeting
version: "2.1.0"
description: Say hello
system: You are polite.
user: "Hello {{name}}"
variables:
  - name: name
    required: true
examples:
  - input: "name: Ada"
    output: "Hello Ada"
"#;

fn write(dir: &tempfile::TempDir, file: &str, content: &str) {
    std::fs::write(dir.path().join(file), content).unwrap();
}

// =========================================================================
// DirectoryTemplateSource
// =========================================================================

#[tokio::test]
async fn loads_yaml_template() {
    let dir = tempfile::tempdir().unwrap();
    write(&dir, "greeting.yaml", YAML_TEMPLATE);

    let source = DirectoryTemplateSource::new(dir.path());
    let template = source.load_template("greeting").await.unwrap().unwrap();
    assert_eq!(template.version, "2.1.0");
    assert_eq!(template.system, "You are polite.");
    assert!(template.declaration("name").unwrap().required);
    assert_eq!(template.examples.len(), 1);
}

#[tokio::test]
async fn loads_json_template() {
    let dir = tempfile::tempdir().unwrap();
    let template = Template::new("j", "1.0.0", "{{x}}");
    write(&dir, "j.json", &serde_json::to_string(&template).unwrap());

    let source = DirectoryTemplateSource::new(dir.path());
    assert_eq!(source.load_template("j").await.unwrap(), Some(template));
}

#[tokio::test]
async fn unknown_id_is_none() {
    let dir = tempfile::tempdir().unwrap();
    let source = DirectoryTemplateSource::new(dir.path());
    assert!(source.load_template("absent").await.unwrap().is_none());
}

#[tokio::test]
async fn mismatched_id_is_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    write(&dir, "other.yaml", YAML_TEMPLATE);

    let source = DirectoryTemplateSource::new(dir.path());
    assert!(matches!(
        source.load_template("other").await,
        Err(DraupnirError::Configuration(_))
    ));
}

#[tokio::test]
async fn malformed_file_is_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    write(&dir, "bad.json", "{ not json");

    let source = DirectoryTemplateSource::new(dir.path());
    assert!(matches!(
        source.load_template("bad").await,
        Err(DraupnirError::Json(_))
    ));
}

#[tokio::test]
async fn path_traversal_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let source = DirectoryTemplateSource::new(dir.path());
    for id in ["../etc/passwd", "a/b", "", ".."] {
        assert!(
            matches!(
                source.load_template(id).await,
                Err(DraupnirError::InvalidInput(_))
            ),
            "{id:?} should be rejected"
        );
    }
}

// =========================================================================
// TemplateStore
// =========================================================================

#[tokio::test]
async fn builtins_resolve_without_source() {
    let store = TemplateStore::new();
    let template = store.get(DOCKERFILE_GENERATION).await.unwrap();
    assert_eq!(template.id, DOCKERFILE_GENERATION);
    assert_eq!(store.list_loaded(), vec![DOCKERFILE_GENERATION.to_string()]);
}

#[tokio::test]
async fn unknown_template_is_not_found() {
    let store = TemplateStore::new();
    match store.get("missing").await {
        Err(DraupnirError::TemplateNotFound(id)) => assert_eq!(id, "missing"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn source_shadows_builtins() {
    let dir = tempfile::tempdir().unwrap();
    let custom = Template::new(DOCKERFILE_GENERATION, "9.0.0", "custom {{app_name}}");
    write(
        &dir,
        "dockerfile-generation.yaml",
        &serde_yaml::to_string(&custom).unwrap(),
    );

    let store = TemplateStore::with_source(Arc::new(DirectoryTemplateSource::new(dir.path())));
    let template = store.get(DOCKERFILE_GENERATION).await.unwrap();
    assert_eq!(template.version, "9.0.0");
}

#[tokio::test]
async fn builtins_can_be_disabled() {
    let store = TemplateStore::new().builtins(false);
    assert!(matches!(
        store.get(DOCKERFILE_GENERATION).await,
        Err(DraupnirError::TemplateNotFound(_))
    ));
}

#[tokio::test]
async fn loaded_templates_are_cached_until_cleared() {
    let dir = tempfile::tempdir().unwrap();
    write(&dir, "greeting.yaml", YAML_TEMPLATE);
    let store = TemplateStore::with_source(Arc::new(DirectoryTemplateSource::new(dir.path())))
        .builtins(false);

    assert_eq!(store.get("greeting").await.unwrap().version, "2.1.0");

    // Edits on disk are not seen until the store is cleared.
    write(&dir, "greeting.yaml", &YAML_TEMPLATE.replace("2.1.0", "2.2.0"));
    assert_eq!(store.get("greeting").await.unwrap().version, "2.1.0");

    store.clear().await;
    assert!(store.is_empty());
    assert_eq!(store.get("greeting").await.unwrap().version, "2.2.0");
}

#[tokio::test]
async fn inserted_template_wins() {
    let store = TemplateStore::new();
    store
        .insert(Template::new(DOCKERFILE_GENERATION, "0.0.1", "override"))
        .await;
    assert_eq!(store.get(DOCKERFILE_GENERATION).await.unwrap().user, "override");
    assert_eq!(store.len(), 1);
}
