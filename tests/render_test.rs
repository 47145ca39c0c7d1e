//! Tests for [`TemplateRenderer`] through the public API.

use std::collections::BTreeMap;

use chrono::{TimeZone, Utc};
use draupnir::template::builtin_template;
use draupnir::{DraupnirError, RenderOptions, Template, TemplateRenderer, VariableDecl};
use serde_json::{Value, json};

fn vars(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn service_template() -> Template {
    Template::new(
        "service",
        "1.0.0",
        "Service {{name}} on ${port}\n\
         {{#if tls}}TLS enabled{{/if}}{{#unless tls}}plain HTTP{{/unless}}\n\
         {{#each routes}}{{index}}:{{path}}->{{target}}{{#unless last}}, {{/unless}}{{/each}}",
    )
    .system("You configure {{name}}.")
    .variable(VariableDecl::required("name"))
    .variable(VariableDecl::optional("port").with_default("8080"))
    .variable(VariableDecl::optional("tls"))
    .variable(VariableDecl::optional("routes"))
}

#[test]
fn renders_system_and_user_text() {
    let renderer = TemplateRenderer::new(RenderOptions::default());
    let prompt = renderer
        .render(
            &service_template(),
            &vars(&[
                ("name", json!("api")),
                ("tls", json!(true)),
                (
                    "routes",
                    json!([{"path": "/", "target": "web"}, {"path": "/v1", "target": "api"}]),
                ),
            ]),
        )
        .unwrap();

    assert_eq!(prompt.system, "You configure api.");
    assert_eq!(
        prompt.user,
        "Service api on 8080\nTLS enabled\n0:/->web, 1:/v1->api"
    );
    assert_eq!(prompt.metadata.template_id, "service");
    assert_eq!(prompt.metadata.template_version, "1.0.0");
    assert!(prompt.metadata.missing.is_empty());
}

#[test]
fn explicit_value_beats_default_and_null_falls_back() {
    let renderer = TemplateRenderer::new(RenderOptions::default());
    let t = service_template();

    let explicit = renderer
        .render(&t, &vars(&[("name", json!("a")), ("port", json!(9000))]))
        .unwrap();
    assert!(explicit.user.starts_with("Service a on 9000"));

    let null = renderer
        .render(&t, &vars(&[("name", json!("a")), ("port", Value::Null)]))
        .unwrap();
    assert!(null.user.starts_with("Service a on 8080"));
}

#[test]
fn json_string_arrays_are_iterated() {
    let renderer = TemplateRenderer::new(RenderOptions::default());
    let prompt = renderer
        .render(
            &service_template(),
            &vars(&[
                ("name", json!("a")),
                ("routes", json!(r#"[{"path":"/x","target":"y"}]"#)),
            ]),
        )
        .unwrap();
    assert!(prompt.user.ends_with("0:/x->y"));
}

#[test]
fn falsy_strings_disable_if_blocks() {
    let renderer = TemplateRenderer::new(RenderOptions::default());
    for falsy in [json!("false"), json!("0"), json!(""), json!(0), json!(false)] {
        let prompt = renderer
            .render(
                &service_template(),
                &vars(&[("name", json!("a")), ("tls", falsy.clone())]),
            )
            .unwrap();
        assert!(prompt.user.contains("plain HTTP"), "{falsy} should be falsy");
    }
}

#[test]
fn strict_mode_lists_every_missing_variable() {
    let t = Template::new("two", "1", "{{a}} {{b}}")
        .variable(VariableDecl::required("a"))
        .variable(VariableDecl::required("b"));
    let err = TemplateRenderer::new(RenderOptions::default())
        .render(&t, &BTreeMap::new())
        .unwrap_err();
    match err {
        DraupnirError::MissingRequiredVariables {
            template_id,
            missing,
        } => {
            assert_eq!(template_id, "two");
            assert_eq!(missing, ["a", "b"]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn lenient_mode_leaves_placeholders() {
    let t = Template::new("two", "1", "{{a}} and ${b}")
        .variable(VariableDecl::required("a"))
        .variable(VariableDecl::required("b"));
    let prompt = TemplateRenderer::new(RenderOptions::new().strict(false))
        .render(&t, &vars(&[("a", json!("x"))]))
        .unwrap();
    assert_eq!(prompt.user, "x and ${b}");
    assert_eq!(prompt.metadata.missing, ["b"]);
}

#[test]
fn system_variables_shadow_caller_values() {
    let t = Template::new("clock", "1", "{{_date}} {{_time}} {{_year}}/{{_month}}/{{_day}}");
    let now = Utc.with_ymd_and_hms(2026, 3, 7, 9, 5, 1).unwrap();
    let prompt = TemplateRenderer::new(RenderOptions::default())
        .render_at(&t, &vars(&[("_year", json!(1999))]), now)
        .unwrap();
    assert_eq!(prompt.user, "2026-03-07 09:05:01 2026/3/7");
    assert_eq!(prompt.metadata.rendered_at, now);
}

#[test]
fn examples_are_appended() {
    let t = Template::new("ex", "1", "Do it.")
        .example("in-1", "out-1")
        .example("in-2", "out-2");
    let prompt = TemplateRenderer::new(RenderOptions::default())
        .render(&t, &BTreeMap::new())
        .unwrap();
    assert_eq!(
        prompt.user,
        "Do it.\n\nExamples:\n\nExample 1:\nInput:\nin-1\nOutput:\nout-1\n\nExample 2:\nInput:\nin-2\nOutput:\nout-2"
    );
    assert_eq!(prompt.metadata.example_count, 2);

    let without = TemplateRenderer::new(RenderOptions::new().include_examples(false))
        .render(&t, &BTreeMap::new())
        .unwrap();
    assert_eq!(without.user, "Do it.");
}

#[test]
fn builtin_dockerfile_template_renders() {
    let t = builtin_template("dockerfile-generation").unwrap();
    let prompt = TemplateRenderer::new(RenderOptions::default())
        .render(
            &t,
            &vars(&[
                ("app_name", json!("api")),
                ("language", json!("go")),
                ("port", json!(8080)),
                ("dependencies", json!(["gin", "pgx"])),
            ]),
        )
        .unwrap();
    assert!(prompt.user.contains("'api'"));
    assert!(prompt.user.contains("port 8080"));
    assert!(prompt.user.contains("- gin\n- pgx\n"));
    assert!(prompt.user.contains("multi-stage"));
    assert!(!prompt.system.is_empty());
}
