//! Built-in prompt templates.
//!
//! Used when neither the in-memory store nor the configured
//! [`TemplateSource`](crate::TemplateSource) knows a template id.

use crate::types::{Template, VariableDecl};

pub const DOCKERFILE_GENERATION: &str = "dockerfile-generation";
pub const DOCKERFILE_FIX: &str = "dockerfile-fix";
pub const K8S_MANIFEST_GENERATION: &str = "k8s-manifest-generation";
pub const K8S_MANIFEST_FIX: &str = "k8s-manifest-fix";
pub const REPOSITORY_ANALYSIS: &str = "repository-analysis";

const CONTAINER_EXPERT: &str = "You are an expert in containerization. Produce production-ready, \
secure artifacts. Respond with the artifact only, without commentary or markdown fences.";

/// All built-in templates.
pub fn builtin_templates() -> Vec<Template> {
    vec![
        dockerfile_generation(),
        dockerfile_fix(),
        k8s_manifest_generation(),
        k8s_manifest_fix(),
        repository_analysis(),
    ]
}

/// Look up a built-in template by id.
pub fn builtin_template(id: &str) -> Option<Template> {
    builtin_templates().into_iter().find(|t| t.id == id)
}

fn dockerfile_generation() -> Template {
    Template::new(
        DOCKERFILE_GENERATION,
        "1.0.0",
        "Write a Dockerfile for the application '{{app_name}}'.\n\
         Language: {{language}}{{#if language_version}} {{language_version}}{{/if}}\n\
         {{#if framework}}Framework: {{framework}}\n{{/if}}\
         {{#if port}}The application listens on port {{port}}.\n{{/if}}\
         {{#if start_command}}Start command: {{start_command}}\n{{/if}}\
         {{#if dependencies}}Dependencies:\n{{#each dependencies}}- {{item}}\n{{/each}}{{/if}}\
         Requirements:\n\
         - Pin the base image to a specific version tag.\n\
         - Run as a non-root user.\n\
         {{#if multi_stage}}- Use a multi-stage build.\n{{/if}}",
    )
    .description("Generate a Dockerfile from repository analysis")
    .system(CONTAINER_EXPERT)
    .variable(VariableDecl::required("app_name"))
    .variable(VariableDecl::required("language"))
    .variable(VariableDecl::optional("language_version"))
    .variable(VariableDecl::optional("framework"))
    .variable(VariableDecl::optional("port"))
    .variable(VariableDecl::optional("start_command"))
    .variable(VariableDecl::optional("dependencies"))
    .variable(VariableDecl::optional("multi_stage").with_default("true"))
    .example(
        "app_name: hello, language: python 3.12, port: 8000",
        "FROM python:3.12-slim\nWORKDIR /app\nCOPY requirements.txt .\n\
         RUN pip install --no-cache-dir -r requirements.txt\nCOPY . .\n\
         RUN useradd -m app\nUSER app\nEXPOSE 8000\nCMD [\"python\", \"app.py\"]",
    )
}

fn dockerfile_fix() -> Template {
    Template::new(
        DOCKERFILE_FIX,
        "1.0.0",
        "The following Dockerfile failed to build.\n\n\
         Dockerfile:\n{{dockerfile}}\n\n\
         Build error:\n{{error}}\n\n\
         {{#if build_log}}Build log excerpt:\n{{build_log}}\n\n{{/if}}\
         Return a corrected Dockerfile that keeps the original intent.",
    )
    .description("Fix a Dockerfile given a build error")
    .system(CONTAINER_EXPERT)
    .variable(VariableDecl::required("dockerfile"))
    .variable(VariableDecl::required("error"))
    .variable(VariableDecl::optional("build_log"))
}

fn k8s_manifest_generation() -> Template {
    Template::new(
        K8S_MANIFEST_GENERATION,
        "1.0.0",
        "Write Kubernetes manifests for '{{app_name}}' using image {{image}}.\n\
         Namespace: {{namespace}}\n\
         Replicas: {{replicas}}\n\
         {{#if port}}Container port: {{port}}\n\
         {{#if expose}}Expose it with a Service of type {{service_type}}.\n{{/if}}{{/if}}\
         {{#if env}}Environment:\n{{#each env}}- {{name}}={{value}}\n{{/each}}{{/if}}\
         Include resource requests and limits, liveness and readiness probes, \
         and a restricted securityContext.",
    )
    .description("Generate Kubernetes Deployment and Service manifests")
    .system(CONTAINER_EXPERT)
    .variable(VariableDecl::required("app_name"))
    .variable(VariableDecl::required("image"))
    .variable(VariableDecl::optional("namespace").with_default("default"))
    .variable(VariableDecl::optional("replicas").with_default("2"))
    .variable(VariableDecl::optional("port"))
    .variable(VariableDecl::optional("expose").with_default("true"))
    .variable(VariableDecl::optional("service_type").with_default("ClusterIP"))
    .variable(VariableDecl::optional("env"))
}

fn k8s_manifest_fix() -> Template {
    Template::new(
        K8S_MANIFEST_FIX,
        "1.0.0",
        "The following Kubernetes manifest failed to deploy.\n\n\
         Manifest:\n{{manifest}}\n\n\
         Error:\n{{error}}\n\n\
         Return the corrected manifest as YAML.",
    )
    .description("Fix a Kubernetes manifest given a deployment error")
    .system(CONTAINER_EXPERT)
    .variable(VariableDecl::required("manifest"))
    .variable(VariableDecl::required("error"))
}

fn repository_analysis() -> Template {
    Template::new(
        REPOSITORY_ANALYSIS,
        "1.0.0",
        "Analyze the repository summary below and report the language, framework, \
         entry point, listening port and build system as a JSON object with keys \
         \"language\", \"framework\", \"entrypoint\", \"port\" and \"build_system\".\n\n\
         {{summary}}",
    )
    .description("Extract containerization facts from a repository summary")
    .system("You analyze source repositories. Respond with JSON only.")
    .variable(VariableDecl::required("summary"))
}
