//! Artifact parsing helpers and structural validation.
//!
//! Validation is deliberately shallow: it checks that a candidate has the
//! shape of its artifact kind, not that it builds or deploys.

use serde::Deserialize;

use crate::types::ArtifactKind;
use crate::{DraupnirError, Result};

/// One Dockerfile instruction with continuation lines joined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Upper-cased keyword (`FROM`, `RUN`, ...).
    pub keyword: String,
    pub args: String,
}

/// Split a Dockerfile into instructions, skipping comments and blank lines.
pub fn parse_instructions(content: &str) -> Vec<Instruction> {
    let mut out = Vec::new();
    let mut pending = String::new();

    for raw in content.lines() {
        let line = raw.trim();
        if pending.is_empty() && (line.is_empty() || line.starts_with('#')) {
            continue;
        }
        if let Some(stripped) = line.strip_suffix('\\') {
            pending.push_str(stripped.trim_end());
            pending.push(' ');
            continue;
        }
        pending.push_str(line);
        push_instruction(&mut out, &pending);
        pending.clear();
    }
    if !pending.trim().is_empty() {
        push_instruction(&mut out, &pending);
    }
    out
}

fn push_instruction(out: &mut Vec<Instruction>, line: &str) {
    let line = line.trim();
    let (keyword, args) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    out.push(Instruction {
        keyword: keyword.to_ascii_uppercase(),
        args: args.trim().to_string(),
    });
}

/// Image reference of a `FROM` instruction, without flags or stage alias.
pub fn from_image(args: &str) -> &str {
    args.split_whitespace()
        .find(|part| !part.starts_with("--"))
        .unwrap_or("")
}

/// Names given to build stages with `FROM <image> AS <name>`.
pub fn stage_names(instructions: &[Instruction]) -> Vec<&str> {
    instructions
        .iter()
        .filter(|i| i.keyword == "FROM")
        .filter_map(|i| {
            let mut parts = i.args.split_whitespace();
            parts.find(|p| p.eq_ignore_ascii_case("as"))?;
            parts.next()
        })
        .collect()
}

/// Whether every `FROM` that is not an earlier stage uses a pinned image.
pub fn external_bases_pinned(instructions: &[Instruction]) -> bool {
    let stages = stage_names(instructions);
    instructions
        .iter()
        .filter(|i| i.keyword == "FROM")
        .map(|i| from_image(&i.args))
        .filter(|image| !stages.contains(image))
        .all(is_pinned_image)
}

/// Whether an image reference names an explicit tag or digest other than `latest`.
pub fn is_pinned_image(image: &str) -> bool {
    if image.contains('@') {
        return true;
    }
    let name = image.rsplit('/').next().unwrap_or(image);
    match name.split_once(':') {
        Some((_, tag)) => !tag.is_empty() && tag != "latest",
        None => false,
    }
}

/// Effective final `USER`, if any.
pub fn final_user(instructions: &[Instruction]) -> Option<&str> {
    instructions
        .iter()
        .rev()
        .find(|i| i.keyword == "USER")
        .map(|i| i.args.as_str())
}

/// Whether a `USER` argument names a non-root user.
pub fn is_non_root_user(user: &str) -> bool {
    let name = user.split(':').next().unwrap_or("").trim();
    !(name.is_empty() || name == "root" || name == "0")
}

/// Check that `content` is structurally a `kind` artifact.
pub fn validate_artifact(kind: ArtifactKind, content: &str) -> Result<()> {
    match kind {
        ArtifactKind::Dockerfile => validate_dockerfile(content),
        ArtifactKind::KubernetesManifest => validate_manifest(content),
    }
}

/// A Dockerfile must start with `FROM` (only `ARG` may precede it) and
/// show at least one security practice: a non-root `USER` or a base image
/// pinned to a tag other than `latest`.
pub fn validate_dockerfile(content: &str) -> Result<()> {
    let instructions = parse_instructions(content);
    let first = instructions
        .iter()
        .find(|i| i.keyword != "ARG")
        .ok_or_else(|| DraupnirError::CandidateValidation("Dockerfile is empty".into()))?;
    if first.keyword != "FROM" {
        return Err(DraupnirError::CandidateValidation(format!(
            "Dockerfile must start with FROM, found {}",
            first.keyword
        )));
    }

    let non_root = final_user(&instructions).is_some_and(is_non_root_user);
    let pinned = external_bases_pinned(&instructions);
    if !(non_root || pinned) {
        return Err(DraupnirError::CandidateValidation(
            "Dockerfile has no security practice: add a non-root USER or pin the base image"
                .into(),
        ));
    }
    Ok(())
}

/// Every YAML document must carry `apiVersion`, `kind` and `metadata.name`.
pub fn validate_manifest(content: &str) -> Result<()> {
    let mut documents = 0;
    for doc in serde_yaml::Deserializer::from_str(content) {
        let value = serde_yaml::Value::deserialize(doc)
            .map_err(|e| DraupnirError::CandidateValidation(format!("invalid YAML: {e}")))?;
        if value.is_null() {
            continue;
        }
        documents += 1;
        for field in ["apiVersion", "kind"] {
            if value.get(field).and_then(|v| v.as_str()).is_none() {
                return Err(DraupnirError::CandidateValidation(format!(
                    "manifest document {documents} is missing {field}"
                )));
            }
        }
        if value
            .get("metadata")
            .and_then(|m| m.get("name"))
            .and_then(|v| v.as_str())
            .is_none()
        {
            return Err(DraupnirError::CandidateValidation(format!(
                "manifest document {documents} is missing metadata.name"
            )));
        }
    }
    if documents == 0 {
        return Err(DraupnirError::CandidateValidation(
            "manifest is empty".into(),
        ));
    }
    Ok(())
}
