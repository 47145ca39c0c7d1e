//! Deterministic Dockerfile strategies.
//!
//! Each strategy is a pure function of the [`ArtifactContext`]: the same
//! context always yields byte-identical output.

use async_trait::async_trait;

use super::{Strategy, StrategyProfile};
use crate::Result;
use crate::cancel::CancellationToken;
use crate::types::ArtifactContext;

/// Build/runtime facts for one language.
struct Toolchain {
    build_image: String,
    alpine_image: String,
    runtime_image: String,
    dep_files: &'static str,
    install: &'static str,
    build: Option<String>,
    /// Path of the built artifact, for compiled languages.
    artifact: Option<String>,
    cache_dir: &'static str,
    env: &'static [(&'static str, &'static str)],
    default_cmd: String,
    default_port: u16,
}

impl Toolchain {
    fn for_context(ctx: &ArtifactContext) -> Self {
        let version = ctx.language_version.as_deref();
        let app = ctx.app_name.as_str();
        match ctx.language.to_ascii_lowercase().as_str() {
            "python" => {
                let v = version.unwrap_or("3.12");
                Self {
                    build_image: format!("python:{v}-slim"),
                    alpine_image: format!("python:{v}-alpine"),
                    runtime_image: format!("python:{v}-slim"),
                    dep_files: "requirements.txt",
                    install: "pip install --no-cache-dir -r requirements.txt",
                    build: None,
                    artifact: None,
                    cache_dir: "/root/.cache/pip",
                    env: &[("PYTHONDONTWRITEBYTECODE", "1"), ("PYTHONUNBUFFERED", "1")],
                    default_cmd: "python app.py".into(),
                    default_port: 8000,
                }
            }
            "node" | "nodejs" | "javascript" | "typescript" => {
                let v = version.unwrap_or("20");
                Self {
                    build_image: format!("node:{v}-slim"),
                    alpine_image: format!("node:{v}-alpine"),
                    runtime_image: format!("node:{v}-slim"),
                    dep_files: "package*.json",
                    install: "npm ci --omit=dev",
                    build: Some("npm run build --if-present".into()),
                    artifact: None,
                    cache_dir: "/root/.npm",
                    env: &[("NODE_ENV", "production")],
                    default_cmd: "node index.js".into(),
                    default_port: 3000,
                }
            }
            "go" | "golang" => {
                let v = version.unwrap_or("1.22");
                Self {
                    build_image: format!("golang:{v}"),
                    alpine_image: format!("golang:{v}-alpine"),
                    runtime_image: "gcr.io/distroless/static-debian12:nonroot".into(),
                    dep_files: "go.mod go.sum",
                    install: "go mod download",
                    build: Some("CGO_ENABLED=0 go build -trimpath -ldflags=\"-s -w\" -o /out/app .".into()),
                    artifact: Some("/out/app".into()),
                    cache_dir: "/root/.cache/go-build",
                    env: &[],
                    default_cmd: "/app/app".into(),
                    default_port: 8080,
                }
            }
            "java" => {
                let v = version.unwrap_or("21");
                Self {
                    build_image: format!("maven:3.9-eclipse-temurin-{v}"),
                    alpine_image: format!("maven:3.9-eclipse-temurin-{v}-alpine"),
                    runtime_image: format!("eclipse-temurin:{v}-jre"),
                    dep_files: "pom.xml",
                    install: "mvn -q dependency:go-offline",
                    build: Some("mvn -q -DskipTests package && cp target/*.jar /out/app.jar".into()),
                    artifact: Some("/out/app.jar".into()),
                    cache_dir: "/root/.m2",
                    env: &[],
                    default_cmd: "java -jar /app/app.jar".into(),
                    default_port: 8080,
                }
            }
            "rust" => {
                let v = version.unwrap_or("1.80");
                Self {
                    build_image: format!("rust:{v}-slim"),
                    alpine_image: format!("rust:{v}-alpine"),
                    runtime_image: "debian:bookworm-slim".into(),
                    dep_files: "Cargo.toml Cargo.lock",
                    install: "cargo fetch",
                    build: Some(format!("cargo build --release --locked && cp target/release/{app} /out/app")),
                    artifact: Some("/out/app".into()),
                    cache_dir: "/usr/local/cargo/registry",
                    env: &[],
                    default_cmd: "/app/app".into(),
                    default_port: 8080,
                }
            }
            _ => Self {
                build_image: "debian:bookworm-slim".into(),
                alpine_image: "alpine:3.20".into(),
                runtime_image: "debian:bookworm-slim".into(),
                dep_files: "",
                install: "",
                build: None,
                artifact: None,
                cache_dir: "/var/cache",
                env: &[],
                default_cmd: "./start.sh".into(),
                default_port: 8080,
            },
        }
    }

    fn compiled(&self) -> bool {
        self.artifact.is_some()
    }
}

/// Exec-form JSON array for `CMD`.
fn exec_form(command: &str) -> String {
    let parts: Vec<&str> = command.split_whitespace().collect();
    serde_json::to_string(&parts).unwrap_or_else(|_| format!("[\"{command}\"]"))
}

fn add_user(alpine: bool) -> &'static str {
    if alpine {
        "RUN addgroup -S app && adduser -S -G app app"
    } else {
        "RUN groupadd --system app && useradd --system --gid app --no-create-home app"
    }
}

struct Writer {
    lines: Vec<String>,
}

impl Writer {
    fn new(header: &str) -> Self {
        Self {
            lines: vec![format!("# {header}")],
        }
    }

    fn line(&mut self, line: impl Into<String>) -> &mut Self {
        self.lines.push(line.into());
        self
    }

    fn blank(&mut self) -> &mut Self {
        self.lines.push(String::new());
        self
    }

    fn env(&mut self, env: &[(&str, &str)]) -> &mut Self {
        if !env.is_empty() {
            let pairs: Vec<String> = env.iter().map(|(k, v)| format!("{k}={v}")).collect();
            self.lines.push(format!("ENV {}", pairs.join(" ")));
        }
        self
    }

    fn deps(&mut self, tc: &Toolchain, install: &str) -> &mut Self {
        if !tc.dep_files.is_empty() {
            self.lines.push(format!("COPY {} ./", tc.dep_files));
            self.lines.push(format!("RUN {install}"));
        }
        self
    }

    fn finish(&self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }
}

fn tail(w: &mut Writer, ctx: &ArtifactContext, tc: &Toolchain) {
    let port = ctx.port.unwrap_or(tc.default_port);
    let cmd = ctx.start_command.as_deref().unwrap_or(&tc.default_cmd);
    w.line(format!("EXPOSE {port}"));
    w.line(format!("CMD {}", exec_form(cmd)));
}

// ============================================================================
// security-first
// ============================================================================

/// Slim pinned base, dedicated non-root user, no build tooling in the
/// runtime image for compiled languages.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecurityFirstStrategy;

impl SecurityFirstStrategy {
    fn render(ctx: &ArtifactContext) -> String {
        let tc = Toolchain::for_context(ctx);
        let mut w = Writer::new(&format!("{}: security-first build", ctx.app_name));

        if tc.compiled() {
            w.line(format!("FROM {} AS build", tc.build_image))
                .line("WORKDIR /src")
                .deps(&tc, tc.install)
                .line("COPY . .");
            if let Some(build) = &tc.build {
                w.line(format!("RUN mkdir -p /out && {build}"));
            }
            w.blank()
                .line(format!("FROM {}", tc.runtime_image))
                .line("WORKDIR /app");
            if !tc.runtime_image.contains("distroless") {
                w.line(add_user(false));
            }
            let artifact = tc.artifact.as_deref().unwrap_or("/out/app");
            let file = artifact.rsplit('/').next().unwrap_or("app");
            w.line(format!("COPY --from=build --chown=app:app {artifact} /app/{file}"));
            if tc.runtime_image.contains("distroless") {
                w.line("USER nonroot:nonroot");
            } else {
                w.line("USER app");
            }
        } else {
            w.line(format!("FROM {}", tc.runtime_image))
                .env(tc.env)
                .line("WORKDIR /app")
                .line(add_user(false))
                .deps(&tc, tc.install)
                .line("COPY --chown=app:app . .");
            if let Some(build) = &tc.build {
                w.line(format!("RUN {build}"));
            }
            w.line("USER app");
        }
        tail(&mut w, ctx, &tc);
        w.finish()
    }
}

#[async_trait]
impl Strategy for SecurityFirstStrategy {
    fn name(&self) -> &str {
        "security-first"
    }

    fn profile(&self) -> StrategyProfile {
        StrategyProfile::new(0.9, 0.5, 0.9)
    }

    async fn generate(&self, ctx: &ArtifactContext, _cancel: &CancellationToken) -> Result<String> {
        Ok(Self::render(ctx))
    }
}

// ============================================================================
// performance-optimized
// ============================================================================

/// Multi-stage build with dependency layers first and BuildKit cache
/// mounts, so source edits do not invalidate dependency downloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerformanceOptimizedStrategy;

impl PerformanceOptimizedStrategy {
    fn render(ctx: &ArtifactContext) -> String {
        let tc = Toolchain::for_context(ctx);
        let mut w = Writer::new(&format!("{}: cache-friendly multi-stage build", ctx.app_name));
        w.line("# syntax=docker/dockerfile:1");
        let cached_install = format!("--mount=type=cache,target={} {}", tc.cache_dir, tc.install);

        w.line(format!("FROM {} AS deps", tc.build_image))
            .env(tc.env)
            .line("WORKDIR /src")
            .deps(&tc, &cached_install)
            .blank()
            .line("FROM deps AS build")
            .line("COPY . .");
        match &tc.build {
            Some(build) if tc.compiled() => {
                w.line(format!(
                    "RUN --mount=type=cache,target={} mkdir -p /out && {build}",
                    tc.cache_dir
                ));
            }
            Some(build) => {
                w.line(format!("RUN {build} && mkdir -p /out && cp -r /src/. /out/"));
            }
            None => {
                w.line("RUN mkdir -p /out && cp -r /src/. /out/");
            }
        }

        w.blank().line(format!("FROM {}", tc.runtime_image)).env(tc.env).line("WORKDIR /app");
        let distroless = tc.runtime_image.contains("distroless");
        if !distroless {
            w.line(add_user(false));
        }
        match &tc.artifact {
            Some(artifact) => {
                let file = artifact.rsplit('/').next().unwrap_or("app");
                w.line(format!("COPY --from=build {artifact} /app/{file}"));
            }
            None => {
                if tc.install.starts_with("pip") {
                    w.line("COPY --from=deps /usr/local /usr/local");
                }
                w.line("COPY --from=build --chown=app:app /out/ /app/");
            }
        }
        w.line(if distroless { "USER nonroot:nonroot" } else { "USER app" });
        tail(&mut w, ctx, &tc);
        w.finish()
    }
}

#[async_trait]
impl Strategy for PerformanceOptimizedStrategy {
    fn name(&self) -> &str {
        "performance-optimized"
    }

    fn profile(&self) -> StrategyProfile {
        StrategyProfile::new(0.8, 0.4, 0.85)
    }

    async fn generate(&self, ctx: &ArtifactContext, _cancel: &CancellationToken) -> Result<String> {
        Ok(Self::render(ctx))
    }
}

// ============================================================================
// size-optimized
// ============================================================================

/// Alpine (or distroless) images with a single consolidated install layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SizeOptimizedStrategy;

impl SizeOptimizedStrategy {
    fn render(ctx: &ArtifactContext) -> String {
        let tc = Toolchain::for_context(ctx);
        let mut w = Writer::new(&format!("{}: minimal image", ctx.app_name));

        if tc.compiled() {
            w.line(format!("FROM {} AS build", tc.alpine_image))
                .line("WORKDIR /src")
                .line("COPY . .");
            let build = tc.build.as_deref().unwrap_or("true");
            if tc.install.is_empty() {
                w.line(format!("RUN mkdir -p /out && {build}"));
            } else {
                w.line(format!("RUN {} && mkdir -p /out && {build}", tc.install));
            }
            let artifact = tc.artifact.as_deref().unwrap_or("/out/app");
            let file = artifact.rsplit('/').next().unwrap_or("app");
            if tc.runtime_image.contains("distroless") {
                w.blank()
                    .line(format!("FROM {}", tc.runtime_image))
                    .line(format!("COPY --from=build {artifact} /app/{file}"))
                    .line("USER nonroot:nonroot");
            } else {
                let runtime = if file.ends_with(".jar") {
                    tc.alpine_image.replace("maven:3.9-", "").replace("eclipse-temurin-", "eclipse-temurin:").replace("-alpine", "-jre-alpine")
                } else {
                    "alpine:3.20".to_string()
                };
                w.blank()
                    .line(format!("FROM {runtime}"))
                    .line(add_user(true))
                    .line(format!("COPY --from=build {artifact} /app/{file}"))
                    .line("USER app");
            }
        } else {
            w.line(format!("FROM {}", tc.alpine_image))
                .env(tc.env)
                .line("WORKDIR /app");
            if tc.dep_files.is_empty() {
                w.line(add_user(true));
            } else {
                w.line(format!("COPY {} ./", tc.dep_files)).line(format!(
                    "RUN {} && {}",
                    add_user(true).trim_start_matches("RUN "),
                    tc.install
                ));
            }
            w.line("COPY --chown=app:app . .").line("USER app");
        }
        tail(&mut w, ctx, &tc);
        w.finish()
    }
}

#[async_trait]
impl Strategy for SizeOptimizedStrategy {
    fn name(&self) -> &str {
        "size-optimized"
    }

    fn profile(&self) -> StrategyProfile {
        StrategyProfile::new(0.75, 0.3, 0.8)
    }

    async fn generate(&self, ctx: &ArtifactContext, _cancel: &CancellationToken) -> Result<String> {
        Ok(Self::render(ctx))
    }
}
