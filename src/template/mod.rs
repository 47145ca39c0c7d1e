//! Prompt templates: rendering, storage, built-ins.

pub mod builtin;
pub mod render;
pub mod source;
pub mod store;

pub use builtin::{builtin_template, builtin_templates};
pub use render::{RenderOptions, TemplateRenderer};
pub use source::DirectoryTemplateSource;
pub use store::TemplateStore;
