pub mod client;
pub mod source;
pub mod wire;

pub use client::ChecklistApiClient;
pub use source::{DirectoryTemplateSource, TemplateSource};
