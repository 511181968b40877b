pub mod debt;
pub mod document;
pub mod project;

pub use debt::{DebtMetadata, DebtStatus, FileDebt, Severity};
pub use document::Document;
pub use project::{detect_workspace_language, NewProject, Project};
