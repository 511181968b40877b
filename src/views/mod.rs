pub mod decorator;
pub mod lens;
pub mod tree;

pub use decorator::{InlineDebtDecorator, LineDecoration, SeverityDecorations};
pub use lens::{CodeLens, DebtCodeLensProvider, LensCommand};
pub use tree::{FileSummary, RevealTarget, TechnicalDebtProvider, TreeNode, ViewMode};
