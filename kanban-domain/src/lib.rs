pub mod analytics;
pub mod board;
pub mod issue;
pub mod rules;

pub use board::{default_columns, ColumnConfig};
pub use issue::Issue;
pub use rules::{default_color_rules, evaluate, ColorRule, Condition, RuleConfig};
