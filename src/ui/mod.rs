pub mod output;
pub mod table;
pub mod theme;

pub use output::{dim, error, info, success, warn};
pub use table::{matches_table, result_table};
pub use theme::{theme, Theme};
