use tabled::builder::Builder;
use tabled::settings::Style;

use crate::search::RankedMatch;
use crate::value::TabularResult;

/// Render a tabular result as a terminal table
pub fn result_table(result: &TabularResult) -> String {
    if result.columns.is_empty() {
        return String::new();
    }

    let mut builder = Builder::default();
    builder.push_record(result.columns.iter().cloned());
    for row in &result.rows {
        builder.push_record(row.iter().map(|v| v.to_string()));
    }

    builder.build().with(Style::rounded()).to_string()
}

/// Render ranked search matches as a terminal table
pub fn matches_table(matches: &[RankedMatch]) -> String {
    if matches.is_empty() {
        return String::new();
    }

    let mut builder = Builder::default();
    builder.push_record(["id", "score"]);
    for m in matches {
        builder.push_record([m.id.to_string(), format!("{:.4}", m.score)]);
    }

    builder.build().with(Style::rounded()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_result_table_contains_cells() {
        let mut result = TabularResult::new(vec!["id".into(), "name".into()]);
        result.push_row(vec![Value::Integer(1), Value::Text("alpha".into())]);

        let rendered = result_table(&result);
        assert!(rendered.contains("alpha"));
        assert!(rendered.contains("id"));
    }

    #[test]
    fn test_empty_result_renders_nothing() {
        assert!(result_table(&TabularResult::empty()).is_empty());
        assert!(matches_table(&[]).is_empty());
    }
}
