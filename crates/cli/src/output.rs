//! Output formatting for CLI

use boardcheck_e2e::{CardResult, DispatchPath, SuiteResult};
use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use serde::Serialize;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<Cell>;
}

impl TableDisplay for CardResult {
    fn headers() -> Vec<&'static str> {
        vec!["Card", "Category", "Checked by", "Result", "Duration"]
    }

    fn row(&self) -> Vec<Cell> {
        let status = if self.success {
            Cell::new("PASS").fg(Color::Green)
        } else {
            Cell::new("FAIL").fg(Color::Red)
        };
        vec![
            Cell::new(&self.title),
            Cell::new(self.category),
            Cell::new(path_label(self.path.as_ref())),
            status,
            Cell::new(format!("{} ms", self.duration_ms)),
        ]
    }
}

fn path_label(path: Option<&DispatchPath>) -> String {
    match path {
        Some(DispatchPath::Scenario) => "scenario".to_string(),
        Some(DispatchPath::TagChecks { checked }) => format!("{} tag check(s)", checked),
        None => "-".to_string(),
    }
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    if items.is_empty() {
        println!("No cards selected.");
        return;
    }

    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);

            table.set_header(T::headers());
            for item in items {
                table.add_row(item.row());
            }

            println!("{table}");
        }
        OutputFormat::Json => print_serialized(items, format),
        OutputFormat::Yaml => print_serialized(items, format),
    }
}

fn print_serialized<T: Serialize + ?Sized>(value: &T, format: OutputFormat) {
    let rendered = match format {
        OutputFormat::Yaml => serde_yaml::to_string(value).map_err(|e| e.to_string()),
        _ => serde_json::to_string_pretty(value).map_err(|e| e.to_string()),
    };
    match rendered {
        Ok(text) => println!("{}", text),
        Err(e) => print_error(&format!("Cannot render results: {}", e)),
    }
}

/// One-line summary of a run
pub fn summary_line(suite: &SuiteResult) -> String {
    format!(
        "{} passed, {} failed, {} skipped in {:.1}s ({:?} tag checks)",
        suite.passed,
        suite.failed,
        suite.skipped,
        suite.duration_ms as f64 / 1000.0,
        suite.strictness
    )
}

/// Print a suite: the per-card table, then failure details and a summary
pub fn print_suite(suite: &SuiteResult, format: OutputFormat) {
    if format != OutputFormat::Table {
        print_serialized(suite, format);
        return;
    }

    print_list(&suite.results, format);

    for failure in suite.failures() {
        println!();
        println!("{} {}", "✗".red(), failure.title.bold());
        if let Some(error) = &failure.error {
            for line in error.lines() {
                println!("    {}", line);
            }
        }
    }

    println!();
    if suite.success() {
        print_success(&summary_line(suite));
    } else {
        print_error(&summary_line(suite));
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green(), message.green());
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message.red());
}

/// Print warning message
pub fn print_warning(message: &str) {
    println!("{}", message.yellow());
}

/// Print info message
pub fn print_info(message: &str) {
    println!("{}", message.cyan());
}

#[cfg(test)]
mod tests {
    use super::*;
    use boardcheck_e2e::{Category, Strictness};

    fn card(title: &str, success: bool, path: Option<DispatchPath>) -> CardResult {
        CardResult {
            title: title.to_string(),
            category: Category::Marketing,
            path,
            success,
            duration_ms: 12,
            error: (!success).then(|| "Assertion failed: boom".to_string()),
            soft_failures: Vec::new(),
        }
    }

    #[test]
    fn test_path_labels() {
        assert_eq!(path_label(Some(&DispatchPath::Scenario)), "scenario");
        assert_eq!(path_label(Some(&DispatchPath::TagChecks { checked: 3 })), "3 tag check(s)");
        assert_eq!(path_label(None), "-");
    }

    #[test]
    fn test_summary_line() {
        let suite = SuiteResult {
            started_at: chrono::Utc::now(),
            strictness: Strictness::Soft,
            total: 3,
            passed: 1,
            failed: 1,
            skipped: 1,
            duration_ms: 1500,
            results: vec![
                card("Email campaign", true, Some(DispatchPath::Scenario)),
                card("Brand refresh", false, None),
            ],
        };
        assert_eq!(summary_line(&suite), "1 passed, 1 failed, 1 skipped in 1.5s (Soft tag checks)");
    }

    #[test]
    fn test_card_row_has_one_cell_per_header() {
        let row = card("Q2 newsletter", true, Some(DispatchPath::TagChecks { checked: 3 })).row();
        assert_eq!(row.len(), CardResult::headers().len());
    }
}
