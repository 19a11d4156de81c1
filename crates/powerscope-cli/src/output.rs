//! Output formatting for the CLI.

use crate::config::OutputFormat;
use crate::error::Result;
use colored::*;
use powerscope_domain::{Axis, ModelAttribs, ModelKind, RangeSnapshot};
use powerscope_project::{HistoryEntry, Project};
use serde::Serialize;
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};

/// Serializable view of a project.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectReport {
    /// Model kind
    pub kind: ModelKind,
    /// Model snapshots in display order
    pub models: Vec<ModelAttribs>,
    /// Axis ranges
    pub ranges: RangeSnapshot,
    /// Whether ranges are user-fixed
    pub custom_ranges: bool,
    /// Audit log
    pub history: Vec<HistoryEntry>,
}

impl ProjectReport {
    /// Capture a project.
    pub fn new(project: &Project) -> Self {
        Self {
            kind: project.kind(),
            models: project.models().iter().map(|m| m.attribs()).collect(),
            ranges: project.ranges(),
            custom_ranges: project.custom_ranges(),
            history: project.change_history().to_vec(),
        }
    }
}

/// Output formatter.
pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self {
            format,
            color_enabled,
        }
    }

    /// Format a whole project: models, ranges and history.
    pub fn format_project(&self, project: &Project) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&ProjectReport::new(project))?),
            OutputFormat::Table => {
                let mut sections = vec![self.format_models_table(project)];
                sections.push(self.format_ranges_table(&project.ranges()));
                if !project.change_history().is_empty() {
                    sections.push(self.format_history(project));
                }
                Ok(sections.join("\n\n"))
            }
        }
    }

    /// Format axis ranges.
    pub fn format_ranges(&self, ranges: &RangeSnapshot) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(ranges)?),
            OutputFormat::Table => Ok(self.format_ranges_table(ranges)),
        }
    }

    fn format_models_table(&self, project: &Project) -> String {
        if project.is_empty() {
            return self.colorize("No models.", "yellow");
        }

        let mut builder = Builder::default();
        builder.push_record(["#", "Name", "Output", "Values", "Extras"]);
        for (index, model) in project.models().iter().enumerate() {
            let values: Vec<String> = model
                .values()
                .iter()
                .map(|(key, value)| format!("{}={}", key, value))
                .collect();
            let extras: Vec<String> = model
                .extras()
                .iter()
                .map(|extra| format!("{}={}", extra.which(), extra.value()))
                .collect();
            let marker = if index == project.selected_index() { "*" } else { "" };
            builder.push_record([
                format!("{}{}", index, marker),
                model.name().to_string(),
                model.output().to_string(),
                values.join(", "),
                extras.join(", "),
            ]);
        }

        let mut table = builder.build();
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()));
        table.to_string()
    }

    fn format_ranges_table(&self, ranges: &RangeSnapshot) -> String {
        let mut builder = Builder::default();
        builder.push_record(["Axis", "Min", "Max", "Label"]);
        for axis in Axis::ALL {
            let Some(range) = ranges.get(axis) else {
                builder.push_record([axis.as_str(), "-", "-", ""]);
                continue;
            };
            builder.push_record([
                axis.as_str().to_string(),
                format!("{:.2}", range.min),
                format!("{:.2}", range.max),
                range.description.clone().unwrap_or_default(),
            ]);
        }

        let mut table = builder.build();
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()));
        table.to_string()
    }

    fn format_history(&self, project: &Project) -> String {
        let mut lines = vec![self.colorize("History:", "cyan")];
        for entry in project.change_history() {
            lines.push(format!("  {}", project.describe_change(entry, false)));
        }
        lines.join("\n")
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format an error message.
    pub fn error(&self, message: &str) -> String {
        self.colorize(&format!("✗ {}", message), "red")
    }

    /// Format an info message.
    pub fn info(&self, message: &str) -> String {
        self.colorize(&format!("ℹ {}", message), "blue")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "blue" => text.blue().to_string(),
            "yellow" => text.yellow().to_string(),
            "cyan" => text.cyan().to_string(),
            _ => text.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::default_values;
    use powerscope_domain::{Model, Output};

    fn project() -> Project {
        let mut project = Project::new(ModelKind::TTest);
        let model = Model::new(ModelKind::TTest, Output::Power, default_values()).unwrap();
        project.add_model(model).unwrap();
        project
    }

    #[test]
    fn test_table_output() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let text = formatter.format_project(&project()).unwrap();
        assert!(text.contains("Primary"));
        assert!(text.contains("-25.00"));
        assert!(text.contains("Added model #1"));
    }

    #[test]
    fn test_json_output() {
        let formatter = Formatter::new(OutputFormat::Json, false);
        let text = formatter.format_project(&project()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["kind"], "ttest");
        assert_eq!(value["ranges"]["delta"]["min"], -25.0);
        assert_eq!(value["models"][0]["output"], "power");
    }

    #[test]
    fn test_messages_without_color() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        assert_eq!(formatter.success("done"), "✓ done");
        assert_eq!(formatter.error("bad"), "✗ bad");
    }
}
