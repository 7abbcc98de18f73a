//! Report exporters - CSV, JSON, Markdown
//!
//! Every report is a table plus a summary. Exporters only see that shape
//! through [`ReportData`].

use std::fmt;
use std::str::FromStr;

/// Trait for exporting reports to different formats
pub trait ReportExporter {
    fn export(&self, report: &dyn ReportData) -> String;

    fn extension(&self) -> &'static str;

    fn mime_type(&self) -> &'static str;
}

/// Trait for data that can be exported
pub trait ReportData {
    fn title(&self) -> &str;

    fn headers(&self) -> Vec<String>;

    fn rows(&self) -> Vec<Vec<String>>;

    /// Key-value pairs printed above the table
    fn summary(&self) -> Vec<(String, String)>;
}

/// Output format selectable from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    Csv,
    Json,
    #[default]
    Markdown,
}

impl ReportFormat {
    pub fn exporter(&self) -> Box<dyn ReportExporter> {
        match self {
            ReportFormat::Csv => Box::new(CsvExporter::new()),
            ReportFormat::Json => Box::new(JsonExporter::new()),
            ReportFormat::Markdown => Box::new(MarkdownExporter::new()),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportFormat::Csv => "csv",
            ReportFormat::Json => "json",
            ReportFormat::Markdown => "markdown",
        }
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ReportFormat::Csv),
            "json" => Ok(ReportFormat::Json),
            "md" | "markdown" => Ok(ReportFormat::Markdown),
            other => Err(format!("unknown report format '{}' (csv, json, markdown)", other)),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// CSV Exporter
// ============================================================================

/// CSV format exporter. The summary is not part of CSV output.
pub struct CsvExporter {
    delimiter: char,
    include_header: bool,
}

impl Default for CsvExporter {
    fn default() -> Self {
        Self {
            delimiter: ',',
            include_header: true,
        }
    }
}

impl CsvExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn without_header(mut self) -> Self {
        self.include_header = false;
        self
    }

    fn field(&self, value: &str) -> String {
        if value.contains(self.delimiter) || value.contains('"') || value.contains('\n') {
            format!("\"{}\"", value.replace('"', "\"\""))
        } else {
            value.to_string()
        }
    }

    fn line(&self, values: &[String]) -> String {
        let fields: Vec<String> = values.iter().map(|v| self.field(v)).collect();
        let mut line = fields.join(&self.delimiter.to_string());
        line.push('\n');
        line
    }
}

impl ReportExporter for CsvExporter {
    fn export(&self, report: &dyn ReportData) -> String {
        let mut output = String::new();
        if self.include_header {
            output.push_str(&self.line(&report.headers()));
        }
        for row in report.rows() {
            output.push_str(&self.line(&row));
        }
        output
    }

    fn extension(&self) -> &'static str {
        "csv"
    }

    fn mime_type(&self) -> &'static str {
        "text/csv"
    }
}

// ============================================================================
// JSON Exporter
// ============================================================================

/// JSON format exporter: `{ title, summary, rows: [{header: value}] }`
pub struct JsonExporter {
    pretty: bool,
}

impl Default for JsonExporter {
    fn default() -> Self {
        Self { pretty: true }
    }
}

impl JsonExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compact(mut self) -> Self {
        self.pretty = false;
        self
    }
}

impl ReportExporter for JsonExporter {
    fn export(&self, report: &dyn ReportData) -> String {
        let headers = report.headers();
        let rows: Vec<serde_json::Value> = report
            .rows()
            .into_iter()
            .map(|row| {
                let object: serde_json::Map<String, serde_json::Value> = headers
                    .iter()
                    .cloned()
                    .zip(row.into_iter().map(serde_json::Value::String))
                    .collect();
                serde_json::Value::Object(object)
            })
            .collect();
        let summary: serde_json::Map<String, serde_json::Value> = report
            .summary()
            .into_iter()
            .map(|(k, v)| (k, serde_json::Value::String(v)))
            .collect();

        let document = serde_json::json!({
            "title": report.title(),
            "summary": summary,
            "rows": rows,
        });
        let rendered = if self.pretty {
            serde_json::to_string_pretty(&document)
        } else {
            serde_json::to_string(&document)
        };
        rendered.unwrap_or_default()
    }

    fn extension(&self) -> &'static str {
        "json"
    }

    fn mime_type(&self) -> &'static str {
        "application/json"
    }
}

// ============================================================================
// Markdown Exporter
// ============================================================================

/// Markdown format exporter
pub struct MarkdownExporter {
    include_summary: bool,
}

impl Default for MarkdownExporter {
    fn default() -> Self {
        Self {
            include_summary: true,
        }
    }
}

impl MarkdownExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without_summary(mut self) -> Self {
        self.include_summary = false;
        self
    }

    fn cell(value: &str) -> String {
        value.replace('|', "\\|").replace('\n', " ")
    }
}

impl ReportExporter for MarkdownExporter {
    fn export(&self, report: &dyn ReportData) -> String {
        let mut output = format!("# {}\n\n", report.title());

        if self.include_summary {
            for (key, value) in report.summary() {
                output.push_str(&format!("- **{}**: {}\n", key, Self::cell(&value)));
            }
            output.push('\n');
        }

        let headers = report.headers();
        let rows = report.rows();
        if rows.is_empty() {
            output.push_str("_No entries._\n");
            return output;
        }

        output.push_str(&format!("| {} |\n", headers.join(" | ")));
        output.push_str(&format!(
            "|{}|\n",
            headers.iter().map(|_| "---").collect::<Vec<_>>().join("|")
        ));
        for row in rows {
            let cells: Vec<String> = row.iter().map(|c| Self::cell(c)).collect();
            output.push_str(&format!("| {} |\n", cells.join(" | ")));
        }
        output
    }

    fn extension(&self) -> &'static str {
        "md"
    }

    fn mime_type(&self) -> &'static str {
        "text/markdown"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Sample {
        rows: Vec<Vec<String>>,
    }

    impl ReportData for Sample {
        fn title(&self) -> &str {
            "Sample"
        }

        fn headers(&self) -> Vec<String> {
            vec!["Id".to_string(), "Note".to_string()]
        }

        fn rows(&self) -> Vec<Vec<String>> {
            self.rows.clone()
        }

        fn summary(&self) -> Vec<(String, String)> {
            vec![("Entries".to_string(), self.rows.len().to_string())]
        }
    }

    fn sample() -> Sample {
        Sample {
            rows: vec![
                vec!["WTX_1".to_string(), "Escrow hold".to_string()],
                vec!["WTX_2".to_string(), "Released, \"client\" confirmed".to_string()],
            ],
        }
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("CSV".parse::<ReportFormat>().unwrap(), ReportFormat::Csv);
        assert_eq!("md".parse::<ReportFormat>().unwrap(), ReportFormat::Markdown);
        assert!("xml".parse::<ReportFormat>().is_err());
        assert_eq!(ReportFormat::Json.exporter().extension(), "json");
    }

    #[test]
    fn test_csv_escapes_fields() {
        let output = CsvExporter::new().export(&sample());
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "Id,Note");
        assert_eq!(lines[1], "WTX_1,Escrow hold");
        assert_eq!(lines[2], "WTX_2,\"Released, \"\"client\"\" confirmed\"");

        let output = CsvExporter::new().with_delimiter(';').without_header().export(&sample());
        assert!(output.starts_with("WTX_1;Escrow hold\n"));
    }

    #[test]
    fn test_json_rows_are_keyed_by_header() {
        let output = JsonExporter::new().compact().export(&sample());
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["title"], "Sample");
        assert_eq!(value["summary"]["Entries"], "2");
        assert_eq!(value["rows"][0]["Id"], "WTX_1");
        assert!(!output.contains('\n'));
    }

    #[test]
    fn test_markdown_table() {
        let mut report = sample();
        report.rows[0][1] = "a|b".to_string();
        let output = MarkdownExporter::new().export(&report);
        assert!(output.starts_with("# Sample\n"));
        assert!(output.contains("- **Entries**: 2"));
        assert!(output.contains("| Id | Note |\n|---|---|\n"));
        assert!(output.contains("| WTX_1 | a\\|b |"));

        let empty = Sample { rows: Vec::new() };
        let output = MarkdownExporter::new().without_summary().export(&empty);
        assert_eq!(output, "# Sample\n\n_No entries._\n");
    }
}
