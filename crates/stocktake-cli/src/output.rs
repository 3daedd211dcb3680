//! Terminal output
//!
//! Commands report through an [`OutputFormatter`] so the same code path
//! serves people and scripts. Results go to stdout, diagnostics to stderr.

/// How command results are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }

    pub fn is_json(self) -> bool {
        self == OutputFormat::Json
    }
}

pub trait OutputFormatter {
    /// Headline for a completed operation
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    /// Free-form detail line
    fn info(&self, message: &str);
    /// Aligned `label: value` line
    fn field(&self, label: &str, value: &str);
    /// Machine-readable result document
    fn print_json(&self, value: &serde_json::Value);
}

/// Plain text with status markers
pub struct HumanFormatter;

impl HumanFormatter {
    const LABEL_WIDTH: usize = 16;
}

impl OutputFormatter for HumanFormatter {
    fn success(&self, message: &str) {
        println!("\u{2713} {message}");
    }

    fn error(&self, message: &str) {
        eprintln!("\u{2717} {message}");
    }

    fn warn(&self, message: &str) {
        eprintln!("! {message}");
    }

    fn info(&self, message: &str) {
        println!("  {message}");
    }

    fn field(&self, label: &str, value: &str) {
        let label = format!("{label}:");
        println!("  {label:<width$} {value}", width = Self::LABEL_WIDTH);
    }

    fn print_json(&self, _value: &serde_json::Value) {}
}

/// One JSON document per command on stdout; problems as JSON lines on stderr
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn success(&self, _message: &str) {}

    fn error(&self, message: &str) {
        eprintln!("{}", serde_json::json!({ "success": false, "error": message }));
    }

    fn warn(&self, message: &str) {
        eprintln!("{}", serde_json::json!({ "warning": message }));
    }

    fn info(&self, _message: &str) {}

    fn field(&self, _label: &str, _value: &str) {}

    fn print_json(&self, value: &serde_json::Value) {
        match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{text}"),
            Err(e) => tracing::error!(error = %e, "Failed to render JSON output"),
        }
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Human => Box::new(HumanFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}
