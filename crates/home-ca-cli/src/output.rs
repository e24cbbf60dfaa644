//! Output formatting for the provisioning report.
//!
//! Supports table (human-readable) and JSON output formats.

use std::io::Write;

use home_ca::{ArtifactKind, ArtifactStatus, Report};
use serde::Serialize;

use crate::cli::Format;
use crate::error::CliError;

/// Output formatter that handles both table and JSON output.
#[derive(Debug, Clone)]
pub struct OutputFormat {
    format: Format,
}

impl OutputFormat {
    /// Create a new output formatter.
    #[must_use]
    pub const fn new(format: Format) -> Self {
        Self { format }
    }

    /// Write a serializable value to the output.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write<W, T>(&self, writer: &mut W, value: &T) -> Result<(), CliError>
    where
        W: Write,
        T: Serialize + TableDisplay,
    {
        match self.format {
            Format::Json => {
                serde_json::to_writer_pretty(&mut *writer, value)
                    .map_err(|e| CliError::Output(format!("JSON serialization failed: {e}")))?;
                writeln!(writer)?;
            }
            Format::Table => {
                value.write_table(writer)?;
            }
        }
        Ok(())
    }
}

/// Trait for types that can be displayed as a table.
pub trait TableDisplay {
    /// Write the value as a human-readable table.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError>;
}

const fn kind_label(kind: ArtifactKind) -> &'static str {
    match kind {
        ArtifactKind::Key => "key",
        ArtifactKind::Certificate => "certificate",
        ArtifactKind::Chain => "chain",
    }
}

const fn status_label(status: ArtifactStatus) -> &'static str {
    match status {
        ArtifactStatus::Created => "created",
        ArtifactStatus::Existing => "existing",
    }
}

impl TableDisplay for Report {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "{:<48}  {:<11}  {:<8}", "PATH", "KIND", "STATUS")?;
        writeln!(writer, "{}", "─".repeat(71))?;

        for artifact in &self.artifacts {
            writeln!(
                writer,
                "{:<48}  {:<11}  {:<8}",
                artifact.path.display(),
                kind_label(artifact.kind),
                status_label(artifact.status)
            )?;
        }

        writeln!(writer)?;
        writeln!(
            writer,
            "Total: {} artifact(s), {} created",
            self.artifacts.len(),
            self.created()
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use home_ca::Artifact;
    use std::path::PathBuf;

    fn report() -> Report {
        Report {
            artifacts: vec![
                Artifact {
                    path: PathBuf::from("certs/ca.key.pem"),
                    kind: ArtifactKind::Key,
                    status: ArtifactStatus::Existing,
                },
                Artifact {
                    path: PathBuf::from("certs/nas.chain.pem"),
                    kind: ArtifactKind::Chain,
                    status: ArtifactStatus::Created,
                },
            ],
        }
    }

    fn render(format: Format, report: &Report) -> String {
        let mut buf = Vec::new();
        OutputFormat::new(format).write(&mut buf, report).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn report_table_output() {
        let output = render(Format::Table, &report());

        assert!(output.starts_with("PATH"));
        assert!(output.contains("certs/ca.key.pem"));
        assert!(output.contains("existing"));
        assert!(output.contains("chain"));
        assert!(output.contains("Total: 2 artifact(s), 1 created"));
    }

    #[test]
    fn report_json_output() {
        let output = render(Format::Json, &report());

        let value: serde_json::Value = serde_json::from_str(&output).expect("valid JSON");
        assert_eq!(value["artifacts"][1]["path"], "certs/nas.chain.pem");
        assert_eq!(value["artifacts"][1]["kind"], "chain");
        assert_eq!(value["artifacts"][0]["status"], "existing");
    }

    #[test]
    fn empty_report_table() {
        let output = render(Format::Table, &Report::default());
        assert!(output.contains("Total: 0 artifact(s), 0 created"));
    }
}
