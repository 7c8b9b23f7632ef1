//! Human-readable crash reports

use askama::Template;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::decoder::DecodeOutcome;
use crate::error::Result;
use crate::fingerprint::FingerprintCheck;
use crate::gdb::{FrameLocation, ResolvedFrame};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Text,
    /// Colored markup, as shown in a rich text view
    Html,
    Json,
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(ReportFormat::Text),
            "html" => Ok(ReportFormat::Html),
            "json" => Ok(ReportFormat::Json),
            other => Err(format!("unknown report format '{}'", other)),
        }
    }
}

pub fn render(outcome: &DecodeOutcome, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Text => Ok(render_text(outcome)),
        ReportFormat::Html => render_html(outcome),
        ReportFormat::Json => Ok(serde_json::to_string_pretty(outcome)?),
    }
}

fn short_digest(digest: &str) -> &str {
    digest.get(..16).unwrap_or(digest)
}

fn fingerprint_text(check: &FingerprintCheck) -> String {
    match check {
        FingerprintCheck::Match => "Firmware fingerprint matches the selected ELF file.".to_string(),
        FingerprintCheck::Mismatch { actual, .. } => format!(
            "WARNING: selected ELF file has SHA256 {}..., decoded lines may be wrong!",
            short_digest(actual)
        ),
        FingerprintCheck::Unavailable { reason } => {
            format!("Firmware fingerprint not checked: {}", reason)
        }
    }
}

fn frame_text(frame: &ResolvedFrame) -> String {
    match &frame.location {
        FrameLocation::Resolved { function, file, line } => {
            format!("0x{:08x}: {} at {}:{}", frame.address, function, file, line)
        }
        FrameLocation::Function { function } => format!("0x{:08x}: {}", frame.address, function),
        FrameLocation::Unresolved { raw: Some(raw) } => {
            format!("0x{:08x}: unable to decode, check line: {}", frame.address, raw)
        }
        FrameLocation::Unresolved { raw: None } => {
            format!("0x{:08x}: unable to decode, no debugger output", frame.address)
        }
    }
}

pub fn render_text(outcome: &DecodeOutcome) -> String {
    let report = &outcome.report;
    let mut out = String::new();

    if report.stack_smashing {
        out.push_str("Stack smashing protect failure detected!\n");
    }

    if report.backtrace_found {
        out.push_str("Decoding backtrace:\n");
        if outcome.frames.is_empty() {
            out.push_str("No valid addresses found in the backtrace.\n");
        }
        for frame in &outcome.frames {
            out.push_str("  ");
            out.push_str(&frame_text(frame));
            out.push('\n');
        }
        if report.corrupted {
            out.push_str("WARNING: Backtrace is corrupted!\n");
        }
    } else {
        out.push_str("No backtrace found in the input.\n");
    }

    if let Some(sha) = &report.sha256 {
        out.push_str(&format!("ELF file SHA256: {}\n", sha));
        if let Some(check) = &outcome.fingerprint {
            out.push_str(&fingerprint_text(check));
            out.push('\n');
        }
    }

    out
}

struct FrameView<'a> {
    address: String,
    function: &'a str,
    /// `file:line`, when GDB reported one
    location: Option<String>,
    /// Set for frames GDB could not decode
    error: Option<&'a str>,
}

impl<'a> From<&'a ResolvedFrame> for FrameView<'a> {
    fn from(frame: &'a ResolvedFrame) -> Self {
        let address = format!("0x{:08x}", frame.address);
        match &frame.location {
            FrameLocation::Resolved { function, file, line } => Self {
                address,
                function: function.as_str(),
                location: Some(format!("{}:{}", file, line)),
                error: None,
            },
            FrameLocation::Function { function } => Self {
                address,
                function: function.as_str(),
                location: None,
                error: None,
            },
            FrameLocation::Unresolved { raw } => Self {
                address,
                function: "",
                location: None,
                error: Some(raw.as_deref().unwrap_or("no debugger output")),
            },
        }
    }
}

struct VerdictView {
    ok: bool,
    text: String,
}

#[derive(Template)]
#[template(path = "report.html")]
struct HtmlReport<'a> {
    stack_smashing: bool,
    backtrace_found: bool,
    corrupted: bool,
    frames: Vec<FrameView<'a>>,
    sha256: Option<&'a str>,
    fingerprint: Option<VerdictView>,
}

impl<'a> From<&'a DecodeOutcome> for HtmlReport<'a> {
    fn from(outcome: &'a DecodeOutcome) -> Self {
        let report = &outcome.report;
        Self {
            stack_smashing: report.stack_smashing,
            backtrace_found: report.backtrace_found,
            corrupted: report.corrupted,
            frames: outcome.frames.iter().map(FrameView::from).collect(),
            sha256: report.sha256.as_deref(),
            fingerprint: outcome.fingerprint.as_ref().map(|check| VerdictView {
                ok: matches!(check, FingerprintCheck::Match),
                text: fingerprint_text(check),
            }),
        }
    }
}

/// Render the colored `<pre>` report. Every value taken from the crash log
/// or from GDB is HTML-escaped by the template.
pub fn render_html(outcome: &DecodeOutcome) -> Result<String> {
    Ok(HtmlReport::from(outcome).render()?)
}
