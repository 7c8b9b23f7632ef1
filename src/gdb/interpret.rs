//! Matching GDB `list *ADDR` output back to backtrace addresses
//!
//! With `set listsize 1`, GDB answers each `l *0x...` with a header such as
//!
//! ```text
//! 0x400d1234 is in app_main (/project/main/main.c:42).
//! 42	    do_work(ctx);
//! ```
//!
//! Only the header lines are interpretable. Addresses without line info are
//! complained about on stderr instead. Every line is classified on its own,
//! then the classified lines are correlated with the input addresses.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// `<addr> is in <function> (<file>:<line>)`
static LOCATED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(0x[0-9a-fA-F]+)\s+is\s+in\s+(.+?)\s+\(([^()]+):(\d+)\)\.?\s*$")
        .expect("located pattern is valid")
});

/// `<addr> is in <function>`
static FUNCTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(0x[0-9a-fA-F]+)\s+is\s+in\s+(.+?)\.?\s*$").expect("function pattern is valid")
});

/// `<addr> is at <file>:<line>`, printed when no function symbol covers the address
static AT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(0x[0-9a-fA-F]+)\s+is\s+at\s+(.+):(\d+)\.?\s*$").expect("at pattern is valid")
});

/// Function name used when GDB knows the line but not the symbol
pub const UNKNOWN_FUNCTION: &str = "??";

static ANY_ADDRESS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"0x([0-9a-fA-F]+)").expect("address pattern is valid"));

/// How output lines are matched to input addresses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Correlation {
    /// Match by the address GDB echoes in each line; fall back to the line
    /// at the same position only for lines that carry no address.
    #[default]
    Address,
    /// Zip addresses with output lines by index. Any extra line (banner,
    /// warning, source text) shifts every following frame.
    Positional,
}

impl std::str::FromStr for Correlation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "address" | "by-address" | "by_address" => Ok(Correlation::Address),
            "positional" | "position" => Ok(Correlation::Positional),
            other => Err(format!(
                "unknown correlation '{}', expected 'address' or 'positional'",
                other
            )),
        }
    }
}

/// Classification of one line of GDB output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineMatch {
    Located {
        address: u64,
        function: String,
        file: String,
        line: u32,
    },
    Function {
        address: u64,
        function: String,
    },
    Unmatched {
        /// First `0x...` value in the line, if any
        address: Option<u64>,
        raw: String,
    },
}

impl LineMatch {
    pub fn address(&self) -> Option<u64> {
        match self {
            LineMatch::Located { address, .. } | LineMatch::Function { address, .. } => {
                Some(*address)
            }
            LineMatch::Unmatched { address, .. } => *address,
        }
    }
}

/// What is known about one backtrace address
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FrameLocation {
    Resolved {
        function: String,
        file: String,
        line: u32,
    },
    Function {
        function: String,
    },
    Unresolved {
        /// Debugger line echoed for diagnosis
        raw: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedFrame {
    #[serde(serialize_with = "serialize_address")]
    pub address: u32,
    #[serde(flatten)]
    pub location: FrameLocation,
}

fn serialize_address<S>(address: &u32, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&format!("0x{:08x}", address))
}

impl ResolvedFrame {
    pub fn unresolved(address: u32, raw: Option<String>) -> Self {
        Self {
            address,
            location: FrameLocation::Unresolved { raw },
        }
    }

    fn from_match(address: u32, line: &LineMatch) -> Self {
        let location = match line {
            LineMatch::Located {
                function,
                file,
                line,
                ..
            } => FrameLocation::Resolved {
                function: function.clone(),
                file: file.clone(),
                line: *line,
            },
            LineMatch::Function { function, .. } => FrameLocation::Function {
                function: function.clone(),
            },
            LineMatch::Unmatched { raw, .. } => FrameLocation::Unresolved {
                raw: Some(raw.clone()),
            },
        };
        Self { address, location }
    }

    /// True when at least the function is known
    pub fn is_resolved(&self) -> bool {
        !matches!(self.location, FrameLocation::Unresolved { .. })
    }
}

fn parse_hex(token: &str) -> Option<u64> {
    let digits = token.strip_prefix("0x").unwrap_or(token);
    u64::from_str_radix(digits, 16).ok()
}

/// Classify a single line of GDB output.
pub fn classify_line(line: &str) -> LineMatch {
    if let Some(caps) = LOCATED_RE.captures(line) {
        let address = parse_hex(&caps[1]);
        let line_no = caps[4].parse::<u32>().ok();
        if let (Some(address), Some(line_no)) = (address, line_no) {
            return LineMatch::Located {
                address,
                function: caps[2].trim().to_string(),
                file: caps[3].trim().to_string(),
                line: line_no,
            };
        }
    }

    if let Some(caps) = AT_RE.captures(line) {
        let address = parse_hex(&caps[1]);
        let line_no = caps[3].parse::<u32>().ok();
        if let (Some(address), Some(line_no)) = (address, line_no) {
            return LineMatch::Located {
                address,
                function: UNKNOWN_FUNCTION.to_string(),
                file: caps[2].trim().to_string(),
                line: line_no,
            };
        }
    }

    if let Some(caps) = FUNCTION_RE.captures(line) {
        if let Some(address) = parse_hex(&caps[1]) {
            return LineMatch::Function {
                address,
                function: caps[2].trim().to_string(),
            };
        }
    }

    LineMatch::Unmatched {
        address: ANY_ADDRESS_RE
            .captures(line)
            .and_then(|caps| u64::from_str_radix(&caps[1], 16).ok()),
        raw: line.to_string(),
    }
}

/// Build exactly one frame per input address from GDB's stdout.
pub fn correlate(addresses: &[u32], stdout: &str, correlation: Correlation) -> Vec<ResolvedFrame> {
    correlate_output(addresses, stdout, "", correlation)
}

/// Like [`correlate`], with GDB's stderr as a second source of per-address
/// diagnostics. Stderr is only consulted when correlating by address.
pub fn correlate_output(
    addresses: &[u32],
    stdout: &str,
    stderr: &str,
    correlation: Correlation,
) -> Vec<ResolvedFrame> {
    let lines: Vec<LineMatch> = stdout.trim().lines().map(classify_line).collect();

    match correlation {
        Correlation::Positional => addresses
            .iter()
            .enumerate()
            .map(|(i, &address)| match lines.get(i) {
                Some(line) => ResolvedFrame::from_match(address, line),
                None => ResolvedFrame::unresolved(address, None),
            })
            .collect(),
        Correlation::Address => {
            let complaints: Vec<LineMatch> = stderr
                .lines()
                .map(classify_line)
                .filter(|line| line.address().is_some())
                .collect();
            correlate_by_address(addresses, &lines, &complaints)
        }
    }
}

fn correlate_by_address(
    addresses: &[u32],
    lines: &[LineMatch],
    complaints: &[LineMatch],
) -> Vec<ResolvedFrame> {
    // Stdout lines first, so a header always wins over a complaint
    let candidates: Vec<&LineMatch> = lines.iter().chain(complaints).collect();
    let mut used = vec![false; candidates.len()];
    // Slot fallback is only sound when GDB printed one line per address
    let one_line_per_address = lines.len() == addresses.len();

    addresses
        .iter()
        .enumerate()
        .map(|(i, &address)| {
            let wanted = u64::from(address);
            let hit = candidates
                .iter()
                .enumerate()
                .find(|(j, line)| !used[*j] && line.address() == Some(wanted))
                .map(|(j, _)| j);

            if let Some(j) = hit {
                used[j] = true;
                return ResolvedFrame::from_match(address, candidates[j]);
            }

            match lines.get(i) {
                Some(LineMatch::Unmatched { address: None, raw })
                    if one_line_per_address && !used[i] =>
                {
                    used[i] = true;
                    ResolvedFrame::unresolved(address, Some(raw.clone()))
                }
                _ => ResolvedFrame::unresolved(address, None),
            }
        })
        .collect()
}
