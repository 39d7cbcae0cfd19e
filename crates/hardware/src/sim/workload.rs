//! Workload file parser.
//!
//! A workload lists one access per line:
//!
//! ```text
//! # agent op address [value]
//! 0 W 0x40 7
//! 1 R 0x40
//! 0 F 64
//! X F 0x40
//! ```
//!
//! `R`, `W` and `F` are read, write and flush. `X` is the external flush port
//! and only accepts `F`. Addresses are decimal or `0x` hex. A write without a
//! value stores its 1-based line number. Blank lines and `#` comments are
//! ignored.

use std::fs;
use std::path::Path;

use crate::common::{Access, AgentId, WorkloadError};

/// One access of a workload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkloadOp {
    /// Issuing agent, or [`AgentId::EXTERNAL`] for `X`.
    pub agent: AgentId,
    /// Byte address.
    pub address: u64,
    /// The access.
    pub access: Access,
}

/// A parsed workload, in file order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Workload {
    /// Accesses in file order.
    pub ops: Vec<WorkloadOp>,
}

fn parse_number(token: &str) -> Option<u64> {
    token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")).map_or_else(
        || token.parse().ok(),
        |hex| u64::from_str_radix(hex, 16).ok(),
    )
}

impl Workload {
    /// Parses workload text.
    ///
    /// # Errors
    ///
    /// [`WorkloadError::Parse`] naming the first malformed line.
    pub fn parse(text: &str) -> Result<Self, WorkloadError> {
        let mut ops = Vec::new();
        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            let content = raw.split('#').next().unwrap_or_default().trim();
            if content.is_empty() {
                continue;
            }
            ops.push(Self::parse_line(line, content)?);
        }
        Ok(Self { ops })
    }

    /// Reads and parses a workload file.
    ///
    /// # Errors
    ///
    /// [`WorkloadError::Io`] if the file cannot be read, otherwise as [`Workload::parse`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, WorkloadError> {
        Self::parse(&fs::read_to_string(path)?)
    }

    fn parse_line(line: usize, content: &str) -> Result<WorkloadOp, WorkloadError> {
        let fail = |message: String| WorkloadError::Parse { line, message };
        let fields: Vec<&str> = content.split_whitespace().collect();
        let [who, op, address, rest @ ..] = fields.as_slice() else {
            return Err(fail(format!("expected `<agent> <op> <address>`, got `{content}`")));
        };

        let agent = if who.eq_ignore_ascii_case("x") {
            AgentId::EXTERNAL
        } else {
            match who.parse::<u16>() {
                Ok(id) if id != u16::MAX => AgentId::new(id),
                _ => return Err(fail(format!("invalid agent `{who}`"))),
            }
        };
        let address =
            parse_number(address).ok_or_else(|| fail(format!("invalid address `{address}`")))?;

        let value = match rest {
            [] => None,
            [v] => Some(parse_number(v).ok_or_else(|| fail(format!("invalid value `{v}`")))?),
            _ => return Err(fail("too many fields".to_string())),
        };

        let access = match op.to_ascii_uppercase().as_str() {
            "R" => Access::Read,
            "W" => Access::Write(value.unwrap_or(line as u64)),
            "F" => Access::Flush,
            _ => return Err(fail(format!("unknown operation `{op}`"))),
        };
        if value.is_some() && !access.is_write() {
            return Err(fail(format!("operation `{op}` takes no value")));
        }
        if agent.is_external() && access != Access::Flush {
            return Err(fail("the external port only issues `F`".to_string()));
        }

        Ok(WorkloadOp {
            agent,
            address,
            access,
        })
    }

    /// Number of accesses.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns `true` if the workload has no accesses.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Highest agent index used, ignoring the external port.
    pub fn max_agent(&self) -> Option<AgentId> {
        self.ops
            .iter()
            .map(|op| op.agent)
            .filter(|a| !a.is_external())
            .max()
    }
}
