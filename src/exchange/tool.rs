//! Tool bitmask identifying which traffic-generating subsystem produced an exchange.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

use strum::IntoEnumIterator;
use strum_macros::EnumIter;

use crate::error_handling::ConfigError;

/// A single traffic source of the intercepting host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum Tool {
    Suite,
    Target,
    Proxy,
    Spider,
    Scanner,
    Intruder,
    Repeater,
    Sequencer,
    Decoder,
    Comparer,
    Extender,
}

impl Tool {
    /// The host's flag value for this tool.
    pub fn flag(self) -> ToolFlags {
        ToolFlags(match self {
            Tool::Suite => 0x001,
            Tool::Target => 0x002,
            Tool::Proxy => 0x004,
            Tool::Spider => 0x008,
            Tool::Scanner => 0x010,
            Tool::Intruder => 0x020,
            Tool::Repeater => 0x040,
            Tool::Sequencer => 0x080,
            Tool::Decoder => 0x100,
            Tool::Comparer => 0x200,
            Tool::Extender => 0x400,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tool::Suite => "suite",
            Tool::Target => "target",
            Tool::Proxy => "proxy",
            Tool::Spider => "spider",
            Tool::Scanner => "scanner",
            Tool::Intruder => "intruder",
            Tool::Repeater => "repeater",
            Tool::Sequencer => "sequencer",
            Tool::Decoder => "decoder",
            Tool::Comparer => "comparer",
            Tool::Extender => "extender",
        }
    }
}

/// Set of tools, as the opaque bitmask the host hands over with each exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ToolFlags(pub u32);

impl ToolFlags {
    pub const NONE: ToolFlags = ToolFlags(0);
    pub const SUITE: ToolFlags = ToolFlags(0x001);
    pub const TARGET: ToolFlags = ToolFlags(0x002);
    pub const PROXY: ToolFlags = ToolFlags(0x004);
    pub const SPIDER: ToolFlags = ToolFlags(0x008);
    pub const SCANNER: ToolFlags = ToolFlags(0x010);
    pub const INTRUDER: ToolFlags = ToolFlags(0x020);
    pub const REPEATER: ToolFlags = ToolFlags(0x040);
    pub const SEQUENCER: ToolFlags = ToolFlags(0x080);
    pub const DECODER: ToolFlags = ToolFlags(0x100);
    pub const COMPARER: ToolFlags = ToolFlags(0x200);
    pub const EXTENDER: ToolFlags = ToolFlags(0x400);

    pub fn bits(self) -> u32 {
        self.0
    }

    /// True if any bit of `other` is set in `self`.
    pub fn intersects(self, other: ToolFlags) -> bool {
        self.0 & other.0 != 0
    }

    /// True if every bit of `other` is set in `self`.
    pub fn contains(self, other: ToolFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Tools whose flag is set, in host order.
    pub fn tools(self) -> Vec<Tool> {
        Tool::iter().filter(|t| self.contains(t.flag())).collect()
    }
}

impl BitOr for ToolFlags {
    type Output = ToolFlags;

    fn bitor(self, rhs: ToolFlags) -> ToolFlags {
        ToolFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for ToolFlags {
    fn bitor_assign(&mut self, rhs: ToolFlags) {
        self.0 |= rhs.0;
    }
}

impl From<Tool> for ToolFlags {
    fn from(tool: Tool) -> Self {
        tool.flag()
    }
}

/// Accepts either a decimal mask (`"68"`) or comma-separated tool names
/// (`"proxy,repeater"`), case-insensitive.
impl FromStr for ToolFlags {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(mask) = s.parse::<u32>() {
            return Ok(ToolFlags(mask));
        }

        let mut flags = ToolFlags::NONE;
        for name in s.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            let tool = Tool::iter()
                .find(|t| t.as_str().eq_ignore_ascii_case(name))
                .ok_or_else(|| ConfigError::UnknownTool(name.to_string()))?;
            flags |= tool.flag();
        }
        Ok(flags)
    }
}

impl fmt::Display for ToolFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.tools().into_iter().map(Tool::as_str).collect();
        if names.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&names.join(","))
        }
    }
}
