//! Catalog of the companion command-line tools.
//!
//! Each tool ships as its own executable next to the daemon. The catalog
//! pins the known set so resolution and invocation always go through a
//! typed name rather than a free-form string.

use serde::{Deserialize, Serialize};

/// One of the known companion tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolKind {
    /// Destination keypair generator.
    #[serde(rename = "keygen")]
    Keygen,
    /// Vanity address miner.
    #[serde(rename = "vain")]
    Vanity,
    /// Key file inspector.
    #[serde(rename = "keyinfo")]
    KeyInfo,
    /// Derives b33 addresses from blinded keys.
    #[serde(rename = "b33address")]
    B33Address,
    /// Produces address registration lines.
    #[serde(rename = "regaddr")]
    RegAddr,
    /// Produces subdomain registration lines.
    #[serde(rename = "regaddr_3ld")]
    RegAddr3ld,
    /// Produces alias registration lines.
    #[serde(rename = "regaddralias")]
    RegAddrAlias,
    /// Generates offline signing keys.
    #[serde(rename = "offlinekeys")]
    OfflineKeys,
    /// Dumps router info files.
    #[serde(rename = "routerinfo")]
    RouterInfo,
    /// X25519 keypair generator.
    #[serde(rename = "x25519")]
    X25519,
    /// Base64 encoder and decoder for the I2P alphabet.
    #[serde(rename = "i2pbase64")]
    Base64,
    /// Router family certificate tool.
    #[serde(rename = "famtool")]
    FamTool,
}

impl ToolKind {
    /// Every known tool, in catalog order.
    pub const ALL: [Self; 12] = [
        Self::Keygen,
        Self::Vanity,
        Self::KeyInfo,
        Self::B33Address,
        Self::RegAddr,
        Self::RegAddr3ld,
        Self::RegAddrAlias,
        Self::OfflineKeys,
        Self::RouterInfo,
        Self::X25519,
        Self::Base64,
        Self::FamTool,
    ];

    /// Executable file name of the tool.
    #[must_use]
    pub const fn executable_name(self) -> &'static str {
        match self {
            Self::Keygen => "keygen",
            Self::Vanity => "vain",
            Self::KeyInfo => "keyinfo",
            Self::B33Address => "b33address",
            Self::RegAddr => "regaddr",
            Self::RegAddr3ld => "regaddr_3ld",
            Self::RegAddrAlias => "regaddralias",
            Self::OfflineKeys => "offlinekeys",
            Self::RouterInfo => "routerinfo",
            Self::X25519 => "x25519",
            Self::Base64 => "i2pbase64",
            Self::FamTool => "famtool",
        }
    }

    /// Short human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Keygen => "Key generator",
            Self::Vanity => "Vanity address miner",
            Self::KeyInfo => "Key inspector",
            Self::B33Address => "B33 address deriver",
            Self::RegAddr => "Address registration",
            Self::RegAddr3ld => "Subdomain registration",
            Self::RegAddrAlias => "Alias registration",
            Self::OfflineKeys => "Offline keys generator",
            Self::RouterInfo => "Router info inspector",
            Self::X25519 => "X25519 keypair generator",
            Self::Base64 => "Base64 codec",
            Self::FamTool => "Family certificate tool",
        }
    }

    /// Looks a tool up by its executable name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.executable_name() == name)
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.executable_name())
    }
}
