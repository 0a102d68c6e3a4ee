//! Attribute records exchanged between the core and a provider.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// 128-bit global identifier addressing a device port on the fabric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Gid([u8; 16]);

impl Gid {
    pub const fn from_raw(raw: [u8; 16]) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> [u8; 16] {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 16]
    }
}

impl fmt::Display for Gid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, pair) in self.0.chunks(2).enumerate() {
            if i > 0 {
                write!(f, ":")?;
            }
            write!(f, "{:02x}{:02x}", pair[0], pair[1])?;
        }
        Ok(())
    }
}

/// Memory access rights carried by memory regions and queue pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccessFlags(u32);

impl AccessFlags {
    pub const LOCAL_WRITE: Self = Self(1 << 0);
    pub const REMOTE_WRITE: Self = Self(1 << 1);
    pub const REMOTE_READ: Self = Self(1 << 2);
    pub const REMOTE_ATOMIC: Self = Self(1 << 3);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for AccessFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for AccessFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Base attributes a provider fills in before registering a device.
#[derive(Debug, Clone)]
pub struct DeviceInit {
    pub node_desc: String,
    pub phys_port_cnt: u8,
    pub num_comp_vectors: u32,
    pub local_dma_lkey: u32,
    pub uverbs_abi_version: u32,
}

/// Device capability set returned by `query_device`.
///
/// A provider that advertises no optional feature returns the default
/// (all-zero) set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceAttr {
    pub max_qp: u32,
    pub max_qp_wr: u32,
    pub max_cq: u32,
    pub max_cqe: u32,
    pub max_mr: u32,
    pub max_mr_size: u64,
    pub max_pd: u32,
    pub max_sge: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PortState {
    #[default]
    Down,
    Initializing,
    Armed,
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PortPhysState {
    #[default]
    Disabled,
    Polling,
    LinkUp,
}

/// Per-port attributes returned by `query_port`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PortAttr {
    pub state: PortState,
    pub phys_state: PortPhysState,
    pub gid_tbl_len: u32,
    pub pkey_tbl_len: u32,
    pub lid: u16,
    pub max_msg_size: u32,
}

/// Port properties fixed for the device's lifetime.
///
/// Must be computable without touching hardware or performing I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PortImmutable {
    pub gid_tbl_len: u32,
    pub pkey_tbl_len: u32,
}
