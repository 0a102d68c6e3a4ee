//! Queue pair attributes and the modify-time state machine.

use crate::types::AccessFlags;
use std::ops::{BitOr, BitOrAssign};

/// Queue pair states, in the order a connection normally walks them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QpState {
    #[default]
    Reset,
    Init,
    ReadyToReceive,
    ReadyToSend,
    SqError,
    Error,
}

/// Transport service of a queue pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QpType {
    #[default]
    ReliableConnection,
    UnreliableDatagram,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathMtu {
    Mtu256,
    Mtu512,
    #[default]
    Mtu1024,
    Mtu2048,
    Mtu4096,
}

/// Which `QpAttr` fields a modify call carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QpAttrMask(u16);

impl QpAttrMask {
    pub const STATE: Self = Self(1 << 0);
    pub const PKEY_INDEX: Self = Self(1 << 1);
    pub const PORT: Self = Self(1 << 2);
    pub const ACCESS_FLAGS: Self = Self(1 << 3);
    pub const AV: Self = Self(1 << 4);
    pub const PATH_MTU: Self = Self(1 << 5);
    pub const DEST_QP_NUM: Self = Self(1 << 6);
    pub const RQ_PSN: Self = Self(1 << 7);
    pub const MAX_DEST_RD_ATOMIC: Self = Self(1 << 8);
    pub const MIN_RNR_TIMER: Self = Self(1 << 9);
    pub const SQ_PSN: Self = Self(1 << 10);
    pub const TIMEOUT: Self = Self(1 << 11);
    pub const RETRY_COUNT: Self = Self(1 << 12);
    pub const RNR_RETRY: Self = Self(1 << 13);
    pub const MAX_RD_ATOMIC: Self = Self(1 << 14);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for QpAttrMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for QpAttrMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Queue sizing requested at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QpCaps {
    pub max_send_wr: u32,
    pub max_recv_wr: u32,
    pub max_send_sge: u32,
    pub max_recv_sge: u32,
    pub max_inline_data: u32,
}

impl Default for QpCaps {
    fn default() -> Self {
        Self {
            max_send_wr: 128,
            max_recv_wr: 128,
            max_send_sge: 1,
            max_recv_sge: 1,
            max_inline_data: 64,
        }
    }
}

/// Initiator/responder capabilities handed to `create_qp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QpInitAttr {
    pub qp_type: QpType,
    pub caps: QpCaps,
}

/// Modify payload; only the fields named by the accompanying mask are read.
#[derive(Debug, Clone, Copy, Default)]
pub struct QpAttr {
    pub state: QpState,
    pub pkey_index: u16,
    pub port: u8,
    pub access: AccessFlags,
    pub path_mtu: PathMtu,
    pub dest_qp_num: u32,
    pub rq_psn: u32,
    pub sq_psn: u32,
    pub timeout: u8,
    pub retry_count: u8,
    pub rnr_retry: u8,
    pub min_rnr_timer: u8,
    pub max_rd_atomic: u8,
    pub max_dest_rd_atomic: u8,
}

/// Attribute bits that must accompany a `from` to `to` modify.
///
/// `None` means the transition itself is illegal. Any state may be forced to
/// `Reset` or `Error` with the state bit alone.
pub fn transition_mask(from: QpState, to: QpState) -> Option<QpAttrMask> {
    use QpState::*;

    let mask = match (from, to) {
        (_, Reset) | (_, Error) => QpAttrMask::STATE,
        (Reset, Init) => {
            QpAttrMask::STATE | QpAttrMask::PKEY_INDEX | QpAttrMask::PORT | QpAttrMask::ACCESS_FLAGS
        }
        (Init, ReadyToReceive) => {
            QpAttrMask::STATE
                | QpAttrMask::AV
                | QpAttrMask::PATH_MTU
                | QpAttrMask::DEST_QP_NUM
                | QpAttrMask::RQ_PSN
                | QpAttrMask::MAX_DEST_RD_ATOMIC
                | QpAttrMask::MIN_RNR_TIMER
        }
        (ReadyToReceive, ReadyToSend) => {
            QpAttrMask::STATE
                | QpAttrMask::TIMEOUT
                | QpAttrMask::RETRY_COUNT
                | QpAttrMask::RNR_RETRY
                | QpAttrMask::SQ_PSN
                | QpAttrMask::MAX_RD_ATOMIC
        }
        (SqError, ReadyToSend) => QpAttrMask::STATE | QpAttrMask::SQ_PSN,
        (ReadyToSend, ReadyToSend) => QpAttrMask::STATE,
        _ => return None,
    };
    Some(mask)
}
