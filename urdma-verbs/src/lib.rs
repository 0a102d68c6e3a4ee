//! Boundary contract between a software RDMA provider and the generic verbs
//! core it registers against.
//!
//! The core itself lives outside this workspace. This crate pins down what
//! the two sides exchange: the mandated attribute records ([`types`]), the
//! owning containers for framework objects ([`objects`]), the queue pair
//! state machine ([`qp`]), work requests and completions ([`wr`]), the
//! operation table a provider binds at registration ([`ops`]), and the
//! allocation/registration services the core renders ([`core`]).

pub mod core;
pub mod error;
pub mod objects;
pub mod ops;
pub mod qp;
pub mod types;
pub mod wr;

pub use crate::core::{expand_name_template, VerbsCore};
pub use error::{Result, VerbsError};
pub use objects::{Cq, CqInitAttr, Device, Mr, MrInit, Pd, Qp, Ucontext};
pub use ops::DeviceOps;
pub use qp::{
    transition_mask, PathMtu, QpAttr, QpAttrMask, QpCaps, QpInitAttr, QpState, QpType,
};
pub use types::{
    AccessFlags, DeviceAttr, DeviceInit, Gid, PortAttr, PortImmutable, PortPhysState, PortState,
};
pub use wr::{Completion, CqNotify, RecvWr, SendFlags, SendWr, Sge, WcStatus, WrOpcode};
