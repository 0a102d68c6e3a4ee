//! Software RDMA provider registering virtual devices against a generic
//! verbs core.
//!
//! The driver owns a fixed number of device records ([`NUM_DEVICES`]),
//! brings them up as an all-or-nothing batch, and serves the verbs operation
//! table for each: capability and port queries, protection domain,
//! completion queue, queue pair, memory region and user context lifecycle,
//! and the post/poll surface. Work execution and completion generation are
//! not implemented: posts are accepted and dropped, polls report nothing.

pub mod device;
pub mod registry;

pub use device::{
    base_init, UrdmaCq, UrdmaDevice, UrdmaMr, UrdmaPd, UrdmaQp, UrdmaUcontext, GID_TABLE_LEN,
    NODE_DESC, PORT_NUM, UVERBS_ABI_VERSION,
};
pub use registry::{
    bring_up, devices, tear_down, Core, DeviceInfo, DeviceRegistry, COMPANION_MODULE,
    NAME_TEMPLATE, NUM_DEVICES,
};

pub use urdma_verbs as verbs;
