//! Owning containers for framework objects.
//!
//! Each container holds the base attributes the core mandates plus the
//! provider's private extension in a single allocation; freeing the container
//! frees both. The extension is recovered from a container reference, never
//! handed out by value, so base and extension share one lifetime.

use crate::qp::{QpCaps, QpInitAttr, QpType};
use crate::types::{AccessFlags, DeviceInit};
use std::sync::OnceLock;

/// A provider device: mandated base fields plus the provider extension `X`.
pub struct Device<X> {
    node_desc: String,
    phys_port_cnt: u8,
    num_comp_vectors: u32,
    local_dma_lkey: u32,
    uverbs_abi_version: u32,
    name: OnceLock<String>,
    ext: X,
}

impl<X> Device<X> {
    pub fn new(init: DeviceInit, ext: X) -> Self {
        Self {
            node_desc: init.node_desc,
            phys_port_cnt: init.phys_port_cnt,
            num_comp_vectors: init.num_comp_vectors,
            local_dma_lkey: init.local_dma_lkey,
            uverbs_abi_version: init.uverbs_abi_version,
            name: OnceLock::new(),
            ext,
        }
    }

    pub fn node_desc(&self) -> &str {
        &self.node_desc
    }

    pub fn phys_port_cnt(&self) -> u8 {
        self.phys_port_cnt
    }

    pub fn num_comp_vectors(&self) -> u32 {
        self.num_comp_vectors
    }

    pub fn local_dma_lkey(&self) -> u32 {
        self.local_dma_lkey
    }

    pub fn uverbs_abi_version(&self) -> u32 {
        self.uverbs_abi_version
    }

    /// Name assigned by the core at registration, if registered.
    pub fn name(&self) -> Option<&str> {
        self.name.get().map(String::as_str)
    }

    /// Record the name the core assigned. Callable exactly once; a second
    /// call returns the rejected name.
    pub fn assign_name(&self, name: String) -> Result<(), String> {
        self.name.set(name)
    }

    pub fn ext(&self) -> &X {
        &self.ext
    }
}

/// Protection domain container. No base state beyond the extension.
pub struct Pd<X> {
    ext: X,
}

impl<X> Pd<X> {
    pub fn new(ext: X) -> Self {
        Self { ext }
    }

    pub fn ext(&self) -> &X {
        &self.ext
    }

    pub fn ext_mut(&mut self) -> &mut X {
        &mut self.ext
    }
}

impl<X: Default> Default for Pd<X> {
    fn default() -> Self {
        Self::new(X::default())
    }
}

/// Per-session user context container.
pub struct Ucontext<X> {
    ext: X,
}

impl<X> Ucontext<X> {
    pub fn new(ext: X) -> Self {
        Self { ext }
    }

    pub fn ext(&self) -> &X {
        &self.ext
    }

    pub fn ext_mut(&mut self) -> &mut X {
        &mut self.ext
    }
}

impl<X: Default> Default for Ucontext<X> {
    fn default() -> Self {
        Self::new(X::default())
    }
}

/// Requested completion queue shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CqInitAttr {
    pub cqe: u32,
    pub comp_vector: u32,
}

/// Completion queue container.
pub struct Cq<X> {
    cqe: u32,
    comp_vector: u32,
    ext: X,
}

impl<X> Cq<X> {
    pub fn new(init: CqInitAttr, ext: X) -> Self {
        Self {
            cqe: init.cqe,
            comp_vector: init.comp_vector,
            ext,
        }
    }

    /// Depth granted at creation.
    pub fn cqe(&self) -> u32 {
        self.cqe
    }

    pub fn comp_vector(&self) -> u32 {
        self.comp_vector
    }

    pub fn ext(&self) -> &X {
        &self.ext
    }

    pub fn ext_mut(&mut self) -> &mut X {
        &mut self.ext
    }
}

/// Queue pair container.
pub struct Qp<X> {
    qp_num: u32,
    qp_type: QpType,
    caps: QpCaps,
    ext: X,
}

impl<X> Qp<X> {
    pub fn new(init: QpInitAttr, ext: X) -> Self {
        Self {
            qp_num: 0,
            qp_type: init.qp_type,
            caps: init.caps,
            ext,
        }
    }

    pub fn qp_num(&self) -> u32 {
        self.qp_num
    }

    /// Assigned by the provider during `create_qp`.
    pub fn set_qp_num(&mut self, qp_num: u32) {
        self.qp_num = qp_num;
    }

    pub fn qp_type(&self) -> QpType {
        self.qp_type
    }

    pub fn caps(&self) -> QpCaps {
        self.caps
    }

    pub fn ext(&self) -> &X {
        &self.ext
    }

    pub fn ext_mut(&mut self) -> &mut X {
        &mut self.ext
    }
}

/// Registered range plus access keys for a memory region.
#[derive(Debug, Clone, Copy)]
pub struct MrInit {
    pub start: u64,
    pub length: u64,
    pub iova: u64,
    pub access: AccessFlags,
    pub lkey: u32,
    pub rkey: u32,
}

/// Memory region container. Unlike the other objects the provider allocates
/// these itself, so creation hands back an owning box and deregistration
/// consumes it.
pub struct Mr<X> {
    start: u64,
    length: u64,
    iova: u64,
    access: AccessFlags,
    lkey: u32,
    rkey: u32,
    ext: X,
}

impl<X> Mr<X> {
    pub fn new(init: MrInit, ext: X) -> Self {
        Self {
            start: init.start,
            length: init.length,
            iova: init.iova,
            access: init.access,
            lkey: init.lkey,
            rkey: init.rkey,
            ext,
        }
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn iova(&self) -> u64 {
        self.iova
    }

    pub fn access(&self) -> AccessFlags {
        self.access
    }

    pub fn lkey(&self) -> u32 {
        self.lkey
    }

    pub fn rkey(&self) -> u32 {
        self.rkey
    }

    pub fn ext(&self) -> &X {
        &self.ext
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() -> DeviceInit {
        DeviceInit {
            node_desc: "test".to_string(),
            phys_port_cnt: 1,
            num_comp_vectors: 4,
            local_dma_lkey: 0,
            uverbs_abi_version: 1,
        }
    }

    #[test]
    fn device_carries_base_and_extension_together() {
        let dev = Device::new(init(), 42u32);
        assert_eq!(dev.node_desc(), "test");
        assert_eq!(dev.phys_port_cnt(), 1);
        assert_eq!(*dev.ext(), 42);
    }

    #[test]
    fn device_name_is_write_once() {
        let dev = Device::new(init(), ());
        assert_eq!(dev.name(), None);
        dev.assign_name("urdma0".to_string()).unwrap();
        assert_eq!(dev.name(), Some("urdma0"));
        assert_eq!(
            dev.assign_name("urdma1".to_string()),
            Err("urdma1".to_string())
        );
        assert_eq!(dev.name(), Some("urdma0"));
    }

    #[test]
    fn cq_records_its_requested_shape() {
        let cq = Cq::new(
            CqInitAttr {
                cqe: 256,
                comp_vector: 1,
            },
            (),
        );
        assert_eq!(cq.cqe(), 256);
        assert_eq!(cq.comp_vector(), 1);
    }

    #[test]
    fn qp_starts_unnumbered() {
        let mut qp = Qp::new(QpInitAttr::default(), ());
        assert_eq!(qp.qp_num(), 0);
        qp.set_qp_num(7);
        assert_eq!(qp.qp_num(), 7);
        assert_eq!(qp.caps().max_send_sge, 1);
    }

    #[test]
    fn mr_keeps_the_registered_range() {
        let mr = Mr::new(
            MrInit {
                start: 0x1000,
                length: 4096,
                iova: 0x1000,
                access: AccessFlags::LOCAL_WRITE,
                lkey: 3,
                rkey: 3,
            },
            (),
        );
        assert_eq!(mr.start(), 0x1000);
        assert_eq!(mr.length(), 4096);
        assert!(mr.access().contains(AccessFlags::LOCAL_WRITE));
        assert_eq!(mr.lkey(), 3);
    }
}
