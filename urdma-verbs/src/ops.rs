//! The verbs operation table a provider binds to each registered device.

use crate::error::Result;
use crate::objects::{Cq, CqInitAttr, Device, Mr, Pd, Qp, Ucontext};
use crate::qp::{QpAttr, QpAttrMask, QpInitAttr};
use crate::types::{AccessFlags, DeviceAttr, Gid, PortAttr, PortImmutable};
use crate::wr::{Completion, CqNotify, RecvWr, SendWr};

/// The fixed operation contract the core invokes against a device.
///
/// The associated `*Ext` types declare, once per object type, the private
/// extension the core embeds next to the mandated base fields when it
/// allocates a container; they are `Sized` so the whole object is one block.
/// Operations are associated functions taking the owning [`Device`], the
/// same way every table entry of the core receives the device it was bound
/// to; provider state is recovered through [`Device::ext`].
///
/// Binding happens wholesale at registration. A device is never reachable
/// through the core with a partial table.
pub trait DeviceOps: Sized + Send + Sync + 'static {
    /// Private extension embedded in each protection domain.
    type PdExt: Default + Send + 'static;
    /// Private extension embedded in each completion queue.
    type CqExt: Default + Send + 'static;
    /// Private extension embedded in each queue pair.
    type QpExt: Default + Send + 'static;
    /// Private extension embedded in each memory region.
    type MrExt: Send + 'static;
    /// Private extension embedded in each user context.
    type UcontextExt: Default + Send + 'static;

    fn query_device(dev: &Device<Self>) -> Result<DeviceAttr>;

    fn query_port(dev: &Device<Self>, port: u8) -> Result<PortAttr>;

    fn get_port_immutable(dev: &Device<Self>, port: u8) -> Result<PortImmutable>;

    fn query_gid(dev: &Device<Self>, port: u8, index: u32) -> Result<Gid>;

    /// Attach a user-space session.
    fn alloc_ucontext(dev: &Device<Self>, uctx: &mut Ucontext<Self::UcontextExt>) -> Result<()>;

    /// Detach a user-space session. Infallible; the session is gone either
    /// way.
    fn dealloc_ucontext(dev: &Device<Self>, uctx: &mut Ucontext<Self::UcontextExt>);

    fn alloc_pd(dev: &Device<Self>, pd: &mut Pd<Self::PdExt>) -> Result<()>;

    fn dealloc_pd(dev: &Device<Self>, pd: &mut Pd<Self::PdExt>) -> Result<()>;

    fn create_qp(dev: &Device<Self>, qp: &mut Qp<Self::QpExt>, init: &QpInitAttr) -> Result<()>;

    /// Drive the queue pair state machine. `mask` names the fields of
    /// `attr` the caller filled in.
    fn modify_qp(
        dev: &Device<Self>,
        qp: &mut Qp<Self::QpExt>,
        attr: &QpAttr,
        mask: QpAttrMask,
    ) -> Result<()>;

    /// Current attributes plus the capabilities granted at creation.
    fn query_qp(dev: &Device<Self>, qp: &Qp<Self::QpExt>) -> Result<(QpAttr, QpInitAttr)>;

    fn destroy_qp(dev: &Device<Self>, qp: &mut Qp<Self::QpExt>) -> Result<()>;

    fn post_send(dev: &Device<Self>, qp: &mut Qp<Self::QpExt>, wr_list: &[SendWr]) -> Result<()>;

    fn post_recv(dev: &Device<Self>, qp: &mut Qp<Self::QpExt>, wr_list: &[RecvWr]) -> Result<()>;

    fn create_cq(dev: &Device<Self>, cq: &mut Cq<Self::CqExt>, init: &CqInitAttr) -> Result<()>;

    fn destroy_cq(dev: &Device<Self>, cq: &mut Cq<Self::CqExt>) -> Result<()>;

    /// Drain up to `entries.len()` completions into `entries`, returning how
    /// many were written. Never blocks.
    fn poll_cq(
        dev: &Device<Self>,
        cq: &mut Cq<Self::CqExt>,
        entries: &mut [Completion],
    ) -> Result<usize>;

    fn req_notify_cq(dev: &Device<Self>, cq: &mut Cq<Self::CqExt>, notify: CqNotify) -> Result<()>;

    /// Device-wide region covering all memory the device can reach without
    /// translation.
    fn get_dma_mr(dev: &Device<Self>, access: AccessFlags) -> Result<Box<Mr<Self::MrExt>>>;

    /// Region backed by a caller-supplied buffer.
    fn reg_user_mr(
        dev: &Device<Self>,
        start: u64,
        length: u64,
        iova: u64,
        access: AccessFlags,
    ) -> Result<Box<Mr<Self::MrExt>>>;

    /// Release a region. Consumes the box, so a region cannot be
    /// deregistered twice or touched afterwards.
    fn dereg_mr(dev: &Device<Self>, mr: Box<Mr<Self::MrExt>>) -> Result<()>;
}
