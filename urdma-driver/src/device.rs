//! The urdma device record and its verbs operation table.
//!
//! Every operation answers synchronously on the caller's thread. The
//! control plane (queries, object lifecycle, the queue pair state machine)
//! is fully served; the data plane is not: posted work requests are dropped,
//! polls report nothing, and notification arming is a logged no-op.

use log::{debug, info, trace};
use rand::Rng;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use urdma_verbs::{
    transition_mask, AccessFlags, Completion, Cq, CqInitAttr, CqNotify, Device, DeviceAttr,
    DeviceInit, DeviceOps, Gid, Mr, MrInit, Pd, PortAttr, PortImmutable, PortPhysState, PortState,
    Qp, QpAttr, QpAttrMask, QpInitAttr, QpState, RecvWr, Result, SendWr, Ucontext, VerbsError,
};

/// Node description every urdma device carries.
pub const NODE_DESC: &str = "urdma";

/// ABI version advertised to the user-space verbs library.
pub const UVERBS_ABI_VERSION: u32 = 1;

/// The single port every urdma device exposes.
pub const PORT_NUM: u8 = 1;

/// GID table length advertised for that port.
pub const GID_TABLE_LEN: u32 = 1;

/// Base attributes every urdma device registers with. One completion vector
/// per available processing unit; lkey 0 means no translation required.
pub fn base_init() -> DeviceInit {
    DeviceInit {
        node_desc: NODE_DESC.to_string(),
        phys_port_cnt: 1,
        num_comp_vectors: thread::available_parallelism().map_or(1, |n| n.get() as u32),
        local_dma_lkey: 0,
        uverbs_abi_version: UVERBS_ABI_VERSION,
    }
}

/// Private device state embedded behind the mandated base attributes.
pub struct UrdmaDevice {
    id: u32,
    gid: Gid,
    next_qp_num: AtomicU32,
    next_mr_key: AtomicU32,
}

impl UrdmaDevice {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            gid: generate_gid(id),
            next_qp_num: AtomicU32::new(1),
            next_mr_key: AtomicU32::new(1),
        }
    }

    /// Registry slot the device was created for.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Fixed at allocation; every GID query serves this value.
    pub fn gid(&self) -> Gid {
        self.gid
    }
}

/// Link-local style GID: fe80::/64 prefix, the device id, a random
/// interface tail so concurrent hosts do not collide.
fn generate_gid(id: u32) -> Gid {
    let mut raw = [0u8; 16];
    raw[0] = 0xfe;
    raw[1] = 0x80;
    raw[8..12].copy_from_slice(&id.to_be_bytes());
    rand::thread_rng().fill(&mut raw[12..]);
    Gid::from_raw(raw)
}

/// Protection domain extension. Nothing to track yet.
#[derive(Default)]
pub struct UrdmaPd;

/// Completion queue extension. Grows a ring once completions exist.
#[derive(Default)]
pub struct UrdmaCq;

/// Queue pair extension: position in the state machine.
#[derive(Default)]
pub struct UrdmaQp {
    state: QpState,
}

impl UrdmaQp {
    pub fn state(&self) -> QpState {
        self.state
    }
}

/// Memory region extension.
pub struct UrdmaMr;

/// User context extension.
#[derive(Default)]
pub struct UrdmaUcontext;

fn check_port(dev: &Device<UrdmaDevice>, port: u8) -> Result<()> {
    if port == 0 || port > dev.phys_port_cnt() {
        return Err(VerbsError::InvalidPort {
            port,
            count: dev.phys_port_cnt(),
        });
    }
    Ok(())
}

impl DeviceOps for UrdmaDevice {
    type PdExt = UrdmaPd;
    type CqExt = UrdmaCq;
    type QpExt = UrdmaQp;
    type MrExt = UrdmaMr;
    type UcontextExt = UrdmaUcontext;

    fn query_device(dev: &Device<Self>) -> Result<DeviceAttr> {
        debug!("urdma{}: query device", dev.ext().id);
        // No optional capability is advertised.
        Ok(DeviceAttr::default())
    }

    fn query_port(dev: &Device<Self>, port: u8) -> Result<PortAttr> {
        debug!("urdma{}: query port {port}", dev.ext().id);
        check_port(dev, port)?;
        Ok(PortAttr {
            state: PortState::Active,
            phys_state: PortPhysState::LinkUp,
            gid_tbl_len: GID_TABLE_LEN,
            ..PortAttr::default()
        })
    }

    fn get_port_immutable(dev: &Device<Self>, port: u8) -> Result<PortImmutable> {
        check_port(dev, port)?;
        Ok(PortImmutable {
            gid_tbl_len: GID_TABLE_LEN,
            ..PortImmutable::default()
        })
    }

    fn query_gid(dev: &Device<Self>, port: u8, index: u32) -> Result<Gid> {
        debug!("urdma{}: query gid {index} on port {port}", dev.ext().id);
        check_port(dev, port)?;
        if index >= GID_TABLE_LEN {
            return Err(VerbsError::InvalidGidIndex {
                index,
                len: GID_TABLE_LEN,
            });
        }
        Ok(dev.ext().gid)
    }

    fn alloc_ucontext(dev: &Device<Self>, _uctx: &mut Ucontext<UrdmaUcontext>) -> Result<()> {
        info!("urdma{}: alloc ucontext", dev.ext().id);
        Ok(())
    }

    fn dealloc_ucontext(dev: &Device<Self>, _uctx: &mut Ucontext<UrdmaUcontext>) {
        info!("urdma{}: dealloc ucontext", dev.ext().id);
    }

    fn alloc_pd(dev: &Device<Self>, _pd: &mut Pd<UrdmaPd>) -> Result<()> {
        debug!("urdma{}: alloc pd", dev.ext().id);
        Ok(())
    }

    fn dealloc_pd(dev: &Device<Self>, _pd: &mut Pd<UrdmaPd>) -> Result<()> {
        debug!("urdma{}: dealloc pd", dev.ext().id);
        Ok(())
    }

    fn create_qp(dev: &Device<Self>, qp: &mut Qp<UrdmaQp>, init: &QpInitAttr) -> Result<()> {
        let qp_num = dev.ext().next_qp_num.fetch_add(1, Ordering::Relaxed);
        qp.set_qp_num(qp_num);
        debug!(
            "urdma{}: create qp {qp_num} ({:?}, {} send / {} recv wr)",
            dev.ext().id,
            init.qp_type,
            init.caps.max_send_wr,
            init.caps.max_recv_wr
        );
        Ok(())
    }

    fn modify_qp(
        dev: &Device<Self>,
        qp: &mut Qp<UrdmaQp>,
        attr: &QpAttr,
        mask: QpAttrMask,
    ) -> Result<()> {
        if !mask.contains(QpAttrMask::STATE) {
            debug!(
                "urdma{}: modify qp {} attributes only",
                dev.ext().id,
                qp.qp_num()
            );
            return Ok(());
        }

        let from = qp.ext().state;
        let to = attr.state;
        let required =
            transition_mask(from, to).ok_or(VerbsError::InvalidTransition { from, to })?;
        if !mask.contains(required) {
            return Err(VerbsError::InsufficientMask {
                given: mask,
                required,
            });
        }

        qp.ext_mut().state = to;
        debug!(
            "urdma{}: qp {} {from:?} -> {to:?}",
            dev.ext().id,
            qp.qp_num()
        );
        Ok(())
    }

    fn query_qp(dev: &Device<Self>, qp: &Qp<UrdmaQp>) -> Result<(QpAttr, QpInitAttr)> {
        debug!("urdma{}: query qp {}", dev.ext().id, qp.qp_num());
        let attr = QpAttr {
            state: qp.ext().state,
            ..QpAttr::default()
        };
        let init = QpInitAttr {
            qp_type: qp.qp_type(),
            caps: qp.caps(),
        };
        Ok((attr, init))
    }

    fn destroy_qp(dev: &Device<Self>, qp: &mut Qp<UrdmaQp>) -> Result<()> {
        debug!("urdma{}: destroy qp {}", dev.ext().id, qp.qp_num());
        Ok(())
    }

    fn post_send(dev: &Device<Self>, qp: &mut Qp<UrdmaQp>, wr_list: &[SendWr]) -> Result<()> {
        trace!(
            "urdma{}: post {} send wr on qp {}",
            dev.ext().id,
            wr_list.len(),
            qp.qp_num()
        );
        // TODO: hand the list to a send queue once work execution lands.
        // Until then requests are dropped and no completion is generated.
        Ok(())
    }

    fn post_recv(dev: &Device<Self>, qp: &mut Qp<UrdmaQp>, wr_list: &[RecvWr]) -> Result<()> {
        trace!(
            "urdma{}: post {} recv wr on qp {}",
            dev.ext().id,
            wr_list.len(),
            qp.qp_num()
        );
        Ok(())
    }

    fn create_cq(dev: &Device<Self>, _cq: &mut Cq<UrdmaCq>, init: &CqInitAttr) -> Result<()> {
        debug!("urdma{}: create cq depth {}", dev.ext().id, init.cqe);
        Ok(())
    }

    fn destroy_cq(dev: &Device<Self>, _cq: &mut Cq<UrdmaCq>) -> Result<()> {
        debug!("urdma{}: destroy cq", dev.ext().id);
        Ok(())
    }

    fn poll_cq(
        dev: &Device<Self>,
        _cq: &mut Cq<UrdmaCq>,
        entries: &mut [Completion],
    ) -> Result<usize> {
        trace!(
            "urdma{}: poll cq (up to {} entries)",
            dev.ext().id,
            entries.len()
        );
        Ok(0)
    }

    fn req_notify_cq(dev: &Device<Self>, _cq: &mut Cq<UrdmaCq>, notify: CqNotify) -> Result<()> {
        trace!("urdma{}: request cq notify ({notify:?})", dev.ext().id);
        Ok(())
    }

    fn get_dma_mr(dev: &Device<Self>, access: AccessFlags) -> Result<Box<Mr<UrdmaMr>>> {
        debug!("urdma{}: get dma mr", dev.ext().id);
        // Covers all reachable memory under the device's no-translation key.
        Ok(Box::new(Mr::new(
            MrInit {
                start: 0,
                length: u64::MAX,
                iova: 0,
                access,
                lkey: dev.local_dma_lkey(),
                rkey: dev.local_dma_lkey(),
            },
            UrdmaMr,
        )))
    }

    fn reg_user_mr(
        dev: &Device<Self>,
        start: u64,
        length: u64,
        iova: u64,
        access: AccessFlags,
    ) -> Result<Box<Mr<UrdmaMr>>> {
        let key = dev.ext().next_mr_key.fetch_add(1, Ordering::Relaxed);
        debug!(
            "urdma{}: reg user mr start=0x{start:x} len={length} lkey=0x{key:x}",
            dev.ext().id
        );
        Ok(Box::new(Mr::new(
            MrInit {
                start,
                length,
                iova,
                access,
                lkey: key,
                rkey: key,
            },
            UrdmaMr,
        )))
    }

    fn dereg_mr(dev: &Device<Self>, mr: Box<Mr<UrdmaMr>>) -> Result<()> {
        debug!("urdma{}: dereg mr lkey=0x{:x}", dev.ext().id, mr.lkey());
        drop(mr);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(id: u32) -> Device<UrdmaDevice> {
        Device::new(base_init(), UrdmaDevice::new(id))
    }

    fn modify(
        dev: &Device<UrdmaDevice>,
        qp: &mut Qp<UrdmaQp>,
        to: QpState,
        mask: QpAttrMask,
    ) -> Result<()> {
        let attr = QpAttr {
            state: to,
            ..QpAttr::default()
        };
        UrdmaDevice::modify_qp(dev, qp, &attr, mask)
    }

    #[test]
    fn gid_embeds_prefix_and_device_id() {
        let dev = UrdmaDevice::new(7);
        let raw = dev.gid().raw();
        assert_eq!(raw[0], 0xfe);
        assert_eq!(raw[1], 0x80);
        assert_eq!(&raw[8..12], &7u32.to_be_bytes());
    }

    #[test]
    fn query_device_advertises_nothing() {
        let dev = device(0);
        assert_eq!(
            UrdmaDevice::query_device(&dev).unwrap(),
            DeviceAttr::default()
        );
    }

    #[test]
    fn port_answers_are_fixed() {
        let dev = device(0);
        let port = UrdmaDevice::query_port(&dev, PORT_NUM).unwrap();
        assert_eq!(port.state, PortState::Active);
        assert_eq!(port.phys_state, PortPhysState::LinkUp);
        assert_eq!(port.gid_tbl_len, GID_TABLE_LEN);

        let immutable = UrdmaDevice::get_port_immutable(&dev, PORT_NUM).unwrap();
        assert_eq!(immutable.gid_tbl_len, GID_TABLE_LEN);
    }

    #[test]
    fn out_of_range_port_is_rejected() {
        let dev = device(0);
        assert!(matches!(
            UrdmaDevice::query_port(&dev, 2),
            Err(VerbsError::InvalidPort { port: 2, .. })
        ));
        assert!(matches!(
            UrdmaDevice::query_gid(&dev, 0, 0),
            Err(VerbsError::InvalidPort { port: 0, .. })
        ));
    }

    #[test]
    fn gid_queries_serve_the_recorded_value() {
        let dev = device(3);
        let recorded = dev.ext().gid();
        for _ in 0..3 {
            assert_eq!(UrdmaDevice::query_gid(&dev, PORT_NUM, 0).unwrap(), recorded);
        }
        assert!(matches!(
            UrdmaDevice::query_gid(&dev, PORT_NUM, 1),
            Err(VerbsError::InvalidGidIndex { index: 1, .. })
        ));
    }

    #[test]
    fn pd_and_ucontext_lifecycles_are_symmetric() {
        let dev = device(0);
        let mut pd = Pd::<UrdmaPd>::default();
        UrdmaDevice::alloc_pd(&dev, &mut pd).unwrap();
        UrdmaDevice::dealloc_pd(&dev, &mut pd).unwrap();

        let mut uctx = Ucontext::<UrdmaUcontext>::default();
        UrdmaDevice::alloc_ucontext(&dev, &mut uctx).unwrap();
        UrdmaDevice::dealloc_ucontext(&dev, &mut uctx);
    }

    #[test]
    fn qp_numbers_are_unique_per_device() {
        let dev = device(0);
        let init = QpInitAttr::default();
        let mut a = Qp::new(init, UrdmaQp::default());
        let mut b = Qp::new(init, UrdmaQp::default());
        UrdmaDevice::create_qp(&dev, &mut a, &init).unwrap();
        UrdmaDevice::create_qp(&dev, &mut b, &init).unwrap();
        assert_ne!(a.qp_num(), b.qp_num());
    }

    #[test]
    fn qp_walks_the_connect_ladder() {
        let dev = device(0);
        let init = QpInitAttr::default();
        let mut qp = Qp::new(init, UrdmaQp::default());
        UrdmaDevice::create_qp(&dev, &mut qp, &init).unwrap();
        assert_eq!(qp.ext().state(), QpState::Reset);

        for to in [QpState::Init, QpState::ReadyToReceive, QpState::ReadyToSend] {
            let mask = transition_mask(qp.ext().state(), to).unwrap();
            modify(&dev, &mut qp, to, mask).unwrap();
            assert_eq!(qp.ext().state(), to);
        }

        let (attr, queried_init) = UrdmaDevice::query_qp(&dev, &qp).unwrap();
        assert_eq!(attr.state, QpState::ReadyToSend);
        assert_eq!(queried_init.caps, init.caps);

        UrdmaDevice::destroy_qp(&dev, &mut qp).unwrap();
    }

    #[test]
    fn qp_shortcut_and_thin_mask_are_rejected() {
        let dev = device(0);
        let init = QpInitAttr::default();
        let mut qp = Qp::new(init, UrdmaQp::default());
        UrdmaDevice::create_qp(&dev, &mut qp, &init).unwrap();

        assert!(matches!(
            modify(&dev, &mut qp, QpState::ReadyToSend, QpAttrMask::STATE),
            Err(VerbsError::InvalidTransition { .. })
        ));
        assert!(matches!(
            modify(&dev, &mut qp, QpState::Init, QpAttrMask::STATE),
            Err(VerbsError::InsufficientMask { .. })
        ));
        assert_eq!(qp.ext().state(), QpState::Reset);

        // No state bit means no transition is attempted.
        UrdmaDevice::modify_qp(&dev, &mut qp, &QpAttr::default(), QpAttrMask::empty()).unwrap();
        assert_eq!(qp.ext().state(), QpState::Reset);
    }

    #[test]
    fn posts_are_accepted_and_polls_stay_empty() {
        let dev = device(0);
        let init = QpInitAttr::default();
        let mut qp = Qp::new(init, UrdmaQp::default());
        UrdmaDevice::create_qp(&dev, &mut qp, &init).unwrap();

        let send = SendWr {
            wr_id: 1,
            opcode: urdma_verbs::WrOpcode::Send,
            sg_list: vec![],
            flags: urdma_verbs::SendFlags::SIGNALED,
            remote_addr: 0,
            rkey: 0,
            imm: 0,
        };
        UrdmaDevice::post_send(&dev, &mut qp, &[send]).unwrap();
        UrdmaDevice::post_recv(&dev, &mut qp, &[RecvWr {
            wr_id: 2,
            sg_list: vec![],
        }])
        .unwrap();

        let cq_init = CqInitAttr {
            cqe: 8,
            comp_vector: 0,
        };
        let mut cq = Cq::new(cq_init, UrdmaCq::default());
        UrdmaDevice::create_cq(&dev, &mut cq, &cq_init).unwrap();

        let mut entries = [Completion {
            wr_id: 0,
            status: urdma_verbs::WcStatus::Success,
            opcode: urdma_verbs::WrOpcode::Send,
            byte_len: 0,
            qp_num: 0,
        }; 8];
        assert_eq!(UrdmaDevice::poll_cq(&dev, &mut cq, &mut entries).unwrap(), 0);

        UrdmaDevice::req_notify_cq(&dev, &mut cq, CqNotify::NextCompletion).unwrap();
        UrdmaDevice::destroy_cq(&dev, &mut cq).unwrap();
    }

    #[test]
    fn dma_and_user_regions_record_their_ranges() {
        let dev = device(0);

        let dma = UrdmaDevice::get_dma_mr(&dev, AccessFlags::LOCAL_WRITE).unwrap();
        assert_eq!(dma.start(), 0);
        assert_eq!(dma.length(), u64::MAX);
        assert_eq!(dma.lkey(), dev.local_dma_lkey());

        let user = UrdmaDevice::reg_user_mr(
            &dev,
            0x4000,
            8192,
            0x4000,
            AccessFlags::LOCAL_WRITE | AccessFlags::REMOTE_READ,
        )
        .unwrap();
        assert_eq!(user.start(), 0x4000);
        assert_eq!(user.length(), 8192);
        assert_ne!(user.lkey(), 0);

        let second = UrdmaDevice::reg_user_mr(&dev, 0x8000, 4096, 0x8000, AccessFlags::empty())
            .unwrap();
        assert_ne!(second.lkey(), user.lkey());

        UrdmaDevice::dereg_mr(&dev, user).unwrap();
        UrdmaDevice::dereg_mr(&dev, second).unwrap();
        UrdmaDevice::dereg_mr(&dev, dma).unwrap();
    }
}
