//! Device registry: batch bring-up, reverse teardown, and the process-wide
//! module host surface.

use crate::device::{self, UrdmaDevice};
use log::{error, info, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use urdma_verbs::{Device, Gid, Result, VerbsCore, VerbsError};

/// Devices a default bring-up creates.
pub const NUM_DEVICES: usize = 2;

/// Name template handed to the core; the core yields the unique expansion.
pub const NAME_TEMPLATE: &str = "urdma%d";

/// Subsystem module that must be loaded before any registration.
pub const COMPANION_MODULE: &str = "ib_uverbs";

/// The core trait object the registry drives.
pub type Core = Arc<dyn VerbsCore<UrdmaDevice>>;

/// One enumerable registered device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub name: String,
    pub id: u32,
    pub gid: Gid,
}

/// Fixed-capacity collection of device records with all-or-nothing bring-up.
///
/// Slots are written only here, during bring-up and teardown. Dispatch never
/// goes through the registry: once registered, the core reaches a device
/// through its own counted handle.
pub struct DeviceRegistry {
    core: Core,
    slots: Vec<Option<Arc<Device<UrdmaDevice>>>>,
}

impl DeviceRegistry {
    /// A registry with `count` empty slots; nothing is live until
    /// [`DeviceRegistry::bring_up`].
    pub fn new(core: Core, count: usize) -> Self {
        Self {
            core,
            slots: (0..count).map(|_| None).collect(),
        }
    }

    /// Bring every slot up in ascending order.
    ///
    /// On any failure the slot at fault is released, every previously live
    /// slot is torn down in reverse order, and the failure is returned.
    /// Either the whole batch is live afterwards or none of it is.
    pub fn bring_up(&mut self) -> Result<()> {
        self.core.ensure_module(COMPANION_MODULE)?;

        for slot in 0..self.slots.len() {
            match self.bring_up_slot(slot) {
                Ok(dev) => self.slots[slot] = Some(dev),
                Err(err) => {
                    warn!("bring-up failed at slot {slot}, rolling back: {err}");
                    self.tear_down();
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    fn bring_up_slot(&self, slot: usize) -> Result<Arc<Device<UrdmaDevice>>> {
        let dev = self
            .core
            .alloc_device(device::base_init(), UrdmaDevice::new(slot as u32))?;
        info!("allocated device for slot {slot}");

        match self.core.register_device(&dev, NAME_TEMPLATE) {
            Ok(name) => {
                info!("registered {name} (slot {slot}, gid {})", dev.ext().gid());
                Ok(dev)
            }
            Err(err) => {
                // `dev` drops here; the record was never visible outside.
                error!("register device failed for slot {slot}");
                Err(err)
            }
        }
    }

    /// Tear down every live slot in reverse creation order. Empty slots are
    /// skipped, so a second teardown is a no-op.
    pub fn tear_down(&mut self) {
        for (slot, entry) in self.slots.iter_mut().enumerate().rev() {
            if let Some(dev) = entry.take() {
                self.core.unregister_device(&dev);
                info!("dealloc device for slot {slot}");
            }
        }
    }

    /// Number of live slots.
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the registered devices, in slot order.
    pub fn devices(&self) -> Vec<DeviceInfo> {
        self.slots
            .iter()
            .flatten()
            .map(|dev| DeviceInfo {
                name: dev.name().unwrap_or_default().to_string(),
                id: dev.ext().id(),
                gid: dev.ext().gid(),
            })
            .collect()
    }

    /// Handle to the device in `slot`, if live.
    pub fn device(&self, slot: usize) -> Option<Arc<Device<UrdmaDevice>>> {
        self.slots.get(slot).and_then(|entry| entry.clone())
    }
}

impl Drop for DeviceRegistry {
    fn drop(&mut self) {
        self.tear_down();
    }
}

static ACTIVE: RwLock<Option<DeviceRegistry>> = RwLock::new(None);

/// Bring the driver up: [`NUM_DEVICES`] devices registered against `core`,
/// all or nothing. Fails while a previous bring-up is still live.
pub fn bring_up(core: Core) -> Result<()> {
    let _ = env_logger::try_init();

    let mut active = ACTIVE.write();
    if active.is_some() {
        return Err(VerbsError::Registration(
            "driver already brought up".to_string(),
        ));
    }
    info!("urdma module loaded");

    let mut registry = DeviceRegistry::new(core, NUM_DEVICES);
    registry.bring_up()?;
    *active = Some(registry);
    Ok(())
}

/// Tear the driver down; a no-op when it is not up.
pub fn tear_down() {
    let mut active = ACTIVE.write();
    if let Some(mut registry) = active.take() {
        info!("urdma module unloaded");
        registry.tear_down();
    }
}

/// Enumerate the registered devices; empty while the driver is down.
pub fn devices() -> Vec<DeviceInfo> {
    ACTIVE
        .read()
        .as_ref()
        .map(DeviceRegistry::devices)
        .unwrap_or_default()
}
