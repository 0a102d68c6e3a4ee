//! Services the generic verbs core renders to a provider.

use crate::error::Result;
use crate::objects::Device;
use crate::ops::DeviceOps;
use crate::types::DeviceInit;
use std::sync::Arc;

/// The registration-facing surface of the generic verbs core.
///
/// The core owns allocation of each device container (base fields plus the
/// provider extension in one block) and holds a counted handle to every
/// registered device until the provider unregisters it; the last handle to
/// drop frees the record. Registration binds the full [`DeviceOps`] table
/// through the `P` bound, so a device is either absent or fully dispatchable.
pub trait VerbsCore<P: DeviceOps>: Send + Sync {
    /// Guarantee a companion subsystem module is loaded. Called before any
    /// registration is attempted.
    fn ensure_module(&self, name: &str) -> Result<()>;

    /// Allocate the owning container for one device.
    fn alloc_device(&self, init: DeviceInit, ext: P) -> Result<Arc<Device<P>>> {
        Ok(Arc::new(Device::new(init, ext)))
    }

    /// Register `dev` under a unique expansion of `name_template` and retain
    /// a handle to it until [`VerbsCore::unregister_device`]. Returns the
    /// assigned name.
    fn register_device(&self, dev: &Arc<Device<P>>, name_template: &str) -> Result<String>;

    /// Release the core's handle to `dev`. Returns only once no caller can
    /// reach the device through the core any more.
    fn unregister_device(&self, dev: &Arc<Device<P>>);
}

/// Expand a `"name%d"` template with a registration index.
pub fn expand_name_template(template: &str, index: usize) -> String {
    template.replace("%d", &index.to_string())
}
