//! Deterministic fakes for exercising the pool without a real
//! hypervisor or network stack.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use zephyr_core::hypervisor::{HypervisorDriver, NetworkAllocator, VmConfig, VmHandle, VmNetwork};
use zephyr_core::Result;

#[derive(Default)]
pub struct FakeHypervisorDriver {
    next_id: AtomicU64,
    pub created: Mutex<Vec<String>>,
    pub destroyed: Mutex<Vec<String>>,
}

#[async_trait]
impl HypervisorDriver for FakeHypervisorDriver {
    async fn create(&self, _config: &VmConfig) -> Result<VmHandle> {
        let id = format!("vm-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.created.lock().unwrap().push(id.clone());
        Ok(VmHandle { id })
    }

    async fn start(&self, _handle: &VmHandle) -> Result<()> {
        Ok(())
    }

    async fn destroy(&self, handle: &VmHandle) -> Result<()> {
        self.destroyed.lock().unwrap().push(handle.id.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeNetworkAllocator {
    pub released: Mutex<Vec<String>>,
}

#[async_trait]
impl NetworkAllocator for FakeNetworkAllocator {
    async fn allocate(&self, index: u64) -> Result<VmNetwork> {
        Ok(VmNetwork {
            tap_device: format!("tap{index}"),
            guest_mac: format!("02:00:00:00:00:{index:02x}"),
            guest_ip: format!("10.0.{index}.2"),
            gateway_ip: format!("10.0.{index}.1"),
            nat_interface: None,
        })
    }

    async fn release(&self, network: &VmNetwork) -> Result<()> {
        self.released.lock().unwrap().push(network.tap_device.clone());
        Ok(())
    }
}
