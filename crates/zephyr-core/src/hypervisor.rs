//! The hypervisor control-plane contract.
//!
//! The low-level microVM hypervisor is treated as an external
//! collaborator behind a small `async_trait` interface — create, start,
//! destroy — rather than a concrete dependency. `zephyr-pool` drives this
//! trait to keep a warm pool of VMs; the binary that wires the pool
//! together supplies a real driver, and tests supply a deterministic
//! fake (`zephyr-pool`'s `FakeHypervisorDriver`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A guest network allocation: TAP device, guest MAC, /30 subnet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmNetwork {
    pub tap_device: String,
    pub guest_mac: String,
    pub guest_ip: String,
    pub gateway_ip: String,
    pub nat_interface: Option<String>,
}

/// Trait for allocating and releasing the network resources a VM needs.
#[async_trait]
pub trait NetworkAllocator: Send + Sync {
    async fn allocate(&self, index: u64) -> Result<VmNetwork>;
    async fn release(&self, network: &VmNetwork) -> Result<()>;
}

/// The composed configuration handed to the hypervisor driver to boot a
/// microVM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmConfig {
    pub kernel: String,
    pub rootfs: String,
    pub cpu: u32,
    pub memory_mb: u32,
    pub net: VmNetwork,
}

/// Opaque handle to a booted VM, returned by `create`/`start` and
/// required by `destroy`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmHandle {
    pub id: String,
}

/// Trait for the hypervisor control plane: create, start, destroy.
#[async_trait]
pub trait HypervisorDriver: Send + Sync {
    async fn create(&self, config: &VmConfig) -> Result<VmHandle>;
    async fn start(&self, handle: &VmHandle) -> Result<()>;
    async fn destroy(&self, handle: &VmHandle) -> Result<()>;
}
