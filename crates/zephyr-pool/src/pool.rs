//! The warm microVM pool: amortises VM boot latency by keeping a cache
//! of idle, pre-booted sandboxes between `minIdle` and `maxIdle`,
//! bounded overall by `maxTotal`.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use zephyr_core::hypervisor::{HypervisorDriver, NetworkAllocator, VmConfig, VmHandle, VmNetwork};
use zephyr_core::metrics::MetricsSink;
use zephyr_core::{Error, Result};

/// Bounds on pool size and VM idleness.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub min_idle: usize,
    pub max_idle: usize,
    pub max_total: usize,
    pub max_idle_time: Duration,
    pub health_check_interval: Duration,
    pub kernel: String,
    pub rootfs: String,
    pub cpu: u32,
    pub memory_mb: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// A VM owned by the pool, either idle or checked out.
#[derive(Debug, Clone)]
pub struct PooledVm {
    pub handle: VmHandle,
    pub network: VmNetwork,
    pub index: u64,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    pub use_count: u64,
}

struct Inner {
    config: PoolConfig,
    hypervisor: Arc<dyn HypervisorDriver>,
    network: Arc<dyn NetworkAllocator>,
    metrics: Arc<dyn MetricsSink>,
    state: Mutex<PoolState>,
    idle: Mutex<VecDeque<PooledVm>>,
    in_use: Mutex<HashMap<String, PooledVm>>,
    next_index: AtomicU64,
    replenishing: AtomicBool,
    health_task: Mutex<Option<JoinHandle<()>>>,
}

/// The warm pool. Cheaply cloneable; clones share the same underlying
/// state, so the health-check task and callers observe one pool.
#[derive(Clone)]
pub struct WarmPool {
    inner: Arc<Inner>,
}

impl WarmPool {
    pub fn new(
        config: PoolConfig,
        hypervisor: Arc<dyn HypervisorDriver>,
        network: Arc<dyn NetworkAllocator>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                hypervisor,
                network,
                metrics,
                state: Mutex::new(PoolState::Stopped),
                idle: Mutex::new(VecDeque::new()),
                in_use: Mutex::new(HashMap::new()),
                next_index: AtomicU64::new(0),
                replenishing: AtomicBool::new(false),
                health_task: Mutex::new(None),
            }),
        }
    }

    pub async fn state(&self) -> PoolState {
        *self.inner.state.lock().await
    }

    pub async fn idle_count(&self) -> usize {
        self.inner.idle.lock().await.len()
    }

    pub async fn in_use_count(&self) -> usize {
        self.inner.in_use.lock().await.len()
    }

    /// `stopped -> starting`, replenish to `minIdle`, start the
    /// health-check timer, `starting -> running`.
    pub async fn start(&self) -> Result<()> {
        {
            let mut state = self.inner.state.lock().await;
            *state = PoolState::Starting;
        }

        self.replenish().await;

        let pool = self.clone();
        let interval = self.inner.config.health_check_interval;
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if pool.state().await != PoolState::Running {
                    break;
                }
                pool.health_check().await;
            }
        });
        *self.inner.health_task.lock().await = Some(task);

        *self.inner.state.lock().await = PoolState::Running;
        info!(min_idle = self.inner.config.min_idle, "warm pool started");
        Ok(())
    }

    /// Check out a VM: an idle one if available, otherwise a freshly
    /// created one if under `maxTotal`, otherwise `PoolExhausted`.
    pub async fn acquire(&self) -> Result<(VmHandle, VmNetwork)> {
        if self.state().await != PoolState::Running {
            return Err(Error::PoolExhausted);
        }

        let popped = { self.inner.idle.lock().await.pop_front() };
        if let Some(mut vm) = popped {
            vm.use_count += 1;
            vm.last_used_at = Utc::now();
            let result = (vm.handle.clone(), vm.network.clone());
            self.inner.in_use.lock().await.insert(vm.handle.id.clone(), vm);

            let pool = self.clone();
            tokio::spawn(async move { pool.replenish().await });

            return Ok(result);
        }

        let total = {
            let idle = self.inner.idle.lock().await.len();
            let in_use = self.inner.in_use.lock().await.len();
            idle + in_use
        };
        if total >= self.inner.config.max_total {
            return Err(Error::PoolExhausted);
        }

        let vm = self.create_vm().await?;
        let result = (vm.handle.clone(), vm.network.clone());
        self.inner.in_use.lock().await.insert(vm.handle.id.clone(), vm);
        Ok(result)
    }

    /// Release a checked-out VM back to the pool, or destroy it
    /// outright when `destroy` is set or the idle cache is already
    /// full.
    pub async fn release(&self, id: &str, destroy: bool) -> Result<()> {
        let mut vm = self
            .inner
            .in_use
            .lock()
            .await
            .remove(id)
            .ok_or_else(|| Error::NotFound(format!("vm {id} not checked out")))?;

        let idle_full = self.inner.idle.lock().await.len() >= self.inner.config.max_idle;
        if destroy || idle_full {
            self.destroy_vm(&vm).await;
        } else {
            vm.last_used_at = Utc::now();
            self.inner.idle.lock().await.push_back(vm);
        }
        Ok(())
    }

    /// `running -> stopping`; cancel the health-check timer, await any
    /// in-flight replenish, destroy every VM, `stopping -> stopped`.
    pub async fn stop(&self) {
        *self.inner.state.lock().await = PoolState::Stopping;

        if let Some(task) = self.inner.health_task.lock().await.take() {
            task.abort();
        }
        while self.inner.replenishing.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let idle: Vec<PooledVm> = self.inner.idle.lock().await.drain(..).collect();
        let in_use: Vec<PooledVm> = self.inner.in_use.lock().await.drain().map(|(_, v)| v).collect();
        let destroys = idle.iter().chain(in_use.iter()).map(|vm| self.destroy_vm(vm));
        futures::future::join_all(destroys).await;

        *self.inner.state.lock().await = PoolState::Stopped;
        info!("warm pool stopped");
    }

    /// Create `min(minIdle - |idle|, maxTotal - |idle| - |inUse|)` new
    /// VMs. At most one replenish runs at a time; a scheduled replenish
    /// while one is in flight is a no-op. Creation failures are logged
    /// and do not propagate.
    async fn replenish(&self) {
        if self
            .inner
            .replenishing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let idle = self.inner.idle.lock().await.len();
        let in_use = self.inner.in_use.lock().await.len();
        let to_create = (self.inner.config.min_idle.saturating_sub(idle))
            .min(self.inner.config.max_total.saturating_sub(idle + in_use));

        for _ in 0..to_create {
            match self.create_vm().await {
                Ok(vm) => self.inner.idle.lock().await.push_back(vm),
                Err(err) => warn!(error = %err, "replenish: vm creation failed"),
            }
        }

        self.inner.replenishing.store(false, Ordering::SeqCst);
    }

    /// Walk `idle` in insertion order; destroy any entry past `minIdle`
    /// that has sat longer than `maxIdleTime`, then replenish.
    async fn health_check(&self) {
        let now = Utc::now();
        let expired: Vec<PooledVm> = {
            let mut idle = self.inner.idle.lock().await;
            let min_idle = self.inner.config.min_idle;
            let max_age = self.inner.config.max_idle_time;
            let mut keep = VecDeque::new();
            let mut expired = Vec::new();
            for (position, vm) in idle.drain(..).enumerate() {
                let age = now.signed_duration_since(vm.last_used_at);
                let past_min_idle = position >= min_idle;
                if past_min_idle && age.to_std().unwrap_or(Duration::ZERO) > max_age {
                    expired.push(vm);
                } else {
                    keep.push_back(vm);
                }
            }
            *idle = keep;
            expired
        };

        for vm in &expired {
            debug!(vm = %vm.handle.id, "health check: destroying idle vm past max idle time");
            self.destroy_vm(vm).await;
        }

        self.replenish().await;
    }

    async fn create_vm(&self) -> Result<PooledVm> {
        let index = self.inner.next_index.fetch_add(1, Ordering::SeqCst);
        let network = self.inner.network.allocate(index).await?;
        let config = VmConfig {
            kernel: self.inner.config.kernel.clone(),
            rootfs: self.inner.config.rootfs.clone(),
            cpu: self.inner.config.cpu,
            memory_mb: self.inner.config.memory_mb,
            net: network.clone(),
        };

        let started = std::time::Instant::now();
        let handle = self.inner.hypervisor.create(&config).await?;
        if let Err(err) = self.inner.hypervisor.start(&handle).await {
            let _ = self.inner.network.release(&network).await;
            return Err(err);
        }

        self.inner
            .metrics
            .observe_histogram("vm_boot_duration_seconds", started.elapsed().as_secs_f64(), &[]);

        let now = Utc::now();
        Ok(PooledVm {
            handle,
            network,
            index,
            created_at: now,
            last_used_at: now,
            use_count: 0,
        })
    }

    async fn destroy_vm(&self, vm: &PooledVm) {
        if let Err(err) = self.inner.hypervisor.destroy(&vm.handle).await {
            error!(vm = %vm.handle.id, error = %err, "failed to destroy vm");
        }
        if let Err(err) = self.inner.network.release(&vm.network).await {
            error!(vm = %vm.handle.id, error = %err, "failed to release vm network");
        }
    }
}
