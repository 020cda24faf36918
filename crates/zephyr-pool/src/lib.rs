//! Warm microVM pool: supplies a pre-booted execution sandbox with
//! bounded latency and bounded resource use.

pub mod fakes;
pub mod pool;

pub use pool::{PoolConfig, PoolState, PooledVm, WarmPool};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FakeHypervisorDriver, FakeNetworkAllocator};
    use std::sync::Arc;
    use std::time::Duration;
    use zephyr_core::metrics::InMemoryMetricsSink;
    use zephyr_core::Error;

    fn config(min_idle: usize, max_idle: usize, max_total: usize) -> PoolConfig {
        PoolConfig {
            min_idle,
            max_idle,
            max_total,
            max_idle_time: Duration::from_secs(600),
            health_check_interval: Duration::from_secs(3600),
            kernel: "vmlinux".to_string(),
            rootfs: "rootfs.ext4".to_string(),
            cpu: 1,
            memory_mb: 256,
        }
    }

    fn build_pool(min_idle: usize, max_idle: usize, max_total: usize) -> WarmPool {
        WarmPool::new(
            config(min_idle, max_idle, max_total),
            Arc::new(FakeHypervisorDriver::default()),
            Arc::new(FakeNetworkAllocator::default()),
            Arc::new(InMemoryMetricsSink::default()),
        )
    }

    #[tokio::test]
    async fn start_replenishes_to_min_idle() {
        let pool = build_pool(2, 3, 4);
        pool.start().await.unwrap();
        assert_eq!(pool.idle_count().await, 2);
        pool.stop().await;
    }

    #[tokio::test]
    async fn acquire_exhausts_at_max_total() {
        let pool = build_pool(2, 3, 4);
        pool.start().await.unwrap();

        for _ in 0..4 {
            pool.acquire().await.unwrap();
        }
        let err = pool.acquire().await.unwrap_err();
        assert!(matches!(err, Error::PoolExhausted));

        pool.stop().await;
    }

    #[tokio::test]
    async fn warm_pool_cycling_scenario() {
        // minIdle=2, maxIdle=3, maxTotal=4.
        let pool = build_pool(2, 3, 4);
        pool.start().await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..4 {
            handles.push(pool.acquire().await.unwrap());
        }
        assert_eq!(pool.idle_count().await, 0);
        assert_eq!(pool.in_use_count().await, 4);
        assert!(matches!(pool.acquire().await.unwrap_err(), Error::PoolExhausted));

        // Release 1 without destroy -> idle=1, inUse=3.
        pool.release(&handles[0].0.id, false).await.unwrap();
        assert_eq!(pool.idle_count().await, 1);
        assert_eq!(pool.in_use_count().await, 3);

        // Release 2 more -> idle=3, inUse=1.
        pool.release(&handles[1].0.id, false).await.unwrap();
        pool.release(&handles[2].0.id, false).await.unwrap();
        assert_eq!(pool.idle_count().await, 3);
        assert_eq!(pool.in_use_count().await, 1);

        // Release the last: idle is already at maxIdle, so this one is
        // destroyed rather than returned to idle.
        pool.release(&handles[3].0.id, false).await.unwrap();
        assert_eq!(pool.idle_count().await, 3);
        assert_eq!(pool.in_use_count().await, 0);

        pool.stop().await;
    }

    #[tokio::test]
    async fn release_with_destroy_flag_always_destroys() {
        let pool = build_pool(0, 2, 2);
        pool.start().await.unwrap();
        let (handle, _) = pool.acquire().await.unwrap();
        pool.release(&handle.id, true).await.unwrap();
        assert_eq!(pool.idle_count().await, 0);
        pool.stop().await;
    }
}
