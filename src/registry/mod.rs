//! # Simulator Registry
//!
//! The shared set of simulated meters. One structural lock guards the map and
//! the port pool together, so add/remove/reset never race each other or a
//! concurrent list/get. The lock is only held for the structural change itself;
//! tick tasks are cancelled and joined after it is released.
//!
//! Each running meter owns one [`Ticker`] task. Start/stop on a single meter
//! are serialized through that meter's ticker slot.

pub mod port_pool;
pub mod ticker;

pub use port_pool::{PortPool, PortPoolConfig};
pub use ticker::Ticker;

use futures::future::join_all;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;

use crate::domain::Protocol;
use crate::error::{SimResult, SimulatorError};
use crate::simulation::{
    InstanceSnapshot, PhaseModel, ProfileParams, RngNoise, SimulatorInstance,
};

/// Construction parameters for [`SimulatorRegistry`]
#[derive(Debug, Clone)]
pub struct RegistrySettings {
    pub tick_period: Duration,
    pub random_seed: Option<u64>,
    pub ports: PortPoolConfig,
    pub profile: ProfileParams,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_secs(1),
            random_seed: None,
            ports: PortPoolConfig::default(),
            profile: ProfileParams::default(),
        }
    }
}

enum TickerSlot {
    Idle,
    Running(Ticker),
    /// Meter left the registry; no task may be started for it again
    Retired,
}

struct Entry {
    instance: Arc<SimulatorInstance>,
    ticker: Mutex<TickerSlot>,
}

impl Entry {
    /// Stop the meter and its task; `retire` forbids any later restart
    async fn halt(&self, retire: bool) {
        let mut slot = self.ticker.lock().await;
        self.instance.set_running(false);
        let next = if retire {
            TickerSlot::Retired
        } else {
            TickerSlot::Idle
        };
        if let TickerSlot::Running(ticker) = std::mem::replace(&mut *slot, next) {
            ticker.stop().await;
        }
    }
}

struct RegistryInner {
    entries: IndexMap<String, Arc<Entry>>,
    ports: PortPool,
}

pub struct SimulatorRegistry {
    model: Arc<PhaseModel>,
    tick_period: Duration,
    random_seed: Option<u64>,
    next_seq: AtomicU64,
    inner: RwLock<RegistryInner>,
}

impl Default for SimulatorRegistry {
    fn default() -> Self {
        Self::new(RegistrySettings::default())
    }
}

impl SimulatorRegistry {
    pub fn new(settings: RegistrySettings) -> Self {
        Self {
            model: Arc::new(PhaseModel::new(settings.profile)),
            tick_period: settings.tick_period,
            random_seed: settings.random_seed,
            next_seq: AtomicU64::new(0),
            inner: RwLock::new(RegistryInner {
                entries: IndexMap::new(),
                ports: PortPool::new(&settings.ports),
            }),
        }
    }

    /// Profile constants shared by every meter
    pub fn profile(&self) -> &ProfileParams {
        self.model.params()
    }

    /// Create a stopped meter on the lowest free port
    pub fn add(&self, protocol: Protocol) -> SimResult<Arc<SimulatorInstance>> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let noise = RngNoise::new(self.random_seed.map(|seed| seed.wrapping_add(seq)));

        let mut inner = self.inner.write();
        let capacity = inner.ports.capacity();
        let port = inner.ports.allocate().ok_or_else(|| {
            SimulatorError::ResourceExhausted(format!(
                "all {capacity} simulator ports are in use"
            ))
        })?;

        let instance = Arc::new(SimulatorInstance::create(
            protocol,
            port,
            self.model.clone(),
            Box::new(noise),
        ));
        inner.entries.insert(
            instance.id().to_string(),
            Arc::new(Entry {
                instance: instance.clone(),
                ticker: Mutex::new(TickerSlot::Idle),
            }),
        );

        info!(id = %instance.id(), port = %instance.port(), protocol = %instance.protocol(), "simulator added");
        Ok(instance)
    }

    /// Remove a meter, release its port and join its tick task
    pub async fn remove(&self, id: &str) -> SimResult<()> {
        let entry = {
            let mut inner = self.inner.write();
            let entry = inner
                .entries
                .shift_remove(id)
                .ok_or_else(|| SimulatorError::not_found(id))?;
            inner.ports.release(entry.instance.port());
            entry
        };

        entry.halt(true).await;
        info!(id = %id, port = %entry.instance.port(), "simulator removed");
        Ok(())
    }

    pub fn get(&self, id: &str) -> SimResult<Arc<SimulatorInstance>> {
        self.entry(id).map(|entry| entry.instance.clone())
    }

    /// Snapshots of every meter in creation order
    pub fn list(&self) -> Vec<InstanceSnapshot> {
        let inner = self.inner.read();
        inner
            .entries
            .values()
            .map(|entry| entry.instance.read())
            .collect()
    }

    pub fn available_ports(&self) -> usize {
        self.inner.read().ports.available()
    }

    pub fn is_port_available(&self, port: &str) -> bool {
        self.inner.read().ports.is_available(port)
    }

    /// Start or stop a meter together with its periodic tick task
    pub async fn set_running(&self, id: &str, running: bool) -> SimResult<()> {
        let entry = self.entry(id)?;
        let mut slot = entry.ticker.lock().await;

        if running {
            if matches!(*slot, TickerSlot::Retired) {
                return Err(SimulatorError::not_found(id));
            }
            if matches!(*slot, TickerSlot::Idle) {
                entry.instance.set_running(true);
                *slot = TickerSlot::Running(Ticker::spawn(
                    entry.instance.clone(),
                    self.tick_period,
                ));
                info!(id = %id, "simulation started");
            }
        } else {
            entry.instance.set_running(false);
            if matches!(*slot, TickerSlot::Running(_)) {
                if let TickerSlot::Running(ticker) = std::mem::replace(&mut *slot, TickerSlot::Idle) {
                    ticker.stop().await;
                }
                info!(id = %id, "simulation stopped");
            }
        }
        Ok(())
    }

    /// Drop every meter and free every port; ids are never reused afterwards
    pub async fn reset(&self) {
        let drained: Vec<Arc<Entry>> = {
            let mut inner = self.inner.write();
            inner.ports.release_all();
            inner.entries.drain(..).map(|(_, entry)| entry).collect()
        };

        let count = drained.len();
        join_all(drained.iter().map(|entry| entry.halt(true))).await;
        info!(removed = count, "simulator configuration reset");
    }

    /// Stop every tick task; meters stay registered in the stopped state
    pub async fn shutdown(&self) {
        let entries: Vec<Arc<Entry>> = self.inner.read().entries.values().cloned().collect();
        join_all(entries.iter().map(|entry| entry.halt(false))).await;
        info!(simulators = entries.len(), "simulator registry shut down");
    }

    fn entry(&self, id: &str) -> SimResult<Arc<Entry>> {
        self.inner
            .read()
            .entries
            .get(id)
            .cloned()
            .ok_or_else(|| SimulatorError::not_found(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SimulationType;
    use std::collections::HashSet;

    fn registry_with_ports(count: usize) -> SimulatorRegistry {
        SimulatorRegistry::new(RegistrySettings {
            random_seed: Some(11),
            ports: PortPoolConfig {
                prefix: "COM".to_string(),
                count,
            },
            ..Default::default()
        })
    }

    #[test]
    fn test_add_assigns_fresh_id_and_port() {
        let reg = registry_with_ports(4);
        let a = reg.add(Protocol::ModbusTcp).unwrap();
        let b = reg.add(Protocol::ModbusRtu).unwrap();

        assert_ne!(a.id(), b.id());
        assert_eq!(a.port(), "COM0");
        assert_eq!(b.port(), "COM1");
        assert_eq!(reg.list().len(), 2);
        assert_eq!(reg.available_ports(), 2);
    }

    #[test]
    fn test_add_fails_when_ports_exhausted() {
        let reg = registry_with_ports(1);
        reg.add(Protocol::ModbusTcp).unwrap();
        let err = reg.add(Protocol::ModbusTcp).unwrap_err();
        assert!(matches!(err, SimulatorError::ResourceExhausted(_)));
        assert_eq!(reg.list().len(), 1);
    }

    #[test]
    fn test_list_preserves_creation_order() {
        let reg = registry_with_ports(8);
        let ids: Vec<String> = (0..5)
            .map(|_| reg.add(Protocol::ModbusRtu).unwrap().id().to_string())
            .collect();
        let listed: Vec<String> = reg.list().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, listed);
    }

    #[tokio::test]
    async fn test_add_then_remove_restores_counts() {
        let reg = registry_with_ports(4);
        reg.add(Protocol::ModbusRtu).unwrap();
        let (count, free) = (reg.list().len(), reg.available_ports());

        let inst = reg.add(Protocol::ModbusTcp).unwrap();
        reg.remove(inst.id()).await.unwrap();

        assert_eq!(reg.list().len(), count);
        assert_eq!(reg.available_ports(), free);
        assert!(reg.is_port_available(inst.port()));
    }

    #[tokio::test]
    async fn test_remove_unknown_id() {
        let reg = registry_with_ports(2);
        let err = reg.remove("missing").await.unwrap_err();
        assert_eq!(err, SimulatorError::not_found("missing"));
        assert!(matches!(reg.get("missing"), Err(SimulatorError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_remove_keeps_order_of_remaining() {
        let reg = registry_with_ports(4);
        let a = reg.add(Protocol::ModbusRtu).unwrap();
        let b = reg.add(Protocol::ModbusRtu).unwrap();
        let c = reg.add(Protocol::ModbusRtu).unwrap();
        reg.remove(b.id()).await.unwrap();

        let listed: Vec<String> = reg.list().into_iter().map(|s| s.id).collect();
        assert_eq!(listed, vec![a.id().to_string(), c.id().to_string()]);
    }

    #[tokio::test]
    async fn test_reset_clears_everything_and_never_reuses_ids() {
        let reg = registry_with_ports(3);
        let mut seen = HashSet::new();
        for _ in 0..3 {
            seen.insert(reg.add(Protocol::ModbusTcp).unwrap().id().to_string());
        }
        let running = reg.list()[0].id.clone();
        reg.set_running(&running, true).await.unwrap();

        reg.reset().await;
        assert!(reg.list().is_empty());
        assert_eq!(reg.available_ports(), 3);

        for _ in 0..3 {
            let inst = reg.add(Protocol::ModbusTcp).unwrap();
            assert!(seen.insert(inst.id().to_string()));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_meter_ticks_and_stop_freezes() {
        let reg = registry_with_ports(2);
        let inst = reg.add(Protocol::ModbusTcp).unwrap();
        inst.set_profile(SimulationType::Overload);

        reg.set_running(inst.id(), true).await.unwrap();
        tokio::time::sleep(Duration::from_millis(3_500)).await;
        let ramped = inst.read();
        assert!(ramped.is_running);
        assert!(ramped.current.l1 > 1.0);

        reg.set_running(inst.id(), false).await.unwrap();
        let frozen = inst.read();
        assert!(!frozen.is_running);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(inst.read().readings(), frozen.readings());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_running_is_idempotent() {
        let reg = registry_with_ports(2);
        let inst = reg.add(Protocol::ModbusRtu).unwrap();

        reg.set_running(inst.id(), true).await.unwrap();
        reg.set_running(inst.id(), true).await.unwrap();
        reg.set_running(inst.id(), false).await.unwrap();
        reg.set_running(inst.id(), false).await.unwrap();
        assert!(!inst.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_removed_meter_cannot_restart() {
        let reg = registry_with_ports(2);
        let inst = reg.add(Protocol::ModbusRtu).unwrap();
        reg.set_running(inst.id(), true).await.unwrap();
        reg.remove(inst.id()).await.unwrap();

        assert!(!inst.is_running());
        let err = reg.set_running(inst.id(), true).await.unwrap_err();
        assert!(matches!(err, SimulatorError::NotFound(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_all_meters() {
        let reg = registry_with_ports(3);
        for _ in 0..3 {
            let inst = reg.add(Protocol::ModbusTcp).unwrap();
            reg.set_running(inst.id(), true).await.unwrap();
        }
        reg.shutdown().await;
        assert_eq!(reg.list().len(), 3);
        assert!(reg.list().iter().all(|s| !s.is_running));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_add_remove_keeps_ports_unique() {
        let reg = Arc::new(registry_with_ports(64));
        let mut tasks = Vec::new();
        for _ in 0..16 {
            let reg = reg.clone();
            tasks.push(tokio::spawn(async move {
                for _ in 0..20 {
                    let inst = reg.add(Protocol::ModbusTcp).unwrap();
                    reg.remove(inst.id()).await.unwrap();
                }
                reg.add(Protocol::ModbusRtu).unwrap().port().to_string()
            }));
        }

        let mut ports = HashSet::new();
        for task in tasks {
            assert!(ports.insert(task.await.unwrap()));
        }
        assert_eq!(reg.list().len(), 16);
        assert_eq!(reg.available_ports(), 64 - 16);
    }
}
