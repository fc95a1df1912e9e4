use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use validator::Validate;

/// Port pool layout: `count` ports named `{prefix}{index}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct PortPoolConfig {
    #[validate(length(min = 1))]
    pub prefix: String,
    #[validate(range(min = 1, max = 4096))]
    pub count: usize,
}

impl Default for PortPoolConfig {
    fn default() -> Self {
        Self {
            prefix: "/dev/ttySIM".to_string(),
            count: 32,
        }
    }
}

/// Allocator for the simulated connection ports
///
/// Always hands out the lowest free index so port names stay stable across
/// add/remove cycles. Not synchronized; the registry guards it with its
/// structural lock.
#[derive(Debug, Clone)]
pub struct PortPool {
    prefix: String,
    capacity: usize,
    free: BTreeSet<usize>,
}

impl PortPool {
    pub fn new(config: &PortPoolConfig) -> Self {
        Self {
            prefix: config.prefix.clone(),
            capacity: config.count,
            free: (0..config.count).collect(),
        }
    }

    /// Take the lowest free port, `None` when exhausted
    pub fn allocate(&mut self) -> Option<String> {
        let index = self.free.pop_first()?;
        Some(self.name(index))
    }

    /// Return a port to the pool; unknown or already free names are ignored
    pub fn release(&mut self, port: &str) -> bool {
        match self.index_of(port) {
            Some(index) => self.free.insert(index),
            None => false,
        }
    }

    /// Mark every port free again
    pub fn release_all(&mut self) {
        self.free = (0..self.capacity).collect();
    }

    pub fn available(&self) -> usize {
        self.free.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_available(&self, port: &str) -> bool {
        self.index_of(port)
            .map(|index| self.free.contains(&index))
            .unwrap_or(false)
    }

    fn name(&self, index: usize) -> String {
        format!("{}{}", self.prefix, index)
    }

    fn index_of(&self, port: &str) -> Option<usize> {
        port.strip_prefix(self.prefix.as_str())?
            .parse::<usize>()
            .ok()
            .filter(|index| *index < self.capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(count: usize) -> PortPool {
        PortPool::new(&PortPoolConfig {
            prefix: "COM".to_string(),
            count,
        })
    }

    #[test]
    fn test_allocates_lowest_free_port() {
        let mut pool = pool(3);
        assert_eq!(pool.allocate().as_deref(), Some("COM0"));
        assert_eq!(pool.allocate().as_deref(), Some("COM1"));
        assert!(pool.release("COM0"));
        assert_eq!(pool.allocate().as_deref(), Some("COM0"));
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_exhaustion() {
        let mut pool = pool(2);
        assert!(pool.allocate().is_some());
        assert!(pool.allocate().is_some());
        assert!(pool.allocate().is_none());
    }

    #[test]
    fn test_release_ignores_foreign_and_free_ports() {
        let mut pool = pool(2);
        assert!(!pool.release("COM0"));
        assert!(!pool.release("COM9"));
        assert!(!pool.release("/dev/ttyUSB0"));
        assert!(!pool.release("COMx"));
        assert_eq!(pool.available(), 2);
    }

    #[test]
    fn test_release_all() {
        let mut pool = pool(4);
        while pool.allocate().is_some() {}
        assert_eq!(pool.available(), 0);
        pool.release_all();
        assert_eq!(pool.available(), pool.capacity());
        assert!(pool.is_available("COM3"));
    }

    #[test]
    fn test_config_validation() {
        assert!(PortPoolConfig::default().validate().is_ok());
        let empty = PortPoolConfig {
            prefix: String::new(),
            count: 0,
        };
        assert!(empty.validate().is_err());
    }
}
