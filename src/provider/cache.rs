//! 地址缓存
//!
//! 以 (设备标识, 派生路径) 为键。只在设备断开或显式重置时清除，没有按路径或时间的过期。

use crate::hardware::device::DeviceId;
use crate::hardware::path::DerivationPath;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Default)]
pub struct AccountCache {
    entries: RwLock<HashMap<(DeviceId, DerivationPath), String>>,
}

impl AccountCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, device_id: &DeviceId, path: &DerivationPath) -> Option<String> {
        self.entries
            .read()
            .get(&(device_id.clone(), path.clone()))
            .cloned()
    }

    pub fn put(&self, device_id: &DeviceId, path: &DerivationPath, address: String) {
        self.entries
            .write()
            .insert((device_id.clone(), path.clone()), address);
    }

    /// 清除某个设备的全部条目，返回清除数量
    pub fn invalidate(&self, device_id: &DeviceId) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(id, _), _| id != device_id);
        let removed = before - entries.len();
        if removed > 0 {
            debug!("invalidated {} cached account(s) for {}", removed, device_id);
        }
        removed
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_are_scoped_by_device() {
        let cache = AccountCache::new();
        let path = DerivationPath::ethereum(0);
        cache.put(&DeviceId::new("a"), &path, "0xaaa".into());

        assert_eq!(cache.get(&DeviceId::new("a"), &path).as_deref(), Some("0xaaa"));
        assert_eq!(cache.get(&DeviceId::new("b"), &path), None);
        assert_eq!(cache.get(&DeviceId::new("a"), &DerivationPath::ethereum(1)), None);
    }

    #[test]
    fn test_invalidate_only_touches_one_device() {
        let cache = AccountCache::new();
        for index in 0..3 {
            cache.put(&DeviceId::new("a"), &DerivationPath::ethereum(index), format!("a{}", index));
        }
        cache.put(&DeviceId::new("b"), &DerivationPath::ethereum(0), "b0".into());

        assert_eq!(cache.invalidate(&DeviceId::new("a")), 3);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.invalidate(&DeviceId::new("a")), 0);

        cache.clear();
        assert!(cache.is_empty());
    }
}
