use chrono::Utc;
use common::{DeviceInfo, RegistryError};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// 以 IP 查询设备时使用的前缀，例如 `ip:10.0.0.1`
pub const IP_PREFIX: &str = "ip:";

/// 未指定占用者时使用的默认占用标记
pub const DEFAULT_HOLDER: &str = "platform";

type RegistryResult<T> = std::result::Result<T, RegistryError>;

/// 在线设备注册中心
///
/// 以 udid 为键保存设备信息，并维护连接计数与占用标记。
/// 所有修改都在对应条目的独占锁内完成，查询返回快照。
#[derive(Clone, Default)]
pub struct HostsManager {
    hosts: Arc<DashMap<String, DeviceInfo>>,
}

impl HostsManager {
    pub fn new() -> Self {
        Self {
            hosts: Arc::new(DashMap::new()),
        }
    }

    /// 按 `ip:` 前缀分派到 IP 查询，否则按 udid 查询
    pub fn lookup(&self, query: &str) -> Option<DeviceInfo> {
        match query.strip_prefix(IP_PREFIX) {
            Some(ip) => self.from_ip(ip),
            None => self.from_udid(query),
        }
    }

    /// 线性扫描，返回第一个 IP 匹配的设备
    pub fn from_ip(&self, ip: &str) -> Option<DeviceInfo> {
        self.hosts
            .iter()
            .find(|entry| entry.value().ip == ip)
            .map(|entry| entry.value().clone())
    }

    pub fn from_udid(&self, udid: &str) -> Option<DeviceInfo> {
        self.hosts.get(udid).map(|entry| entry.value().clone())
    }

    /// 设备上线
    ///
    /// 已存在的设备只更新 IP 并增加连接计数，其余字段保持不变；
    /// 新设备以连接计数 1 插入。返回当前连接计数。
    pub fn add_from_device_info(&self, mut device: DeviceInfo) -> u32 {
        match self.hosts.entry(device.udid.clone()) {
            Entry::Occupied(mut entry) => {
                let info = entry.get_mut();
                info.ip = device.ip;
                info.connection_count += 1;
                debug!(
                    "Device {} reconnected from {}, connections: {}",
                    info.udid, info.ip, info.connection_count
                );
                info.connection_count
            }
            Entry::Vacant(entry) => {
                let now = Utc::now();
                device.connection_count = 1;
                device.created_at.get_or_insert(now);
                device.presence_changed_at = Some(now);
                info!("Registering device: {} ({})", device.udid, device.ip);
                entry.insert(device);
                1
            }
        }
    }

    /// 设备断开
    ///
    /// 连接计数减一，归零时立即移除。未知设备忽略。
    pub fn remove(&self, udid: &str) {
        if let Entry::Occupied(mut entry) = self.hosts.entry(udid.to_string()) {
            let remaining = {
                let info = entry.get_mut();
                info.connection_count = info.connection_count.saturating_sub(1);
                info.connection_count
            };

            if remaining == 0 {
                entry.remove();
                info!("Unregistering device: {}", udid);
            } else {
                debug!("Device {} disconnected, connections: {}", udid, remaining);
            }
        }
    }

    /// 用设备重新上报的信息刷新已注册设备
    ///
    /// 连接计数、占用标记和时间戳保持不变。设备未注册时返回 `false`。
    pub fn refresh(&self, mut device: DeviceInfo) -> bool {
        match self.hosts.get_mut(&device.udid) {
            Some(mut entry) => {
                let current = entry.value_mut();
                device.connection_count = current.connection_count;
                device.reserved = std::mem::take(&mut current.reserved);
                device.created_at = current.created_at;
                device.presence_changed_at = current.presence_changed_at;
                *current = device;
                true
            }
            None => false,
        }
    }

    pub fn acquire(&self, query: &str) -> RegistryResult<DeviceInfo> {
        self.acquire_as(query, DEFAULT_HOLDER)
    }

    /// 以指定占用者独占设备，返回占用成功时的设备快照
    pub fn acquire_as(&self, query: &str, holder: &str) -> RegistryResult<DeviceInfo> {
        if holder.is_empty() {
            return Err(RegistryError::InvalidHolder);
        }

        self.update(query, |info| {
            if info.is_reserved() {
                return Err(RegistryError::AlreadyReserved(info.udid.clone()));
            }
            info.reserved = holder.to_string();
            info!("Device {} reserved by {}", info.udid, holder);
            Ok(info.clone())
        })
    }

    /// 无条件释放设备，未被占用时同样成功
    pub fn release(&self, query: &str) -> RegistryResult<()> {
        self.update(query, |info| {
            if info.is_reserved() {
                info!("Device {} released", info.udid);
            }
            info.reserved.clear();
            Ok(())
        })
    }

    /// 只有当前占用者可以释放设备
    pub fn release_as(&self, query: &str, holder: &str) -> RegistryResult<()> {
        if holder.is_empty() {
            return Err(RegistryError::InvalidHolder);
        }

        self.update(query, |info| {
            if info.is_reserved() && info.reserved != holder {
                return Err(RegistryError::NotHolder(info.udid.clone()));
            }
            if info.is_reserved() {
                info!("Device {} released by {}", info.udid, holder);
            }
            info.reserved.clear();
            Ok(())
        })
    }

    /// 获取所有设备，按 udid 排序
    pub fn list(&self) -> Vec<DeviceInfo> {
        let mut devices: Vec<DeviceInfo> = self
            .hosts
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        devices.sort_by(|a, b| a.udid.cmp(&b.udid));
        devices
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// 在条目锁内解析查询并修改设备
    fn update<R>(
        &self,
        query: &str,
        f: impl FnOnce(&mut DeviceInfo) -> RegistryResult<R>,
    ) -> RegistryResult<R> {
        let not_found = || RegistryError::DeviceNotFound(query.to_string());

        let mut entry = match query.strip_prefix(IP_PREFIX) {
            Some(ip) => {
                let udid = self.udid_by_ip(ip).ok_or_else(not_found)?;
                // 扫描与加锁之间设备可能已换 IP
                self.hosts
                    .get_mut(&udid)
                    .filter(|entry| entry.ip == ip)
                    .ok_or_else(not_found)?
            }
            None => self.hosts.get_mut(query).ok_or_else(not_found)?,
        };

        f(entry.value_mut())
    }

    fn udid_by_ip(&self, ip: &str) -> Option<String> {
        self.hosts
            .iter()
            .find(|entry| entry.value().ip == ip)
            .map(|entry| entry.key().clone())
    }
}
