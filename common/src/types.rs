use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 设备信息
///
/// 由设备端上报，注册中心只关心 `udid`、`ip`、连接计数与占用标记，
/// 其余字段原样保存。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// 设备唯一标识
    pub udid: String,
    /// 资产编号，例如 HIH-PHO-1122
    pub property_id: String,
    /// ro.build.version.release
    pub version: String,
    /// ro.serialno
    pub serial: String,
    /// ro.product.brand
    pub brand: String,
    /// ro.product.model
    pub model: String,
    /// persist.sys.wifi.mac
    pub hwaddr: String,
    pub ip: String,
    pub sdk: u32,
    pub agent_version: String,
    pub display: Option<Display>,
    pub battery: Option<Battery>,
    /// /proc/meminfo
    pub memory: Option<MemoryInfo>,
    /// /proc/cpuinfo
    pub cpu: Option<CpuInfo>,
    pub product: Option<Product>,

    /// 设备重连时会大于 1
    #[serde(skip)]
    pub connection_count: u32,
    /// 空字符串表示未被占用
    pub reserved: String,
    #[serde(skip)]
    pub created_at: Option<DateTime<Utc>>,
    pub presence_changed_at: Option<DateTime<Utc>>,

    pub ready: Option<bool>,
    pub present: Option<bool>,
    pub using: Option<bool>,
}

impl DeviceInfo {
    pub fn new(udid: impl Into<String>, ip: impl Into<String>) -> Self {
        Self {
            udid: udid.into(),
            ip: ip.into(),
            ..Default::default()
        }
    }

    pub fn is_reserved(&self) -> bool {
        !self.reserved.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Display {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Battery {
    pub ac_powered: bool,
    pub usb_powered: bool,
    pub wireless_powered: bool,
    pub status: u32,
    pub health: u32,
    pub present: bool,
    pub level: u32,
    pub scale: u32,
    pub voltage: i32,
    pub temperature: i32,
    pub technology: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuInfo {
    pub cores: u32,
    pub hardware: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryInfo {
    /// 单位 kB
    pub total: u64,
    pub around: String,
}

/// 机型信息
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub brand: String,
    pub model: String,
    pub name: String,
    pub coverage: f32,
    pub gpu: String,
    pub cpu: String,
}
