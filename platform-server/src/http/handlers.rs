use crate::device::HostsManager;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use common::{DeviceInfo, RegistryError};
use serde::{ser, Deserialize, Serialize, Serializer};
use serde_json::Value;
use tracing::warn;

type ApiError = (StatusCode, Json<ApiResponse<()>>);

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    status: String,
    data: Option<T>,
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self {
            status: "success".to_string(),
            data: Some(data),
            error: None,
        }
    }

    fn error(message: String) -> ApiResponse<()> {
        ApiResponse {
            status: "error".to_string(),
            data: None,
            error: Some(message),
        }
    }
}

/// 接口返回的设备信息，省略空字符串、空值和零值字段
///
/// `DeviceInfo` 同时用于 bincode 线上格式，字段不能按值跳过，
/// 因此在接口层单独裁剪。
#[derive(Debug)]
pub struct ApiDevice(pub DeviceInfo);

impl Serialize for ApiDevice {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut value = serde_json::to_value(&self.0).map_err(<S::Error as ser::Error>::custom)?;
        if let Value::Object(fields) = &mut value {
            fields.retain(|_, field| !is_empty_value(field));
        }
        value.serialize(serializer)
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        _ => false,
    }
}

fn registry_error(err: RegistryError) -> ApiError {
    let status = match err {
        RegistryError::DeviceNotFound(_) => StatusCode::NOT_FOUND,
        RegistryError::AlreadyReserved(_) => StatusCode::CONFLICT,
        RegistryError::NotHolder(_) => StatusCode::FORBIDDEN,
        RegistryError::InvalidHolder => StatusCode::BAD_REQUEST,
    };
    warn!("Reservation request failed: {}", err);
    (status, Json(ApiResponse::<()>::error(err.to_string())))
}

/// 健康检查
pub async fn health_check() -> Json<ApiResponse<String>> {
    Json(ApiResponse::success("OK".to_string()))
}

/// 获取设备列表
pub async fn get_devices(State(hosts): State<HostsManager>) -> Json<ApiResponse<Vec<ApiDevice>>> {
    let devices = hosts.list().into_iter().map(ApiDevice).collect();
    Json(ApiResponse::success(devices))
}

/// 获取设备详情，`query` 为 udid 或 `ip:<地址>`
pub async fn get_device_detail(
    Path(query): Path<String>,
    State(hosts): State<HostsManager>,
) -> Result<Json<ApiResponse<ApiDevice>>, StatusCode> {
    hosts
        .lookup(&query)
        .map(|device| Json(ApiResponse::success(ApiDevice(device))))
        .ok_or(StatusCode::NOT_FOUND)
}

#[derive(Debug, Default, Deserialize)]
pub struct ReserveRequest {
    holder: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReleaseParams {
    holder: Option<String>,
}

/// 占用设备
pub async fn reserve_device(
    Path(query): Path<String>,
    State(hosts): State<HostsManager>,
    body: Option<Json<ReserveRequest>>,
) -> Result<Json<ApiResponse<ApiDevice>>, ApiError> {
    let holder = body.and_then(|Json(request)| request.holder);
    let result = match holder {
        Some(holder) => hosts.acquire_as(&query, &holder),
        None => hosts.acquire(&query),
    };
    let device = result.map_err(registry_error)?;

    Ok(Json(ApiResponse::success(ApiDevice(device))))
}

/// 释放设备
pub async fn release_device(
    Path(query): Path<String>,
    Query(params): Query<ReleaseParams>,
    State(hosts): State<HostsManager>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let result = match params.holder {
        Some(holder) => hosts.release_as(&query, &holder),
        None => hosts.release(&query),
    };
    result.map_err(registry_error)?;

    Ok(Json(ApiResponse::success(())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hosts_with(udid: &str, ip: &str) -> HostsManager {
        let hosts = HostsManager::new();
        hosts.add_from_device_info(DeviceInfo::new(udid, ip));
        hosts
    }

    #[tokio::test]
    async fn test_health_check() {
        let result = health_check().await;
        assert_eq!(result.0.status, "success");
    }

    #[tokio::test]
    async fn test_get_devices() {
        let hosts = hosts_with("u1", "10.0.0.1");
        hosts.add_from_device_info(DeviceInfo::new("u2", "10.0.0.2"));

        let result = get_devices(State(hosts)).await;
        assert_eq!(result.0.data.as_ref().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_get_device_detail() {
        let hosts = hosts_with("u1", "10.0.0.1");

        let result = get_device_detail(Path("ip:10.0.0.1".to_string()), State(hosts.clone())).await;
        assert_eq!(result.unwrap().0.data.unwrap().0.udid, "u1");

        let result = get_device_detail(Path("u9".to_string()), State(hosts)).await;
        assert_eq!(result.unwrap_err(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_reserve_and_release() {
        let hosts = hosts_with("u1", "10.0.0.1");

        let result = reserve_device(Path("u1".to_string()), State(hosts.clone()), None).await;
        assert!(result.unwrap().0.data.unwrap().0.is_reserved());

        let result = reserve_device(Path("u1".to_string()), State(hosts.clone()), None).await;
        let (status, body) = result.unwrap_err();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.0.status, "error");

        let result = release_device(
            Path("u1".to_string()),
            Query(ReleaseParams::default()),
            State(hosts.clone()),
        )
        .await;
        assert!(result.is_ok());
        assert!(!hosts.from_udid("u1").unwrap().is_reserved());
    }

    #[tokio::test]
    async fn test_reserve_with_holder() {
        let hosts = hosts_with("u1", "10.0.0.1");
        let body = Json(ReserveRequest {
            holder: Some("alice".to_string()),
        });

        let result = reserve_device(Path("ip:10.0.0.1".to_string()), State(hosts.clone()), Some(body)).await;
        let reserved = result.unwrap().0.data.unwrap().0;
        assert_eq!(reserved.udid, "u1");
        assert_eq!(reserved.reserved, "alice");
        assert_eq!(hosts.from_udid("u1").unwrap().reserved, "alice");

        let result = release_device(
            Path("u1".to_string()),
            Query(ReleaseParams {
                holder: Some("bob".to_string()),
            }),
            State(hosts.clone()),
        )
        .await;
        assert_eq!(result.unwrap_err().0, StatusCode::FORBIDDEN);

        let result = release_device(
            Path("u1".to_string()),
            Query(ReleaseParams {
                holder: Some("alice".to_string()),
            }),
            State(hosts.clone()),
        )
        .await;
        assert!(result.is_ok());
    }

    #[test]
    fn test_device_json_omits_empty_fields() {
        let mut device = DeviceInfo::new("u1", "10.0.0.1");
        device.brand = "Xiaomi".to_string();
        device.ready = Some(false);

        let value = serde_json::to_value(ApiDevice(device.clone())).unwrap();
        assert_eq!(value["udid"], "u1");
        assert_eq!(value["brand"], "Xiaomi");
        assert_eq!(value["ready"], false);
        for omitted in ["reserved", "model", "sdk", "display", "present"] {
            assert!(value.get(omitted).is_none(), "{} should be omitted", omitted);
        }

        device.reserved = "alice".to_string();
        device.sdk = 33;
        let value = serde_json::to_value(ApiDevice(device)).unwrap();
        assert_eq!(value["reserved"], "alice");
        assert_eq!(value["sdk"], 33);
    }

    #[tokio::test]
    async fn test_reserve_errors() {
        let hosts = hosts_with("u1", "10.0.0.1");

        let result = reserve_device(Path("u9".to_string()), State(hosts.clone()), None).await;
        assert_eq!(result.unwrap_err().0, StatusCode::NOT_FOUND);

        let body = Json(ReserveRequest {
            holder: Some(String::new()),
        });
        let result = reserve_device(Path("u1".to_string()), State(hosts.clone()), Some(body)).await;
        assert_eq!(result.unwrap_err().0, StatusCode::BAD_REQUEST);

        let result = release_device(
            Path("ip:10.9.9.9".to_string()),
            Query(ReleaseParams::default()),
            State(hosts),
        )
        .await;
        assert_eq!(result.unwrap_err().0, StatusCode::NOT_FOUND);
    }
}
