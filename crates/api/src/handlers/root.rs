use serde::Serialize;

use crate::envelope::ok;
use crate::handlers::ApiResult;

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub name: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
}

pub async fn index() -> ApiResult<ServiceInfo> {
    Ok(ok(ServiceInfo {
        name: "market",
        version: env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn health() -> ApiResult<Health> {
    Ok(ok(Health { status: "ok" }))
}
