//! HTTP request handlers for the catalog REST surface.
//!
//! Thin glue over the catalog boundary: parse the kind segment and the
//! filters, delegate, and let the shared error type map failures to status
//! codes.

use actix_web::{web, HttpResponse};
use chrono::Utc;
use common::{EntityKind, EntityStatus, Result};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::registry::{Catalog, ListFilter};

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub type_tag: Option<String>,
}

pub async fn register(
    catalog: web::Data<Catalog>,
    kind: web::Path<String>,
    payload: web::Json<Value>,
) -> Result<HttpResponse> {
    let kind: EntityKind = kind.parse()?;
    let record = catalog.register(kind, payload.into_inner())?;
    Ok(HttpResponse::Created().json(record))
}

pub async fn heartbeat(
    catalog: web::Data<Catalog>,
    path: web::Path<(String, String)>,
    payload: Option<web::Json<Value>>,
) -> Result<HttpResponse> {
    let (kind, id) = path.into_inner();
    let kind: EntityKind = kind.parse()?;
    let partial = payload.map(web::Json::into_inner).unwrap_or(Value::Null);
    let record = catalog.heartbeat(kind, &id, partial)?;
    Ok(HttpResponse::Ok().json(record))
}

pub async fn get(
    catalog: web::Data<Catalog>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse> {
    let (kind, id) = path.into_inner();
    let kind: EntityKind = kind.parse()?;
    Ok(HttpResponse::Ok().json(catalog.get(kind, &id)?))
}

pub async fn list(
    catalog: web::Data<Catalog>,
    kind: web::Path<String>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse> {
    let kind: EntityKind = kind.parse()?;
    let query = query.into_inner();
    let filter = ListFilter {
        type_tag: query.type_tag,
        status: query.status.as_deref().map(str::parse::<EntityStatus>).transpose()?,
    };
    Ok(HttpResponse::Ok().json(catalog.list(kind, &filter)?))
}

pub async fn deregister(
    catalog: web::Data<Catalog>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse> {
    let (kind, id) = path.into_inner();
    let kind: EntityKind = kind.parse()?;
    catalog.deregister(kind, &id)?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn get_status(catalog: web::Data<Catalog>) -> HttpResponse {
    let now = Utc::now();
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "instance_id": catalog.instance_id(),
        "timestamp": now.timestamp(),
        "uptime_seconds": (now - catalog.started_at()).num_seconds(),
        "devices": catalog.devices().len(),
        "services": catalog.services().len(),
    }))
}
