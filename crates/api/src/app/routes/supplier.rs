//! Restocking workflow routes: shortlist assembly, review, authorization,
//! receiving, and inventory fusion.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use libram_auth::Permission;
use libram_catalog::BookId;
use libram_core::AggregateId;
use libram_infra::projections::SupplyOrderReadModel;
use libram_invoicing::{confirmation_message, render_invoice_pdf, InvoiceLine, InvoiceOrder};
use libram_supply::{
    AdjustMass, AdjustPayload, DropItem, FuseInventory, LaunchOrder, LiftBook, OrderItemId,
    Receipt, ScanLowStock, ShortlistCandidate, SubmitForReview, SupplyOrder, SupplyOrderCommand,
    SupplyOrderEvent, SupplyOrderId, SupplyOrderStatus,
};
use libram_suppliers::SupplierId;

use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/shortlist", get(shortlist).post(shortlist))
        .route("/lift/:book_id", post(lift_book))
        .route("/drop/:item_id", post(drop_item))
        .route("/adjust_mass/:item_id", post(adjust_mass))
        .route("/submit_review", post(submit_review))
        .route("/review", get(review_view))
        .route("/launch/:order_id", post(launch_order))
        .route("/confirmation/:order_id", get(confirmation))
        .route("/preview_invoice/:order_id", get(preview_invoice))
        .route("/download_invoice/:order_id", get(download_invoice))
        .route("/receive_list", get(receive_list))
        .route("/receive/:order_id", get(receive_view))
        .route("/update_payload/:item_id", post(update_payload))
        .route("/fusion/:order_id", post(fuse_inventory))
}

fn order_view(services: &AppServices, rm: &SupplyOrderReadModel) -> serde_json::Value {
    dto::order_to_json(rm, |book_id| {
        services.books.get(&book_id).map(|b| b.title)
    })
}

/// Post-action location for item edits; the original UI returned to the view
/// matching the order's status.
fn redirect_for(status: SupplyOrderStatus) -> &'static str {
    match status {
        SupplyOrderStatus::PendingReview => "/supplier/review",
        _ => "/supplier/shortlist",
    }
}

fn parse_order_id(id: &str) -> Result<SupplyOrderId, axum::response::Response> {
    id.parse::<AggregateId>().map(SupplyOrderId::new).map_err(|_| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid order id")
    })
}

fn parse_item_id(id: &str) -> Result<OrderItemId, axum::response::Response> {
    id.parse::<AggregateId>().map(OrderItemId::new).map_err(|_| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid item id")
    })
}

/// Snapshot a placed (or completed) order for invoice rendering.
fn invoice_order(
    services: &AppServices,
    rm: &SupplyOrderReadModel,
) -> Result<InvoiceOrder, axum::response::Response> {
    let supplier_id = rm.supplier_id.ok_or_else(|| {
        errors::json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "invariant_violation",
            "order has not been placed with a supplier",
        )
    })?;
    let supplier_name = services
        .suppliers
        .get(&supplier_id)
        .map(|s| s.name)
        .unwrap_or_else(|| supplier_id.to_string());

    Ok(InvoiceOrder {
        order_id: rm.order_id,
        supplier_name,
        lines: rm
            .items
            .iter()
            .map(|i| InvoiceLine {
                title: services
                    .books
                    .get(&i.book_id)
                    .map(|b| b.title)
                    .unwrap_or_else(|| i.book_id.to_string()),
                mass: i.mass,
            })
            .collect(),
    })
}

/// The shortlist is assembled on access: both verbs run the low-stock scan
/// against the singleton shortlist order before rendering it.
pub async fn shortlist(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
) -> axum::response::Response {
    // Check before shortlist_order: an unauthorized request must not create
    // the singleton shortlist as a side effect.
    if let Err(e) = crate::authz::require(&principal, &Permission::new("supply.workflow")) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let order = match services.shortlist_order() {
        Ok(rm) => rm,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    // One pre-allocated item id per low-stock book; the aggregate skips
    // candidates already on the order, discarding their ids.
    let candidates = services
        .books
        .low_stock()
        .into_iter()
        .map(|b| ShortlistCandidate {
            item_id: OrderItemId::new(AggregateId::new()),
            book_id: b.book_id,
        })
        .collect();

    let cmd = SupplyOrderCommand::ScanLowStock(ScanLowStock {
        order_id: order.order_id,
        candidates,
        occurred_at: Utc::now(),
    });
    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("supply.workflow")],
    };
    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    if let Err(e) = services.dispatch::<SupplyOrder>(
        order.order_id.0,
        "supply.order",
        cmd_auth.inner,
        |id| SupplyOrder::empty(SupplyOrderId::new(id)),
    ) {
        return errors::dispatch_error_to_response(e);
    }

    match services.supply_orders.get(&order.order_id) {
        Some(rm) => (StatusCode::OK, Json(order_view(&services, &rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "order not found"),
    }
}

pub async fn lift_book(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(book_id): Path<String>,
) -> axum::response::Response {
    let book_agg: AggregateId = match book_id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid book id"),
    };
    let book_id = BookId(book_agg);
    if let Err(e) = crate::authz::require(&principal, &Permission::new("supply.workflow")) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }
    if services.books.get(&book_id).is_none() {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "book not found");
    }

    let order = match services.shortlist_order() {
        Ok(rm) => rm,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    let cmd = SupplyOrderCommand::LiftBook(LiftBook {
        order_id: order.order_id,
        item_id: OrderItemId::new(AggregateId::new()),
        book_id,
        occurred_at: Utc::now(),
    });
    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("supply.workflow")],
    };
    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    if let Err(e) = services.dispatch::<SupplyOrder>(
        order.order_id.0,
        "supply.order",
        cmd_auth.inner,
        |id| SupplyOrder::empty(SupplyOrderId::new(id)),
    ) {
        return errors::dispatch_error_to_response(e);
    }

    match services.supply_orders.get(&order.order_id) {
        Some(rm) => (StatusCode::OK, Json(order_view(&services, &rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "order not found"),
    }
}

pub async fn drop_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(item_id): Path<String>,
) -> axum::response::Response {
    let item_id = match parse_item_id(&item_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let order = match services.supply_orders.find_by_item(item_id) {
        Some(rm) => rm,
        None => return errors::json_error(StatusCode::NOT_FOUND, "not_found", "item not found"),
    };

    let cmd = SupplyOrderCommand::DropItem(DropItem {
        order_id: order.order_id,
        item_id,
        occurred_at: Utc::now(),
    });
    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("supply.workflow")],
    };
    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    if let Err(e) = services.dispatch::<SupplyOrder>(
        order.order_id.0,
        "supply.order",
        cmd_auth.inner,
        |id| SupplyOrder::empty(SupplyOrderId::new(id)),
    ) {
        return errors::dispatch_error_to_response(e);
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "order_id": order.order_id.to_string(),
            "redirect": redirect_for(order.status),
        })),
    )
        .into_response()
}

pub async fn adjust_mass(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(item_id): Path<String>,
    Json(body): Json<dto::AdjustRequest>,
) -> axum::response::Response {
    let item_id = match parse_item_id(&item_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let direction = match errors::parse_direction(&body.action) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let order = match services.supply_orders.find_by_item(item_id) {
        Some(rm) => rm,
        None => return errors::json_error(StatusCode::NOT_FOUND, "not_found", "item not found"),
    };

    let cmd = SupplyOrderCommand::AdjustMass(AdjustMass {
        order_id: order.order_id,
        item_id,
        direction,
        occurred_at: Utc::now(),
    });
    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("supply.workflow")],
    };
    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    if let Err(e) = services.dispatch::<SupplyOrder>(
        order.order_id.0,
        "supply.order",
        cmd_auth.inner,
        |id| SupplyOrder::empty(SupplyOrderId::new(id)),
    ) {
        return errors::dispatch_error_to_response(e);
    }

    let mass = services
        .supply_orders
        .get(&order.order_id)
        .and_then(|rm| rm.items.iter().find(|i| i.item_id == item_id).map(|i| i.mass));
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "order_id": order.order_id.to_string(),
            "item_id": item_id.to_string(),
            "mass": mass,
            "redirect": redirect_for(order.status),
        })),
    )
        .into_response()
}

pub async fn submit_review(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require(&principal, &Permission::new("supply.workflow")) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let order = match services.shortlist_order() {
        Ok(rm) => rm,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    let cmd = SupplyOrderCommand::SubmitForReview(SubmitForReview {
        order_id: order.order_id,
        occurred_at: Utc::now(),
    });
    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("supply.workflow")],
    };
    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    if let Err(e) = services.dispatch::<SupplyOrder>(
        order.order_id.0,
        "supply.order",
        cmd_auth.inner,
        |id| SupplyOrder::empty(SupplyOrderId::new(id)),
    ) {
        return errors::dispatch_error_to_response(e);
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "order_id": order.order_id.to_string(),
            "status": SupplyOrderStatus::PendingReview.as_str(),
        })),
    )
        .into_response()
}

pub async fn review_view(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require(&principal, &Permission::new("supply.authorize")) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let items = services
        .supply_orders
        .list_with_status(SupplyOrderStatus::PendingReview)
        .iter()
        .map(|rm| order_view(&services, rm))
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn launch_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(order_id): Path<String>,
    Json(body): Json<dto::LaunchRequest>,
) -> axum::response::Response {
    let order_id = match parse_order_id(&order_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let supplier_agg: AggregateId = match body.supplier_id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid supplier id")
        }
    };
    let supplier_id = SupplierId::new(supplier_agg);
    if services.suppliers.get(&supplier_id).is_none() {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "supplier not found");
    }

    let cmd = SupplyOrderCommand::LaunchOrder(LaunchOrder {
        order_id,
        supplier_id,
        occurred_at: Utc::now(),
    });
    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("supply.authorize")],
    };
    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    if let Err(e) = services.dispatch::<SupplyOrder>(order_id.0, "supply.order", cmd_auth.inner, |id| {
        SupplyOrder::empty(SupplyOrderId::new(id))
    }) {
        return errors::dispatch_error_to_response(e);
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "order_id": order_id.to_string(),
            "status": SupplyOrderStatus::Placed.as_str(),
            "supplier_id": supplier_id.to_string(),
        })),
    )
        .into_response()
}

pub async fn confirmation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(order_id): Path<String>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require(&principal, &Permission::new("supply.workflow")) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }
    let order_id = match parse_order_id(&order_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let order = match services.supply_orders.get(&order_id) {
        Some(rm) => rm,
        None => return errors::json_error(StatusCode::NOT_FOUND, "not_found", "order not found"),
    };
    let invoice = match invoice_order(&services, &order) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "order_id": order_id.to_string(),
            "supplier": invoice.supplier_name,
            "message": confirmation_message(&invoice),
        })),
    )
        .into_response()
}

pub async fn preview_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(order_id): Path<String>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require(&principal, &Permission::new("supply.workflow")) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }
    let order_id = match parse_order_id(&order_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let order = match services.supply_orders.get(&order_id) {
        Some(rm) => rm,
        None => return errors::json_error(StatusCode::NOT_FOUND, "not_found", "order not found"),
    };
    let invoice = match invoice_order(&services, &order) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "order_id": order_id.to_string(),
            "supplier": invoice.supplier_name,
            "lines": invoice.lines.iter().map(|l| serde_json::json!({
                "title": l.title,
                "mass": l.mass,
            })).collect::<Vec<_>>(),
            "total_quantity": invoice.lines.iter().map(|l| l.mass).sum::<i64>(),
        })),
    )
        .into_response()
}

pub async fn download_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(order_id): Path<String>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require(&principal, &Permission::new("supply.workflow")) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }
    let order_id = match parse_order_id(&order_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let order = match services.supply_orders.get(&order_id) {
        Some(rm) => rm,
        None => return errors::json_error(StatusCode::NOT_FOUND, "not_found", "order not found"),
    };
    let invoice = match invoice_order(&services, &order) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let pdf = render_invoice_pdf(&invoice);
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=Invoice_{order_id}.pdf"),
            ),
        ],
        pdf,
    )
        .into_response()
}

pub async fn receive_list(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require(&principal, &Permission::new("supply.workflow")) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let items = services
        .supply_orders
        .list_with_status(SupplyOrderStatus::Placed)
        .iter()
        .map(|rm| order_view(&services, rm))
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn receive_view(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(order_id): Path<String>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require(&principal, &Permission::new("supply.workflow")) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }
    let order_id = match parse_order_id(&order_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let order = match services.supply_orders.get(&order_id) {
        Some(rm) => rm,
        None => return errors::json_error(StatusCode::NOT_FOUND, "not_found", "order not found"),
    };
    if order.status != SupplyOrderStatus::Placed {
        return errors::json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "invariant_violation",
            "only a placed order can be received",
        );
    }

    (StatusCode::OK, Json(order_view(&services, &order))).into_response()
}

pub async fn update_payload(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(item_id): Path<String>,
    Json(body): Json<dto::AdjustRequest>,
) -> axum::response::Response {
    let item_id = match parse_item_id(&item_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let direction = match errors::parse_direction(&body.action) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let order = match services.supply_orders.find_by_item(item_id) {
        Some(rm) => rm,
        None => return errors::json_error(StatusCode::NOT_FOUND, "not_found", "item not found"),
    };

    let cmd = SupplyOrderCommand::AdjustPayload(AdjustPayload {
        order_id: order.order_id,
        item_id,
        direction,
        occurred_at: Utc::now(),
    });
    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("supply.workflow")],
    };
    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    if let Err(e) = services.dispatch::<SupplyOrder>(
        order.order_id.0,
        "supply.order",
        cmd_auth.inner,
        |id| SupplyOrder::empty(SupplyOrderId::new(id)),
    ) {
        return errors::dispatch_error_to_response(e);
    }

    let payload = services
        .supply_orders
        .get(&order.order_id)
        .and_then(|rm| {
            rm.items
                .iter()
                .find(|i| i.item_id == item_id)
                .map(|i| i.received_quantity())
        });
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "order_id": order.order_id.to_string(),
            "item_id": item_id.to_string(),
            "payload": payload,
        })),
    )
        .into_response()
}

pub async fn fuse_inventory(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(order_id): Path<String>,
) -> axum::response::Response {
    let order_id = match parse_order_id(&order_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = SupplyOrderCommand::FuseInventory(FuseInventory {
        order_id,
        occurred_at: Utc::now(),
    });
    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("supply.workflow")],
    };
    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let committed = match services.dispatch::<SupplyOrder>(
        order_id.0,
        "supply.order",
        cmd_auth.inner,
        |id| SupplyOrder::empty(SupplyOrderId::new(id)),
    ) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    // The order is completed at this point; crediting must not abort early
    // or the remaining receipts would never be applied.
    let receipts = receipts_from(&committed);
    services.credit_receipts(order_id, &receipts);

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "order_id": order_id.to_string(),
            "status": SupplyOrderStatus::Completed.as_str(),
            "receipts": receipts.iter().map(|r| serde_json::json!({
                "book_id": r.book_id.to_string(),
                "quantity": r.quantity,
            })).collect::<Vec<_>>(),
        })),
    )
        .into_response()
}

fn receipts_from(committed: &[libram_infra::event_store::StoredEvent]) -> Vec<Receipt> {
    committed
        .iter()
        .filter_map(|stored| {
            serde_json::from_value::<SupplyOrderEvent>(stored.payload.clone()).ok()
        })
        .find_map(|ev| match ev {
            SupplyOrderEvent::InventoryFused(e) => Some(e.receipts),
            _ => None,
        })
        .unwrap_or_default()
}
