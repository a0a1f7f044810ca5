use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use libram_auth::Permission;
use libram_catalog::{
    AddBook, Book, BookCommand, BookDetails, BookId, RestockBook, UpdateBookDetails,
};
use libram_core::AggregateId;

use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;
use crate::app::{covers, dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/books", post(add_book).get(list_books))
        .route("/books/:id", get(get_book).patch(update_book))
        .route("/books/:id/restock", post(restock_book))
        .route("/covers/backfill", post(backfill_covers))
}

pub async fn list_books(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let items = services
        .books
        .list()
        .into_iter()
        .map(dto::book_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn get_book(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid book id"),
    };
    match services.books.get(&BookId(agg)) {
        Some(rm) => (StatusCode::OK, Json(dto::book_to_json(rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "book not found"),
    }
}

pub async fn add_book(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Json(body): Json<dto::AddBookRequest>,
) -> axum::response::Response {
    let item_type = match errors::parse_item_type(&body.item_type) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let agg = AggregateId::new();
    let book_id = BookId(agg);
    let cmd = BookCommand::AddBook(AddBook {
        book_id,
        details: BookDetails {
            title: body.title,
            author: body.author,
            price_cents: body.price_cents,
            category: body.category,
            item_type,
            location: body.location,
            image_url: body.image_url,
        },
        initial_stock: body.initial_stock,
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("catalog.manage")],
    };
    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    if let Err(e) = services.dispatch::<Book>(agg, "catalog.book", cmd_auth.inner, |id| {
        Book::empty(BookId(id))
    }) {
        return errors::dispatch_error_to_response(e);
    }

    (
        StatusCode::CREATED,
        Json(serde_json::json!({ "id": agg.to_string() })),
    )
        .into_response()
}

pub async fn update_book(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateBookRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid book id"),
    };
    let item_type = match errors::parse_item_type(&body.item_type) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = BookCommand::UpdateBookDetails(UpdateBookDetails {
        book_id: BookId(agg),
        details: BookDetails {
            title: body.title,
            author: body.author,
            price_cents: body.price_cents,
            category: body.category,
            item_type,
            location: body.location,
            image_url: body.image_url,
        },
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("catalog.manage")],
    };
    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    if let Err(e) = services.dispatch::<Book>(agg, "catalog.book", cmd_auth.inner, |id| {
        Book::empty(BookId(id))
    }) {
        return errors::dispatch_error_to_response(e);
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({ "id": agg.to_string() })),
    )
        .into_response()
}

pub async fn restock_book(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RestockRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid book id"),
    };

    let cmd = BookCommand::RestockBook(RestockBook {
        book_id: BookId(agg),
        quantity: body.quantity,
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("catalog.restock")],
    };
    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    if let Err(e) = services.dispatch::<Book>(agg, "catalog.book", cmd_auth.inner, |id| {
        Book::empty(BookId(id))
    }) {
        return errors::dispatch_error_to_response(e);
    }

    match services.books.get(&BookId(agg)) {
        Some(rm) => (StatusCode::OK, Json(dto::book_to_json(rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "book not found"),
    }
}

pub async fn backfill_covers(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require(&principal, &Permission::new("catalog.manage")) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    // Lookups use a blocking HTTP client; keep them off the async workers.
    let services = Arc::clone(&services);
    let outcome = match tokio::task::spawn_blocking(move || covers::backfill_covers(&services)).await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            return errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "backfill_failed",
                e.to_string(),
            )
        }
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "updated": outcome.updated,
            "skipped": outcome.skipped,
        })),
    )
        .into_response()
}
