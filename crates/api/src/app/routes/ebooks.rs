//! E-book routes: multipart upload/edit, listing, reading, listening, delete.
//!
//! File bytes go to the asset store before the metadata command is
//! dispatched; a failed dispatch removes the files it stored.

use std::sync::Arc;

use axum::{
    extract::{Extension, Multipart, Path},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use libram_assets::{
    is_allowed_audio, is_allowed_ebook, AssetFolder, AssetStore, DeleteEbook, Ebook, EbookCommand,
    EbookId, EditEbook, UploadEbook,
};
use libram_auth::Permission;
use libram_core::AggregateId;

use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_ebooks))
        .route("/upload", post(upload_ebook))
        .route("/read/:id", get(read_ebook))
        .route("/listen/:id", get(listen_ebook))
        .route("/edit/:id", post(edit_ebook))
        .route("/delete/:id", post(delete_ebook))
}

#[derive(Default)]
struct EbookForm {
    title: Option<String>,
    author: Option<String>,
    description: Option<String>,
    pdf: Option<(String, Vec<u8>)>,
    audio: Option<(String, Vec<u8>)>,
    cover: Option<(String, Vec<u8>)>,
}

async fn read_form(multipart: &mut Multipart) -> Result<EbookForm, axum::response::Response> {
    let mut form = EbookForm::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return Err(errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_multipart",
                    e.to_string(),
                ))
            }
        };

        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" | "author" | "description" => {
                let value = field.text().await.map_err(|e| {
                    errors::json_error(StatusCode::BAD_REQUEST, "invalid_multipart", e.to_string())
                })?;
                match name.as_str() {
                    "title" => form.title = Some(value),
                    "author" => form.author = Some(value),
                    _ => form.description = Some(value),
                }
            }
            "file" | "audio" | "cover" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(|e| {
                    errors::json_error(StatusCode::BAD_REQUEST, "invalid_multipart", e.to_string())
                })?;
                if filename.is_empty() || bytes.is_empty() {
                    continue;
                }
                let part = Some((filename, bytes.to_vec()));
                match name.as_str() {
                    "file" => form.pdf = part,
                    "audio" => form.audio = part,
                    _ => form.cover = part,
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

pub async fn list_ebooks(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let items = services
        .ebooks
        .list()
        .iter()
        .map(dto::ebook_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn upload_ebook(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    mut multipart: Multipart,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require(&principal, &Permission::new("ebooks.manage")) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let form = match read_form(&mut multipart).await {
        Ok(form) => form,
        Err(resp) => return resp,
    };
    let Some((pdf_name, pdf_bytes)) = form.pdf else {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "an e-book file is required",
        );
    };
    if !is_allowed_ebook(&pdf_name) {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "e-book file must be a .pdf",
        );
    }
    if let Some((audio_name, _)) = &form.audio {
        if !is_allowed_audio(audio_name) {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                "audio file must be .mp3 or .wav",
            );
        }
    }

    let pdf_filename = match services.assets.save(AssetFolder::Ebooks, &pdf_name, &pdf_bytes) {
        Ok(stored) => stored,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "asset_error", e.to_string()),
    };
    let audio_filename = match &form.audio {
        Some((name, bytes)) => match services.assets.save(AssetFolder::Audio, name, bytes) {
            Ok(stored) => Some(stored),
            Err(e) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "asset_error", e.to_string())
            }
        },
        None => None,
    };
    let cover_url = match &form.cover {
        Some((name, bytes)) => match services.assets.save(AssetFolder::Covers, name, bytes) {
            Ok(stored) => Some(format!("/assets/covers/{stored}")),
            Err(e) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "asset_error", e.to_string())
            }
        },
        None => None,
    };

    let agg = AggregateId::new();
    let cmd = EbookCommand::UploadEbook(UploadEbook {
        ebook_id: EbookId::new(agg),
        title: form.title.unwrap_or_default(),
        author: form.author.unwrap_or_default(),
        description: form.description,
        pdf_filename: pdf_filename.clone(),
        audio_filename: audio_filename.clone(),
        cover_url,
        occurred_at: Utc::now(),
    });
    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("ebooks.manage")],
    };
    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    if let Err(e) = services.dispatch::<Ebook>(agg, "assets.ebook", cmd_auth.inner, |id| {
        Ebook::empty(EbookId::new(id))
    }) {
        // The metadata was rejected; keep the store consistent.
        let _ = services.assets.remove(AssetFolder::Ebooks, &pdf_filename);
        if let Some(audio) = &audio_filename {
            let _ = services.assets.remove(AssetFolder::Audio, audio);
        }
        return errors::dispatch_error_to_response(e);
    }

    (
        StatusCode::CREATED,
        Json(serde_json::json!({ "id": agg.to_string() })),
    )
        .into_response()
}

pub async fn edit_ebook(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require(&principal, &Permission::new("ebooks.manage")) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid ebook id"),
    };
    let ebook_id = EbookId::new(agg);
    let Some(current) = services.ebooks.get(&ebook_id) else {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "ebook not found");
    };

    let form = match read_form(&mut multipart).await {
        Ok(form) => form,
        Err(resp) => return resp,
    };
    if let Some((pdf_name, _)) = &form.pdf {
        if !is_allowed_ebook(pdf_name) {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                "e-book file must be a .pdf",
            );
        }
    }
    if let Some((audio_name, _)) = &form.audio {
        if !is_allowed_audio(audio_name) {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                "audio file must be .mp3 or .wav",
            );
        }
    }

    let pdf_filename = match &form.pdf {
        Some((name, bytes)) => match services.assets.save(AssetFolder::Ebooks, name, bytes) {
            Ok(stored) => Some(stored),
            Err(e) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "asset_error", e.to_string())
            }
        },
        None => None,
    };
    let audio_filename = match &form.audio {
        Some((name, bytes)) => match services.assets.save(AssetFolder::Audio, name, bytes) {
            Ok(stored) => Some(stored),
            Err(e) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "asset_error", e.to_string())
            }
        },
        None => None,
    };
    let cover_url = match &form.cover {
        Some((name, bytes)) => match services.assets.save(AssetFolder::Covers, name, bytes) {
            Ok(stored) => Some(format!("/assets/covers/{stored}")),
            Err(e) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "asset_error", e.to_string())
            }
        },
        None => None,
    };

    let cmd = EbookCommand::EditEbook(EditEbook {
        ebook_id,
        title: form.title,
        author: form.author,
        description: form.description,
        pdf_filename: pdf_filename.clone(),
        audio_filename: audio_filename.clone(),
        cover_url,
        occurred_at: Utc::now(),
    });
    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("ebooks.manage")],
    };
    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    if let Err(e) = services.dispatch::<Ebook>(agg, "assets.ebook", cmd_auth.inner, |id| {
        Ebook::empty(EbookId::new(id))
    }) {
        if let Some(pdf) = &pdf_filename {
            let _ = services.assets.remove(AssetFolder::Ebooks, pdf);
        }
        if let Some(audio) = &audio_filename {
            let _ = services.assets.remove(AssetFolder::Audio, audio);
        }
        return errors::dispatch_error_to_response(e);
    }

    // Drop replaced files now that the edit is committed.
    if let Some(new_pdf) = &pdf_filename {
        if *new_pdf != current.pdf_filename {
            let _ = services.assets.remove(AssetFolder::Ebooks, &current.pdf_filename);
        }
    }
    if let (Some(new_audio), Some(old_audio)) = (&audio_filename, &current.audio_filename) {
        if new_audio != old_audio {
            let _ = services.assets.remove(AssetFolder::Audio, old_audio);
        }
    }

    match services.ebooks.get(&ebook_id) {
        Some(rm) => (StatusCode::OK, Json(dto::ebook_to_json(&rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "ebook not found"),
    }
}

pub async fn read_ebook(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid ebook id"),
    };
    let Some(rm) = services.ebooks.get(&EbookId::new(agg)) else {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "ebook not found");
    };

    match services.assets.read(AssetFolder::Ebooks, &rm.pdf_filename) {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/pdf")],
            bytes,
        )
            .into_response(),
        Err(e) => errors::json_error(StatusCode::NOT_FOUND, "not_found", e.to_string()),
    }
}

pub async fn listen_ebook(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid ebook id"),
    };
    let Some(rm) = services.ebooks.get(&EbookId::new(agg)) else {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "ebook not found");
    };
    let Some(audio) = rm.audio_filename else {
        return errors::json_error(
            StatusCode::NOT_FOUND,
            "no_audio",
            "this e-book has no audio companion",
        );
    };

    let content_type = if audio.to_lowercase().ends_with(".wav") {
        "audio/wav"
    } else {
        "audio/mpeg"
    };
    match services.assets.read(AssetFolder::Audio, &audio) {
        Ok(bytes) => (StatusCode::OK, [(header::CONTENT_TYPE, content_type)], bytes).into_response(),
        Err(e) => errors::json_error(StatusCode::NOT_FOUND, "not_found", e.to_string()),
    }
}

pub async fn delete_ebook(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid ebook id"),
    };
    let ebook_id = EbookId::new(agg);
    let Some(rm) = services.ebooks.get(&ebook_id) else {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "ebook not found");
    };

    let cmd = EbookCommand::DeleteEbook(DeleteEbook {
        ebook_id,
        occurred_at: Utc::now(),
    });
    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("ebooks.manage")],
    };
    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    if let Err(e) = services.dispatch::<Ebook>(agg, "assets.ebook", cmd_auth.inner, |id| {
        Ebook::empty(EbookId::new(id))
    }) {
        return errors::dispatch_error_to_response(e);
    }

    let _ = services.assets.remove(AssetFolder::Ebooks, &rm.pdf_filename);
    if let Some(audio) = &rm.audio_filename {
        let _ = services.assets.remove(AssetFolder::Audio, audio);
    }
    if let Some(cover) = rm
        .cover_url
        .as_deref()
        .and_then(|url| url.strip_prefix("/assets/covers/"))
    {
        let _ = services.assets.remove(AssetFolder::Covers, cover);
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({ "id": agg.to_string() })),
    )
        .into_response()
}
