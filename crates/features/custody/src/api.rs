//! HTTP surface of the custody slice.

use axum::Json;
use axum::extract::{FromRef, FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use sanctum_kernel::protocol::{BackupRestoreRequest, Envelope, ErrorBody, SessionGrant};
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::auth::CredentialAuthority;
use crate::error::CustodyError;
use crate::service::Custody;

/// Shared state of the custody routes.
#[derive(Debug, Clone)]
pub struct CustodyState {
    pub custody: Custody,
    pub credentials: CredentialAuthority,
}

impl FromRef<CustodyState> for Custody {
    fn from_ref(state: &CustodyState) -> Self {
        state.custody.clone()
    }
}

impl FromRef<CustodyState> for CredentialAuthority {
    fn from_ref(state: &CustodyState) -> Self {
        state.credentials.clone()
    }
}

/// The identity of an authenticated caller, extracted from the bearer
/// credential. This is the "black box" seam: handlers only ever see the
/// stable identity the middleware yields.
#[derive(Debug)]
pub struct Caller(pub String);

impl FromRequestParts<CustodyState> for Caller {
    type Rejection = CustodyError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &CustodyState,
    ) -> Result<Self, Self::Rejection> {
        let credential = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| CustodyError::CredentialInvalid {
                message: "missing bearer credential".into(),
                context: None,
            })?;

        let identity = state.credentials.verify(credential)?;
        Ok(Self(identity))
    }
}

impl IntoResponse for CustodyError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::SessionExpired { .. } | Self::CredentialInvalid { .. } => {
                StatusCode::UNAUTHORIZED
            },
            Self::DataMissing { .. } => StatusCode::NOT_FOUND,
            Self::TransitTagMismatch { .. }
            | Self::MalformedEnvelope { .. }
            | Self::Decryption { .. } => StatusCode::BAD_REQUEST,
            Self::DataTamperedNoBackup { .. } => StatusCode::GONE,
            Self::StoreUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = ErrorBody { code: self.code().to_owned(), message: self.to_string() };
        (status, Json(body)).into_response()
    }
}

#[utoipa::path(
    post,
    path = "/v1/session",
    responses(
        (status = OK, description = "Fresh identity, shared secret, and credential", body = SessionGrant),
        (status = SERVICE_UNAVAILABLE, description = "Session store unavailable", body = ErrorBody),
    ),
    tag = "session",
)]
async fn establish_session(
    State(state): State<CustodyState>,
) -> Result<Json<SessionGrant>, CustodyError> {
    let session = state.custody.establish_session()?;
    let credential = state.credentials.issue(&session.identity)?;

    Ok(Json(SessionGrant {
        shared_secret: session.secret.to_hex(),
        identity: session.identity,
        credential,
    }))
}

#[utoipa::path(
    delete,
    path = "/v1/session",
    responses(
        (status = NO_CONTENT, description = "Session destroyed"),
        (status = UNAUTHORIZED, description = "Credential rejected", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "session",
)]
async fn clear_session(
    State(state): State<CustodyState>,
    Caller(identity): Caller,
) -> Result<StatusCode, CustodyError> {
    state.custody.clear_session(&identity)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    put,
    path = "/v1/data",
    request_body = Envelope,
    responses(
        (status = NO_CONTENT, description = "Payload stored"),
        (status = BAD_REQUEST, description = "Envelope rejected", body = ErrorBody),
        (status = UNAUTHORIZED, description = "Session expired or credential rejected", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "data",
)]
async fn save_payload(
    State(state): State<CustodyState>,
    Caller(identity): Caller,
    Json(envelope): Json<Envelope>,
) -> Result<StatusCode, CustodyError> {
    state.custody.save(&identity, &envelope)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/v1/data",
    responses(
        (status = OK, description = "Stored payload as a tagged envelope", body = Envelope),
        (status = NOT_FOUND, description = "Nothing stored", body = ErrorBody),
        (status = GONE, description = "Data tampered and unrecoverable", body = ErrorBody),
        (status = UNAUTHORIZED, description = "Session expired or credential rejected", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "data",
)]
async fn retrieve_payload(
    State(state): State<CustodyState>,
    Caller(identity): Caller,
) -> Result<Json<Envelope>, CustodyError> {
    Ok(Json(state.custody.retrieve(&identity)?))
}

#[utoipa::path(
    put,
    path = "/v1/data/backup",
    request_body = BackupRestoreRequest,
    responses(
        (status = NO_CONTENT, description = "Backup replaced"),
        (status = UNAUTHORIZED, description = "Credential rejected", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "data",
)]
async fn restore_backup(
    State(state): State<CustodyState>,
    Caller(identity): Caller,
    Json(request): Json<BackupRestoreRequest>,
) -> Result<StatusCode, CustodyError> {
    state.custody.restore_backup(&identity, &request.payload)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Routes of the custody slice.
pub fn router() -> OpenApiRouter<CustodyState> {
    OpenApiRouter::new()
        .routes(routes!(establish_session, clear_session))
        .routes(routes!(save_payload, retrieve_payload))
        .routes(routes!(restore_backup))
}
