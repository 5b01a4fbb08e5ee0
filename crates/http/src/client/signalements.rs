//! Signalement administration endpoints

use super::error::{ApiError, ErrorType, normalize};
use super::interceptor::SessionClient;
use super::service::{ServiceError, make_service};
use super::{ApiRequest, MultipartForm};
use crate::routes;
use crate::types::{
    CommentAdded, CommentRequest, DocumentUpload, DocumentsTransferred, Envelope, FlagRequest,
    PriorityUpdate, RemoveSpamRequest, SignalementDetail, SignalementList, SignalementQuery,
    SpamFlagged, SpamRequest, StatusUpdate, UpdateStatusRequest,
};
use signalement_core::{IncidentStatus, PriorityLevel, StatusChange};
use std::io;
use std::path::Path;

crate::error_kind! {
    /// Documented failures of `GET /signalement/admin-list`
    pub enum ListErrorKind {
        Unauthorized,
        TokenExpired,
        Forbidden,
        ValidationError,
        InvalidDateFormat,
        InvalidDateRange,
        ServerError,
    }
}

crate::error_kind! {
    /// Documented failures of `GET /signalement/detail/{id}`
    pub enum DetailErrorKind {
        TokenMissing,
        TokenInvalid,
        TokenExpired,
        Unauthorized,
        UnauthorizedAccess,
        SignalementNotFound,
        ServerError,
    }
}

crate::error_kind! {
    /// Documented failures of `PUT /signalement/update-status/{id}`
    pub enum UpdateStatusErrorKind {
        Unauthorized,
        Forbidden,
        ValidationError,
        NoStatusChange,
        InvalidStatusTransition,
        SignalementNotFound,
        ServerError,
    }
}

crate::error_kind! {
    /// Documented failures of `PUT /signalement/flag/{id}`
    pub enum FlagErrorKind {
        Unauthorized,
        Forbidden,
        ValidationError,
        SignalementNotFound,
        ServerError,
    }
}

crate::error_kind! {
    /// Documented failures of `POST /signalement/comment/{id}`
    pub enum CommentErrorKind {
        Unauthorized,
        UnauthorizedAccess,
        UnauthorizedPrivateComment,
        ValidationError,
        SignalementNotFound,
        ServerError,
    }
}

crate::error_kind! {
    /// Documented failures of `POST /signalement/spam/{id}`
    pub enum SpamErrorKind {
        Unauthorized,
        Forbidden,
        ValidationError,
        AlreadyFlagged,
        SignalementNotFound,
        ServerError,
    }
}

crate::error_kind! {
    /// Documented failures of `DELETE /signalement/remove-spam/{id}`
    pub enum RemoveSpamErrorKind {
        Unauthorized,
        Forbidden,
        NotFlaggedAsSpam,
        SignalementNotFound,
        ServerError,
    }
}

crate::error_kind! {
    /// Documented failures of `POST /signalement/transfer-documents/{id}`
    pub enum TransferErrorKind {
        Unauthorized,
        Forbidden,
        NoDocumentsProvided,
        FileSizeExceeded,
        SignalementNotFound,
        ServerError,
    }
}

/// Reject calls that would hit `/route/` with no identifier
fn require_id(id: &str) -> Result<(), ApiError> {
    if id.trim().is_empty() {
        return Err(ApiError::new(
            400,
            "Identifiant du signalement manquant",
            ErrorType::SignalementNotFound,
        ));
    }
    Ok(())
}

impl DocumentUpload {
    pub fn new(file_name: impl Into<String>, mime: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime,
            bytes,
        }
    }

    /// Read a file from disk, guessing its MIME type from the extension
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read
    pub fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        let mime = path
            .extension()
            .and_then(|ext| mime_for_extension(&ext.to_string_lossy()))
            .map(str::to_string);
        Ok(Self::new(file_name, mime, bytes))
    }
}

/// MIME types of the upload formats the back office accepts; anything else goes untyped
fn mime_for_extension(ext: &str) -> Option<&'static str> {
    let mime = match ext.to_ascii_lowercase().as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "mp4" => "video/mp4",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "zip" => "application/zip",
        _ => return None,
    };
    Some(mime)
}

fn transfer_form(
    documents: Vec<DocumentUpload>,
    update_status: bool,
    new_status: Option<IncidentStatus>,
) -> MultipartForm {
    let mut form = documents
        .into_iter()
        .fold(MultipartForm::new(), |form, doc| {
            form.file("documents", doc.file_name, doc.mime, doc.bytes)
        })
        .text("updateStatus", update_status.to_string());
    if let (true, Some(status)) = (update_status, new_status) {
        form = form.text("newStatus", status.as_str());
    }
    form
}

impl SessionClient {
    /// One page of signalements matching `query`
    pub async fn list_signalements(
        &self,
        query: &SignalementQuery,
    ) -> Result<SignalementList, ServiceError<ListErrorKind>> {
        let service = make_service(
            "Erreur lors de la récupération des signalements",
            move |query: SignalementQuery| async move {
                let request = ApiRequest::get(routes::SIGNALEMENT_ADMIN_LIST).query(query.to_pairs());
                let response: Envelope<SignalementList> = self.send(&request).await?;
                Ok::<_, ApiError>(response.data)
            },
        );
        service.call(query.clone()).await
    }

    pub async fn signalement_detail(
        &self,
        id: &str,
    ) -> Result<SignalementDetail, ServiceError<DetailErrorKind>> {
        let service = make_service(
            "Erreur lors de la récupération du signalement",
            move |id: String| async move {
                require_id(&id)?;
                let request = ApiRequest::get(routes::signalement_detail(&id));
                let response: Envelope<SignalementDetail> = self.send(&request).await?;
                Ok::<_, ApiError>(response.data)
            },
        );
        service.call(id.to_string()).await
    }

    /// Send a status change as-is; the backend enforces the transition rules
    pub async fn update_status(
        &self,
        id: &str,
        body: &UpdateStatusRequest,
    ) -> Result<StatusUpdate, ServiceError<UpdateStatusErrorKind>> {
        let service = make_service(
            "Erreur lors de la mise à jour du statut",
            move |(id, body): (String, UpdateStatusRequest)| async move {
                require_id(&id)?;
                let request = ApiRequest::put(routes::signalement_update_status(&id)).json(&body)?;
                let response: Envelope<StatusUpdate> = self.send(&request).await?;
                Ok::<_, ApiError>(response.data)
            },
        );
        service.call((id.to_string(), body.clone())).await
    }

    /// Validate `current -> next` locally, then send it.
    ///
    /// A change the transition table forbids, or one with a justification
    /// shorter than ten characters, fails without reaching the network.
    pub async fn change_status(
        &self,
        id: &str,
        current: IncidentStatus,
        next: IncidentStatus,
        justification: &str,
    ) -> Result<StatusUpdate, ServiceError<UpdateStatusErrorKind>> {
        let change = match StatusChange::validate(current, next, justification) {
            Ok(change) => change,
            Err(e) => {
                debug!(%current, %next, error = %e, "Status change rejected locally");
                return Err(ServiceError::from(normalize(
                    e,
                    "Erreur lors de la mise à jour du statut",
                )));
            }
        };

        let body = UpdateStatusRequest {
            statut: change.next,
            commentaire: change.justification,
        };
        self.update_status(id, &body).await
    }

    pub async fn flag_priority(
        &self,
        id: &str,
        level: PriorityLevel,
        comment: Option<&str>,
    ) -> Result<PriorityUpdate, ServiceError<FlagErrorKind>> {
        let service = make_service(
            "Erreur lors de la mise à jour de la priorité",
            move |(id, body): (String, FlagRequest)| async move {
                require_id(&id)?;
                let request = ApiRequest::put(routes::signalement_flag(&id)).json(&body)?;
                let response: Envelope<PriorityUpdate> = self.send(&request).await?;
                Ok::<_, ApiError>(response.data)
            },
        );
        let body = FlagRequest {
            priority_level: level,
            commentaire: comment
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
        };
        service.call((id.to_string(), body)).await
    }

    /// Add a comment; `private` comments are only visible to administrators
    pub async fn add_comment(
        &self,
        id: &str,
        contenu: &str,
        private: bool,
    ) -> Result<CommentAdded, ServiceError<CommentErrorKind>> {
        let service = make_service(
            "Erreur lors de l'ajout du commentaire",
            move |(id, body): (String, CommentRequest)| async move {
                require_id(&id)?;
                let request = ApiRequest::post(routes::signalement_comment(&id)).json(&body)?;
                let response: Envelope<CommentAdded> = self.send(&request).await?;
                Ok::<_, ApiError>(response.data)
            },
        );
        let body = CommentRequest {
            contenu: contenu.to_string(),
            private,
        };
        service.call((id.to_string(), body)).await
    }

    /// Flag as spam; with `update_status` the backend also moves it to
    /// "non pris en charge"
    pub async fn mark_spam(
        &self,
        id: &str,
        raison: &str,
        update_status: bool,
    ) -> Result<SpamFlagged, ServiceError<SpamErrorKind>> {
        let service = make_service(
            "Erreur lors du signalement comme spam",
            move |(id, body): (String, SpamRequest)| async move {
                require_id(&id)?;
                let request = ApiRequest::post(routes::signalement_spam(&id)).json(&body)?;
                let response: Envelope<SpamFlagged> = self.send(&request).await?;
                Ok::<_, ApiError>(response.data)
            },
        );
        let body = SpamRequest {
            raison: raison.to_string(),
            update_status,
        };
        service.call((id.to_string(), body)).await
    }

    /// Lift a spam flag. The body is only sent when a status or reason is given.
    pub async fn remove_spam(
        &self,
        id: &str,
        new_status: Option<IncidentStatus>,
        raison: Option<&str>,
    ) -> Result<SpamFlagged, ServiceError<RemoveSpamErrorKind>> {
        let service = make_service(
            "Erreur lors du retrait du marquage spam",
            move |(id, body): (String, RemoveSpamRequest)| async move {
                require_id(&id)?;
                let mut request = ApiRequest::delete(routes::signalement_remove_spam(&id));
                if !body.is_empty() {
                    request = request.json(&body)?;
                }
                let response: Envelope<SpamFlagged> = self.send(&request).await?;
                Ok::<_, ApiError>(response.data)
            },
        );
        let body = RemoveSpamRequest {
            new_status,
            raison: raison.filter(|r| !r.trim().is_empty()).map(str::to_string),
        };
        service.call((id.to_string(), body)).await
    }

    /// Upload proof documents as `multipart/form-data`
    pub async fn transfer_documents(
        &self,
        id: &str,
        documents: Vec<DocumentUpload>,
        update_status: bool,
        new_status: Option<IncidentStatus>,
    ) -> Result<DocumentsTransferred, ServiceError<TransferErrorKind>> {
        let service = make_service(
            "Erreur lors du transfert des documents",
            move |(id, form): (String, MultipartForm)| async move {
                require_id(&id)?;
                if form.is_empty() {
                    return Err(ApiError::new(
                        400,
                        "Aucun document fourni",
                        ErrorType::NoDocumentsProvided,
                    ));
                }
                let request = ApiRequest::post(routes::signalement_transfer_documents(&id))
                    .multipart(form);
                let response: Envelope<DocumentsTransferred> = self.send(&request).await?;
                Ok::<_, ApiError>(response.data)
            },
        );

        let form = if documents.is_empty() {
            MultipartForm::new()
        } else {
            info!(id, count = documents.len(), "Transferring documents");
            transfer_form(documents, update_status, new_status)
        };
        service.call((id.to_string(), form)).await
    }
}
