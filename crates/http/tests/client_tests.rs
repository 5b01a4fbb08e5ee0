//! Integration tests for the signalement HTTP client

use mockall::mock;
use serde_json::json;
use signalement_core::{CookiePolicy, IncidentStatus, Persistence, Session, SessionStore, TokenStore};
use signalement_http::client::dashboard::DashboardErrorKind;
use signalement_http::client::signalements::{
    DetailErrorKind, ListErrorKind, UpdateStatusErrorKind,
};
use signalement_http::types::{Credentials, DocumentUpload, Period, SignalementQuery};
use signalement_http::{
    ApiClient, DetailLoader, EndReason, ErrorType, LoadOutcome, SessionClient, SessionEnded,
    SessionListener, ViewState,
};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{
    body_json, body_string_contains, header, header_regex, method, path, query_param,
    query_param_is_missing,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

mock! {
    pub Listener {}

    impl SessionListener for Listener {
        fn session_ended(&self, event: &SessionEnded);
    }
}

fn store(refresh: Option<&str>) -> SessionStore {
    let session = SessionStore::new(TokenStore::in_memory(CookiePolicy::default()));
    session
        .store_login(
            &Session {
                access_token: "access-1".into(),
                refresh_token: refresh.map(str::to_string),
                expiry: None,
            },
            true,
        )
        .unwrap();
    session
}

fn api(base_url: &str, session: SessionStore) -> ApiClient {
    ApiClient::builder()
        .base_url(base_url)
        .session(session)
        .build()
        .unwrap()
}

fn client(server: &MockServer, session: SessionStore, listener: MockListener) -> SessionClient {
    SessionClient::with_listener(api(&server.uri(), session), Arc::new(listener), "/login")
}

fn quiet_listener() -> MockListener {
    let mut listener = MockListener::new();
    listener.expect_session_ended().never();
    listener
}

fn expired() -> ResponseTemplate {
    ResponseTemplate::new(401).set_body_json(json!({
        "message": "Token expiré",
        "errorType": "TOKEN_EXPIRED"
    }))
}

fn detail_body(id: &str, titre: &str) -> serde_json::Value {
    json!({
        "message": "Détails du signalement",
        "data": {"id": id, "titre": titre, "statut": "soumis", "preuves": [], "commentaires": []}
    })
}

async fn mount_refresh(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(body_json(json!({"refreshToken": "refresh-1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Token rafraîchi",
            "data": {"accessToken": "access-2", "expires": "2030-01-01T00:00:00Z"}
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_client_builder() {
    let client = api("http://localhost:8080/", store(None));
    assert_eq!(client.base_url(), "http://localhost:8080");

    let missing = ApiClient::builder().session(store(None)).build();
    assert!(missing.is_err());
}

#[tokio::test]
async fn test_bearer_token_and_json_content_type() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .and(header("authorization", "Bearer access-1"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Profil",
            "data": {
                "user": {"id": "u1", "nom": "Awa Koné", "numero": "0700000000", "email": "awa@artci.ci", "role": "admin"},
                "tokenInfo": {"duration": "1h", "canRefresh": true, "message": "ok"}
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, store(Some("refresh-1")), quiet_listener());
    let me = client.me().await.unwrap();

    assert_eq!(me.user.email, "awa@artci.ci");
    assert_eq!(client.current_user().map(|u| u.nom), Some("Awa Koné".to_string()));
}

#[tokio::test]
async fn test_login_stores_session() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({"email": "awa@artci.ci", "password": "secret"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Connexion réussie",
            "data": {
                "user": {"id": "u1", "fullname": "Awa Koné", "email": "awa@artci.ci", "role": "admin"},
                "tokens": {"accessToken": "access-9", "refreshToken": "refresh-9", "expires": "2030-01-01T00:00:00Z", "canRefresh": true}
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = SessionStore::new(TokenStore::in_memory(CookiePolicy::default()));
    let client = client(&server, session, quiet_listener());

    let credentials = Credentials {
        email: "awa@artci.ci".into(),
        password: "secret".into(),
    };
    client.login(credentials, false).await.unwrap();

    let tokens = client.session().tokens();
    assert_eq!(client.session().access_token().as_deref(), Some("access-9"));
    assert_eq!(
        tokens.get::<String>("refreshToken", Persistence::Local).as_deref(),
        Some("refresh-9")
    );
    assert!(!tokens.has("refreshToken", Persistence::Cookie));
    assert!(client.session().expiry().is_some());
}

#[tokio::test]
async fn test_multipart_upload_skips_json_content_type() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/signalement/transfer-documents/sig-1"))
        .and(header_regex("content-type", "^multipart/form-data; boundary="))
        .and(body_string_contains("name=\"documents\"; filename=\"capture.png\""))
        .and(body_string_contains("name=\"newStatus\""))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "message": "Documents transférés",
            "data": {
                "signalement_id": "sig-1",
                "documents": [{"id": "d1", "nom_fichier": "capture.png", "type_fichier": "IMAGE", "url": "https://cdn/d1", "taille": 4}],
                "message": "1 document transféré",
                "statut_modifie": true
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, store(Some("refresh-1")), quiet_listener());
    let docs = vec![DocumentUpload::new("capture.png", Some("image/png".into()), vec![1, 2, 3, 4])];
    let result = client
        .transfer_documents("sig-1", docs, true, Some(IncidentStatus::InProgress))
        .await
        .unwrap();

    assert_eq!(result.documents.len(), 1);
    assert!(result.statut_modifie);
}

#[tokio::test]
async fn test_empty_document_list_is_rejected_locally() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = client(&server, store(None), quiet_listener());
    let err = client
        .transfer_documents("sig-1", Vec::new(), false, None)
        .await
        .unwrap_err();

    assert_eq!(err.status(), 400);
    assert_eq!(err.error.error_type, ErrorType::NoDocumentsProvided);
}

#[tokio::test]
async fn test_unparsable_server_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/admin/dashboard"))
        .and(query_param("period", "month"))
        .respond_with(ResponseTemplate::new(500).set_body_string("<html>boom</html>"))
        .mount(&server)
        .await;

    let client = client(&server, store(None), quiet_listener());
    let err = client.dashboard_stats(Period::default()).await.unwrap_err();

    assert_eq!(err.status(), 500);
    assert_eq!(err.error.message, "HTTP error 500");
    assert_eq!(err.error.error_type, ErrorType::ApiError);
    assert_eq!(err.kind, DashboardErrorKind::Other);
}

#[tokio::test]
async fn test_empty_success_body_on_logout() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut listener = MockListener::new();
    listener
        .expect_session_ended()
        .withf(|event| event.reason == EndReason::LoggedOut && event.redirect_to == "/login")
        .times(1)
        .return_const(());

    let client = client(&server, store(Some("refresh-1")), listener);
    let message = client.logout().await.unwrap();

    assert_eq!(message, "");
    assert!(!client.session().is_authenticated());
    assert_eq!(client.session().refresh_token(), None);
}

#[tokio::test]
async fn test_network_failure() {
    let session = SessionClient::new(api("http://127.0.0.1:1", store(None)));
    let err = session
        .list_signalements(&SignalementQuery::default())
        .await
        .unwrap_err();

    assert_eq!(err.status(), 0);
    assert_eq!(err.error.error_type, ErrorType::NetworkError);
    assert_eq!(err.kind, ListErrorKind::Other);
    assert!(!err.error.message.is_empty());
}

#[tokio::test]
async fn test_expired_token_is_refreshed_and_retried_once() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/signalement/detail/sig-1"))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(expired())
        .expect(1)
        .mount(&server)
        .await;
    mount_refresh(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/signalement/detail/sig-1"))
        .and(header("authorization", "Bearer access-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(detail_body("sig-1", "Vol de données")))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, store(Some("refresh-1")), quiet_listener());
    let detail = client.signalement_detail("sig-1").await.unwrap();

    assert_eq!(detail.titre, "Vol de données");
    assert_eq!(client.session().access_token().as_deref(), Some("access-2"));
    assert!(client.session().expiry().is_some());

    let requests = server.received_requests().await.unwrap();
    let refresh = requests
        .iter()
        .find(|request| request.url.path() == "/auth/refresh")
        .unwrap();
    assert!(refresh.headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_second_expired_response_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/signalement/detail/sig-1"))
        .respond_with(expired())
        .expect(2)
        .mount(&server)
        .await;
    mount_refresh(&server, 1).await;

    let client = client(&server, store(Some("refresh-1")), quiet_listener());
    let err = client.signalement_detail("sig-1").await.unwrap_err();

    assert_eq!(err.status(), 401);
    assert_eq!(err.kind, DetailErrorKind::TokenExpired);
}

#[tokio::test]
async fn test_invalid_token_tears_down_without_refresh() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/signalement/detail/sig-1"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "message": "Token invalide",
            "errorType": "TOKEN_INVALID"
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_refresh(&server, 0).await;

    let mut listener = MockListener::new();
    listener
        .expect_session_ended()
        .withf(|event| event.reason == EndReason::Unauthorized(ErrorType::TokenInvalid))
        .times(1)
        .return_const(());

    let client = client(&server, store(Some("refresh-1")), listener);
    let err = client.signalement_detail("sig-1").await.unwrap_err();

    assert_eq!(err.kind, DetailErrorKind::TokenInvalid);
    assert_eq!(client.session().access_token(), None);
    assert_eq!(client.session().refresh_token(), None);
}

#[tokio::test]
async fn test_forbidden_passes_through() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/admin/dashboard"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "message": "Accès refusé",
            "errorType": "FORBIDDEN"
        })))
        .mount(&server)
        .await;
    mount_refresh(&server, 0).await;

    let client = client(&server, store(Some("refresh-1")), quiet_listener());
    let err = client.dashboard_stats(Period::Week).await.unwrap_err();

    assert_eq!(err.kind, DashboardErrorKind::Forbidden);
    assert_eq!(err.error.message, "Accès refusé");
    assert_eq!(client.session().access_token().as_deref(), Some("access-1"));
}

#[tokio::test]
async fn test_missing_refresh_token_tears_down() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/signalement/detail/sig-1"))
        .respond_with(expired())
        .expect(1)
        .mount(&server)
        .await;
    mount_refresh(&server, 0).await;

    let mut listener = MockListener::new();
    listener
        .expect_session_ended()
        .withf(|event| event.reason == EndReason::MissingRefreshToken)
        .times(1)
        .return_const(());

    let client = client(&server, store(None), listener);
    let err = client.signalement_detail("sig-1").await.unwrap_err();

    assert_eq!(err.error.error_type, ErrorType::TokenExpired);
    assert!(!client.session().is_authenticated());
}

#[tokio::test]
async fn test_refresh_failure_tears_down() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/signalement/detail/sig-1"))
        .respond_with(expired())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "message": "Refresh token révoqué",
            "errorType": "TOKEN_REVOKED"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut listener = MockListener::new();
    listener
        .expect_session_ended()
        .withf(|event| event.reason == EndReason::RefreshFailed(ErrorType::TokenRevoked))
        .times(1)
        .return_const(());

    let client = client(&server, store(Some("refresh-1")), listener);
    let err = client.signalement_detail("sig-1").await.unwrap_err();

    assert_eq!(err.error.error_type, ErrorType::TokenRevoked);
    assert_eq!(err.error.message, "Refresh token révoqué");
    assert_eq!(client.session().refresh_token(), None);
}

#[tokio::test]
async fn test_late_expiry_after_failed_refresh_ends_session_once() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/signalement/detail/sig-1"))
        .respond_with(expired())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/signalement/detail/sig-2"))
        .respond_with(expired().set_delay(Duration::from_millis(400)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "message": "Refresh token révoqué",
            "errorType": "TOKEN_REVOKED"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut listener = MockListener::new();
    listener
        .expect_session_ended()
        .withf(|event| event.reason == EndReason::RefreshFailed(ErrorType::TokenRevoked))
        .times(1)
        .return_const(());

    let client = client(&server, store(Some("refresh-1")), listener);
    let (first, second) = tokio::join!(
        client.signalement_detail("sig-1"),
        client.signalement_detail("sig-2")
    );

    assert_eq!(first.unwrap_err().error.error_type, ErrorType::TokenRevoked);
    assert_eq!(second.unwrap_err().kind, DetailErrorKind::TokenExpired);
    assert!(!client.session().is_authenticated());
}

#[tokio::test]
async fn test_concurrent_expired_calls_share_one_refresh() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(expired())
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": {"accessToken": "access-2"}}))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/signalement/detail/sig-1"))
        .and(header("authorization", "Bearer access-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(detail_body("sig-1", "Premier")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/signalement/detail/sig-2"))
        .and(header("authorization", "Bearer access-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(detail_body("sig-2", "Second")))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, store(Some("refresh-1")), quiet_listener());
    let (first, second) = tokio::join!(
        client.signalement_detail("sig-1"),
        client.signalement_detail("sig-2")
    );

    assert_eq!(first.unwrap().titre, "Premier");
    assert_eq!(second.unwrap().titre, "Second");
}

#[tokio::test]
async fn test_disallowed_transition_never_reaches_network() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = client(&server, store(None), quiet_listener());

    let err = client
        .change_status(
            "sig-1",
            IncidentStatus::Closed,
            IncidentStatus::Submitted,
            "Réouverture demandée par le citoyen",
        )
        .await
        .unwrap_err();
    assert_eq!(err.status(), 400);
    assert_eq!(err.kind, UpdateStatusErrorKind::InvalidStatusTransition);

    let err = client
        .change_status("sig-1", IncidentStatus::Submitted, IncidentStatus::InProgress, " ok ")
        .await
        .unwrap_err();
    assert_eq!(err.kind, UpdateStatusErrorKind::ValidationError);
    assert!(err.error.field_error("commentaire").is_some());
}

#[tokio::test]
async fn test_allowed_transition_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/signalement/update-status/sig-1"))
        .and(body_json(json!({
            "statut": "en traitement",
            "commentaire": "Prise en charge par l'équipe"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Statut mis à jour",
            "data": {
                "signalement": {
                    "id": "sig-1",
                    "titre": "Vol",
                    "ancien_statut": "soumis",
                    "nouveau_statut": "en traitement",
                    "commentaire": "Prise en charge par l'équipe",
                    "utilisateur_notifie": true
                },
                "historique": {"id": "h1", "created_at": "2025-01-01T00:00:00Z"}
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, store(None), quiet_listener());
    let update = client
        .change_status(
            "sig-1",
            IncidentStatus::Submitted,
            IncidentStatus::InProgress,
            "  Prise en charge par l'équipe ",
        )
        .await
        .unwrap();

    assert_eq!(update.signalement.nouveau_statut, "en traitement");
    assert!(update.signalement.utilisateur_notifie);
}

#[tokio::test]
async fn test_list_filters_become_query_params() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/signalement/admin-list"))
        .and(query_param("page", "2"))
        .and(query_param("limit", "10"))
        .and(query_param("statut", "en traitement"))
        .and(query_param("search", "fraude"))
        .and(query_param_is_missing("utilisateur_id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Liste",
            "data": {
                "signalements": [{"id": "sig-1", "titre": "Fraude", "statut": "en traitement"}],
                "pagination": {"total": 11, "total_pages": 2, "current_page": 2, "limit": 10, "has_next": false, "has_prev": true},
                "stats": {"total": 11, "by_status": {"soumis": 3, "en_traitement": 5, "cloture": 2, "non_pris_en_charge": 1}, "anonymes": 4},
                "filters": {"statut": "en traitement"}
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, store(None), quiet_listener());
    let query = SignalementQuery {
        page: Some(2),
        limit: Some(10),
        statut: Some(IncidentStatus::InProgress),
        search: Some("fraude".into()),
        utilisateur_id: Some(String::new()),
        ..SignalementQuery::default()
    };
    let list = client.list_signalements(&query).await.unwrap();

    assert_eq!(list.signalements.len(), 1);
    assert_eq!(list.signalements[0].status(), Some(IncidentStatus::InProgress));
    assert!(list.pagination.has_prev);
    assert_eq!(list.stats.by_status.en_traitement, 5);
}

#[tokio::test]
async fn test_spam_body_defaults() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/signalement/spam/sig-1"))
        .and(body_json(json!({"raison": "Contenu publicitaire", "updateStatus": true})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Marqué comme spam",
            "data": {
                "flag": {"id": "f1", "signalement_id": "sig-1", "flag_type": "spam"},
                "signalement": {"id": "sig-1", "titre": "Promo", "statut": "non pris en charge", "statut_modifie": true},
                "notification": {"sent": false, "utilisateur": null}
            }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/signalement/remove-spam/sig-1"))
        .and(body_json(json!({"newStatus": "en traitement"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Marquage retiré",
            "data": {
                "flag": {"id": "f1", "signalement_id": "sig-1", "flag_type": "spam", "actif": false},
                "signalement": {"id": "sig-1", "titre": "Promo", "statut": "en traitement", "statut_modifie": true, "statut_precedent": "non pris en charge"},
                "notification": {"sent": true, "utilisateur": {"id": "u2", "nom": "Yao"}}
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, store(None), quiet_listener());

    let flagged = client
        .mark_spam("sig-1", "Contenu publicitaire", true)
        .await
        .unwrap();
    assert!(flagged.signalement.statut_modifie);

    let lifted = client
        .remove_spam("sig-1", Some(IncidentStatus::InProgress), Some("  "))
        .await
        .unwrap();
    assert_eq!(lifted.signalement.statut_precedent.as_deref(), Some("non pris en charge"));
    assert_eq!(lifted.notification.utilisateur.map(|u| u.nom).as_deref(), Some("Yao"));
}

#[tokio::test]
async fn test_blank_id_is_rejected_locally() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = client(&server, store(None), quiet_listener());
    let err = client.signalement_detail("").await.unwrap_err();

    assert_eq!(err.status(), 400);
    assert_eq!(err.kind, DetailErrorKind::SignalementNotFound);
}

#[tokio::test]
async fn test_detail_loader_discards_superseded_load() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/signalement/detail/sig-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(detail_body("sig-1", "Ancien"))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/signalement/detail/sig-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(detail_body("sig-2", "Nouveau")))
        .mount(&server)
        .await;

    let loader = DetailLoader::new(client(&server, store(None), quiet_listener()));
    let (first, second) = tokio::join!(loader.load("sig-1"), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        loader.load("sig-2").await
    });

    assert_eq!(first, LoadOutcome::Discarded);
    assert_eq!(second, LoadOutcome::Applied);
    assert_eq!(loader.current_id().as_deref(), Some("sig-2"));
    match loader.state() {
        ViewState::Loaded(detail) => assert_eq!(detail.titre, "Nouveau"),
        other => panic!("unexpected state: {other:?}"),
    }

    assert_eq!(loader.refetch().await, Some(LoadOutcome::Applied));
    assert!(matches!(loader.state(), ViewState::Loaded(_)));
}
