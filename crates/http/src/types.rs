//! Wire types for the signalement admin API

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use signalement_core::{IncidentStatus, IncidentType, PriorityLevel, ProofType, UserRole};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Success envelope: `{message, data}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub message: String,
    pub data: T,
}

/// Response carrying only a message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledgement {
    #[serde(default)]
    pub message: String,
}

/// Parse a backend timestamp; anything but RFC 3339 yields `None`
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|at| at.with_timezone(&Utc))
}

// Authentication

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginData {
    pub user: LoginUser,
    pub tokens: LoginTokens,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginUser {
    pub id: String,
    pub fullname: String,
    pub email: String,
    pub role: Option<UserRole>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoginTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires: Option<String>,
    pub can_refresh: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RefreshData {
    pub access_token: String,
    pub expires: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MeData {
    pub user: UserProfile,
    pub token_info: Option<TokenInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub id: String,
    pub nom: String,
    pub numero: String,
    pub email: String,
    pub role: Option<UserRole>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TokenInfo {
    pub duration: String,
    pub can_refresh: bool,
    pub message: String,
}

// Dashboard

/// Aggregation window of the dashboard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Day,
    Week,
    #[default]
    Month,
    Year,
    All,
}

impl Period {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
            Self::All => "all",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            "all" => Ok(Self::All),
            other => Err(format!("unknown period: {other}")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardStats {
    pub metadata: DashboardMetadata,
    pub utilisateurs: UserStats,
    pub signalements: SignalementCounts,
    pub publications: PublicationStats,
    pub activite: ActivityStats,
    pub evenements_systeme: Vec<SystemEvent>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardMetadata {
    pub periode: PeriodWindow,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeriodWindow {
    pub debut: String,
    pub fin: String,
    #[serde(rename = "type")]
    pub kind: Period,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserStats {
    pub total: u64,
    pub nouveaux: u64,
    pub par_role: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalementCounts {
    pub total: u64,
    pub nouveaux: u64,
    pub par_statut: BTreeMap<String, u64>,
    pub par_type: Vec<TypeCount>,
    pub par_priorite: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeCount {
    #[serde(rename = "type")]
    pub kind: String,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublicationStats {
    pub total: u64,
    pub nouvelles: u64,
    pub par_sensibilite: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityStats {
    pub commentaires: u64,
    pub notifications: u64,
    pub par_jour: Vec<DailyActivity>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyActivity {
    pub date: String,
    pub signalements: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemEvent {
    pub id: String,
    pub message: String,
    pub source: String,
    pub action: String,
    pub status: String,
    pub date: String,
}

// Listing

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    CreatedAt,
    UpdatedAt,
    TypeIncident,
    Statut,
    Titre,
}

impl SortField {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
            Self::TypeIncident => "type_incident",
            Self::Statut => "statut",
            Self::Titre => "titre",
        }
    }
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            Self::CreatedAt,
            Self::UpdatedAt,
            Self::TypeIncident,
            Self::Statut,
            Self::Titre,
        ]
        .into_iter()
        .find(|field| field.as_str() == s.trim())
        .ok_or_else(|| format!("unknown sort field: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(format!("unknown sort direction: {other}")),
        }
    }
}

/// Pagination and filters of the admin list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignalementQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub statut: Option<IncidentStatus>,
    pub type_incident: Option<IncidentType>,
    pub priority_level: Option<PriorityLevel>,
    pub utilisateur_id: Option<String>,
    pub anonyme: Option<bool>,
    pub search: Option<String>,
    pub date_debut: Option<NaiveDate>,
    pub date_fin: Option<NaiveDate>,
    pub sort_by: Option<SortField>,
    pub sort_dir: Option<SortDirection>,
}

impl SignalementQuery {
    /// Query parameters; unset and empty values are left out
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let date = |d: &NaiveDate| d.format("%Y-%m-%d").to_string();
        let candidates = [
            ("page", self.page.map(|v| v.to_string())),
            ("limit", self.limit.map(|v| v.to_string())),
            ("statut", self.statut.map(|v| v.as_str().to_string())),
            ("type_incident", self.type_incident.map(|v| v.as_str().to_string())),
            ("priority_level", self.priority_level.map(|v| v.as_str().to_string())),
            ("utilisateur_id", self.utilisateur_id.clone()),
            ("anonyme", self.anonyme.map(|v| v.to_string())),
            ("search", self.search.clone()),
            ("date_debut", self.date_debut.as_ref().map(date)),
            ("date_fin", self.date_fin.as_ref().map(date)),
            ("sort_by", self.sort_by.map(|v| v.as_str().to_string())),
            ("sort_dir", self.sort_dir.map(|v| v.as_str().to_string())),
        ];

        candidates
            .into_iter()
            .filter_map(|(key, value)| {
                let value = value?;
                (!value.trim().is_empty()).then_some((key, value))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalementList {
    pub signalements: Vec<SignalementSummary>,
    pub pagination: Pagination,
    pub stats: ListStats,
    pub filters: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalementSummary {
    pub id: String,
    pub type_incident: String,
    pub titre: String,
    pub description: String,
    pub anonyme: bool,
    pub statut: String,
    pub priority_level: Option<String>,
    pub date_creation: String,
    pub date_modification: String,
    pub utilisateur: Option<UserRef>,
    pub preuves_count: u64,
    pub commentaires_count: u64,
    pub dernier_commentaire: Option<String>,
    pub preuves: Vec<Proof>,
}

impl SignalementSummary {
    pub fn status(&self) -> Option<IncidentStatus> {
        self.statut.parse().ok()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserRef {
    pub id: String,
    pub nom: String,
    pub email: String,
    pub numero: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pagination {
    pub total: u64,
    pub total_pages: u64,
    pub current_page: u64,
    pub limit: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListStats {
    pub total: u64,
    pub by_status: StatusCounts,
    pub anonymes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusCounts {
    pub soumis: u64,
    pub en_traitement: u64,
    pub cloture: u64,
    pub non_pris_en_charge: u64,
}

// Detail

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalementDetail {
    pub id: String,
    pub type_incident: String,
    pub titre: String,
    pub description: String,
    pub anonyme: bool,
    pub statut: String,
    pub priority_level: Option<String>,
    pub date_creation: String,
    pub date_modification: String,
    pub localisation: Option<Location>,
    pub utilisateur: Option<UserRef>,
    pub preuves: Vec<Proof>,
    pub commentaires: Vec<Comment>,
}

impl SignalementDetail {
    pub fn status(&self) -> Option<IncidentStatus> {
        self.statut.parse().ok()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub ville: String,
    pub pays: String,
    pub source: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Proof {
    pub id: String,
    pub nom: String,
    #[serde(rename = "type")]
    pub kind: Option<ProofType>,
    pub url: String,
    pub taille: Option<u64>,
    pub date_ajout: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Comment {
    pub id: String,
    pub contenu: String,
    pub date: String,
    pub interne: bool,
    pub auteur: CommentAuthor,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommentAuthor {
    pub id: String,
    pub nom: String,
    pub role: Option<UserRole>,
}

// Actions

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub statut: IncidentStatus,
    pub commentaire: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusUpdate {
    pub signalement: StatusChangeRecord,
    pub historique: HistoryEntry,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusChangeRecord {
    pub id: String,
    pub titre: String,
    pub ancien_statut: String,
    pub nouveau_statut: String,
    pub commentaire: String,
    pub utilisateur_notifie: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryEntry {
    pub id: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagRequest {
    pub priority_level: PriorityLevel,
    pub commentaire: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityUpdate {
    pub signalement: PriorityChangeRecord,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityChangeRecord {
    pub id: String,
    pub titre: String,
    pub ancienne_priorite: String,
    pub nouvelle_priorite: String,
    pub commentaire: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRequest {
    pub contenu: String,
    pub private: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommentAdded {
    pub commentaire: CreatedComment,
    pub notification_envoyee: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreatedComment {
    pub id: String,
    pub contenu: String,
    pub signalement_id: String,
    pub interne: bool,
    pub created_at: String,
    pub utilisateur: CommentAuthor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpamRequest {
    pub raison: String,
    pub update_status: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpamFlagged {
    pub flag: SpamFlag,
    pub signalement: SpamTarget,
    pub notification: NotificationInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpamFlag {
    pub id: String,
    pub signalement_id: String,
    pub flag_type: String,
    pub raison: Option<String>,
    pub created_at: Option<String>,
    pub actif: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpamTarget {
    pub id: String,
    pub titre: String,
    pub statut: String,
    pub statut_modifie: bool,
    pub statut_precedent: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationInfo {
    pub sent: bool,
    pub utilisateur: Option<NotifiedUser>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifiedUser {
    pub id: String,
    pub nom: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveSpamRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_status: Option<IncidentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raison: Option<String>,
}

impl RemoveSpamRequest {
    pub fn is_empty(&self) -> bool {
        self.new_status.is_none() && self.raison.as_deref().is_none_or(str::is_empty)
    }
}

/// A file to attach to a signalement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentUpload {
    pub file_name: String,
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentsTransferred {
    pub signalement_id: String,
    pub documents: Vec<TransferredDocument>,
    pub message: String,
    pub statut_modifie: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferredDocument {
    pub id: String,
    pub nom_fichier: String,
    pub type_fichier: Option<ProofType>,
    pub url: String,
    pub taille: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_omits_unset_and_empty_values() {
        let query = SignalementQuery {
            page: Some(2),
            limit: Some(20),
            statut: Some(IncidentStatus::InProgress),
            search: Some("   ".into()),
            utilisateur_id: Some(String::new()),
            date_debut: NaiveDate::from_ymd_opt(2024, 3, 1),
            sort_dir: Some(SortDirection::Desc),
            ..SignalementQuery::default()
        };

        assert_eq!(
            query.to_pairs(),
            vec![
                ("page", "2".to_string()),
                ("limit", "20".to_string()),
                ("statut", "en traitement".to_string()),
                ("date_debut", "2024-03-01".to_string()),
                ("sort_dir", "desc".to_string()),
            ]
        );
        assert!(SignalementQuery::default().to_pairs().is_empty());
    }

    #[test]
    fn remove_spam_body_skips_unset_fields() {
        let request = RemoveSpamRequest {
            new_status: Some(IncidentStatus::InProgress),
            raison: None,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({"newStatus": "en traitement"})
        );
        assert!(RemoveSpamRequest::default().is_empty());
    }

    #[test]
    fn detail_tolerates_missing_fields() {
        let detail: SignalementDetail = serde_json::from_value(serde_json::json!({
            "id": "s1",
            "statut": "clôturé",
            "localisation": null,
            "preuves": [{"id": "p1", "nom": "capture.png", "type": "IMAGE", "url": "https://x"}]
        }))
        .unwrap();
        assert_eq!(detail.status(), Some(IncidentStatus::Closed));
        assert_eq!(detail.preuves[0].kind, Some(ProofType::Image));
        assert!(detail.commentaires.is_empty());
    }

    #[test]
    fn timestamps_parse_rfc3339_only() {
        assert!(parse_timestamp("2025-01-01T10:00:00Z").is_some());
        assert!(parse_timestamp("1h").is_none());
    }
}
