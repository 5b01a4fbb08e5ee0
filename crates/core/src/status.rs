//! Incident lifecycle vocabulary and the status transition policy

use crate::error::CoreError;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Minimum number of characters a status-change justification must contain
pub const MIN_JUSTIFICATION_LEN: usize = 10;

/// Lifecycle status of a signalement
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IncidentStatus {
    #[serde(rename = "soumis")]
    Submitted,
    #[serde(rename = "en traitement")]
    InProgress,
    #[serde(rename = "clôturé")]
    Closed,
    #[serde(rename = "non pris en charge")]
    NotHandled,
}

impl IncidentStatus {
    pub const ALL: [Self; 4] = [
        Self::Submitted,
        Self::InProgress,
        Self::Closed,
        Self::NotHandled,
    ];

    /// Value used on the wire
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Submitted => "soumis",
            Self::InProgress => "en traitement",
            Self::Closed => "clôturé",
            Self::NotHandled => "non pris en charge",
        }
    }

    /// Human readable label
    pub const fn label(self) -> &'static str {
        match self {
            Self::Submitted => "Soumis",
            Self::InProgress => "En traitement",
            Self::Closed => "Clôturé",
            Self::NotHandled => "Non pris en charge",
        }
    }

    /// Statuses reachable from this one
    pub fn allowed_next(self) -> &'static [Self] {
        TRANSITIONS.allowed_next(self)
    }

    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_next().contains(&next)
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IncidentStatus {
    type Err = CoreError;

    /// Accepts the wire value or the upper-case variant name (`IN_PROGRESS`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == trimmed)
            .or_else(|| match trimmed.to_ascii_uppercase().as_str() {
                "SUBMITTED" => Some(Self::Submitted),
                "IN_PROGRESS" => Some(Self::InProgress),
                "CLOSED" => Some(Self::Closed),
                "NOT_HANDLED" => Some(Self::NotHandled),
                _ => None,
            })
            .ok_or_else(|| CoreError::unknown_variant("incident status", s))
    }
}

/// Immutable mapping from a status to the statuses it may move to
#[derive(Debug, Clone)]
pub struct StatusTransitionTable {
    transitions: BTreeMap<IncidentStatus, Vec<IncidentStatus>>,
}

/// Process-wide transition table, built on first use
pub static TRANSITIONS: Lazy<StatusTransitionTable> = Lazy::new(StatusTransitionTable::standard);

impl StatusTransitionTable {
    /// The lifecycle enforced by the platform
    pub fn standard() -> Self {
        use IncidentStatus::{Closed, InProgress, NotHandled, Submitted};

        let transitions = BTreeMap::from([
            (Submitted, vec![InProgress, Closed, NotHandled]),
            (InProgress, vec![Closed, NotHandled]),
            (Closed, vec![InProgress]),
            (NotHandled, vec![InProgress]),
        ]);
        Self { transitions }
    }

    pub fn allowed_next(&self, current: IncidentStatus) -> &[IncidentStatus] {
        self.transitions
            .get(&current)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Lookup by raw wire value. Unrecognized values yield an empty set.
    pub fn allowed_next_for(&self, raw: &str) -> &[IncidentStatus] {
        match raw.parse::<IncidentStatus>() {
            Ok(status) => self.allowed_next(status),
            Err(_) => {
                warn!(status = raw, "Unrecognized incident status");
                &[]
            }
        }
    }
}

/// Statuses selectable from `current`
pub fn allowed_next_statuses(current: IncidentStatus) -> &'static [IncidentStatus] {
    TRANSITIONS.allowed_next(current)
}

/// Reason a status change was refused before reaching the backend
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("Le nouveau statut est identique au statut actuel ({status})")]
    NoChange { status: IncidentStatus },

    #[error("La transition de « {from} » vers « {to} » n'est pas autorisée")]
    NotAllowed {
        from: IncidentStatus,
        to: IncidentStatus,
    },

    #[error("Le commentaire doit contenir au moins {min} caractères")]
    JustificationTooShort { min: usize, actual: usize },
}

impl TransitionError {
    /// Backend error tag this rejection corresponds to
    pub const fn error_tag(&self) -> &'static str {
        match self {
            Self::NoChange { .. } => "NO_STATUS_CHANGE",
            Self::NotAllowed { .. } => "INVALID_STATUS_TRANSITION",
            Self::JustificationTooShort { .. } => "VALIDATION_ERROR",
        }
    }

    /// Form field and message for inline feedback
    pub fn field_error(&self) -> Option<(&'static str, String)> {
        match self {
            Self::JustificationTooShort { min, .. } => Some((
                "commentaire",
                format!("Le commentaire est trop court (minimum {min} caractères)"),
            )),
            Self::NotAllowed { .. } | Self::NoChange { .. } => {
                Some(("statut", self.to_string()))
            }
        }
    }
}

/// A status change that passed the client-side guard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub next: IncidentStatus,
    pub justification: String,
}

impl StatusChange {
    /// Check the transition table and the justification length
    pub fn validate(
        current: IncidentStatus,
        next: IncidentStatus,
        justification: &str,
    ) -> Result<Self, TransitionError> {
        if current == next {
            return Err(TransitionError::NoChange { status: current });
        }
        if !current.can_transition_to(next) {
            return Err(TransitionError::NotAllowed {
                from: current,
                to: next,
            });
        }

        let justification = justification.trim();
        let actual = justification.chars().count();
        if actual < MIN_JUSTIFICATION_LEN {
            return Err(TransitionError::JustificationTooShort {
                min: MIN_JUSTIFICATION_LEN,
                actual,
            });
        }

        Ok(Self {
            next,
            justification: justification.to_string(),
        })
    }
}

/// Severity classification, orthogonal to the lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityLevel {
    Normal,
    Important,
    Urgent,
    Critique,
}

impl PriorityLevel {
    pub const ALL: [Self; 4] = [Self::Normal, Self::Important, Self::Urgent, Self::Critique];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Important => "important",
            Self::Urgent => "urgent",
            Self::Critique => "critique",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Important => "Important",
            Self::Urgent => "Urgent",
            Self::Critique => "Critique",
        }
    }
}

impl fmt::Display for PriorityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PriorityLevel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|level| level.as_str() == lowered)
            .ok_or_else(|| CoreError::unknown_variant("priority level", s))
    }
}

/// Incident categories offered by the reporting form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IncidentType {
    #[serde(rename = "Arnaque en ligne")]
    OnlineScam,
    #[serde(rename = "Harcèlement")]
    Harassment,
    #[serde(rename = "Vol d'identité")]
    IdentityTheft,
    #[serde(rename = "Phishing")]
    Phishing,
    #[serde(rename = "Diffusion de contenu illégal")]
    IllegalContent,
    #[serde(rename = "Piratage de compte")]
    AccountTakeover,
    #[serde(rename = "Autre")]
    Other,
}

impl IncidentType {
    pub const ALL: [Self; 7] = [
        Self::OnlineScam,
        Self::Harassment,
        Self::IdentityTheft,
        Self::Phishing,
        Self::IllegalContent,
        Self::AccountTakeover,
        Self::Other,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OnlineScam => "Arnaque en ligne",
            Self::Harassment => "Harcèlement",
            Self::IdentityTheft => "Vol d'identité",
            Self::Phishing => "Phishing",
            Self::IllegalContent => "Diffusion de contenu illégal",
            Self::AccountTakeover => "Piratage de compte",
            Self::Other => "Autre",
        }
    }
}

impl fmt::Display for IncidentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IncidentType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| CoreError::unknown_variant("incident type", s))
    }
}

/// Kind of evidence attached to a signalement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProofType {
    Document,
    Image,
    Video,
    Lien,
}

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Root,
    Admin,
    Citoyen,
}

impl UserRole {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Root => "Super administrateur",
            Self::Admin => "Administrateur",
            Self::Citoyen => "Citoyen",
        }
    }
}
