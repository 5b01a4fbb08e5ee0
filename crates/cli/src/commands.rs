//! CLI commands

use anyhow::{Result, bail};
use chrono::NaiveDate;
use clap::Subcommand;
use serde::Serialize;
use signalement_core::{
    IncidentStatus, IncidentType, PriorityLevel, RouteDecision, TRANSITIONS, UiPreferences,
    guard_route,
};
use signalement_http::SessionClient;
use signalement_http::types::{
    Credentials, DashboardStats, DocumentUpload, Period, SignalementDetail, SignalementList,
    SignalementQuery, SortDirection, SortField,
};
use std::path::PathBuf;
use tracing::info;

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in and store the session
    Login {
        #[arg(long, env = "SIGNALEMENT_EMAIL")]
        email: String,

        #[arg(long, env = "SIGNALEMENT_PASSWORD", hide_env_values = true)]
        password: String,

        /// Keep the refresh token in a persistent cookie
        #[arg(long)]
        remember_me: bool,
    },

    /// Revoke the session
    Logout,

    /// Show the signed-in user
    Whoami {
        /// Ask the server instead of using the cached profile
        #[arg(long)]
        fetch: bool,
    },

    /// Exchange the refresh token for a new access token
    Refresh,

    /// Dashboard statistics
    Dashboard {
        #[arg(long, default_value = "month")]
        period: Period,
    },

    /// List signalements
    List {
        #[arg(long)]
        page: Option<u32>,

        #[arg(long)]
        limit: Option<u32>,

        /// Wire value ("en traitement") or name (IN_PROGRESS)
        #[arg(long)]
        statut: Option<IncidentStatus>,

        #[arg(long = "type")]
        type_incident: Option<IncidentType>,

        #[arg(long)]
        priority: Option<PriorityLevel>,

        #[arg(long)]
        user: Option<String>,

        #[arg(long)]
        anonyme: Option<bool>,

        #[arg(long)]
        search: Option<String>,

        /// YYYY-MM-DD
        #[arg(long)]
        from: Option<NaiveDate>,

        /// YYYY-MM-DD
        #[arg(long)]
        to: Option<NaiveDate>,

        #[arg(long)]
        sort_by: Option<SortField>,

        #[arg(long)]
        sort_dir: Option<SortDirection>,
    },

    /// Show one signalement
    Show { id: String },

    /// Change the status of a signalement
    Status {
        id: String,

        status: IncidentStatus,

        /// Justification, at least 10 characters
        #[arg(long, short)]
        comment: String,
    },

    /// Statuses reachable from a status
    Transitions { status: String },

    /// Set the priority of a signalement
    Priority {
        id: String,

        level: PriorityLevel,

        #[arg(long)]
        comment: Option<String>,
    },

    /// Comment on a signalement
    Comment {
        id: String,

        text: String,

        /// Make the comment visible to the reporter
        #[arg(long)]
        public: bool,
    },

    /// Flag a signalement as spam
    Spam {
        id: String,

        #[arg(long)]
        reason: String,

        /// Leave the status untouched
        #[arg(long)]
        keep_status: bool,
    },

    /// Lift a spam flag
    Unspam {
        id: String,

        #[arg(long)]
        status: Option<IncidentStatus>,

        #[arg(long)]
        reason: Option<String>,
    },

    /// Attach documents to a signalement
    Upload {
        id: String,

        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Also move the signalement to this status
        #[arg(long)]
        status: Option<IncidentStatus>,
    },

    /// Show or change interface preferences
    Prefs {
        #[arg(long)]
        sidebar_collapsed: Option<bool>,

        #[arg(long)]
        dark_mode: Option<bool>,
    },

    /// Where the navigation guard sends a path
    Route { path: String },
}

impl Commands {
    pub async fn execute(self, client: SessionClient, json: bool) -> Result<()> {
        match self {
            Self::Login {
                email,
                password,
                remember_me,
            } => {
                let data = client
                    .login(Credentials { email, password }, remember_me)
                    .await?;
                info!(remember_me, "Logged in");
                println!("Connecté en tant que {} ({})", data.user.fullname, data.user.email);
                Ok(())
            }
            Self::Logout => {
                let message = client.logout().await?;
                println!("{}", non_empty(&message, "Déconnexion réussie"));
                Ok(())
            }
            Self::Whoami { fetch } => {
                let user = if fetch {
                    Some(client.me().await?.user)
                } else {
                    client.current_user()
                };
                match user {
                    Some(user) if json => print_json(&user),
                    Some(user) => {
                        let role = user.role.map_or("-", |r| r.label());
                        println!("{} <{}> [{role}]", user.nom, user.email);
                        Ok(())
                    }
                    None => bail!("Aucun utilisateur connecté"),
                }
            }
            Self::Refresh => {
                let data = client.refresh_token().await?;
                println!(
                    "Token rafraîchi{}",
                    data.expires.map(|e| format!(", expire le {e}")).unwrap_or_default()
                );
                Ok(())
            }
            Self::Dashboard { period } => {
                let stats = client.dashboard_stats(period).await?;
                if json {
                    print_json(&stats)
                } else {
                    print_dashboard(&stats);
                    Ok(())
                }
            }
            Self::List {
                page,
                limit,
                statut,
                type_incident,
                priority,
                user,
                anonyme,
                search,
                from,
                to,
                sort_by,
                sort_dir,
            } => {
                let query = SignalementQuery {
                    page,
                    limit,
                    statut,
                    type_incident,
                    priority_level: priority,
                    utilisateur_id: user,
                    anonyme,
                    search,
                    date_debut: from,
                    date_fin: to,
                    sort_by,
                    sort_dir,
                };
                let list = client.list_signalements(&query).await?;
                if json {
                    print_json(&list)
                } else {
                    print_list(&list);
                    Ok(())
                }
            }
            Self::Show { id } => {
                let detail = client.signalement_detail(&id).await?;
                if json {
                    print_json(&detail)
                } else {
                    print_detail(&detail);
                    Ok(())
                }
            }
            Self::Status {
                id,
                status,
                comment,
            } => {
                let detail = client.signalement_detail(&id).await?;
                let Some(current) = detail.status() else {
                    bail!("Statut actuel inconnu: {}", detail.statut);
                };
                let update = client.change_status(&id, current, status, &comment).await?;
                println!(
                    "{}: {} -> {}",
                    update.signalement.titre,
                    update.signalement.ancien_statut,
                    update.signalement.nouveau_statut
                );
                Ok(())
            }
            Self::Transitions { status } => {
                let next = TRANSITIONS.allowed_next_for(&status);
                if next.is_empty() {
                    bail!("Statut inconnu: {status}");
                }
                for status in next {
                    println!("{} ({})", status.as_str(), status.label());
                }
                Ok(())
            }
            Self::Priority { id, level, comment } => {
                let update = client.flag_priority(&id, level, comment.as_deref()).await?;
                println!(
                    "{}: priorité {}",
                    update.signalement.titre,
                    non_empty(&update.signalement.nouvelle_priorite, level.label())
                );
                Ok(())
            }
            Self::Comment { id, text, public } => {
                let added = client.add_comment(&id, &text, !public).await?;
                let visibility = if added.commentaire.interne {
                    "interne"
                } else {
                    "public"
                };
                println!("Commentaire {} ajouté ({visibility})", added.commentaire.id);
                Ok(())
            }
            Self::Spam {
                id,
                reason,
                keep_status,
            } => {
                let flagged = client.mark_spam(&id, &reason, !keep_status).await?;
                println!(
                    "{} marqué comme spam (statut: {})",
                    flagged.signalement.titre, flagged.signalement.statut
                );
                Ok(())
            }
            Self::Unspam { id, status, reason } => {
                let lifted = client.remove_spam(&id, status, reason.as_deref()).await?;
                println!(
                    "Marquage spam retiré de {} (statut: {})",
                    lifted.signalement.titre, lifted.signalement.statut
                );
                Ok(())
            }
            Self::Upload { id, files, status } => {
                let documents = files
                    .iter()
                    .map(DocumentUpload::from_path)
                    .collect::<std::io::Result<Vec<_>>>()?;
                let result = client
                    .transfer_documents(&id, documents, status.is_some(), status)
                    .await?;
                for doc in &result.documents {
                    println!("{} ({} octets) {}", doc.nom_fichier, doc.taille, doc.url);
                }
                if result.statut_modifie {
                    println!("Statut mis à jour");
                }
                Ok(())
            }
            Self::Prefs {
                sidebar_collapsed,
                dark_mode,
            } => {
                let session = client.session();
                let mut prefs = session.preferences();
                if sidebar_collapsed.is_some() || dark_mode.is_some() {
                    prefs = UiPreferences {
                        sidebar_collapsed: sidebar_collapsed.unwrap_or(prefs.sidebar_collapsed),
                        dark_mode: dark_mode.unwrap_or(prefs.dark_mode),
                    };
                    session.save_preferences(prefs)?;
                }
                print_json(&prefs)
            }
            Self::Route { path } => {
                let authenticated = client.session().is_authenticated();
                match guard_route(&path, authenticated, client.login_path()) {
                    RouteDecision::Proceed => println!("{path}"),
                    RouteDecision::RedirectToLogin => println!("-> {}", client.login_path()),
                    RouteDecision::RedirectHome => println!("-> /"),
                }
                Ok(())
            }
        }
    }
}

fn non_empty<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() { fallback } else { value }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_dashboard(stats: &DashboardStats) {
    let periode = &stats.metadata.periode;
    println!("Période: {} ({} - {})", periode.kind, periode.debut, periode.fin);
    println!(
        "Signalements: {} (+{})",
        stats.signalements.total, stats.signalements.nouveaux
    );
    for (statut, count) in &stats.signalements.par_statut {
        println!("  {statut}: {count}");
    }
    for entry in &stats.signalements.par_type {
        println!("  {}: {}", entry.kind, entry.count);
    }
    println!(
        "Utilisateurs: {} (+{})",
        stats.utilisateurs.total, stats.utilisateurs.nouveaux
    );
    println!(
        "Activité: {} commentaires, {} notifications",
        stats.activite.commentaires, stats.activite.notifications
    );
}

fn print_list(list: &SignalementList) {
    for item in &list.signalements {
        let author = if item.anonyme {
            "anonyme".to_string()
        } else {
            item.utilisateur
                .as_ref()
                .map_or_else(|| "-".to_string(), |u| u.nom.clone())
        };
        println!(
            "{}  [{}]  {}  ({}, {})",
            item.id, item.statut, item.titre, item.type_incident, author
        );
    }
    let page = &list.pagination;
    println!(
        "Page {}/{} - {} signalements",
        page.current_page, page.total_pages, page.total
    );
}

fn print_detail(detail: &SignalementDetail) {
    println!("{} [{}]", detail.titre, detail.statut);
    println!("Type: {}", detail.type_incident);
    if let Some(priority) = &detail.priority_level {
        println!("Priorité: {priority}");
    }
    println!("Créé le: {}", detail.date_creation);
    if let Some(loc) = &detail.localisation {
        println!("Lieu: {}, {}", loc.ville, loc.pays);
    }
    println!();
    println!("{}", detail.description);

    if let Some(status) = detail.status() {
        let next: Vec<_> = status.allowed_next().iter().map(|s| s.as_str()).collect();
        println!();
        println!("Transitions possibles: {}", next.join(", "));
    }
    if !detail.preuves.is_empty() {
        println!();
        println!("Preuves:");
        for proof in &detail.preuves {
            println!("  {} {}", proof.nom, proof.url);
        }
    }
    if !detail.commentaires.is_empty() {
        println!();
        println!("Commentaires:");
        for comment in &detail.commentaires {
            let scope = if comment.interne { " (interne)" } else { "" };
            println!("  {} {}{scope}: {}", comment.date, comment.auteur.nom, comment.contenu);
        }
    }
}
