//! Admin dashboard statistics

use super::ApiRequest;
use super::error::ApiError;
use super::interceptor::SessionClient;
use super::service::{ServiceError, make_service};
use crate::routes;
use crate::types::{DashboardStats, Envelope, Period};

crate::error_kind! {
    /// Documented failures of `GET /admin/dashboard`
    pub enum DashboardErrorKind {
        Unauthorized,
        TokenExpired,
        Forbidden,
        ValidationError,
        ServerError,
    }
}

impl SessionClient {
    /// Aggregated statistics over `period`
    pub async fn dashboard_stats(
        &self,
        period: Period,
    ) -> Result<DashboardStats, ServiceError<DashboardErrorKind>> {
        let service = make_service(
            "Erreur lors du chargement des statistiques",
            move |period: Period| async move {
                let request = ApiRequest::get(routes::DASHBOARD).query([("period", period.as_str())]);
                let response: Envelope<DashboardStats> = self.send(&request).await?;
                Ok::<_, ApiError>(response.data)
            },
        );
        service.call(period).await
    }
}
