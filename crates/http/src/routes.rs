//! Backend routes, relative to the configured base URL

pub const LOGIN: &str = "/auth/login";
pub const LOGOUT: &str = "/auth/logout";
pub const ME: &str = "/auth/me";
pub const REFRESH: &str = "/auth/refresh";

pub const DASHBOARD: &str = "/admin/dashboard";

pub const SIGNALEMENT_ADMIN_LIST: &str = "/signalement/admin-list";

fn with_id(prefix: &str, id: &str) -> String {
    format!("{prefix}/{}", urlencoding::encode(id))
}

pub fn signalement_detail(id: &str) -> String {
    with_id("/signalement/detail", id)
}

pub fn signalement_update_status(id: &str) -> String {
    with_id("/signalement/update-status", id)
}

pub fn signalement_flag(id: &str) -> String {
    with_id("/signalement/flag", id)
}

pub fn signalement_comment(id: &str) -> String {
    with_id("/signalement/comment", id)
}

pub fn signalement_spam(id: &str) -> String {
    with_id("/signalement/spam", id)
}

pub fn signalement_remove_spam(id: &str) -> String {
    with_id("/signalement/remove-spam", id)
}

pub fn signalement_transfer_documents(id: &str) -> String {
    with_id("/signalement/transfer-documents", id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_path_encoded() {
        assert_eq!(signalement_detail("sig-42"), "/signalement/detail/sig-42");
        assert_eq!(
            signalement_remove_spam("a/b c"),
            "/signalement/remove-spam/a%2Fb%20c"
        );
    }
}
