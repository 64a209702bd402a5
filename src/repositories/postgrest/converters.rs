use anyhow::anyhow;

use super::models::{
    CommentInsert, CommentRow, ConfessionInsert, ConfessionPatch, ConfessionRow, ErrorBody,
    ProfileInsert, ProfilePatch, ProfileRow, ReportInsert, ReportRow,
};
use super::super::{
    ConfessionMutation, NewComment, NewConfession, NewProfile, NewReport, ProfileMutation,
    RepositoryError, Result as RepoResult,
};
use crate::entities::{Comment, Confession, Profile, Report, DEFAULT_CATEGORY};

/// single-row request matched no row.
const NO_ROWS: &str = "PGRST116";
/// postgres `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

pub fn convert_repo_err<T, E>(result: Result<T, E>) -> RepoResult<T>
where E: Sync + Send + ::std::error::Error + 'static {
    result.map_err(|e| RepositoryError::Internal(anyhow!(e)))
}

/// maps a failed PostgREST response onto the repository error kinds.
pub fn classify(status: u16, body: &str) -> RepositoryError {
    let ErrorBody {
        code,
        message,
        details,
    } = ::serde_json::from_str(body).unwrap_or_default();

    match (status, code.as_deref()) {
        (_, Some(NO_ROWS)) | (406, _) => RepositoryError::NotFound,
        (_, Some(UNIQUE_VIOLATION)) | (409, _) => RepositoryError::Conflict(
            details
                .or(message)
                .unwrap_or_else(|| "duplicate key".to_string()),
        ),
        _ => RepositoryError::Internal(anyhow!(
            "postgrest responded {}: {}",
            status,
            message.unwrap_or_else(|| body.to_string())
        )),
    }
}

/// total row count from a `Content-Range` header such as `0-24/57` or `*/0`.
pub fn parse_content_range(header: &str) -> Option<u64> {
    let (_, total) = header.trim().rsplit_once('/')?;

    total.parse().ok()
}

pub fn first_or_404<T>(mut rows: Vec<T>) -> RepoResult<T> {
    match rows.len() {
        0 => Err(RepositoryError::NotFound),
        _ => Ok(rows.remove(0)),
    }
}

impl From<ProfileRow> for Profile {
    fn from(
        ProfileRow {
            id,
            firebase_uid,
            username,
            is_admin,
            created_at,
        }: ProfileRow,
    ) -> Self {
        Profile {
            id,
            firebase_uid,
            username,
            is_admin: is_admin.unwrap_or(false),
            created_at,
        }
    }
}

impl From<NewProfile> for ProfileInsert {
    fn from(
        NewProfile {
            firebase_uid,
            username,
        }: NewProfile,
    ) -> Self {
        ProfileInsert {
            firebase_uid,
            username,
        }
    }
}

impl From<ProfileMutation> for ProfilePatch {
    fn from(ProfileMutation { is_admin }: ProfileMutation) -> Self { ProfilePatch { is_admin } }
}

impl From<ConfessionRow> for Confession {
    fn from(
        ConfessionRow {
            id,
            user_id,
            username,
            content,
            category,
            support_count,
            is_flagged,
            created_at,
        }: ConfessionRow,
    ) -> Self {
        Confession {
            id,
            user_id,
            username,
            content,
            category: category.unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            support_count: support_count.unwrap_or(0),
            is_flagged: is_flagged.unwrap_or(false),
            created_at,
        }
    }
}

impl From<NewConfession> for ConfessionInsert {
    fn from(
        NewConfession {
            user_id,
            username,
            content,
            category,
        }: NewConfession,
    ) -> Self {
        ConfessionInsert {
            user_id,
            username,
            content,
            category,
        }
    }
}

impl From<ConfessionMutation> for ConfessionPatch {
    fn from(
        ConfessionMutation {
            support_count,
            is_flagged,
        }: ConfessionMutation,
    ) -> Self {
        ConfessionPatch {
            support_count,
            is_flagged,
        }
    }
}

impl From<CommentRow> for Comment {
    fn from(
        CommentRow {
            confession_id,
            user_id,
            username,
            comment,
            created_at,
        }: CommentRow,
    ) -> Self {
        Comment {
            confession_id,
            user_id,
            username,
            comment,
            created_at,
        }
    }
}

impl From<NewComment> for CommentInsert {
    fn from(
        NewComment {
            confession_id,
            user_id,
            username,
            comment,
        }: NewComment,
    ) -> Self {
        CommentInsert {
            confession_id,
            user_id,
            username,
            comment,
        }
    }
}

impl From<ReportRow> for Report {
    fn from(
        ReportRow {
            id,
            target_id,
            target_type,
            reason,
            created_at,
        }: ReportRow,
    ) -> Self {
        Report {
            id,
            target_id,
            target_type: target_type.unwrap_or_default(),
            reason,
            created_at,
        }
    }
}

impl From<NewReport> for ReportInsert {
    fn from(
        NewReport {
            target_id,
            target_type,
            reason,
        }: NewReport,
    ) -> Self {
        ReportInsert {
            target_id,
            target_type,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_rows_is_not_found() {
        let body = r#"{"code":"PGRST116","details":"The result contains 0 rows","hint":null,"message":"JSON object requested, multiple (or no) rows returned"}"#;

        assert!(matches!(classify(406, body), RepositoryError::NotFound));
        assert!(matches!(classify(406, ""), RepositoryError::NotFound));
    }

    #[test]
    fn unique_violation_is_conflict() {
        let body = r#"{"code":"23505","details":"Key (username)=(alice) already exists.","hint":null,"message":"duplicate key value violates unique constraint \"profiles_username_key\""}"#;

        match classify(409, body) {
            RepositoryError::Conflict(m) => assert!(m.contains("alice")),
            e => panic!("unexpected: {:?}", e),
        }
    }

    #[test]
    fn other_failures_are_internal() {
        let body = r#"{"code":"42703","message":"column confessions.nope does not exist"}"#;

        match classify(400, body) {
            RepositoryError::Internal(e) => assert!(e.to_string().contains("nope")),
            e => panic!("unexpected: {:?}", e),
        }
        assert!(matches!(
            classify(502, "bad gateway"),
            RepositoryError::Internal(_)
        ));
    }

    #[test]
    fn content_range_totals() {
        assert_eq!(parse_content_range("0-24/57"), Some(57));
        assert_eq!(parse_content_range("*/0"), Some(0));
        assert_eq!(parse_content_range(" */12 "), Some(12));
        assert_eq!(parse_content_range("0-24/*"), None);
        assert_eq!(parse_content_range("garbage"), None);
    }

    #[test]
    fn nullable_columns_fall_back_to_defaults() {
        let row: ConfessionRow = ::serde_json::from_str(
            r#"{
                "id": "6f0c2a5e-3b59-4a53-9a0c-0f5d1a1b2c3d",
                "user_id": "0d4f7c1e-8a2b-4c3d-9e5f-6a7b8c9d0e1f",
                "username": "alice",
                "content": "a confession long enough",
                "category": null,
                "support_count": null,
                "created_at": "2024-05-20T12:00:00.123456+00:00"
            }"#,
        )
        .unwrap();

        let c: Confession = row.into();
        assert_eq!(c.category, DEFAULT_CATEGORY);
        assert_eq!(c.support_count, 0);
        assert!(!c.is_flagged);
    }
}
