//! Local media storage for CVs and reports.
//!
//! Files live under `MEDIA_ROOT/<kind>/<owner id>/<uuid>_<name>`; rows keep
//! the path relative to the media root.

use log::{debug, warn};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use uuid::Uuid;

use crate::config::{ApiError, AppConfig};

pub const CV_DIR: &str = "cv";
pub const OUTBREAK_REPORT_DIR: &str = "outbreak_reports";
pub const DEPLOYMENT_REPORT_DIR: &str = "deployment_reports";

const MAX_NAME_CHARS: usize = 100;

/// Reduces a client supplied file name to a safe single path segment.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_NAME_CHARS)
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Name to offer on download: the stored name without its uuid prefix.
pub fn download_name(relative: &str) -> String {
    let stored = relative.rsplit('/').next().unwrap_or(relative);
    match stored.split_once('_') {
        Some((prefix, rest)) if Uuid::parse_str(prefix).is_ok() && !rest.is_empty() => rest.to_string(),
        _ => stored.to_string(),
    }
}

fn resolve(config: &AppConfig, relative: &str) -> Result<PathBuf, ApiError> {
    let path = Path::new(relative);
    if path
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(ApiError::InternalError(format!("Refusing stored path {}", relative)));
    }
    Ok(config.media_root.join(path))
}

pub async fn save(
    config: &AppConfig,
    kind: &str,
    owner_id: i32,
    filename: &str,
    bytes: &[u8],
) -> Result<String, ApiError> {
    if bytes.is_empty() {
        return Err(ApiError::validation("The uploaded file is empty"));
    }

    let relative = format!(
        "{}/{}/{}_{}",
        kind,
        owner_id,
        Uuid::new_v4(),
        sanitize_filename(filename)
    );
    let target = resolve(config, &relative)?;
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            ApiError::InternalError(format!("Failed to prepare media directory: {}", e))
        })?;
    }
    tokio::fs::write(&target, bytes)
        .await
        .map_err(|e| ApiError::InternalError(format!("Failed to store file: {}", e)))?;

    debug!("Stored {} bytes at {}", bytes.len(), relative);
    Ok(relative)
}

pub async fn read(config: &AppConfig, relative: &str) -> Result<Vec<u8>, ApiError> {
    let target = resolve(config, relative)?;
    tokio::fs::read(&target).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => ApiError::not_found("File"),
        _ => ApiError::InternalError(format!("Failed to read file: {}", e)),
    })
}

/// Removes a stored file; failures are only logged.
pub async fn remove(config: &AppConfig, relative: &str) {
    let target = match resolve(config, relative) {
        Ok(target) => target,
        Err(e) => {
            warn!("Not removing {}: {}", relative, e);
            return;
        }
    };
    if let Err(e) = tokio::fs::remove_file(&target).await {
        if e.kind() != ErrorKind::NotFound {
            warn!("Failed to remove {}: {}", relative, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_directories_and_odd_characters() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\My CV (final).pdf"), "My_CV__final_.pdf");
        assert_eq!(sanitize_filename(".hidden"), "hidden");
        assert_eq!(sanitize_filename(""), "upload");
        assert_eq!(sanitize_filename("a/"), "upload");
    }

    #[test]
    fn download_name_drops_uuid_prefix() {
        let stored = format!("cv/4/{}_resume.pdf", Uuid::new_v4());
        assert_eq!(download_name(&stored), "resume.pdf");
        assert_eq!(download_name("cv/4/plain_name.pdf"), "plain_name.pdf");
    }

    #[test]
    fn stored_paths_cannot_escape_media_root() {
        let config = AppConfig::for_tests();
        assert!(resolve(&config, "cv/1/file.pdf").is_ok());
        assert!(resolve(&config, "../secret").is_err());
        assert!(resolve(&config, "/etc/passwd").is_err());
    }

    #[actix_web::test]
    async fn saved_file_can_be_read_back_and_removed() {
        let mut config = AppConfig::for_tests();
        config.media_root = std::env::temp_dir().join(format!("rde-roster-{}", Uuid::new_v4()));

        let relative = save(&config, CV_DIR, 7, "cv.pdf", b"%PDF-1.4").await.unwrap();
        assert!(relative.starts_with("cv/7/"));
        assert_eq!(read(&config, &relative).await.unwrap(), b"%PDF-1.4");

        remove(&config, &relative).await;
        assert!(matches!(read(&config, &relative).await, Err(ApiError::NotFoundError(_))));

        let _ = std::fs::remove_dir_all(&config.media_root);
    }

    #[actix_web::test]
    async fn empty_upload_is_rejected() {
        let config = AppConfig::for_tests();
        let err = save(&config, CV_DIR, 1, "cv.pdf", b"").await.unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(_)));
    }
}
