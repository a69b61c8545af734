//! Finding the output file a crawl produced.

use std::collections::HashSet;

use anyhow::Result;
use chrono::{DateTime, Utc};
use mediacrawler_client::{select_result_file, FileItem, Platform};
use tracing::debug;

use crate::domains::materials::cache::is_preferred_result_path;
use crate::kernel::BaseMediaCrawler;

#[derive(Debug, Clone)]
pub struct ResolvedOutput {
    pub file: FileItem,
    pub data: serde_json::Value,
}

/// List the platform's output files, pick the one belonging to `job_id`, and
/// read it.
///
/// Eligible content files are preferred; the full listing is only used when
/// none exist. Returns `None` when every candidate is consumed.
pub async fn resolve_output_for_job(
    crawler: &dyn BaseMediaCrawler,
    job_id: &str,
    platform: Platform,
    started_at: DateTime<Utc>,
    consumed: &HashSet<String>,
    limit: u32,
) -> Result<Option<ResolvedOutput>> {
    let files = crawler.list_files(platform).await?;
    let preferred: Vec<FileItem> = files
        .iter()
        .filter(|file| is_preferred_result_path(&file.path))
        .cloned()
        .collect();
    let candidates = if preferred.is_empty() { &files } else { &preferred };

    let Some(file) = select_result_file(candidates, job_id, started_at, consumed) else {
        debug!(job_id, candidates = candidates.len(), "no output file matched");
        return Ok(None);
    };

    debug!(job_id, path = %file.path, "resolved output file");
    let data = crawler.read_file(&file.path, true, limit).await?;
    Ok(Some(ResolvedOutput {
        file: file.clone(),
        data,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::test_dependencies::MockCrawler;
    use serde_json::json;

    #[tokio::test]
    async fn prefers_content_files_over_comment_dumps() {
        let crawler = MockCrawler::new()
            .with_file(FileItem::new("xhs/json/search_comments.json").with_client_job_id("job_1"))
            .with_file(FileItem::new("xhs/json/notes.json"))
            .with_content("xhs/json/notes.json", json!([{"note_id": "1"}]));

        let resolved = resolve_output_for_job(
            &crawler,
            "job_1",
            Platform::Xhs,
            Utc::now(),
            &HashSet::new(),
            200,
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(resolved.file.path, "xhs/json/notes.json");
        assert_eq!(resolved.data[0]["note_id"], "1");
        assert_eq!(crawler.read_calls(), vec!["xhs/json/notes.json".to_string()]);
    }

    #[tokio::test]
    async fn falls_back_to_ineligible_files_when_nothing_else_exists() {
        let crawler = MockCrawler::new()
            .with_file(FileItem::new("dy/json/search_comments.json"))
            .with_content("dy/json/search_comments.json", json!([{"comment_id": "c"}]));

        let resolved = resolve_output_for_job(
            &crawler,
            "job_1",
            Platform::Dy,
            Utc::now(),
            &HashSet::new(),
            200,
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(resolved.file.path, "dy/json/search_comments.json");
    }

    #[tokio::test]
    async fn consumed_files_are_never_returned() {
        let crawler = MockCrawler::new().with_file(FileItem::new("xhs/json/contents.json"));
        let consumed: HashSet<String> = ["xhs/json/contents.json".to_string()].into();

        let resolved = resolve_output_for_job(
            &crawler,
            "job_1",
            Platform::Xhs,
            Utc::now(),
            &consumed,
            200,
        )
        .await
        .unwrap();
        assert!(resolved.is_none());
        assert!(crawler.read_calls().is_empty());
    }
}
