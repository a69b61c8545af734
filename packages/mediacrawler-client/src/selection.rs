//! Picking the output artifact that belongs to a crawl job.
//!
//! The crawler writes every run into a shared directory and only sometimes
//! tags files with the job that produced them, so selection falls back from
//! exact job matches to files written after the job started, and finally to
//! anything not yet rejected for the job.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::types::FileItem;

/// Rank a file by how likely its name marks a content listing.
///
/// Comment and creator dumps score below unknown names but stay selectable.
pub fn score_file(path: &str) -> i32 {
    let path = path.to_lowercase();
    if path.is_empty() {
        return 0;
    }
    if path.contains("search_contents") {
        4
    } else if path.contains("contents") {
        3
    } else if path.contains("content") {
        2
    } else if path.contains("comment") {
        -1
    } else if path.contains("creator") {
        -2
    } else {
        0
    }
}

/// Highest score first, most recent first on ties. Files that tie on both
/// keep their listing order.
pub fn pick_preferred<'a, I>(files: I) -> Option<&'a FileItem>
where
    I: IntoIterator<Item = &'a FileItem>,
{
    // `min_by` keeps the first of equal elements.
    files.into_iter().min_by(|a, b| {
        score_file(&b.path)
            .cmp(&score_file(&a.path))
            .then_with(|| b.timestamp_millis().cmp(&a.timestamp_millis()))
    })
}

/// Select the artifact for `job_id`, ignoring anything in `consumed`.
///
/// Precedence: files tagged with the job id, then files stamped at or after
/// `started_at`, then every remaining file. Each tier is ranked with
/// [`pick_preferred`].
pub fn select_result_file<'a>(
    files: &'a [FileItem],
    job_id: &str,
    started_at: DateTime<Utc>,
    consumed: &HashSet<String>,
) -> Option<&'a FileItem> {
    let available: Vec<&FileItem> = files
        .iter()
        .filter(|file| !consumed.contains(&file.path))
        .collect();

    let direct = available
        .iter()
        .copied()
        .filter(|file| file.client_job_id.as_deref() == Some(job_id));
    if let Some(file) = pick_preferred(direct) {
        return Some(file);
    }

    let since = started_at.timestamp_millis();
    let recent = available.iter().copied().filter(|file| {
        let ts = file.timestamp_millis();
        ts != 0 && ts >= since
    });
    if let Some(file) = pick_preferred(recent) {
        return Some(file);
    }

    pick_preferred(available)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn tagged(path: &str, job: &str) -> FileItem {
        FileItem {
            client_job_id: Some(job.to_string()),
            ..FileItem::new(path)
        }
    }

    fn modified(path: &str, secs: f64) -> FileItem {
        FileItem {
            modified_at: Some(secs),
            ..FileItem::new(path)
        }
    }

    fn started() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn scores_follow_path_kind() {
        assert_eq!(score_file("xhs/json/search_contents_2025.json"), 4);
        assert_eq!(score_file("detail_contents.json"), 3);
        assert_eq!(score_file("content.json"), 2);
        assert_eq!(score_file("search_comments.json"), -1);
        assert_eq!(score_file("creators.json"), -2);
        assert_eq!(score_file("misc.json"), 0);
        assert_eq!(score_file(""), 0);
        assert_eq!(score_file("SEARCH_CONTENTS.JSON"), 4);
    }

    #[test]
    fn content_beats_comments_among_direct_matches() {
        let files = vec![
            tagged("a_comments.json", "X"),
            tagged("a_search_contents.json", "X"),
        ];
        let picked = select_result_file(&files, "X", started(), &HashSet::new()).unwrap();
        assert_eq!(picked.path, "a_search_contents.json");
    }

    #[test]
    fn direct_match_beats_better_scored_untagged_file() {
        let files = vec![
            modified("other_search_contents.json", 1_700_000_100.0),
            tagged("mine.json", "X"),
        ];
        let picked = select_result_file(&files, "X", started(), &HashSet::new()).unwrap();
        assert_eq!(picked.path, "mine.json");
    }

    #[test]
    fn newer_file_preferred_over_older_higher_score() {
        let files = vec![
            modified("old_search_contents.json", 1_699_999_000.0),
            modified("new_notes.json", 1_700_000_500.0),
        ];
        let picked = select_result_file(&files, "X", started(), &HashSet::new()).unwrap();
        assert_eq!(picked.path, "new_notes.json");
    }

    #[test]
    fn ties_broken_by_recency() {
        let files = vec![
            modified("a_search_contents.json", 1_700_000_100.0),
            modified("b_search_contents.json", 1_700_000_900.0),
        ];
        let picked = select_result_file(&files, "X", started(), &HashSet::new()).unwrap();
        assert_eq!(picked.path, "b_search_contents.json");
    }

    #[test]
    fn full_ties_keep_listing_order() {
        let files = vec![
            modified("a/search_contents_1.json", 1_700_000_100.0),
            modified("b/search_contents_2.json", 1_700_000_100.0),
        ];
        let picked = select_result_file(&files, "X", started(), &HashSet::new()).unwrap();
        assert_eq!(picked.path, "a/search_contents_1.json");

        let untimed = vec![FileItem::new("first_contents.json"), FileItem::new("second_contents.json")];
        assert_eq!(pick_preferred(&untimed).unwrap().path, "first_contents.json");
    }

    #[test]
    fn falls_back_to_everything_available() {
        let files = vec![
            modified("old_comments.json", 1_600_000_000.0),
            modified("old_contents.json", 1_600_000_000.0),
        ];
        let picked = select_result_file(&files, "X", started(), &HashSet::new()).unwrap();
        assert_eq!(picked.path, "old_contents.json");
    }

    #[test]
    fn consumed_paths_are_never_returned() {
        let files = vec![
            tagged("a_search_contents.json", "X"),
            modified("stale.json", 1_600_000_000.0),
        ];
        let consumed: HashSet<String> = ["a_search_contents.json".to_string()].into();
        let picked = select_result_file(&files, "X", started(), &consumed).unwrap();
        assert_eq!(picked.path, "stale.json");

        let consumed: HashSet<String> =
            ["a_search_contents.json".to_string(), "stale.json".to_string()].into();
        assert!(select_result_file(&files, "X", started(), &consumed).is_none());
    }

    #[test]
    fn empty_listing_selects_nothing() {
        assert!(select_result_file(&[], "X", started(), &HashSet::new()).is_none());
    }
}
