//! Cursor and offset bookkeeping for the two listing styles: infinite
//! scroll (cursor on the last-seen document id) and 1-based page numbers
//! (offset windows), plus the client-side substring search used where the
//! platform has no full-text index.

use serde::{Deserialize, Serialize};

use crate::models::{Post, User};
use crate::relation::HasId;

/// Feed page size for infinite scroll.
pub const FEED_PAGE_SIZE: u64 = 9;
/// Bounded window fetched for client-side search filtering.
pub const SEARCH_WINDOW: u64 = 200;

/// Cursor for the next fetch, or `None` when a page came back empty or
/// short of the requested size, meaning there are no further pages.
pub fn next_cursor<T: HasId>(page: &[T], requested: u64) -> Option<String> {
    if page.is_empty() || (page.len() as u64) < requested {
        return None;
    }
    page.last().map(|d| d.doc_id().to_owned())
}

/// Translate a 1-based page number into an (offset, limit) window. Page 0 is
/// treated as page 1.
pub fn offset_window(page: u64, page_size: u64) -> (u64, u64) {
    let page = page.max(1);
    ((page - 1) * page_size, page_size)
}

/// One page of a client-side filtered listing, with the filtered total so
/// callers can render page controls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSlice<T> {
    pub items: Vec<T>,
    pub total: u64,
}

/// Slice an already-filtered list by an offset window.
pub fn slice_window<T>(items: Vec<T>, offset: u64, limit: u64) -> PageSlice<T> {
    let total = items.len() as u64;
    let items = items
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect();
    PageSlice { items, total }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// Case-insensitive substring match over name and username.
pub fn user_matches(user: &User, term: &str) -> bool {
    let term = term.to_lowercase();
    contains_ci(&user.name, &term)
        || user.username.as_deref().map(|u| contains_ci(u, &term)).unwrap_or(false)
}

/// Case-insensitive substring match over caption, location, tags and (when
/// expanded) the creator's name and username.
pub fn post_matches(post: &Post, term: &str) -> bool {
    let term = term.to_lowercase();
    if contains_ci(&post.caption, &term) {
        return true;
    }
    if post.location.as_deref().map(|l| contains_ci(l, &term)).unwrap_or(false) {
        return true;
    }
    if post.tags.iter().any(|t| contains_ci(t, &term)) {
        return true;
    }
    match post.creator.expanded() {
        Some(creator) => {
            contains_ci(&creator.name, &term)
                || creator
                    .username
                    .as_deref()
                    .map(|u| contains_ci(u, &term))
                    .unwrap_or(false)
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Doc(String);
    impl HasId for Doc {
        fn doc_id(&self) -> &str {
            &self.0
        }
    }

    fn page_of(ids: &[&str]) -> Vec<Doc> {
        ids.iter().map(|i| Doc(i.to_string())).collect()
    }

    #[test]
    fn full_page_advances_cursor_to_last_id() {
        let page = page_of(&["a", "b", "c"]);
        assert_eq!(next_cursor(&page, 3), Some("c".to_string()));
    }

    #[test]
    fn short_or_empty_page_signals_no_further_pages() {
        assert_eq!(next_cursor(&page_of(&["a", "b"]), 3), None);
        assert_eq!(next_cursor(&page_of(&[]), 3), None);
    }

    #[test]
    fn offset_windows_are_one_based() {
        assert_eq!(offset_window(1, 10), (0, 10));
        assert_eq!(offset_window(3, 10), (20, 10));
        assert_eq!(offset_window(0, 10), (0, 10));
    }

    #[test]
    fn slice_reports_filtered_total() {
        let slice = slice_window(vec![1, 2, 3, 4, 5], 2, 2);
        assert_eq!(slice.items, vec![3, 4]);
        assert_eq!(slice.total, 5);
    }

    #[test]
    fn user_search_is_case_insensitive() {
        let user: User = serde_json::from_value(json!({
            "$id": "u1",
            "name": "Ada Lovelace",
            "username": "ada"
        }))
        .unwrap();
        assert!(user_matches(&user, "LOVE"));
        assert!(user_matches(&user, "AdA"));
        assert!(!user_matches(&user, "grace"));
    }

    #[test]
    fn post_search_covers_caption_location_tags_and_creator() {
        let post: Post = serde_json::from_value(json!({
            "$id": "p1",
            "caption": "Sunset over the bay",
            "location": "Lisbon",
            "tags": ["goldenhour"],
            "creator": {"$id": "u1", "name": "Ada", "username": "ada", "accountId": "a1"}
        }))
        .unwrap();
        assert!(post_matches(&post, "sunset"));
        assert!(post_matches(&post, "lisbon"));
        assert!(post_matches(&post, "GOLDEN"));
        assert!(post_matches(&post, "ada"));
        assert!(!post_matches(&post, "mountain"));
    }
}
