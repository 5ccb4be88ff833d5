//! Reconstruction of a post's comment tree from the flat, creation-ordered
//! list the platform returns.

use std::collections::HashMap;

use crate::models::{Comment, Id};

/// Root comments plus replies grouped by parent identifier.
///
/// A reply whose declared parent is not itself a root comment is still kept
/// under its parent key; the presentation layer simply has no anchor to
/// render it from. Preserving rather than dropping or promoting such
/// orphans keeps the structure lossless.
#[derive(Debug, Default)]
pub struct CommentThread {
    pub roots: Vec<Comment>,
    pub replies_by_parent: HashMap<Id, Vec<Comment>>,
}

impl CommentThread {
    /// Single-pass partition: comments with a falsy `parentComment` become
    /// roots, the rest are grouped by parent preserving encounter order.
    pub fn build(comments: Vec<Comment>) -> Self {
        let mut thread = CommentThread::default();
        for comment in comments {
            let parent = comment
                .parent_comment
                .clone()
                .filter(|p| !p.is_empty());
            match parent {
                Some(parent) => thread
                    .replies_by_parent
                    .entry(parent)
                    .or_default()
                    .push(comment),
                None => thread.roots.push(comment),
            }
        }
        thread
    }

    /// Replies under a given root comment, in creation order.
    pub fn replies(&self, parent_id: &str) -> &[Comment] {
        self.replies_by_parent
            .get(parent_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Total number of comments across both output structures.
    pub fn total(&self) -> usize {
        self.roots.len() + self.replies_by_parent.values().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty() && self.replies_by_parent.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn comment(id: &str, parent: Option<&str>) -> Comment {
        serde_json::from_value(json!({
            "$id": id,
            "post": "p1",
            "user": "u1",
            "content": id,
            "parentComment": parent,
        }))
        .unwrap()
    }

    #[test]
    fn partitions_roots_and_replies() {
        let flat = vec![
            comment("c1", None),
            comment("c2", Some("c1")),
            comment("c3", None),
            comment("c4", Some("zzz")),
        ];
        let thread = CommentThread::build(flat);

        let root_ids: Vec<&str> = thread.roots.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(root_ids, vec!["c1", "c3"]);
        assert_eq!(thread.replies("c1").len(), 1);
        assert_eq!(thread.replies("c1")[0].id, "c2");
        // orphaned reply is preserved under its declared parent key
        assert_eq!(thread.replies("zzz")[0].id, "c4");
    }

    #[test]
    fn every_comment_lands_in_exactly_one_bucket() {
        let flat: Vec<Comment> = (0..20)
            .map(|i| {
                let parent = if i % 3 == 0 { None } else { Some("c0") };
                comment(&format!("c{i}"), parent)
            })
            .collect();
        let n = flat.len();
        let thread = CommentThread::build(flat);
        assert_eq!(thread.total(), n);
    }

    #[test]
    fn empty_string_parent_is_a_root() {
        let thread = CommentThread::build(vec![comment("c1", Some(""))]);
        assert_eq!(thread.roots.len(), 1);
        assert!(thread.replies_by_parent.is_empty());
    }

    #[test]
    fn replies_preserve_encounter_order() {
        let flat = vec![
            comment("c1", None),
            comment("c2", Some("c1")),
            comment("c3", Some("c1")),
            comment("c4", Some("c1")),
        ];
        let thread = CommentThread::build(flat);
        let ids: Vec<&str> = thread.replies("c1").iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c2", "c3", "c4"]);
    }
}
