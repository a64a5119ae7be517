//! Rebuilds the reply tree of a post from its flat comment list.
//!
//! Replies are grouped into an adjacency map keyed by parent id in a single
//! pass, then walked from each root with an explicit stack so reply chains of
//! any depth are safe on small worker stacks.

use std::collections::HashMap;

use crate::models::{Comment, CommentNode, Id};

/// Build the ordered forest of root comments for one post.
///
/// Siblings at every level are ordered by `created_at` ascending, ties by id.
/// Comments whose parent is not part of `comments` are dropped.
pub fn build_comment_tree(comments: Vec<Comment>) -> Vec<CommentNode> {
    let mut roots = Vec::new();
    let mut children: HashMap<Id, Vec<Comment>> = HashMap::new();
    for comment in comments {
        match comment.parent_id {
            None => roots.push(comment),
            Some(parent_id) => children.entry(parent_id).or_default().push(comment),
        }
    }

    sort_chronologically(&mut roots);
    for siblings in children.values_mut() {
        sort_chronologically(siblings);
    }

    attach_replies(roots, children)
}

/// Total number of nodes in a forest, replies included.
pub fn count_comments(forest: &[CommentNode]) -> usize {
    let mut total = 0;
    let mut pending: Vec<&CommentNode> = forest.iter().collect();
    while let Some(node) = pending.pop() {
        total += 1;
        pending.extend(node.replies.iter());
    }
    total
}

fn sort_chronologically(comments: &mut [Comment]) {
    comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
}

struct Frame {
    /// `None` only for the synthetic frame holding the roots.
    comment: Option<Comment>,
    replies: Vec<CommentNode>,
    pending: std::vec::IntoIter<Comment>,
}

fn attach_replies(roots: Vec<Comment>, mut children: HashMap<Id, Vec<Comment>>) -> Vec<CommentNode> {
    let mut stack = vec![Frame {
        comment: None,
        replies: Vec::with_capacity(roots.len()),
        pending: roots.into_iter(),
    }];
    let mut forest = Vec::new();

    while let Some(top) = stack.last_mut() {
        if let Some(child) = top.pending.next() {
            // each id is taken at most once, so parent cycles cannot loop
            let grandchildren = children.remove(&child.id).unwrap_or_default();
            stack.push(Frame {
                comment: Some(child),
                replies: Vec::with_capacity(grandchildren.len()),
                pending: grandchildren.into_iter(),
            });
            continue;
        }

        let Some(done) = stack.pop() else { break };
        match (done.comment, stack.last_mut()) {
            (Some(comment), Some(parent)) => parent.replies.push(CommentNode { comment, replies: done.replies }),
            _ => forest = done.replies,
        }
    }

    forest
}
