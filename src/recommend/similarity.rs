//! Pairwise similarity measures used by the recommendation strategies.

use crate::models::ContentIndexRecord;
use std::collections::HashSet;

const CATEGORY_WEIGHT: f64 = 0.3;
const TAG_WEIGHT: f64 = 0.4;
const TYPE_WEIGHT: f64 = 0.2;
const AUTHOR_WEIGHT: f64 = 0.1;

/// Jaccard index of two sets. An empty union yields 0.0, not NaN.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    intersection as f64 / union as f64
}

/// Split a comma-delimited tag string into a set of trimmed, lower-cased
/// tags, dropping empties.
pub fn tag_set(tags: &str) -> HashSet<String> {
    tags.split(',')
        .map(|tag| tag.trim().to_lowercase())
        .filter(|tag| !tag.is_empty())
        .collect()
}

/// Weighted similarity between two index records.
///
/// Category match contributes 0.3, tag overlap (Jaccard) up to 0.4, same
/// content type 0.2 and same author 0.1; the sum is capped at 1.0.
pub fn content_similarity(a: &ContentIndexRecord, b: &ContentIndexRecord) -> f64 {
    let mut score = 0.0;

    if a.category_id.is_some() && a.category_id == b.category_id {
        score += CATEGORY_WEIGHT;
    }

    score += TAG_WEIGHT * jaccard(&tag_set(&a.tags), &tag_set(&b.tags));

    if a.content_type == b.content_type {
        score += TYPE_WEIGHT;
    }

    if a.author_id == b.author_id {
        score += AUTHOR_WEIGHT;
    }

    score.min(1.0)
}

/// Jaccard similarity over the content ids two users interacted with.
pub fn user_similarity(a: &HashSet<i64>, b: &HashSet<i64>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    intersection as f64 / union as f64
}
