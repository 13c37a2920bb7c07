//! Filtering and ranking over contribution lists that were already fetched.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::structs::{Contribution, Enrollment, ObjectId, PaymentStatus};

/// Tag selection that means "no tag filter".
pub const ALL_TAGS: &str = "All";

/// Contributions carrying a tag named exactly `tag`; `"All"` keeps everything.
pub fn filter_by_tag<'a>(contributions: &'a [Contribution], tag: &str) -> Vec<&'a Contribution> {
    if tag == ALL_TAGS {
        return contributions.iter().collect();
    }

    contributions
        .iter()
        .filter(|contribution| contribution.has_tag(tag))
        .collect()
}

/// Case-insensitive match on title or description. A blank term matches all.
pub fn search<'a>(contributions: &'a [Contribution], term: &str) -> Vec<&'a Contribution> {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return contributions.iter().collect();
    }

    contributions
        .iter()
        .filter(|c| {
            c.title.to_lowercase().contains(&term) || c.description.to_lowercase().contains(&term)
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    PriceLowToHigh,
    PriceHighToLow,
    /// Unrated contributions go last.
    TopRated,
    Title,
}

/// Stable sort, so equal keys keep the backend's order.
pub fn sort_by(contributions: &mut [&Contribution], order: SortOrder) {
    match order {
        SortOrder::PriceLowToHigh => contributions.sort_by(|a, b| a.price.total_cmp(&b.price)),
        SortOrder::PriceHighToLow => contributions.sort_by(|a, b| b.price.total_cmp(&a.price)),
        SortOrder::TopRated => contributions.sort_by(|a, b| match (a.rating, b.rating) {
            (Some(a), Some(b)) => b.total_cmp(&a),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }),
        SortOrder::Title => {
            contributions.sort_by_cached_key(|contribution| contribution.title.to_lowercase())
        }
    }
}

/// Ids of contributions the user has fully paid for.
pub fn enrolled_ids(enrollments: &[Enrollment]) -> HashSet<ObjectId> {
    enrollments
        .iter()
        .filter(|enrollment| enrollment.payment_status == PaymentStatus::Completed)
        .map(|enrollment| enrollment.contribution.id.clone())
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContributorStats {
    pub id: Option<ObjectId>,
    pub name: String,
    pub total_contributions: usize,
    /// Mean over all contributions, unrated ones counting as zero.
    pub average_rating: f64,
    pub contributions: Vec<ObjectId>,
}

/// Groups contributions by owner, most prolific first, then best rated.
pub fn contributor_leaderboard(contributions: &[Contribution]) -> Vec<ContributorStats> {
    let mut order: Vec<Option<ObjectId>> = Vec::new();
    let mut stats: HashMap<Option<ObjectId>, (ContributorStats, f64)> = HashMap::new();

    for contribution in contributions {
        let owner = contribution.user.as_ref();
        let key = owner.and_then(|user| user.id.clone());

        let (entry, total_rating) = stats.entry(key.clone()).or_insert_with(|| {
            order.push(key.clone());
            let fresh = ContributorStats {
                id: key.clone(),
                name: owner
                    .map(|user| user.username.clone())
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| "Anonymous".to_string()),
                total_contributions: 0,
                average_rating: 0.0,
                contributions: Vec::new(),
            };
            (fresh, 0.0)
        });

        entry.total_contributions += 1;
        *total_rating += contribution.rating.unwrap_or_default();
        entry.average_rating = *total_rating / entry.total_contributions as f64;
        entry.contributions.push(contribution.id.clone());
    }

    let mut leaderboard: Vec<ContributorStats> = order
        .into_iter()
        .filter_map(|key| stats.remove(&key).map(|(entry, _)| entry))
        .collect();

    leaderboard.sort_by(|a, b| {
        b.total_contributions
            .cmp(&a.total_contributions)
            .then_with(|| b.average_rating.total_cmp(&a.average_rating))
    });

    leaderboard
}
