use serde::Serialize;
use shared::{
    domain::User,
    query::{PageRequest, SortDirection, SortDirective},
};

/// One derived page of the collection: the visible slice plus the size of
/// the whole filtered set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DerivedPage {
    pub items: Vec<User>,
    pub total_matched: usize,
}

/// Filters, sorts, and slices `records` into a single page.
///
/// Pure: identical inputs always produce identical output. A record
/// matches when its name or email contains `search` case-insensitively;
/// an empty search matches everything. The sort is stable on the
/// case-lowered field value, with the comparator flipped for descending
/// order so that equal keys keep their incoming order either way. The
/// page slice is half-open; a page past the end yields empty `items`
/// while `total_matched` still reports the full match count.
pub fn derive_page(
    records: &[User],
    search: &str,
    sort: SortDirective,
    pages: PageRequest,
) -> DerivedPage {
    let needle = search.to_lowercase();
    let mut matched: Vec<(String, &User)> = records
        .iter()
        .filter(|user| matches_search(user, &needle))
        .map(|user| (sort.field.key(user).to_lowercase(), user))
        .collect();

    matched.sort_by(|(left, _), (right, _)| match sort.direction {
        SortDirection::Ascending => left.cmp(right),
        SortDirection::Descending => right.cmp(left),
    });

    let total_matched = matched.len();
    let start = pages.offset();
    let end = total_matched.min(start.saturating_add(pages.page_size() as usize));
    let items = matched
        .get(start..end)
        .unwrap_or(&[])
        .iter()
        .map(|(_, user)| (*user).clone())
        .collect();

    DerivedPage {
        items,
        total_matched,
    }
}

fn matches_search(user: &User, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    user.name.to_lowercase().contains(needle) || user.email.to_lowercase().contains(needle)
}

#[cfg(test)]
#[path = "tests/view_tests.rs"]
mod tests;
