//! Discovery filter/sort engine.
//!
//! `apply` narrows a candidate set of listings with the conjunction of the
//! query's active predicates, then orders the survivors by the sort mode.
//! Every ordering is a stable sort, so listings with equal keys keep their
//! input order. The engine holds no state and never mutates its input.

use std::cmp::Ordering;

use crate::types::{Query, SkillListing, SortMode};

/// Filter and sort `listings` according to `query`.
///
/// # Example
/// ```
/// use xchange_core::discovery::apply;
/// use xchange_core::Query;
///
/// let results = apply(&[], &Query::default().with_search("design"));
/// assert!(results.is_empty());
/// ```
pub fn apply(listings: &[SkillListing], query: &Query) -> Vec<SkillListing> {
    let needle = query.search_term.to_lowercase();
    let mut results: Vec<SkillListing> = listings
        .iter()
        .filter(|listing| matches_lowered(listing, query, &needle))
        .cloned()
        .collect();
    sort_listings(&mut results, query.sort_mode);
    results
}

/// Whether `listing` passes every active predicate of `query`.
pub fn matches(listing: &SkillListing, query: &Query) -> bool {
    matches_lowered(listing, query, &query.search_term.to_lowercase())
}

fn matches_lowered(listing: &SkillListing, query: &Query, needle: &str) -> bool {
    if !needle.is_empty()
        && !listing.title.to_lowercase().contains(needle)
        && !listing.category.to_lowercase().contains(needle)
    {
        return false;
    }

    if let Some(skill_type) = query.type_filter.selected() {
        if listing.skill_type != skill_type {
            return false;
        }
    }

    if let Some(location) = query.location_filter.selected() {
        if listing.location != location {
            return false;
        }
    }

    true
}

/// Stable in-place sort by `mode`. All modes are descending.
pub fn sort_listings(listings: &mut [SkillListing], mode: SortMode) {
    listings.sort_by(|a, b| compare(a, b, mode));
}

fn compare(a: &SkillListing, b: &SkillListing, mode: SortMode) -> Ordering {
    match mode {
        SortMode::Recent => b.created_at.cmp(&a.created_at),
        SortMode::Reputation => b.user.reputation.total_cmp(&a.user.reputation),
        SortMode::Verified => b.user.verified.cmp(&a.user.verified),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        Id, Location, LocationFilter, SkillLevel, SkillType, TypeFilter, UserSummary,
    };
    use chrono::{NaiveDate, TimeZone, Utc};
    use proptest::prelude::*;

    fn listing(
        id: &str,
        title: &str,
        category: &str,
        created: (i32, u32, u32),
        reputation: f64,
        verified: bool,
    ) -> SkillListing {
        let date = NaiveDate::from_ymd_opt(created.0, created.1, created.2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        SkillListing {
            id: Id::from_string(id),
            title: title.to_string(),
            category: category.to_string(),
            level: SkillLevel::Intermediate,
            skill_type: SkillType::Teach,
            location: Location::Remote,
            duration: "2 hours".to_string(),
            description: String::new(),
            user: UserSummary {
                name: format!("owner-{id}"),
                reputation,
                verified,
            },
            created_at: Utc.from_utc_datetime(&date),
        }
    }

    fn titles(listings: &[SkillListing]) -> Vec<&str> {
        listings.iter().map(|l| l.title.as_str()).collect()
    }

    fn two_listings() -> Vec<SkillListing> {
        vec![
            listing("1", "React Development", "Frontend", (2024, 1, 15), 4.8, true),
            listing("3", "Spring Boot Basics", "Backend", (2024, 1, 13), 4.2, false),
        ]
    }

    #[test]
    fn recent_sort_puts_newest_first() {
        let results = apply(&two_listings(), &Query::default());
        assert_eq!(titles(&results), ["React Development", "Spring Boot Basics"]);
    }

    #[test]
    fn verified_sort_puts_verified_first() {
        let mut input = two_listings();
        input.reverse();
        let results = apply(&input, &Query::default().with_sort(SortMode::Verified));
        assert_eq!(titles(&results), ["React Development", "Spring Boot Basics"]);
    }

    #[test]
    fn search_matches_category_case_insensitively() {
        let input = vec![
            listing("1", "React Development", "Frontend", (2024, 1, 15), 4.8, true),
            listing("2", "UI/UX Design Feedback", "Design", (2024, 1, 14), 4.9, true),
        ];
        let results = apply(&input, &Query::default().with_search("design"));
        assert_eq!(titles(&results), ["UI/UX Design Feedback"]);

        let results = apply(&input, &Query::default().with_search("FRONT"));
        assert_eq!(titles(&results), ["React Development"]);
    }

    #[test]
    fn type_and_location_filters_are_conjunctive() {
        let mut learn_remote = listing("1", "Spring Boot", "Backend", (2024, 1, 13), 4.2, false);
        learn_remote.skill_type = SkillType::Learn;
        let mut teach_in_person = listing("2", "Figma", "Design", (2024, 1, 12), 4.7, true);
        teach_in_person.location = Location::InPerson;
        let teach_remote = listing("3", "React", "Frontend", (2024, 1, 15), 4.8, true);
        let input = vec![learn_remote, teach_in_person, teach_remote];

        let query = Query::default()
            .with_type(TypeFilter::Teach)
            .with_location(LocationFilter::Remote);
        assert_eq!(titles(&apply(&input, &query)), ["React"]);

        let query = Query::default().with_location(LocationFilter::InPerson);
        assert_eq!(titles(&apply(&input, &query)), ["Figma"]);

        let query = Query::default()
            .with_type(TypeFilter::Learn)
            .with_location(LocationFilter::InPerson);
        assert!(apply(&input, &query).is_empty());
    }

    #[test]
    fn reputation_ties_keep_input_order() {
        let input = vec![
            listing("a", "First", "X", (2024, 1, 1), 4.5, false),
            listing("b", "Top", "X", (2024, 1, 2), 4.9, false),
            listing("c", "Second", "X", (2024, 1, 3), 4.5, true),
        ];
        let results = apply(&input, &Query::default().with_sort(SortMode::Reputation));
        assert_eq!(titles(&results), ["Top", "First", "Second"]);
    }

    #[test]
    fn input_is_left_untouched() {
        let input = two_listings();
        let before = input.clone();
        let _ = apply(&input, &Query::default().with_sort(SortMode::Verified));
        assert_eq!(input, before);
    }

    fn arb_listing() -> impl Strategy<Value = SkillListing> {
        (
            prop::sample::select(&["React", "Design Systems", "Rust", "Figma", "Spring"][..]),
            prop::sample::select(&["Frontend", "Design", "Backend"][..]),
            any::<bool>(),
            any::<bool>(),
            0u32..5,
            0u8..=10,
            any::<bool>(),
        )
            .prop_map(|(title, category, teach, remote, day, rep, verified)| {
                let mut l = listing(
                    "p",
                    title,
                    category,
                    (2024, 1, day + 1),
                    f64::from(rep) / 2.0,
                    verified,
                );
                l.skill_type = if teach { SkillType::Teach } else { SkillType::Learn };
                l.location = if remote { Location::Remote } else { Location::InPerson };
                l
            })
    }

    fn arb_listings() -> impl Strategy<Value = Vec<SkillListing>> {
        prop::collection::vec(arb_listing(), 0..12).prop_map(|mut v| {
            for (i, l) in v.iter_mut().enumerate() {
                l.id = Id::from_string(i.to_string());
            }
            v
        })
    }

    fn arb_query() -> impl Strategy<Value = Query> {
        (
            prop::sample::select(&["", "re", "design", "RUST", "zzz"][..]),
            prop::sample::select(&[TypeFilter::All, TypeFilter::Teach, TypeFilter::Learn][..]),
            prop::sample::select(
                &[LocationFilter::All, LocationFilter::Remote, LocationFilter::InPerson][..],
            ),
            prop::sample::select(&[SortMode::Recent, SortMode::Reputation, SortMode::Verified][..]),
        )
            .prop_map(|(term, t, l, s)| {
                Query::default()
                    .with_search(term)
                    .with_type(t)
                    .with_location(l)
                    .with_sort(s)
            })
    }

    /// Filter rules restated directly from the listing fields.
    fn accepts(listing: &SkillListing, query: &Query) -> bool {
        let needle = query.search_term.to_lowercase();
        let text_ok = needle.is_empty()
            || listing.title.to_lowercase().contains(&needle)
            || listing.category.to_lowercase().contains(&needle);
        let type_ok = match query.type_filter {
            TypeFilter::All => true,
            TypeFilter::Teach => listing.skill_type == SkillType::Teach,
            TypeFilter::Learn => listing.skill_type == SkillType::Learn,
        };
        let location_ok = match query.location_filter {
            LocationFilter::All => true,
            LocationFilter::Remote => listing.location == Location::Remote,
            LocationFilter::InPerson => listing.location == Location::InPerson,
        };
        text_ok && type_ok && location_ok
    }

    fn position(listings: &[SkillListing], id: &Id) -> usize {
        listings.iter().position(|l| &l.id == id).unwrap()
    }

    proptest! {
        #[test]
        fn unfiltered_query_is_a_permutation(input in arb_listings(), query in arb_query()) {
            let query = Query::default().with_sort(query.sort_mode);
            let results = apply(&input, &query);
            prop_assert_eq!(results.len(), input.len());
            for l in &input {
                prop_assert!(results.iter().any(|r| r.id == l.id));
            }
        }

        #[test]
        fn filter_is_sound_and_complete(input in arb_listings(), query in arb_query()) {
            let results = apply(&input, &query);
            for r in &results {
                prop_assert!(accepts(r, &query));
            }
            let expected = input.iter().filter(|l| accepts(l, &query)).count();
            prop_assert_eq!(results.len(), expected);
        }

        #[test]
        fn reapplying_is_idempotent(input in arb_listings(), query in arb_query()) {
            let once = apply(&input, &query);
            let twice = apply(&once, &query);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn equal_keys_keep_input_order(input in arb_listings(), query in arb_query()) {
            let results = apply(&input, &query);
            for pair in results.windows(2) {
                if compare(&pair[0], &pair[1], query.sort_mode) == Ordering::Equal {
                    prop_assert!(position(&input, &pair[0].id) < position(&input, &pair[1].id));
                }
            }
        }
    }
}
