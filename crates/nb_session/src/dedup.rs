use std::collections::BTreeSet;

use nb_core::{Category, CategorySelection, CategoryTerm};

/// Terms of `selection` whose category has not been served yet, in request order.
///
/// `Unresolved` stands for every category. Terms sharing a category are merged into one
/// term at the first occurrence, keeping every distinct keyword.
pub fn filter_unseen(selection: &CategorySelection, used: &BTreeSet<Category>) -> Vec<CategoryTerm> {
    let candidates: Vec<CategoryTerm> = match selection {
        CategorySelection::Resolved(terms) => terms.clone(),
        CategorySelection::Unresolved => Category::ALL.into_iter().map(CategoryTerm::Plain).collect(),
    };

    let mut merged: Vec<(Category, Vec<String>)> = Vec::new();
    for term in candidates.iter().filter(|t| !used.contains(&t.category())) {
        let index = match merged.iter().position(|(category, _)| *category == term.category()) {
            Some(index) => index,
            None => {
                merged.push((term.category(), Vec::new()));
                merged.len() - 1
            }
        };
        let keywords = &mut merged[index].1;
        for keyword in term.keywords() {
            if !keywords.iter().any(|k| k.eq_ignore_ascii_case(keyword)) {
                keywords.push(keyword.to_string());
            }
        }
    }

    merged
        .into_iter()
        .map(|(category, keywords)| {
            if keywords.is_empty() {
                CategoryTerm::Plain(category)
            } else {
                CategoryTerm::compound(category, keywords.join(", "))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use nb_core::DateSpec;
    use nb_sources::{query, QueryContext, SourceDescriptor};
    use proptest::prelude::*;

    fn used(categories: &[Category]) -> BTreeSet<Category> {
        categories.iter().copied().collect()
    }

    #[test]
    fn test_drops_served_categories() {
        let selection = CategorySelection::Resolved(vec![
            CategoryTerm::Plain(Category::Sports),
            CategoryTerm::Plain(Category::Business),
        ]);
        let unseen = filter_unseen(&selection, &used(&[Category::Sports]));
        assert_eq!(unseen, vec![CategoryTerm::Plain(Category::Business)]);
    }

    #[test]
    fn test_compound_terms_dedup_by_category() {
        let selection = CategorySelection::Resolved(vec![
            CategoryTerm::compound(Category::Sports, "volleyball"),
            CategoryTerm::Plain(Category::Sports),
            CategoryTerm::compound(Category::General, "Elon Musk"),
        ]);
        let unseen = filter_unseen(&selection, &BTreeSet::new());
        assert_eq!(
            unseen,
            vec![
                CategoryTerm::compound(Category::Sports, "volleyball"),
                CategoryTerm::compound(Category::General, "Elon Musk"),
            ]
        );

        let plain_twice = CategorySelection::Resolved(vec![
            CategoryTerm::Plain(Category::Health),
            CategoryTerm::Plain(Category::Health),
        ]);
        assert_eq!(filter_unseen(&plain_twice, &BTreeSet::new()), vec![CategoryTerm::Plain(Category::Health)]);

        let unseen = filter_unseen(&selection, &used(&[Category::Sports]));
        assert_eq!(unseen, vec![CategoryTerm::compound(Category::General, "Elon Musk")]);
    }

    #[test]
    fn test_same_category_keywords_are_merged() {
        let selection = CategorySelection::Resolved(vec![
            CategoryTerm::compound(Category::General, "Elon Musk"),
            CategoryTerm::Plain(Category::Business),
            CategoryTerm::compound(Category::General, "Taylor Swift, elon musk"),
        ]);
        let unseen = filter_unseen(&selection, &BTreeSet::new());
        assert_eq!(
            unseen,
            vec![
                CategoryTerm::compound(Category::General, "Elon Musk, Taylor Swift"),
                CategoryTerm::Plain(Category::Business),
            ]
        );

        let ctx = QueryContext {
            dates: DateSpec::on(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()),
            language: None,
            country: None,
            headline_intent: false,
            today: NaiveDate::from_ymd_opt(2024, 5, 9).unwrap(),
            page_size: None,
        };
        let request = query::build(&SourceDescriptor::newsapi(None), &unseen[0], &ctx);
        assert_eq!(request.param("q"), Some("\"Elon Musk\" OR \"Taylor Swift\""));
    }

    #[test]
    fn test_unresolved_expands_to_everything_unseen() {
        let unseen = filter_unseen(&CategorySelection::Unresolved, &used(&[Category::Health, Category::General]));
        let categories: Vec<_> = unseen.iter().map(CategoryTerm::category).collect();
        assert_eq!(
            categories,
            vec![
                Category::Business,
                Category::Entertainment,
                Category::Science,
                Category::Sports,
                Category::Technology,
            ]
        );
        assert!(unseen.iter().all(|t| matches!(t, CategoryTerm::Plain(_))));

        let all = used(&Category::ALL);
        assert!(filter_unseen(&CategorySelection::Unresolved, &all).is_empty());
    }

    fn category() -> impl Strategy<Value = Category> {
        prop::sample::select(Category::ALL.to_vec())
    }

    fn term() -> impl Strategy<Value = CategoryTerm> {
        (category(), prop::option::of("[a-z]{1,8}(, [a-z]{1,8}){0,2}")).prop_map(|(category, keywords)| match keywords {
            Some(keywords) => CategoryTerm::compound(category, keywords),
            None => CategoryTerm::Plain(category),
        })
    }

    fn selection() -> impl Strategy<Value = CategorySelection> {
        prop_oneof![
            1 => Just(CategorySelection::Unresolved),
            4 => prop::collection::vec(term(), 1..8).prop_map(CategorySelection::Resolved),
        ]
    }

    fn requested(selection: &CategorySelection) -> BTreeSet<Category> {
        match selection.terms() {
            Some(terms) => terms.iter().map(CategoryTerm::category).collect(),
            None => Category::ALL.into_iter().collect(),
        }
    }

    proptest! {
        #[test]
        fn prop_second_pass_is_empty(
            selection in selection(),
            used in prop::collection::btree_set(category(), 0..7),
        ) {
            let first = filter_unseen(&selection, &used);
            let mut served = used.clone();
            served.extend(requested(&selection));
            prop_assert!(filter_unseen(&CategorySelection::Resolved(first), &served).is_empty());
        }

        #[test]
        fn prop_result_is_subset_of_request(
            selection in selection(),
            used in prop::collection::btree_set(category(), 0..7),
        ) {
            let requested = requested(&selection);
            let unseen = filter_unseen(&selection, &used);
            let mut categories = BTreeSet::new();
            for term in &unseen {
                prop_assert!(requested.contains(&term.category()));
                prop_assert!(!used.contains(&term.category()));
                prop_assert!(categories.insert(term.category()));
            }
            // Every requested keyword of an unseen category survives the merge.
            if let Some(terms) = selection.terms() {
                for term in terms.iter().filter(|t| !used.contains(&t.category())) {
                    let merged = unseen.iter().find(|u| u.category() == term.category());
                    prop_assert!(merged.is_some());
                    let kept: Vec<String> = merged
                        .map(|u| u.keywords().iter().map(|k| k.to_lowercase()).collect())
                        .unwrap_or_default();
                    for keyword in term.keywords() {
                        prop_assert!(kept.contains(&keyword.to_lowercase()));
                    }
                }
            }
        }
    }
}
