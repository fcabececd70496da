//! Criteria evaluated against real indexes.

use chrono::{DateTime, Local, TimeZone, Utc};
use rcd_model::{
    ActivityFilter, ChangeType, ChangeTypeSet, Condition, Dictionary, DictionaryNamedPath,
    FilterCriteria, FilterValue, Filters, Group, History, MetaField, MetaFieldType, RecodeRule,
    SortOrder,
};
use rcd_testkit::prelude::*;

fn names(dictionaries: &[Dictionary]) -> Vec<&str> {
    dictionaries.iter().map(|d| d.name.as_str()).collect()
}

fn field_names(meta_fields: &[MetaField]) -> Vec<&str> {
    meta_fields.iter().map(|m| m.name.as_str()).collect()
}

/// Columns `a` (string, 1), `b` (number, 2) and `c` (date, 3).
fn columns() -> TestService<MetaField> {
    let column = |name: &str, field_type: MetaFieldType, ordinal: i32| {
        let mut meta_field = MetaField::new("dictionary-1", name);
        meta_field.field_type = field_type;
        meta_field.ordinal = ordinal;
        meta_field
    };
    TestService::synced(vec![
        column("a", MetaFieldType::String, 1),
        column("b", MetaFieldType::Number, 2),
        column("c", MetaFieldType::Date, 3),
    ])
}

fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Local
        .with_ymd_and_hms(y, m, d, h, min, 0)
        .single()
        .unwrap()
        .with_timezone(&Utc)
}

fn dated(name: &str, change_date: DateTime<Utc>) -> Dictionary {
    let mut dictionary = Dictionary::new(scenarios::GROUP_ID, name);
    dictionary.history = History::new(name, ChangeType::Update, change_date);
    dictionary
}

fn versioned(name: &str, version: Option<&str>) -> Dictionary {
    let mut dictionary = Dictionary::new(scenarios::GROUP_ID, name);
    dictionary.version = version.map(str::to_string);
    dictionary
}

// === Activity ===

#[test]
fn activity_filters_over_alpha_beta_gamma() {
    let index = TestService::synced(scenarios::alpha_beta_gamma());

    let actual = index.find_by_criteria(&FilterCriteria::new()).unwrap();
    assert_eq!(names(&actual.items), vec!["alpha", "beta"]);
    assert_eq!(actual.count_by_filter, 2);
    assert_eq!(actual.total_count, 3);

    let all = index
        .find_by_criteria(&FilterCriteria::new().activity(ActivityFilter::ALL))
        .unwrap();
    assert_eq!(names(&all.items), vec!["alpha", "beta", "gamma"]);

    let closed = index
        .find_by_criteria(&FilterCriteria::new().activity(ActivityFilter::CLOSED))
        .unwrap();
    assert_eq!(names(&closed.items), vec!["gamma"]);
}

#[test]
fn negated_activity_over_every_type_shows_nothing() {
    let index = TestService::synced(scenarios::alpha_beta_gamma());
    let nothing = ActivityFilter::new(ChangeTypeSet::ALL, Condition::Not);

    let result = index
        .find_by_criteria(&FilterCriteria::new().activity(nothing))
        .unwrap();
    assert!(result.items.is_empty());
    assert_eq!(result.count_by_filter, 0);
    assert_eq!(result.total_count, 3);

    let open = ActivityFilter::new(ChangeTypeSet::of(&[ChangeType::Close]), Condition::Not);
    let result = index
        .find_by_criteria(&FilterCriteria::new().activity(open))
        .unwrap();
    assert_eq!(names(&result.items), vec!["alpha", "beta"]);
}

#[test]
fn descending_pages_over_all_activity() {
    let index = TestService::synced(scenarios::alpha_beta_gamma());
    let criteria = FilterCriteria::new()
        .activity(ActivityFilter::ALL)
        .sort("name", SortOrder::Desc);

    let first = index.find_by_criteria(&criteria.clone().page(0, 2)).unwrap();
    let second = index.find_by_criteria(&criteria.page(2, 2)).unwrap();

    assert_eq!(names(&first.items), vec!["gamma", "beta"]);
    assert_eq!(names(&second.items), vec!["alpha"]);
    assert_eq!(second.count_by_filter, 3);
}

// === Conditions ===

#[test]
fn enum_sets_combine_their_values() {
    let index = columns();
    let find = |value: FilterValue| {
        let criteria = FilterCriteria::new().filter("type", value);
        index.find_by_criteria(&criteria).unwrap().items
    };

    let either = find(FilterValue::enum_set(["NUMBER", "DATE"]));
    assert_eq!(field_names(&either), vec!["b", "c"]);

    // One value per entity: two distinct values are never both held.
    let both = find(FilterValue::enum_set(["NUMBER", "DATE"]).with_inner(Condition::And));
    assert!(both.is_empty());

    let neither = find(FilterValue::enum_set(["STRING"]).with_inner(Condition::Not));
    assert_eq!(field_names(&neither), vec!["b", "c"]);
}

#[test]
fn outer_not_as_first_and_later_filter() {
    let index = columns();
    let not_string = || FilterValue::enum_set(["STRING"]).with_condition(Condition::Not);

    let first = FilterCriteria::new().filter("type", not_string());
    assert_eq!(
        field_names(&index.find_by_criteria(&first).unwrap().items),
        vec!["b", "c"]
    );

    let later = FilterCriteria::new()
        .filter("dictionaryId", FilterValue::string_eq("dictionary-1"))
        .filter("type", not_string());
    assert_eq!(
        field_names(&index.find_by_criteria(&later).unwrap().items),
        vec!["b", "c"]
    );
}

#[test]
fn or_folds_with_everything_before_it() {
    let index = columns();
    let criteria = FilterCriteria::new()
        .filter("name", FilterValue::string_eq("a"))
        .filter(
            "type",
            FilterValue::enum_set(["NUMBER"]).with_condition(Condition::Or),
        );

    let result = index.find_by_criteria(&criteria).unwrap();
    assert_eq!(field_names(&result.items), vec!["a", "b"]);
}

#[test]
fn numbers_match_in_canonical_form() {
    let index = columns();
    for spelling in ["2", "2.0", " 2.00 "] {
        let criteria = FilterCriteria::new().filter("ordinal", FilterValue::string_eq(spelling));
        let result = index.find_by_criteria(&criteria).unwrap();
        assert_eq!(field_names(&result.items), vec!["b"], "ordinal {spelling:?}");
    }
}

#[test]
fn alias_matches_every_delegate() {
    let index = TestService::synced(vec![
        RecodeRule::new("set-1", "f1", "f2"),
        RecodeRule::new("set-1", "f3", "f1"),
        RecodeRule::new("set-1", "f2", "f3"),
    ]);

    let criteria = FilterCriteria::new().filter("fieldId", FilterValue::string_eq("f1"));
    let result = index.find_by_criteria(&criteria).unwrap();
    assert_eq!(result.count_by_filter, 2);
    assert!(result
        .items
        .iter()
        .all(|rule| rule.from_field_id == "f1" || rule.to_field_id == "f1"));
}

// === Blank values ===

#[test]
fn blank_string_in_a_set_means_empty() {
    let index = TestService::synced(vec![
        versioned("none", None),
        versioned("ex", Some("x")),
        versioned("why", Some("y")),
    ]);

    let set = FilterCriteria::new()
        .filter("version", FilterValue::string_set(["", "x"]))
        .sort("name", SortOrder::Asc);
    let from_set = index.find_by_criteria(&set).unwrap();

    let mut nested = Filters::new();
    nested.insert("version", FilterValue::string_eq("x"));
    let spelled_out = FilterCriteria::new()
        .filter("version", FilterValue::empty())
        .filter(
            "exact",
            FilterValue::clause(nested).with_condition(Condition::Or),
        )
        .sort("name", SortOrder::Asc);
    let from_clauses = index.find_by_criteria(&spelled_out).unwrap();

    assert_eq!(names(&from_set.items), vec!["ex", "none"]);
    assert_eq!(from_set, from_clauses);
}

#[test]
fn blank_string_equality_means_empty() {
    let index = TestService::synced(vec![versioned("none", None), versioned("ex", Some("x"))]);

    let result = index
        .find_by_criteria(&FilterCriteria::new().filter("version", FilterValue::string_eq("  ")))
        .unwrap();
    assert_eq!(names(&result.items), vec!["none"]);

    let present = index
        .find_by_criteria(&FilterCriteria::new().filter("version", FilterValue::not_empty()))
        .unwrap();
    assert_eq!(names(&present.items), vec!["ex"]);
}

// === Dates ===

#[test]
fn single_day_range_covers_the_whole_local_day() {
    let index = TestService::synced(vec![
        dated("day before", local(2024, 6, 14, 23, 55)),
        dated("early", local(2024, 6, 15, 0, 5)),
        dated("noon", local(2024, 6, 15, 12, 0)),
        dated("late", local(2024, 6, 15, 23, 55)),
        dated("day after", local(2024, 6, 16, 0, 5)),
    ]);
    let day = local(2024, 6, 15, 9, 30);

    let criteria = FilterCriteria::new()
        .filter("changeDate", FilterValue::date_range(Some(day), Some(day)))
        .sort("changeDate", SortOrder::Asc);
    let result = index.find_by_criteria(&criteria).unwrap();

    assert_eq!(names(&result.items), vec!["early", "noon", "late"]);
}

#[test]
fn open_ended_date_ranges() {
    let index = TestService::synced(vec![
        dated("old", local(2020, 1, 10, 12, 0)),
        dated("new", local(2024, 6, 15, 12, 0)),
    ]);
    let cutoff = Some(local(2023, 1, 1, 12, 0));

    let since = index
        .find_by_criteria(&FilterCriteria::new().filter("changeDate", FilterValue::date_range(cutoff, None)))
        .unwrap();
    let until = index
        .find_by_criteria(&FilterCriteria::new().filter("changeDate", FilterValue::date_range(None, cutoff)))
        .unwrap();

    assert_eq!(names(&since.items), vec!["new"]);
    assert_eq!(names(&until.items), vec!["old"]);
}

// === Search ===

#[test]
fn search_combines_with_filters() {
    let mut countries = Dictionary::new(scenarios::GROUP_ID, "countries");
    countries.description = Some("ISO country codes".into());
    let mut currencies = Dictionary::new(scenarios::GROUP_ID, "currencies");
    currencies.description = Some("ISO currency codes".into());
    let index = TestService::synced(vec![countries, currencies, Dictionary::new("group-2", "codes")]);

    let criteria = FilterCriteria::new()
        .search("cod")
        .filter("groupId", FilterValue::string_eq(scenarios::GROUP_ID));
    let result = index.find_by_criteria(&criteria).unwrap();
    assert_eq!(names(&result.items), vec!["countries", "currencies"]);

    let either = FilterCriteria::new()
        .search("countr")
        .search_condition(Condition::Or)
        .filter("groupId", FilterValue::string_eq("group-2"));
    let result = index.find_by_criteria(&either).unwrap();
    assert_eq!(names(&result.items), vec!["codes", "countries"]);
}

#[test]
fn search_ignores_words_the_index_drops() {
    let long = "x".repeat(40);
    let mut dictionary = Dictionary::new(scenarios::GROUP_ID, "countries");
    dictionary.description = Some(format!("{long} codes"));
    let index = TestService::synced(vec![dictionary]);

    let short = index
        .find_by_criteria(&FilterCriteria::new().search("cod"))
        .unwrap();
    assert_eq!(short.count_by_filter, 1);

    let with_long = index
        .find_by_criteria(&FilterCriteria::new().search(format!("cod {long}")))
        .unwrap();
    assert_eq!(with_long.count_by_filter, 1);
}

// === Paging ===

#[test]
fn pages_hold_only_the_requested_window() {
    let index = TestService::synced(scenarios::numbered_dictionaries(300));
    let criteria = FilterCriteria::new().sort("name", SortOrder::Desc);

    let everything = index
        .find_by_criteria(&FilterCriteria::unbounded().sort("name", SortOrder::Desc))
        .unwrap();
    let page = index.find_by_criteria(&criteria.page(140, 25)).unwrap();

    assert_eq!(page.count_by_filter, 300);
    assert_eq!(page.items, everything.items[140..165].to_vec());
}

// === Named paths ===

#[test]
fn meta_fields_resolve_by_path() {
    let (group, dictionary, meta_field) = scenarios::hierarchy();
    let groups = TestService::synced(vec![group, Group::new("finance")]);
    let dictionaries = TestService::synced(vec![dictionary]);
    let meta_fields = TestService::synced(vec![meta_field.clone(), MetaField::new("other", "code")]);

    let path: DictionaryNamedPath = "GEO.Countries".parse().unwrap();
    let found = meta_fields
        .find_by_path(&dictionaries, &groups, &path.meta_field("CODE"))
        .unwrap();
    assert_eq!(found.map(|m| m.id), Some(meta_field.id));

    let missing = meta_fields
        .find_by_path(&dictionaries, &groups, &path.meta_field("name"))
        .unwrap();
    assert!(missing.is_none());
}
