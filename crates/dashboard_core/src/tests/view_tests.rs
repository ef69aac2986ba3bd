use super::*;
use shared::{
    domain::{Company, UserId},
    query::SortField,
};

fn user(id: i64, name: &str, email: &str) -> User {
    User {
        id: UserId(id),
        name: name.to_string(),
        email: email.to_string(),
        phone: format!("555-01{id:02}"),
        website: format!("user{id}.example"),
        company: Company {
            name: format!("Company {id}"),
        },
    }
}

fn seven_users() -> Vec<User> {
    vec![
        user(1, "Alice Adams", "alice@example.com"),
        user(2, "Ben Brooks", "ben@example.com"),
        user(3, "Cara Chen", "cara@example.com"),
        user(4, "Dan Diaz", "dan@example.com"),
        user(5, "Eve Ellis", "eve@example.com"),
        user(6, "Fay Ford", "fay@example.com"),
        user(7, "Gus Grant", "gus@example.com"),
    ]
}

fn names(page: &DerivedPage) -> Vec<&str> {
    page.items.iter().map(|user| user.name.as_str()).collect()
}

#[test]
fn empty_search_matches_every_record() {
    let records = seven_users();
    let page = derive_page(&records, "", SortDirective::default(), PageRequest::new(1, 50));
    assert_eq!(page.total_matched, 7);
    assert_eq!(page.items.len(), 7);
}

#[test]
fn search_matches_name_or_email_case_insensitively() {
    let records = vec![
        user(1, "Jane Cooper", "j.cooper@example.com"),
        user(2, "Mark Reyes", "jane.reyes@example.com"),
        user(3, "Cara Chen", "cara@example.com"),
    ];

    let page = derive_page(&records, "JANE", SortDirective::default(), PageRequest::new(1, 10));
    assert_eq!(page.total_matched, 2);
    assert_eq!(names(&page), vec!["Jane Cooper", "Mark Reyes"]);
}

#[test]
fn search_does_not_look_at_other_fields() {
    let mut records = seven_users();
    records[0].phone = "jane-line".to_string();
    records[0].website = "jane.example".to_string();
    records[0].company.name = "Jane Industries".to_string();

    let page = derive_page(&records, "jane", SortDirective::default(), PageRequest::new(1, 10));
    assert_eq!(page.total_matched, 0);
    assert!(page.items.is_empty());
}

#[test]
fn sort_is_case_insensitive_on_the_field_value() {
    let records = vec![
        user(1, "CARL", "carl@example.com"),
        user(2, "alice", "alice@example.com"),
        user(3, "Bob", "bob@example.com"),
    ];

    let ascending = derive_page(&records, "", SortDirective::default(), PageRequest::new(1, 10));
    assert_eq!(names(&ascending), vec!["alice", "Bob", "CARL"]);

    let descending = derive_page(
        &records,
        "",
        SortDirective::descending(SortField::Name),
        PageRequest::new(1, 10),
    );
    assert_eq!(names(&descending), vec!["CARL", "Bob", "alice"]);
}

#[test]
fn equal_keys_keep_input_order_in_both_directions() {
    let records = vec![
        user(1, "Sam Reed", "first@example.com"),
        user(2, "Sam Reed", "second@example.com"),
        user(3, "Amy Cole", "amy@example.com"),
    ];

    let ascending = derive_page(&records, "", SortDirective::default(), PageRequest::new(1, 10));
    let ids: Vec<i64> = ascending.items.iter().map(|user| user.id.0).collect();
    assert_eq!(ids, vec![3, 1, 2]);

    let descending = derive_page(
        &records,
        "",
        SortDirective::descending(SortField::Name),
        PageRequest::new(1, 10),
    );
    let ids: Vec<i64> = descending.items.iter().map(|user| user.id.0).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[test]
fn sorts_on_each_field_of_the_closed_set() {
    let mut records = seven_users();
    records[0].company.name = "Zenith".to_string();
    records[6].company.name = "Acme".to_string();

    let by_company = derive_page(
        &records,
        "",
        SortDirective::ascending(SortField::Company),
        PageRequest::new(1, 10),
    );
    assert_eq!(by_company.items[0].name, "Gus Grant");
    assert_eq!(by_company.items[6].name, "Alice Adams");

    let by_email_desc = derive_page(
        &records,
        "",
        SortDirective::descending(SortField::Email),
        PageRequest::new(1, 10),
    );
    assert_eq!(by_email_desc.items[0].email, "gus@example.com");
    assert_eq!(by_email_desc.items[6].email, "alice@example.com");
}

#[test]
fn seven_records_split_five_then_two() {
    let records = seven_users();

    let first = derive_page(&records, "", SortDirective::default(), PageRequest::new(1, 5));
    assert_eq!(first.total_matched, 7);
    assert_eq!(
        names(&first),
        vec!["Alice Adams", "Ben Brooks", "Cara Chen", "Dan Diaz", "Eve Ellis"]
    );

    let second = derive_page(&records, "", SortDirective::default(), PageRequest::new(2, 5));
    assert_eq!(second.total_matched, 7);
    assert_eq!(names(&second), vec!["Fay Ford", "Gus Grant"]);
}

#[test]
fn concatenated_pages_reconstruct_the_whole_sequence() {
    let records = seven_users();
    let whole = derive_page(&records, "", SortDirective::default(), PageRequest::new(1, 50));

    let mut rebuilt = Vec::new();
    for page in 1..=3 {
        let slice = derive_page(&records, "", SortDirective::default(), PageRequest::new(page, 3));
        assert!(slice.items.len() <= 3);
        rebuilt.extend(slice.items);
    }

    assert_eq!(rebuilt, whole.items);
}

#[test]
fn page_past_the_end_is_empty_but_reports_the_total() {
    let records = seven_users();
    let page = derive_page(&records, "", SortDirective::default(), PageRequest::new(5, 5));
    assert!(page.items.is_empty());
    assert_eq!(page.total_matched, 7);
}

#[test]
fn identical_inputs_produce_identical_output() {
    let records = seven_users();
    let first = derive_page(&records, "a", SortDirective::default(), PageRequest::new(1, 3));
    let second = derive_page(&records, "a", SortDirective::default(), PageRequest::new(1, 3));
    assert_eq!(first, second);
}

#[test]
fn no_records_derives_an_empty_page() {
    let page = derive_page(&[], "anything", SortDirective::default(), PageRequest::new(1, 5));
    assert!(page.items.is_empty());
    assert_eq!(page.total_matched, 0);
}
