//! Merge, overwrite and delete behavior of PATCH operations.

mod common;

use common::{all_types, init_logging, operation, patch, patch_with, registry, remove};
use scim_patch::PatchConfig;
use serde_json::json;

#[test]
fn test_add_simple_attribute_to_empty_resource() {
    init_logging();
    let resource = all_types(json!({}));
    let outcome = patch(&resource, vec![operation("add", "string", json!("hello world"))]).unwrap();

    assert!(outcome.changed);
    assert_eq!(outcome.resource["string"], "hello world");
    assert!(outcome.resource["meta"]["lastModified"].is_string());
    assert_eq!(outcome.resource["meta"]["resourceType"], "AllTypes");
}

#[test]
fn test_remove_filtered_multi_complex_element() {
    let resource = all_types(json!({"multiComplex": [{"number": 5}, {"number": 10}]}));
    let outcome = patch(&resource, vec![remove("multiComplex[number eq 5]")]).unwrap();
    assert_eq!(outcome.resource["multiComplex"], json!([{"number": 10}]));
}

#[test]
fn test_simple_multi_valued_replace_and_add() {
    let resource = all_types(json!({"numberArray": [1, 2]}));

    let replaced = patch(&resource, vec![operation("replace", "numberArray", json!([3, 4]))]).unwrap();
    assert_eq!(replaced.resource["numberArray"], json!([3, 4]));

    let added = patch(&resource, vec![operation("add", "numberArray", json!([3, 4]))]).unwrap();
    assert_eq!(added.resource["numberArray"], json!([1, 2, 3, 4]));

    // duplicates are kept for simple values
    let duplicate = patch(&resource, vec![operation("add", "numberArray", json!(2))]).unwrap();
    assert_eq!(duplicate.resource["numberArray"], json!([1, 2, 2]));
}

#[test]
fn test_single_complex_add_and_replace() {
    let resource = all_types(json!({"complex": {"string": "a", "number": 1}}));

    let added = patch(&resource, vec![operation("add", "complex", json!({"number": 2}))]).unwrap();
    assert_eq!(added.resource["complex"], json!({"string": "a", "number": 2}));

    let replaced =
        patch(&resource, vec![operation("replace", "complex", json!({"number": 2}))]).unwrap();
    assert_eq!(replaced.resource["complex"], json!({"number": 2}));

    let without_path = patch(
        &resource,
        vec![json!({"op": "replace", "value": {"complex": {"number": 2}}})],
    )
    .unwrap();
    assert_eq!(without_path.resource["complex"], json!({"string": "a", "number": 2}));
}

#[test]
fn test_multi_valued_sub_attribute_of_complex() {
    let resource = all_types(json!({"complex": {"stringArray": ["a"]}}));

    let added = patch(&resource, vec![operation("add", "complex.stringArray", json!(["b"]))]).unwrap();
    assert_eq!(added.resource["complex"]["stringArray"], json!(["a", "b"]));

    let replaced =
        patch(&resource, vec![operation("replace", "complex.stringArray", json!("b"))]).unwrap();
    assert_eq!(replaced.resource["complex"]["stringArray"], json!(["b"]));
}

#[test]
fn test_filtered_add_merges_into_matched_elements() {
    let resource = all_types(json!({
        "multiComplex": [{"number": 5, "string": "a"}, {"number": 10}]
    }));
    let outcome = patch(
        &resource,
        vec![operation(
            "add",
            "multiComplex[number eq 5]",
            json!({"string": "b", "bool": true}),
        )],
    )
    .unwrap();
    assert_eq!(
        outcome.resource["multiComplex"],
        json!([{"number": 5, "string": "b", "bool": true}, {"number": 10}])
    );
}

#[test]
fn test_filtered_replace_in_place() {
    let resource = all_types(json!({
        "multiComplex": [{"number": 1}, {"number": 5, "string": "a"}, {"number": 10}]
    }));

    let single = patch(
        &resource,
        vec![operation("replace", "multiComplex[number eq 5]", json!({"number": 6}))],
    )
    .unwrap();
    assert_eq!(
        single.resource["multiComplex"],
        json!([{"number": 1}, {"number": 6}, {"number": 10}])
    );

    let several = patch(
        &resource,
        vec![operation(
            "replace",
            "multiComplex[number eq 5]",
            json!([{"number": 6}, {"number": 7}]),
        )],
    )
    .unwrap();
    assert_eq!(
        several.resource["multiComplex"],
        json!([{"number": 1}, {"number": 6}, {"number": 7}, {"number": 10}])
    );
}

#[test]
fn test_filtered_sub_attribute_replace() {
    let resource = all_types(json!({
        "multiComplex": [{"number": 5, "string": "a"}, {"number": 10, "string": "b"}]
    }));
    let outcome = patch(
        &resource,
        vec![operation("replace", "multiComplex[number gt 7].string", json!("c"))],
    )
    .unwrap();
    assert_eq!(
        outcome.resource["multiComplex"],
        json!([{"number": 5, "string": "a"}, {"number": 10, "string": "c"}])
    );
}

#[test]
fn test_sub_attribute_without_filter_applies_to_every_element() {
    let resource = all_types(json!({"multiComplex": [{"number": 1}, {"number": 2}]}));
    let outcome =
        patch(&resource, vec![operation("replace", "multiComplex.string", json!("x"))]).unwrap();
    assert_eq!(
        outcome.resource["multiComplex"],
        json!([{"number": 1, "string": "x"}, {"number": 2, "string": "x"}])
    );

    let empty = all_types(json!({}));
    let created = patch(&empty, vec![operation("add", "multiComplex.string", json!("x"))]).unwrap();
    assert_eq!(created.resource["multiComplex"], json!([{"string": "x"}]));
}

#[test]
fn test_remove_sub_attribute_of_matched_elements() {
    let resource = all_types(json!({
        "multiComplex": [{"number": 5, "string": "a"}, {"number": 10, "string": "b"}]
    }));
    let outcome = patch(&resource, vec![remove("multiComplex[number eq 5].number")]).unwrap();
    assert_eq!(
        outcome.resource["multiComplex"],
        json!([{"string": "a"}, {"number": 10, "string": "b"}])
    );

    // an element left without content is dropped as a whole
    let resource = all_types(json!({"multiComplex": [{"string": "a"}, {"number": 10}]}));
    let outcome = patch(&resource, vec![remove(r#"multiComplex[string eq "a"].string"#)]).unwrap();
    assert_eq!(outcome.resource["multiComplex"], json!([{"number": 10}]));
}

#[test]
fn test_removing_last_element_drops_attribute() {
    let resource = all_types(json!({"multiComplex": [{"number": 5}], "string": "kept"}));
    let outcome = patch(&resource, vec![remove("multiComplex[number eq 5]")]).unwrap();
    assert!(outcome.resource.get("multiComplex").is_none());
    assert_eq!(outcome.resource["string"], "kept");
}

#[test]
fn test_filter_on_simple_multi_valued_attribute() {
    let resource = all_types(json!({"numberArray": [1, 2, 3, 2]}));

    let removed = patch(&resource, vec![remove("numberArray[value eq 2]")]).unwrap();
    assert_eq!(removed.resource["numberArray"], json!([1, 3]));

    let replaced =
        patch(&resource, vec![operation("replace", "numberArray[value eq 2]", json!(7))]).unwrap();
    assert_eq!(replaced.resource["numberArray"], json!([1, 7, 3]));
}

#[test]
fn test_date_time_filter_compares_instants() {
    let resource = all_types(json!({
        "multiComplex": [
            {"number": 1, "date": "2019-09-29T22:00:00+02:00"},
            {"number": 2, "date": "2020-01-01T00:00:00Z"}
        ]
    }));
    let outcome = patch(
        &resource,
        vec![remove(r#"multiComplex[date eq "2019-09-29T20:00:00Z"]"#)],
    )
    .unwrap();
    assert_eq!(
        outcome.resource["multiComplex"],
        json!([{"number": 2, "date": "2020-01-01T00:00:00Z"}])
    );
}

#[test]
fn test_compound_filter() {
    let resource = all_types(json!({
        "multiComplex": [
            {"number": 1, "string": "a"},
            {"number": 2, "string": "b"},
            {"number": 3, "string": "c"}
        ]
    }));
    let outcome = patch(
        &resource,
        vec![remove(
            r#"multiComplex[number eq 1 or (number gt 1 and not (string eq "c"))]"#,
        )],
    )
    .unwrap();
    assert_eq!(
        outcome.resource["multiComplex"],
        json!([{"number": 3, "string": "c"}])
    );
}

#[test]
fn test_resource_value_without_path() {
    let resource = all_types(json!({"string": "old", "numberArray": [1]}));
    let outcome = patch(
        &resource,
        vec![json!({"op": "add", "value": {
            "string": "new",
            "numberArray": [2],
            "complex": {"bool": false},
            "schemas": ["ignored"],
            "meta": {"resourceType": "ignored"}
        }})],
    )
    .unwrap();
    assert_eq!(outcome.resource["string"], "new");
    assert_eq!(outcome.resource["numberArray"], json!([1, 2]));
    assert_eq!(outcome.resource["complex"], json!({"bool": false}));
    assert_eq!(outcome.resource["meta"]["resourceType"], "AllTypes");
}

#[test]
fn test_null_value_is_implicit_remove() {
    let resource = all_types(json!({"string": "x", "complex": {"number": 1, "string": "y"}}));
    let outcome = patch(
        &resource,
        vec![
            operation("replace", "string", json!(null)),
            operation("add", "complex", json!({"number": null})),
            operation("replace", "decimal", json!(null)),
        ],
    )
    .unwrap();
    assert!(outcome.resource.get("string").is_none());
    assert_eq!(outcome.resource["complex"], json!({"string": "y"}));
}

#[test]
fn test_attribute_names_are_case_insensitive() {
    let resource = all_types(json!({"complex": {"string": "a"}}));
    let outcome = patch(
        &resource,
        vec![operation("replace", "COMPLEX.String", json!("b"))],
    )
    .unwrap();
    assert_eq!(outcome.resource["complex"], json!({"string": "b"}));
}

#[test]
fn test_repeated_operation_does_not_change_resource() {
    let resource = all_types(json!({}));
    let operations = vec![
        operation("replace", "string", json!("x")),
        operation("add", "multiComplex", json!([{"number": 5}])),
    ];

    let first = patch(&resource, operations.clone()).unwrap();
    assert!(first.changed);
    let second = patch(&first.resource, operations).unwrap();
    assert!(!second.changed);
    assert_eq!(
        second.resource["meta"]["lastModified"],
        first.resource["meta"]["lastModified"]
    );
    assert_eq!(second.resource, first.resource);
}

#[test]
fn test_remove_then_add_restores_value() {
    let value = json!({"string": "a", "numberArray": [1, 2]});
    let resource = all_types(json!({"complex": value.clone()}));
    let outcome = patch(
        &resource,
        vec![remove("complex"), operation("add", "complex", value.clone())],
    )
    .unwrap();
    assert_eq!(outcome.resource["complex"], value);
}

#[test]
fn test_new_primary_email_wins() {
    let registry = registry();
    let user = json!({
        "schemas": ["urn:ietf:params:scim:schemas:core:2.0:User"],
        "userName": "bjensen",
        "emails": [
            {"value": "1@1.de", "primary": true},
            {"value": "2@2.de"},
            {"value": "3@3.de", "primary": false}
        ]
    });
    let outcome = patch_with(
        &registry,
        "User",
        PatchConfig::default(),
        &user,
        vec![operation("add", "emails", json!({"value": "4@4.de", "primary": true}))],
    )
    .unwrap();

    let emails = outcome.resource["emails"].as_array().unwrap();
    assert_eq!(emails.len(), 4);
    let primaries: Vec<_> = emails
        .iter()
        .filter(|email| email.get("primary") == Some(&json!(true)))
        .collect();
    assert_eq!(primaries, vec![&json!({"value": "4@4.de", "primary": true})]);
    for email in &emails[..3] {
        assert!(email.get("primary").is_none(), "{} still has primary", email);
    }
}

#[test]
fn test_group_member_add_and_remove() {
    let registry = registry();
    let group = json!({
        "schemas": ["urn:ietf:params:scim:schemas:core:2.0:Group"],
        "displayName": "Tour Guides",
        "members": [{"value": "2819c223", "type": "User"}]
    });
    let outcome = patch_with(
        &registry,
        "Group",
        PatchConfig::default(),
        &group,
        vec![
            operation("add", "members", json!([{"value": "902c246b", "type": "User"}])),
            remove(r#"members[value eq "2819c223"]"#),
        ],
    )
    .unwrap();
    assert_eq!(
        outcome.resource["members"],
        json!([{"value": "902c246b", "type": "User"}])
    );
}
