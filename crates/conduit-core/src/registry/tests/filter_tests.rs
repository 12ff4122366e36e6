use serde_json::json;

use crate::registry::error::FilterError;
use crate::registry::{Filter, Properties};

fn props(pairs: &[(&str, serde_json::Value)]) -> Properties {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[test]
fn test_empty_and_star_parse_to_any() {
    assert_eq!(Filter::parse("").unwrap(), Filter::Any);
    assert_eq!(Filter::parse("   ").unwrap(), Filter::Any);
    assert_eq!(Filter::parse("*").unwrap(), Filter::Any);
    assert!(Filter::Any.matches(&Properties::new()));
}

#[test]
fn test_equality_and_presence() {
    let filter = Filter::parse("(zone=utc)").unwrap();
    assert_eq!(
        filter,
        Filter::Equals {
            key: "zone".into(),
            value: "utc".into()
        }
    );
    assert!(filter.matches(&props(&[("zone", json!("utc"))])));
    assert!(!filter.matches(&props(&[("zone", json!("cet"))])));
    assert!(!filter.matches(&Properties::new()));

    let present = Filter::parse("(zone=*)").unwrap();
    assert_eq!(present, Filter::Present { key: "zone".into() });
    assert!(present.matches(&props(&[("zone", json!("anything"))])));
    assert!(!present.matches(&props(&[("zone", serde_json::Value::Null)])));
}

#[test]
fn test_escaped_star_is_literal() {
    let filter = Filter::parse(r"(name=\*)").unwrap();
    assert_eq!(
        filter,
        Filter::Equals {
            key: "name".into(),
            value: "*".into()
        }
    );
    assert!(filter.matches(&props(&[("name", json!("*"))])));
    assert!(!filter.matches(&props(&[("name", json!("other"))])));
    assert_eq!(filter.to_string(), r"(name=\*)");
}

#[test]
fn test_numeric_comparisons() {
    let ge = Filter::parse("(service.ranking>=10)").unwrap();
    let le = Filter::parse("(service.ranking<=10)").unwrap();
    let high = props(&[("service.ranking", json!(20))]);
    let low = props(&[("service.ranking", json!(5))]);
    let exact = props(&[("service.ranking", json!(10))]);

    assert!(ge.matches(&high));
    assert!(!ge.matches(&low));
    assert!(ge.matches(&exact));
    assert!(le.matches(&low));
    assert!(!le.matches(&high));
    assert!(le.matches(&exact));

    // Numbers compare against their textual form too
    assert!(Filter::parse("(port=8080)")
        .unwrap()
        .matches(&props(&[("port", json!(8080))])));
}

#[test]
fn test_boolean_and_array_values() {
    let filter = Filter::parse("(enabled=true)").unwrap();
    assert!(filter.matches(&props(&[("enabled", json!(true))])));
    assert!(!filter.matches(&props(&[("enabled", json!(false))])));

    let tags = Filter::parse("(tags=fast)").unwrap();
    assert!(tags.matches(&props(&[("tags", json!(["slow", "fast"]))])));
    assert!(!tags.matches(&props(&[("tags", json!(["slow"]))])));
}

#[test]
fn test_composites() {
    let filter = Filter::parse("(&(zone=utc)(|(precision=ms)(precision=ns))(!(deprecated=true)))")
        .unwrap();
    assert!(filter.matches(&props(&[
        ("zone", json!("utc")),
        ("precision", json!("ns")),
    ])));
    assert!(!filter.matches(&props(&[
        ("zone", json!("utc")),
        ("precision", json!("s")),
    ])));
    assert!(!filter.matches(&props(&[
        ("zone", json!("utc")),
        ("precision", json!("ms")),
        ("deprecated", json!(true)),
    ])));
}

#[test]
fn test_version_requirement() {
    let filter = Filter::parse("(version~=^1.2)").unwrap();
    assert!(filter.matches(&props(&[("version", json!("1.4.0"))])));
    assert!(!filter.matches(&props(&[("version", json!("2.0.0"))])));
    assert!(!filter.matches(&props(&[("version", json!("not-a-version"))])));
    assert!(!filter.matches(&props(&[("version", json!(1))])));
}

#[test]
fn test_whitespace_is_tolerated_and_display_normalizes() {
    let filter = Filter::parse("  ( & ( zone = utc ) ( rank >= 3 ) )  ").unwrap();
    assert_eq!(filter.to_string(), "(&(zone=utc)(rank>=3))");
    let reparsed: Filter = filter.to_string().parse().unwrap();
    assert_eq!(reparsed, filter);
}

#[test]
fn test_and_merging() {
    let a = Filter::parse("(a=1)").unwrap();
    let b = Filter::parse("(b=2)").unwrap();
    let c = Filter::parse("(c=3)").unwrap();

    assert_eq!(Filter::Any.and(a.clone()), a);
    assert_eq!(a.clone().and(Filter::Any), a);
    assert_eq!(
        a.clone().and(b.clone()).and(c.clone()),
        Filter::And(vec![a.clone(), b.clone(), c.clone()])
    );
    assert_eq!(
        a.clone().and(Filter::And(vec![b.clone(), c.clone()])),
        Filter::And(vec![a, b, c])
    );
}

#[test]
fn test_parse_errors() {
    assert!(matches!(
        Filter::parse("(zone=utc"),
        Err(FilterError::UnexpectedEnd { .. })
    ));
    assert!(matches!(
        Filter::parse("zone=utc"),
        Err(FilterError::UnexpectedChar { found: 'z', position: 0 })
    ));
    assert!(matches!(
        Filter::parse("(=utc)"),
        Err(FilterError::MissingAttribute { position: 1 })
    ));
    assert!(matches!(
        Filter::parse("(&)"),
        Err(FilterError::EmptyComposite { .. })
    ));
    assert!(matches!(
        Filter::parse("(zone>utc)"),
        Err(FilterError::UnexpectedChar { found: 'u', .. })
    ));
    assert!(matches!(
        Filter::parse("(v~=not a req)"),
        Err(FilterError::InvalidVersionRequirement { .. })
    ));
    assert!(matches!(
        Filter::parse("(a=1)(b=2)"),
        Err(FilterError::TrailingInput { position: 5 })
    ));
    assert!(matches!(
        Filter::parse("(a=(b))"),
        Err(FilterError::UnexpectedChar { found: '(', .. })
    ));
}
