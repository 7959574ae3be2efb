use reqgraph_check::{
    RULE_BROKEN_REF, RULE_CYCLE_DERIVE_REFINE, RULE_DUP_REQID, ValidationConfig, validate_static,
};
use reqgraph_schema::Schema;
use reqgraph_store::{Element, ElementService, ElementStore, Properties};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn schema() -> Schema {
    Schema::bundled().expect("bundled schema must load")
}

fn element(id: &str, element_type: &str, properties: Value) -> Element {
    Element::new(id, element_type)
        .with_properties(properties.as_object().cloned().expect("object literal"))
}

fn props(value: Value) -> Properties {
    value.as_object().cloned().expect("object literal")
}

#[test]
fn mixed_violations_report() {
    let elements = vec![
        element("A", "RequirementUsage", json!({"reqId": "R-1"})),
        element("B", "RequirementUsage", json!({"reqId": "R-1"})),
        element("d1", "DeriveRelationship", json!({"source": "A", "target": "B"})),
        element("d2", "DeriveRelationship", json!({"source": "B", "target": "A"})),
        element("s1", "SatisfyRelationship", json!({"source": "A", "target": "Z"})),
    ];
    let report = validate_static(&schema(), &elements, &ValidationConfig::default());
    insta::assert_json_snapshot!("mixed_violations_report", report);
}

#[test]
fn stored_project_reports_every_rule() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = ElementStore::new(dir.path(), Arc::new(schema()));
    let service = ElementService::new(Arc::new(store));

    for id in ["A", "B", "C"] {
        service
            .create(
                "alpha",
                "RequirementUsage",
                props(json!({"id": id, "reqId": "X"})),
            )
            .expect("requirement");
    }
    for (source, target) in [("A", "B"), ("B", "C"), ("C", "A")] {
        service
            .create(
                "alpha",
                "DeriveRelationship",
                props(json!({"source": source, "target": target})),
            )
            .expect("derive");
    }
    service
        .create("alpha", "RequirementUsage", props(json!({"id": "Z"})))
        .expect("soon deleted");
    service
        .create(
            "alpha",
            "SatisfyRelationship",
            props(json!({"id": "E", "source": "A", "target": "Z"})),
        )
        .expect("satisfy");
    service
        .delete_with("alpha", "Z", reqgraph_store::DeletePolicy::restrict().forced())
        .expect("forced delete");

    let (snapshot, snapshot_ref) = service.snapshot_with_ref("alpha").expect("snapshot");
    let report = validate_static(service.schema(), &snapshot, &ValidationConfig::default())
        .with_snapshot_ref(snapshot_ref);

    let duplicates: Vec<&str> = report
        .by_rule(RULE_DUP_REQID)
        .map(|v| v.element_id.as_str())
        .collect();
    assert_eq!(duplicates, vec!["A", "B", "C"]);

    let cycles: Vec<_> = report.by_rule(RULE_CYCLE_DERIVE_REFINE).collect();
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].related_ids, vec!["A", "B", "C"]);

    let broken: Vec<(&str, &str)> = report
        .by_rule(RULE_BROKEN_REF)
        .map(|v| (v.element_id.as_str(), v.related_ids[0].as_str()))
        .collect();
    assert_eq!(broken, vec![("E", "Z")]);

    assert_eq!(report.snapshot_ref.as_deref().map(str::len), Some(64));
    assert!(!report.accepted());
}

#[test]
fn five_hundred_elements_validate_quickly() {
    let mut elements = Vec::new();
    for n in 0..300 {
        elements.push(element(
            &format!("R{n:03}"),
            "RequirementUsage",
            json!({"reqId": format!("REQ-{}", n % 250), "name": format!("req {n}")}),
        ));
    }
    for n in 0..200 {
        let source = format!("R{:03}", n);
        let target = format!("R{:03}", (n + 1) % 200);
        elements.push(element(
            &format!("D{n:03}"),
            "DeriveRelationship",
            json!({"source": source, "target": target}),
        ));
    }

    let started = Instant::now();
    let report = validate_static(&schema(), &elements, &ValidationConfig::default());
    assert!(started.elapsed() < Duration::from_secs(2));

    assert_eq!(report.summary.element_count, 500);
    assert_eq!(report.summary.duplicate_key_count, 100);
    assert_eq!(report.summary.cycle_count, 1);
    assert_eq!(report.summary.broken_ref_count, 0);
}
