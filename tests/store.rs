use arbor::error::Error;
use arbor::store::{ListFilter, Sort, SqliteStore, Store};
use arbor::types::{Application, Attribute, DataType, Organisation, TreeFields};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

fn test_store() -> (tempfile::TempDir, SqliteStore) {
    let dir = tempfile::TempDir::new().expect("create temp dir");
    let store = SqliteStore::new(dir.path().join("arbor.db")).expect("open store");
    store.initialize().expect("initialize store");
    (dir, store)
}

fn new_org(name: &str, parent_id: Option<&str>) -> Organisation {
    let now = Utc::now();
    Organisation {
        id: Uuid::new_v4().to_string(),
        slug: String::new(),
        name: name.to_string(),
        description: None,
        code: None,
        email: None,
        phone: None,
        address: None,
        website: None,
        is_active: true,
        metadata: json!({}),
        tree: TreeFields {
            parent_id: parent_id.map(str::to_string),
            ..TreeFields::default()
        },
        created_at: now,
        updated_at: now,
    }
}

fn new_attr(name: &str, value: &str, data_type: DataType, parent_id: Option<&str>) -> Attribute {
    let now = Utc::now();
    Attribute {
        id: Uuid::new_v4().to_string(),
        slug: String::new(),
        name: name.to_string(),
        value: value.to_string(),
        data_type,
        description: None,
        is_active: true,
        metadata: json!({}),
        tree: TreeFields {
            parent_id: parent_id.map(str::to_string),
            ..TreeFields::default()
        },
        created_at: now,
        updated_at: now,
    }
}

fn new_app(name: &str, parent_id: Option<&str>) -> Application {
    let now = Utc::now();
    Application {
        id: Uuid::new_v4().to_string(),
        slug: String::new(),
        name: name.to_string(),
        description: None,
        properties: json!({}),
        tree: TreeFields {
            parent_id: parent_id.map(str::to_string),
            ..TreeFields::default()
        },
        created_at: now,
        updated_at: now,
    }
}

#[test]
fn slug_uniqueness_with_identical_names() {
    let (_dir, store) = test_store();

    let mut slugs = Vec::new();
    for _ in 0..4 {
        let created = store.create_organisation(&new_org("Acme", None)).unwrap();
        slugs.push(created.slug);
    }

    assert_eq!(slugs, ["acme", "acme-1", "acme-2", "acme-3"]);
}

#[test]
fn explicit_slug_collision_rejected() {
    let (_dir, store) = test_store();

    let mut first = new_org("First", None);
    first.slug = "fixed".to_string();
    store.create_organisation(&first).unwrap();

    let mut second = new_org("Second", None);
    second.slug = "fixed".to_string();
    let err = store.create_organisation(&second).unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    // nothing persisted for the rejected record
    assert!(store.get_organisation(&second.id).unwrap().is_none());
}

#[test]
fn resave_keeps_generated_slug() {
    let (_dir, store) = test_store();

    let created = store.create_organisation(&new_org("Acme", None)).unwrap();
    assert_eq!(created.slug, "acme");

    let updated = store.update_organisation(&created).unwrap();
    assert_eq!(updated.slug, "acme");
}

#[test]
fn company_subsidiary_scenario() {
    let (_dir, store) = test_store();

    let company = store.create_organisation(&new_org("Company A", None)).unwrap();
    assert_eq!(company.slug, "company-a");
    assert_eq!(company.tree.depth, 0);

    let subsidiary = store
        .create_organisation(&new_org("Subsidiary 1", Some(&company.id)))
        .unwrap();
    assert_eq!(subsidiary.slug, "subsidiary-1");
    assert_eq!(subsidiary.tree.depth, 1);
    assert!(
        subsidiary
            .tree
            .path
            .starts_with(&format!("{}.", company.tree.path))
    );

    let ancestors = store.organisation_ancestors(&subsidiary.id).unwrap();
    let names: Vec<&str> = ancestors.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, ["Company A"]);
}

#[test]
fn path_sort_is_preorder() {
    let (_dir, store) = test_store();

    let root = store.create_organisation(&new_org("Root", None)).unwrap();
    let child_a = store
        .create_organisation(&new_org("Child A", Some(&root.id)))
        .unwrap();
    let _grandchild = store
        .create_organisation(&new_org("Grandchild", Some(&child_a.id)))
        .unwrap();
    let _child_b = store
        .create_organisation(&new_org("Child B", Some(&root.id)))
        .unwrap();
    let _other_root = store.create_organisation(&new_org("Other Root", None)).unwrap();

    let listed = store
        .list_organisations(&ListFilter {
            limit: -1,
            ..ListFilter::default()
        })
        .unwrap();

    let names: Vec<&str> = listed.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(
        names,
        ["Root", "Child A", "Grandchild", "Child B", "Other Root"]
    );

    // the listing really is ascending path order
    let paths: Vec<&str> = listed.iter().map(|o| o.tree.path.as_str()).collect();
    let mut sorted = paths.clone();
    sorted.sort();
    assert_eq!(paths, sorted);
}

#[test]
fn interval_containment_matches_descendants() {
    let (_dir, store) = test_store();

    let root = store.create_organisation(&new_org("Root", None)).unwrap();
    let mid = store
        .create_organisation(&new_org("Mid", Some(&root.id)))
        .unwrap();
    let leaf = store
        .create_organisation(&new_org("Leaf", Some(&mid.id)))
        .unwrap();
    let other = store.create_organisation(&new_org("Other", None)).unwrap();

    let all = store
        .list_organisations(&ListFilter {
            limit: -1,
            ..ListFilter::default()
        })
        .unwrap();

    for node in &all {
        assert!(node.tree.lft < node.tree.rgt, "{}: lft < rgt", node.name);
    }

    let descendants = store.organisation_descendants(&root.id).unwrap();
    let names: Vec<&str> = descendants.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, ["Mid", "Leaf"]);

    // interval containment agrees with the descendant query
    let root_row = all.iter().find(|o| o.id == root.id).unwrap();
    for node in &all {
        let inside = node.tree.lft > root_row.tree.lft && node.tree.lft < root_row.tree.rgt;
        let is_descendant = descendants.iter().any(|d| d.id == node.id);
        assert_eq!(inside, is_descendant, "{}", node.name);
    }

    assert!(store.organisation_descendants(&leaf.id).unwrap().is_empty());
    assert!(store.organisation_descendants(&other.id).unwrap().is_empty());
}

#[test]
fn depth_matches_parent_depth() {
    let (_dir, store) = test_store();

    let root = store.create_organisation(&new_org("Root", None)).unwrap();
    let mid = store
        .create_organisation(&new_org("Mid", Some(&root.id)))
        .unwrap();
    let _leaf = store
        .create_organisation(&new_org("Leaf", Some(&mid.id)))
        .unwrap();

    let all = store
        .list_organisations(&ListFilter {
            limit: -1,
            ..ListFilter::default()
        })
        .unwrap();

    for node in &all {
        match &node.tree.parent_id {
            None => assert_eq!(node.tree.depth, 0, "{}", node.name),
            Some(parent_id) => {
                let parent = all.iter().find(|o| &o.id == parent_id).unwrap();
                assert_eq!(node.tree.depth, parent.tree.depth + 1, "{}", node.name);
            }
        }
    }
}

#[test]
fn reparent_updates_descendants() {
    let (_dir, store) = test_store();

    let root1 = store.create_organisation(&new_org("Root 1", None)).unwrap();
    let root2 = store.create_organisation(&new_org("Root 2", None)).unwrap();
    let branch = store
        .create_organisation(&new_org("Branch", Some(&root2.id)))
        .unwrap();
    let mut mid = store
        .create_organisation(&new_org("Mid", Some(&root1.id)))
        .unwrap();
    let leaf = store
        .create_organisation(&new_org("Leaf", Some(&mid.id)))
        .unwrap();
    assert_eq!(leaf.tree.depth, 2);

    mid.tree.parent_id = Some(branch.id.clone());
    let moved = store.update_organisation(&mid).unwrap();
    assert_eq!(moved.tree.depth, 2);

    let leaf = store.get_organisation(&leaf.id).unwrap().unwrap();
    assert_eq!(leaf.tree.depth, moved.tree.depth + 1);
    assert!(leaf.tree.path.starts_with(&format!("{}.", moved.tree.path)));

    let ancestors = store.organisation_ancestors(&leaf.id).unwrap();
    let names: Vec<&str> = ancestors.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, ["Root 2", "Branch", "Mid"]);

    // root1 no longer has descendants
    assert!(store.organisation_descendants(&root1.id).unwrap().is_empty());
}

#[test]
fn cycle_rejected_and_fields_unchanged() {
    let (_dir, store) = test_store();

    let mut root = store.create_organisation(&new_org("Root", None)).unwrap();
    let mid = store
        .create_organisation(&new_org("Mid", Some(&root.id)))
        .unwrap();
    let leaf = store
        .create_organisation(&new_org("Leaf", Some(&mid.id)))
        .unwrap();

    let before = store.get_organisation(&root.id).unwrap().unwrap();

    root.tree.parent_id = Some(leaf.id.clone());
    let err = store.update_organisation(&root).unwrap_err();
    assert!(matches!(err, Error::Cycle));

    root.tree.parent_id = Some(root.id.clone());
    let err = store.update_organisation(&root).unwrap_err();
    assert!(matches!(err, Error::Cycle));

    let after = store.get_organisation(&root.id).unwrap().unwrap();
    assert_eq!(after.tree.parent_id, before.tree.parent_id);
    assert_eq!(after.tree.depth, before.tree.depth);
    assert_eq!(after.tree.path, before.tree.path);
    assert_eq!(after.tree.lft, before.tree.lft);
    assert_eq!(after.tree.rgt, before.tree.rgt);
}

#[test]
fn missing_parent_rejected() {
    let (_dir, store) = test_store();

    let err = store
        .create_organisation(&new_org("Orphan", Some("no-such-id")))
        .unwrap_err();
    assert!(matches!(err, Error::ParentNotFound));
}

#[test]
fn attribute_cascade_delete() {
    let (_dir, store) = test_store();

    let category = store
        .create_attribute(&new_attr("Category A", "true", DataType::Boolean, None))
        .unwrap();
    assert_eq!(category.slug, "category-a");
    assert_eq!(category.value, "true");

    let tag = store
        .create_attribute(&new_attr("Tag 1", "", DataType::String, Some(&category.id)))
        .unwrap();
    assert_eq!(tag.slug, "tag-1");

    assert!(store.delete_attribute(&category.id).unwrap());

    assert!(store.get_attribute_by_slug("tag-1").unwrap().is_none());
    assert!(store.get_attribute(&tag.id).unwrap().is_none());
}

#[test]
fn application_cascade_delete_renumbers_survivors() {
    let (_dir, store) = test_store();

    let root = store.create_application(&new_app("Root", None)).unwrap();
    let _child = store
        .create_application(&new_app("Child", Some(&root.id)))
        .unwrap();
    let other = store.create_application(&new_app("Other", None)).unwrap();

    assert!(store.delete_application(&root.id).unwrap());

    let remaining = store
        .list_applications(&ListFilter {
            limit: -1,
            ..ListFilter::default()
        })
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, other.id);
    // intervals reassigned for the surviving forest
    assert_eq!((remaining[0].tree.lft, remaining[0].tree.rgt), (1, 2));
}

#[test]
fn delete_is_idempotent() {
    let (_dir, store) = test_store();

    let org = store.create_organisation(&new_org("Gone", None)).unwrap();
    assert!(store.delete_organisation(&org.id).unwrap());
    assert!(!store.delete_organisation(&org.id).unwrap());
    assert!(!store.delete_organisation("never-existed").unwrap());
}

#[test]
fn association_set_and_preorder_listing() {
    let (_dir, store) = test_store();

    let app = store.create_application(&new_app("Portal", None)).unwrap();
    let parent_attr = store
        .create_attribute(&new_attr("Category", "", DataType::String, None))
        .unwrap();
    let child_attr = store
        .create_attribute(&new_attr("Tag", "", DataType::String, Some(&parent_attr.id)))
        .unwrap();

    // reverse order plus a duplicate: stored set is deduplicated
    store
        .set_application_attributes(
            &app.id,
            &[
                child_attr.id.clone(),
                parent_attr.id.clone(),
                child_attr.id.clone(),
            ],
        )
        .unwrap();

    let listed = store.list_application_attributes(&app.id).unwrap();
    let names: Vec<&str> = listed.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, ["Category", "Tag"]);

    assert!(
        store
            .remove_application_attribute(&app.id, &child_attr.id)
            .unwrap()
    );
    assert!(
        !store
            .remove_application_attribute(&app.id, &child_attr.id)
            .unwrap()
    );
    assert_eq!(store.list_application_attributes(&app.id).unwrap().len(), 1);

    let unknown = store.set_application_attributes(&app.id, &["missing".to_string()]);
    assert!(matches!(unknown.unwrap_err(), Error::BadRequest(_)));

    let org = store.create_organisation(&new_org("Owner", None)).unwrap();
    store
        .add_application_organisation(&app.id, &org.id)
        .unwrap();
    // adding twice keeps a single pair
    store
        .add_application_organisation(&app.id, &org.id)
        .unwrap();
    assert_eq!(
        store.list_application_organisations(&app.id).unwrap().len(),
        1
    );
}

#[test]
fn association_rows_removed_with_member() {
    let (_dir, store) = test_store();

    let app = store.create_application(&new_app("Portal", None)).unwrap();
    let attr = store
        .create_attribute(&new_attr("Tier", "gold", DataType::String, None))
        .unwrap();
    store
        .set_application_attributes(&app.id, &[attr.id.clone()])
        .unwrap();

    assert!(store.delete_attribute(&attr.id).unwrap());
    assert!(store.list_application_attributes(&app.id).unwrap().is_empty());
}

#[test]
fn list_filters() {
    let (_dir, store) = test_store();

    let root = store.create_organisation(&new_org("Holding", None)).unwrap();
    let mut inactive = new_org("Dormant Subsidiary", Some(&root.id));
    inactive.is_active = false;
    store.create_organisation(&inactive).unwrap();
    let mut coded = new_org("Coded", Some(&root.id));
    coded.code = Some("XY-7".to_string());
    store.create_organisation(&coded).unwrap();

    let active_only = store
        .list_organisations(&ListFilter {
            limit: -1,
            is_active: Some(true),
            ..ListFilter::default()
        })
        .unwrap();
    assert!(active_only.iter().all(|o| o.is_active));
    assert_eq!(active_only.len(), 2);

    let children_of_root = store
        .list_organisations(&ListFilter {
            limit: -1,
            parent_id: Some(root.id.clone()),
            ..ListFilter::default()
        })
        .unwrap();
    assert_eq!(children_of_root.len(), 2);

    let by_code = store
        .list_organisations(&ListFilter {
            limit: -1,
            search: Some("XY-7".to_string()),
            ..ListFilter::default()
        })
        .unwrap();
    assert_eq!(by_code.len(), 1);
    assert_eq!(by_code[0].name, "Coded");

    let by_name = store
        .list_organisations(&ListFilter {
            limit: -1,
            search: Some("dormant".to_string()),
            ..ListFilter::default()
        })
        .unwrap();
    assert_eq!(by_name.len(), 1);
}

#[test]
fn keyset_pagination_walks_preorder() {
    let (_dir, store) = test_store();

    let root = store.create_organisation(&new_org("Root", None)).unwrap();
    for name in ["A", "B", "C", "D"] {
        store
            .create_organisation(&new_org(name, Some(&root.id)))
            .unwrap();
    }

    let mut seen = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = store
            .list_organisations(&ListFilter {
                limit: 2,
                cursor: cursor.clone(),
                ..ListFilter::default()
            })
            .unwrap();
        if page.is_empty() {
            break;
        }
        cursor = Some(page.last().unwrap().id.clone());
        seen.extend(page.into_iter().map(|o| o.name));
    }

    assert_eq!(seen, ["Root", "A", "B", "C", "D"]);
}

#[test]
fn sorted_listing_descending() {
    let (_dir, store) = test_store();

    for name in ["Beta", "Alpha", "Gamma"] {
        store.create_organisation(&new_org(name, None)).unwrap();
    }

    let listed = store
        .list_organisations(&ListFilter {
            limit: -1,
            sort: Sort::parse("-name").unwrap(),
            ..ListFilter::default()
        })
        .unwrap();
    let names: Vec<&str> = listed.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, ["Gamma", "Beta", "Alpha"]);
}

#[test]
fn update_refreshes_updated_at() {
    let (_dir, store) = test_store();

    let mut app = store.create_application(&new_app("Portal", None)).unwrap();
    let created_at = app.created_at;

    std::thread::sleep(std::time::Duration::from_millis(5));
    app.description = Some("Customer portal".to_string());
    app.properties = json!({"owner": "platform"});
    let updated = store.update_application(&app).unwrap();

    assert_eq!(updated.created_at, created_at);
    assert!(updated.updated_at > created_at);
    assert_eq!(updated.properties, json!({"owner": "platform"}));
}
