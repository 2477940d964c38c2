//! End-to-end scope scenarios over the in-memory store.

use orma_core::Entity;
use orma_model::{EntityType, Key, TypeName, Value};
use orma_store::StoreOp;
use orma_testkit::prelude::*;
use std::sync::Arc;

#[test]
fn nothing_reaches_the_store_before_flush() {
    init_tracing();
    let ctx = TestContext::new();
    let mut uow = ctx.factory.begin();

    let member = new_member("A");
    uow.attach_new(&member).unwrap();
    assert!(ctx.store.lock().journal().is_empty());

    uow.commit().unwrap();
    let guard = ctx.store.lock();
    assert_eq!(guard.journal().len(), 1);
    assert!(guard.journal()[0].is_insert());
}

#[test]
fn store_assigned_key_is_populated_at_commit() {
    let ctx = TestContext::new();
    let mut uow = ctx.factory.begin();

    let member = new_member("A");
    assert!(member.key().is_none());
    uow.attach_new(&member).unwrap();
    uow.commit().unwrap();

    let key = member.key().expect("commit populates the key");
    assert!(ctx.store.lock().get(&TypeName::new("Member"), &key).is_some());
}

#[test]
fn mutation_after_flush_updates_exactly_one_field() {
    let ctx = TestContext::new();
    let mut uow = ctx.factory.begin();

    let item = Entity::new(item_type());
    item.set_key(150).unwrap();
    item.set("name", "A").unwrap();
    item.set("created_by", "admin").unwrap();
    uow.attach_new(&item).unwrap();
    uow.flush().unwrap();
    ctx.store.lock().clear_journal();

    item.set("name", "ZZZZ").unwrap();
    uow.flush().unwrap();

    let guard = ctx.store.lock();
    assert_eq!(guard.journal().len(), 1);
    match &guard.journal()[0] {
        StoreOp::Update { key, changed, .. } => {
            assert_eq!(key, &Key::Int(150));
            let names: Vec<&str> = changed.field_names().collect();
            assert_eq!(names, vec!["name"]);
        }
        other => panic!("expected update, got {other}"),
    }
}

#[test]
fn repeated_lookups_share_one_instance() {
    let ctx = TestContext::new();
    let mut uow = ctx.factory.begin();

    let member = new_member("A");
    uow.attach_new(&member).unwrap();
    uow.flush().unwrap();
    let key = member.key().unwrap();

    let first = uow.find("Member", key.clone()).unwrap();
    let second = uow.find("Member", key).unwrap();
    assert!(Entity::same_instance(&first, &member));
    assert!(Entity::same_instance(&first, &second));
}

#[test]
fn clean_scope_flushes_nothing() {
    let ctx = TestContext::new();
    let mut uow = ctx.factory.begin();

    let member = new_member("A");
    uow.attach_new(&member).unwrap();
    assert!(uow.flush().unwrap() > 0);
    ctx.store.lock().clear_journal();

    assert_eq!(uow.flush().unwrap(), 0);
    assert!(ctx.store.lock().journal().is_empty());
}

#[test]
fn rollback_discards_everything() {
    let ctx = TestContext::new();
    let mut uow = ctx.factory.begin();

    let member = new_member("A");
    let team = new_team("alpha");
    uow.attach_new(&member).unwrap();
    uow.attach_new(&team).unwrap();
    uow.rollback().unwrap();

    let guard = ctx.store.lock();
    assert!(guard.journal().is_empty());
    assert_eq!(guard.row_count(&TypeName::new("Member")), 0);
    assert_eq!(guard.row_count(&TypeName::new("Team")), 0);
}

#[test]
fn insert_of_referencing_row_runs_after_its_target() {
    // the member's team gets its key from the store, so the team insert
    // must execute first even though the member was attached first
    let ctx = TestContext::new();
    let mut uow = ctx.factory.begin();

    let team_ty = Arc::new(
        EntityType::builder("Team")
            .store_assigned_key()
            .scalar("name")
            .build(),
    );
    let team = Entity::new(team_ty);
    team.set("name", "alpha").unwrap();

    let member = new_member("A");
    member.set_reference("team", Some(&team)).unwrap();

    uow.attach_new(&member).unwrap();
    uow.attach_new(&team).unwrap();
    uow.commit().unwrap();

    let guard = ctx.store.lock();
    assert_eq!(guard.journal()[0].type_name(), &TypeName::new("Team"));
    assert_eq!(guard.journal()[1].type_name(), &TypeName::new("Member"));

    let team_key = team.key().unwrap();
    let member_row = guard
        .get(&TypeName::new("Member"), &member.key().unwrap())
        .unwrap();
    assert_eq!(member_row.get("team"), Some(&Value::Key(team_key)));
}

#[test]
fn embedded_replacement_counts_as_dirty() {
    let ctx = TestContext::new();
    let mut uow = ctx.factory.begin();

    let member = new_member("A");
    member
        .set(
            "address",
            Value::embedded(vec![("city".into(), Value::text("seoul"))]),
        )
        .unwrap();
    uow.attach_new(&member).unwrap();
    uow.flush().unwrap();
    ctx.store.lock().clear_journal();

    member
        .set(
            "address",
            Value::embedded(vec![("city".into(), Value::text("busan"))]),
        )
        .unwrap();
    uow.flush().unwrap();

    let guard = ctx.store.lock();
    match &guard.journal()[0] {
        StoreOp::Update { changed, .. } => {
            let names: Vec<&str> = changed.field_names().collect();
            assert_eq!(names, vec!["address"]);
        }
        other => panic!("expected update, got {other}"),
    }
}

#[test]
fn list_membership_update_runs_after_the_new_targets_insert() {
    let ctx = TestContext::new();
    let mut uow = ctx.factory.begin();

    let group_ty = Arc::new(
        EntityType::builder("Group")
            .assigned_key()
            .scalar("name")
            .reference_list("members", "Member")
            .build(),
    );
    let group = Entity::new(group_ty);
    group.set_key(7).unwrap();
    group.set("name", "g").unwrap();
    uow.attach_new(&group).unwrap();
    uow.flush().unwrap();
    ctx.store.lock().clear_journal();

    // the pushed member is store-assigned and not persisted yet, so its
    // insert must execute before the update that embeds its key
    let member = new_member("A");
    group.push_reference("members", &member).unwrap();
    uow.attach_new(&member).unwrap();
    uow.flush().unwrap();

    let guard = ctx.store.lock();
    assert_eq!(guard.journal().len(), 2);
    assert_eq!(guard.journal()[0].type_name(), &TypeName::new("Member"));
    assert!(guard.journal()[0].is_insert());
    match &guard.journal()[1] {
        StoreOp::Update {
            type_name, changed, ..
        } => {
            assert_eq!(type_name, &TypeName::new("Group"));
            let names: Vec<&str> = changed.field_names().collect();
            assert_eq!(names, vec!["members"]);
            assert_eq!(
                changed.get("members"),
                Some(&Value::Array(vec![Value::Key(member.key().unwrap())]))
            );
        }
        other => panic!("expected update, got {other}"),
    }
}

#[test]
fn transient_fields_never_reach_the_store() {
    let ctx = TestContext::new();
    let mut uow = ctx.factory.begin();

    let member = new_member("A");
    member.set("temp", 42).unwrap();
    uow.attach_new(&member).unwrap();
    uow.flush().unwrap();

    {
        let guard = ctx.store.lock();
        let row = guard
            .get(&TypeName::new("Member"), &member.key().unwrap())
            .unwrap();
        assert!(!row.contains("temp"));
    }

    // a transient mutation is not dirty either
    member.set("temp", 43).unwrap();
    assert_eq!(uow.flush().unwrap(), 0);
}

#[test]
fn removal_deletes_the_row() {
    let ctx = TestContext::new();
    let mut uow = ctx.factory.begin();

    let item = Entity::new(item_type());
    item.set_key(2).unwrap();
    uow.attach_new(&item).unwrap();
    uow.flush().unwrap();
    ctx.store.lock().clear_journal();

    uow.mark_removed(&item).unwrap();
    uow.commit().unwrap();

    let guard = ctx.store.lock();
    assert!(matches!(guard.journal()[0], StoreOp::Delete { .. }));
    assert_eq!(guard.row_count(&TypeName::new("Item")), 0);
}

#[test]
fn allocated_team_keys_come_from_the_sequence() {
    let ctx = TestContext::new();
    let mut uow = ctx.factory.begin();

    let a = new_team("alpha");
    let b = new_team("beta");
    uow.attach_new(&a).unwrap();
    uow.attach_new(&b).unwrap();
    uow.commit().unwrap();

    assert_eq!(a.key(), Some(Key::Int(1)));
    assert_eq!(b.key(), Some(Key::Int(2)));
    // one block reservation covered both inserts
    assert_eq!(ctx.allocator.lock().peek(&TypeName::new("Team")), 11);
}

#[test]
fn inverse_side_is_recomputed_from_tracked_state() {
    let ctx = TestContext::new();
    let mut uow = ctx.factory.begin();

    let team = new_team("alpha");
    let m1 = new_member("A");
    let m2 = new_member("B");
    m1.set_reference("team", Some(&team)).unwrap();
    m2.set_reference("team", Some(&team)).unwrap();

    uow.attach_new(&team).unwrap();
    uow.attach_new(&m1).unwrap();
    uow.attach_new(&m2).unwrap();

    let members = uow
        .referencing(&team, &TypeName::new("Member"), "team")
        .unwrap();
    assert_eq!(members.len(), 2);

    m2.set_reference("team", None).unwrap();
    let members = uow
        .referencing(&team, &TypeName::new("Member"), "team")
        .unwrap();
    assert_eq!(members.len(), 1);
    assert!(Entity::same_instance(&members[0], &m1));
}

#[test]
fn transaction_helper_persists_on_success() {
    let ctx = TestContext::new();

    let key = ctx
        .factory
        .transaction(|uow| {
            let member = new_member("A");
            uow.attach_new(&member)?;
            uow.flush()?;
            Ok(member.key().unwrap())
        })
        .unwrap();

    assert!(ctx.store.lock().get(&TypeName::new("Member"), &key).is_some());
}
