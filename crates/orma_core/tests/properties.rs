//! Property tests for flush behavior.

use orma_core::Entity;
use orma_model::TypeName;
use orma_store::StoreOp;
use orma_testkit::prelude::*;
use proptest::prelude::*;

proptest! {
    #[test]
    fn committing_n_members_persists_n_distinct_rows(
        usernames in prop::collection::vec("[a-z]{1,8}", 1..8)
    ) {
        let ctx = TestContext::new();
        let mut uow = ctx.factory.begin();

        let members: Vec<Entity> = usernames.iter().map(|u| new_member(u)).collect();
        for m in &members {
            uow.attach_new(m).unwrap();
        }
        uow.commit().unwrap();

        let guard = ctx.store.lock();
        prop_assert_eq!(guard.row_count(&TypeName::new("Member")), members.len());

        let mut keys: Vec<_> = members.iter().map(|m| m.key().unwrap()).collect();
        keys.sort();
        keys.dedup();
        prop_assert_eq!(keys.len(), members.len());
    }

    #[test]
    fn updates_name_exactly_the_fields_whose_values_changed(
        age in any::<i64>(),
        rename in any::<bool>()
    ) {
        let ctx = TestContext::new();
        let mut uow = ctx.factory.begin();

        let m = new_member("A");
        m.set("age", 10).unwrap();
        uow.attach_new(&m).unwrap();
        uow.flush().unwrap();
        ctx.store.lock().clear_journal();

        let mut expected: Vec<&str> = Vec::new();
        if rename {
            m.set("username", "B").unwrap();
            expected.push("username");
        }
        m.set("age", age).unwrap();
        if age != 10 {
            expected.push("age");
        }
        expected.sort_unstable();

        uow.flush().unwrap();
        let guard = ctx.store.lock();
        if expected.is_empty() {
            prop_assert!(guard.journal().is_empty());
        } else {
            prop_assert_eq!(guard.journal().len(), 1);
            match &guard.journal()[0] {
                StoreOp::Update { changed, .. } => {
                    let names: Vec<&str> = changed.field_names().collect();
                    prop_assert_eq!(names, expected);
                }
                other => prop_assert!(false, "expected update, got {}", other),
            }
        }
    }
}
