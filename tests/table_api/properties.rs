//! Property tests for the record API.

use crate::common::*;
use proptest::prelude::*;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn add_then_get_round_trips(name in "[a-z]{0,12}", size in any::<i64>()) {
        let rt = runtime();
        let (created, fetched) = rt.block_on(async {
            let (db, _) = open_db(&["items"]);
            let items = db.table("items").unwrap();
            let created = items
                .add(attrs(json!({"name": name, "size": size})))
                .await
                .unwrap();
            let fetched = items.get(&created.id).await.unwrap();
            (created, fetched)
        });
        prop_assert_eq!(fetched.revision, 1);
        prop_assert_eq!(&fetched, &created);
        let expected_name = json!(name);
        prop_assert_eq!(fetched.get("name"), Some(&expected_name));
    }

    #[test]
    fn revision_counts_successful_updates(
        attempts in proptest::collection::vec(any::<bool>(), 1..12)
    ) {
        // true: update with the current revision, false: with a stale one
        let rt = runtime();
        let expected = 1 + attempts.iter().filter(|fresh| **fresh).count() as u64;
        let revision = rt.block_on(async {
            let (db, _) = open_db(&["items"]);
            let items = db.table("items").unwrap();
            let mut record = items.add(Attributes::new()).await.unwrap();
            for (i, fresh) in attempts.iter().enumerate() {
                let base = if *fresh { record.revision } else { record.revision + 1 };
                match items.update(&record.id, base, attrs(json!({"step": i}))).await {
                    Ok(next) => record = next,
                    Err(err) => assert!(err.is_conflict()),
                }
            }
            items.get(&record.id).await.unwrap().revision
        });
        prop_assert_eq!(revision, expected);
    }
}
