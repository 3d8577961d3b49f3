#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::broadcast;

    use crate::eligibility::{find_eligibility, verify_allocation, EligibilityResolver, ShardSet};
    use crate::error::DistributorClientError;
    use crate::error_queue::ErrorQueue;
    use crate::event::ClientEvent;
    use crate::state::{AllocationRecord, AllocationShard, Eligibility, ErrorSource, RawAmount};
    use crate::test::test_merkle::{fixture_nodes, shard_with_proofs};
    use crate::test::{addr, MockShardSource};

    fn record(index: u64, amount: u128) -> AllocationRecord {
        AllocationRecord {
            index,
            amount: RawAmount::new(amount),
            proof: Vec::new(),
        }
    }

    fn resolver(
        source: Arc<MockShardSource>,
        shard_count: u32,
    ) -> (EligibilityResolver, ErrorQueue, broadcast::Receiver<ClientEvent>) {
        let errors = ErrorQueue::new();
        let (events, receiver) = broadcast::channel(16);
        let resolver = EligibilityResolver::new(source, 0..shard_count, errors.clone(), events);
        (resolver, errors, receiver)
    }

    #[test]
    fn test_find_eligibility_case_insensitive() {
        let shard0 = AllocationShard::from_json(
            0,
            br#"{"claims": {"0xabc": {"index": 3, "amount": "500", "proof": []}}}"#,
        )
        .unwrap();
        let shard1 = AllocationShard::from_json(1, br#"{}"#).unwrap();
        let set = ShardSet::from_shards([shard0, shard1]);

        let eligibility = find_eligibility(&set, &addr("0xABC"));
        assert_eq!(eligibility, Eligibility::Eligible { shard_id: 0, index: 3 });
        assert_eq!(eligibility.as_pair(), (Some(0), Some(3)));
    }

    #[test]
    fn test_not_eligible_is_null_pair() {
        let set = ShardSet::from_shards([AllocationShard::with_claims(0, [(addr("0xabc"), record(3, 500))])]);
        let eligibility = find_eligibility(&set, &addr("0xdef"));
        assert_eq!(eligibility, Eligibility::NotEligible);
        assert_eq!(eligibility.as_pair(), (None, None));
        assert!(!eligibility.is_eligible());
    }

    #[test]
    fn test_duplicate_listing_resolves_to_lowest_shard() {
        // Inserted out of order on purpose.
        let set = ShardSet::from_shards([
            AllocationShard::with_claims(2, [(addr("0xabc"), record(1, 10))]),
            AllocationShard::with_claims(1, [(addr("0xABC"), record(8, 20))]),
            AllocationShard::with_claims(0, [(addr("0xother"), record(0, 30))]),
        ]);
        for _ in 0..10 {
            assert_eq!(
                find_eligibility(&set, &addr("0xabc")),
                Eligibility::Eligible { shard_id: 1, index: 8 }
            );
        }
    }

    #[tokio::test]
    async fn test_partial_shard_failure() {
        let source = MockShardSource::with_shards([
            AllocationShard::with_claims(0, [(addr("0xaaa"), record(0, 1))]),
            AllocationShard::with_claims(2, [(addr("0xccc"), record(5, 3))]),
        ]);
        let (resolver, errors, mut events) = resolver(Arc::clone(&source), 3);

        assert_eq!(
            resolver.find_eligibility(&addr("0xccc")).await,
            Eligibility::Eligible { shard_id: 2, index: 5 }
        );
        assert_eq!(resolver.find_eligibility(&addr("0xbbb")).await, Eligibility::NotEligible);

        let set = resolver.cached().unwrap();
        assert_eq!(set.len(), 2);
        assert!(!set.is_complete());
        assert!(matches!(
            set.failures().get(&1),
            Some(DistributorClientError::ShardUnavailable { shard_id: 1, .. })
        ));

        let records = errors.errors();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].source, ErrorSource::Shard(1));
        assert!(matches!(
            events.recv().await.unwrap(),
            ClientEvent::ShardUnavailable { shard_id: 1, .. }
        ));
    }

    #[tokio::test]
    async fn test_shards_fetched_once_per_session() {
        let source = MockShardSource::with_shards([
            AllocationShard::with_claims(0, [(addr("0xaaa"), record(0, 1))]),
            AllocationShard::with_claims(1, [(addr("0xbbb"), record(0, 2))]),
        ]);
        let (resolver, _errors, _events) = resolver(Arc::clone(&source), 2);

        let (a, b) = tokio::join!(resolver.load_shards(), resolver.load_shards());
        assert!(Arc::ptr_eq(&a, &b));
        resolver.find_eligibility(&addr("0xbbb")).await;
        assert_eq!(source.fetch_count(), 2);

        resolver.reset();
        assert!(resolver.cached().is_none());
        resolver.load_shards().await;
        assert_eq!(source.fetch_count(), 4);
    }

    #[tokio::test]
    async fn test_reset_during_load_reloads() {
        let source = MockShardSource::with_shards([
            AllocationShard::with_claims(0, [(addr("0xaaa"), record(0, 1))]),
            AllocationShard::with_claims(1, [(addr("0xbbb"), record(0, 2))]),
        ]);
        source.hold_fetches();
        let (resolver, _errors, _events) = resolver(Arc::clone(&source), 2);

        let interrupt = async {
            source.wait_for_fetches(2).await;
            resolver.reset();
            source.publish(AllocationShard::with_claims(1, [(addr("0xccc"), record(4, 9))]));
            source.release_fetches();
        };
        let (set, ()) = tokio::join!(resolver.load_shards(), interrupt);

        // The load that straddled the reset is discarded and redone.
        assert_eq!(source.fetch_count(), 4);
        assert!(Arc::ptr_eq(&set, &resolver.cached().unwrap()));
        assert_eq!(
            find_eligibility(&set, &addr("0xccc")),
            Eligibility::Eligible { shard_id: 1, index: 4 }
        );
        assert_eq!(find_eligibility(&set, &addr("0xbbb")), Eligibility::NotEligible);
    }

    #[tokio::test]
    async fn test_allocation_carries_proof_material() {
        let nodes = fixture_nodes();
        let source = MockShardSource::with_shards([shard_with_proofs(0, &nodes)]);
        let (resolver, _errors, _events) = resolver(source, 1);

        let account = nodes[3].account.clone();
        let (shard, found) = resolver.allocation(&account).await.unwrap();
        assert_eq!(found.index, 3);
        assert_eq!(found.amount, RawAmount::new(4000));
        assert!(!found.proof.is_empty());
        assert!(verify_allocation(&shard, &account, &found).is_ok());

        let forged = AllocationRecord {
            amount: RawAmount::new(4001),
            ..found
        };
        assert_eq!(
            verify_allocation(&shard, &account, &forged),
            Err(DistributorClientError::InvalidProof)
        );
        assert!(resolver.allocation(&addr("0xnobody")).await.is_none());
    }
}
