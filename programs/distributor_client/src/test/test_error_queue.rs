#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use crate::error_queue::ErrorQueue;
    use crate::state::{ErrorReport, ErrorSource};

    fn report(message: &str) -> ErrorReport {
        ErrorReport::new(ErrorSource::Allowance, message)
    }

    #[test]
    fn test_empty_and_absent_lists_are_noops() {
        let queue = ErrorQueue::new();
        let updates = queue.subscribe();

        assert!(queue.add_errors(None::<Vec<ErrorReport>>).is_empty());
        assert!(queue.add_errors(Some(Vec::<ErrorReport>::new())).is_empty());
        assert!(queue.add_errors(Some(vec![None::<ErrorReport>, None])).is_empty());

        assert!(queue.is_empty());
        assert!(!updates.has_changed().unwrap());
    }

    #[test]
    fn test_newest_first_and_null_entries_skipped() {
        let queue = ErrorQueue::new();
        let first = queue.add_error(report("first"));
        let keys = queue.add_errors(Some(vec![Some(report("second")), None, Some(report("third"))]));

        assert_eq!(keys.len(), 2);
        assert!(keys.iter().all(|key| *key > first));
        let messages: Vec<_> = queue.errors().into_iter().map(|record| record.message).collect();
        assert_eq!(messages, vec!["third", "second", "first"]);
    }

    #[test]
    fn test_remove_error() {
        let queue = ErrorQueue::new();
        let a = queue.add_error(report("a"));
        let b = queue.add_error(report("b"));

        assert!(queue.remove_error(a));
        assert!(!queue.remove_error(a));
        assert!(!queue.remove_error(999));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.errors()[0].key, b);
    }

    #[test]
    fn test_keys_never_reused() {
        let queue = ErrorQueue::new();
        let a = queue.add_error(report("a"));
        queue.remove_error(a);
        queue.clear();
        let b = queue.add_error(report("b"));
        assert!(b > a);
    }

    #[test]
    fn test_clones_share_one_queue() {
        let queue = ErrorQueue::new();
        let handle = queue.clone();
        handle.add_error(ErrorReport::new(ErrorSource::Shard(2), "HTTP 500"));

        let records = queue.errors();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].source, ErrorSource::Shard(2));
        assert_eq!(records[0].source.to_string(), "shard 2");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_lose_nothing() {
        let queue = ErrorQueue::new();
        let tasks: Vec<_> = (0..64)
            .map(|i| {
                let queue = queue.clone();
                tokio::spawn(async move {
                    if i % 2 == 0 {
                        vec![queue.add_error(report(&format!("single {i}")))]
                    } else {
                        queue.add_errors(Some(vec![
                            report(&format!("batch {i}a")),
                            report(&format!("batch {i}b")),
                        ]))
                    }
                })
            })
            .collect();

        let mut keys = HashSet::new();
        for task in futures::future::join_all(tasks).await {
            keys.extend(task.unwrap());
        }

        assert_eq!(keys.len(), 96);
        assert_eq!(queue.len(), 96);
        let ordered: Vec<u64> = queue.errors().iter().map(|record| record.key).collect();
        assert!(ordered.windows(2).all(|pair| pair[0] > pair[1]));
    }
}
