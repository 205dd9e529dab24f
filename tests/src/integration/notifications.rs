//! # Notification Fan-out Flows
//!
//! Covers ordering, profile filters, listener isolation and the
//! `SCAN_RESULT` channel split, driven through the client intake.

#[cfg(test)]
mod tests {
    use crate::harness::{notification, Harness};
    use dw_bus::{DeliverySource, EventFilter};
    use dw_client::Routed;
    use dw_types::{
        ClientError, InboundEvent, ListenerError, NotificationCategory, NotificationPayload,
        Operation, RegisterForNotificationOptions,
    };
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    type Seen = Arc<Mutex<Vec<InboundEvent>>>;

    fn recorder(
        h: &Harness,
        filter: EventFilter,
    ) -> (Seen, dw_bus::SubscriptionHandle) {
        let seen: Seen = Arc::default();
        let sink = seen.clone();
        let handle = h
            .client
            .subscribe(
                filter,
                Arc::new(move |event: &InboundEvent| -> Result<(), ListenerError> {
                    sink.lock().push(event.clone());
                    Ok(())
                }),
            )
            .unwrap();
        (seen, handle)
    }

    fn profile_switch(index: usize) -> serde_json::Value {
        json!({
            "kind": "notification",
            "notificationType": "PROFILE_SWITCH",
            "profileName": format!("Profile{index}"),
            "timestamp": index,
        })
    }

    // =============================================================================
    // PROFILE FILTER
    // =============================================================================

    #[tokio::test]
    async fn test_profile_filter_delivers_exactly_once() {
        let h = Harness::at_version(8, 0, 0);
        let (seen, _) = recorder(
            &h,
            EventFilter::for_profile(NotificationCategory::ProfileSwitch, "Profile1"),
        );

        h.client
            .deliver(notification("PROFILE_SWITCH", Some("Profile2")));
        assert!(seen.lock().is_empty());

        let routed = h
            .client
            .deliver(notification("PROFILE_SWITCH", Some("Profile1")));
        assert_eq!(
            routed,
            Routed::Notification {
                category: NotificationCategory::ProfileSwitch,
                delivered: 1
            }
        );

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].profile_name(), Some("Profile1"));
    }

    #[tokio::test]
    async fn test_category_filter_ignores_other_categories() {
        let h = Harness::at_version(8, 0, 0);
        let (seen, _) = recorder(&h, EventFilter::category(NotificationCategory::ScannerStatus));

        h.client
            .deliver(notification("CONFIGURATION_UPDATE", Some("Profile0")));
        h.client.deliver(json!({
            "kind": "notification",
            "notificationType": "SCANNER_STATUS",
            "status": "WAITING"
        }));

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].status().as_deref(), Some("WAITING"));
    }

    // =============================================================================
    // ORDERING
    // =============================================================================

    #[tokio::test]
    async fn test_per_category_order_preserved_for_every_listener() {
        let h = Harness::at_version(8, 0, 0);
        let (first, _) = recorder(&h, EventFilter::category(NotificationCategory::ProfileSwitch));
        let (second, _) = recorder(&h, EventFilter::category(NotificationCategory::ProfileSwitch));

        for i in 0..100 {
            h.client.deliver(profile_switch(i));
            // Interleave another category; it must not disturb ordering.
            h.client
                .deliver(notification("WORKFLOW_STATUS", None));
        }

        for seen in [first, second] {
            let timestamps: Vec<u64> = seen.lock().iter().map(|e| e.timestamp).collect();
            assert_eq!(timestamps, (0..100).collect::<Vec<u64>>());
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_intake_keeps_listeners_consistent() {
        let h = Harness::at_version(8, 0, 0);
        let (first, _) = recorder(&h, EventFilter::category(NotificationCategory::ProfileSwitch));
        let (second, _) = recorder(&h, EventFilter::category(NotificationCategory::ProfileSwitch));

        let producers: Vec<_> = (0..4)
            .map(|p| {
                let intake = h.client.intake();
                tokio::spawn(async move {
                    for i in 0..50 {
                        intake.deliver(profile_switch(p * 50 + i));
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.await.unwrap();
        }

        // Dispatch is serialized, so both listeners observe the same order.
        let a: Vec<u64> = first.lock().iter().map(|e| e.timestamp).collect();
        let b: Vec<u64> = second.lock().iter().map(|e| e.timestamp).collect();
        assert_eq!(a.len(), 200);
        assert_eq!(a, b);
    }

    // =============================================================================
    // ISOLATION
    // =============================================================================

    #[tokio::test]
    async fn test_failing_listeners_do_not_affect_others() {
        let h = Harness::at_version(8, 0, 0);
        let filter = EventFilter::category(NotificationCategory::ConfigurationUpdate);

        let failing = h
            .client
            .subscribe(
                filter.clone(),
                Arc::new(|_: &InboundEvent| -> Result<(), ListenerError> {
                    Err(ListenerError::failed("database locked"))
                }),
            )
            .unwrap();
        let panicking = h
            .client
            .subscribe(
                filter.clone(),
                Arc::new(|_: &InboundEvent| -> Result<(), ListenerError> {
                    panic!("listener bug");
                }),
            )
            .unwrap();
        let (seen, _) = recorder(&h, filter);

        for _ in 0..3 {
            h.client
                .deliver(notification("CONFIGURATION_UPDATE", Some("Profile0")));
        }

        assert_eq!(seen.lock().len(), 3);
        let failures = h.sink.failures();
        assert_eq!(failures.len(), 6);
        assert!(failures.iter().any(|(handle, source, error)| {
            *handle == failing
                && *source == DeliverySource::Notification(NotificationCategory::ConfigurationUpdate)
                && matches!(error, ListenerError::Failed(_))
        }));
        assert!(failures
            .iter()
            .any(|(handle, _, error)| *handle == panicking
                && matches!(error, ListenerError::Panicked(_))));
        assert_eq!(h.client.registry_stats().listener_failures(), 6);
    }

    // =============================================================================
    // SUBSCRIPTION MANAGEMENT
    // =============================================================================

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let h = Harness::at_version(8, 0, 0);
        let (seen, handle) =
            recorder(&h, EventFilter::category(NotificationCategory::WorkflowStatus));

        h.client.deliver(notification("WORKFLOW_STATUS", None));
        assert!(h.client.unsubscribe(handle));
        assert!(!h.client.unsubscribe(handle));
        h.client.deliver(notification("WORKFLOW_STATUS", None));

        assert_eq!(seen.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_event_stream_subscription() {
        let h = Harness::at_version(8, 0, 0);
        let mut stream = h
            .client
            .notifications(EventFilter::category(NotificationCategory::ProfileSwitch))
            .unwrap();

        h.client.deliver(profile_switch(7));

        let event = tokio::time::timeout(Duration::from_secs(1), stream.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            event.payload,
            NotificationPayload::ProfileSwitch { ref profile_name, .. }
                if profile_name.as_deref() == Some("Profile7")
        ));
    }

    #[tokio::test]
    async fn test_scan_result_category_is_wrong_channel() {
        let h = Harness::at_version(8, 0, 0);

        let err = h
            .client
            .subscribe(
                EventFilter::category(NotificationCategory::ScanResult),
                Arc::new(|_: &InboundEvent| -> Result<(), ListenerError> { Ok(()) }),
            )
            .unwrap_err();
        assert_eq!(
            err,
            ClientError::WrongChannel {
                category: NotificationCategory::ScanResult
            }
        );
    }

    #[tokio::test]
    async fn test_register_for_notification_is_sent() {
        let h = Harness::at_version(8, 0, 0);
        h.client
            .register_for_notification(
                &RegisterForNotificationOptions::new(NotificationCategory::ProfileSwitch)
                    .with_profile("Profile1"),
            )
            .await
            .unwrap();

        let sent = h.transport.last().unwrap();
        assert_eq!(sent.operation, Operation::RegisterForNotification);
        assert_eq!(
            sent.payload,
            json!({"notificationType": "PROFILE_SWITCH", "profileName": "Profile1"})
        );
    }

    #[tokio::test]
    async fn test_undecodable_notification_dropped() {
        let h = Harness::at_version(8, 0, 0);
        let (seen, _) = recorder(&h, EventFilter::category(NotificationCategory::ProfileSwitch));

        assert_eq!(
            h.client.deliver(json!({"kind": "notification", "notificationType": "BATTERY_LOW"})),
            Routed::Rejected
        );
        assert!(seen.lock().is_empty());
        assert_eq!(h.client.intake_stats().rejected(), 1);
    }
}
