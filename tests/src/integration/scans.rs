//! # Scan and Soft-Trigger Flows
//!
//! Scan intake gating, queued fan-out to scan listeners, and the single
//! in-flight soft trigger resolved by its echoed token.

#[cfg(test)]
mod tests {
    use crate::harness::{scan, Harness};
    use dw_client::{ClientConfig, InvokeOptions, Routed};
    use dw_types::{
        CapabilitySnapshot, ClientError, ListenerError, Operation, ScanResult, ServiceVersion,
    };
    use serde_json::Value;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    async fn next_scan(rx: &mut mpsc::UnboundedReceiver<ScanResult>) -> ScanResult {
        timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("scan not delivered in time")
            .expect("listener channel closed")
    }

    // =============================================================================
    // SOFT TRIGGERS
    // =============================================================================

    #[tokio::test]
    async fn test_overlapping_soft_scan_triggers() {
        let h = Harness::at_version(6, 5, 0);

        let client = h.client.clone();
        let mut first = tokio::spawn(async move { client.soft_scan_trigger().await });
        assert!(h.transport.wait_for_sends(1).await);

        // Second trigger is rejected without being sent.
        assert_eq!(
            h.client.soft_scan_trigger().await,
            Err(ClientError::TriggerAlreadyInFlight {
                operation: Operation::SoftScanTrigger
            })
        );
        assert_eq!(h.transport.sent_count(), 1);

        // A read carrying some other token leaves the first trigger waiting.
        h.client
            .deliver(scan("0000", Some(dw_types::TriggerToken::new())));
        assert!(timeout(Duration::from_millis(30), &mut first).await.is_err());

        let token = h.transport.last().unwrap().trigger_token().unwrap();
        h.client.deliver(scan("5012345678900", Some(token)));

        let result = first.await.unwrap().unwrap();
        assert_eq!(result.data, "5012345678900");
        assert_eq!(result.trigger_token, Some(token));
    }

    #[tokio::test]
    async fn test_trigger_slot_shared_between_scan_and_rfid() {
        let h = Harness::at_version(7, 0, 0);

        let client = h.client.clone();
        let rfid = tokio::spawn(async move { client.soft_rfid_trigger().await });
        assert!(h.transport.wait_for_sends(1).await);

        assert!(matches!(
            h.client.soft_scan_trigger().await,
            Err(ClientError::TriggerAlreadyInFlight { .. })
        ));

        let token = h.transport.last().unwrap().trigger_token().unwrap();
        let mut read = scan("E28011606000020D6F8A1B2C", Some(token));
        read["source"] = "rfid".into();
        h.client.deliver(read);

        let tag = rfid.await.unwrap().unwrap();
        assert_eq!(tag.source, "rfid");

        // Slot is free again.
        let client = h.client.clone();
        let again = tokio::spawn(async move { client.soft_scan_trigger().await });
        assert!(h.transport.wait_for_sends(2).await);
        again.abort();
    }

    #[tokio::test]
    async fn test_trigger_timeout_frees_slot() {
        let mut config = ClientConfig::default();
        config.dispatch.trigger_timeout = Some(Duration::from_millis(30));
        let h = Harness::build(
            config,
            Some(CapabilitySnapshot::from_version(ServiceVersion::new(6, 5, 0))),
        );

        assert!(matches!(
            h.client.soft_scan_trigger().await,
            Err(ClientError::RequestTimeout {
                operation: Operation::SoftScanTrigger,
                ..
            })
        ));

        // The next trigger is accepted and sent.
        let client = h.client.clone();
        let next = tokio::spawn(async move { client.soft_scan_trigger().await });
        assert!(h.transport.wait_for_sends(2).await);
        next.abort();
    }

    #[tokio::test]
    async fn test_trigger_via_generic_invoke() {
        let h = Harness::at_version(6, 5, 0);
        h.transport.respond_with(|command| match command.trigger_token() {
            Some(token) => vec![scan("ABC-123", Some(token))],
            None => Vec::new(),
        });

        let encoded = h
            .client
            .invoke(
                Operation::SoftScanTrigger,
                Value::Null,
                InvokeOptions::for_operation(Operation::SoftScanTrigger),
            )
            .await
            .unwrap();
        assert_eq!(encoded["data"], "ABC-123");
        assert_eq!(encoded["labelType"], "LABEL-TYPE-CODE128");
    }

    #[tokio::test]
    async fn test_soft_trigger_below_gate() {
        let h = Harness::at_version(6, 9, 0);
        assert!(matches!(
            h.client.soft_rfid_trigger().await,
            Err(ClientError::UnsupportedOperation { .. })
        ));
        assert_eq!(h.transport.sent_count(), 0);
    }

    // =============================================================================
    // SCAN INTAKE AND FAN-OUT
    // =============================================================================

    #[tokio::test]
    async fn test_scans_ignored_until_registered() {
        let h = Harness::at_version(8, 0, 0);
        assert_eq!(h.client.deliver(scan("1", None)), Routed::ScanIgnored);
        assert!(h.client.last_scan().is_none());

        h.client.register_scan_listener().await.unwrap();
        assert_eq!(
            h.transport.operations(),
            vec![Operation::RegisterScanListener]
        );
        assert!(matches!(
            h.client.deliver(scan("2", None)),
            Routed::Scan { .. }
        ));
        assert_eq!(h.client.last_scan().unwrap().data, "2");
    }

    #[tokio::test]
    async fn test_intake_enabled_at_start() {
        let mut config = ClientConfig::default();
        config.scan.intake_enabled_at_start = true;
        let h = Harness::build(config, None);

        assert!(matches!(
            h.client.deliver(scan("1", None)),
            Routed::Scan { .. }
        ));
    }

    #[tokio::test]
    async fn test_every_listener_receives_every_scan_in_order() {
        let h = Harness::at_version(8, 0, 0);
        h.client.register_scan_listener().await.unwrap();

        let mut receivers = Vec::new();
        for _ in 0..3 {
            let (tx, rx) = mpsc::unbounded_channel();
            h.client
                .on_result(Arc::new(move |scan: &ScanResult| -> Result<(), ListenerError> {
                    tx.send(scan.clone())
                        .map_err(|e| ListenerError::failed(e.to_string()))
                }))
                .unwrap();
            receivers.push(rx);
        }

        for i in 0..10 {
            h.client.deliver(scan(&format!("item-{i}"), None));
        }

        for rx in &mut receivers {
            for i in 0..10 {
                assert_eq!(next_scan(rx).await.data, format!("item-{i}"));
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failing_scan_listener_is_isolated() {
        let h = Harness::at_version(8, 0, 0);
        h.client.register_scan_listener().await.unwrap();

        h.client
            .on_result(Arc::new(|_: &ScanResult| -> Result<(), ListenerError> {
                Err(ListenerError::failed("printer offline"))
            }))
            .unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        h.client
            .on_result(Arc::new(move |scan: &ScanResult| -> Result<(), ListenerError> {
                tx.send(scan.clone())
                    .map_err(|e| ListenerError::failed(e.to_string()))
            }))
            .unwrap();

        h.client.deliver(scan("A", None));
        h.client.deliver(scan("B", None));

        assert_eq!(next_scan(&mut rx).await.data, "A");
        assert_eq!(next_scan(&mut rx).await.data, "B");

        // Failures are reported asynchronously by the listener's own task.
        let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
        while h.sink.failures().len() < 2 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(h.sink.failures().len(), 2);
    }

    #[tokio::test]
    async fn test_scan_stream_and_defaults() {
        let h = Harness::at_version(8, 0, 0);
        h.client.register_scan_listener().await.unwrap();
        let mut stream = h.client.scan_results().unwrap();

        h.client
            .deliver(serde_json::json!({"kind": "scan", "data": "bare"}));

        let received = timeout(Duration::from_secs(1), stream.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.label_type, "UNKNOWN");
        assert_eq!(received.source, "scanner");
        assert!(received.timestamp > 0);
    }

    #[tokio::test]
    async fn test_remove_all_listeners() {
        let h = Harness::at_version(8, 0, 0);
        h.client.register_scan_listener().await.unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        h.client
            .on_result(Arc::new(move |scan: &ScanResult| -> Result<(), ListenerError> {
                tx.send(scan.clone())
                    .map_err(|e| ListenerError::failed(e.to_string()))
            }))
            .unwrap();

        assert_eq!(h.client.remove_all_listeners(), 1);
        assert_eq!(
            h.client.deliver(scan("late", None)),
            Routed::Scan { queued: 0 }
        );
        assert!(timeout(Duration::from_millis(30), rx.recv())
            .await
            .map_or(true, |msg| msg.is_none()));
    }
}
