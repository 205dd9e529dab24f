//! # Request/Reply Correlation Flows
//!
//! Replies are matched by `(operation, sequence)` regardless of arrival
//! order; timeouts, cancellations and late replies resolve each request
//! exactly once.

#[cfg(test)]
mod tests {
    use crate::harness::{error_reply_to, reply_to, Harness};
    use dw_client::{ClientConfig, Routed};
    use dw_types::{ClientError, GetConfigOptions, Operation, ScannerStatus};
    use serde_json::{json, Value};
    use std::time::Duration;

    fn config_options(profile: &str) -> GetConfigOptions {
        GetConfigOptions {
            profile_name: profile.into(),
            config_type: None,
        }
    }

    // =============================================================================
    // NO CROSS-RESOLUTION
    // =============================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_never_cross_resolve() {
        const N: usize = 40;
        let h = Harness::at_version(8, 0, 0);

        let calls: Vec<_> = (0..N)
            .map(|i| {
                let client = h.client.clone();
                tokio::spawn(async move {
                    let config = client
                        .get_config(&config_options(&format!("Profile{i}")))
                        .await?;
                    Ok::<_, ClientError>((i, config))
                })
            })
            .collect();

        assert!(h.transport.wait_for_sends(N).await);

        // Answer in reverse order, echoing each request's profile.
        for command in h.transport.sent().iter().rev() {
            let profile = command.payload["profileName"].clone();
            let routed = h
                .transport
                .deliver(reply_to(command, json!({"profileName": profile})))
                .unwrap();
            assert!(matches!(routed, Routed::Reply { .. }));
        }

        for call in calls {
            let (i, config) = call.await.unwrap().unwrap();
            assert_eq!(config["profileName"], format!("Profile{i}"));
        }
        assert_eq!(h.client.pending_count(), 0);
        assert_eq!(h.client.pending_stats().completed(), N as u64);
    }

    #[tokio::test]
    async fn test_same_sequence_other_operation_does_not_resolve() {
        let h = Harness::at_version(8, 0, 0);
        let client = h.client.clone();
        let call = tokio::spawn(async move { client.get_active_profile().await });

        assert!(h.transport.wait_for_sends(1).await);
        let sent = h.transport.last().unwrap();
        let sequence = sent.sequence().unwrap();

        let routed = h
            .transport
            .deliver(json!({
                "kind": "reply",
                "operation": "getProfilesList",
                "sequence": sequence,
                "data": {"profiles": []}
            }))
            .unwrap();
        assert!(matches!(routed, Routed::LateReply { .. }));

        h.transport
            .deliver(reply_to(&sent, json!({"profileName": "Profile1"})))
            .unwrap();
        assert_eq!(call.await.unwrap().unwrap(), "Profile1");
    }

    // =============================================================================
    // TIMEOUTS AND LATE REPLIES
    // =============================================================================

    #[tokio::test]
    async fn test_late_reply_after_timeout_is_noop() {
        let mut config = ClientConfig::default();
        config.dispatch.default_timeout = Some(Duration::from_millis(30));
        let h = Harness::build(
            config,
            Some(dw_types::CapabilitySnapshot::from_version(
                dw_types::ServiceVersion::new(8, 0, 0),
            )),
        );

        let err = h.client.get_scanner_status().await.unwrap_err();
        let sent = h.transport.last().unwrap();
        assert_eq!(
            err,
            ClientError::RequestTimeout {
                operation: Operation::GetScannerStatus,
                sequence: sent.sequence().unwrap(),
                timeout: Duration::from_millis(30),
            }
        );

        let routed = h
            .transport
            .deliver(reply_to(&sent, json!({"status": "IDLE"})))
            .unwrap();
        assert!(matches!(routed, Routed::LateReply { .. }));
        assert_eq!(h.client.pending_stats().timed_out(), 1);
        assert_eq!(h.client.pending_stats().late_dropped(), 1);
        assert_eq!(h.client.pending_stats().completed(), 0);

        // The client keeps working afterwards.
        h.transport.respond_with(|command| match command.operation {
            Operation::GetScannerStatus => vec![reply_to(command, json!({"status": "SCANNING"}))],
            _ => Vec::new(),
        });
        assert_eq!(
            h.client.get_scanner_status().await.unwrap(),
            ScannerStatus::Scanning
        );
    }

    #[tokio::test]
    async fn test_no_default_timeout_waits_for_reply() {
        let h = Harness::at_version(8, 0, 0);
        let client = h.client.clone();
        let call = tokio::spawn(async move { client.get_datawedge_status().await });

        assert!(h.transport.wait_for_sends(1).await);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!call.is_finished());

        let sent = h.transport.last().unwrap();
        h.transport
            .deliver(reply_to(&sent, json!({"isEnabled": true})))
            .unwrap();
        assert!(call.await.unwrap().unwrap());
    }

    // =============================================================================
    // CANCELLATION
    // =============================================================================

    #[tokio::test]
    async fn test_cancel_then_reply_is_dropped() {
        let h = Harness::at_version(8, 0, 0);
        let pending = h
            .client
            .start(Operation::EnumerateTriggers, Value::Null, None)
            .await
            .unwrap();
        let key = pending.key();
        let canceller = pending.cancel_handle();

        let waiter = tokio::spawn(pending.wait());
        assert!(canceller.cancel());
        assert_eq!(
            waiter.await.unwrap(),
            Err(ClientError::Cancelled {
                operation: key.operation,
                sequence: key.sequence
            })
        );

        let sent = h.transport.last().unwrap();
        let routed = h
            .transport
            .deliver(reply_to(&sent, json!({"triggers": []})))
            .unwrap();
        assert!(matches!(routed, Routed::LateReply { .. }));
    }

    #[tokio::test]
    async fn test_dropped_call_releases_pending_entry() {
        let h = Harness::at_version(8, 0, 0);
        let client = h.client.clone();
        let call = tokio::spawn(async move { client.enumerate_scanners().await });

        assert!(h.transport.wait_for_sends(1).await);
        assert_eq!(h.client.pending_count(), 1);

        call.abort();
        let _ = call.await;
        assert_eq!(h.client.pending_count(), 0);
        assert_eq!(h.client.pending_stats().cancelled(), 1);
    }

    // =============================================================================
    // REPLY SHAPES AND SEND FAILURES
    // =============================================================================

    #[tokio::test]
    async fn test_service_error_reply() {
        let h = Harness::at_version(8, 0, 0);
        h.transport.respond_with(|command| {
            vec![error_reply_to(command, "PROFILE_NOT_FOUND")]
        });

        assert_eq!(
            h.client.get_config(&config_options("Missing")).await,
            Err(ClientError::Service {
                operation: Operation::GetConfig,
                message: "PROFILE_NOT_FOUND".into()
            })
        );
    }

    #[tokio::test]
    async fn test_malformed_reply() {
        let h = Harness::at_version(8, 0, 0);
        h.transport
            .respond_with(|command| vec![reply_to(command, json!({"profiles": "Profile0"}))]);

        assert!(matches!(
            h.client.get_profiles_list().await,
            Err(ClientError::MalformedReply {
                operation: Operation::GetProfilesList,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_transport_failure_leaves_nothing_pending() {
        let h = Harness::at_version(8, 0, 0);
        h.transport.set_failing(true);

        assert!(matches!(
            h.client.get_active_profile().await,
            Err(ClientError::Transport(_))
        ));
        assert_eq!(h.client.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_sequences_are_unique_across_operations() {
        let h = Harness::at_version(8, 0, 0);
        h.transport
            .respond_with(|command| vec![reply_to(command, json!({"profiles": [], "profileName": "P"}))]);

        h.client.get_profiles_list().await.unwrap();
        h.client.get_active_profile().await.unwrap();
        h.client.get_profiles_list().await.unwrap();

        let mut sequences: Vec<u64> = h
            .transport
            .sent()
            .iter()
            .filter_map(|c| c.sequence())
            .collect();
        let total = sequences.len();
        sequences.sort_unstable();
        sequences.dedup();
        assert_eq!(sequences.len(), total);
        assert_eq!(total, 3);
    }
}
