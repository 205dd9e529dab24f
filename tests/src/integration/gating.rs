//! # Capability Gating Flows
//!
//! Version gates are enforced before anything touches the transport, and
//! the snapshot is fetched lazily when none is cached.

#[cfg(test)]
mod tests {
    use crate::harness::{reply_to, version_responder, Harness};
    use dw_client::{ClientConfig, InvokeOptions};
    use dw_types::{
        ClientError, GetConfigOptions, NotifyOptions, Operation, ProfileOptions, ServiceVersion,
    };
    use serde_json::{json, Value};

    // =============================================================================
    // BELOW-GATE CALLS NEVER SEND
    // =============================================================================

    #[tokio::test]
    async fn test_get_active_profile_on_6_2_is_unsupported() {
        let h = Harness::at_version(6, 2, 0);

        let err = h.client.get_active_profile().await.unwrap_err();

        assert_eq!(
            err,
            ClientError::UnsupportedOperation {
                operation: Operation::GetActiveProfile,
                min_version_required: ServiceVersion::new(6, 5, 0),
                current_version: ServiceVersion::new(6, 2, 0),
            }
        );
        assert_eq!(
            err.to_string(),
            "getActiveProfile requires service 6.5.0, current version is 6.2.0"
        );
        assert_eq!(h.transport.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_every_gated_operation_below_gate_sends_nothing() {
        let h = Harness::at_version(6, 0, 0);

        for operation in Operation::all() {
            let Some(required) = operation.min_version() else {
                continue;
            };
            if ServiceVersion::new(6, 0, 0).satisfies(&required) {
                continue;
            }

            let result = h
                .client
                .invoke(operation, Value::Null, InvokeOptions::for_operation(operation))
                .await;
            assert!(
                matches!(result, Err(ClientError::UnsupportedOperation { .. })),
                "{operation} should be gated at {required}"
            );
        }

        assert_eq!(h.transport.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_minor_version_compares_numerically() {
        // 6.10 is newer than 6.9.
        let h = Harness::at_version(6, 10, 0);
        h.transport.respond_with(|command| match command.operation {
            Operation::GetDisabledAppList => vec![reply_to(command, json!({"apps": []}))],
            _ => Vec::new(),
        });

        assert!(h.client.get_disabled_app_list().await.unwrap().is_empty());
        assert!(matches!(
            h.client.get_ignore_disabled_profiles().await,
            Err(ClientError::UnsupportedOperation { .. })
        ));
    }

    #[tokio::test]
    async fn test_notify_needs_11() {
        let h = Harness::at_version(10, 99, 99);
        assert!(matches!(
            h.client.notify(&NotifyOptions::default()).await,
            Err(ClientError::UnsupportedOperation { .. })
        ));
        assert_eq!(h.transport.sent_count(), 0);
    }

    // =============================================================================
    // LAZY CAPABILITY FETCH
    // =============================================================================

    #[tokio::test]
    async fn test_auto_fetch_below_gate_sends_only_version_query() {
        let h = Harness::unversioned(ClientConfig::default());
        h.transport
            .respond_with(version_responder(ServiceVersion::new(6, 2, 0)));

        let err = h.client.get_active_profile().await.unwrap_err();

        assert!(matches!(err, ClientError::UnsupportedOperation { .. }));
        assert_eq!(h.transport.operations(), vec![Operation::GetVersionInfo]);
        assert_eq!(
            h.client.capabilities().unwrap().version,
            ServiceVersion::new(6, 2, 0)
        );
    }

    #[tokio::test]
    async fn test_concurrent_gated_calls_fetch_once() {
        let h = Harness::unversioned(ClientConfig::default());
        h.transport.respond_with(|command| match command.operation {
            Operation::GetVersionInfo => vec![reply_to(command, json!({"version": "8.2.1"}))],
            Operation::SwitchToProfile => Vec::new(),
            _ => Vec::new(),
        });

        let calls = (0..8).map(|i| {
            let client = h.client.clone();
            tokio::spawn(async move {
                client
                    .switch_to_profile(&ProfileOptions::new(format!("Profile{i}")))
                    .await
            })
        });
        for call in calls.collect::<Vec<_>>() {
            call.await.unwrap().unwrap();
        }

        assert_eq!(h.transport.sent_for(Operation::GetVersionInfo).len(), 1);
        assert_eq!(h.transport.sent_for(Operation::SwitchToProfile).len(), 8);
    }

    #[tokio::test]
    async fn test_errored_version_reply_is_capability_unknown() {
        let h = Harness::unversioned(ClientConfig::default());
        h.transport.respond_with(|command| match command.operation {
            Operation::GetVersionInfo => vec![reply_to(
                command,
                json!({"version": "", "error": "DataWedge not detected"}),
            )],
            _ => Vec::new(),
        });

        let err = h
            .client
            .get_config(&GetConfigOptions {
                profile_name: "Profile1".into(),
                config_type: None,
            })
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ClientError::CapabilityUnknown {
                operation: Operation::GetConfig,
                reason: "DataWedge not detected".into()
            }
        );
        assert_eq!(h.transport.operations(), vec![Operation::GetVersionInfo]);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let h = Harness::unversioned(ClientConfig::default());
        h.transport
            .respond_with(version_responder(ServiceVersion::new(8, 0, 0)));

        h.client.enable_datawedge().await.unwrap();
        assert!(h.client.invalidate_capabilities().is_some());
        h.client.disable_datawedge().await.unwrap();

        assert_eq!(
            h.transport.operations(),
            vec![
                Operation::GetVersionInfo,
                Operation::EnableDatawedge,
                Operation::GetVersionInfo,
                Operation::DisableDatawedge,
            ]
        );
    }

    #[tokio::test]
    async fn test_refresh_replaces_snapshot() {
        let h = Harness::at_version(6, 2, 0);
        h.transport
            .respond_with(version_responder(ServiceVersion::new(11, 1, 0)));

        let snapshot = h.client.refresh_capabilities().await.unwrap();
        assert_eq!(snapshot.version, ServiceVersion::new(11, 1, 0));
        assert!(snapshot.supports_feature("notify"));
        h.client.notify(&NotifyOptions::default()).await.unwrap();
    }

    #[tokio::test]
    async fn test_ungated_calls_skip_fetch() {
        let h = Harness::unversioned(ClientConfig::default());
        h.transport.respond_with(|command| match command.operation {
            Operation::IsDataWedgeAvailable => {
                vec![reply_to(command, json!({"available": true}))]
            }
            _ => Vec::new(),
        });

        assert!(h.client.is_data_wedge_available().await.unwrap().available);
        assert_eq!(
            h.transport.operations(),
            vec![Operation::IsDataWedgeAvailable]
        );
        assert!(h.client.capabilities().is_none());
    }
}
