//! # Lifecycle and Facade Flows
//!
//! Configuration loading, the typed configuration/runtime commands and
//! client shutdown.

#[cfg(test)]
mod tests {
    use crate::harness::{reply_to, scan, Harness, MockTransport};
    use dw_bus::EventFilter;
    use dw_client::{ClientConfig, ConfigError, DataWedgeClient};
    use dw_types::{
        AppConfig, AppListMode, ClientError, CloneProfileOptions, ConfigMode,
        CreateProfileOptions, ImportConfigOptions, ImportMode, InboundEvent, ListenerError,
        NotificationCategory, Operation, ProfileOptions, RenameProfileOptions, SetConfigOptions,
        SetDisabledAppListOptions,
    };
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    // =============================================================================
    // CONFIGURATION
    // =============================================================================

    #[tokio::test]
    async fn test_client_from_toml_config() {
        let config = ClientConfig::from_toml_str(
            r#"
            [dispatch]
            default_timeout = "40ms"

            [capability]
            auto_fetch = false
            "#,
        )
        .unwrap();
        let h = Harness::unversioned(config);

        // No snapshot and no auto-fetch: gated calls are refused outright.
        assert!(matches!(
            h.client.get_profiles_list().await,
            Err(ClientError::CapabilityUnknown { .. })
        ));

        // Ungated calls time out per the configured default.
        assert!(matches!(
            h.client.query_data_wedge_status().await,
            Err(ClientError::RequestTimeout { timeout, .. }) if timeout == Duration::from_millis(40)
        ));
    }

    #[test]
    fn test_invalid_config_rejected_by_builder() {
        let mut config = ClientConfig::default();
        config.dispatch.trigger_timeout = Some(Duration::ZERO);

        let result = DataWedgeClient::builder(MockTransport::new())
            .config(config)
            .build();
        assert!(matches!(result, Err(ConfigError::InvalidTimeout(_))));
    }

    // =============================================================================
    // TYPED COMMANDS
    // =============================================================================

    #[tokio::test]
    async fn test_configuration_commands_encode_payloads() {
        let h = Harness::at_version(11, 0, 0);

        h.client
            .clone_profile(&CloneProfileOptions {
                source_profile_name: "Profile0".into(),
                destination_profile_name: "Warehouse".into(),
            })
            .await
            .unwrap();
        h.client
            .create_profile(&CreateProfileOptions {
                profile_name: "Dock".into(),
                profile_enabled: Some(true),
            })
            .await
            .unwrap();
        h.client
            .import_config(&ImportConfigOptions {
                config_file: "/sdcard/datawedge.db".into(),
                import_mode: Some(ImportMode::Merge),
            })
            .await
            .unwrap();
        h.client
            .set_config(&SetConfigOptions {
                profile_name: "Dock".into(),
                profile_enabled: None,
                config_mode: Some(ConfigMode::CreateIfNotExist),
                config: Some(json!({"PLUGIN_CONFIG": {"PLUGIN_NAME": "BARCODE"}})),
            })
            .await
            .unwrap();
        h.client
            .set_disabled_app_list(&SetDisabledAppListOptions {
                apps: vec![AppConfig::new("com.example.kiosk")],
                mode: Some(AppListMode::Add),
            })
            .await
            .unwrap();
        h.client.restore_config().await.unwrap();

        let sent = h.transport.sent();
        assert_eq!(
            sent.iter().map(|c| c.operation).collect::<Vec<_>>(),
            vec![
                Operation::CloneProfile,
                Operation::CreateProfile,
                Operation::ImportConfig,
                Operation::SetConfig,
                Operation::SetDisabledAppList,
                Operation::RestoreConfig,
            ]
        );
        assert_eq!(
            sent[0].payload,
            json!({"sourceProfileName": "Profile0", "destinationProfileName": "Warehouse"})
        );
        assert_eq!(sent[2].payload["importMode"], "MERGE");
        assert_eq!(sent[3].payload["configMode"], "CREATE_IF_NOT_EXIST");
        assert_eq!(
            sent[4].payload,
            json!({"apps": [{"packageName": "com.example.kiosk"}], "mode": "ADD"})
        );
        assert_eq!(sent[5].payload, json!({}));
        // Fire-and-forget commands carry no sequence.
        assert!(sent.iter().all(|c| c.sequence().is_none()));
    }

    #[tokio::test]
    async fn test_invalid_options_never_sent() {
        let h = Harness::at_version(11, 0, 0);

        assert!(matches!(
            h.client
                .rename_profile(&RenameProfileOptions {
                    current_profile_name: "A".into(),
                    new_profile_name: "A".into(),
                })
                .await,
            Err(ClientError::InvalidArgument { .. })
        ));
        assert!(matches!(
            h.client
                .import_config(&ImportConfigOptions {
                    config_file: String::new(),
                    import_mode: None,
                })
                .await,
            Err(ClientError::InvalidArgument { .. })
        ));
        assert!(matches!(
            h.client
                .set_disabled_app_list(&SetDisabledAppListOptions {
                    apps: Vec::new(),
                    mode: None,
                })
                .await,
            Err(ClientError::InvalidArgument { .. })
        ));
        assert_eq!(h.transport.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_typed_replies() {
        let h = Harness::at_version(8, 0, 0);
        h.transport.respond_with(|command| {
            let data = match command.operation {
                Operation::EnumerateScanners => json!({"scanners": [{
                    "scannerName": "2D Barcode Imager",
                    "scannerIndex": "0",
                    "scannerConnectionState": true,
                    "scannerIdentifier": "INTERNAL_IMAGER",
                    "isDefaultScanner": true
                }]}),
                Operation::GetAssociatedApps => json!({"apps": [{
                    "packageName": "com.example.picker",
                    "activityList": ["*"]
                }]}),
                Operation::GetDiagnosticInfo => json!({
                    "isAvailable": true,
                    "packageCheck": {"com.symbol.datawedge": true}
                }),
                Operation::EnumerateTriggers => json!({"triggers": ["LEFT", "RIGHT"]}),
                _ => return Vec::new(),
            };
            vec![reply_to(command, data)]
        });

        let scanners = h.client.enumerate_scanners().await.unwrap();
        assert_eq!(scanners[0].scanner_identifier, "INTERNAL_IMAGER");

        let apps = h
            .client
            .get_associated_apps(&ProfileOptions::new("Profile0"))
            .await
            .unwrap();
        assert_eq!(apps[0].activity_list.as_deref(), Some(&["*".to_string()][..]));

        let diagnostics = h.client.get_diagnostic_info().await.unwrap();
        assert_eq!(
            diagnostics.package_check.get("com.symbol.datawedge"),
            Some(&true)
        );

        assert_eq!(
            h.client.enumerate_triggers().await.unwrap(),
            vec!["LEFT", "RIGHT"]
        );
    }

    // =============================================================================
    // SHUTDOWN
    // =============================================================================

    #[tokio::test]
    async fn test_shutdown_tears_everything_down() {
        let h = Harness::at_version(8, 0, 0);
        h.client
            .subscribe(
                EventFilter::category(NotificationCategory::ProfileSwitch),
                Arc::new(|_: &InboundEvent| -> Result<(), ListenerError> { Ok(()) }),
            )
            .unwrap();

        let client = h.client.clone();
        let pending = tokio::spawn(async move { client.get_active_profile().await });
        let client = h.client.clone();
        let trigger = tokio::spawn(async move { client.soft_scan_trigger().await });
        assert!(h.transport.wait_for_sends(2).await);

        h.client.shutdown();

        assert_eq!(pending.await.unwrap(), Err(ClientError::ShutDown));
        assert_eq!(trigger.await.unwrap(), Err(ClientError::ShutDown));
        assert!(h.client.is_shut_down());
        assert_eq!(
            h.client.switch_to_profile(&ProfileOptions::new("P")).await,
            Err(ClientError::ShutDown)
        );
        assert!(h.client.scan_results().is_err());
        assert_eq!(h.client.remove_all_listeners(), 0);
        assert_eq!(h.client.deliver(scan("after", None)), dw_client::Routed::ScanIgnored);
        assert_eq!(h.transport.sent_count(), 2);
    }
}
