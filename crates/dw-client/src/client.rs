//! `DataWedgeClient` - typed facade over the dispatcher, the capability
//! table and the two fan-out channels.
//!
//! Every typed call follows the same path: validate options, gate on the
//! cached capability snapshot (fetching it first if allowed), then
//! dispatch. Nothing reaches the transport if any step fails.

use crate::domain::capability::CapabilityTable;
use crate::domain::config::{ClientConfig, ConfigError};
use crate::domain::pending::PendingStats;
use crate::ipc::dispatcher::{CommandDispatcher, InvokeOptions, PendingReply};
use crate::ipc::intake::{InboundRouter, IntakeStats, Routed};
use crate::ports::{SystemTimeSource, TimeSource, Transport};
use dw_bus::{
    DiagnosticSink, EventFilter, EventStream, NotificationListener, NotificationRegistry,
    RegistryStats, ScanListener, ScanResultChannel, ScanStats, ScanStream, SubscriptionHandle,
    TracingSink, TriggerSlot,
};
use dw_types::replies::{
    decode_reply, ActiveProfileReply, AppsReply, AvailabilityStatus, DatawedgeStatusReply,
    DiagnosticInfo, IgnoreDisabledProfilesReply, ProfilesListReply, ScannerInfo,
    ScannerStatusReply, ScannersReply, ServiceStatus, TriggersReply, VersionInfo,
};
use dw_types::{
    AppConfig, CapabilitySnapshot, ClientError, ClientResult, CloneProfileOptions,
    CommandOptions, CreateProfileOptions, GetConfigOptions, IgnoreDisabledProfilesOptions,
    ImportConfigOptions, NotifyOptions, Operation, ProfileOptions, RegisterForNotificationOptions,
    RenameProfileOptions, ReplyKind, ScanResult, ScannerStatus, SetConfigOptions,
    SetDisabledAppListOptions, SetReportingOptions, SwitchScannerOptions,
    SwitchScannerParamsOptions, TriggerToken,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Builder for [`DataWedgeClient`].
pub struct DataWedgeClientBuilder {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
    time: Arc<dyn TimeSource>,
    sink: Arc<dyn DiagnosticSink>,
    snapshot: Option<CapabilitySnapshot>,
}

impl DataWedgeClientBuilder {
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn time_source(mut self, time: Arc<dyn TimeSource>) -> Self {
        self.time = time;
        self
    }

    /// Destination for listener failures. Defaults to [`TracingSink`].
    pub fn diagnostic_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Seed the capability table, skipping the first `getVersionInfo`.
    pub fn capabilities(mut self, snapshot: CapabilitySnapshot) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    pub fn build(self) -> Result<DataWedgeClient, ConfigError> {
        self.config.validate()?;

        let dispatcher = Arc::new(CommandDispatcher::new(
            self.transport,
            self.config.dispatch.default_timeout,
        ));
        let registry = NotificationRegistry::with_sink(self.sink.clone());
        let scans = ScanResultChannel::with_sink(self.sink);
        let intake = Arc::new(InboundRouter::new(
            dispatcher.clone(),
            registry.clone(),
            scans.clone(),
            self.time,
            self.config.scan.intake_enabled_at_start,
        ));
        let capabilities = match self.snapshot {
            Some(snapshot) => Arc::new(CapabilityTable::with_snapshot(snapshot)),
            None => Arc::new(CapabilityTable::new()),
        };

        Ok(DataWedgeClient {
            config: self.config,
            capabilities,
            dispatcher,
            registry,
            scans,
            intake,
            fetch_lock: Mutex::new(()),
        })
    }
}

/// Typed client for the DataWedge scanning service.
pub struct DataWedgeClient {
    config: ClientConfig,
    capabilities: Arc<CapabilityTable>,
    dispatcher: Arc<CommandDispatcher>,
    registry: NotificationRegistry,
    scans: ScanResultChannel,
    intake: Arc<InboundRouter>,
    /// Single-flight guard for capability fetches.
    fetch_lock: Mutex<()>,
}

impl DataWedgeClient {
    pub fn builder(transport: Arc<dyn Transport>) -> DataWedgeClientBuilder {
        DataWedgeClientBuilder {
            transport,
            config: ClientConfig::default(),
            time: Arc::new(SystemTimeSource),
            sink: Arc::new(TracingSink),
            snapshot: None,
        }
    }

    /// Client with default configuration.
    pub fn new(transport: Arc<dyn Transport>) -> Result<Self, ConfigError> {
        Self::builder(transport).build()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Generic dispatch
    // ------------------------------------------------------------------

    /// Run any catalog operation with a raw JSON payload.
    ///
    /// Scan-result operations resolve to the encoded [`ScanResult`];
    /// fire-and-forget operations to `Value::Null`.
    pub async fn invoke(
        &self,
        operation: Operation,
        payload: Value,
        options: InvokeOptions,
    ) -> ClientResult<Value> {
        let payload = payload.to_payload(operation)?;
        self.ensure_supported(operation).await?;

        if operation.reply() == ReplyKind::ScanResult {
            let scan = self
                .soft_trigger(operation, payload, options.timeout)
                .await?;
            return serde_json::to_value(scan).map_err(|e| ClientError::MalformedReply {
                operation,
                reason: e.to_string(),
            });
        }

        let data = self.dispatcher.invoke(operation, payload, options).await?;
        self.after_send(operation, &data)?;
        Ok(data)
    }

    /// Send a reply-expecting operation and hand back the pending handle.
    ///
    /// Lets the caller cancel or drop the request before it resolves.
    pub async fn start(
        &self,
        operation: Operation,
        payload: Value,
        timeout: Option<Duration>,
    ) -> ClientResult<PendingReply> {
        if operation.reply() != ReplyKind::Direct {
            return Err(ClientError::InvalidArgument {
                operation,
                reason: "operation does not produce a direct reply".into(),
            });
        }
        let payload = payload.to_payload(operation)?;
        self.ensure_supported(operation).await?;
        let pending = self.dispatcher.start(operation, payload, timeout).await?;

        if operation != Operation::GetVersionInfo {
            return Ok(pending);
        }
        let capabilities = self.capabilities.clone();
        Ok(pending.on_reply(move |data| {
            match serde_json::from_value::<VersionInfo>(data.clone()) {
                Ok(info) => capabilities.store(info.into_snapshot()),
                Err(e) => warn!(error = %e, "Version reply could not refresh capabilities"),
            }
        }))
    }

    async fn call<O>(&self, operation: Operation, options: &O) -> ClientResult<Value>
    where
        O: CommandOptions,
    {
        let payload = options.to_payload(operation)?;
        self.ensure_supported(operation).await?;
        self.dispatcher
            .invoke(operation, payload, InvokeOptions::for_operation(operation))
            .await
    }

    async fn query<T: DeserializeOwned>(&self, operation: Operation) -> ClientResult<T> {
        let data = self.call(operation, &Value::Null).await?;
        decode_reply(operation, data)
    }

    async fn query_with<T, O>(&self, operation: Operation, options: &O) -> ClientResult<T>
    where
        T: DeserializeOwned,
        O: CommandOptions,
    {
        let data = self.call(operation, options).await?;
        decode_reply(operation, data)
    }

    async fn command(&self, operation: Operation) -> ClientResult<()> {
        self.call(operation, &Value::Null).await.map(|_| ())
    }

    async fn command_with<O: CommandOptions>(
        &self,
        operation: Operation,
        options: &O,
    ) -> ClientResult<()> {
        self.call(operation, options).await.map(|_| ())
    }

    fn after_send(&self, operation: Operation, data: &Value) -> ClientResult<()> {
        match operation {
            Operation::GetVersionInfo if !data.is_null() => {
                let info: VersionInfo = decode_reply(operation, data.clone())?;
                self.capabilities.store(info.into_snapshot());
            }
            Operation::RegisterScanListener => self.intake.enable_scan_intake(),
            _ => {}
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Capability gating
    // ------------------------------------------------------------------

    /// Gate `operation` on the cached snapshot, fetching it first when
    /// none is cached and auto-fetch is on.
    pub async fn ensure_supported(&self, operation: Operation) -> ClientResult<()> {
        if self.dispatcher.is_closed() {
            return Err(ClientError::ShutDown);
        }

        if self.config.capability.auto_fetch && self.capabilities.needs_fetch(operation) {
            let _single_flight = self.fetch_lock.lock().await;
            if self.capabilities.needs_fetch(operation) {
                debug!(operation = %operation, "No capability snapshot; fetching version info");
                if let Err(e) = self.fetch_capabilities().await {
                    return Err(match e {
                        ClientError::ShutDown => e,
                        other => ClientError::CapabilityUnknown {
                            operation,
                            reason: other.to_string(),
                        },
                    });
                }
            }
        }

        self.capabilities.check_supported(operation)
    }

    async fn fetch_capabilities(&self) -> ClientResult<CapabilitySnapshot> {
        let mut options = InvokeOptions::expecting_reply();
        options.timeout = self.config.capability.version_query_timeout;

        let data = self
            .dispatcher
            .invoke(Operation::GetVersionInfo, Value::Null, options)
            .await?;
        let info: VersionInfo = decode_reply(Operation::GetVersionInfo, data)?;
        let snapshot = info.into_snapshot();
        if let Some(error) = &snapshot.error {
            warn!(error = %error, "Service reported no usable version");
        }
        self.capabilities.store(snapshot.clone());
        Ok(snapshot)
    }

    /// Cached snapshot, if any.
    pub fn capabilities(&self) -> Option<CapabilitySnapshot> {
        self.capabilities.snapshot()
    }

    /// Re-query the service version and replace the cached snapshot.
    pub async fn refresh_capabilities(&self) -> ClientResult<CapabilitySnapshot> {
        let _single_flight = self.fetch_lock.lock().await;
        self.fetch_capabilities().await
    }

    /// Drop the cached snapshot. The next gated call fetches again.
    pub fn invalidate_capabilities(&self) -> Option<CapabilitySnapshot> {
        self.capabilities.invalidate()
    }

    // ------------------------------------------------------------------
    // Soft triggers
    // ------------------------------------------------------------------

    async fn soft_trigger(
        &self,
        operation: Operation,
        payload: Value,
        timeout: Option<Duration>,
    ) -> ClientResult<ScanResult> {
        let (token, receiver) = self.scans.trigger().begin(operation)?;
        let _slot = TriggerGuard {
            slot: self.scans.trigger(),
            token,
        };

        let sequence = self
            .dispatcher
            .send_trigger(operation, payload, token)
            .await?;

        let limit = timeout
            .or(self.config.dispatch.trigger_timeout)
            .or(self.config.dispatch.default_timeout);
        let received = match limit {
            None => receiver.await,
            Some(limit) => match tokio::time::timeout(limit, receiver).await {
                Ok(received) => received,
                Err(_) => {
                    warn!(
                        operation = %operation,
                        token = %token,
                        timeout_ms = limit.as_millis(),
                        "Soft trigger timed out"
                    );
                    return Err(ClientError::RequestTimeout {
                        operation,
                        sequence,
                        timeout: limit,
                    });
                }
            },
        };

        received.map_err(|_| {
            if self.dispatcher.is_closed() {
                ClientError::ShutDown
            } else {
                ClientError::Cancelled {
                    operation,
                    sequence,
                }
            }
        })
    }

    // ------------------------------------------------------------------
    // Status / info
    // ------------------------------------------------------------------

    pub async fn is_data_wedge_available(&self) -> ClientResult<AvailabilityStatus> {
        self.query(Operation::IsDataWedgeAvailable).await
    }

    pub async fn get_diagnostic_info(&self) -> ClientResult<DiagnosticInfo> {
        self.query(Operation::GetDiagnosticInfo).await
    }

    pub async fn query_data_wedge_status(&self) -> ClientResult<ServiceStatus> {
        self.query(Operation::QueryDataWedgeStatus).await
    }

    /// Query the service version. The reply also replaces the cached
    /// capability snapshot.
    pub async fn get_version_info(&self) -> ClientResult<VersionInfo> {
        let info: VersionInfo = self.query(Operation::GetVersionInfo).await?;
        self.capabilities.store(info.clone().into_snapshot());
        Ok(info)
    }

    pub async fn enumerate_scanners(&self) -> ClientResult<Vec<ScannerInfo>> {
        let reply: ScannersReply = self.query(Operation::EnumerateScanners).await?;
        Ok(reply.scanners)
    }

    pub async fn get_active_profile(&self) -> ClientResult<String> {
        let reply: ActiveProfileReply = self.query(Operation::GetActiveProfile).await?;
        Ok(reply.profile_name)
    }

    pub async fn get_profiles_list(&self) -> ClientResult<Vec<String>> {
        let reply: ProfilesListReply = self.query(Operation::GetProfilesList).await?;
        Ok(reply.profiles)
    }

    pub async fn get_scanner_status(&self) -> ClientResult<ScannerStatus> {
        let reply: ScannerStatusReply = self.query(Operation::GetScannerStatus).await?;
        Ok(reply.status)
    }

    /// Whether DataWedge itself is enabled.
    pub async fn get_datawedge_status(&self) -> ClientResult<bool> {
        let reply: DatawedgeStatusReply = self.query(Operation::GetDatawedgeStatus).await?;
        Ok(reply.is_enabled)
    }

    pub async fn get_associated_apps(&self, options: &ProfileOptions) -> ClientResult<Vec<AppConfig>> {
        let reply: AppsReply = self
            .query_with(Operation::GetAssociatedApps, options)
            .await?;
        Ok(reply.apps)
    }

    /// Profile configuration, returned as the service sent it.
    pub async fn get_config(&self, options: &GetConfigOptions) -> ClientResult<Value> {
        self.call(Operation::GetConfig, options).await
    }

    pub async fn get_disabled_app_list(&self) -> ClientResult<Vec<AppConfig>> {
        let reply: AppsReply = self.query(Operation::GetDisabledAppList).await?;
        Ok(reply.apps)
    }

    pub async fn get_ignore_disabled_profiles(&self) -> ClientResult<bool> {
        let reply: IgnoreDisabledProfilesReply =
            self.query(Operation::GetIgnoreDisabledProfiles).await?;
        Ok(reply.ignore_disabled_profiles)
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    pub async fn clone_profile(&self, options: &CloneProfileOptions) -> ClientResult<()> {
        self.command_with(Operation::CloneProfile, options).await
    }

    pub async fn create_profile(&self, options: &CreateProfileOptions) -> ClientResult<()> {
        self.command_with(Operation::CreateProfile, options).await
    }

    pub async fn delete_profile(&self, options: &ProfileOptions) -> ClientResult<()> {
        self.command_with(Operation::DeleteProfile, options).await
    }

    pub async fn import_config(&self, options: &ImportConfigOptions) -> ClientResult<()> {
        self.command_with(Operation::ImportConfig, options).await
    }

    pub async fn rename_profile(&self, options: &RenameProfileOptions) -> ClientResult<()> {
        self.command_with(Operation::RenameProfile, options).await
    }

    pub async fn restore_config(&self) -> ClientResult<()> {
        self.command(Operation::RestoreConfig).await
    }

    pub async fn set_config(&self, options: &SetConfigOptions) -> ClientResult<()> {
        self.command_with(Operation::SetConfig, options).await
    }

    pub async fn set_disabled_app_list(
        &self,
        options: &SetDisabledAppListOptions,
    ) -> ClientResult<()> {
        self.command_with(Operation::SetDisabledAppList, options)
            .await
    }

    pub async fn set_ignore_disabled_profiles(
        &self,
        options: &IgnoreDisabledProfilesOptions,
    ) -> ClientResult<()> {
        self.command_with(Operation::SetIgnoreDisabledProfiles, options)
            .await
    }

    // ------------------------------------------------------------------
    // Runtime
    // ------------------------------------------------------------------

    pub async fn disable_datawedge(&self) -> ClientResult<()> {
        self.command(Operation::DisableDatawedge).await
    }

    pub async fn enable_datawedge(&self) -> ClientResult<()> {
        self.command(Operation::EnableDatawedge).await
    }

    pub async fn disable_scanner_input(&self) -> ClientResult<()> {
        self.command(Operation::DisableScannerInput).await
    }

    pub async fn enable_scanner_input(&self) -> ClientResult<()> {
        self.command(Operation::EnableScannerInput).await
    }

    pub async fn enumerate_triggers(&self) -> ClientResult<Vec<String>> {
        let reply: TriggersReply = self.query(Operation::EnumerateTriggers).await?;
        Ok(reply.triggers)
    }

    pub async fn notify(&self, options: &NotifyOptions) -> ClientResult<()> {
        self.command_with(Operation::Notify, options).await
    }

    pub async fn reset_default_profile(&self) -> ClientResult<()> {
        self.command(Operation::ResetDefaultProfile).await
    }

    pub async fn set_default_profile(&self, options: &ProfileOptions) -> ClientResult<()> {
        self.command_with(Operation::SetDefaultProfile, options)
            .await
    }

    pub async fn set_reporting_options(&self, options: &SetReportingOptions) -> ClientResult<()> {
        self.command_with(Operation::SetReportingOptions, options)
            .await
    }

    /// Fire the RFID trigger and wait for the read it produces.
    pub async fn soft_rfid_trigger(&self) -> ClientResult<ScanResult> {
        self.ensure_supported(Operation::SoftRfidTrigger).await?;
        self.soft_trigger(Operation::SoftRfidTrigger, Value::Null, None)
            .await
    }

    /// Fire the scan trigger and wait for the read it produces.
    ///
    /// Only one soft trigger may be outstanding at a time.
    pub async fn soft_scan_trigger(&self) -> ClientResult<ScanResult> {
        self.ensure_supported(Operation::SoftScanTrigger).await?;
        self.soft_trigger(Operation::SoftScanTrigger, Value::Null, None)
            .await
    }

    pub async fn switch_scanner(&self, options: &SwitchScannerOptions) -> ClientResult<()> {
        self.command_with(Operation::SwitchScanner, options).await
    }

    pub async fn switch_scanner_params(
        &self,
        options: &SwitchScannerParamsOptions,
    ) -> ClientResult<()> {
        self.command_with(Operation::SwitchScannerParams, options)
            .await
    }

    pub async fn switch_to_profile(&self, options: &ProfileOptions) -> ClientResult<()> {
        self.command_with(Operation::SwitchToProfile, options).await
    }

    // ------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------

    /// Ask the service to start broadcasting a notification category.
    ///
    /// `SCAN_RESULT` is rejected with `WrongChannel`.
    pub async fn register_for_notification(
        &self,
        options: &RegisterForNotificationOptions,
    ) -> ClientResult<()> {
        self.command_with(Operation::RegisterForNotification, options)
            .await
    }

    pub async fn unregister_for_notification(
        &self,
        options: &RegisterForNotificationOptions,
    ) -> ClientResult<()> {
        self.command_with(Operation::UnRegisterForNotification, options)
            .await
    }

    /// Register with the service for scan broadcasts and start accepting
    /// them at the intake.
    pub async fn register_scan_listener(&self) -> ClientResult<()> {
        self.command(Operation::RegisterScanListener).await?;
        self.intake.enable_scan_intake();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------

    pub fn subscribe(
        &self,
        filter: EventFilter,
        listener: Arc<dyn NotificationListener>,
    ) -> ClientResult<SubscriptionHandle> {
        self.ensure_open()?;
        self.registry.subscribe(filter, listener)
    }

    /// Subscribe with a stream instead of a callback.
    pub fn notifications(&self, filter: EventFilter) -> ClientResult<EventStream> {
        self.ensure_open()?;
        self.registry.subscribe_stream(filter)
    }

    /// Register a scan listener. Must be called inside a Tokio runtime.
    pub fn on_result(&self, listener: Arc<dyn ScanListener>) -> ClientResult<SubscriptionHandle> {
        self.ensure_open()?;
        self.scans.on_result(listener)
    }

    pub fn scan_results(&self) -> ClientResult<ScanStream> {
        self.ensure_open()?;
        Ok(self.scans.results())
    }

    /// Remove a notification or scan subscription.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        self.registry.unsubscribe(handle) || self.scans.unsubscribe(handle)
    }

    /// Drop every notification and scan subscription.
    pub fn remove_all_listeners(&self) -> usize {
        let removed = self.registry.clear() + self.scans.clear();
        debug!(removed, "Removed all listeners");
        removed
    }

    /// Most recent scan seen by the client.
    pub fn last_scan(&self) -> Option<ScanResult> {
        self.scans.last_scan()
    }

    // ------------------------------------------------------------------
    // Intake
    // ------------------------------------------------------------------

    /// Entry point for every raw payload the transport receives.
    pub fn deliver(&self, raw: Value) -> Routed {
        self.intake.deliver(raw)
    }

    /// Shared intake handle for transport adapters.
    pub fn intake(&self) -> Arc<InboundRouter> {
        self.intake.clone()
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Reject outstanding requests, release the trigger slot, drop every
    /// subscription and refuse further calls.
    pub fn shutdown(&self) {
        let rejected = self.dispatcher.close();
        let trigger = self.scans.trigger().cancel();
        let listeners = self.remove_all_listeners();
        self.intake.disable_scan_intake();
        info!(
            rejected,
            trigger_cancelled = trigger.is_some(),
            listeners,
            "DataWedge client shut down"
        );
    }

    pub fn is_shut_down(&self) -> bool {
        self.dispatcher.is_closed()
    }

    fn ensure_open(&self) -> ClientResult<()> {
        if self.is_shut_down() {
            Err(ClientError::ShutDown)
        } else {
            Ok(())
        }
    }

    // ------------------------------------------------------------------
    // Statistics
    // ------------------------------------------------------------------

    pub fn pending_count(&self) -> usize {
        self.dispatcher.pending_count()
    }

    pub fn pending_stats(&self) -> &PendingStats {
        self.dispatcher.stats()
    }

    pub fn registry_stats(&self) -> &RegistryStats {
        self.registry.stats()
    }

    pub fn scan_stats(&self) -> &ScanStats {
        self.scans.stats()
    }

    pub fn intake_stats(&self) -> &IntakeStats {
        self.intake.stats()
    }
}

impl Drop for DataWedgeClient {
    fn drop(&mut self) {
        if !self.is_shut_down() {
            self.shutdown();
        }
    }
}

/// Frees the trigger slot when the waiting call ends, however it ends.
struct TriggerGuard<'a> {
    slot: &'a TriggerSlot,
    token: TriggerToken,
}

impl Drop for TriggerGuard<'_> {
    fn drop(&mut self) {
        self.slot.release(self.token);
    }
}
