// Callback-style entry points and config-driven construction, driven through the
// transport event stream the way an embedding wallet would wire it up.

use serde_json::json;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use trezor_provider::core::config::ProviderConfig;
use trezor_provider::hardware::{DeviceId, DeviceInfo, MockDevice, TransportEvent};
use trezor_provider::provider::{parse_tx_params, spawn_get_accounts, spawn_sign_transaction, SigningProvider};
use trezor_provider::session::DeviceRegistry;
use trezor_provider::{ProviderError, SessionPolicy, WalletHooks};

const CONFIG: &str = r#"
[derivation]
path = "m/44'/60'/0'/0/1"

[session]
wait_for_device = true
device_timeout_secs = 5
"#;

#[tokio::test]
async fn provider_from_config_uses_configured_path_and_policy() {
    let config = ProviderConfig::from_toml_str(CONFIG).unwrap();
    let provider = SigningProvider::from_config(&config, Arc::new(DeviceRegistry::new())).unwrap();

    assert_eq!(provider.path().to_string(), "m/44'/60'/0'/0/1");
    assert_eq!(
        provider.sessions().policy(),
        SessionPolicy::WaitForDevice { timeout: Some(std::time::Duration::from_secs(5)) }
    );
}

#[tokio::test]
async fn invalid_derivation_path_rejected_at_load() {
    let err = ProviderConfig::from_toml_str("[derivation]\npath = \"44'/60'\"\n").unwrap_err();
    assert!(matches!(err, ProviderError::Config(_)));
}

#[tokio::test]
async fn callbacks_fire_once_with_results() {
    let registry = Arc::new(DeviceRegistry::new());
    let provider = Arc::new(SigningProvider::from_config(&ProviderConfig::default(), Arc::clone(&registry)).unwrap());

    let (events, rx) = mpsc::channel(4);
    let pump = tokio::spawn(Arc::clone(&registry).pump(rx));

    // Device attaches after the request is already waiting
    let (accounts_tx, accounts_rx) = oneshot::channel();
    let accounts_task = spawn_get_accounts(Arc::clone(&provider), move |result| {
        let _ = accounts_tx.send(result);
    });

    let device = MockDevice::new();
    events
        .send(TransportEvent::Attached {
            info: DeviceInfo::new("hooks-1", "Trezor T"),
            transport: Arc::new(device.clone()),
        })
        .await
        .unwrap();

    let accounts = accounts_rx.await.unwrap().unwrap();
    assert_eq!(accounts, vec!["0x9858effd232b4033e47d90003d41ec34ecaeda94".to_string()]);
    accounts_task.await.unwrap();

    let request = parse_tx_params(json!({
        "from": accounts[0],
        "nonce": "0x0",
        "gasPrice": "0x4a817c800",
        "gasLimit": "0x5208",
        "to": "0x1111111111111111111111111111111111111111",
        "value": "0x38d7ea4c68000",
        "chainId": "0x1"
    }))
    .unwrap();

    let (signed_tx, signed_rx) = oneshot::channel();
    spawn_sign_transaction(Arc::clone(&provider), request, move |result| {
        let _ = signed_tx.send(result);
    })
    .await
    .unwrap();
    let raw = signed_rx.await.unwrap().unwrap();
    assert!(raw.starts_with("0xf86b80"));
    assert_eq!(device.sign_calls(), 1);

    events.send(TransportEvent::Detached { id: DeviceId::new("hooks-1") }).await.unwrap();
    drop(events);
    pump.await.unwrap();
    assert_eq!(registry.device_count(), 0);
    assert!(provider.cache().is_empty());
}

#[tokio::test]
async fn hooks_trait_object_reports_errors() {
    let config = ProviderConfig::from_toml_str("[session]\nwait_for_device = false\n").unwrap();
    let provider = SigningProvider::from_config(&config, Arc::new(DeviceRegistry::new())).unwrap();
    let hooks: Arc<dyn WalletHooks> = Arc::new(provider);

    let (tx, rx) = oneshot::channel();
    spawn_get_accounts(Arc::clone(&hooks), move |result| {
        let _ = tx.send(result);
    })
    .await
    .unwrap();
    assert_eq!(rx.await.unwrap().unwrap_err(), ProviderError::NoDevice);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fail_fast_request_after_registry_applies_attach() {
    let config = ProviderConfig::from_toml_str("[session]\nwait_for_device = false\n").unwrap();
    let registry = Arc::new(DeviceRegistry::new());
    let provider = SigningProvider::from_config(&config, Arc::clone(&registry)).unwrap();

    let (events, rx) = mpsc::channel(4);
    let mut changes = registry.subscribe();
    let pump = tokio::spawn(Arc::clone(&registry).pump(rx));
    events
        .send(TransportEvent::Attached {
            info: DeviceInfo::new("demo-1", "Mock Trezor"),
            transport: Arc::new(MockDevice::new()),
        })
        .await
        .unwrap();
    changes.changed().await.unwrap();

    let accounts = provider.get_accounts().await.unwrap();
    assert_eq!(accounts.len(), 1);

    drop(events);
    pump.await.unwrap();
}
