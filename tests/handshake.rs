mod common;

use std::time::Duration;

use serde_json::json;

use chia_rpc::{
    //
    create_memory_transport,
    RegistrationError,
    RpcClient,
    RpcConfig,
    RpcError,
    REGISTER_SERVICE,
};

use common::{expect_request, init_logging, memory_client, memory_client_with};

#[tokio::test]
async fn test_registration_succeeds() {
    // ---
    let (client, mut peer) = memory_client("register-ok");

    let daemon = tokio::spawn(async move {
        let request = expect_request(&mut peer).await;
        peer.respond(&request, json!({"success": true})).await.unwrap();
        (request, peer)
    });

    client.register().await.unwrap();

    let (request, _peer) = daemon.await.unwrap();
    assert_eq!(request.command, REGISTER_SERVICE);
    assert_eq!(request.destination, "daemon");
    assert_eq!(request.origin, "wallet_ui");
    assert_eq!(request.data, json!({"service": "wallet_ui"}));
    assert_eq!(client.pending_requests(), 0);
}

#[tokio::test]
async fn test_connect_with_transport_registers_configured_origin() {
    // ---
    init_logging();
    let (transport, mut peer) = create_memory_transport("connect-ok");

    let daemon = tokio::spawn(async move {
        let request = expect_request(&mut peer).await;
        peer.respond(&request, json!({"success": true})).await.unwrap();
        (request, peer)
    });

    let config = RpcConfig::new("connect-ok").with_origin_service("farm_monitor");
    let client = RpcClient::connect_with_transport(transport, config)
        .await
        .unwrap();

    let (request, peer) = daemon.await.unwrap();
    assert_eq!(request.data["service"], "farm_monitor");
    assert!(!client.is_closed());
    assert!(!peer.is_closed());
}

#[tokio::test]
async fn test_rejected_registration_closes_the_channel() {
    // ---
    init_logging();
    let (transport, mut peer) = create_memory_transport("connect-rejected");

    let daemon = tokio::spawn(async move {
        let request = expect_request(&mut peer).await;
        peer.respond(&request, json!({"success": false, "error": "not permitted"}))
            .await
            .unwrap();
        peer
    });

    let err = RpcClient::connect_with_transport(transport, RpcConfig::new("connect-rejected"))
        .await
        .err()
        .expect("registration should fail");

    match err {
        RpcError::Registration(RegistrationError::Rejected(message)) => {
            assert_eq!(message, "not permitted");
        }
        other => panic!("unexpected: {other:?}"),
    }

    let peer = daemon.await.unwrap();
    assert!(peer.is_closed());
}

#[tokio::test]
async fn test_already_registered() {
    // ---
    let (client, mut peer) = memory_client("register-dup");

    tokio::spawn(async move {
        let request = expect_request(&mut peer).await;
        peer.respond(
            &request,
            json!({"success": false, "error": "service wallet_ui already registered"}),
        )
        .await
        .unwrap();
        peer
    });

    match client.register().await {
        Err(RpcError::Registration(RegistrationError::AlreadyRegistered(service))) => {
            assert_eq!(service, "wallet_ui");
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_registration_times_out() {
    // ---
    let config = RpcConfig::new("register-timeout").with_register_timeout(Duration::from_secs(1));
    let (client, _peer) = memory_client_with(config);

    assert!(matches!(
        client.register().await,
        Err(RpcError::Registration(RegistrationError::TimedOut))
    ));
    assert_eq!(client.pending_requests(), 0);
}

#[tokio::test]
async fn test_registration_interrupted_by_disconnect() {
    // ---
    let (client, mut peer) = memory_client("register-closed");

    tokio::spawn(async move {
        expect_request(&mut peer).await;
        peer.disconnect();
    });

    assert!(matches!(
        client.register().await,
        Err(RpcError::Registration(RegistrationError::Closed))
    ));
    assert!(client.is_closed());
}
