use cirrusmap::{NodeState, StubComputeConfig, StubComputeService};
use std::time::Duration;

fn fast_config() -> StubComputeConfig {
    StubComputeConfig {
        boot_delay_ms: 20,
        teardown_delay_ms: 20,
        purge_delay_ms: 40,
    }
}

#[tokio::test]
async fn node_becomes_running_within_delay_window() {
    let service = StubComputeService::new(fast_config());
    let node = service.create_node_in_group("web").await.unwrap();
    assert_eq!(node.state, NodeState::Pending);

    let deadline = tokio::time::Instant::now() + Duration::from_millis(500);
    loop {
        let current = service.get_node(&node.id).await.unwrap();
        if current.state == NodeState::Running {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "node never left Pending"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn address_reachable_only_after_boot() {
    let service = StubComputeService::new(fast_config());
    let reachable = service.reachable();

    let node = service.create_node_in_group("web").await.unwrap();
    let address = node.public_addresses[0].clone();
    assert!(!reachable.is_reachable(&address).await);

    assert!(
        reachable
            .wait_until_reachable(&address, Duration::from_millis(500))
            .await
    );

    let current = service.get_node(&node.id).await.unwrap();
    assert_eq!(current.state, NodeState::Running);
}

#[tokio::test]
async fn destroyed_node_leaves_the_listing() {
    let service = StubComputeService::new(fast_config());
    let node = service.create_node_in_group("db").await.unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;

    service.destroy_node(&node.id).await.unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_millis(500);
    loop {
        let ids: Vec<String> = service.list_nodes().await.into_iter().map(|n| n.id).collect();
        if !ids.contains(&node.id) {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "node was never purged"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn groups_are_encoded_into_names() {
    let service = StubComputeService::new(fast_config());
    let a = service.create_node_in_group("cache").await.unwrap();
    let b = service.create_node_in_group("cache").await.unwrap();

    assert_ne!(a.id, b.id);
    assert!(a.name.starts_with("cache-"));
    assert!(b.name.starts_with("cache-"));
    assert_eq!(service.list_nodes_in_group("cache").await.len(), 2);
    assert!(service.list_nodes_in_group("other").await.is_empty());
}
