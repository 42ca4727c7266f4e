//! 离线编辑演示
//!
//! 断网状态下修改目录，恢复网络后自动同步到（内存模拟的）远端。

use std::sync::Arc;

use catalog_sync::{
    CatalogSyncConfig, ConnectivityMonitor, InMemoryCatalogService, ManualConnectivityProbe,
    Product, SledKvStore, SyncEngine, SyncEvent,
};
use tokio::time::{sleep, Duration};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("========================================");
    println!("离线优先目录同步演示");
    println!("========================================\n");

    // === 1. 组装引擎 ===

    let data_dir = tempfile::tempdir()?;
    let config = CatalogSyncConfig::builder()
        .data_dir(data_dir.path())
        .namespace("demo")
        .auto_sync_threshold(3)
        .build();

    let kv = Arc::new(SledKvStore::open(&config.data_dir, &config.namespace).await?);
    let remote = Arc::new(InMemoryCatalogService::new(vec![
        Product::new("TOR-01").with_name("Tornillo 1/4").with_stock(120.0).with_unit_cost(0.3),
        Product::new("TUE-02").with_name("Tuerca 1/4").with_stock(80.0).with_unit_cost(0.1),
    ]));
    let probe = Arc::new(ManualConnectivityProbe::new(true));
    let connectivity = Arc::new(ConnectivityMonitor::new(probe.clone()).await);
    connectivity.start().await?;

    let engine = SyncEngine::open(config, kv, remote.clone(), connectivity).await?;

    let mut events = engine.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                SyncEvent::SyncCompleted { pushed, remaining, .. } => {
                    println!("📤 同步完成: 推送 {} 条, 剩余 {} 条", pushed, remaining);
                }
                SyncEvent::ConnectivityChanged { is_online, .. } => {
                    println!("📡 网络: {}", if is_online { "在线" } else { "离线" });
                }
                _ => {}
            }
        }
    });

    // === 2. 首次加载 ===

    engine.refresh(false).await;
    println!("✅ 已加载 {} 个商品\n", engine.merged_view().await.len());

    // === 3. 断网编辑 ===

    probe.set_online(false);
    sleep(Duration::from_millis(50)).await;

    engine
        .save_product(Product::new("TOR-01").with_name("Tornillo 1/4").with_stock(100.0), false)
        .await?;
    engine
        .save_product(Product::new("ARA-03").with_name("Arandela").with_stock(500.0), false)
        .await?;
    engine.delete_product(Product::new("TUE-02")).await;

    println!("状态: {:?}", engine.status().await);
    for product in engine.merged_view().await {
        println!(
            "  {} {} 库存={} {}",
            product.sku,
            product.name,
            product.stock_or_default(),
            if product.pending { "(本地)" } else { "" }
        );
    }
    println!("统计: {:?}\n", engine.stats().await);

    // === 4. 恢复网络，积压达到阈值后自动同步 ===

    probe.set_online(true);
    for _ in 0..50 {
        if engine.pending_count().await == 0 {
            break;
        }
        sleep(Duration::from_millis(20)).await;
    }

    println!("\n状态: {:?}", engine.status().await);
    println!("远端现有 {} 个商品", remote.products().len());

    engine.shutdown();
    Ok(())
}
