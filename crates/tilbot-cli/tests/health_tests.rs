use tilbot_cli::health;
use tokio::sync::oneshot;

async fn get(url: &str) -> (u16, String) {
    let response = reqwest::get(url).await.unwrap();
    let status = response.status().as_u16();
    (status, response.text().await.unwrap())
}

#[tokio::test]
async fn test_root_and_health_report_alive() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, health::router()).await.unwrap();
    });

    assert_eq!(get(&format!("http://{addr}/")).await, (200, "alive".to_string()));
    assert_eq!(get(&format!("http://{addr}/health")).await, (200, "alive".to_string()));
    assert_eq!(get(&format!("http://{addr}/missing")).await.0, 404);
}

#[tokio::test]
async fn test_serve_stops_on_shutdown() {
    let (tx, rx) = oneshot::channel::<()>();
    let server = tokio::spawn(health::serve("127.0.0.1:0", async move {
        let _ = rx.await;
    }));

    tx.send(()).unwrap();
    let result = tokio::time::timeout(std::time::Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
}
