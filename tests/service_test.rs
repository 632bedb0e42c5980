#[cfg(feature = "service")]
mod service_tests {
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use pretty_assertions::assert_eq;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tickstats::service::StatsService;
    use tickstats::{Config, StatsEngine, WindowStats};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tower::ServiceExt;

    fn create_test_engine() -> Arc<StatsEngine> {
        let config = Config::from_toml_str(
            r#"
[engine]
max_symbols = 3
buffer_capacity = 1000
max_batch_size = 500
"#,
        )
        .unwrap();
        Arc::new(config.engine_builder().build())
    }

    fn post_batch(symbol: &str, values: &[f64]) -> Request<Body> {
        let body = serde_json::json!({ "symbol": symbol, "values": values });
        Request::builder()
            .method(Method::POST)
            .uri("/add_batch/")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_stats(symbol: &str, k: i64) -> Request<Body> {
        Request::builder()
            .method(Method::GET)
            .uri(format!("/stats/?symbol={}&k={}", symbol, k))
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_configured_limits_apply() {
        let config = Config::from_toml_str(
            r#"
[engine]
max_symbols = 3
max_batch_size = 500
max_symbol_len = 4
"#,
        )
        .unwrap();
        let service = StatsService::from_config(create_test_engine(), &config);
        let app = service.router();

        for symbol in ["A", "B", "C"] {
            let response = app.clone().oneshot(post_batch(symbol, &[1.0])).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app.clone().oneshot(post_batch("D", &[1.0])).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(post_batch("A", &vec![1.0; 501]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let response = app.oneshot(post_batch("LONGX", &[1.0])).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_windows_over_http() {
        let service = StatsService::new(create_test_engine());
        let app = service.router();

        let values: Vec<f64> = (1..=20).map(f64::from).collect();
        let response = app.clone().oneshot(post_batch("AAPL", &values)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.clone().oneshot(get_stats("AAPL", 1)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let stats: WindowStats = serde_json::from_slice(&body).unwrap();
        assert_eq!((stats.min, stats.max, stats.last, stats.avg), (11.0, 20.0, 20.0, 15.5));
        assert!((stats.var - 8.25).abs() < 1e-9);

        let response = app.oneshot(get_stats("AAPL", 8)).await.unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let stats: WindowStats = serde_json::from_slice(&body).unwrap();
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.avg, 10.5);
    }

    #[tokio::test]
    async fn test_missing_query_parameter() {
        let app = StatsService::new(create_test_engine()).router();

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/stats/?symbol=AAPL")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(body["detail"].is_string());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_health_responsive_while_write_waits_for_symbol() {
        let engine = create_test_engine();
        engine.add_batch("AAPL", &[1.0]).unwrap();
        let app = StatsService::new(Arc::clone(&engine)).router();

        // Hold the symbol lock from another thread, as a reader rebuilding the tree would
        let handle = engine.symbol("AAPL").unwrap();
        let (locked_tx, locked_rx) = std::sync::mpsc::channel();
        let holder = std::thread::spawn(move || {
            let guard = handle.lock();
            locked_tx.send(()).unwrap();
            std::thread::sleep(Duration::from_millis(600));
            drop(guard);
        });
        locked_rx.recv().unwrap();

        let started = Instant::now();
        let write = tokio::spawn(app.clone().oneshot(post_batch("AAPL", &[2.0])));
        tokio::time::sleep(Duration::from_millis(20)).await;

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            started.elapsed() < Duration::from_millis(300),
            "health took {:?} while a write was waiting",
            started.elapsed()
        );

        let response = write.await.unwrap().unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        holder.join().unwrap();
        assert_eq!(engine.symbol("AAPL").unwrap().lock().snapshot(), vec![1.0, 2.0]);
    }

    #[tokio::test]
    async fn test_serve_and_graceful_shutdown() {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let addr = SocketAddr::from(([127, 0, 0, 1], port));

        let service = StatsService::new(create_test_engine());
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(service.serve(addr, async move {
            let _ = rx.await;
        }));

        let mut stream = None;
        for _ in 0..50 {
            match tokio::net::TcpStream::connect(addr).await {
                Ok(s) => {
                    stream = Some(s);
                    break;
                }
                Err(_) => tokio::time::sleep(Duration::from_millis(20)).await,
            }
        }
        let mut stream = stream.expect("server did not start listening");

        stream
            .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("\"status\":\"healthy\""));

        tx.send(()).unwrap();
        server.await.unwrap().unwrap();
    }
}
