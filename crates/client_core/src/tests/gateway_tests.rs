use super::*;
use axum::{extract::Path, http::StatusCode, routing::get, Json, Router};
use serde_json::{json, Value};
use shared::error::FetchFailureKind;
use tokio::net::TcpListener;

fn launch_json(id: &str, name: &str, rocket: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "date_utc": "2020-03-18T12:16:00.000Z",
        "success": true,
        "rocket": rocket,
        "failures": [],
        "cores": [{"core": "c1", "reused": true, "landing_success": true, "landing_type": "ASDS"}],
        "links": {"patch": {"small": null, "large": null}, "webcast": null, "article": null, "wikipedia": null}
    })
}

fn spacex_api() -> Router {
    Router::new()
        .route(
            "/v4/launches",
            get(|| async {
                Json(json!([
                    launch_json("l1", "Starlink-5", "r1"),
                    launch_json("l2", "CRS-20", "r1"),
                ]))
            }),
        )
        .route(
            "/v4/launches/:id",
            get(|Path(id): Path<String>| async move {
                if id == "l1" {
                    Ok(Json(launch_json("l1", "Starlink-5", "r1")))
                } else {
                    Err(StatusCode::NOT_FOUND)
                }
            }),
        )
        .route(
            "/v4/rockets/:id",
            get(|Path(id): Path<String>| async move {
                match id.as_str() {
                    "r1" => (
                        StatusCode::OK,
                        json!({
                            "id": "r1",
                            "name": "Falcon 9",
                            "height": {"meters": 70, "feet": 229.6},
                            "mass": {"kg": 549054, "lb": 1207920},
                            "description": "Two-stage rocket"
                        })
                        .to_string(),
                    ),
                    "truncated" => (StatusCode::OK, r#"{"id":"truncated","name":"#.to_string()),
                    "slow" => {
                        tokio::time::sleep(Duration::from_secs(2)).await;
                        (StatusCode::OK, "{}".to_string())
                    }
                    _ => (StatusCode::INTERNAL_SERVER_ERROR, "boom".to_string()),
                }
            }),
        )
}

async fn spawn_api(app: Router) -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

fn gateway(base_url: String) -> HttpGateway {
    HttpGateway::new(&GatewayOptions {
        base_url,
        request_timeout: Some(Duration::from_millis(500)),
    })
    .expect("gateway")
}

#[tokio::test]
async fn fetches_launch_collection() {
    let base = spawn_api(spacex_api()).await;
    let launches = gateway(format!("{base}/v4"))
        .fetch_launches()
        .await
        .expect("launches");
    let names: Vec<_> = launches.iter().map(|launch| launch.name.as_str()).collect();
    assert_eq!(names, vec!["Starlink-5", "CRS-20"]);
    assert_eq!(launches[0].cores[0].landing_type.as_deref(), Some("ASDS"));
}

#[tokio::test]
async fn fetches_single_launch_and_its_rocket() {
    let base = spawn_api(spacex_api()).await;
    let gateway = gateway(format!("{base}/v4/"));
    let launch = gateway
        .fetch_launch(&LaunchId::from("l1"))
        .await
        .expect("launch");
    let rocket = gateway.fetch_rocket(&launch.rocket).await.expect("rocket");
    assert_eq!(rocket.name, "Falcon 9");
    assert_eq!(rocket.height_meters(), Some(70.0));
}

#[tokio::test]
async fn missing_launch_maps_to_http_status_failure() {
    let base = spawn_api(spacex_api()).await;
    let err = gateway(format!("{base}/v4"))
        .fetch_launch(&LaunchId::from("nope"))
        .await
        .expect_err("must fail");
    assert_eq!(err.resource, Resource::Launches);
    assert_eq!(err.id.as_deref(), Some("nope"));
    assert_eq!(err.kind, FetchFailureKind::HttpStatus(404));
}

#[tokio::test]
async fn server_error_on_rocket_keeps_rocket_id() {
    let base = spawn_api(spacex_api()).await;
    let err = gateway(format!("{base}/v4"))
        .fetch_rocket(&RocketId::from("r9"))
        .await
        .expect_err("must fail");
    assert_eq!(err.resource, Resource::Rockets);
    assert_eq!(err.id.as_deref(), Some("r9"));
    assert_eq!(err.kind, FetchFailureKind::HttpStatus(500));
}

#[tokio::test]
async fn truncated_body_is_decode_failure() {
    let base = spawn_api(spacex_api()).await;
    let err = gateway(format!("{base}/v4"))
        .fetch_rocket(&RocketId::from("truncated"))
        .await
        .expect_err("must fail");
    assert_eq!(err.kind, FetchFailureKind::Decode);
}

#[tokio::test]
async fn collection_with_wrong_shape_is_decode_failure() {
    let app = Router::new().route(
        "/launches",
        get(|| async { Json(json!({"docs": [], "totalDocs": 0})) }),
    );
    let base = spawn_api(app).await;
    let err = gateway(base)
        .fetch_launches()
        .await
        .expect_err("must fail");
    assert_eq!(err.resource, Resource::Launches);
    assert_eq!(err.id, None);
    assert_eq!(err.kind, FetchFailureKind::Decode);
}

#[tokio::test]
async fn unreachable_server_is_network_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let err = gateway(format!("http://{addr}"))
        .fetch_launches()
        .await
        .expect_err("must fail");
    assert_eq!(err.kind, FetchFailureKind::Network);
}

#[tokio::test]
async fn request_timeout_is_network_failure() {
    let base = spawn_api(spacex_api()).await;
    let err = gateway(format!("{base}/v4"))
        .fetch_rocket(&RocketId::from("slow"))
        .await
        .expect_err("must time out");
    assert_eq!(err.kind, FetchFailureKind::Network);
}

#[test]
fn endpoint_keeps_base_path_and_encodes_ids() {
    let gateway = gateway("https://api.example.com/v4/".to_string());
    assert_eq!(
        gateway
            .endpoint(Resource::Launches, None)
            .expect("url")
            .as_str(),
        "https://api.example.com/v4/launches"
    );
    assert_eq!(
        gateway
            .endpoint(Resource::Rockets, Some("a b/c"))
            .expect("url")
            .as_str(),
        "https://api.example.com/v4/rockets/a%20b%2Fc"
    );
}

#[test]
fn rejects_unusable_base_urls() {
    assert!(parse_base_url("not a url").is_err());
    assert!(parse_base_url("mailto:ops@example.com").is_err());
    assert!(parse_base_url(" https://api.spacexdata.com/v4 ").is_ok());
}
