use std::sync::{Arc, Mutex};

use camino::Utf8Path;
use mc_connect::{Lidarr, MediaOwner, OwnerError, OwnerRegistry, Radarr, Sonarr};
use mc_core::{OwnerConfig, OwnerKind, PathMapping};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
struct Recorded {
    method: String,
    target: String,
    api_key: Option<String>,
    body: String,
}

type Router = Arc<dyn Fn(&str, &str) -> (u16, String) + Send + Sync>;

/// A tiny HTTP/1.1 server answering from `router` and recording every request.
struct StubServer {
    port: u16,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl StubServer {
    async fn start(router: Router) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&requests);
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let router = Arc::clone(&router);
                let log = Arc::clone(&log);
                tokio::spawn(async move {
                    let (read, mut write) = stream.into_split();
                    let mut reader = BufReader::new(read);
                    // Keep-alive: serve requests until the client hangs up.
                    while let Some(request) = read_request(&mut reader).await {
                        let path = request.target.split('?').next().unwrap_or_default().to_owned();
                        let (status, body) = router(&request.method, &path);
                        log.lock().unwrap().push(request);
                        let response = format!(
                            "HTTP/1.1 {status} STUB\r\ncontent-type: application/json\r\ncontent-length: {}\r\n\r\n{body}",
                            body.len()
                        );
                        if write.write_all(response.as_bytes()).await.is_err() {
                            return;
                        }
                    }
                });
            }
        });

        Self { port, requests }
    }

    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    fn owner_config(&self, name: &str, service: OwnerKind) -> OwnerConfig {
        OwnerConfig {
            name: name.to_owned(),
            service,
            address: "127.0.0.1".to_owned(),
            port: self.port,
            api_key: "secret".to_owned(),
            mappings: vec![PathMapping {
                manager: "/tv/".to_owned(),
                local: "/mnt/media/tv/".to_owned(),
            }],
            ..OwnerConfig::default()
        }
    }
}

async fn read_request<R: AsyncBufReadExt + Unpin>(reader: &mut R) -> Option<Recorded> {
    let mut line = String::new();
    if reader.read_line(&mut line).await.ok()? == 0 {
        return None;
    }
    let mut parts = line.split_whitespace();
    let method = parts.next()?.to_owned();
    let target = parts.next()?.to_owned();

    let mut content_length = 0;
    let mut api_key = None;
    loop {
        let mut header = String::new();
        reader.read_line(&mut header).await.ok()?;
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            let value = value.trim();
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.parse().ok()?;
            } else if name.eq_ignore_ascii_case("x-api-key") {
                api_key = Some(value.to_owned());
            }
        }
    }

    let mut body = vec![0; content_length];
    reader.read_exact(&mut body).await.ok()?;
    Some(Recorded {
        method,
        target,
        api_key,
        body: String::from_utf8(body).ok()?,
    })
}

fn sonarr_router() -> Router {
    Arc::new(|method: &str, path: &str| {
        let body = match (method, path) {
            ("GET", "/api/v3/system/status") => r#"{"version":"4.0.1.929"}"#,
            ("GET", "/api/v3/rootfolder") => r#"[{"id":1,"path":"/tv/"}]"#,
            ("GET", "/api/v3/series") => {
                r#"[{"id":3,"path":"/tv/Other Show"},{"id":7,"path":"/tv/Show"}]"#
            }
            ("GET", "/api/v3/episodefile") => {
                r#"[{"id":41,"path":"/tv/Show/S01E02.mkv"},{"id":42,"path":"/tv/Show/S01E01.mkv"}]"#
            }
            ("DELETE", "/api/v3/episodefile/42") => "{}",
            ("POST", "/api/v3/command") => r#"{"id":1}"#,
            _ => return (404, "{}".to_owned()),
        };
        (200, body.to_owned())
    })
}

#[tokio::test]
async fn test_sonarr_connect_claim_and_remove() {
    let server = StubServer::start(sonarr_router()).await;
    let sonarr = Sonarr::from_config(&server.owner_config("tv", OwnerKind::Sonarr)).unwrap();

    let status = sonarr.connect().await.unwrap();
    assert_eq!(status.version, "4.0.1.929");

    let path = Utf8Path::new("/mnt/media/tv/Show/S01E01.mkv");
    assert!(sonarr.claims(path).await.unwrap());
    assert!(!sonarr.claims(Utf8Path::new("/mnt/media/movies/Film.mkv")).await.unwrap());

    assert!(sonarr.remove_and_research(path).await.unwrap());

    let requests = server.requests();
    assert!(requests.iter().all(|r| r.api_key.as_deref() == Some("secret")));

    let tail: Vec<(&str, &str)> = requests
        .iter()
        .skip_while(|r| r.target != "/api/v3/series")
        .map(|r| (r.method.as_str(), r.target.as_str()))
        .collect();
    assert_eq!(
        tail,
        [
            ("GET", "/api/v3/series"),
            ("GET", "/api/v3/episodefile?seriesId=7"),
            ("DELETE", "/api/v3/episodefile/42"),
            ("POST", "/api/v3/command"),
            ("POST", "/api/v3/command"),
        ]
    );

    let commands: Vec<serde_json::Value> = requests
        .iter()
        .filter(|r| r.method == "POST")
        .map(|r| serde_json::from_str(&r.body).unwrap())
        .collect();
    assert_eq!(
        commands,
        [
            serde_json::json!({"name": "RescanSeries", "seriesId": 7}),
            serde_json::json!({"name": "SeriesSearch", "seriesId": 7}),
        ]
    );
}

#[tokio::test]
async fn test_failed_command_after_delete_still_counts_as_removed() {
    let base = sonarr_router();
    let server = StubServer::start(Arc::new(move |method: &str, path: &str| match (method, path) {
        ("POST", "/api/v3/command") => (500, r#"{"message":"queue full"}"#.to_owned()),
        _ => base(method, path),
    }))
    .await;
    let sonarr = Sonarr::from_config(&server.owner_config("tv", OwnerKind::Sonarr)).unwrap();

    let removed = sonarr
        .remove_and_research(Utf8Path::new("/mnt/media/tv/Show/S01E01.mkv"))
        .await
        .unwrap();
    assert!(removed);

    // Both commands are still attempted.
    let requests = server.requests();
    assert!(requests.iter().any(|r| r.method == "DELETE"));
    assert_eq!(requests.iter().filter(|r| r.method == "POST").count(), 2);
}

#[tokio::test]
async fn test_radarr_failed_command_after_delete_still_counts_as_removed() {
    let server = StubServer::start(Arc::new(|method: &str, path: &str| match (method, path) {
        ("GET", "/api/v3/movie") => (
            200,
            r#"[{"id":5,"path":"/tv/Film","hasFile":true,"movieFile":{"id":50}}]"#.to_owned(),
        ),
        ("DELETE", "/api/v3/moviefile/50") => (200, "{}".to_owned()),
        ("POST", "/api/v3/command") => (500, "{}".to_owned()),
        _ => (404, "{}".to_owned()),
    }))
    .await;
    let radarr = Radarr::from_config(&server.owner_config("movies", OwnerKind::Radarr)).unwrap();

    let removed = radarr
        .remove_and_research(Utf8Path::new("/mnt/media/tv/Film/film.mkv"))
        .await
        .unwrap();
    assert!(removed);
    assert_eq!(server.requests().iter().filter(|r| r.method == "POST").count(), 2);
}

#[tokio::test]
async fn test_failed_delete_is_an_error() {
    let base = sonarr_router();
    let server = StubServer::start(Arc::new(move |method: &str, path: &str| match method {
        "DELETE" => (500, "{}".to_owned()),
        _ => base(method, path),
    }))
    .await;
    let sonarr = Sonarr::from_config(&server.owner_config("tv", OwnerKind::Sonarr)).unwrap();

    let result = sonarr
        .remove_and_research(Utf8Path::new("/mnt/media/tv/Show/S01E01.mkv"))
        .await;
    assert!(result.is_err());
    assert!(server.requests().iter().all(|r| r.method != "POST"));
}

#[tokio::test]
async fn test_sonarr_without_matching_episode_file_returns_false() {
    let server = StubServer::start(sonarr_router()).await;
    let sonarr = Sonarr::from_config(&server.owner_config("tv", OwnerKind::Sonarr)).unwrap();

    let removed = sonarr
        .remove_and_research(Utf8Path::new("/mnt/media/tv/Show/S09E09.mkv"))
        .await
        .unwrap();
    assert!(!removed);
    assert!(server.requests().iter().all(|r| r.method == "GET"));
}

#[tokio::test]
async fn test_lidarr_unknown_artist_returns_false() {
    let server = StubServer::start(Arc::new(|method: &str, path: &str| match (method, path) {
        ("GET", "/api/v1/artist") => (200, "[]".to_owned()),
        _ => (404, "{}".to_owned()),
    }))
    .await;
    let lidarr = Lidarr::from_config(&server.owner_config("music", OwnerKind::Lidarr)).unwrap();

    let removed = lidarr
        .remove_and_research(Utf8Path::new("/mnt/media/music/Artist/01.flac"))
        .await
        .unwrap();
    assert!(!removed);
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn test_rejected_api_key_is_a_request_error() {
    let server = StubServer::start(Arc::new(|_: &str, _: &str| (401, "{}".to_owned()))).await;
    let sonarr = Sonarr::from_config(&server.owner_config("tv", OwnerKind::Sonarr)).unwrap();

    let err = sonarr.connect().await.unwrap_err();
    assert!(matches!(err, OwnerError::Request { .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_registry_connect_all_against_live_and_dead_services() {
    let live = StubServer::start(sonarr_router()).await;
    let dead = StubServer::start(Arc::new(|_: &str, _: &str| (500, "{}".to_owned()))).await;

    let mut registry = OwnerRegistry::from_config(&[
        dead.owner_config("movies", OwnerKind::Radarr),
        live.owner_config("tv", OwnerKind::Sonarr),
    ])
    .unwrap();
    let reports = registry.connect_all().await;

    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].name, "tv");
    assert!(reports[0].result.is_ok());
    assert!(reports[1].result.is_err());
    let names: Vec<&str> = registry.iter().map(|o| o.name()).collect();
    assert_eq!(names, ["tv"]);
}
