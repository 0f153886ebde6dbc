mod common;

use std::fs;
use std::time::Duration;

use common::{serve, Canned};
use qn_publish::upload::{Credentials, QiniuClient, Zone};
use qn_publish_core::contract::{PutExtra, Uploader};
use qn_publish_core::progress::NoProgress;
use qn_publish_core::publish::publish;
use qn_publish_core::{CandidateFile, PublishError, PublishOptions, UploadError};
use tempfile::tempdir;

fn fixed_client(base_url: &str) -> QiniuClient {
    QiniuClient::new(
        Credentials::new("ak", "sk"),
        "assets",
        Zone::Fixed {
            up_host: base_url.to_string(),
        },
    )
    .expect("client should build")
}

#[tokio::test]
async fn put_file_posts_multipart_form() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("app.js");
    fs::write(&path, "console.log('hello qiniu')").unwrap();

    let (base_url, server) = serve(vec![Canned::json(
        200,
        r#"{"hash":"FhHash","key":"v1/app.js","fsize":26}"#,
    )])
    .await;
    let client = fixed_client(&base_url);

    let token = client.upload_token("assets:v1/app.js").unwrap();
    let mut extra = PutExtra {
        mime_type: Some("application/javascript".into()),
        ..Default::default()
    };
    extra.params.insert("build".into(), "42".into());

    let response = client
        .put_file(&token, "v1/app.js", &path, &extra)
        .await
        .expect("upload should succeed");

    assert_eq!(response.hash, "FhHash");
    assert_eq!(response.key, "v1/app.js");
    assert_eq!(response.extra.get("fsize"), Some(&serde_json::json!(26)));

    let requests = server.await.unwrap();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert!(request.request_line.starts_with("POST / "), "{}", request.request_line);
    assert!(request.head.to_ascii_lowercase().contains("multipart/form-data"));

    let body = request.body_text();
    assert!(body.contains(r#"name="token""#));
    assert!(body.contains(token.as_str()));
    assert!(body.contains(r#"name="key""#));
    assert!(body.contains("v1/app.js"));
    assert!(body.contains(r#"name="x:build""#));
    assert!(body.contains(r#"filename="app.js""#));
    assert!(body.contains("application/javascript"));
    assert!(body.contains("console.log('hello qiniu')"));
}

#[tokio::test]
async fn provider_error_message_is_extracted() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.js");
    fs::write(&path, "a").unwrap();

    let (base_url, _server) =
        serve(vec![Canned::json(401, r#"{"error":"bad token"}"#)]).await;
    let client = fixed_client(&base_url);
    let token = client.upload_token("assets:a.js").unwrap();

    let err = client
        .put_file(&token, "a.js", &path, &PutExtra::default())
        .await
        .unwrap_err();

    match err {
        UploadError::Provider { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "bad token");
        }
        other => panic!("expected provider error, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_local_file_is_an_io_error() {
    let (base_url, _server) = serve(vec![]).await;
    let client = fixed_client(&base_url);
    let token = client.upload_token("assets:gone.js").unwrap();

    let err = client
        .put_file(
            &token,
            "gone.js",
            std::path::Path::new("/definitely/not/here/gone.js"),
            &PutExtra::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, UploadError::Io(_)));
}

#[tokio::test]
async fn stalled_transfer_times_out() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.js");
    fs::write(&path, "a").unwrap();

    let (base_url, server) = common::stall().await;
    let client = QiniuClient::with_timeout(
        Credentials::new("ak", "sk"),
        "assets",
        Zone::Fixed { up_host: base_url },
        Duration::from_millis(300),
    )
    .unwrap();
    let token = client.upload_token("assets:a.js").unwrap();

    let err = tokio::time::timeout(
        Duration::from_secs(10),
        client.put_file(&token, "a.js", &path, &PutExtra::default()),
    )
    .await
    .expect("request timeout must fire first")
    .unwrap_err();

    assert!(matches!(err, UploadError::Transport(_)), "got {err:?}");
    server.abort();
}

#[tokio::test]
async fn auto_zone_queries_once_then_uploads() {
    let dir = tempdir().unwrap();
    let first = dir.path().join("a.js");
    let second = dir.path().join("b.js");
    fs::write(&first, "a").unwrap();
    fs::write(&second, "b").unwrap();

    // The zone answer points back at the same responder.
    let (listener, base_url) = common::bind().await;
    let zone = format!(r#"{{"ttl":86400,"up":{{"acc":{{"main":["{base_url}"]}}}}}}"#);
    let server = common::respond(
        listener,
        vec![
            Canned::json(200, &zone),
            Canned::json(200, r#"{"hash":"h1","key":"a.js"}"#),
            Canned::json(200, r#"{"hash":"h2","key":"b.js"}"#),
        ],
    );
    let client = QiniuClient::new(
        Credentials::new("ak", "sk"),
        "assets",
        Zone::Auto {
            uc_host: base_url.clone(),
        },
    )
    .unwrap();

    assert_eq!(client.up_host().await.unwrap(), base_url);

    for (path, key) in [(&first, "a.js"), (&second, "b.js")] {
        let token = client.upload_token(&format!("assets:{key}")).unwrap();
        client
            .put_file(&token, key, path, &PutExtra::default())
            .await
            .expect("upload should succeed");
    }

    let requests = server.await.unwrap();
    assert_eq!(requests.len(), 3);
    assert!(requests[0]
        .request_line
        .starts_with("GET /v2/query?ak=ak&bucket=assets"));
    assert!(requests[1].request_line.starts_with("POST /"));
    assert!(requests[2].request_line.starts_with("POST /"));
}

#[tokio::test]
async fn publish_end_to_end_through_qiniu_client() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.js"), "a").unwrap();
    fs::write(dir.path().join("b.js"), "b").unwrap();
    fs::write(dir.path().join("a.js.map"), "{}").unwrap();

    let (base_url, server) = serve(vec![
        Canned::json(200, r#"{"hash":"h","key":"k"}"#),
        Canned::json(200, r#"{"hash":"h","key":"k"}"#),
    ])
    .await;
    let client = fixed_client(&base_url);

    let mut config = qn_publish_core::PublishConfig::new("assets");
    config.path = "v1-[hash:8]".into();
    config.exclude = Some(qn_publish_core::PatternSpec::Regex(r"\.map$".into()));
    let options = PublishOptions::from_config(&config).unwrap();

    let assets = vec![
        CandidateFile::new("a.js", true, dir.path().join("a.js")),
        CandidateFile::new("b.js", true, dir.path().join("b.js")),
        CandidateFile::new("a.js.map", true, dir.path().join("a.js.map")),
    ];

    let report = publish(&client, &options, &assets, Some("abcdef1234567890"), &NoProgress)
        .await
        .expect("publish should succeed");
    assert_eq!(report.uploaded(), 2);

    let requests = server.await.unwrap();
    let bodies: Vec<String> = requests.iter().map(|r| r.body_text()).collect();
    assert!(bodies.iter().any(|b| b.contains("v1-abcdef12/a.js")));
    assert!(bodies.iter().any(|b| b.contains("v1-abcdef12/b.js")));
    assert!(bodies.iter().all(|b| !b.contains("a.js.map")));
}

#[tokio::test]
async fn publish_without_hash_fails_before_contacting_provider() {
    let (base_url, server) = serve(vec![]).await;
    let client = fixed_client(&base_url);
    let options = PublishOptions::new("assets");

    let err = publish(
        &client,
        &options,
        &[CandidateFile::new("a.js", true, "/nowhere/a.js")],
        None,
        &NoProgress,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, PublishError::Configuration { .. }));
    assert!(server.await.unwrap().is_empty());
}
