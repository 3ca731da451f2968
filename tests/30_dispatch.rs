mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn status_route_dispatches_with_negotiated_language() -> Result<()> {
    let app = common::build()?;
    let base = common::spawn(app.router).await?;
    let client = reqwest::Client::new();

    let res = client.get(format!("{}/de/api/status", base)).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-language"], "de");
    assert!(common::session_cookie(&res).is_some(), "new sessions get a cookie");

    let body = res.json::<Value>().await?;
    let status = &body["/de/api/status"];
    assert_eq!(status["site"], "Orange Integration");
    assert_eq!(status["language"], "de");
    assert_eq!(status["account"], 0);
    assert_eq!(status["modules"], json!(["Core"]));
    assert!(status["csrf"].is_string());
    Ok(())
}

#[tokio::test]
async fn unsupported_language_falls_back() -> Result<()> {
    let app = common::build()?;
    let base = common::spawn(app.router).await?;

    let res = reqwest::get(format!("{}/fr/news", base)).await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-language"], "en");
    Ok(())
}

#[tokio::test]
async fn unmatched_path_is_not_found_keyed_by_uri() -> Result<()> {
    let app = common::build()?;
    let base = common::spawn(app.router).await?;

    let res = reqwest::get(format!("{}/en/nowhere?x=1", base)).await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(res.json::<Value>().await?, json!({"/en/nowhere?x=1": ""}));
    Ok(())
}

#[tokio::test]
async fn verb_mismatch_is_not_found() -> Result<()> {
    let app = common::build()?;
    let base = common::spawn(app.router).await?;

    let res = reqwest::Client::new().delete(format!("{}/en/news", base)).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn body_fields_reach_the_handler() -> Result<()> {
    let app = common::build()?;
    let base = common::spawn(app.router).await?;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/en/news", base))
        .json(&json!({"id": 7}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await?["/en/news"]["item"], "7");

    let res = client
        .post(format!("{}/en/news", base))
        .header("content-type", "application/x-www-form-urlencoded")
        .body("id=8")
        .send()
        .await?;
    assert_eq!(res.json::<Value>().await?["/en/news"]["item"], "8");
    Ok(())
}

#[tokio::test]
async fn forged_csrf_is_forbidden() -> Result<()> {
    let app = common::build()?;
    let base = common::spawn(app.router).await?;
    let client = reqwest::Client::new();

    let res = client.get(format!("{}/en/api/status", base)).send().await?;
    let cookie = common::session_cookie(&res).expect("session cookie");

    let res = client
        .post(format!("{}/en/news", base))
        .header("cookie", &cookie)
        .form(&[("CSRF", "forged")])
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(res.json::<Value>().await?["code"], "FORBIDDEN");
    Ok(())
}

#[tokio::test]
async fn matching_csrf_passes() -> Result<()> {
    let app = common::build()?;
    let base = common::spawn(app.router).await?;
    let client = reqwest::Client::new();

    let res = client.get(format!("{}/en/api/status", base)).send().await?;
    let cookie = common::session_cookie(&res).expect("session cookie");
    let token = res.json::<Value>().await?["/en/api/status"]["csrf"]
        .as_str()
        .unwrap_or_default()
        .to_string();

    let res = client
        .post(format!("{}/en/news", base))
        .header("cookie", &cookie)
        .form(&[("CSRF", token.as_str())])
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(common::session_cookie(&res).is_none(), "known sessions are not reissued");
    Ok(())
}
