use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};

use kluster_api::app::services::{self, Background, Overrides};
use kluster_core::UserId;
use kluster_infra::config::AppSettings;
use kluster_notifications::service::OTP_SUBJECT;
use kluster_notifications::{InMemoryMailService, MailService};
use kluster_users::{Claims, JwtSettings};

const SECRET: &str = "black-box-test-secret-with-enough-bytes";
const ISSUER: &str = "kluster";
const AUDIENCE: &str = "kluster-clients";

struct TestServer {
    base_url: String,
    mail: Arc<InMemoryMailService>,
    handle: tokio::task::JoinHandle<()>,
    _background: Background,
}

impl TestServer {
    async fn spawn() -> Self {
        let mut settings = AppSettings::default();
        settings.jwt = JwtSettings {
            secret_key: SECRET.into(),
            issuer: ISSUER.into(),
            audience: AUDIENCE.into(),
            expiry_minutes: 30,
        };
        settings.jobs.poll_interval_ms = 10;

        let mail = Arc::new(InMemoryMailService::new());
        let overrides = Overrides {
            mail: Some(mail.clone() as Arc<dyn MailService>),
            gateway: None,
        };
        let (services, background) = services::build_services(&settings, overrides)
            .await
            .expect("failed to wire services");

        // Same router as prod, bound to an ephemeral port.
        let app = kluster_api::app::build_app(services, &settings.cors);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            mail,
            handle,
            _background: background,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(user_id: &UserId, role: &str, secret: &str) -> String {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        email: "owner@example.com".into(),
        given_name: "Ada".into(),
        family_name: "Lovelace".into(),
        role: role.into(),
        iss: ISSUER.into(),
        aud: AUDIENCE.into(),
        iat: now.timestamp(),
        exp: (now + ChronoDuration::minutes(10)).timestamp(),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

fn business_token() -> String {
    mint_jwt(&UserId::new(), "Business", SECRET)
}

async fn json_body(res: reqwest::Response) -> Value {
    res.json().await.unwrap()
}

async fn create_client(client: &reqwest::Client, srv: &TestServer, token: &str) -> Value {
    let res = client
        .post(srv.url("/api/clients"))
        .bearer_auth(token)
        .json(&json!({
            "firstName": "Grace",
            "lastName": "Hopper",
            "emailAddress": "grace@example.com",
            "address": "1 Harbour Road, Lagos"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    json_body(res).await["data"].clone()
}

async fn create_invoice(client: &reqwest::Client, srv: &TestServer, token: &str, client_id: &str) -> Value {
    let res = client
        .post(srv.url("/api/invoices"))
        .bearer_auth(token)
        .json(&json!({
            "clientId": client_id,
            "dueDate": Utc::now() + ChronoDuration::days(14),
            "items": [
                {"description": "Consulting", "quantity": 2, "unitPrice": 150000},
                {"description": "Travel", "quantity": 1, "unitPrice": 20000}
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    json_body(res).await["data"].clone()
}

async fn wait_for_otp(mail: &InMemoryMailService, to: &str) -> String {
    for _ in 0..200 {
        let otp = mail
            .sent()
            .into_iter()
            .filter(|m| m.subject == OTP_SUBJECT && m.to.iter().any(|t| t == to))
            .find_map(|m| {
                m.body
                    .split("font-weight: bold;\">")
                    .nth(1)
                    .map(|rest| rest.chars().take(6).collect::<String>())
            });
        if let Some(otp) = otp {
            return otp;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("no OTP mail was delivered to {to}");
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/health")).await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body = json_body(res).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "in-memory");
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/api/clients")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(res).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["statusCode"], 401);
    assert_eq!(body["errors"][0]["code"], "Auth.Unauthorized");

    let forged = mint_jwt(&UserId::new(), "Business", "some-other-secret-entirely");
    let res = client
        .get(srv.url("/api/clients"))
        .bearer_auth(forged)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn register_confirm_login_and_profile() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/api/auth/register"))
        .json(&json!({
            "firstName": "Ada",
            "lastName": "Lovelace",
            "emailAddress": "ada@example.com",
            "password": "Secr3t!pass",
            "role": "Business"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let registered = json_body(res).await;
    let user_id = registered["data"]["userId"].as_str().unwrap().to_string();
    assert_eq!(registered["data"]["emailConfirmed"], false);

    let otp = wait_for_otp(&srv.mail, "ada@example.com").await;
    let res = client
        .post(srv.url("/api/auth/confirm-email"))
        .json(&json!({"userId": user_id, "otp": otp}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = client
        .post(srv.url("/api/auth/login"))
        .json(&json!({"emailAddress": "ada@example.com", "password": "Secr3t!pass"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let token = json_body(res).await["data"]["accessToken"].as_str().unwrap().to_string();

    let res = client.get(srv.url("/api/user")).bearer_auth(&token).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let profile = json_body(res).await;
    assert_eq!(profile["success"], true);
    assert_eq!(profile["data"]["email"], "ada@example.com");
    assert_eq!(profile["data"]["emailConfirmed"], true);

    let res = client
        .put(srv.url("/api/user"))
        .bearer_auth(&token)
        .json(&json!({"firstName": "Augusta", "lastName": "King"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = client.get(srv.url("/api/user")).bearer_auth(&token).send().await.unwrap();
    assert_eq!(json_body(res).await["data"]["firstName"], "Augusta");
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    client
        .post(srv.url("/api/auth/register"))
        .json(&json!({
            "firstName": "Alan",
            "lastName": "Turing",
            "emailAddress": "alan@example.com",
            "password": "Enigm4!box",
            "role": "Client"
        }))
        .send()
        .await
        .unwrap();

    let res = client
        .post(srv.url("/api/auth/login"))
        .json(&json!({"emailAddress": "alan@example.com", "password": "Wrong1!pass"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(res).await["success"], false);
}

#[tokio::test]
async fn validation_failures_return_every_error() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/api/auth/register"))
        .json(&json!({
            "firstName": "Al",
            "lastName": "Turing",
            "emailAddress": "not-an-email",
            "password": "weak",
            "role": "Business"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body = json_body(res).await;
    assert_eq!(body["statusCode"], 400);
    let codes: Vec<&str> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["code"].as_str().unwrap())
        .collect();
    assert!(codes.len() >= 3, "{codes:?}");
    assert!(codes.iter().any(|c| c.starts_with("FirstName.")));
    assert!(codes.iter().any(|c| c.starts_with("EmailAddress.")));
    assert!(codes.iter().any(|c| c.starts_with("Password.")));
}

#[tokio::test]
async fn malformed_json_is_request_invalid() {
    let srv = TestServer::spawn().await;
    let res = reqwest::Client::new()
        .post(srv.url("/api/clients"))
        .bearer_auth(business_token())
        .header("content-type", "application/json")
        .body("{\"firstName\": ")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(res).await["errors"][0]["code"], "Request.Invalid");
}

#[tokio::test]
async fn client_lifecycle_create_update_delete() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = business_token();

    let created = create_client(&client, &srv, &token).await;
    let id = created["id"].as_str().unwrap();
    assert!(id.starts_with("C-"));

    let res = client
        .put(srv.url(&format!("/api/clients/{id}")))
        .bearer_auth(&token)
        .json(&json!({
            "firstName": "Grace",
            "lastName": "Murray",
            "emailAddress": "grace@example.com",
            "address": "2 Marina Street, Lagos"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await["data"]["lastName"], "Murray");

    let res = client.get(srv.url("/api/clients")).bearer_auth(&token).send().await.unwrap();
    assert_eq!(json_body(res).await["data"].as_array().unwrap().len(), 1);

    let res = client
        .delete(srv.url(&format!("/api/clients/{id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = client
        .get(srv.url(&format!("/api/clients/{id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(res).await["errors"][0]["code"], "Client.NotFound");
}

#[tokio::test]
async fn product_prices_must_not_be_negative() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = business_token();

    let res = client
        .post(srv.url("/api/products"))
        .bearer_auth(&token)
        .json(&json!({"name": "Widget", "price": -1}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(res).await["errors"][0]["code"], "Product.InvalidPrice");

    let res = client
        .post(srv.url("/api/products"))
        .bearer_auth(&token)
        .json(&json!({"name": "Widget", "description": "A free sample", "price": 0}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let id = json_body(res).await["data"]["id"].as_str().unwrap().to_string();

    let res = client
        .get(srv.url(&format!("/api/products/{id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await["data"]["price"], 0);
}

#[tokio::test]
async fn records_are_invisible_to_other_businesses() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let owner = business_token();
    let stranger = business_token();

    let created = create_client(&client, &srv, &owner).await;
    let id = created["id"].as_str().unwrap();

    let res = client
        .get(srv.url(&format!("/api/clients/{id}")))
        .bearer_auth(&stranger)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client.get(srv.url("/api/clients")).bearer_auth(&stranger).send().await.unwrap();
    assert!(json_body(res).await["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn client_role_cannot_manage_business_records() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(&UserId::new(), "Client", SECRET);

    let res = reqwest::Client::new()
        .get(srv.url("/api/clients"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn invoice_lifecycle_and_status_filter() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = business_token();

    let customer = create_client(&client, &srv, &token).await;
    let invoice = create_invoice(&client, &srv, &token, customer["id"].as_str().unwrap()).await;
    let id = invoice["id"].as_str().unwrap().to_string();
    assert_eq!(invoice["status"], "Pending");
    assert_eq!(invoice["total"], 320000);

    let res = client
        .get(srv.url("/api/invoices?status=pending"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(json_body(res).await["data"].as_array().unwrap().len(), 1);

    let res = client
        .get(srv.url("/api/invoices?status=bogus"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .post(srv.url(&format!("/api/invoices/{id}/cancel")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await["data"]["status"], "Cancelled");

    let res = client
        .get(srv.url("/api/invoices?status=Pending"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert!(json_body(res).await["data"].as_array().unwrap().is_empty());

    let res = client
        .delete(srv.url(&format!("/api/invoices/{id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn verified_payment_marks_the_invoice_paid() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = business_token();

    let customer = create_client(&client, &srv, &token).await;
    let invoice = create_invoice(&client, &srv, &token, customer["id"].as_str().unwrap()).await;
    let invoice_id = invoice["id"].as_str().unwrap().to_string();

    let res = client
        .post(srv.url("/api/payments/initialize"))
        .bearer_auth(&token)
        .json(&json!({"invoiceId": invoice_id, "email": "grace@example.com"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let initialized = json_body(res).await["data"].clone();
    assert_eq!(initialized["amount"], 320000);
    let reference = initialized["reference"].as_str().unwrap().to_string();
    let payment_id = initialized["paymentId"].as_str().unwrap().to_string();

    let res = client
        .get(srv.url(&format!("/api/payments/verify/{reference}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await["data"]["status"], "Successful");

    let res = client
        .get(srv.url(&format!("/api/payments/{payment_id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // The invoice is settled by the PaymentCompleted consumer.
    let mut status = Value::Null;
    for _ in 0..200 {
        let res = client
            .get(srv.url(&format!("/api/invoices/{invoice_id}")))
            .bearer_auth(&token)
            .send()
            .await
            .unwrap();
        status = json_body(res).await["data"]["status"].clone();
        if status == "Paid" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(status, "Paid");
}
