use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::json;

use chancery_auth::Claims;
use chancery_core::{StaffRole, UserId};

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(jwt_secret: &str) -> Self {
        // Same router as prod, bound to an ephemeral port.
        let app = chancery_api::app::build_app(jwt_secret.to_string()).await;
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(jwt_secret: &str, sub: UserId, name: &str, role: StaffRole) -> String {
    let now = Utc::now();
    let claims = Claims::new(sub, name, role, now - ChronoDuration::minutes(1), now + ChronoDuration::minutes(10));

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

/// Poll a read endpoint until the projection behind it catches up with the
/// command path, then return the body.
async fn get_json_eventually(
    client: &reqwest::Client,
    url: &str,
    token: &str,
    ready: impl Fn(&serde_json::Value) -> bool,
) -> serde_json::Value {
    for _ in 0..100 {
        let res = client.get(url).bearer_auth(token).send().await.unwrap();
        if res.status() == StatusCode::OK {
            let body: serde_json::Value = res.json().await.unwrap();
            if ready(&body) {
                return body;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("read model did not converge within timeout: {url}");
}

async fn error_code(res: reqwest::Response) -> String {
    let body: serde_json::Value = res.json().await.unwrap();
    body["error"]["code"].as_str().unwrap_or_default().to_string()
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/whoami", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(format!("{}/whoami", srv.base_url))
        .bearer_auth("not.a.token")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Health stays open for probes.
    let res = client
        .get(format!("{}/health", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn whoami_reflects_token_claims() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let user_id = UserId::new();
    let token = mint_jwt(jwt_secret, user_id, "Nadia Haddad", StaffRole::Lawyer);

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/whoami", srv.base_url))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["user_id"].as_str().unwrap(), user_id.to_string());
    assert_eq!(body["role"].as_str().unwrap(), "lawyer");
}

#[tokio::test]
async fn role_without_capability_is_forbidden() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let token = mint_jwt(jwt_secret, UserId::new(), "Samir Accountant", StaffRole::Accountant);
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/cases", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({
            "client": uuid::Uuid::now_v7().to_string(),
            "case_type": "civil",
            "title": "Haddad v. Port Authority",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(error_code(res).await, "forbidden");
}

#[tokio::test]
async fn case_lifecycle_over_http() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let client = reqwest::Client::new();

    let director = mint_jwt(jwt_secret, UserId::new(), "Omar Director", StaffRole::Director);

    // Register the lawyer and the reviewer so assignment passes the
    // directory check.
    let lawyer_id = UserId::new();
    let approver_id = UserId::new();
    for (id, name, role) in [
        (lawyer_id, "Nadia Haddad", "lawyer"),
        (approver_id, "Rania Khoury", "approving_lawyer"),
    ] {
        let res = client
            .post(format!("{}/staff", srv.base_url))
            .bearer_auth(&director)
            .json(&json!({
                "staff_id": id.to_string(),
                "email": format!("{name}@chancery.example").replace(' ', "."),
                "display_name": name,
                "role": role,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
    }
    get_json_eventually(&client, &format!("{}/staff", srv.base_url), &director, |body| {
        body["items"].as_array().is_some_and(|items| items.len() == 2)
    })
    .await;

    // Open the case.
    let res = client
        .post(format!("{}/cases", srv.base_url))
        .bearer_auth(&director)
        .json(&json!({
            "client": uuid::Uuid::now_v7().to_string(),
            "case_type": "commercial",
            "title": "Haddad v. Port Authority",
            "court": "Commercial Court, Chamber 3",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    let case_id = body["id"].as_str().unwrap().to_string();
    let case_url = format!("{}/cases/{}", srv.base_url, case_id);

    let case = get_json_eventually(&client, &case_url, &director, |_| true).await;
    assert_eq!(case["status"], "draft");
    let case_number = case["case_number"].as_str().unwrap();
    assert!(
        case_number.starts_with("C-") && case_number.ends_with("-00001"),
        "unexpected case number {case_number}"
    );

    // Assign and accept.
    let res = client
        .post(format!("{case_url}/assign-lawyer"))
        .bearer_auth(&director)
        .json(&json!({
            "lawyer": lawyer_id.to_string(),
            "approving_lawyer": approver_id.to_string(),
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let lawyer = mint_jwt(jwt_secret, lawyer_id, "Nadia Haddad", StaffRole::Lawyer);
    let res = client
        .post(format!("{case_url}/accept"))
        .bearer_auth(&lawyer)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // Memorandum: submitted by the assigned lawyer, approved by the designee.
    let res = client
        .post(format!("{case_url}/stages/0/memorandum"))
        .bearer_auth(&lawyer)
        .json(&json!({
            "content": "Defense memorandum, first instance.",
            "file": "s3://chancery/memoranda/first-instance.pdf",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let approver = mint_jwt(jwt_secret, approver_id, "Rania Khoury", StaffRole::ApprovingLawyer);
    let res = client
        .post(format!("{case_url}/stages/0/memorandum/approve"))
        .bearer_auth(&approver)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // Filing before the director signs is refused by the lifecycle.
    let res = client
        .post(format!("{case_url}/stages/0/submit-to-court"))
        .bearer_auth(&lawyer)
        .json(&json!({"proof": "s3://chancery/filings/receipt.pdf"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_code(res).await, "signature_required");

    let res = client
        .post(format!("{case_url}/signature"))
        .bearer_auth(&director)
        .json(&json!({"file": "s3://chancery/signatures/case.pdf"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .post(format!("{case_url}/stages/0/submit-to-court"))
        .bearer_auth(&lawyer)
        .json(&json!({"proof": "s3://chancery/filings/receipt.pdf"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let case = get_json_eventually(&client, &case_url, &director, |body| {
        body["status"] == "submitted"
    })
    .await;
    assert_eq!(case["stages"][0]["status"], "submitted");

    // The activity feed saw the whole thing.
    let feed = get_json_eventually(
        &client,
        &format!("{case_url}/activity"),
        &director,
        |body| body["items"].as_array().is_some_and(|items| !items.is_empty()),
    )
    .await;
    assert!(
        feed["items"]
            .as_array()
            .unwrap()
            .iter()
            .any(|e| e["action"] == "case.submitted_to_court")
    );
}

#[tokio::test]
async fn invoice_payments_reconcile_over_http() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let client = reqwest::Client::new();

    let accountant = mint_jwt(jwt_secret, UserId::new(), "Samir Accountant", StaffRole::Accountant);

    let res = client
        .post(format!("{}/invoices", srv.base_url))
        .bearer_auth(&accountant)
        .json(&json!({
            "client": uuid::Uuid::now_v7().to_string(),
            "total_amount": "1000",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    let invoice_id = body["id"].as_str().unwrap().to_string();
    let invoice_url = format!("{}/invoices/{}", srv.base_url, invoice_id);

    let res = client
        .post(format!("{invoice_url}/payments"))
        .bearer_auth(&accountant)
        .json(&json!({"amount": "400", "method": {"kind": "cash"}}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    let receipt_number = body["receipt_number"].as_str().unwrap();
    assert!(
        receipt_number.starts_with("RCT-") && receipt_number.ends_with("-000001"),
        "unexpected receipt number {receipt_number}"
    );

    // More than the remainder is rejected outright.
    let res = client
        .post(format!("{invoice_url}/payments"))
        .bearer_auth(&accountant)
        .json(&json!({"amount": "700", "method": {"kind": "cash"}}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_code(res).await, "overpayment_rejected");

    let res = client
        .post(format!("{invoice_url}/payments"))
        .bearer_auth(&accountant)
        .json(&json!({
            "amount": "600",
            "method": {"kind": "bank_transfer", "reference": "TRX-889"},
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let invoice = get_json_eventually(&client, &invoice_url, &accountant, |body| {
        body["status"] == "paid"
    })
    .await;
    assert_eq!(invoice["paid_amount"], "1000");
    assert_eq!(invoice["remaining_amount"], "0");

    let receipts = get_json_eventually(
        &client,
        &format!("{}/payments", srv.base_url),
        &accountant,
        |body| body["items"].as_array().is_some_and(|items| items.len() == 2),
    )
    .await;
    assert!(
        receipts["items"]
            .as_array()
            .unwrap()
            .iter()
            .all(|r| r["invoice_id"] == invoice_id.as_str())
    );
}

#[tokio::test]
async fn deactivated_staff_token_is_refused() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let client = reqwest::Client::new();

    let director = mint_jwt(jwt_secret, UserId::new(), "Omar Director", StaffRole::Director);
    let secretary_id = UserId::new();
    let secretary = mint_jwt(jwt_secret, secretary_id, "Lina Secretary", StaffRole::Secretary);

    let res = client
        .post(format!("{}/staff", srv.base_url))
        .bearer_auth(&director)
        .json(&json!({
            "staff_id": secretary_id.to_string(),
            "email": "lina@chancery.example",
            "display_name": "Lina Secretary",
            "role": "secretary",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    // Active member: token accepted.
    get_json_eventually(&client, &format!("{}/whoami", srv.base_url), &secretary, |_| true).await;

    let res = client
        .post(format!("{}/staff/{}/deactivate", srv.base_url, secretary_id))
        .bearer_auth(&director)
        .json(&json!({"reason": "left the firm"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // The directory veto kicks in as soon as the projection applies the
    // deactivation; the token itself is still cryptographically valid.
    for _ in 0..100 {
        let res = client
            .get(format!("{}/whoami", srv.base_url))
            .bearer_auth(&secretary)
            .send()
            .await
            .unwrap();
        if res.status() == StatusCode::UNAUTHORIZED {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("deactivated staff token was still accepted after timeout");
}

#[tokio::test]
async fn unknown_and_malformed_ids_map_to_errors() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let client = reqwest::Client::new();

    let director = mint_jwt(jwt_secret, UserId::new(), "Omar Director", StaffRole::Director);

    let res = client
        .get(format!("{}/cases/not-a-uuid", srv.base_url))
        .bearer_auth(&director)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(res).await, "invalid_id");

    let res = client
        .get(format!("{}/cases/{}", srv.base_url, uuid::Uuid::now_v7()))
        .bearer_auth(&director)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
