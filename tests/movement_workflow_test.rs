mod common;

use axum::http::StatusCode;
use branchflow_api::entities::{movement, MovementStatus};
use common::{body_json, expect_status, TestApp};
use sea_orm::EntityTrait;
use serde_json::json;
use uuid::Uuid;

struct Fixture {
    app: TestApp,
    origin: branchflow_api::entities::branch::Model,
    origin_token: String,
    destination: branchflow_api::entities::branch::Model,
    destination_token: String,
    driver: branchflow_api::entities::driver::Model,
    driver_token: String,
}

async fn fixture() -> Fixture {
    let app = TestApp::new().await;
    let (origin, origin_token) = app.seed_branch("Branch Recife", "recife@example.com").await;
    let (destination, destination_token) =
        app.seed_branch("Branch Olinda", "olinda@example.com").await;
    let (driver, driver_token) = app.seed_driver("Carla Souza", "carla@example.com").await;
    Fixture {
        app,
        origin,
        origin_token,
        destination,
        destination_token,
        driver,
        driver_token,
    }
}

async fn create_movement(f: &Fixture, product_id: Uuid, quantity: i32) -> Uuid {
    let body = expect_status(
        f.app
            .post(
                "/api/v1/movements",
                json!({
                    "destination_branch_id": f.destination.id,
                    "product_id": product_id,
                    "quantity": quantity,
                }),
                &f.origin_token,
            )
            .await,
        StatusCode::CREATED,
    )
    .await;
    assert_eq!(body["status"], "PENDING");
    body["id"].as_str().unwrap().parse().unwrap()
}

async fn stored_movement(app: &TestApp, id: Uuid) -> movement::Model {
    movement::Entity::find_by_id(id)
        .one(app.state.db.pool())
        .await
        .unwrap()
        .unwrap()
}

#[tokio::test]
async fn full_transfer_moves_stock_to_destination() {
    let f = fixture().await;
    let product = f.app.seed_product(f.origin.id, "Notebook", 50).await;

    let movement_id = create_movement(&f, product.id, 20).await;
    assert_eq!(f.app.product(product.id).await.quantity, 30);

    let started = expect_status(
        f.app
            .patch(
                &format!("/api/v1/movements/{}/start", movement_id),
                None,
                &f.driver_token,
            )
            .await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(started["status"], "IN_PROGRESS");
    assert_eq!(started["driver"]["id"], f.driver.id.to_string());
    assert_eq!(started["driver"]["name"], "Carla Souza");

    let ended = expect_status(
        f.app
            .patch(
                &format!("/api/v1/movements/{}/end", movement_id),
                None,
                &f.driver_token,
            )
            .await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(ended["status"], "DELIVERED");

    let finished = expect_status(
        f.app
            .post(
                &format!("/api/v1/movements/{}/finish", movement_id),
                json!({}),
                &f.destination_token,
            )
            .await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(finished["status"], "FINISHED");

    let received = f.app.products_at(f.destination.id).await;
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].quantity, 20);
    assert_eq!(received[0].name, "Notebook");
    assert_eq!(finished["product_id"], received[0].id.to_string());

    // The origin keeps what was left
    assert_eq!(f.app.product(product.id).await.quantity, 30);
    assert_eq!(
        stored_movement(&f.app, movement_id).await.status,
        MovementStatus::Finished
    );
}

#[tokio::test]
async fn transitions_out_of_order_are_rejected_without_changes() {
    let f = fixture().await;
    let product = f.app.seed_product(f.origin.id, "Monitor", 10).await;
    let movement_id = create_movement(&f, product.id, 4).await;

    // end before start
    let response = f
        .app
        .patch(
            &format!("/api/v1/movements/{}/end", movement_id),
            None,
            &f.driver_token,
        )
        .await;
    expect_status(response, StatusCode::BAD_REQUEST).await;

    // finish before delivery
    let response = f
        .app
        .post(
            &format!("/api/v1/movements/{}/finish", movement_id),
            json!({}),
            &f.destination_token,
        )
        .await;
    expect_status(response, StatusCode::BAD_REQUEST).await;

    let stored = stored_movement(&f.app, movement_id).await;
    assert_eq!(stored.status, MovementStatus::Pending);
    assert_eq!(stored.driver_id, None);
    assert!(f.app.products_at(f.destination.id).await.is_empty());

    // starting twice
    let uri = format!("/api/v1/movements/{}/start", movement_id);
    expect_status(f.app.patch(&uri, None, &f.driver_token).await, StatusCode::OK).await;
    expect_status(
        f.app.patch(&uri, None, &f.driver_token).await,
        StatusCode::BAD_REQUEST,
    )
    .await;
}

#[tokio::test]
async fn only_the_assigned_driver_can_deliver() {
    let f = fixture().await;
    let (_, other_driver_token) = f.app.seed_driver("Bruno Lima", "bruno@example.com").await;
    let product = f.app.seed_product(f.origin.id, "Chair", 8).await;
    let movement_id = create_movement(&f, product.id, 2).await;

    expect_status(
        f.app
            .patch(
                &format!("/api/v1/movements/{}/start", movement_id),
                None,
                &f.driver_token,
            )
            .await,
        StatusCode::OK,
    )
    .await;

    expect_status(
        f.app
            .patch(
                &format!("/api/v1/movements/{}/end", movement_id),
                None,
                &other_driver_token,
            )
            .await,
        StatusCode::FORBIDDEN,
    )
    .await;

    let stored = stored_movement(&f.app, movement_id).await;
    assert_eq!(stored.status, MovementStatus::InProgress);
    assert_eq!(stored.driver_id, Some(f.driver.id));
}

#[tokio::test]
async fn only_the_destination_branch_can_confirm_receipt() {
    let f = fixture().await;
    let product = f.app.seed_product(f.origin.id, "Desk", 5).await;
    let movement_id = create_movement(&f, product.id, 5).await;

    for step in ["start", "end"] {
        expect_status(
            f.app
                .patch(
                    &format!("/api/v1/movements/{}/{}", movement_id, step),
                    None,
                    &f.driver_token,
                )
                .await,
            StatusCode::OK,
        )
        .await;
    }

    expect_status(
        f.app
            .post(
                &format!("/api/v1/movements/{}/finish", movement_id),
                json!({}),
                &f.origin_token,
            )
            .await,
        StatusCode::FORBIDDEN,
    )
    .await;

    assert_eq!(
        stored_movement(&f.app, movement_id).await.status,
        MovementStatus::Delivered
    );
    assert!(f.app.products_at(f.destination.id).await.is_empty());
}

#[tokio::test]
async fn creation_rules() {
    let f = fixture().await;
    let product = f.app.seed_product(f.origin.id, "Printer", 3).await;

    // more than available
    let response = f
        .app
        .post(
            "/api/v1/movements",
            json!({
                "destination_branch_id": f.destination.id,
                "product_id": product.id,
                "quantity": 4,
            }),
            &f.origin_token,
        )
        .await;
    expect_status(response, StatusCode::BAD_REQUEST).await;

    // zero units
    let response = f
        .app
        .post(
            "/api/v1/movements",
            json!({
                "destination_branch_id": f.destination.id,
                "product_id": product.id,
                "quantity": 0,
            }),
            &f.origin_token,
        )
        .await;
    expect_status(response, StatusCode::BAD_REQUEST).await;

    // back to its own branch
    let response = f
        .app
        .post(
            "/api/v1/movements",
            json!({
                "destination_branch_id": f.origin.id,
                "product_id": product.id,
                "quantity": 1,
            }),
            &f.origin_token,
        )
        .await;
    expect_status(response, StatusCode::BAD_REQUEST).await;

    // unknown destination
    let response = f
        .app
        .post(
            "/api/v1/movements",
            json!({
                "destination_branch_id": Uuid::new_v4(),
                "product_id": product.id,
                "quantity": 1,
            }),
            &f.origin_token,
        )
        .await;
    expect_status(response, StatusCode::BAD_REQUEST).await;

    // someone else's stock
    let response = f
        .app
        .post(
            "/api/v1/movements",
            json!({
                "destination_branch_id": f.origin.id,
                "product_id": product.id,
                "quantity": 1,
            }),
            &f.destination_token,
        )
        .await;
    expect_status(response, StatusCode::FORBIDDEN).await;

    assert_eq!(f.app.product(product.id).await.quantity, 3);

    // the whole stock may leave
    create_movement(&f, product.id, 3).await;
    assert_eq!(f.app.product(product.id).await.quantity, 0);
}

#[tokio::test]
async fn drivers_cannot_create_movements() {
    let f = fixture().await;
    let product = f.app.seed_product(f.origin.id, "Lamp", 3).await;

    let response = f
        .app
        .post(
            "/api/v1/movements",
            json!({
                "destination_branch_id": f.destination.id,
                "product_id": product.id,
                "quantity": 1,
            }),
            &f.driver_token,
        )
        .await;
    expect_status(response, StatusCode::FORBIDDEN).await;
}

#[tokio::test]
async fn listings_follow_the_caller() {
    let f = fixture().await;
    let (_, other_driver_token) = f.app.seed_driver("Bruno Lima", "bruno@example.com").await;
    let product = f.app.seed_product(f.origin.id, "Tablet", 10).await;

    let first = create_movement(&f, product.id, 1).await;
    let second = create_movement(&f, product.id, 2).await;
    let third = create_movement(&f, product.id, 3).await;

    // second: in progress with the main driver; third: delivered
    for (id, steps) in [(second, vec!["start"]), (third, vec!["start", "end"])] {
        for step in steps {
            expect_status(
                f.app
                    .patch(
                        &format!("/api/v1/movements/{}/{}", id, step),
                        None,
                        &f.driver_token,
                    )
                    .await,
                StatusCode::OK,
            )
            .await;
        }
    }

    let queue = body_json(f.app.get("/api/v1/movements", &f.driver_token).await).await;
    let ids: Vec<&str> = queue
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&first.to_string().as_str()));
    assert!(ids.contains(&second.to_string().as_str()));

    // other drivers only see the pending one
    let queue = body_json(f.app.get("/api/v1/movements", &other_driver_token).await).await;
    assert_eq!(queue.as_array().unwrap().len(), 1);
    assert_eq!(queue[0]["id"], first.to_string());
    assert_eq!(queue[0]["product"]["name"], "Tablet");
    assert_eq!(queue[0]["destination_branch"]["name"], "Branch Olinda");

    let inbound =
        body_json(f.app.get("/api/v1/movements/inbound", &f.destination_token).await).await;
    assert_eq!(inbound.as_array().unwrap().len(), 3);

    let outbound =
        body_json(f.app.get("/api/v1/movements/outbound", &f.origin_token).await).await;
    assert_eq!(outbound.as_array().unwrap().len(), 3);
    let outbound_elsewhere =
        body_json(f.app.get("/api/v1/movements/outbound", &f.destination_token).await).await;
    assert!(outbound_elsewhere.as_array().unwrap().is_empty());

    let awaiting =
        body_json(f.app.get("/api/v1/movements/finished", &f.destination_token).await).await;
    assert_eq!(awaiting.as_array().unwrap().len(), 1);
    assert_eq!(awaiting[0]["id"], third.to_string());
    assert_eq!(awaiting[0]["status"], "DELIVERED");
}

#[tokio::test]
async fn branches_cannot_drive_and_drivers_cannot_receive() {
    let f = fixture().await;
    let product = f.app.seed_product(f.origin.id, "Router", 2).await;
    let movement_id = create_movement(&f, product.id, 1).await;

    expect_status(
        f.app
            .patch(
                &format!("/api/v1/movements/{}/start", movement_id),
                None,
                &f.origin_token,
            )
            .await,
        StatusCode::FORBIDDEN,
    )
    .await;

    expect_status(
        f.app
            .post(
                &format!("/api/v1/movements/{}/finish", movement_id),
                json!({}),
                &f.driver_token,
            )
            .await,
        StatusCode::FORBIDDEN,
    )
    .await;

    expect_status(
        f.app
            .patch(
                &format!("/api/v1/movements/{}/start", Uuid::new_v4()),
                None,
                &f.driver_token,
            )
            .await,
        StatusCode::NOT_FOUND,
    )
    .await;
}

#[tokio::test]
async fn malformed_bodies_are_rejected_as_validation_errors() {
    let f = fixture().await;
    let product = f.app.seed_product(f.origin.id, "Printer", 3).await;

    for payload in [
        json!({
            "destination_branch_id": f.destination.id,
            "product_id": product.id,
        }),
        json!({
            "destination_branch_id": f.destination.id,
            "product_id": "not-a-uuid",
            "quantity": 1,
        }),
        json!({
            "destination_branch_id": f.destination.id,
            "product_id": product.id,
            "quantity": "one",
        }),
    ] {
        let response = f
            .app
            .post("/api/v1/movements", payload.clone(), &f.origin_token)
            .await;
        assert_eq!(
            response.headers()["content-type"],
            "application/json",
            "payload: {}",
            payload
        );
        let body = expect_status(response, StatusCode::BAD_REQUEST).await;
        assert_eq!(body["error"], "Bad Request");
        assert!(body["message"]
            .as_str()
            .unwrap()
            .starts_with("Validation error: Request body is invalid"));
        assert!(body["timestamp"].is_string());
    }

    assert_eq!(f.app.product(product.id).await.quantity, 3);
}
