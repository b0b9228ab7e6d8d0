//! End-to-end tests for the backend REST client over real HTTP.

#![allow(clippy::unwrap_used)]

use axum::{
    Json, Router,
    extract::Path,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
};
use chrono::NaiveDate;
use rust_decimal_macros::dec;
use serde_json::json;

use espiga_core::pricing::{PriceLookup, PriceTier};
use espiga_core::types::{ClientId, OrderId, ProductId, RouteId};
use espiga_dashboard::backend::types::{NewLinea, NewPedido, PedidoPatch};
use espiga_dashboard::backend::{BackendError, LineOp, ListQuery};
use espiga_integration_tests::{MockBackend, test_token};

fn new_linea(producto: i32, cantidad: u32) -> NewLinea {
    NewLinea {
        producto_id: ProductId::new(producto),
        cantidad,
        precio_unitario: dec!(50),
        subtotal: rust_decimal::Decimal::from(cantidad) * dec!(50),
        descripcion: format!("Producto {producto}"),
    }
}

// =============================================================================
// Listing and envelope handling
// =============================================================================

#[tokio::test]
async fn test_list_decodes_bare_and_wrapped_envelopes() {
    let router = Router::new()
        .route(
            "/productos",
            get(|| async { Json(json!([{"id": 1, "nombre": "Pan flauta"}])) }),
        )
        .route(
            "/clientes",
            get(|| async { Json(json!({"data": [{"id": 4, "nombre": "Almacén Sur"}]})) }),
        );
    let backend = MockBackend::start(router).await;
    let client = backend.client();
    let token = test_token();

    let productos = client.list_productos(&token, &ListQuery::all()).await.unwrap();
    assert_eq!(productos.len(), 1);
    assert_eq!(productos[0].nombre, "Pan flauta");

    let clientes = client.list_clientes(&token, &ListQuery::all()).await.unwrap();
    assert_eq!(clientes.len(), 1);
    assert_eq!(clientes[0].id, ClientId::new(4));
}

#[tokio::test]
async fn test_requests_carry_bearer_token_and_paging() {
    let router = Router::new().route("/productos", get(|| async { Json(json!([])) }));
    let backend = MockBackend::start(router).await;

    backend
        .client()
        .list_productos(&test_token(), &ListQuery::all())
        .await
        .unwrap();

    let request = backend.find("GET", "/productos").unwrap();
    assert_eq!(request.authorization.as_deref(), Some("Bearer test-token"));
    assert!(request.query.contains("pageSize=1000"));
}

// =============================================================================
// Login
// =============================================================================

#[tokio::test]
async fn test_login_surfaces_backend_message() {
    let router = Router::new().route(
        "/auth/login",
        post(|| async {
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "Credenciales inválidas"})),
            )
        }),
    );
    let backend = MockBackend::start(router).await;

    let err = backend
        .client()
        .login("maria", "wrong")
        .await
        .expect_err("login must fail");
    match err {
        BackendError::Status { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "Credenciales inválidas");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_login_returns_token_and_user() {
    let router = Router::new().route(
        "/auth/login",
        post(|| async {
            Json(json!({
                "token": "abc123",
                "usuario": {"id": 5, "username": "raul", "rol": "REPARTIDOR", "repartoId": 2}
            }))
        }),
    );
    let backend = MockBackend::start(router).await;

    let login = backend.client().login("raul", "secreto").await.unwrap();
    assert_eq!(login.token, "abc123");
    assert_eq!(login.usuario.reparto_id, Some(RouteId::new(2)));
}

// =============================================================================
// Price lookups
// =============================================================================

#[tokio::test]
async fn test_precio_vigente_states() {
    let router = Router::new().route(
        "/precio-productos/vigente/{id}",
        get(|Path(id): Path<i32>| async move {
            match id {
                1 => Json(json!({"data": {"valor": 125.5}})).into_response(),
                2 => StatusCode::NOT_FOUND.into_response(),
                _ => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
            }
        }),
    );
    let backend = MockBackend::start(router).await;
    let client = backend.client();
    let token = test_token();
    let fecha = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();

    let found = client
        .precio_vigente(&token, ProductId::new(1), fecha, PriceTier::Resale)
        .await;
    assert_eq!(found, PriceLookup::Found(dec!(125.5)));

    let missing = client
        .precio_vigente(&token, ProductId::new(2), fecha, PriceTier::Resale)
        .await;
    assert_eq!(missing, PriceLookup::NotFound);

    let broken = client
        .precio_vigente(&token, ProductId::new(3), fecha, PriceTier::Resale)
        .await;
    assert_eq!(broken, PriceLookup::Failed);
}

#[tokio::test]
async fn test_precio_vigente_sends_date_and_tier() {
    let router = Router::new().route(
        "/precio-productos/vigente/{id}",
        get(|| async { Json(json!({"valor": 80.0})) }),
    );
    let backend = MockBackend::start(router).await;

    backend
        .client()
        .precio_vigente(
            &test_token(),
            ProductId::new(7),
            NaiveDate::from_ymd_opt(2024, 5, 10).unwrap(),
            PriceTier::EndConsumer,
        )
        .await;

    let request = backend.find("GET", "/precio-productos/vigente/7").unwrap();
    assert!(request.query.contains("fecha=2024-05-10"));
    assert!(request.query.contains("nombre=consumidor"));
}

// =============================================================================
// Order creation and line plans
// =============================================================================

fn sample_pedido_response() -> serde_json::Value {
    json!({
        "id": 1,
        "fechaEmision": "2024-05-10",
        "fechaEntrega": "2024-05-11",
        "clienteId": 4,
        "repartoId": 2,
        "total": 100.0,
        "estado": "Pendiente",
        "lineasPedido": []
    })
}

#[tokio::test]
async fn test_create_pedido_sends_camel_case_document() {
    let router = Router::new().route(
        "/pedidos",
        post(|| async { Json(sample_pedido_response()) }),
    );
    let backend = MockBackend::start(router).await;

    let pedido = NewPedido {
        cliente_id: ClientId::new(4),
        reparto_id: RouteId::new(2),
        fecha_emision: NaiveDate::from_ymd_opt(2024, 5, 10).unwrap(),
        fecha_entrega: NaiveDate::from_ymd_opt(2024, 5, 11).unwrap(),
        estado: "Pendiente".to_string(),
        total: dec!(100),
        lineas: vec![new_linea(3, 2)],
    };
    backend.client().create_pedido(&test_token(), &pedido).await.unwrap();

    let request = backend.find("POST", "/pedidos").unwrap();
    assert_eq!(request.body["clienteId"], 4);
    assert_eq!(request.body["fechaEmision"], "2024-05-10");
    assert_eq!(request.body["lineas"][0]["productoId"], 3);
    assert_eq!(request.body["lineas"][0]["precioUnitario"], 50.0);
}

#[tokio::test]
async fn test_update_pedido_applies_plan_in_order() {
    let router = Router::new()
        .route("/pedidos/{id}", patch(|| async { StatusCode::NO_CONTENT }))
        .route(
            "/lineas-pedido",
            post(|| async {
                Json(json!({
                    "id": 77, "productoId": 3, "cantidad": 2,
                    "precioUnitario": 50.0, "subtotal": 100.0, "descripcion": "Criollos"
                }))
            }),
        )
        .route(
            "/lineas-pedido/{id}",
            patch(|| async { StatusCode::NO_CONTENT }).delete(|| async { StatusCode::NO_CONTENT }),
        );
    let backend = MockBackend::start(router).await;

    let patch_body = PedidoPatch {
        cliente_id: ClientId::new(4),
        reparto_id: RouteId::new(2),
        fecha_emision: NaiveDate::from_ymd_opt(2024, 5, 10).unwrap(),
        fecha_entrega: NaiveDate::from_ymd_opt(2024, 5, 11).unwrap(),
        total: dec!(150),
    };
    let ops = vec![
        LineOp::Update {
            id: 10,
            linea: new_linea(1, 3),
            previous: new_linea(1, 2),
        },
        LineOp::Create(new_linea(3, 2)),
        LineOp::Delete {
            id: 11,
            previous: new_linea(2, 1),
        },
    ];

    backend
        .client()
        .update_pedido(&test_token(), OrderId::new(1), &patch_body, ops)
        .await
        .unwrap();

    let requests = backend.requests();
    let methods: Vec<String> = requests
        .iter()
        .map(|request| format!("{} {}", request.method, request.path))
        .collect();
    assert_eq!(
        methods,
        vec![
            "PATCH /pedidos/1",
            "PATCH /lineas-pedido/10",
            "POST /lineas-pedido",
            "DELETE /lineas-pedido/11",
        ]
    );

    // Created lines carry the parent foreign key
    let create = backend.find("POST", "/lineas-pedido").unwrap();
    assert_eq!(create.body["pedidoId"], 1);
}

#[tokio::test]
async fn test_update_pedido_rolls_back_applied_steps_on_failure() {
    let router = Router::new()
        .route("/pedidos/{id}", patch(|| async { StatusCode::NO_CONTENT }))
        .route(
            "/lineas-pedido",
            post(|| async {
                Json(json!({
                    "id": 77, "productoId": 3, "cantidad": 2,
                    "precioUnitario": 50.0, "subtotal": 100.0, "descripcion": "Criollos"
                }))
            }),
        )
        .route(
            "/lineas-pedido/{id}",
            patch(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": "Fallo interno"})),
                )
            })
            .delete(|| async { StatusCode::NO_CONTENT }),
        );
    let backend = MockBackend::start(router).await;

    let patch_body = PedidoPatch {
        cliente_id: ClientId::new(4),
        reparto_id: RouteId::new(2),
        fecha_emision: NaiveDate::from_ymd_opt(2024, 5, 10).unwrap(),
        fecha_entrega: NaiveDate::from_ymd_opt(2024, 5, 11).unwrap(),
        total: dec!(150),
    };
    // The create succeeds, then the update blows up
    let ops = vec![
        LineOp::Create(new_linea(3, 2)),
        LineOp::Update {
            id: 10,
            linea: new_linea(1, 3),
            previous: new_linea(1, 2),
        },
    ];

    let err = backend
        .client()
        .update_pedido(&test_token(), OrderId::new(1), &patch_body, ops)
        .await
        .expect_err("plan must fail");

    match err {
        BackendError::LineWrite { rolled_back, .. } => assert!(rolled_back),
        other => panic!("expected line write error, got {other:?}"),
    }

    // The created line 77 was compensated with a delete
    assert!(backend.find("DELETE", "/lineas-pedido/77").is_some());
}
