//! 订单相关的 HTTP 处理器
//!
//! 订单号以 text/plain 形式上传；列表响应中的订单号恢复为字符串，
//! 积分金额恢复为两位小数。

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use crate::error::{ApiError, Result};
use crate::luhn;
use crate::middleware::AuthUser;
use crate::models::{Order, OrderStatus, PendingOrder, money};
use crate::repository::traits::{OrderStore, OrderSubmission};
use crate::state::AppState;

/// 订单响应 DTO
#[derive(Debug, Serialize)]
pub struct OrderDto {
    pub number: String,
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accrual: Option<f64>,
    pub uploaded_at: DateTime<Utc>,
}

impl From<&Order> for OrderDto {
    fn from(order: &Order) -> Self {
        Self {
            number: order.number.to_string(),
            status: order.status,
            accrual: order.accrual.map(money::to_decimal),
            uploaded_at: order.uploaded_at,
        }
    }
}

/// 上传订单
///
/// POST /api/user/orders
///
/// 请求体是纯文本订单号。新订单返回 202 并送入流水线；
/// 同一用户重复上传返回 200；他人占用返回 409。
pub async fn submit_order(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    body: String,
) -> Result<Response> {
    let raw = body.trim();
    if raw.is_empty() {
        return Err(ApiError::Validation("请求体为空".to_string()));
    }

    let number = luhn::parse_order_number(raw)?;

    match state.orders.create(user.id, number).await? {
        OrderSubmission::Created => {
            tracing::info!(user_id = user.id, order = number, "订单已上传");

            // 队列只是加速器：入队失败也不影响 202，
            // 订单已落库，启动恢复会接手
            state.pipeline.try_enqueue(PendingOrder {
                number,
                user_id: user.id,
                status: OrderStatus::New,
            });

            Ok((
                StatusCode::ACCEPTED,
                Json(json!({ "message": "订单已受理" })),
            )
                .into_response())
        }
        OrderSubmission::AlreadyYours => Ok((
            StatusCode::OK,
            Json(json!({ "message": "订单此前已上传" })),
        )
            .into_response()),
    }
}

/// 订单列表
///
/// GET /api/user/orders
///
/// 按上传时间倒序；没有订单时返回 204。
pub async fn list_orders(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Response> {
    let orders = state.orders.list_by_user(user.id).await?;

    if orders.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let body: Vec<OrderDto> = orders.iter().map(OrderDto::from).collect();
    Ok(Json(body).into_response())
}
