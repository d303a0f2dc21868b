//! 集成测试公共工具
//!
//! - `ScriptedAccrual`：按订单号预设结果的 accrual 替身，统计调用次数与并发峰值
//! - `MockAccrualServer`：进程内 axum 服务，模拟真实 accrual HTTP 接口
//! - `luhn_number`：生成合法订单号

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use loyalty_service::accrual_client::{AccrualLookup, AccrualService};
use loyalty_service::luhn;
use loyalty_service::models::{AccrualReport, AccrualStatus};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tokio::net::TcpListener;

// ==================== 订单号 ====================

/// 在 payload 后补一位校验码，得到合法订单号
pub fn luhn_number(payload: u64) -> String {
    luhn_number_from(payload.to_string())
}

/// 生成指定位数左右的长订单号，用于验证存储不限制订单号长度
pub fn long_luhn_number(payload: u64, padding: usize) -> String {
    luhn_number_from(format!("{}{payload}", "9".repeat(padding)))
}

fn luhn_number_from(base: String) -> String {
    (0..=9)
        .map(|d| format!("{base}{d}"))
        .find(|candidate| luhn::is_valid(candidate))
        .expect("总有一位校验码满足 Luhn")
}

// ==================== 脚本化 accrual ====================

/// 按订单号返回预设结果，未设置的订单返回 Unavailable
#[derive(Default)]
pub struct ScriptedAccrual {
    responses: Mutex<HashMap<String, AccrualLookup>>,
    delay_ms: AtomicU64,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedAccrual {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, number: &str, lookup: AccrualLookup) {
        self.responses.lock().insert(number.to_string(), lookup);
    }

    pub fn report(&self, number: &str, status: AccrualStatus, accrual: Option<Decimal>) {
        self.set(
            number,
            AccrualLookup::Found(AccrualReport {
                order: number.to_string(),
                status,
                accrual,
            }),
        );
    }

    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn reset_counters(&self) {
        self.calls.store(0, Ordering::SeqCst);
        self.max_in_flight.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl AccrualService for ScriptedAccrual {
    async fn lookup(&self, order_number: &str) -> AccrualLookup {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let result = self
            .responses
            .lock()
            .get(order_number)
            .cloned()
            .unwrap_or(AccrualLookup::Unavailable);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

// ==================== 进程内 accrual HTTP 服务 ====================

/// 模拟服务对某个订单的响应
#[derive(Clone)]
pub enum MockReply {
    Json(serde_json::Value),
    Raw(&'static str),
    NoContent,
    TooManyRequests(Option<&'static str>),
    Status(u16),
    Slow(Duration),
}

type Replies = Arc<Mutex<HashMap<String, MockReply>>>;

pub struct MockAccrualServer {
    pub addr: SocketAddr,
    replies: Replies,
    handle: tokio::task::JoinHandle<()>,
}

impl MockAccrualServer {
    pub async fn start() -> Self {
        let replies: Replies = Arc::default();
        let app = Router::new()
            .route("/api/orders/{number}", get(order_handler))
            .with_state(replies.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            replies,
            handle,
        }
    }

    /// 不带协议的地址，用于验证客户端自动补全
    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    pub fn reply(&self, number: &str, reply: MockReply) {
        self.replies.lock().insert(number.to_string(), reply);
    }
}

impl Drop for MockAccrualServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn order_handler(State(replies): State<Replies>, Path(number): Path<String>) -> Response {
    let reply = replies.lock().get(&number).cloned();
    let Some(reply) = reply else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match reply {
        MockReply::Json(body) => axum::Json(body).into_response(),
        MockReply::Raw(body) => (StatusCode::OK, body).into_response(),
        MockReply::NoContent => StatusCode::NO_CONTENT.into_response(),
        MockReply::TooManyRequests(retry_after) => {
            let mut headers = HeaderMap::new();
            if let Some(value) = retry_after {
                headers.insert("Retry-After", HeaderValue::from_static(value));
            }
            (StatusCode::TOO_MANY_REQUESTS, headers, "No more than N requests per minute allowed")
                .into_response()
        }
        MockReply::Status(code) => StatusCode::from_u16(code)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            .into_response(),
        MockReply::Slow(delay) => {
            tokio::time::sleep(delay).await;
            StatusCode::NO_CONTENT.into_response()
        }
    }
}
