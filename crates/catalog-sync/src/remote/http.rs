//! HTTP 远端实现
//!
//! 对接表格脚本服务：
//! - 读取：`GET {base_url}?action=getProducts`，返回商品 JSON 数组
//! - 推送：`POST {base_url}`，`text/plain` 包体 `{ "action": "processTransactions", "transactions": [...] }`
//!
//! 服务端出错时可能以 200 返回 `{ "status": "error", "message": ... }`。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, error, info};

use super::RemoteCatalogService;
use crate::config::HttpClientConfig;
use crate::entities::{Product, Transaction};
use crate::error::{CatalogSyncError, Result};

const ACTION_GET_PRODUCTS: &str = "getProducts";
const ACTION_PROCESS_TRANSACTIONS: &str = "processTransactions";

#[derive(Debug, Serialize)]
struct ProcessTransactionsRequest<'a> {
    action: &'static str,
    transactions: &'a [Transaction],
}

/// HTTP 目录服务客户端
#[derive(Debug, Clone)]
pub struct HttpCatalogService {
    client: Client,
    base_url: String,
}

impl HttpCatalogService {
    pub fn new(base_url: impl Into<String>, config: &HttpClientConfig) -> Result<Self> {
        let base_url = base_url.into();
        if base_url.trim().is_empty() {
            return Err(CatalogSyncError::Config("远端地址不能为空".to_string()));
        }

        let mut builder = Client::builder()
            .user_agent(format!("catalog-sync/{}", crate::version::SDK_VERSION));

        if let Some(timeout) = config.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(timeout));
        }

        if let Some(timeout) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(timeout));
        }

        let client = builder
            .build()
            .map_err(|e| CatalogSyncError::Config(format!("创建 HTTP 客户端失败: {}", e)))?;

        info!("HTTP 目录服务已创建 (base_url: {})", base_url);

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl RemoteCatalogService for HttpCatalogService {
    async fn read_all(&self) -> Result<Vec<Product>> {
        debug!("拉取远端目录: {}", self.base_url);

        let response = self
            .client
            .get(&self.base_url)
            .query(&[("action", ACTION_GET_PRODUCTS)])
            .send()
            .await
            .map_err(|e| CatalogSyncError::Transport(format!("拉取目录失败: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let message = status
                .canonical_reason()
                .unwrap_or("unknown status")
                .to_string();
            error!("拉取目录失败，HTTP 状态码: {}", status);
            return Err(CatalogSyncError::HttpStatus {
                status: status.as_u16(),
                message,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| CatalogSyncError::Transport(format!("读取响应失败: {}", e)))?;

        parse_products(&body)
    }

    async fn apply_batch(&self, transactions: &[Transaction]) -> Result<()> {
        let request = ProcessTransactionsRequest {
            action: ACTION_PROCESS_TRANSACTIONS,
            transactions,
        };
        let body = serde_json::to_string(&request)?;

        info!("推送 {} 条事务到远端", transactions.len());

        let response = self
            .client
            .post(&self.base_url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain;charset=utf-8")
            .body(body)
            .send()
            .await
            .map_err(|e| CatalogSyncError::Transport(format!("推送事务失败: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "无法读取错误信息".to_string());
            error!("推送事务失败，HTTP 状态码: {}, 错误: {}", status, message);
            return Err(CatalogSyncError::HttpStatus {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }
}

/// 解析商品数组；识别服务端的错误包体
fn parse_products(body: &str) -> Result<Vec<Product>> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| CatalogSyncError::Serialization(format!("远端返回的不是合法 JSON: {}", e)))?;

    if let Some(object) = value.as_object() {
        if object.get("status").and_then(|s| s.as_str()) == Some("error") {
            let message = object
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("未知错误")
                .to_string();
            return Err(CatalogSyncError::Remote(message));
        }
    }

    serde_json::from_value(value)
        .map_err(|e| CatalogSyncError::Serialization(format!("解析商品列表失败: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_products() {
        let products = parse_products(r#"[{"SKU":"A","Cantidad unds":5},{"SKU":"B"}]"#).unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].stock, Some(5.0));
    }

    #[test]
    fn test_parse_error_envelope() {
        let err = parse_products(r#"{"status":"error","message":"Hoja no encontrada"}"#).unwrap_err();
        assert!(matches!(err, CatalogSyncError::Remote(ref m) if m == "Hoja no encontrada"));
    }

    #[test]
    fn test_parse_malformed_payload() {
        assert!(matches!(
            parse_products("<html>login</html>"),
            Err(CatalogSyncError::Serialization(_))
        ));
        assert!(matches!(
            parse_products(r#"{"productos":[]}"#),
            Err(CatalogSyncError::Serialization(_))
        ));
    }

    #[test]
    fn test_process_transactions_body() {
        let txs = vec![Transaction::delete(Product::new("Z"))];
        let body = serde_json::to_value(ProcessTransactionsRequest {
            action: ACTION_PROCESS_TRANSACTIONS,
            transactions: &txs,
        })
        .unwrap();
        assert_eq!(body["action"], "processTransactions");
        assert_eq!(body["transactions"][0]["tipo"], "DELETE");
    }

    #[test]
    fn test_empty_base_url_rejected() {
        let err = HttpCatalogService::new("  ", &HttpClientConfig::default()).unwrap_err();
        assert!(matches!(err, CatalogSyncError::Config(_)));
    }
}
