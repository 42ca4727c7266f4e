//! 数据实体定义 - 对应远端目录的 JSON 结构
//!
//! 远端与本地持久化使用同一套 JSON 键名（带空格、大写的表头名），
//! 这里通过 serde rename 映射为惯用的 Rust 字段名。

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// 商品实体 - 目录中的一条记录，以 SKU 为唯一标识
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Product {
    #[serde(rename = "SKU", deserialize_with = "lenient_string")]
    pub sku: String,
    /// 入库日期（远端原样透传，不解析）
    #[serde(rename = "Fecha", default, deserialize_with = "lenient_string")]
    pub date: String,
    #[serde(rename = "NOMBRE PRODUCTO", default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(rename = "PRECIO COMPRA UNIDAD", default, deserialize_with = "lenient_number")]
    pub unit_cost: Option<f64>,
    #[serde(rename = "PRECIO VENTA", default, deserialize_with = "lenient_number")]
    pub sale_price: Option<f64>,
    #[serde(rename = "Cantidad unds", default, deserialize_with = "lenient_number")]
    pub stock: Option<f64>,
    #[serde(rename = "REFERENCIA", default, deserialize_with = "lenient_string")]
    pub reference: String,
    #[serde(rename = "marca", default, deserialize_with = "lenient_string")]
    pub brand: String,
    #[serde(rename = "Provedor", default, deserialize_with = "lenient_string")]
    pub supplier: String,
    #[serde(rename = "Descripcion", default, deserialize_with = "lenient_string")]
    pub description: String,
    /// 本地未同步标记，只存在于合并视图中
    #[serde(rename = "isLocal", default, skip_serializing_if = "is_false")]
    pub pending: bool,
}

impl Product {
    pub fn new(sku: impl Into<String>) -> Self {
        Self {
            sku: sku.into(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_stock(mut self, stock: f64) -> Self {
        self.stock = Some(stock);
        self
    }

    pub fn with_unit_cost(mut self, unit_cost: f64) -> Self {
        self.unit_cost = Some(unit_cost);
        self
    }

    pub fn with_sale_price(mut self, sale_price: f64) -> Self {
        self.sale_price = Some(sale_price);
        self
    }

    /// 库存数量，缺失时为 0
    pub fn stock_or_default(&self) -> f64 {
        self.stock.unwrap_or(0.0)
    }

    /// 单位进价，缺失时为 0
    pub fn unit_cost_or_default(&self) -> f64 {
        self.unit_cost.unwrap_or(0.0)
    }

    /// 售价，缺失时为 0
    pub fn sale_price_or_default(&self) -> f64 {
        self.sale_price.unwrap_or(0.0)
    }

    /// 去掉本地标记后的副本（写入基础快照前使用）
    pub fn without_pending(mut self) -> Self {
        self.pending = false;
        self
    }
}

/// 事务类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionKind {
    Add,
    Update,
    Delete,
}

impl TransactionKind {
    /// 保存表单时判定事务类型：基础快照里已有该 SKU，或者是在编辑已有行，则为 UPDATE
    pub fn for_save(exists_in_base: bool, editing: bool) -> Self {
        if exists_in_base || editing {
            TransactionKind::Update
        } else {
            TransactionKind::Add
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionKind::Add => write!(f, "ADD"),
            TransactionKind::Update => write!(f, "UPDATE"),
            TransactionKind::Delete => write!(f, "DELETE"),
        }
    }
}

/// 本地编辑事务 - 针对单个商品的待同步修改
///
/// 事务的身份就是商品的 SKU：同一 SKU 的后一条事务无条件覆盖前一条。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    #[serde(rename = "tipo")]
    pub kind: TransactionKind,
    /// 完整商品数据（DELETE 也必须携带）
    #[serde(rename = "producto")]
    pub product: Product,
}

impl Transaction {
    pub fn new(kind: TransactionKind, product: Product) -> Self {
        Self {
            id: product.sku.clone(),
            kind,
            product,
        }
    }

    pub fn add(product: Product) -> Self {
        Self::new(TransactionKind::Add, product)
    }

    pub fn update(product: Product) -> Self {
        Self::new(TransactionKind::Update, product)
    }

    pub fn delete(product: Product) -> Self {
        Self::new(TransactionKind::Delete, product)
    }

    /// 事务对应的实体键
    pub fn key(&self) -> &str {
        &self.product.sku
    }

    pub fn is_delete(&self) -> bool {
        self.kind == TransactionKind::Delete
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// 表格导出的字符串列可能是数字或 null
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// 数值列可能是数字、数字字符串、空字符串或 null
fn lenient_number<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::Number(n) => Ok(n.as_f64()),
        serde_json::Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed
                .parse::<f64>()
                .map(Some)
                .map_err(|_| serde::de::Error::custom(format!("无效的数值: {}", s)))
        }
        other => Err(serde::de::Error::custom(format!("无效的数值: {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_product_wire_schema() {
        let product = Product::new("A-1")
            .with_name("Tornillo")
            .with_stock(5.0)
            .with_unit_cost(120.0);

        let value = serde_json::to_value(&product).unwrap();
        assert_eq!(value["SKU"], "A-1");
        assert_eq!(value["NOMBRE PRODUCTO"], "Tornillo");
        assert_eq!(value["Cantidad unds"], 5.0);
        assert_eq!(value["PRECIO VENTA"], serde_json::Value::Null);
        // 非本地数据不输出 isLocal
        assert!(value.get("isLocal").is_none());

        let pending = Product { pending: true, ..product };
        let value = serde_json::to_value(&pending).unwrap();
        assert_eq!(value["isLocal"], true);
    }

    #[test]
    fn test_product_lenient_fields() {
        let value = json!({
            "SKU": 1001,
            "NOMBRE PRODUCTO": null,
            "PRECIO COMPRA UNIDAD": "2500",
            "PRECIO VENTA": "",
            "Cantidad unds": 7,
            "Columna extra": "ignorada"
        });

        let product: Product = serde_json::from_value(value).unwrap();
        assert_eq!(product.sku, "1001");
        assert_eq!(product.name, "");
        assert_eq!(product.unit_cost, Some(2500.0));
        assert_eq!(product.sale_price, None);
        assert_eq!(product.stock_or_default(), 7.0);
        assert_eq!(product.sale_price_or_default(), 0.0);
        assert!(!product.pending);

        let bad = json!({ "SKU": "X", "Cantidad unds": "mucho" });
        assert!(serde_json::from_value::<Product>(bad).is_err());
    }

    #[test]
    fn test_transaction_wire_schema() {
        let tx = Transaction::update(Product::new("A").with_stock(3.0));
        let value = serde_json::to_value(&tx).unwrap();
        assert_eq!(value["id"], "A");
        assert_eq!(value["tipo"], "UPDATE");
        assert_eq!(value["producto"]["SKU"], "A");

        let parsed: Transaction = serde_json::from_value(json!({
            "id": "Z",
            "tipo": "DELETE",
            "producto": { "SKU": "Z" }
        }))
        .unwrap();
        assert!(parsed.is_delete());
        assert_eq!(parsed.key(), "Z");
    }

    #[test]
    fn test_kind_for_save() {
        assert_eq!(TransactionKind::for_save(true, false), TransactionKind::Update);
        assert_eq!(TransactionKind::for_save(false, true), TransactionKind::Update);
        assert_eq!(TransactionKind::for_save(false, false), TransactionKind::Add);
        assert_eq!(TransactionKind::Delete.to_string(), "DELETE");
    }
}
