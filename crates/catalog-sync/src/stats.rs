//! 库存统计（基于合并视图）

use serde::{Deserialize, Serialize};

use crate::entities::Product;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct InventoryStats {
    pub total_products: usize,
    pub total_stock: f64,
    /// 库存总值 = Σ 单位进价 × 库存
    pub total_value: f64,
    pub out_of_stock: usize,
}

impl InventoryStats {
    /// 缺失的数值按 0 计算
    pub fn from_products(products: &[Product]) -> Self {
        products.iter().fold(Self::default(), |mut stats, p| {
            let stock = p.stock_or_default();
            stats.total_products += 1;
            stats.total_stock += stock;
            stats.total_value += p.unit_cost_or_default() * stock;
            if stock == 0.0 {
                stats.out_of_stock += 1;
            }
            stats
        })
    }
}
