//! 叠加合并 - 由基础快照 + 待同步事务计算当前视图
//!
//! 纯函数，无副作用。本地未同步的商品排在最前面，UI 不需要额外排序就能高亮。

use std::collections::HashSet;

use crate::entities::{Product, Transaction};

/// 计算合并视图
///
/// - 日志中出现过的 SKU 从基础快照中移除（并清掉残留的本地标记）
/// - 非 DELETE 事务的商品数据标记为本地后放在前面，保持日志顺序
/// - DELETE 事务不产生任何条目
pub fn merge(base: &[Product], log: &[Transaction]) -> Vec<Product> {
    let touched: HashSet<&str> = log.iter().map(|tx| tx.key()).collect();

    let local = log.iter().filter(|tx| !tx.is_delete()).map(|tx| Product {
        pending: true,
        ..tx.product.clone()
    });

    let untouched = base
        .iter()
        .filter(|p| !touched.contains(p.sku.as_str()))
        .map(|p| p.clone().without_pending());

    local.chain(untouched).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(sku: &str, stock: f64) -> Product {
        Product::new(sku).with_stock(stock)
    }

    #[test]
    fn test_merge_replaces_and_surfaces_local_first() {
        let base = vec![product("A", 5.0), product("B", 1.0), product("C", 0.0)];
        let log = vec![Transaction::update(product("B", 9.0))];

        let view = merge(&base, &log);
        let skus: Vec<&str> = view.iter().map(|p| p.sku.as_str()).collect();
        assert_eq!(skus, vec!["B", "A", "C"]);
        assert_eq!(view[0].stock, Some(9.0));
        assert!(view[0].pending);
        assert!(!view[1].pending);
        assert!(!view[2].pending);
    }

    #[test]
    fn test_merge_delete_removes_entity() {
        let base = vec![product("A", 5.0), product("B", 1.0)];
        let log = vec![
            Transaction::delete(product("A", 5.0)),
            Transaction::add(product("Z", 2.0)),
        ];

        let view = merge(&base, &log);
        assert!(view.iter().all(|p| p.sku != "A"));
        assert_eq!(view.len(), 2);
        assert_eq!(view[0].sku, "Z");
        assert!(view[0].pending);
    }

    #[test]
    fn test_merge_delete_of_unknown_key_is_harmless() {
        let base = vec![product("A", 5.0)];
        let log = vec![Transaction::delete(product("Q", 0.0))];
        assert_eq!(merge(&base, &log), base);
    }

    #[test]
    fn test_merge_strips_stale_pending_marker_from_base() {
        let mut stale = product("A", 5.0);
        stale.pending = true;
        let view = merge(&[stale], &[]);
        assert!(!view[0].pending);
    }

    #[test]
    fn test_merge_properties_over_generated_inputs() {
        // 小规模穷举：不同的基础快照与事务组合
        let kinds = [
            Transaction::add as fn(Product) -> Transaction,
            Transaction::update,
            Transaction::delete,
        ];
        let skus = ["A", "B", "C", "D"];

        for mask in 0u32..(1 << skus.len()) {
            let base: Vec<Product> = skus
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(i, s)| product(s, i as f64))
                .collect();

            for seed in 0..27usize {
                let log: Vec<Transaction> = skus[..3]
                    .iter()
                    .enumerate()
                    .map(|(i, s)| {
                        let kind = kinds[(seed / 3usize.pow(i as u32)) % 3];
                        kind(product(s, 100.0 + i as f64))
                    })
                    .collect();

                let view = merge(&base, &log);

                for tx in &log {
                    let matches: Vec<&Product> =
                        view.iter().filter(|p| p.sku == tx.key()).collect();
                    if tx.is_delete() {
                        assert!(matches.is_empty());
                    } else {
                        assert_eq!(matches.len(), 1);
                        assert!(matches[0].pending);
                        assert_eq!(matches[0].stock, tx.product.stock);
                    }
                }

                for p in &base {
                    if log.iter().all(|tx| tx.key() != p.sku) {
                        let found: Vec<&Product> =
                            view.iter().filter(|v| v.sku == p.sku).collect();
                        assert_eq!(found, vec![p]);
                    }
                }

                assert_eq!(view, merge(&base, &log));
            }
        }
    }
}
