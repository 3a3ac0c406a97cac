use std::sync::Arc;

use tracing::{debug, warn};

use helpdesk_core::{models::category::normalize_name, AiTextService};

/// 将候选分类与租户的规范分类集合比对（忽略大小写与首尾空白），不在集合内时返回兜底分类
pub fn validate_category(candidate: &str, canonical: &[String], fallback: &str) -> String {
    let normalized = normalize_name(candidate);
    canonical
        .iter()
        .find(|name| normalize_name(name) == normalized)
        .cloned()
        .unwrap_or_else(|| fallback.to_string())
}

/// 工单分类器，AI 结果始终经过规范集合校验
pub struct CategoryClassifier {
    ai: Arc<dyn AiTextService>,
    fallback_category: String,
}

impl CategoryClassifier {
    pub fn new(ai: Arc<dyn AiTextService>, fallback_category: impl Into<String>) -> Self {
        Self {
            ai,
            fallback_category: fallback_category.into(),
        }
    }

    /// AI 服务失败时降级为兜底分类，不影响工单创建
    pub async fn classify(&self, text: &str, canonical: &[String]) -> String {
        match self.ai.classify(text, canonical).await {
            Ok(suggested) => {
                let category = validate_category(&suggested, canonical, &self.fallback_category);
                if category != normalize_name(&suggested) {
                    debug!("AI分类结果 {} 不在规范集合中，使用 {}", suggested, category);
                }
                category
            }
            Err(e) => {
                warn!("AI分类失败，使用兜底分类 {}: {}", self.fallback_category, e);
                self.fallback_category.clone()
            }
        }
    }
}
