use std::sync::Arc;

use tracing::info;

use helpdesk_core::{
    models::{category::normalize_name, Category, CategoryKind, Principal, Role},
    CategoryRepository, HelpdeskError, HelpdeskResult,
};

/// 租户分类管理
pub struct CategoryService {
    category_repo: Arc<dyn CategoryRepository>,
    fallback_category: String,
}

impl CategoryService {
    pub fn new(category_repo: Arc<dyn CategoryRepository>, fallback_category: impl Into<String>) -> Self {
        Self {
            category_repo,
            fallback_category: normalize_name(&fallback_category.into()),
        }
    }

    /// 确保租户存在默认分类
    pub async fn ensure_defaults(&self, tenant_id: &str) -> HelpdeskResult<()> {
        if self
            .category_repo
            .get_by_name(tenant_id, &self.fallback_category)
            .await?
            .is_some()
        {
            return Ok(());
        }

        let category = Category::new(tenant_id, &self.fallback_category, CategoryKind::Default);
        match self.category_repo.create(&category).await {
            // 并发初始化时另一方已写入
            Ok(_) | Err(HelpdeskError::Conflict(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub async fn list(&self, principal: &Principal) -> HelpdeskResult<Vec<Category>> {
        self.ensure_defaults(&principal.tenant_id).await?;
        self.category_repo.list_by_tenant(&principal.tenant_id).await
    }

    /// 租户规范分类名集合
    pub async fn canonical_names(&self, tenant_id: &str) -> HelpdeskResult<Vec<String>> {
        self.ensure_defaults(tenant_id).await?;
        Ok(self
            .category_repo
            .list_by_tenant(tenant_id)
            .await?
            .into_iter()
            .map(|c| c.name)
            .collect())
    }

    pub async fn create(&self, principal: &Principal, name: &str) -> HelpdeskResult<Category> {
        principal.require_role(&[Role::Admin])?;

        let name = normalize_name(name);
        if name.is_empty() {
            return Err(HelpdeskError::validation_error("分类名称不能为空"));
        }

        self.ensure_defaults(&principal.tenant_id).await?;
        let created = self
            .category_repo
            .create(&Category::new(&principal.tenant_id, name, CategoryKind::Custom))
            .await?;

        info!("租户 {} 新增分类 {}", created.tenant_id, created.name);
        Ok(created)
    }

    /// 删除自定义分类，其下工单迁移到 `fallback`（缺省为配置的兜底分类），返回迁移的工单数
    pub async fn delete(
        &self,
        principal: &Principal,
        name: &str,
        fallback: Option<&str>,
    ) -> HelpdeskResult<u64> {
        principal.require_role(&[Role::Admin])?;

        let name = normalize_name(name);
        let category = self
            .category_repo
            .get_by_name(&principal.tenant_id, &name)
            .await?
            .ok_or_else(|| HelpdeskError::category_not_found(&name))?;

        if category.is_default() || category.name == self.fallback_category {
            return Err(HelpdeskError::validation_error(format!(
                "默认分类 {} 不能删除",
                category.name
            )));
        }

        let fallback = match fallback.map(normalize_name) {
            Some(target) if !target.is_empty() => target,
            _ => self.fallback_category.clone(),
        };
        if fallback == name {
            return Err(HelpdeskError::validation_error(format!(
                "迁移目标不能是被删除的分类 {name}"
            )));
        }
        if !self
            .canonical_names(&principal.tenant_id)
            .await?
            .contains(&fallback)
        {
            return Err(HelpdeskError::validation_error(format!(
                "迁移目标分类不存在: {fallback}"
            )));
        }

        let moved = self
            .category_repo
            .delete_with_fallback(&principal.tenant_id, &name, &fallback)
            .await?;

        info!(
            "租户 {} 删除分类 {}，{} 个工单迁移到 {}",
            principal.tenant_id, name, moved, fallback
        );
        Ok(moved)
    }
}
