use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::join_all;
use tokio::{net::TcpListener, sync::broadcast, task::JoinHandle};
use tracing::{error, info, warn};

use helpdesk_api::create_app;
use helpdesk_core::{config::AppConfig, AiTextService, Notifier};
use helpdesk_dispatcher::{HelpdeskEngine, NotificationWorker};
use helpdesk_infrastructure::{
    install_prometheus_exporter, DatabaseManager, DisabledAiTextService, HttpAiTextService,
    LogNotifier, MetricsCollector, Repositories, WebhookNotifier,
};

/// 主应用程序
pub struct Application {
    config: AppConfig,
    database: DatabaseManager,
    engine: Arc<HelpdeskEngine>,
    worker: NotificationWorker,
}

impl Application {
    /// 连接数据库、执行迁移并组装引擎
    pub async fn new(config: AppConfig) -> Result<Self> {
        if config.observability.metrics_enabled {
            install_prometheus_exporter(&config.observability.metrics_bind_address)?;
        }

        let database = DatabaseManager::new(&config.database)
            .await
            .context("初始化数据库失败")?;
        database.migrate().await?;

        let repos = Repositories::sqlite(database.pool().clone());
        let notifier = create_notifier(&config);
        let ai = create_ai_service(&config)?;
        let metrics = Arc::new(MetricsCollector::new());

        let (engine, worker) = HelpdeskEngine::build(&config, &repos, notifier, ai, metrics);

        Ok(Self {
            config,
            database,
            engine: Arc::new(engine),
            worker,
        })
    }

    /// 运行直到收到关闭信号
    ///
    /// 关闭顺序：先停止接收请求与定时任务，最后让通知 worker 处理完已入队的通知。
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let (worker_tx, worker_rx) = broadcast::channel(1);
        let worker_handle = self.worker.spawn(worker_rx);

        let (jobs_tx, _) = broadcast::channel(1);
        let job_handles = if self.config.jobs.enabled {
            self.engine.spawn_jobs(&self.config, &jobs_tx)
        } else {
            info!("定时任务已禁用");
            Vec::new()
        };

        let api_handle = if self.config.api.enabled {
            Some(spawn_api_server(&self.config, self.engine.clone(), shutdown_rx.resubscribe()).await?)
        } else {
            None
        };

        let _ = shutdown_rx.recv().await;
        info!("应用收到关闭信号");

        if let Some(handle) = api_handle {
            if let Err(e) = handle.await {
                error!("API服务器任务异常退出: {}", e);
            }
        }

        let _ = jobs_tx.send(());
        for result in join_all(job_handles).await {
            if let Err(e) = result {
                warn!("定时任务异常退出: {}", e);
            }
        }

        let _ = worker_tx.send(());
        if let Err(e) = worker_handle.await {
            warn!("通知worker异常退出: {}", e);
        }

        self.database.close().await;
        info!("所有组件已停止");
        Ok(())
    }
}

fn create_notifier(config: &AppConfig) -> Arc<dyn Notifier> {
    match &config.notifications.webhook_url {
        Some(url) => {
            info!("通知通道: webhook {}", url);
            Arc::new(WebhookNotifier::new(url))
        }
        None => {
            info!("未配置通知webhook，通知只写日志");
            Arc::new(LogNotifier)
        }
    }
}

fn create_ai_service(config: &AppConfig) -> Result<Arc<dyn AiTextService>> {
    if !config.ai.enabled {
        info!("AI文本服务未启用，工单分类使用兜底分类");
        return Ok(Arc::new(DisabledAiTextService));
    }

    let service = HttpAiTextService::from_config(&config.ai).context("创建AI服务客户端失败")?;
    Ok(Arc::new(service))
}

async fn spawn_api_server(
    config: &AppConfig,
    engine: Arc<HelpdeskEngine>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<JoinHandle<()>> {
    let app = create_app(engine, &config.api);

    let listener = TcpListener::bind(&config.api.bind_address)
        .await
        .with_context(|| format!("绑定地址失败: {}", config.api.bind_address))?;

    info!("API服务器启动在 http://{}", config.api.bind_address);

    Ok(tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("API服务器收到关闭信号");
        });
        if let Err(e) = server.await {
            error!("API服务器运行失败: {}", e);
        }
    }))
}
