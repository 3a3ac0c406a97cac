#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::{sync::broadcast, task::JoinHandle};

use helpdesk_core::{
    config::AppConfig,
    models::{Agent, Notification, Principal, Role, Ticket},
};
use helpdesk_dispatcher::{HelpdeskEngine, NotificationWorker};
use helpdesk_infrastructure::{
    DisabledAiTextService, InMemoryStore, LogNotifier, MetricsCollector, Repositories,
};

pub struct Harness {
    pub engine: HelpdeskEngine,
    pub repos: Repositories,
    pub store: InMemoryStore,
    worker: Option<NotificationWorker>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let store = InMemoryStore::new();
        let repos = Repositories::in_memory(store.clone());
        let (engine, worker) = HelpdeskEngine::build(
            &config,
            &repos,
            Arc::new(LogNotifier),
            Arc::new(DisabledAiTextService),
            Arc::new(MetricsCollector::new()),
        );

        Self {
            engine,
            repos,
            store,
            worker: Some(worker),
        }
    }

    pub async fn add_agent(&self, id: &str, categories: &[&str]) -> Agent {
        let mut agent = Agent::new(id, "t1", id);
        agent.categories = categories.iter().map(|c| c.to_string()).collect();
        self.repos.agents.upsert(&agent).await.unwrap();
        agent
    }

    pub async fn save_agent(&self, agent: &Agent) {
        self.repos.agents.upsert(agent).await.unwrap();
    }

    pub async fn add_ticket(&self, customer: &str, category: &str) -> Ticket {
        self.repos
            .tickets
            .create(&Ticket::new("t1", customer, "printer broken", category))
            .await
            .unwrap()
    }

    pub async fn ticket(&self, id: i64) -> Ticket {
        self.repos.tickets.get_by_id(id).await.unwrap().unwrap()
    }

    /// 在后台启动通知 worker，返回关闭信号与任务句柄
    pub fn start_worker(&mut self) -> (broadcast::Sender<()>, JoinHandle<()>) {
        let worker = self.worker.take().expect("worker already started");
        let (tx, rx) = broadcast::channel(1);
        (tx, worker.spawn(rx))
    }

    /// 等待收件人的站内通知达到指定数量
    pub async fn wait_for_inbox(&self, recipient: &str, count: usize) -> Vec<Notification> {
        for _ in 0..200 {
            let inbox = self
                .repos
                .notifications
                .list_by_recipient("t1", recipient)
                .await
                .unwrap();
            if inbox.len() >= count {
                return inbox;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("inbox of {recipient} never reached {count} notifications");
    }

    /// 关闭通知队列并处理完所有已入队的通知，只能调用一次
    pub async fn drain_notifications(&mut self, recipient: &str) -> Vec<Notification> {
        if let Some(worker) = self.worker.take() {
            let (tx, rx) = broadcast::channel(1);
            let handle = worker.spawn(rx);
            tx.send(()).unwrap();
            handle.await.unwrap();
        }
        self.repos
            .notifications
            .list_by_recipient("t1", recipient)
            .await
            .unwrap()
    }
}

pub fn admin() -> Principal {
    Principal::new("admin", "t1", Role::Admin)
}

pub fn agent_principal(id: &str) -> Principal {
    Principal::new(id, "t1", Role::Agent)
}

pub fn customer(id: &str) -> Principal {
    Principal::new(id, "t1", Role::Customer)
}

pub fn hours_ago(now: DateTime<Utc>, hours: i64) -> DateTime<Utc> {
    now - chrono::Duration::hours(hours)
}
