use chrono::{Duration, NaiveDate, Utc};
use helpdesk_core::{
    models::{
        Agent, BreachKind, CandidatePool, Category, CategoryKind, Feedback, HolidayWindow,
        Notification, NotificationType, ReassignmentLog, ReassignmentReason, Sentiment,
        SlaBreachMarker, SlaRule, Ticket, TicketFilter, TicketMessage, TicketPriority,
        TicketStatus, TriggeredBy,
    },
    AgentRepository, BreachMarkerRepository, CandidatePoolRepository, CategoryRepository,
    FeedbackRepository, HelpdeskError, NotificationRepository, ReassignmentLogRepository,
    RotationRepository, SlaRuleRepository, TicketRepository,
};
use helpdesk_infrastructure::{
    DatabaseManager, SqliteAgentRepository, SqliteBreachMarkerRepository,
    SqliteCandidatePoolRepository, SqliteCategoryRepository, SqliteFeedbackRepository,
    SqliteNotificationRepository, SqliteReassignmentLogRepository, SqliteRotationRepository,
    SqliteSlaRuleRepository, SqliteTicketRepository,
};

async fn setup() -> DatabaseManager {
    DatabaseManager::in_memory().await.unwrap()
}

#[tokio::test]
async fn test_ticket_create_and_fetch_with_messages() {
    let db = setup().await;
    let repo = SqliteTicketRepository::new(db.pool().clone());

    let ticket = repo
        .create(&Ticket::new("t1", "c1", "printer broken", "hardware"))
        .await
        .unwrap();
    assert!(ticket.id > 0);

    let reply_at = Utc::now();
    repo.append_message(
        ticket.id,
        &TicketMessage {
            sender_id: "a1".into(),
            text: "looking into it".into(),
            created_at: reply_at,
        },
        true,
    )
    .await
    .unwrap();

    let stored = repo.get_by_id(ticket.id).await.unwrap().unwrap();
    assert_eq!(stored.subject, "printer broken");
    assert_eq!(stored.status, TicketStatus::Open);
    assert_eq!(stored.messages.len(), 1);
    assert_eq!(
        stored.last_agent_reply_at.map(|t| t.timestamp_millis()),
        Some(reply_at.timestamp_millis())
    );
    assert!(stored.last_customer_reply_at.is_none());

    let missing = repo
        .append_message(
            9999,
            &TicketMessage {
                sender_id: "c1".into(),
                text: "hello?".into(),
                created_at: Utc::now(),
            },
            false,
        )
        .await;
    assert!(matches!(missing, Err(HelpdeskError::NotFound { .. })));
}

#[tokio::test]
async fn test_conditional_assignment_has_single_winner() {
    let db = setup().await;
    let repo = SqliteTicketRepository::new(db.pool().clone());
    let ticket = repo
        .create(&Ticket::new("t1", "c1", "s", "general"))
        .await
        .unwrap();

    let due = Utc::now() + Duration::hours(8);
    assert!(repo
        .assign_if_unassigned(ticket.id, "a1", TicketPriority::High, due)
        .await
        .unwrap());
    assert!(!repo
        .assign_if_unassigned(ticket.id, "a2", TicketPriority::Low, due)
        .await
        .unwrap());

    let stored = repo.get_by_id(ticket.id).await.unwrap().unwrap();
    assert_eq!(stored.agent_id.as_deref(), Some("a1"));
    assert_eq!(stored.priority, TicketPriority::High);
    assert_eq!(stored.status, TicketStatus::Assigned);
    assert!(stored.sla_due.is_some());
}

#[tokio::test]
async fn test_reassign_writes_log_only_when_incumbent_matches() {
    let db = setup().await;
    let tickets = SqliteTicketRepository::new(db.pool().clone());
    let logs = SqliteReassignmentLogRepository::new(db.pool().clone());

    let ticket = tickets
        .create(&Ticket::new("t1", "c1", "s", "general"))
        .await
        .unwrap();
    tickets
        .assign_if_unassigned(ticket.id, "a1", TicketPriority::Medium, Utc::now())
        .await
        .unwrap();

    let log = ReassignmentLog::new(
        "t1",
        ticket.id,
        Some("a1".into()),
        "a2",
        ReassignmentReason::Leave,
        TriggeredBy::Cron,
        Utc::now(),
    );

    // 负责人不匹配，不写入
    assert!(!tickets
        .reassign_with_log(ticket.id, Some("a9"), &log)
        .await
        .unwrap());
    assert!(logs.list_by_ticket(ticket.id).await.unwrap().is_empty());

    assert!(tickets
        .reassign_with_log(ticket.id, Some("a1"), &log)
        .await
        .unwrap());
    let entries = logs.list_by_ticket(ticket.id).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].reason, ReassignmentReason::Leave);
    assert_eq!(entries[0].triggered_by, TriggeredBy::Cron);
    assert_eq!(entries[0].from_agent.as_deref(), Some("a1"));

    let stored = tickets.get_by_id(ticket.id).await.unwrap().unwrap();
    assert_eq!(stored.agent_id.as_deref(), Some("a2"));
    assert_eq!(stored.status, TicketStatus::Assigned);
}

#[tokio::test]
async fn test_idle_listing_and_conditional_close() {
    let db = setup().await;
    let repo = SqliteTicketRepository::new(db.pool().clone());
    let now = Utc::now();
    let cutoff = now - Duration::days(7);

    let mut idle = Ticket::new("t1", "c1", "idle", "general");
    idle.last_agent_reply_at = Some(now - Duration::days(8));
    let idle = repo.create(&idle).await.unwrap();

    let mut fresh = Ticket::new("t1", "c1", "fresh", "general");
    fresh.last_agent_reply_at = Some(now - Duration::days(1));
    let fresh = repo.create(&fresh).await.unwrap();

    let candidates = repo.list_idle_pending(cutoff).await.unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].id, idle.id);

    assert!(repo.close_if_idle(idle.id, cutoff, now).await.unwrap());
    assert!(!repo.close_if_idle(fresh.id, cutoff, now).await.unwrap());
    // 已关闭的工单不会再次关闭
    assert!(!repo.close_if_idle(idle.id, cutoff, now).await.unwrap());

    let closed = repo.get_by_id(idle.id).await.unwrap().unwrap();
    assert_eq!(closed.status, TicketStatus::Closed);
    assert!(closed.auto_closed);
    assert!(closed.closed_at.is_some());
}

#[tokio::test]
async fn test_idle_assigned_tickets_are_closed_but_in_progress_are_not() {
    let db = setup().await;
    let repo = SqliteTicketRepository::new(db.pool().clone());
    let now = Utc::now();
    let cutoff = now - Duration::days(7);

    let mut assigned = Ticket::new("t1", "c1", "assigned", "general");
    assigned.last_agent_reply_at = Some(now - Duration::days(8));
    let assigned = repo.create(&assigned).await.unwrap();
    assert!(repo
        .assign_if_unassigned(assigned.id, "a1", TicketPriority::Medium, now)
        .await
        .unwrap());

    let mut working = Ticket::new("t1", "c2", "working", "general");
    working.last_agent_reply_at = Some(now - Duration::days(8));
    let working = repo.create(&working).await.unwrap();
    assert!(repo
        .assign_if_unassigned(working.id, "a1", TicketPriority::Medium, now)
        .await
        .unwrap());
    assert!(repo
        .update_status(working.id, TicketStatus::Assigned, TicketStatus::InProgress, now)
        .await
        .unwrap());

    let candidates = repo.list_idle_pending(cutoff).await.unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].id, assigned.id);

    assert!(repo.close_if_idle(assigned.id, cutoff, now).await.unwrap());
    assert!(!repo.close_if_idle(working.id, cutoff, now).await.unwrap());

    let closed = repo.get_by_id(assigned.id).await.unwrap().unwrap();
    assert_eq!(closed.status, TicketStatus::Closed);
    assert!(closed.auto_closed);
}

#[tokio::test]
async fn test_status_update_and_sla_scope() {
    let db = setup().await;
    let repo = SqliteTicketRepository::new(db.pool().clone());
    let now = Utc::now();

    let open = repo.create(&Ticket::new("t1", "c1", "open", "general")).await.unwrap();
    let closed = repo.create(&Ticket::new("t1", "c1", "closed", "general")).await.unwrap();

    assert!(repo
        .update_status(closed.id, TicketStatus::Open, TicketStatus::Closed, now)
        .await
        .unwrap());
    // 期望状态不匹配
    assert!(!repo
        .update_status(closed.id, TicketStatus::Open, TicketStatus::InProgress, now)
        .await
        .unwrap());

    let in_scope = repo.list_for_sla(now - Duration::hours(24)).await.unwrap();
    assert_eq!(in_scope.len(), 2);

    let in_scope = repo.list_for_sla(now + Duration::hours(1)).await.unwrap();
    assert_eq!(in_scope.len(), 1);
    assert_eq!(in_scope[0].id, open.id);
}

#[tokio::test]
async fn test_ticket_filter_is_tenant_scoped() {
    let db = setup().await;
    let repo = SqliteTicketRepository::new(db.pool().clone());
    repo.create(&Ticket::new("t1", "c1", "a", "general")).await.unwrap();
    repo.create(&Ticket::new("t1", "c2", "b", "general")).await.unwrap();
    repo.create(&Ticket::new("t2", "c1", "c", "general")).await.unwrap();

    let all = repo.list(&TicketFilter::for_tenant("t1")).await.unwrap();
    assert_eq!(all.len(), 2);

    let mut own = TicketFilter::for_tenant("t1");
    own.customer_id = Some("c1".into());
    let own = repo.list(&own).await.unwrap();
    assert_eq!(own.len(), 1);
    assert_eq!(own[0].subject, "a");
}

#[tokio::test]
async fn test_agent_roundtrip_and_busy_cas() {
    let db = setup().await;
    let repo = SqliteAgentRepository::new(db.pool().clone());

    let mut agent = Agent::new("a1", "t1", "Alice");
    agent.categories = vec!["billing".into(), "general".into()];
    agent.holidays = vec![HolidayWindow::new(
        NaiveDate::from_ymd_opt(2024, 12, 24).unwrap(),
        NaiveDate::from_ymd_opt(2024, 12, 26).unwrap(),
    )];
    agent.priority = 5;
    agent.is_online = true;
    repo.upsert(&agent).await.unwrap();

    let stored = repo.get_by_id("a1").await.unwrap().unwrap();
    assert_eq!(stored.categories, agent.categories);
    assert_eq!(stored.holidays, agent.holidays);
    assert_eq!(stored.priority, 5);

    let now = Utc::now();
    assert!(!repo.try_mark_busy("a1", "hardware", now).await.unwrap());
    assert!(repo.try_mark_busy("a1", "billing", now).await.unwrap());
    assert!(!repo.try_mark_busy("a1", "billing", now).await.unwrap());

    assert!(repo.release("a1").await.unwrap());
    assert!(!repo.release("a1").await.unwrap());

    let stored = repo.get_by_id("a1").await.unwrap().unwrap();
    assert!(!stored.is_busy);
    assert!(stored.last_call_at.is_some());
}

#[tokio::test]
async fn test_agent_upsert_does_not_overwrite_runtime_state() {
    let db = setup().await;
    let repo = SqliteAgentRepository::new(db.pool().clone());

    let mut agent = Agent::new("a1", "t1", "Alice");
    agent.categories = vec!["sales".into()];
    agent.is_online = true;
    repo.upsert(&agent).await.unwrap();

    let now = Utc::now();
    assert!(repo.try_mark_busy("a1", "sales", now).await.unwrap());
    repo.touch_last_assigned("a1", now).await.unwrap();

    let mut stale = agent.clone();
    stale.tenant_id = "t2".into();
    stale.priority = 7;
    stale.name = "Alice B".into();
    repo.upsert(&stale).await.unwrap();

    let stored = repo.get_by_id("a1").await.unwrap().unwrap();
    assert_eq!(stored.name, "Alice B");
    assert_eq!(stored.priority, 7);
    assert_eq!(stored.tenant_id, "t1");
    assert!(stored.is_busy);
    assert!(stored.last_call_at.is_some());
    assert!(stored.last_assigned_at.is_some());
    // 仍在通话中，不能再次被占用
    assert!(!repo.try_mark_busy("a1", "sales", now).await.unwrap());
}

#[tokio::test]
async fn test_rotation_pointer_version_cas() {
    let db = setup().await;
    let repo = SqliteRotationRepository::new(db.pool().clone());

    assert!(repo.get("customer:c1").await.unwrap().is_none());
    assert!(repo.compare_and_set("customer:c1", 0, 2).await.unwrap());
    assert!(!repo.compare_and_set("customer:c1", 0, 3).await.unwrap());

    let pointer = repo.get("customer:c1").await.unwrap().unwrap();
    assert_eq!(pointer.last_index, 2);
    assert_eq!(pointer.version, 1);

    assert!(repo.compare_and_set("customer:c1", 1, 3).await.unwrap());
    assert!(!repo.compare_and_set("customer:c1", 1, 1).await.unwrap());
}

#[tokio::test]
async fn test_candidate_pool_upsert() {
    let db = setup().await;
    let repo = SqliteCandidatePoolRepository::new(db.pool().clone());

    let mut pool = CandidatePool {
        tenant_id: "t1".into(),
        customer_id: "c1".into(),
        agent_ids: vec!["a1".into(), "a2".into()],
    };
    repo.upsert(&pool).await.unwrap();
    pool.agent_ids.push("a3".into());
    repo.upsert(&pool).await.unwrap();

    let stored = repo.get("t1", "c1").await.unwrap().unwrap();
    assert_eq!(stored.agent_ids, vec!["a1", "a2", "a3"]);
    assert!(repo.get("t1", "c2").await.unwrap().is_none());
}

#[tokio::test]
async fn test_breach_marker_insert_if_absent() {
    let db = setup().await;
    let rules = SqliteSlaRuleRepository::new(db.pool().clone());
    let markers = SqliteBreachMarkerRepository::new(db.pool().clone());

    let rule = rules
        .create(&SlaRule {
            id: 0,
            tenant_id: "t1".into(),
            priority: None,
            response_hours: 24.0,
            resolution_hours: 72.0,
        })
        .await
        .unwrap();
    let listed = rules.list_by_tenant("t1").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed[0].is_tenant_default());

    let marker = SlaBreachMarker {
        ticket_id: 1,
        kind: BreachKind::Response,
        rule_id: rule.id,
        notified_at: Utc::now(),
    };
    assert!(markers.try_mark(&marker).await.unwrap());
    assert!(!markers.try_mark(&marker).await.unwrap());
    assert_eq!(markers.list_by_ticket(1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_category_delete_moves_tickets_to_fallback() {
    let db = setup().await;
    let categories = SqliteCategoryRepository::new(db.pool().clone());
    let tickets = SqliteTicketRepository::new(db.pool().clone());

    categories
        .create(&Category::new("t1", "billing", CategoryKind::Custom))
        .await
        .unwrap();
    let duplicate = categories
        .create(&Category::new("t1", "Billing", CategoryKind::Custom))
        .await;
    assert!(matches!(duplicate, Err(HelpdeskError::Conflict(_))));

    let ticket = tickets
        .create(&Ticket::new("t1", "c1", "refund", "billing"))
        .await
        .unwrap();

    let moved = categories
        .delete_with_fallback("t1", "billing", "general")
        .await
        .unwrap();
    assert_eq!(moved, 1);

    let stored = tickets.get_by_id(ticket.id).await.unwrap().unwrap();
    assert_eq!(stored.category, "general");

    let missing = categories.delete_with_fallback("t1", "billing", "general").await;
    assert!(matches!(missing, Err(HelpdeskError::NotFound { .. })));
}

#[tokio::test]
async fn test_feedback_is_unique_per_ticket() {
    let db = setup().await;
    let repo = SqliteFeedbackRepository::new(db.pool().clone());

    let feedback = Feedback {
        id: 0,
        ticket_id: 11,
        tenant_id: "t1".into(),
        customer_id: "c1".into(),
        agent_id: Some("a1".into()),
        rating: 2,
        comment: Some("slow".into()),
        sentiment: Sentiment::from_rating(2),
        created_at: Utc::now(),
    };
    let created = repo.create(&feedback).await.unwrap();
    assert!(created.id > 0);
    assert!(matches!(
        repo.create(&feedback).await,
        Err(HelpdeskError::Conflict(_))
    ));

    let stored = repo.get_by_ticket(11).await.unwrap().unwrap();
    assert_eq!(stored.rating, 2);
    assert_eq!(stored.sentiment, Sentiment::Negative);
}

#[tokio::test]
async fn test_notifications_inbox() {
    let db = setup().await;
    let repo = SqliteNotificationRepository::new(db.pool().clone());

    let notification = Notification::new(
        "t1",
        "a1",
        NotificationType::TicketAssigned,
        Some(3),
        "工单 #3 已分配给您",
    );
    repo.create(&notification).await.unwrap();

    let inbox = repo.list_by_recipient("t1", "a1").await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert!(!inbox[0].read);
    assert_eq!(inbox[0].notification_type, NotificationType::TicketAssigned);

    assert!(repo.mark_read(&notification.id).await.unwrap());
    let inbox = repo.list_by_recipient("t1", "a1").await.unwrap();
    assert!(inbox[0].read);
}
