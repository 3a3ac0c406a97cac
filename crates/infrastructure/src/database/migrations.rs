//! 数据库模式
//!
//! 时间字段统一存储为毫秒时间戳，列表字段存储为 JSON 文本。

pub const MIGRATIONS: &[(&str, &str)] = &[
    (
        "create_tickets",
        r#"
        CREATE TABLE IF NOT EXISTS tickets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id TEXT NOT NULL,
            customer_id TEXT NOT NULL,
            agent_id TEXT,
            subject TEXT NOT NULL,
            category TEXT NOT NULL,
            priority TEXT NOT NULL DEFAULT 'medium',
            status TEXT NOT NULL DEFAULT 'open',
            sla_due INTEGER,
            created_at INTEGER NOT NULL,
            closed_at INTEGER,
            last_agent_reply_at INTEGER,
            last_customer_reply_at INTEGER,
            auto_closed INTEGER NOT NULL DEFAULT 0
        )
        "#,
    ),
    (
        "index_tickets_tenant_status",
        "CREATE INDEX IF NOT EXISTS idx_tickets_tenant_status ON tickets (tenant_id, status)",
    ),
    (
        "index_tickets_agent",
        "CREATE INDEX IF NOT EXISTS idx_tickets_agent ON tickets (agent_id)",
    ),
    (
        "create_ticket_messages",
        r#"
        CREATE TABLE IF NOT EXISTS ticket_messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ticket_id INTEGER NOT NULL REFERENCES tickets (id) ON DELETE CASCADE,
            sender_id TEXT NOT NULL,
            text TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    ),
    (
        "index_ticket_messages_ticket",
        "CREATE INDEX IF NOT EXISTS idx_ticket_messages_ticket ON ticket_messages (ticket_id, created_at)",
    ),
    (
        "create_agents",
        r#"
        CREATE TABLE IF NOT EXISTS agents (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            name TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            on_leave INTEGER NOT NULL DEFAULT 0,
            holidays TEXT NOT NULL DEFAULT '[]',
            categories TEXT NOT NULL DEFAULT '[]',
            priority INTEGER NOT NULL DEFAULT 0,
            is_online INTEGER NOT NULL DEFAULT 0,
            is_busy INTEGER NOT NULL DEFAULT 0,
            last_call_at INTEGER,
            last_assigned_at INTEGER,
            created_at INTEGER NOT NULL
        )
        "#,
    ),
    (
        "index_agents_tenant",
        "CREATE INDEX IF NOT EXISTS idx_agents_tenant ON agents (tenant_id)",
    ),
    (
        "create_rotation_pointers",
        r#"
        CREATE TABLE IF NOT EXISTS rotation_pointers (
            subject_key TEXT PRIMARY KEY,
            last_index INTEGER NOT NULL,
            version INTEGER NOT NULL
        )
        "#,
    ),
    (
        "create_candidate_pools",
        r#"
        CREATE TABLE IF NOT EXISTS candidate_pools (
            tenant_id TEXT NOT NULL,
            customer_id TEXT NOT NULL,
            agent_ids TEXT NOT NULL DEFAULT '[]',
            PRIMARY KEY (tenant_id, customer_id)
        )
        "#,
    ),
    (
        "create_reassignment_logs",
        r#"
        CREATE TABLE IF NOT EXISTS reassignment_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id TEXT NOT NULL,
            ticket_id INTEGER NOT NULL,
            from_agent TEXT,
            to_agent TEXT NOT NULL,
            reason TEXT NOT NULL,
            triggered_by TEXT NOT NULL,
            reassigned_at INTEGER NOT NULL
        )
        "#,
    ),
    (
        "create_notifications",
        r#"
        CREATE TABLE IF NOT EXISTS notifications (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            recipient_id TEXT NOT NULL,
            notification_type TEXT NOT NULL,
            ticket_id INTEGER,
            message TEXT NOT NULL,
            is_read INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        )
        "#,
    ),
    (
        "index_notifications_recipient",
        "CREATE INDEX IF NOT EXISTS idx_notifications_recipient ON notifications (tenant_id, recipient_id)",
    ),
    (
        "create_sla_rules",
        r#"
        CREATE TABLE IF NOT EXISTS sla_rules (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id TEXT NOT NULL,
            priority TEXT,
            response_hours REAL NOT NULL,
            resolution_hours REAL NOT NULL
        )
        "#,
    ),
    (
        "create_sla_breach_markers",
        r#"
        CREATE TABLE IF NOT EXISTS sla_breach_markers (
            ticket_id INTEGER NOT NULL,
            kind TEXT NOT NULL,
            rule_id INTEGER NOT NULL,
            notified_at INTEGER NOT NULL,
            PRIMARY KEY (ticket_id, kind, rule_id)
        )
        "#,
    ),
    (
        "create_categories",
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id TEXT NOT NULL,
            name TEXT NOT NULL,
            kind TEXT NOT NULL DEFAULT 'custom',
            created_at INTEGER NOT NULL,
            UNIQUE (tenant_id, name)
        )
        "#,
    ),
    (
        "create_feedback",
        r#"
        CREATE TABLE IF NOT EXISTS feedback (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ticket_id INTEGER NOT NULL UNIQUE,
            tenant_id TEXT NOT NULL,
            customer_id TEXT NOT NULL,
            agent_id TEXT,
            rating INTEGER NOT NULL,
            comment TEXT,
            sentiment TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    ),
];
