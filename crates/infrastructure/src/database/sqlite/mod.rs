pub mod sqlite_agent_repository;
pub mod sqlite_category_repository;
pub mod sqlite_feedback_repository;
pub mod sqlite_notification_repository;
pub mod sqlite_reassignment_log_repository;
pub mod sqlite_rotation_repository;
pub mod sqlite_sla_repository;
pub mod sqlite_ticket_repository;

pub use sqlite_agent_repository::SqliteAgentRepository;
pub use sqlite_category_repository::SqliteCategoryRepository;
pub use sqlite_feedback_repository::SqliteFeedbackRepository;
pub use sqlite_notification_repository::SqliteNotificationRepository;
pub use sqlite_reassignment_log_repository::SqliteReassignmentLogRepository;
pub use sqlite_rotation_repository::{SqliteCandidatePoolRepository, SqliteRotationRepository};
pub use sqlite_sla_repository::{SqliteBreachMarkerRepository, SqliteSlaRuleRepository};
pub use sqlite_ticket_repository::SqliteTicketRepository;
