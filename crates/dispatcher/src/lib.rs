//! 工单分配与调度引擎
//!
//! 包含分配引擎、可用性轮询、SLA检查、自动关闭、定时改派、来电分配、
//! 通知分发以及面向请求的工单/分类/反馈服务。

pub mod assignment;
pub mod auto_close;
pub mod call_router;
pub mod category_service;
pub mod classification;
pub mod directory_service;
pub mod engine;
pub mod feedback_service;
pub mod job_runner;
pub mod notification_dispatcher;
pub mod reassignment;
pub mod rotation;
pub mod sla_monitor;
pub mod ticket_service;

pub use assignment::{AgentSelectionStrategy, AssignmentEngine, AssignmentOutcome};
pub use call_router::{CallRouteOutcome, CallRouter};
pub use directory_service::AgentProfile;
pub use engine::HelpdeskEngine;
pub use job_runner::{JobRunStatus, JobRunner, JobSummary, ScheduledJob};
pub use notification_dispatcher::{NotificationDispatcher, NotificationWorker};
pub use ticket_service::NewTicket;
