/// 为以字符串存储的枚举实现 SQLite 编解码
macro_rules! impl_sqlite_text_enum {
    ($ty:ty) => {
        impl sqlx::Type<sqlx::Sqlite> for $ty {
            fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
                <str as sqlx::Type<sqlx::Sqlite>>::type_info()
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for $ty {
            fn decode(
                value: sqlx::sqlite::SqliteValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let s = <&str as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
                s.parse::<$ty>().map_err(|e| e.into())
            }
        }

        impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for $ty {
            fn encode_by_ref(
                &self,
                buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
            ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
                <&str as sqlx::Encode<sqlx::Sqlite>>::encode(self.as_str(), buf)
            }
        }
    };
}

pub(crate) use impl_sqlite_text_enum;

pub mod agent;
pub mod category;
pub mod feedback;
pub mod notification;
pub mod principal;
pub mod reassignment;
pub mod sla;
pub mod ticket;

pub use agent::{Agent, CandidatePool, HolidayWindow, RotationPointer};
pub use category::{Category, CategoryKind, GENERAL_CATEGORY};
pub use feedback::{Feedback, Sentiment};
pub use notification::{Notification, NotificationType};
pub use principal::{Principal, Role};
pub use reassignment::{ReassignmentLog, ReassignmentReason, TriggeredBy};
pub use sla::{BreachKind, SlaBreachMarker, SlaReport, SlaRule};
pub use ticket::{Ticket, TicketFilter, TicketMessage, TicketPriority, TicketStatus};
