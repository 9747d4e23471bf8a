pub mod addresses;
pub mod audit_logs;
pub mod chats;
pub mod comments;
pub mod favorites;
pub mod images;
pub mod items;
pub mod orders;
pub mod point_topups;
pub mod reports;
pub mod reviews;
pub mod users;

pub use addresses::Entity as Addresses;
pub use audit_logs::Entity as AuditLogs;
pub use chats::Entity as Chats;
pub use comments::Entity as Comments;
pub use favorites::Entity as Favorites;
pub use images::Entity as Images;
pub use items::Entity as Items;
pub use orders::Entity as Orders;
pub use point_topups::Entity as PointTopups;
pub use reports::Entity as Reports;
pub use reviews::Entity as Reviews;
pub use users::Entity as Users;
