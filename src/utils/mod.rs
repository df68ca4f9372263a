pub mod datastruct;
pub mod dispatch;
