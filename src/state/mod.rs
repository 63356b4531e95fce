pub mod alert_store;
pub mod clock;
pub mod dashboard;

pub use alert_store::AlertCooldownStore;
pub use clock::SystemClock;
pub use dashboard::DashboardState;
