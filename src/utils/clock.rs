use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};

/// Represents an entity responsible for providing the current local time across application. This
/// allows "now" to be pinned during testing.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Clock: Sync + Send + 'static {
    /// Local wall-clock time. Day files and time pickers are all expressed in it.
    fn now(&self) -> NaiveDateTime;

    async fn sleep(&self, duration: Duration);
}

pub struct DefaultClock;

#[async_trait]
impl Clock for DefaultClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
