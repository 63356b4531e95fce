pub mod dispatcher;
pub mod telegram;

use std::future::Future;

use crate::error::Result;
use crate::types::ScoredRow;

pub use dispatcher::{AlertDispatcher, DispatchReport};
pub use telegram::TelegramNotifier;

/// Outbound message transport. `Ok` means the message was accepted.
pub trait Notifier: Send + Sync {
    fn send(&self, text: &str) -> impl Future<Output = Result<()>> + Send;
}

pub fn format_alert(row: &ScoredRow) -> String {
    let mut msg = format!(
        "APEX SIGNAL\n\nSymbol: {}\nGrade: {}\nApex Score: {:.2}",
        row.symbol, row.grade, row.score
    );
    if let Some(direction) = row.direction {
        msg.push_str(&format!("\nDirection: {direction}"));
    }
    msg
}

/// One message for several rows.
pub fn format_batch(rows: &[&ScoredRow]) -> String {
    let mut msg = format!("APEX SIGNALS ({})\n", rows.len());
    for row in rows {
        msg.push_str(&format!("\n{} | {} | {:.2}", row.symbol, row.grade, row.score));
        if let Some(direction) = row.direction {
            msg.push_str(&format!(" | {direction}"));
        }
    }
    msg
}
