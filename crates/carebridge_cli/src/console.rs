use async_trait::async_trait;
use carebridge_core::{NotifyError, StaffNotifier};

/// Prints staff room messages to stdout
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

#[async_trait]
impl StaffNotifier for ConsoleNotifier {
    async fn notify(&self, room: &str, text: &str) -> Result<(), NotifyError> {
        println!("-> room {room}: {text}");
        Ok(())
    }
}
