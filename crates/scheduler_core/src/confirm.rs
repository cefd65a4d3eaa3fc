use async_trait::async_trait;

/// Asynchronous yes/no decision point, e.g. "Are you sure?" before a destructive action.
#[async_trait]
pub trait Confirm: Send + Sync {
    async fn confirm(&self, prompt: &str) -> bool;
}

pub struct FixedConfirm(pub bool);

#[async_trait]
impl Confirm for FixedConfirm {
    async fn confirm(&self, _prompt: &str) -> bool {
        self.0
    }
}
