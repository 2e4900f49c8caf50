use async_trait::async_trait;

use super::{BackendKind, GenerationBackend};
use crate::error::BackendError;

/// The reply [`StubBackend`] always gives.
pub const STUB_REPLY: &str = "Okay, picture this: a fridge that tweets your leftovers, \
a subscription for socks that never match, and an app that rates your ideas \
before you pitch them. Boom.";

/// Deterministic backend for tests and offline demos. Never touches the
/// network or a model.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubBackend;

#[async_trait]
impl GenerationBackend for StubBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Stub
    }

    async fn generate(&self, _prompt: &str, _: u32, _: f32) -> Result<String, BackendError> {
        Ok(STUB_REPLY.to_owned())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::message::Message;

    #[tokio::test]
    async fn reply_ignores_input() {
        let a = StubBackend.generate("anything", 1, 0.0).await.unwrap();
        let b = StubBackend.generate("", 4096, 2.0).await.unwrap();
        assert_eq!(a, STUB_REPLY);
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn structured_input_gets_the_same_reply() {
        let reply = StubBackend
            .generate_from_messages(&[Message::user("Pitch a fridge app")], 64, 0.9)
            .await
            .unwrap();
        assert_eq!(reply, STUB_REPLY);
    }
}
