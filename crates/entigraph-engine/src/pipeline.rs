use entigraph_core::{Entity, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A chainable handle over a not-yet-resolved value.
///
/// `pipe` and `field` express dependent operations before any await occurs,
/// letting a pipelining-capable transport collapse the chain into fewer round
/// trips. Awaiting the handle forces resolution. Purely a latency
/// optimization: the resolver treats pipelined and plain futures identically.
pub struct Pipeline<T> {
    inner: BoxFuture<'static, Result<T>>,
}

impl<T: Send + 'static> Pipeline<T> {
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            inner: future.boxed(),
        }
    }

    pub fn ready(value: T) -> Self {
        Self::new(async move { Ok(value) })
    }

    /// Chains a synchronous transform without forcing resolution.
    pub fn pipe<U, F>(self, transform: F) -> Pipeline<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        Pipeline::new(async move { Ok(transform(self.inner.await?)) })
    }

    /// Chains a dependent async step; the combined chain is still one handle.
    pub fn then<U, F, Fut>(self, step: F) -> Pipeline<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Fut + Send + 'static,
        Fut: Future<Output = Result<U>> + Send + 'static,
    {
        Pipeline::new(async move { step(self.inner.await?).await })
    }
}

impl Pipeline<Entity> {
    /// Scopes the handle to one property of the eventual entity.
    pub fn field(self, name: &str) -> Pipeline<Value> {
        let name = name.to_string();
        self.pipe(move |entity| entity.field(&name).cloned().unwrap_or(Value::Null))
    }
}

impl Pipeline<Option<Entity>> {
    pub fn field(self, name: &str) -> Pipeline<Value> {
        let name = name.to_string();
        self.pipe(move |entity| {
            entity
                .and_then(|e| e.field(&name).cloned())
                .unwrap_or(Value::Null)
        })
    }
}

impl<T> Future for Pipeline<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entigraph_core::Object;
    use serde_json::json;

    #[tokio::test]
    async fn pipe_chains_without_forcing() {
        let pipeline = Pipeline::ready(2).pipe(|n| n * 10).pipe(|n| n + 1);
        assert_eq!(pipeline.await.unwrap(), 21);
    }

    #[tokio::test]
    async fn then_chains_async_steps() {
        let pipeline = Pipeline::ready(5).then(|n| async move { Ok(n * 2) });
        assert_eq!(pipeline.await.unwrap(), 10);
    }

    #[tokio::test]
    async fn field_scopes_to_a_property_path() {
        let mut data = Object::new();
        data.insert("title".to_string(), json!("hello"));
        let entity = Entity::new("Post", data);

        let value = Pipeline::ready(entity).field("title").await.unwrap();
        assert_eq!(value, json!("hello"));

        let value = Pipeline::<Option<Entity>>::ready(None)
            .field("title")
            .await
            .unwrap();
        assert_eq!(value, Value::Null);
    }
}
