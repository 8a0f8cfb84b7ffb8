use super::{HandleFactory, ProducerOptions, PublishHandle};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Handle that counts teardown calls.
#[derive(Debug)]
pub struct MockHandle {
    pub topic: String,
    pub name: String,
    pub serial: usize,
    pub close_calls: AtomicUsize,
    closes_finished: AtomicUsize,
    fail_close: bool,
    close_delay: Option<Duration>,
}

impl MockHandle {
    pub fn close_count(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    /// Number of `close` calls that have run to completion.
    pub fn finished_close_count(&self) -> usize {
        self.closes_finished.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PublishHandle for MockHandle {
    async fn close(&self) -> Result<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.close_delay {
            tokio::time::sleep(delay).await;
        }
        self.closes_finished.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(Error::Connection(format!("{} refused to close", self.name)));
        }
        Ok(())
    }
}

/// Factory recording every creation request.
#[derive(Default)]
pub struct MockFactory {
    created: AtomicUsize,
    requests: Mutex<Vec<(String, ProducerOptions)>>,
    failing: Mutex<HashSet<String>>,
    failing_close: Mutex<HashSet<String>>,
    delay: Option<Duration>,
    close_delay: Option<Duration>,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep inside every creation so that racing callers overlap.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Every handle this factory creates sleeps inside `close`.
    pub fn with_close_delay(close_delay: Duration) -> Self {
        Self {
            close_delay: Some(close_delay),
            ..Self::default()
        }
    }

    /// Number of handles successfully created.
    pub fn create_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Number of times `create` was called, including failures.
    pub fn invocations(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<(String, ProducerOptions)> {
        self.requests.lock().unwrap().clone()
    }

    /// Fail creations for this producer name until [`recover`](Self::recover) is called.
    pub fn fail_on(&self, producer_name: &str) {
        self.failing.lock().unwrap().insert(producer_name.to_string());
    }

    pub fn recover(&self, producer_name: &str) {
        self.failing.lock().unwrap().remove(producer_name);
    }

    /// Handles created for this name report an error from `close`.
    pub fn fail_close_on(&self, producer_name: &str) {
        self.failing_close
            .lock()
            .unwrap()
            .insert(producer_name.to_string());
    }
}

#[async_trait]
impl HandleFactory for MockFactory {
    type Handle = MockHandle;

    async fn create(&self, topic: &str, options: &ProducerOptions) -> Result<MockHandle> {
        let name = options.producer_name.clone().unwrap_or_default();
        self.requests
            .lock()
            .unwrap()
            .push((topic.to_string(), options.clone()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.lock().unwrap().contains(&name) {
            return Err(Error::Connection(format!("broker rejected {name}")));
        }

        let serial = self.created.fetch_add(1, Ordering::SeqCst);
        let fail_close = self.failing_close.lock().unwrap().contains(&name);
        Ok(MockHandle {
            topic: topic.to_string(),
            name,
            serial,
            close_calls: AtomicUsize::new(0),
            closes_finished: AtomicUsize::new(0),
            fail_close,
            close_delay: self.close_delay,
        })
    }
}
