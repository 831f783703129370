use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use dagview_logging::{dagview_debug, dagview_trace};
use reqwest::Method;
use serde::de::DeserializeOwned;
use tokio::sync::oneshot;
use tokio::time::{timeout_at, Instant};

/// A network response observed by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedResponse {
    pub method: Method,
    pub url: String,
    pub status: u16,
    pub body: String,
}

impl ObservedResponse {
    pub fn new(method: Method, url: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// Predicate correlating a response with the action that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResponseMatcher {
    method: Option<Method>,
    url_contains: Vec<String>,
    url_excludes: Vec<String>,
    status: Option<u16>,
}

impl ResponseMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn url_contains(mut self, fragment: impl Into<String>) -> Self {
        self.url_contains.push(fragment.into());
        self
    }

    pub fn url_excludes(mut self, fragment: impl Into<String>) -> Self {
        self.url_excludes.push(fragment.into());
        self
    }

    pub fn status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn matches(&self, response: &ObservedResponse) -> bool {
        self.method
            .as_ref()
            .map_or(true, |method| *method == response.method)
            && self.status.map_or(true, |status| status == response.status)
            && self
                .url_contains
                .iter()
                .all(|fragment| response.url.contains(fragment.as_str()))
            && !self
                .url_excludes
                .iter()
                .any(|fragment| response.url.contains(fragment.as_str()))
    }
}

impl fmt::Display for ResponseMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.method {
            Some(method) => write!(f, "{method}")?,
            None => f.write_str("*")?,
        }
        write!(f, " url~{:?}", self.url_contains)?;
        if !self.url_excludes.is_empty() {
            write!(f, " !{:?}", self.url_excludes)?;
        }
        if let Some(status) = self.status {
            write!(f, " status={status}")?;
        }
        Ok(())
    }
}

/// Source of correlated responses.
///
/// `subscribe` registers synchronously: any matching response observed after
/// it returns is delivered, including one that arrives before the receiver is
/// first polled. Each subscription receives at most one response.
pub trait NetworkObserver: Send + Sync {
    fn subscribe(&self, matcher: ResponseMatcher) -> oneshot::Receiver<ObservedResponse>;
}

/// Outcome of waiting on a correlated response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ack {
    Received(ObservedResponse),
    /// No matching response before the deadline. Expected when the data was
    /// already cached, so callers fall back to settle-based verification.
    TimedOut,
}

impl Ack {
    pub fn response(&self) -> Option<&ObservedResponse> {
        match self {
            Self::Received(response) => Some(response),
            Self::TimedOut => None,
        }
    }
}

/// An armed response subscription with its deadline.
///
/// Dropping it without waiting closes the channel; the observer discards
/// the subscription on its next delivery pass.
#[derive(Debug)]
pub struct PendingResponse {
    matcher: ResponseMatcher,
    deadline: Instant,
    rx: oneshot::Receiver<ObservedResponse>,
}

impl PendingResponse {
    pub fn arm(observer: &dyn NetworkObserver, matcher: ResponseMatcher, timeout: Duration) -> Self {
        dagview_trace!("arming response subscription {} for {:?}", matcher, timeout);
        let rx = observer.subscribe(matcher.clone());
        Self {
            matcher,
            deadline: Instant::now() + timeout,
            rx,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub async fn wait(self) -> Ack {
        match timeout_at(self.deadline, self.rx).await {
            Ok(Ok(response)) => {
                dagview_debug!(
                    "correlated response {} {} -> {}",
                    response.method,
                    response.url,
                    response.status
                );
                Ack::Received(response)
            }
            Ok(Err(_)) => {
                dagview_debug!("response observer went away while waiting for {}", self.matcher);
                Ack::TimedOut
            }
            Err(_) => {
                dagview_debug!("no response matching {} before deadline", self.matcher);
                Ack::TimedOut
            }
        }
    }
}

struct Subscriber {
    matcher: ResponseMatcher,
    tx: oneshot::Sender<ObservedResponse>,
}

/// In-process [`NetworkObserver`] fed by a driver adapter through
/// [`ResponseBus::publish`].
#[derive(Default)]
pub struct ResponseBus {
    subscribers: Mutex<Vec<Subscriber>>,
}

impl ResponseBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `response` to every live matching subscriber and returns how
    /// many received it. Abandoned subscriptions are pruned on the way.
    pub fn publish(&self, response: ObservedResponse) -> usize {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut delivered = 0;
        let mut kept = Vec::with_capacity(subscribers.len());
        for subscriber in subscribers.drain(..) {
            if subscriber.tx.is_closed() {
                continue;
            }
            if subscriber.matcher.matches(&response) {
                if subscriber.tx.send(response.clone()).is_ok() {
                    delivered += 1;
                }
            } else {
                kept.push(subscriber);
            }
        }
        *subscribers = kept;
        delivered
    }

    /// Live subscriptions still waiting for a response.
    pub fn pending(&self) -> usize {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        subscribers.retain(|subscriber| !subscriber.tx.is_closed());
        subscribers.len()
    }
}

impl NetworkObserver for ResponseBus {
    fn subscribe(&self, matcher: ResponseMatcher) -> oneshot::Receiver<ObservedResponse> {
        let (tx, rx) = oneshot::channel();
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Subscriber { matcher, tx });
        rx
    }
}
