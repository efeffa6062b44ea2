// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Browser page recovery driven through the orchestrator

use async_trait::async_trait;
use clip_vectorizer::{
    backend::browser::{BrowserBackend, PageError, PageLauncher, PageSession, DEFAULT_BROWSER_FUNCTION},
    backend::EmbeddingBackend,
    vectorizer::Vectorizer,
    vision::{ImageFetcher, ImageNormalizer},
    VectorizeError,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::common::{png_base64, stub_contract, BODY_LIMIT, STUB_EMBEDDING};

/// One scripted reply per call; a page with no replies left disconnects
struct ScriptedPage {
    id: usize,
    replies: Mutex<VecDeque<bool>>,
    alive: AtomicBool,
    closed: Arc<Mutex<Vec<usize>>>,
}

#[async_trait]
impl PageSession for ScriptedPage {
    async fn call_function(&self, _function: &str, _argument: &str) -> Result<Value, PageError> {
        let healthy = self.replies.lock().unwrap().pop_front().unwrap_or(false);
        if healthy {
            Ok(json!(STUB_EMBEDDING))
        } else {
            self.alive.store(false, Ordering::SeqCst);
            Err(PageError::Disconnected("renderer crashed".to_string()))
        }
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.closed.lock().unwrap().push(self.id);
    }
}

/// Each launch takes the next script; pages past the end crash on first use
#[derive(Default)]
struct ScriptedLauncher {
    scripts: Mutex<VecDeque<Vec<bool>>>,
    launched: Mutex<usize>,
    closed: Arc<Mutex<Vec<usize>>>,
}

impl ScriptedLauncher {
    fn new(scripts: Vec<Vec<bool>>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            ..Self::default()
        })
    }

    fn closed(&self) -> Vec<usize> {
        self.closed.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageLauncher for ScriptedLauncher {
    async fn launch(&self) -> Result<Arc<dyn PageSession>, PageError> {
        let replies = self.scripts.lock().unwrap().pop_front().unwrap_or_default();
        let id = {
            let mut launched = self.launched.lock().unwrap();
            *launched += 1;
            *launched
        };

        Ok(Arc::new(ScriptedPage {
            id,
            replies: Mutex::new(replies.into()),
            alive: AtomicBool::new(true),
            closed: self.closed.clone(),
        }))
    }
}

fn setup(launcher: Arc<ScriptedLauncher>) -> (Arc<BrowserBackend>, Vectorizer) {
    let backend = Arc::new(BrowserBackend::new(
        launcher,
        DEFAULT_BROWSER_FUNCTION.to_string(),
        stub_contract(),
    ));
    let fetcher = ImageFetcher::new(Duration::from_secs(5), BODY_LIMIT).unwrap();
    let vectorizer = Vectorizer::new(
        backend.clone() as Arc<dyn EmbeddingBackend>,
        ImageNormalizer::new(fetcher),
        Duration::from_secs(30),
    );
    (backend, vectorizer)
}

async fn request(vectorizer: &Vectorizer) -> Result<Vec<f32>, VectorizeError> {
    vectorizer
        .vectorize_fields(None, Some(&png_base64(64, 48)))
        .await
}

#[tokio::test]
async fn test_crashing_page_is_launched_once_per_request() {
    let launcher = ScriptedLauncher::new(vec![]);
    let (backend, vectorizer) = setup(launcher.clone());

    for expected_launches in 1..=3 {
        let err = request(&vectorizer).await.unwrap_err();
        assert!(matches!(err, VectorizeError::Inference(_)), "got {:?}", err);
        assert_eq!(err.status_code(), 500);
        assert_eq!(backend.launches(), expected_launches);
    }

    assert_eq!(launcher.closed(), vec![1, 2, 3]);
    assert!(!vectorizer.is_busy());
}

#[tokio::test]
async fn test_page_lost_between_requests_is_relaunched_once() {
    let launcher = ScriptedLauncher::new(vec![vec![true, false], vec![true]]);
    let (backend, vectorizer) = setup(launcher.clone());

    assert_eq!(request(&vectorizer).await.unwrap(), STUB_EMBEDDING.to_vec());
    assert_eq!(backend.launches(), 1);

    // Page 1 dies on this call; page 2 answers within the same request
    assert_eq!(request(&vectorizer).await.unwrap(), STUB_EMBEDDING.to_vec());
    assert_eq!(backend.launches(), 2);
    assert_eq!(launcher.closed(), vec![1]);
    assert!(backend.is_ready());
}

#[tokio::test]
async fn test_relaunched_page_crashing_fails_the_request() {
    let launcher = ScriptedLauncher::new(vec![vec![true, false], vec![false]]);
    let (backend, vectorizer) = setup(launcher.clone());

    request(&vectorizer).await.unwrap();

    let err = request(&vectorizer).await.unwrap_err();
    assert!(matches!(err, VectorizeError::Inference(_)));
    assert_eq!(backend.launches(), 2);
    assert_eq!(launcher.closed(), vec![1, 2]);
    assert!(!backend.is_ready());

    // Next request starts over with a single new page
    let err = request(&vectorizer).await.unwrap_err();
    assert!(matches!(err, VectorizeError::Inference(_)));
    assert_eq!(backend.launches(), 3);
}
